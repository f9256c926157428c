// 📝 Registration Workflow
//
// First registration of a vehicle, plus the owner / plate / user records it
// depends on. Each function runs against the caller's open transaction; an
// Err leaves nothing behind once that transaction is dropped.

use crate::db::{self, Event, SYSTEM_ACTOR};
use crate::entities::{
    ContactUpdate, NewOwner, NewPlateNumber, NewUser, NewVehicle, Owner, OwnerId, PlateNumber,
    User, VehicleSnapshot,
};
use crate::error::{Lookup, RegistryError, Result};
use crate::plates;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::info;

// ============================================================================
// OWNERS
// ============================================================================

pub fn register_owner(conn: &Connection, request: &NewOwner, now: DateTime<Utc>) -> Result<Owner> {
    request.validate()?;

    if db::national_id_exists(conn, &request.national_id)? {
        return Err(RegistryError::DuplicateNationalId(request.national_id.clone()));
    }

    let owner = db::insert_owner(conn, request, now)?;

    db::insert_event(
        conn,
        &Event::new(
            "owner_registered",
            "owner",
            &owner.id.to_string(),
            serde_json::json!({ "national_id": owner.national_id }),
            SYSTEM_ACTOR,
            now,
        ),
    )?;

    info!(owner_id = %owner.id, national_id = %owner.national_id, "owner registered");
    Ok(owner)
}

pub fn update_owner_contact(
    conn: &Connection,
    owner_id: OwnerId,
    update: &ContactUpdate,
    now: DateTime<Utc>,
) -> Result<Owner> {
    update.validate()?;
    if update.is_empty() {
        return Err(RegistryError::invalid("contact", "at least one field must be supplied"));
    }

    let owner = db::update_owner_contact(conn, owner_id, update, now)?;

    db::insert_event(
        conn,
        &Event::new(
            "owner_contact_updated",
            "owner",
            &owner.id.to_string(),
            serde_json::to_value(update)?,
            SYSTEM_ACTOR,
            now,
        ),
    )?;

    Ok(owner)
}

// ============================================================================
// PLATES
// ============================================================================

/// Issue a new plate to an existing owner. Plates start AVAILABLE.
pub fn register_plate_number(
    conn: &Connection,
    owner_id: OwnerId,
    request: &NewPlateNumber,
    now: DateTime<Utc>,
) -> Result<PlateNumber> {
    request.validate()?;

    if db::get_owner(conn, owner_id)?.is_none() {
        return Err(RegistryError::OwnerNotFound(Lookup::Id(owner_id.get())));
    }

    if db::plate_number_exists(conn, &request.plate_number)? {
        return Err(RegistryError::DuplicatePlateNumber(request.plate_number.clone()));
    }

    let plate = db::insert_plate(conn, owner_id, request, now)?;

    db::insert_event(
        conn,
        &Event::new(
            "plate_registered",
            "plate_number",
            &plate.id.to_string(),
            serde_json::json!({ "plate_number": plate.plate_number, "owner_id": owner_id }),
            SYSTEM_ACTOR,
            now,
        ),
    )?;

    info!(plate = %plate.plate_number, owner_id = %owner_id, "plate number issued");
    Ok(plate)
}

// ============================================================================
// USERS
// ============================================================================

pub fn register_user(conn: &Connection, request: &NewUser, now: DateTime<Utc>) -> Result<User> {
    request.validate()?;

    if db::find_user_by_email(conn, &request.email)?.is_some() {
        return Err(RegistryError::DuplicateUserEmail(request.email.clone()));
    }

    let user = db::insert_user(conn, request, now)?;

    db::insert_event(
        conn,
        &Event::new(
            "user_registered",
            "user",
            &user.id.to_string(),
            serde_json::json!({ "email": user.email, "role": user.role }),
            SYSTEM_ACTOR,
            now,
        ),
    )?;

    Ok(user)
}

// ============================================================================
// VEHICLES
// ============================================================================

/// First registration: binds a new vehicle to its owner and an AVAILABLE
/// plate of that owner, moving the plate to IN_USE.
///
/// No history row is written; history starts at the first transfer.
pub fn register_vehicle(
    conn: &Connection,
    request: &NewVehicle,
    now: DateTime<Utc>,
) -> Result<VehicleSnapshot> {
    request.validate()?;

    // 1. Chassis numbers are never reused
    if db::chassis_number_exists(conn, &request.chassis_number)? {
        return Err(RegistryError::DuplicateChassisNumber(request.chassis_number.clone()));
    }

    // 2. Owner
    let owner = db::get_owner(conn, request.owner_id)?
        .ok_or(RegistryError::OwnerNotFound(Lookup::Id(request.owner_id.get())))?;

    // 3. Plate
    let plate = db::get_plate(conn, request.plate_number_id)?.ok_or(
        RegistryError::PlateNotFound(Lookup::Id(request.plate_number_id.get())),
    )?;

    // 4. The plate must have been issued to this owner
    plates::verify_ownership(&plate, owner.id)?;

    // 5. AVAILABLE → IN_USE
    let plate = plates::acquire(conn, plate.id, now)?;

    // 6. Vehicle row
    let registration_date = request.registration_date.unwrap_or(now);
    let vehicle = db::insert_vehicle(conn, request, registration_date, now)?;

    db::insert_event(
        conn,
        &Event::new(
            "vehicle_registered",
            "vehicle",
            &vehicle.id.to_string(),
            serde_json::json!({
                "chassis_number": vehicle.chassis_number,
                "owner_id": owner.id,
                "plate_number": plate.plate_number,
                "price": vehicle.current_price,
            }),
            SYSTEM_ACTOR,
            now,
        ),
    )?;

    info!(
        vehicle_id = %vehicle.id,
        chassis = %vehicle.chassis_number,
        plate = %plate.plate_number,
        "vehicle registered"
    );

    Ok(VehicleSnapshot::assemble(vehicle, owner, plate))
}
