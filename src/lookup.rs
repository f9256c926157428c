// 🔎 Read-side lookups
//
// Every vehicle read returns a VehicleSnapshot with its owner and plate
// resolved through explicit store gets.

use crate::db;
use crate::entities::{OwnerId, PlateNumber, Vehicle, VehicleId, VehicleSnapshot};
use crate::error::{Lookup, RegistryError, Result};
use rusqlite::Connection;
use tracing::error;

/// Resolve the current owner and plate of a stored vehicle
pub fn vehicle_snapshot(conn: &Connection, vehicle: Vehicle) -> Result<VehicleSnapshot> {
    let owner = db::get_owner(conn, vehicle.current_owner_id)?.ok_or_else(|| {
        broken(format!(
            "vehicle {} references missing owner {}",
            vehicle.id, vehicle.current_owner_id
        ))
    })?;

    let plate = db::get_plate(conn, vehicle.current_plate_id)?.ok_or_else(|| {
        broken(format!(
            "vehicle {} references missing plate {}",
            vehicle.id, vehicle.current_plate_id
        ))
    })?;

    Ok(VehicleSnapshot::assemble(vehicle, owner, plate))
}

fn broken(message: String) -> RegistryError {
    error!("{}", message);
    RegistryError::InvariantViolation(message)
}

pub fn get_vehicle_by_id(conn: &Connection, id: VehicleId) -> Result<VehicleSnapshot> {
    let vehicle =
        db::get_vehicle(conn, id)?.ok_or(RegistryError::VehicleNotFound(Lookup::Id(id.get())))?;
    vehicle_snapshot(conn, vehicle)
}

pub fn find_by_chassis_number(conn: &Connection, chassis: &str) -> Result<Option<VehicleSnapshot>> {
    db::find_vehicle_by_chassis(conn, chassis)?
        .map(|v| vehicle_snapshot(conn, v))
        .transpose()
}

/// Vehicle currently bearing the plate; None for unknown or released plates
pub fn find_by_plate_number(conn: &Connection, plate_number: &str) -> Result<Option<VehicleSnapshot>> {
    let Some(plate) = db::find_plate_by_number(conn, plate_number)? else {
        return Ok(None);
    };

    db::find_vehicle_by_plate(conn, plate.id)?
        .map(|v| vehicle_snapshot(conn, v))
        .transpose()
}

pub fn find_by_owner_national_id(conn: &Connection, national_id: &str) -> Result<Vec<VehicleSnapshot>> {
    let owner = db::find_owner_by_national_id(conn, national_id)?
        .ok_or_else(|| RegistryError::OwnerNotFound(Lookup::Key(national_id.to_string())))?;

    db::vehicles_for_owner(conn, owner.id)?
        .into_iter()
        .map(|v| vehicle_snapshot(conn, v))
        .collect()
}

pub fn owner_plate_numbers(conn: &Connection, owner_id: OwnerId) -> Result<Vec<PlateNumber>> {
    if db::get_owner(conn, owner_id)?.is_none() {
        return Err(RegistryError::OwnerNotFound(Lookup::Id(owner_id.get())));
    }
    db::plates_for_owner(conn, owner_id)
}
