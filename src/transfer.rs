// 🔄 Transfer Workflow
//
// Moves a vehicle to a new owner and plate in one unit of work:
// release the outgoing plate, acquire the incoming one, append a history
// row, rebind the vehicle. Every precondition is checked before the first
// write, so a rejected transfer never mutates anything.

use crate::db::{self, Event};
use crate::entities::vehicle::require_price;
use crate::entities::{OwnerId, PlateId, Vehicle, VehicleId, VehicleSnapshot};
use crate::error::{Lookup, RegistryError, Result};
use crate::history::HistoryRecorder;
use crate::plates;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Target binding of a transfer. The acting user is passed separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub new_owner_id: OwnerId,
    #[serde(rename = "newPlateNumberId")]
    pub new_plate_id: PlateId,
    pub transfer_price: f64,
}

impl TransferRequest {
    pub fn new(new_owner_id: OwnerId, new_plate_id: PlateId, transfer_price: f64) -> Self {
        TransferRequest {
            new_owner_id,
            new_plate_id,
            transfer_price,
        }
    }

    pub fn validate(&self) -> Result<()> {
        require_price("transferPrice", self.transfer_price)
    }
}

pub fn transfer_vehicle(
    conn: &Connection,
    vehicle_id: VehicleId,
    request: &TransferRequest,
    acting_user_email: &str,
    now: DateTime<Utc>,
) -> Result<VehicleSnapshot> {
    request.validate()?;

    // ========================================================================
    // RESOLVE (read-only)
    // ========================================================================

    let vehicle = db::get_vehicle(conn, vehicle_id)?
        .ok_or(RegistryError::VehicleNotFound(Lookup::Id(vehicle_id.get())))?;

    let new_owner = db::get_owner(conn, request.new_owner_id)?
        .ok_or(RegistryError::OwnerNotFound(Lookup::Id(request.new_owner_id.get())))?;

    let new_plate = db::get_plate(conn, request.new_plate_id)?
        .ok_or(RegistryError::PlateNotFound(Lookup::Id(request.new_plate_id.get())))?;

    if !new_plate.is_available() {
        return Err(RegistryError::PlateUnavailable {
            plate: new_plate.plate_number,
            status: new_plate.status,
        });
    }

    plates::verify_ownership(&new_plate, new_owner.id)?;

    let acting_user = db::find_user_by_email(conn, acting_user_email)?
        .ok_or_else(|| RegistryError::UserNotFound(acting_user_email.to_string()))?;

    // ========================================================================
    // APPLY
    // ========================================================================

    let previous_owner = vehicle.current_owner_id;
    let previous_plate = vehicle.current_plate_id;

    plates::release(conn, previous_plate, now)?;
    let new_plate = plates::acquire(conn, new_plate.id, now)?;

    let entry = HistoryRecorder::new()
        .vehicle(vehicle.id)
        .previous_owner(previous_owner)
        .new_owner(new_owner.id)
        .previous_plate(Some(previous_plate))
        .new_plate(new_plate.id)
        .price(request.transfer_price)
        .at(now)
        .transferred_by(acting_user.id)
        .record(conn, now)?;

    db::update_vehicle_binding(
        conn,
        vehicle.id,
        new_owner.id,
        new_plate.id,
        request.transfer_price,
        now,
    )?;

    db::insert_event(
        conn,
        &Event::new(
            "vehicle_transferred",
            "vehicle",
            &vehicle.id.to_string(),
            serde_json::json!({
                "history_entry": entry.entry_uuid,
                "transfer_type": entry.transfer_type(),
                "previous_owner_id": previous_owner,
                "new_owner_id": new_owner.id,
                "previous_plate_id": previous_plate,
                "new_plate_id": new_plate.id,
                "transfer_price": request.transfer_price,
            }),
            &acting_user.email,
            now,
        ),
    )?;

    info!(
        vehicle_id = %vehicle.id,
        transfer_type = %entry.transfer_type(),
        from_owner = %previous_owner,
        to_owner = %new_owner.id,
        plate = %new_plate.plate_number,
        by = %acting_user.email,
        "vehicle transferred"
    );

    let updated = Vehicle {
        current_owner_id: new_owner.id,
        current_plate_id: new_plate.id,
        current_price: request.transfer_price,
        updated_at: now,
        ..vehicle
    };

    Ok(VehicleSnapshot::assemble(updated, new_owner, new_plate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{NewOwner, NewPlateNumber, NewUser, NewVehicle, Owner, PlateNumber, PlateStatus};
    use crate::clock::{Clock, SystemClock};
    use crate::registration;

    const CLERK: &str = "clerk@registry.rw";

    struct Fixture {
        conn: Connection,
        alice: Owner,
        bob: Owner,
        alice_plate: PlateNumber,
        bob_plate: PlateNumber,
        vehicle: VehicleSnapshot,
    }

    fn fixture() -> Fixture {
        let conn = Connection::open_in_memory().unwrap();
        db::setup_database(&conn).unwrap();
        let now = SystemClock.now();

        let alice = registration::register_owner(&conn, &NewOwner::new("Alice", "NID-1", "0788", "Kigali"), now).unwrap();
        let bob = registration::register_owner(&conn, &NewOwner::new("Bob", "NID-2", "0789", "Huye"), now).unwrap();
        let alice_plate =
            registration::register_plate_number(&conn, alice.id, &NewPlateNumber::new("RAA111A"), now).unwrap();
        let bob_plate =
            registration::register_plate_number(&conn, bob.id, &NewPlateNumber::new("RAB222B"), now).unwrap();
        registration::register_user(&conn, &NewUser::new("Clerk", CLERK, "STAFF"), now).unwrap();

        let vehicle = registration::register_vehicle(
            &conn,
            &NewVehicle {
                chassis_number: "CH-100".to_string(),
                manufacture_company: "Toyota".to_string(),
                manufacture_year: 2020,
                model_name: "RAV4".to_string(),
                price: 20_000.0,
                owner_id: alice.id,
                plate_number_id: alice_plate.id,
                registration_date: None,
            },
            now,
        )
        .unwrap();

        Fixture { conn, alice, bob, alice_plate, bob_plate, vehicle }
    }

    #[test]
    fn test_transfer_rebinds_vehicle_and_flips_plates() {
        let f = fixture();
        let request = TransferRequest::new(f.bob.id, f.bob_plate.id, 5000.0);

        let snapshot = transfer_vehicle(&f.conn, f.vehicle.id, &request, CLERK, SystemClock.now()).unwrap();

        assert_eq!(snapshot.current_owner.id, f.bob.id);
        assert_eq!(snapshot.current_plate_number.id, f.bob_plate.id);
        assert_eq!(snapshot.current_plate_number.status, PlateStatus::InUse);
        assert_eq!(snapshot.current_price, 5000.0);
        assert_eq!(snapshot.chassis_number, "CH-100");
        assert_eq!(snapshot.registration_date, f.vehicle.registration_date);

        let old_plate = db::get_plate(&f.conn, f.alice_plate.id).unwrap().unwrap();
        assert_eq!(old_plate.status, PlateStatus::Available);
        assert_eq!(old_plate.owner_id, f.alice.id);

        let rows = db::history_for_vehicle(&f.conn, f.vehicle.id).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].previous_plate_id, Some(f.alice_plate.id));
        assert_eq!(rows[0].previous_owner_id, f.alice.id);
    }

    #[test]
    fn test_precondition_order() {
        let f = fixture();

        // Unknown vehicle wins over everything else
        let bad = TransferRequest::new(OwnerId(99), PlateId(99), 10.0);
        let err = transfer_vehicle(&f.conn, VehicleId(42), &bad, "nobody@x.rw", SystemClock.now()).unwrap_err();
        assert!(matches!(err, RegistryError::VehicleNotFound(_)));

        let err = transfer_vehicle(&f.conn, f.vehicle.id, &bad, "nobody@x.rw", SystemClock.now()).unwrap_err();
        assert!(matches!(err, RegistryError::OwnerNotFound(_)));

        let bad = TransferRequest::new(f.bob.id, PlateId(99), 10.0);
        let err = transfer_vehicle(&f.conn, f.vehicle.id, &bad, "nobody@x.rw", SystemClock.now()).unwrap_err();
        assert!(matches!(err, RegistryError::PlateNotFound(_)));

        // Plate availability is checked before ownership
        let in_use = TransferRequest::new(f.bob.id, f.alice_plate.id, 10.0);
        let err = transfer_vehicle(&f.conn, f.vehicle.id, &in_use, CLERK, SystemClock.now()).unwrap_err();
        assert!(matches!(err, RegistryError::PlateUnavailable { .. }));

        let mismatch = TransferRequest::new(f.alice.id, f.bob_plate.id, 10.0);
        let err = transfer_vehicle(&f.conn, f.vehicle.id, &mismatch, CLERK, SystemClock.now()).unwrap_err();
        assert!(matches!(err, RegistryError::PlateOwnerMismatch { .. }));

        let ok_target = TransferRequest::new(f.bob.id, f.bob_plate.id, 10.0);
        let err = transfer_vehicle(&f.conn, f.vehicle.id, &ok_target, "nobody@x.rw", SystemClock.now()).unwrap_err();
        assert!(matches!(err, RegistryError::UserNotFound(ref e) if e == "nobody@x.rw"));

        // Nothing moved
        let plate = db::get_plate(&f.conn, f.bob_plate.id).unwrap().unwrap();
        assert_eq!(plate.status, PlateStatus::Available);
        assert!(db::history_for_vehicle(&f.conn, f.vehicle.id).unwrap().is_empty());
    }

    #[test]
    fn test_non_positive_price_rejected() {
        let f = fixture();
        for price in [0.0, -1.0, f64::NAN] {
            let request = TransferRequest::new(f.bob.id, f.bob_plate.id, price);
            let err = transfer_vehicle(&f.conn, f.vehicle.id, &request, CLERK, SystemClock.now()).unwrap_err();
            assert!(matches!(err, RegistryError::InvalidInput { field: "transferPrice", .. }));
        }
    }

    #[test]
    fn test_request_wire_names() {
        let request: TransferRequest = serde_json::from_str(
            r#"{"newOwnerId": 2, "newPlateNumberId": 7, "transferPrice": 5000}"#,
        )
        .unwrap();
        assert_eq!(request, TransferRequest::new(OwnerId(2), PlateId(7), 5000.0));
    }
}
