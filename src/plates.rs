// 🔁 Plate Lifecycle Manager
//
// The only code allowed to change a plate's status. Each transition is an
// in-place update of the stored row identified by its id; the owner
// reference and issuance date are never touched here.

use crate::db;
use crate::entities::{OwnerId, PlateId, PlateNumber, PlateStatus};
use crate::error::{Lookup, RegistryError, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use tracing::debug;

/// AVAILABLE → IN_USE
pub fn acquire(conn: &Connection, plate_id: PlateId, now: DateTime<Utc>) -> Result<PlateNumber> {
    transition(conn, plate_id, PlateStatus::InUse, now)
}

/// IN_USE → AVAILABLE
pub fn release(conn: &Connection, plate_id: PlateId, now: DateTime<Utc>) -> Result<PlateNumber> {
    transition(conn, plate_id, PlateStatus::Available, now)
}

/// Fails unless the plate was issued to `owner_id`
pub fn verify_ownership(plate: &PlateNumber, owner_id: OwnerId) -> Result<()> {
    if !plate.is_owned_by(owner_id) {
        return Err(RegistryError::PlateOwnerMismatch {
            plate: plate.plate_number.clone(),
            owner: owner_id,
        });
    }
    Ok(())
}

fn transition(
    conn: &Connection,
    plate_id: PlateId,
    target: PlateStatus,
    now: DateTime<Utc>,
) -> Result<PlateNumber> {
    let plate = db::get_plate(conn, plate_id)?
        .ok_or(RegistryError::PlateNotFound(Lookup::Id(plate_id.get())))?;

    if !plate.status.can_transition_to(target) {
        return Err(rejection(&plate.plate_number, plate.status, target));
    }

    // The guarded update re-checks the source state at write time
    if !db::set_plate_status(conn, plate_id, plate.status, target, now)? {
        let current = db::get_plate(conn, plate_id)?
            .map(|p| p.status)
            .unwrap_or(target);
        return Err(rejection(&plate.plate_number, current, target));
    }

    debug!(
        plate = %plate.plate_number,
        from = %plate.status,
        to = %target,
        "plate status changed"
    );

    Ok(PlateNumber {
        status: target,
        updated_at: now,
        ..plate
    })
}

fn rejection(plate: &str, status: PlateStatus, target: PlateStatus) -> RegistryError {
    match target {
        PlateStatus::InUse => RegistryError::PlateUnavailable {
            plate: plate.to_string(),
            status,
        },
        PlateStatus::Available => RegistryError::PlateNotInUse {
            plate: plate.to_string(),
            status,
        },
    }
}
