// ✅ Integrity Audit
//
// Re-checks the cross-record invariants over the whole store:
//   - an IN_USE plate is the current plate of exactly one vehicle
//   - a vehicle's current plate is IN_USE
//   - a vehicle's current plate belongs to the vehicle's current owner
//
// Read-only: breaches are reported, never repaired.

use crate::db;
use crate::entities::{PlateId, PlateStatus, VehicleId};
use crate::error::Result;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreachKind {
    /// IN_USE plate with no vehicle bearing it
    OrphanedPlate,
    /// Plate borne by more than one vehicle
    SharedPlate,
    /// Vehicle bearing a plate that is not IN_USE
    IdlePlateOnVehicle,
    /// Vehicle bearing a plate issued to someone else
    OwnerMismatch,
    /// Vehicle referencing a plate that does not exist
    MissingPlate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breach {
    pub kind: BreachKind,
    pub plate_id: Option<PlateId>,
    pub vehicle_id: Option<VehicleId>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub vehicles_checked: usize,
    pub plates_checked: usize,
    pub breaches: Vec<Breach>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.breaches.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "Checked {} vehicles, {} plates: {} breaches",
            self.vehicles_checked,
            self.plates_checked,
            self.breaches.len()
        )
    }

    fn push(&mut self, kind: BreachKind, plate_id: Option<PlateId>, vehicle_id: Option<VehicleId>, message: String) {
        self.breaches.push(Breach {
            kind,
            plate_id,
            vehicle_id,
            message,
        });
    }
}

pub fn audit(conn: &Connection) -> Result<IntegrityReport> {
    let plates = db::all_plates(conn)?;
    let vehicles = db::all_vehicles(conn)?;

    let mut report = IntegrityReport {
        vehicles_checked: vehicles.len(),
        plates_checked: plates.len(),
        breaches: Vec::new(),
    };

    let by_id: HashMap<PlateId, _> = plates.iter().map(|p| (p.id, p)).collect();
    let mut bearers: HashMap<PlateId, Vec<VehicleId>> = HashMap::new();

    for vehicle in &vehicles {
        bearers.entry(vehicle.current_plate_id).or_default().push(vehicle.id);

        let Some(plate) = by_id.get(&vehicle.current_plate_id) else {
            report.push(
                BreachKind::MissingPlate,
                Some(vehicle.current_plate_id),
                Some(vehicle.id),
                format!("vehicle {} references missing plate {}", vehicle.chassis_number, vehicle.current_plate_id),
            );
            continue;
        };

        if plate.status != PlateStatus::InUse {
            report.push(
                BreachKind::IdlePlateOnVehicle,
                Some(plate.id),
                Some(vehicle.id),
                format!("vehicle {} bears plate {} with status {}", vehicle.chassis_number, plate.plate_number, plate.status),
            );
        }

        if plate.owner_id != vehicle.current_owner_id {
            report.push(
                BreachKind::OwnerMismatch,
                Some(plate.id),
                Some(vehicle.id),
                format!(
                    "vehicle {} is owned by {} but plate {} belongs to {}",
                    vehicle.chassis_number, vehicle.current_owner_id, plate.plate_number, plate.owner_id
                ),
            );
        }
    }

    for plate in plates.iter().filter(|p| p.status == PlateStatus::InUse) {
        match bearers.get(&plate.id).map(Vec::len).unwrap_or(0) {
            1 => {}
            0 => report.push(
                BreachKind::OrphanedPlate,
                Some(plate.id),
                None,
                format!("plate {} is IN_USE but no vehicle bears it", plate.plate_number),
            ),
            n => report.push(
                BreachKind::SharedPlate,
                Some(plate.id),
                None,
                format!("plate {} is borne by {} vehicles", plate.plate_number, n),
            ),
        }
    }

    for breach in &report.breaches {
        warn!(kind = ?breach.kind, "{}", breach.message);
    }

    Ok(report)
}
