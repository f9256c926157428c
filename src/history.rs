// 📜 History Recorder
//
// Builds the immutable audit row for a transfer and derives its
// classification. The recorder does no business validation of its own: the
// transfer workflow resolves every reference first, so a missing mandatory
// reference here is a programming error, not a user error.

use crate::db;
use crate::entities::{
    NewOwnershipHistory, OwnerId, OwnershipHistory, PlateId, UserId, VehicleId,
};
use crate::error::{Lookup, RegistryError, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::error;

// ============================================================================
// TRANSFER CLASSIFICATION
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferType {
    OwnershipAndPlateTransfer,
    OwnershipTransfer,
    PlateNumberChange,
    RecordUpdate,
}

impl TransferType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferType::OwnershipAndPlateTransfer => "OWNERSHIP_AND_PLATE_TRANSFER",
            TransferType::OwnershipTransfer => "OWNERSHIP_TRANSFER",
            TransferType::PlateNumberChange => "PLATE_NUMBER_CHANGE",
            TransferType::RecordUpdate => "RECORD_UPDATE",
        }
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An absent previous plate counts as a plate change
pub fn is_plate_change(previous_plate: Option<PlateId>, new_plate: PlateId) -> bool {
    previous_plate != Some(new_plate)
}

pub fn classify(
    previous_owner: OwnerId,
    new_owner: OwnerId,
    previous_plate: Option<PlateId>,
    new_plate: PlateId,
) -> TransferType {
    let owner_changed = previous_owner != new_owner;
    let plate_changed = is_plate_change(previous_plate, new_plate);

    match (owner_changed, plate_changed) {
        (true, true) => TransferType::OwnershipAndPlateTransfer,
        (true, false) => TransferType::OwnershipTransfer,
        (false, true) => TransferType::PlateNumberChange,
        (false, false) => TransferType::RecordUpdate,
    }
}

impl OwnershipHistory {
    pub fn transfer_type(&self) -> TransferType {
        classify(
            self.previous_owner_id,
            self.new_owner_id,
            self.previous_plate_id,
            self.new_plate_id,
        )
    }
}

impl NewOwnershipHistory {
    pub fn transfer_type(&self) -> TransferType {
        classify(
            self.previous_owner_id,
            self.new_owner_id,
            self.previous_plate_id,
            self.new_plate_id,
        )
    }
}

// ============================================================================
// RECORDER
// ============================================================================

/// Collects the references of one transfer and turns them into a history row
#[derive(Debug, Clone, Default)]
pub struct HistoryRecorder {
    vehicle: Option<VehicleId>,
    previous_owner: Option<OwnerId>,
    new_owner: Option<OwnerId>,
    previous_plate: Option<PlateId>,
    new_plate: Option<PlateId>,
    transfer_price: f64,
    transfer_date: Option<DateTime<Utc>>,
    transferred_by: Option<UserId>,
}

impl HistoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vehicle(mut self, id: VehicleId) -> Self {
        self.vehicle = Some(id);
        self
    }

    pub fn previous_owner(mut self, id: OwnerId) -> Self {
        self.previous_owner = Some(id);
        self
    }

    pub fn new_owner(mut self, id: OwnerId) -> Self {
        self.new_owner = Some(id);
        self
    }

    /// Optional: left unset for rows that stand in for a first registration
    pub fn previous_plate(mut self, id: Option<PlateId>) -> Self {
        self.previous_plate = id;
        self
    }

    pub fn new_plate(mut self, id: PlateId) -> Self {
        self.new_plate = Some(id);
        self
    }

    pub fn price(mut self, amount: f64) -> Self {
        self.transfer_price = amount;
        self
    }

    pub fn at(mut self, when: DateTime<Utc>) -> Self {
        self.transfer_date = Some(when);
        self
    }

    pub fn transferred_by(mut self, id: UserId) -> Self {
        self.transferred_by = Some(id);
        self
    }

    /// Pure construction; fails only when a mandatory reference is missing
    pub fn build(self) -> Result<NewOwnershipHistory> {
        Ok(NewOwnershipHistory {
            entry_uuid: uuid::Uuid::new_v4().to_string(),
            vehicle_id: required("vehicle", self.vehicle)?,
            previous_owner_id: required("previous owner", self.previous_owner)?,
            new_owner_id: required("new owner", self.new_owner)?,
            previous_plate_id: self.previous_plate,
            new_plate_id: required("new plate", self.new_plate)?,
            transfer_price: self.transfer_price,
            transfer_date: required("transfer date", self.transfer_date)?,
            transferred_by: required("transferring user", self.transferred_by)?,
        })
    }

    /// Build and append the row
    pub fn record(self, conn: &Connection, now: DateTime<Utc>) -> Result<OwnershipHistory> {
        let entry = self.build()?;
        db::insert_history(conn, &entry, now)
    }
}

fn required<T>(what: &str, value: Option<T>) -> Result<T> {
    value.ok_or_else(|| {
        let message = format!("history entry is missing its {}", what);
        error!("{}", message);
        RegistryError::InvariantViolation(message)
    })
}

// ============================================================================
// HISTORY VIEW
// ============================================================================

/// One history row with its references resolved to display values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub entry_id: String,
    pub previous_owner: String,
    pub new_owner: String,
    /// "N/A" when the row has no previous plate
    pub previous_plate_number: String,
    pub new_plate_number: String,
    pub transfer_price: f64,
    pub transfer_date: DateTime<Utc>,
    pub transferred_by: String,
    pub transfer_type: TransferType,
}

pub const NO_PLATE: &str = "N/A";

/// History of one vehicle, newest first
pub fn entries_for_vehicle(conn: &Connection, vehicle_id: VehicleId) -> Result<Vec<HistoryEntry>> {
    if db::get_vehicle(conn, vehicle_id)?.is_none() {
        return Err(RegistryError::VehicleNotFound(Lookup::Id(vehicle_id.get())));
    }

    db::history_for_vehicle(conn, vehicle_id)?
        .into_iter()
        .map(|row| resolve_entry(conn, row))
        .collect()
}

fn resolve_entry(conn: &Connection, row: OwnershipHistory) -> Result<HistoryEntry> {
    let previous_owner = owner_names(conn, row.previous_owner_id)?;
    let new_owner = owner_names(conn, row.new_owner_id)?;
    let previous_plate_number = match row.previous_plate_id {
        Some(id) => plate_string(conn, id)?,
        None => NO_PLATE.to_string(),
    };
    let new_plate_number = plate_string(conn, row.new_plate_id)?;
    let transferred_by = db::get_user(conn, row.transferred_by)?
        .map(|u| u.email)
        .ok_or_else(|| dangling("user", row.transferred_by.get()))?;

    Ok(HistoryEntry {
        entry_id: row.entry_uuid.clone(),
        transfer_type: row.transfer_type(),
        previous_owner,
        new_owner,
        previous_plate_number,
        new_plate_number,
        transfer_price: row.transfer_price,
        transfer_date: row.transfer_date,
        transferred_by,
    })
}

fn owner_names(conn: &Connection, id: OwnerId) -> Result<String> {
    db::get_owner(conn, id)?
        .map(|o| o.names)
        .ok_or_else(|| dangling("owner", id.get()))
}

fn plate_string(conn: &Connection, id: PlateId) -> Result<String> {
    db::get_plate(conn, id)?
        .map(|p| p.plate_number)
        .ok_or_else(|| dangling("plate", id.get()))
}

fn dangling(what: &str, id: i64) -> RegistryError {
    let message = format!("history references missing {} {}", what, id);
    error!("{}", message);
    RegistryError::InvariantViolation(message)
}
