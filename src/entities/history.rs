// 📜 Ownership History Entity
//
// One immutable row per transfer. Rows are appended and never updated or
// deleted; the store refuses both with triggers.

use super::{HistoryId, OwnerId, PlateId, UserId, VehicleId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnershipHistory {
    pub id: HistoryId,
    /// Stable audit identity, exported with history views
    pub entry_uuid: String,
    pub vehicle_id: VehicleId,
    pub previous_owner_id: OwnerId,
    pub new_owner_id: OwnerId,
    /// Absent only for rows that stand in for a first registration
    pub previous_plate_id: Option<PlateId>,
    pub new_plate_id: PlateId,
    pub transfer_price: f64,
    pub transfer_date: DateTime<Utc>,
    pub transferred_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// Fully resolved history row, not yet persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewOwnershipHistory {
    pub entry_uuid: String,
    pub vehicle_id: VehicleId,
    pub previous_owner_id: OwnerId,
    pub new_owner_id: OwnerId,
    pub previous_plate_id: Option<PlateId>,
    pub new_plate_id: PlateId,
    pub transfer_price: f64,
    pub transfer_date: DateTime<Utc>,
    pub transferred_by: UserId,
}
