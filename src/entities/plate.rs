// 🔢 Plate Number Entity
//
// A plate string is issued once and never reused. The plate belongs to one
// owner and flips between two states for its whole life:
//
//   AVAILABLE ──acquire──▶ IN_USE
//   IN_USE    ──release──▶ AVAILABLE

use super::{OwnerId, PlateId};
use crate::entities::owner::require_text;
use crate::error::RegistryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// PLATE STATUS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlateStatus {
    /// Not bound to any vehicle
    Available,

    /// Current plate of exactly one vehicle
    InUse,
}

impl PlateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlateStatus::Available => "AVAILABLE",
            PlateStatus::InUse => "IN_USE",
        }
    }

    /// The only state reachable from this one
    pub fn next(&self) -> PlateStatus {
        match self {
            PlateStatus::Available => PlateStatus::InUse,
            PlateStatus::InUse => PlateStatus::Available,
        }
    }

    pub fn can_transition_to(&self, target: PlateStatus) -> bool {
        self.next() == target
    }
}

impl fmt::Display for PlateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown plate status: {0}")]
pub struct ParsePlateStatusError(pub String);

impl FromStr for PlateStatus {
    type Err = ParsePlateStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(PlateStatus::Available),
            "IN_USE" => Ok(PlateStatus::InUse),
            other => Err(ParsePlateStatusError(other.to_string())),
        }
    }
}

// ============================================================================
// PLATE NUMBER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlateNumber {
    pub id: PlateId,
    /// Natural key, globally unique
    pub plate_number: String,
    /// Owner the plate was issued to (a reference, not ownership)
    pub owner_id: OwnerId,
    pub status: PlateStatus,
    pub issued_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PlateNumber {
    pub fn is_available(&self) -> bool {
        self.status == PlateStatus::Available
    }

    pub fn is_owned_by(&self, owner_id: OwnerId) -> bool {
        self.owner_id == owner_id
    }
}

/// Issuance request for a new plate
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPlateNumber {
    pub plate_number: String,
    /// Defaults to now when absent
    #[serde(default)]
    pub issued_date: Option<DateTime<Utc>>,
}

impl NewPlateNumber {
    pub fn new(plate_number: &str) -> Self {
        NewPlateNumber {
            plate_number: plate_number.to_string(),
            issued_date: None,
        }
    }

    pub fn validate(&self) -> Result<(), RegistryError> {
        require_text("plateNumber", &self.plate_number)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_binary() {
        assert_eq!(PlateStatus::Available.next(), PlateStatus::InUse);
        assert_eq!(PlateStatus::InUse.next(), PlateStatus::Available);

        assert!(PlateStatus::Available.can_transition_to(PlateStatus::InUse));
        assert!(!PlateStatus::Available.can_transition_to(PlateStatus::Available));
        assert!(!PlateStatus::InUse.can_transition_to(PlateStatus::InUse));
    }

    #[test]
    fn test_status_text_form() {
        for status in [PlateStatus::Available, PlateStatus::InUse] {
            assert_eq!(status.as_str().parse::<PlateStatus>().unwrap(), status);
        }

        let err = "RETIRED".parse::<PlateStatus>().unwrap_err();
        assert_eq!(err.0, "RETIRED");

        let json = serde_json::to_string(&PlateStatus::InUse).unwrap();
        assert_eq!(json, "\"IN_USE\"");
    }

    #[test]
    fn test_blank_plate_rejected() {
        assert!(NewPlateNumber::new("RAA111A").validate().is_ok());
        assert!(NewPlateNumber::new("").validate().is_err());
    }
}
