// Entity Models
//
// Each record has:
// - A store-assigned integer identity that NEVER changes
// - Natural keys (national id, plate string, chassis number, user email)
//   that are unique across all time
// - Foreign keys held as explicit ids, resolved with a store lookup at the
//   point of use

pub mod history;
pub mod owner;
pub mod plate;
pub mod user;
pub mod vehicle;

pub use history::{NewOwnershipHistory, OwnershipHistory};
pub use owner::{ContactUpdate, NewOwner, Owner};
pub use plate::{NewPlateNumber, ParsePlateStatusError, PlateNumber, PlateStatus};
pub use user::{NewUser, User};
pub use vehicle::{NewVehicle, Vehicle, VehicleSnapshot};

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// IDENTIFIERS
// ============================================================================

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                $name(value)
            }
        }
    };
}

entity_id!(
    /// Row id of an `owners` record
    OwnerId
);
entity_id!(
    /// Row id of a `plate_numbers` record
    PlateId
);
entity_id!(
    /// Row id of a `vehicles` record
    VehicleId
);
entity_id!(
    /// Row id of an `ownership_history` record
    HistoryId
);
entity_id!(
    /// Row id of a `users` record
    UserId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_plain_integers() {
        let json = serde_json::to_string(&VehicleId(42)).unwrap();
        assert_eq!(json, "42");

        let back: OwnerId = serde_json::from_str("7").unwrap();
        assert_eq!(back, OwnerId(7));
        assert_eq!(back.to_string(), "7");
    }
}
