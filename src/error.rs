use crate::entities::{OwnerId, PlateStatus};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// How a record was looked up when it could not be found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Id(i64),
    Key(String),
}

impl fmt::Display for Lookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lookup::Id(id) => write!(f, "id {}", id),
            Lookup::Key(key) => write!(f, "'{}'", key),
        }
    }
}

/// Error family, used by callers to decide how to surface a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// A referenced record does not exist
    NotFound,
    /// Current state violates a precondition; safe to retry after re-reading
    Conflict,
    /// Malformed input, rejected before touching the store
    InvalidInput,
    /// Storage failure or broken internal consistency
    Internal,
}

#[derive(Error, Debug)]
pub enum RegistryError {
    // ------------------------------------------------------------------------
    // Not found
    // ------------------------------------------------------------------------
    #[error("Owner not found: {0}")]
    OwnerNotFound(Lookup),

    #[error("Plate number not found: {0}")]
    PlateNotFound(Lookup),

    #[error("Vehicle not found: {0}")]
    VehicleNotFound(Lookup),

    #[error("User not found: {0}")]
    UserNotFound(String),

    // ------------------------------------------------------------------------
    // Conflict
    // ------------------------------------------------------------------------
    #[error("Vehicle with chassis number {0} already exists")]
    DuplicateChassisNumber(String),

    #[error("Owner with national ID {0} already exists")]
    DuplicateNationalId(String),

    #[error("Plate number {0} already exists")]
    DuplicatePlateNumber(String),

    #[error("User with email {0} already exists")]
    DuplicateUserEmail(String),

    #[error("Plate number {plate} is not available (status {status})")]
    PlateUnavailable { plate: String, status: PlateStatus },

    #[error("Plate number {plate} is not in use (status {status})")]
    PlateNotInUse { plate: String, status: PlateStatus },

    #[error("Plate number {plate} does not belong to owner {owner}")]
    PlateOwnerMismatch { plate: String, owner: OwnerId },

    // ------------------------------------------------------------------------
    // Invalid input
    // ------------------------------------------------------------------------
    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    // ------------------------------------------------------------------------
    // Internal
    // ------------------------------------------------------------------------
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Event payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl RegistryError {
    pub fn invalid(field: &'static str, reason: &str) -> Self {
        RegistryError::InvalidInput {
            field,
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            RegistryError::OwnerNotFound(_)
            | RegistryError::PlateNotFound(_)
            | RegistryError::VehicleNotFound(_)
            | RegistryError::UserNotFound(_) => ErrorKind::NotFound,

            RegistryError::DuplicateChassisNumber(_)
            | RegistryError::DuplicateNationalId(_)
            | RegistryError::DuplicatePlateNumber(_)
            | RegistryError::DuplicateUserEmail(_)
            | RegistryError::PlateUnavailable { .. }
            | RegistryError::PlateNotInUse { .. }
            | RegistryError::PlateOwnerMismatch { .. } => ErrorKind::Conflict,

            RegistryError::InvalidInput { .. } => ErrorKind::InvalidInput,

            RegistryError::InvariantViolation(_)
            | RegistryError::Storage(_)
            | RegistryError::Payload(_) => ErrorKind::Internal,
        }
    }

    /// True for errors caused by the caller's request rather than the system
    pub fn is_client_error(&self) -> bool {
        self.kind() != ErrorKind::Internal
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_families() {
        assert_eq!(
            RegistryError::OwnerNotFound(Lookup::Id(3)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            RegistryError::UserNotFound("clerk@registry.rw".into()).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            RegistryError::PlateUnavailable {
                plate: "RAA111A".into(),
                status: PlateStatus::InUse,
            }
            .kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            RegistryError::invalid("transferPrice", "must be a positive amount").kind(),
            ErrorKind::InvalidInput
        );

        let internal = RegistryError::InvariantViolation("vehicle has no plate".into());
        assert_eq!(internal.kind(), ErrorKind::Internal);
        assert!(!internal.is_client_error());

        let payload: RegistryError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert_eq!(payload.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_messages_name_the_record() {
        let err = RegistryError::PlateNotFound(Lookup::Key("RAB222B".into()));
        assert_eq!(err.to_string(), "Plate number not found: 'RAB222B'");

        let err = RegistryError::VehicleNotFound(Lookup::Id(9));
        assert_eq!(err.to_string(), "Vehicle not found: id 9");
    }
}
