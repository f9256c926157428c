// Vehicle Registry - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod clock;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod history;        // History Recorder + transfer classification
pub mod integrity;      // Store-wide invariant audit
pub mod lookup;
pub mod plates;         // Plate Lifecycle Manager
pub mod registration;   // Registration Workflow
pub mod registry;
pub mod transfer;       // Transfer Workflow

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::RegistryConfig;
pub use db::{open_database, setup_database, Event};
pub use entities::{
    ContactUpdate, HistoryId, NewOwner, NewOwnershipHistory, NewPlateNumber, NewUser, NewVehicle,
    Owner, OwnerId, OwnershipHistory, PlateId, PlateNumber, PlateStatus, User, UserId, Vehicle,
    VehicleId, VehicleSnapshot,
};
pub use error::{ErrorKind, Lookup, RegistryError, Result};
pub use history::{classify, HistoryEntry, HistoryRecorder, TransferType};
pub use integrity::{Breach, BreachKind, IntegrityReport};
pub use registry::Registry;
pub use transfer::TransferRequest;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
