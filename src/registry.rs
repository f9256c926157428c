// 🏛️ Registry - transactional entry point for every operation
//
// Writes run in a BEGIN IMMEDIATE transaction: the write lock is taken up
// front, so two writers touching the same plate are serialized and the
// second one re-reads committed state. Reads run in a deferred transaction
// so every lookup in one call sees a single snapshot.

use crate::clock::{Clock, SystemClock};
use crate::config::RegistryConfig;
use crate::db::{self, Event};
use crate::entities::{
    ContactUpdate, NewOwner, NewPlateNumber, NewUser, NewVehicle, Owner, OwnerId, PlateNumber,
    User, VehicleId, VehicleSnapshot,
};
use crate::error::{Lookup, RegistryError, Result};
use crate::history::{self, HistoryEntry};
use crate::integrity::{self, IntegrityReport};
use crate::lookup;
use crate::registration;
use crate::transfer::{self, TransferRequest};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use std::sync::Arc;
use tracing::{debug, error, warn};

pub struct Registry {
    conn: Connection,
    clock: Arc<dyn Clock>,
}

impl Registry {
    pub fn open(config: &RegistryConfig) -> Result<Self> {
        let conn = db::open_database(&config.database_path, config.busy_timeout)?;
        debug!(path = %config.database_path.display(), "registry database opened");
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        db::setup_database(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Registry {
            conn,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    // ========================================================================
    // TRANSACTION HELPERS
    // ========================================================================

    fn write<T, F>(&mut self, operation: &str, f: F) -> Result<T>
    where
        F: FnOnce(&Connection, DateTime<Utc>) -> Result<T>,
    {
        let now = db::stored_precision(self.clock.now());
        let tx = self.conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Dropping the transaction on error rolls every step back
        let result = f(&*tx, now).and_then(|value| {
            tx.commit()?;
            Ok(value)
        });
        if let Err(e) = &result {
            report(operation, e);
        }
        result
    }

    fn read<T, F>(&self, operation: &str, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let tx = self.conn.unchecked_transaction()?;
        let result = f(&*tx);
        if let Err(e) = &result {
            report(operation, e);
        }
        result
    }

    // ========================================================================
    // OWNERS
    // ========================================================================

    pub fn register_owner(&mut self, request: &NewOwner) -> Result<Owner> {
        self.write("register_owner", |conn, now| {
            registration::register_owner(conn, request, now)
        })
    }

    pub fn update_owner_contact(&mut self, owner_id: OwnerId, update: &ContactUpdate) -> Result<Owner> {
        self.write("update_owner_contact", |conn, now| {
            registration::update_owner_contact(conn, owner_id, update, now)
        })
    }

    pub fn get_owner(&self, owner_id: OwnerId) -> Result<Owner> {
        self.read("get_owner", |conn| {
            db::get_owner(conn, owner_id)?
                .ok_or(RegistryError::OwnerNotFound(Lookup::Id(owner_id.get())))
        })
    }

    pub fn list_owners(&self) -> Result<Vec<Owner>> {
        self.read("list_owners", db::list_owners)
    }

    /// Owners whose national id or phone contains `query`
    pub fn search_owners(&self, query: &str) -> Result<Vec<Owner>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(RegistryError::invalid("q", "search text is required"));
        }
        self.read("search_owners", |conn| db::search_owners(conn, query))
    }

    // ========================================================================
    // PLATES & USERS
    // ========================================================================

    pub fn register_plate_number(&mut self, owner_id: OwnerId, request: &NewPlateNumber) -> Result<PlateNumber> {
        self.write("register_plate_number", |conn, now| {
            registration::register_plate_number(conn, owner_id, request, now)
        })
    }

    pub fn owner_plate_numbers(&self, owner_id: OwnerId) -> Result<Vec<PlateNumber>> {
        self.read("owner_plate_numbers", |conn| lookup::owner_plate_numbers(conn, owner_id))
    }

    pub fn register_user(&mut self, request: &NewUser) -> Result<User> {
        self.write("register_user", |conn, now| {
            registration::register_user(conn, request, now)
        })
    }

    // ========================================================================
    // VEHICLES
    // ========================================================================

    pub fn register_vehicle(&mut self, request: &NewVehicle) -> Result<VehicleSnapshot> {
        self.write("register_vehicle", |conn, now| {
            registration::register_vehicle(conn, request, now)
        })
    }

    /// Move a vehicle to a new owner and plate, attributed to `acting_user_email`
    pub fn transfer_vehicle(
        &mut self,
        vehicle_id: VehicleId,
        request: &TransferRequest,
        acting_user_email: &str,
    ) -> Result<VehicleSnapshot> {
        self.write("transfer_vehicle", |conn, now| {
            transfer::transfer_vehicle(conn, vehicle_id, request, acting_user_email, now)
        })
    }

    pub fn get_vehicle_by_id(&self, vehicle_id: VehicleId) -> Result<VehicleSnapshot> {
        self.read("get_vehicle_by_id", |conn| lookup::get_vehicle_by_id(conn, vehicle_id))
    }

    pub fn find_by_chassis_number(&self, chassis: &str) -> Result<Option<VehicleSnapshot>> {
        self.read("find_by_chassis_number", |conn| lookup::find_by_chassis_number(conn, chassis))
    }

    pub fn find_by_plate_number(&self, plate_number: &str) -> Result<Option<VehicleSnapshot>> {
        self.read("find_by_plate_number", |conn| lookup::find_by_plate_number(conn, plate_number))
    }

    pub fn find_by_owner_national_id(&self, national_id: &str) -> Result<Vec<VehicleSnapshot>> {
        self.read("find_by_owner_national_id", |conn| {
            lookup::find_by_owner_national_id(conn, national_id)
        })
    }

    /// Newest first
    pub fn get_ownership_history(&self, vehicle_id: VehicleId) -> Result<Vec<HistoryEntry>> {
        self.read("get_ownership_history", |conn| {
            history::entries_for_vehicle(conn, vehicle_id)
        })
    }

    // ========================================================================
    // AUDIT
    // ========================================================================

    pub fn audit_integrity(&self) -> Result<IntegrityReport> {
        self.read("audit_integrity", integrity::audit)
    }

    pub fn events_for(&self, entity_type: &str, entity_id: &str) -> Result<Vec<Event>> {
        self.read("events_for", |conn| {
            db::get_events_for_entity(conn, entity_type, entity_id)
        })
    }
}

fn report(operation: &str, err: &RegistryError) {
    if err.is_client_error() {
        warn!(operation, kind = ?err.kind(), "rejected: {}", err);
    } else {
        error!(operation, "failed: {}", err);
    }
}
