// 🗄️ Entity Store - SQLite persistence for owners, plates, vehicles, history
//
// Every function takes a plain `&Connection`. A `rusqlite::Transaction`
// derefs to one, so the workflows run all of these inside a single
// transaction opened by the Registry.

use crate::entities::{
    ContactUpdate, HistoryId, NewOwner, NewOwnershipHistory, NewPlateNumber, NewUser, NewVehicle,
    Owner, OwnerId, OwnershipHistory, PlateId, PlateNumber, PlateStatus, User, UserId, Vehicle,
    VehicleId,
};
use crate::error::{Lookup, RegistryError, Result};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

// ============================================================================
// AUDIT EVENTS
// ============================================================================

/// Event for audit trail: every committed change is recorded next to the data
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Actor recorded for changes that are not attributed to a user
pub const SYSTEM_ACTOR: &str = "registry";

// ============================================================================
// SETUP
// ============================================================================

/// Open (or create) the database file and make sure the schema exists
pub fn open_database(path: &Path, busy_timeout: Duration) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(busy_timeout)?;
    setup_database(&conn)?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery and concurrent readers
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Owners
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS owners (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            names TEXT NOT NULL,
            national_id TEXT UNIQUE NOT NULL,
            email TEXT,
            phone TEXT NOT NULL,
            address TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Plate numbers (binary status machine)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS plate_numbers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            plate_number TEXT UNIQUE NOT NULL,
            owner_id INTEGER NOT NULL REFERENCES owners(id),
            status TEXT NOT NULL CHECK (status IN ('AVAILABLE', 'IN_USE')),
            issued_date TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Vehicles (one vehicle per plate at any instant)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS vehicles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            chassis_number TEXT UNIQUE NOT NULL,
            manufacture_company TEXT NOT NULL,
            manufacture_year INTEGER NOT NULL,
            model_name TEXT NOT NULL,
            current_price REAL NOT NULL,
            current_owner_id INTEGER NOT NULL REFERENCES owners(id),
            current_plate_id INTEGER UNIQUE NOT NULL REFERENCES plate_numbers(id),
            registration_date TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Users (acting clerks for transfer attribution)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            names TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            role TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Ownership history (append-only)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS ownership_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            entry_uuid TEXT UNIQUE NOT NULL,
            vehicle_id INTEGER NOT NULL REFERENCES vehicles(id),
            previous_owner_id INTEGER NOT NULL REFERENCES owners(id),
            new_owner_id INTEGER NOT NULL REFERENCES owners(id),
            previous_plate_id INTEGER REFERENCES plate_numbers(id),
            new_plate_id INTEGER NOT NULL REFERENCES plate_numbers(id),
            transfer_price REAL NOT NULL CHECK (transfer_price > 0),
            transfer_date TEXT NOT NULL,
            transferred_by INTEGER NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute_batch(
        "CREATE TRIGGER IF NOT EXISTS ownership_history_no_update
         BEFORE UPDATE ON ownership_history
         BEGIN
             SELECT RAISE(ABORT, 'ownership history is append-only');
         END;

         CREATE TRIGGER IF NOT EXISTS ownership_history_no_delete
         BEFORE DELETE ON ownership_history
         BEGIN
             SELECT RAISE(ABORT, 'ownership history is append-only');
         END;",
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_plates_owner ON plate_numbers(owner_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_vehicles_owner ON vehicles(current_owner_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_history_vehicle ON ownership_history(vehicle_id, transfer_date)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ROW HELPERS
// ============================================================================

/// Fixed-width RFC3339 so text order == time order
pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Drop sub-microsecond digits so a value compares equal to its stored form
pub fn stored_precision(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.trunc_subsecs(6)
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn status_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<PlateStatus> {
    let raw: String = row.get(idx)?;
    raw.parse::<PlateStatus>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// UNIQUE constraint failure, with the SQLite message when present
fn unique_violation(err: &rusqlite::Error) -> Option<&str> {
    match err {
        rusqlite::Error::SqliteFailure(e, msg)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            Some(msg.as_deref().unwrap_or(""))
        }
        _ => None,
    }
}

const OWNER_COLUMNS: &str = "id, names, national_id, email, phone, address, created_at, updated_at";

fn owner_from_row(row: &Row<'_>) -> rusqlite::Result<Owner> {
    Ok(Owner {
        id: OwnerId(row.get(0)?),
        names: row.get(1)?,
        national_id: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        address: row.get(5)?,
        created_at: timestamp_at(row, 6)?,
        updated_at: timestamp_at(row, 7)?,
    })
}

const PLATE_COLUMNS: &str =
    "id, plate_number, owner_id, status, issued_date, created_at, updated_at";

fn plate_from_row(row: &Row<'_>) -> rusqlite::Result<PlateNumber> {
    Ok(PlateNumber {
        id: PlateId(row.get(0)?),
        plate_number: row.get(1)?,
        owner_id: OwnerId(row.get(2)?),
        status: status_at(row, 3)?,
        issued_date: timestamp_at(row, 4)?,
        created_at: timestamp_at(row, 5)?,
        updated_at: timestamp_at(row, 6)?,
    })
}

const VEHICLE_COLUMNS: &str = "id, chassis_number, manufacture_company, manufacture_year, model_name,
     current_price, current_owner_id, current_plate_id, registration_date, created_at, updated_at";

fn vehicle_from_row(row: &Row<'_>) -> rusqlite::Result<Vehicle> {
    Ok(Vehicle {
        id: VehicleId(row.get(0)?),
        chassis_number: row.get(1)?,
        manufacture_company: row.get(2)?,
        manufacture_year: row.get(3)?,
        model_name: row.get(4)?,
        current_price: row.get(5)?,
        current_owner_id: OwnerId(row.get(6)?),
        current_plate_id: PlateId(row.get(7)?),
        registration_date: timestamp_at(row, 8)?,
        created_at: timestamp_at(row, 9)?,
        updated_at: timestamp_at(row, 10)?,
    })
}

const HISTORY_COLUMNS: &str = "id, entry_uuid, vehicle_id, previous_owner_id, new_owner_id,
     previous_plate_id, new_plate_id, transfer_price, transfer_date, transferred_by, created_at";

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<OwnershipHistory> {
    let previous_plate: Option<i64> = row.get(5)?;
    Ok(OwnershipHistory {
        id: HistoryId(row.get(0)?),
        entry_uuid: row.get(1)?,
        vehicle_id: VehicleId(row.get(2)?),
        previous_owner_id: OwnerId(row.get(3)?),
        new_owner_id: OwnerId(row.get(4)?),
        previous_plate_id: previous_plate.map(PlateId),
        new_plate_id: PlateId(row.get(6)?),
        transfer_price: row.get(7)?,
        transfer_date: timestamp_at(row, 8)?,
        transferred_by: UserId(row.get(9)?),
        created_at: timestamp_at(row, 10)?,
    })
}

const USER_COLUMNS: &str = "id, names, email, role, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: UserId(row.get(0)?),
        names: row.get(1)?,
        email: row.get(2)?,
        role: row.get(3)?,
        created_at: timestamp_at(row, 4)?,
    })
}

// ============================================================================
// OWNERS
// ============================================================================

pub fn insert_owner(conn: &Connection, owner: &NewOwner, now: DateTime<Utc>) -> Result<Owner> {
    let now_str = format_timestamp(&now);
    let result = conn.execute(
        "INSERT INTO owners (names, national_id, email, phone, address, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            owner.names,
            owner.national_id,
            owner.email,
            owner.phone,
            owner.address,
            now_str,
        ],
    );

    match result {
        Ok(_) => Ok(Owner {
            id: OwnerId(conn.last_insert_rowid()),
            names: owner.names.clone(),
            national_id: owner.national_id.clone(),
            email: owner.email.clone(),
            phone: owner.phone.clone(),
            address: owner.address.clone(),
            created_at: now,
            updated_at: now,
        }),
        Err(e) if unique_violation(&e).is_some() => {
            Err(RegistryError::DuplicateNationalId(owner.national_id.clone()))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get_owner(conn: &Connection, id: OwnerId) -> Result<Option<Owner>> {
    let sql = format!("SELECT {} FROM owners WHERE id = ?1", OWNER_COLUMNS);
    Ok(conn.query_row(&sql, [id.get()], owner_from_row).optional()?)
}

pub fn find_owner_by_national_id(conn: &Connection, national_id: &str) -> Result<Option<Owner>> {
    let sql = format!("SELECT {} FROM owners WHERE national_id = ?1", OWNER_COLUMNS);
    Ok(conn
        .query_row(&sql, [national_id], owner_from_row)
        .optional()?)
}

pub fn national_id_exists(conn: &Connection, national_id: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM owners WHERE national_id = ?1)",
        [national_id],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn list_owners(conn: &Connection) -> Result<Vec<Owner>> {
    let sql = format!("SELECT {} FROM owners ORDER BY id", OWNER_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let owners = stmt
        .query_map([], owner_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(owners)
}

/// Owners whose national id or phone contains `query`
pub fn search_owners(conn: &Connection, query: &str) -> Result<Vec<Owner>> {
    let sql = format!(
        "SELECT {} FROM owners
         WHERE instr(national_id, ?1) > 0 OR instr(phone, ?1) > 0
         ORDER BY id",
        OWNER_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let owners = stmt
        .query_map([query], owner_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(owners)
}

/// Overwrite the mutable contact fields of an owner
pub fn update_owner_contact(
    conn: &Connection,
    id: OwnerId,
    update: &ContactUpdate,
    now: DateTime<Utc>,
) -> Result<Owner> {
    let mut owner = get_owner(conn, id)?.ok_or(RegistryError::OwnerNotFound(Lookup::Id(id.get())))?;
    update.apply(&mut owner, now);

    conn.execute(
        "UPDATE owners SET phone = ?1, address = ?2, email = ?3, updated_at = ?4 WHERE id = ?5",
        params![
            owner.phone,
            owner.address,
            owner.email,
            format_timestamp(&owner.updated_at),
            id.get(),
        ],
    )?;

    Ok(owner)
}

// ============================================================================
// PLATE NUMBERS
// ============================================================================

/// Issue a plate to an owner; new plates always start AVAILABLE
pub fn insert_plate(
    conn: &Connection,
    owner_id: OwnerId,
    plate: &NewPlateNumber,
    now: DateTime<Utc>,
) -> Result<PlateNumber> {
    let issued_date = stored_precision(plate.issued_date.unwrap_or(now));
    let status = PlateStatus::Available;
    let now_str = format_timestamp(&now);

    let result = conn.execute(
        "INSERT INTO plate_numbers (plate_number, owner_id, status, issued_date, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        params![
            plate.plate_number,
            owner_id.get(),
            status.as_str(),
            format_timestamp(&issued_date),
            now_str,
        ],
    );

    match result {
        Ok(_) => Ok(PlateNumber {
            id: PlateId(conn.last_insert_rowid()),
            plate_number: plate.plate_number.clone(),
            owner_id,
            status,
            issued_date,
            created_at: now,
            updated_at: now,
        }),
        Err(e) if unique_violation(&e).is_some() => {
            Err(RegistryError::DuplicatePlateNumber(plate.plate_number.clone()))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get_plate(conn: &Connection, id: PlateId) -> Result<Option<PlateNumber>> {
    let sql = format!("SELECT {} FROM plate_numbers WHERE id = ?1", PLATE_COLUMNS);
    Ok(conn.query_row(&sql, [id.get()], plate_from_row).optional()?)
}

pub fn find_plate_by_number(conn: &Connection, plate_number: &str) -> Result<Option<PlateNumber>> {
    let sql = format!(
        "SELECT {} FROM plate_numbers WHERE plate_number = ?1",
        PLATE_COLUMNS
    );
    Ok(conn
        .query_row(&sql, [plate_number], plate_from_row)
        .optional()?)
}

pub fn plate_number_exists(conn: &Connection, plate_number: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM plate_numbers WHERE plate_number = ?1)",
        [plate_number],
        |row| row.get(0),
    )?;
    Ok(exists)
}

pub fn plates_for_owner(conn: &Connection, owner_id: OwnerId) -> Result<Vec<PlateNumber>> {
    let sql = format!(
        "SELECT {} FROM plate_numbers WHERE owner_id = ?1 ORDER BY id",
        PLATE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let plates = stmt
        .query_map([owner_id.get()], plate_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(plates)
}

pub fn all_plates(conn: &Connection) -> Result<Vec<PlateNumber>> {
    let sql = format!("SELECT {} FROM plate_numbers ORDER BY id", PLATE_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let plates = stmt
        .query_map([], plate_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(plates)
}

/// Guarded in-place status flip.
///
/// Returns false when the row was not in `from` at write time, which means
/// another transaction changed it first.
pub fn set_plate_status(
    conn: &Connection,
    id: PlateId,
    from: PlateStatus,
    to: PlateStatus,
    now: DateTime<Utc>,
) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE plate_numbers SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![to.as_str(), format_timestamp(&now), id.get(), from.as_str()],
    )?;
    Ok(changed == 1)
}

// ============================================================================
// VEHICLES
// ============================================================================

pub fn insert_vehicle(
    conn: &Connection,
    vehicle: &NewVehicle,
    registration_date: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<Vehicle> {
    let registration_date = stored_precision(registration_date);
    let now_str = format_timestamp(&now);
    let result = conn.execute(
        "INSERT INTO vehicles (
            chassis_number, manufacture_company, manufacture_year, model_name,
            current_price, current_owner_id, current_plate_id, registration_date,
            created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
        params![
            vehicle.chassis_number,
            vehicle.manufacture_company,
            vehicle.manufacture_year,
            vehicle.model_name,
            vehicle.price,
            vehicle.owner_id.get(),
            vehicle.plate_number_id.get(),
            format_timestamp(&registration_date),
            now_str,
        ],
    );

    match result {
        Ok(_) => Ok(Vehicle {
            id: VehicleId(conn.last_insert_rowid()),
            chassis_number: vehicle.chassis_number.clone(),
            manufacture_company: vehicle.manufacture_company.clone(),
            manufacture_year: vehicle.manufacture_year,
            model_name: vehicle.model_name.clone(),
            registration_date,
            current_price: vehicle.price,
            current_owner_id: vehicle.owner_id,
            current_plate_id: vehicle.plate_number_id,
            created_at: now,
            updated_at: now,
        }),
        Err(e) => match unique_violation(&e) {
            Some(msg) if msg.contains("chassis_number") => Err(
                RegistryError::DuplicateChassisNumber(vehicle.chassis_number.clone()),
            ),
            Some(_) => Err(RegistryError::InvariantViolation(format!(
                "plate {} is already the current plate of another vehicle",
                vehicle.plate_number_id
            ))),
            None => Err(e.into()),
        },
    }
}

pub fn get_vehicle(conn: &Connection, id: VehicleId) -> Result<Option<Vehicle>> {
    let sql = format!("SELECT {} FROM vehicles WHERE id = ?1", VEHICLE_COLUMNS);
    Ok(conn.query_row(&sql, [id.get()], vehicle_from_row).optional()?)
}

pub fn find_vehicle_by_chassis(conn: &Connection, chassis_number: &str) -> Result<Option<Vehicle>> {
    let sql = format!(
        "SELECT {} FROM vehicles WHERE chassis_number = ?1",
        VEHICLE_COLUMNS
    );
    Ok(conn
        .query_row(&sql, [chassis_number], vehicle_from_row)
        .optional()?)
}

pub fn chassis_number_exists(conn: &Connection, chassis_number: &str) -> Result<bool> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM vehicles WHERE chassis_number = ?1)",
        [chassis_number],
        |row| row.get(0),
    )?;
    Ok(exists)
}

/// Vehicle whose current plate is the given plate
pub fn find_vehicle_by_plate(conn: &Connection, plate_id: PlateId) -> Result<Option<Vehicle>> {
    let sql = format!(
        "SELECT {} FROM vehicles WHERE current_plate_id = ?1",
        VEHICLE_COLUMNS
    );
    Ok(conn
        .query_row(&sql, [plate_id.get()], vehicle_from_row)
        .optional()?)
}

pub fn vehicles_for_owner(conn: &Connection, owner_id: OwnerId) -> Result<Vec<Vehicle>> {
    let sql = format!(
        "SELECT {} FROM vehicles WHERE current_owner_id = ?1 ORDER BY id",
        VEHICLE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let vehicles = stmt
        .query_map([owner_id.get()], vehicle_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(vehicles)
}

pub fn all_vehicles(conn: &Connection) -> Result<Vec<Vehicle>> {
    let sql = format!("SELECT {} FROM vehicles ORDER BY id", VEHICLE_COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let vehicles = stmt
        .query_map([], vehicle_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(vehicles)
}

/// Move a vehicle onto a new owner, plate and price.
/// Chassis, manufacture attributes and registration date are not touched.
pub fn update_vehicle_binding(
    conn: &Connection,
    id: VehicleId,
    owner_id: OwnerId,
    plate_id: PlateId,
    price: f64,
    now: DateTime<Utc>,
) -> Result<()> {
    let result = conn.execute(
        "UPDATE vehicles
         SET current_owner_id = ?1, current_plate_id = ?2, current_price = ?3, updated_at = ?4
         WHERE id = ?5",
        params![
            owner_id.get(),
            plate_id.get(),
            price,
            format_timestamp(&now),
            id.get(),
        ],
    );

    match result {
        Ok(1) => Ok(()),
        Ok(_) => Err(RegistryError::VehicleNotFound(Lookup::Id(id.get()))),
        Err(e) if unique_violation(&e).is_some() => Err(RegistryError::InvariantViolation(
            format!("plate {} is already the current plate of another vehicle", plate_id),
        )),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// OWNERSHIP HISTORY
// ============================================================================

pub fn insert_history(
    conn: &Connection,
    entry: &NewOwnershipHistory,
    now: DateTime<Utc>,
) -> Result<OwnershipHistory> {
    conn.execute(
        "INSERT INTO ownership_history (
            entry_uuid, vehicle_id, previous_owner_id, new_owner_id,
            previous_plate_id, new_plate_id, transfer_price, transfer_date,
            transferred_by, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            entry.entry_uuid,
            entry.vehicle_id.get(),
            entry.previous_owner_id.get(),
            entry.new_owner_id.get(),
            entry.previous_plate_id.map(PlateId::get),
            entry.new_plate_id.get(),
            entry.transfer_price,
            format_timestamp(&entry.transfer_date),
            entry.transferred_by.get(),
            format_timestamp(&now),
        ],
    )?;

    Ok(OwnershipHistory {
        id: HistoryId(conn.last_insert_rowid()),
        entry_uuid: entry.entry_uuid.clone(),
        vehicle_id: entry.vehicle_id,
        previous_owner_id: entry.previous_owner_id,
        new_owner_id: entry.new_owner_id,
        previous_plate_id: entry.previous_plate_id,
        new_plate_id: entry.new_plate_id,
        transfer_price: entry.transfer_price,
        transfer_date: entry.transfer_date,
        transferred_by: entry.transferred_by,
        created_at: now,
    })
}

/// History rows of one vehicle, newest first
pub fn history_for_vehicle(conn: &Connection, vehicle_id: VehicleId) -> Result<Vec<OwnershipHistory>> {
    let sql = format!(
        "SELECT {} FROM ownership_history
         WHERE vehicle_id = ?1
         ORDER BY transfer_date DESC, id DESC",
        HISTORY_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([vehicle_id.get()], history_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

// ============================================================================
// USERS
// ============================================================================

pub fn insert_user(conn: &Connection, user: &NewUser, now: DateTime<Utc>) -> Result<User> {
    let result = conn.execute(
        "INSERT INTO users (names, email, role, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![user.names, user.email, user.role, format_timestamp(&now)],
    );

    match result {
        Ok(_) => Ok(User {
            id: UserId(conn.last_insert_rowid()),
            names: user.names.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            created_at: now,
        }),
        Err(e) if unique_violation(&e).is_some() => {
            Err(RegistryError::DuplicateUserEmail(user.email.clone()))
        }
        Err(e) => Err(e.into()),
    }
}

pub fn get_user(conn: &Connection, id: UserId) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS);
    Ok(conn.query_row(&sql, [id.get()], user_from_row).optional()?)
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS);
    Ok(conn.query_row(&sql, [email], user_from_row).optional()?)
}

// ============================================================================
// EVENTS
// ============================================================================

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)
        .map_err(|e| RegistryError::InvariantViolation(format!("unserializable event data: {}", e)))?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            format_timestamp(&event.timestamp),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: timestamp_at(row, 1)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: serde_json::from_str(&data_json).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e))
                })?,
                actor: row.get(6)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap()
    }

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_setup_is_idempotent() {
        let conn = setup();
        setup_database(&conn).unwrap();
    }

    #[test]
    fn test_owner_roundtrip_and_duplicate_national_id() {
        let conn = setup();
        let owner = insert_owner(&conn, &NewOwner::new("Alice", "NID-1", "0788", "Kigali"), t0()).unwrap();

        let loaded = get_owner(&conn, owner.id).unwrap().unwrap();
        assert_eq!(loaded, owner);
        assert!(national_id_exists(&conn, "NID-1").unwrap());
        assert!(!national_id_exists(&conn, "NID-2").unwrap());

        let err = insert_owner(&conn, &NewOwner::new("Eve", "NID-1", "0788", "Huye"), t0()).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateNationalId(ref n) if n == "NID-1"));
    }

    #[test]
    fn test_plate_starts_available_and_guarded_flip() {
        let conn = setup();
        let owner = insert_owner(&conn, &NewOwner::new("Alice", "NID-1", "0788", "Kigali"), t0()).unwrap();
        let plate = insert_plate(&conn, owner.id, &NewPlateNumber::new("RAA111A"), t0()).unwrap();
        assert_eq!(plate.status, PlateStatus::Available);
        assert_eq!(plate.issued_date, t0());

        assert!(set_plate_status(&conn, plate.id, PlateStatus::Available, PlateStatus::InUse, t0()).unwrap());
        // Second flip from the same precondition must not apply
        assert!(!set_plate_status(&conn, plate.id, PlateStatus::Available, PlateStatus::InUse, t0()).unwrap());

        let loaded = find_plate_by_number(&conn, "RAA111A").unwrap().unwrap();
        assert_eq!(loaded.status, PlateStatus::InUse);
        assert_eq!(loaded.id, plate.id);
    }

    #[test]
    fn test_issued_date_keeps_stored_precision() {
        let conn = setup();
        let owner = insert_owner(&conn, &NewOwner::new("Alice", "NID-1", "0788", "Kigali"), t0()).unwrap();
        let issued = Utc.timestamp_opt(1_700_000_000, 123_456_789).unwrap();
        let request = NewPlateNumber {
            issued_date: Some(issued),
            ..NewPlateNumber::new("RAA111A")
        };

        let plate = insert_plate(&conn, owner.id, &request, t0()).unwrap();
        assert_eq!(plate.issued_date.timestamp_subsec_nanos(), 123_456_000);
        assert_eq!(get_plate(&conn, plate.id).unwrap().unwrap(), plate);
    }

    #[test]
    fn test_search_owners_matches_national_id_or_phone() {
        let conn = setup();
        let alice = insert_owner(&conn, &NewOwner::new("Alice", "1199880012", "0788111222", "Kigali"), t0()).unwrap();
        let bob = insert_owner(&conn, &NewOwner::new("Bob", "1200770034", "0722999880", "Huye"), t0()).unwrap();

        let ids = |q: &str| -> Vec<OwnerId> {
            search_owners(&conn, q).unwrap().into_iter().map(|o| o.id).collect()
        };
        assert_eq!(ids("998800"), vec![alice.id]);
        assert_eq!(ids("0722"), vec![bob.id]);
        assert_eq!(ids("88"), vec![alice.id, bob.id]);
        // Literal match, no wildcards
        assert!(ids("%").is_empty());
    }

    #[test]
    fn test_status_column_rejects_unknown_states() {
        let conn = setup();
        let owner = insert_owner(&conn, &NewOwner::new("Alice", "NID-1", "0788", "Kigali"), t0()).unwrap();
        let plate = insert_plate(&conn, owner.id, &NewPlateNumber::new("RAA111A"), t0()).unwrap();

        let result = conn.execute(
            "UPDATE plate_numbers SET status = 'RETIRED' WHERE id = ?1",
            [plate.id.get()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_history_is_append_only() {
        let conn = setup();
        let a = insert_owner(&conn, &NewOwner::new("Alice", "NID-1", "0788", "Kigali"), t0()).unwrap();
        let b = insert_owner(&conn, &NewOwner::new("Bob", "NID-2", "0788", "Huye"), t0()).unwrap();
        let p1 = insert_plate(&conn, a.id, &NewPlateNumber::new("RAA111A"), t0()).unwrap();
        let p2 = insert_plate(&conn, b.id, &NewPlateNumber::new("RAB222B"), t0()).unwrap();
        let clerk = insert_user(&conn, &NewUser::new("Clerk", "clerk@registry.rw", "ADMIN"), t0()).unwrap();

        let vehicle = insert_vehicle(
            &conn,
            &NewVehicle {
                chassis_number: "CH-100".to_string(),
                manufacture_company: "Toyota".to_string(),
                manufacture_year: 2020,
                model_name: "RAV4".to_string(),
                price: 20_000.0,
                owner_id: a.id,
                plate_number_id: p1.id,
                registration_date: None,
            },
            t0(),
            t0(),
        )
        .unwrap();

        let entry = insert_history(
            &conn,
            &NewOwnershipHistory {
                entry_uuid: uuid::Uuid::new_v4().to_string(),
                vehicle_id: vehicle.id,
                previous_owner_id: a.id,
                new_owner_id: b.id,
                previous_plate_id: Some(p1.id),
                new_plate_id: p2.id,
                transfer_price: 5000.0,
                transfer_date: t0(),
                transferred_by: clerk.id,
            },
            t0(),
        )
        .unwrap();

        let update = conn.execute(
            "UPDATE ownership_history SET transfer_price = 1 WHERE id = ?1",
            [entry.id.get()],
        );
        assert!(update.is_err());

        let delete = conn.execute("DELETE FROM ownership_history WHERE id = ?1", [entry.id.get()]);
        assert!(delete.is_err());

        let rows = history_for_vehicle(&conn, vehicle.id).unwrap();
        assert_eq!(rows, vec![entry]);
    }

    #[test]
    fn test_timestamp_format_sorts_chronologically() {
        let early = t0();
        let late = t0() + chrono::Duration::milliseconds(1500);
        assert!(format_timestamp(&early) < format_timestamp(&late));
        assert_eq!(format_timestamp(&early).len(), format_timestamp(&late).len());
    }

    #[test]
    fn test_event_log() {
        let conn = setup();

        let event = Event::new(
            "vehicle_registered",
            "vehicle",
            "1",
            serde_json::json!({"chassis": "CH-100"}),
            "clerk@registry.rw",
            t0(),
        );

        insert_event(&conn, &event).unwrap();

        let events = get_events_for_entity(&conn, "vehicle", "1").unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, "vehicle_registered");
        assert_eq!(events[0].actor, "clerk@registry.rw");
        assert_eq!(events[0].timestamp, t0());
    }
}
