// Runtime configuration, read from the environment.
// Binaries call dotenvy first so a local .env file can supply these.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DB_PATH: &str = "REGISTRY_DB_PATH";
pub const ENV_BUSY_TIMEOUT_MS: &str = "REGISTRY_BUSY_TIMEOUT_MS";
pub const ENV_BIND_ADDR: &str = "REGISTRY_BIND_ADDR";

const DEFAULT_DB_PATH: &str = "vehicle_registry.db";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

#[derive(Debug, Clone, PartialEq)]
pub struct RegistryConfig {
    /// SQLite database file
    pub database_path: PathBuf,

    /// How long a writer waits for a competing transaction before failing
    pub busy_timeout: Duration,

    /// HTTP listen address (server binary only)
    pub bind_addr: SocketAddr,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

impl RegistryConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; missing keys fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = lookup(ENV_DB_PATH)
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));

        let busy_timeout_ms = match lookup(ENV_BUSY_TIMEOUT_MS) {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("{} must be milliseconds, got '{}'", ENV_BUSY_TIMEOUT_MS, raw))?,
            None => DEFAULT_BUSY_TIMEOUT_MS,
        };

        let bind_raw = lookup(ENV_BIND_ADDR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .trim()
            .parse::<SocketAddr>()
            .with_context(|| format!("{} must be host:port, got '{}'", ENV_BIND_ADDR, bind_raw))?;

        Ok(RegistryConfig {
            database_path,
            busy_timeout: Duration::from_millis(busy_timeout_ms),
            bind_addr,
        })
    }
}
