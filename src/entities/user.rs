// Acting users: the people who process transfers at the registry desk.
// Credentials live outside this crate; only identity and role are kept.

use super::UserId;
use crate::entities::owner::{require_email, require_text};
use crate::error::RegistryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub names: String,
    /// Natural key used to attribute transfers
    pub email: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub names: String,
    pub email: String,
    pub role: String,
}

impl NewUser {
    pub fn new(names: &str, email: &str, role: &str) -> Self {
        NewUser {
            names: names.to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), RegistryError> {
        require_text("names", &self.names)?;
        require_email("email", &self.email)?;
        require_text("role", &self.role)
    }
}
