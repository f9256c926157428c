// 👤 Owner Entity
//
// "National ID is IDENTITY (never changes), contact details are VALUES"
//
// names and national_id are fixed at registration; phone, address and email
// can be corrected later through a ContactUpdate.

use super::OwnerId;
use crate::error::RegistryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered vehicle owner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Owner {
    pub id: OwnerId,
    pub names: String,
    /// Natural key, unique across all owners
    pub national_id: String,
    pub email: Option<String>,
    pub phone: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Registration request for a new owner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOwner {
    pub names: String,
    pub national_id: String,
    pub phone: String,
    pub address: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl NewOwner {
    pub fn new(names: &str, national_id: &str, phone: &str, address: &str) -> Self {
        NewOwner {
            names: names.to_string(),
            national_id: national_id.to_string(),
            phone: phone.to_string(),
            address: address.to_string(),
            email: None,
        }
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    pub fn validate(&self) -> Result<(), RegistryError> {
        require_text("names", &self.names)?;
        require_text("nationalId", &self.national_id)?;
        require_text("phone", &self.phone)?;
        require_text("address", &self.address)?;
        if let Some(email) = &self.email {
            require_email("email", email)?;
        }
        Ok(())
    }
}

/// Partial update of the mutable contact fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactUpdate {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl ContactUpdate {
    pub fn is_empty(&self) -> bool {
        self.phone.is_none() && self.address.is_none() && self.email.is_none()
    }

    pub fn validate(&self) -> Result<(), RegistryError> {
        if let Some(phone) = &self.phone {
            require_text("phone", phone)?;
        }
        if let Some(address) = &self.address {
            require_text("address", address)?;
        }
        if let Some(email) = &self.email {
            require_email("email", email)?;
        }
        Ok(())
    }

    /// Apply onto an owner, leaving identity fields untouched
    pub fn apply(&self, owner: &mut Owner, now: DateTime<Utc>) {
        if let Some(phone) = &self.phone {
            owner.phone = phone.clone();
        }
        if let Some(address) = &self.address {
            owner.address = address.clone();
        }
        if let Some(email) = &self.email {
            owner.email = Some(email.clone());
        }
        owner.updated_at = now;
    }
}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<(), RegistryError> {
    if value.trim().is_empty() {
        return Err(RegistryError::invalid(field, "must not be blank"));
    }
    Ok(())
}

pub(crate) fn require_email(field: &'static str, value: &str) -> Result<(), RegistryError> {
    require_text(field, value)?;
    match value.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(RegistryError::invalid(field, "must be a valid email address")),
    }
}
