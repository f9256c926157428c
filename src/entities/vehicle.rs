// 🚗 Vehicle Entity
//
// Identity: chassis number (never changes, never reused)
// Values:   current owner, current plate, current price (change on transfer)

use super::{Owner, OwnerId, PlateId, PlateNumber, VehicleId};
use crate::entities::owner::require_text;
use crate::error::RegistryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: VehicleId,

    // ========================================================================
    // IDENTITY & MANUFACTURE (carried unchanged through every transfer)
    // ========================================================================
    pub chassis_number: String,
    pub manufacture_company: String,
    pub manufacture_year: i32,
    pub model_name: String,
    pub registration_date: DateTime<Utc>,

    // ========================================================================
    // CURRENT BINDING (mutated only by the transfer workflow)
    // ========================================================================
    pub current_price: f64,
    pub current_owner_id: OwnerId,
    pub current_plate_id: PlateId,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// First-registration request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVehicle {
    pub chassis_number: String,
    pub manufacture_company: String,
    pub manufacture_year: i32,
    pub model_name: String,
    pub price: f64,
    pub owner_id: OwnerId,
    pub plate_number_id: PlateId,
    /// Defaults to now when absent
    #[serde(default)]
    pub registration_date: Option<DateTime<Utc>>,
}

impl NewVehicle {
    pub fn validate(&self) -> Result<(), RegistryError> {
        require_text("chassisNumber", &self.chassis_number)?;
        require_text("manufactureCompany", &self.manufacture_company)?;
        require_text("modelName", &self.model_name)?;
        if self.manufacture_year <= 0 {
            return Err(RegistryError::invalid("manufactureYear", "must be positive"));
        }
        require_price("price", self.price)
    }
}

pub(crate) fn require_price(field: &'static str, price: f64) -> Result<(), RegistryError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(RegistryError::invalid(field, "must be a positive amount"));
    }
    Ok(())
}

/// Vehicle with its owner and plate resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VehicleSnapshot {
    pub id: VehicleId,
    pub chassis_number: String,
    pub manufacture_company: String,
    pub manufacture_year: i32,
    pub model_name: String,
    pub current_price: f64,
    pub current_owner: Owner,
    pub current_plate_number: PlateNumber,
    pub registration_date: DateTime<Utc>,
}

impl VehicleSnapshot {
    pub fn assemble(vehicle: Vehicle, owner: Owner, plate: PlateNumber) -> Self {
        VehicleSnapshot {
            id: vehicle.id,
            chassis_number: vehicle.chassis_number,
            manufacture_company: vehicle.manufacture_company,
            manufacture_year: vehicle.manufacture_year,
            model_name: vehicle.model_name,
            current_price: vehicle.current_price,
            current_owner: owner,
            current_plate_number: plate,
            registration_date: vehicle.registration_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> NewVehicle {
        NewVehicle {
            chassis_number: "CH-100".to_string(),
            manufacture_company: "Toyota".to_string(),
            manufacture_year: 2020,
            model_name: "RAV4".to_string(),
            price: 25_000.0,
            owner_id: OwnerId(1),
            plate_number_id: PlateId(1),
            registration_date: None,
        }
    }

    #[test]
    fn test_valid_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_price_must_be_positive_and_finite() {
        for price in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let mut req = request();
            req.price = price;
            assert!(req.validate().is_err(), "price {} accepted", price);
        }
    }

    #[test]
    fn test_year_and_text_fields() {
        let mut req = request();
        req.manufacture_year = 0;
        assert!(req.validate().is_err());

        let mut req = request();
        req.model_name = " ".to_string();
        assert!(req.validate().is_err());
    }
}
