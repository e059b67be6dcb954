//! Parcel domain model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::company::{CompanyId, ParcelTypeId};
use super::rate::Rate;
use crate::error::DomainError;

define_id!(
    /// Unique identifier for a Parcel, assigned by the store.
    ParcelId
);

/// Tariff per kilogram of weight, in USD.
pub const WEIGHT_TARIFF_USD: f64 = 0.5;
/// Tariff per USD of declared content value.
pub const CONTENT_VALUE_TARIFF: f64 = 0.01;
/// Maximum length of a parcel name.
pub const MAX_PARCEL_NAME_LEN: usize = 100;

/// Anonymous session that owns a set of parcels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Computes the delivery price in local currency.
///
/// `(weight * 0.5 + content_value_usd * 0.01) * rate`
pub fn delivery_price(weight: f64, content_value_usd: f64, rate: Rate) -> f64 {
    (weight * WEIGHT_TARIFF_USD + content_value_usd * CONTENT_VALUE_TARIFF) * rate.value()
}

/// Validated input for registering a parcel.
#[derive(Debug, Clone, PartialEq)]
pub struct NewParcel {
    pub session_id: SessionId,
    pub name: String,
    pub weight: f64,
    pub type_id: ParcelTypeId,
    pub content_value_usd: f64,
}

impl NewParcel {
    /// Creates a registration request.
    ///
    /// # Validation
    /// - Name cannot be empty or longer than 100 characters
    /// - Weight and content value must be finite and strictly positive
    pub fn new(
        session_id: SessionId,
        name: String,
        weight: f64,
        type_id: ParcelTypeId,
        content_value_usd: f64,
    ) -> Result<Self, DomainError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::ValidationError(
                "Parcel name cannot be empty".into(),
            ));
        }
        if name.chars().count() > MAX_PARCEL_NAME_LEN {
            return Err(DomainError::ValidationError(format!(
                "Parcel name must be at most {} characters",
                MAX_PARCEL_NAME_LEN
            )));
        }
        if !weight.is_finite() || weight <= 0.0 {
            return Err(DomainError::ValidationError(
                "Weight must be greater than zero".into(),
            ));
        }
        if !content_value_usd.is_finite() || content_value_usd <= 0.0 {
            return Err(DomainError::ValidationError(
                "Content value must be greater than zero".into(),
            ));
        }
        if type_id.value() <= 0 {
            return Err(DomainError::ValidationError(
                "Parcel type id must be positive".into(),
            ));
        }

        Ok(Self {
            session_id,
            name,
            weight,
            type_id,
            content_value_usd,
        })
    }
}

/// A registered shipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parcel {
    pub id: ParcelId,
    pub session_id: SessionId,
    pub name: String,
    /// Weight in kilograms
    pub weight: f64,
    pub type_id: ParcelTypeId,
    /// Declared value of the contents in USD
    pub content_value_usd: f64,
    /// Delivery price in local currency; `None` until the price update job runs
    pub delivery_price: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Transport company; set at most once
    pub company_id: Option<CompanyId>,
}

impl Parcel {
    /// Reconstructs a parcel from stored fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: ParcelId,
        session_id: SessionId,
        name: String,
        weight: f64,
        type_id: ParcelTypeId,
        content_value_usd: f64,
        delivery_price: Option<f64>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
        company_id: Option<CompanyId>,
    ) -> Self {
        Self {
            id,
            session_id,
            name,
            weight,
            type_id,
            content_value_usd,
            delivery_price,
            created_at,
            updated_at,
            company_id,
        }
    }

    /// Returns true once a delivery price has been computed.
    pub fn is_priced(&self) -> bool {
        self.delivery_price.is_some()
    }

    /// Prices the parcel at the given rate and stamps `updated_at`.
    pub fn apply_rate(&mut self, rate: Rate, now: DateTime<Utc>) -> f64 {
        let price = delivery_price(self.weight, self.content_value_usd, rate);
        self.delivery_price = Some(price);
        self.updated_at = now;
        price
    }
}

/// A parcel joined with its type name, as shown to clients.
#[derive(Debug, Clone, PartialEq)]
pub struct ParcelWithType {
    pub parcel: Parcel,
    pub type_name: String,
}
