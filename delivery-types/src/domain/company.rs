//! Reference entities: parcel types and transport companies.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::DomainError;

define_id!(
    /// Identifier of a parcel type.
    ParcelTypeId
);

define_id!(
    /// Identifier of a transport company.
    CompanyId
);

/// Maximum length of a company name (matches the column width).
pub const MAX_COMPANY_NAME_LEN: usize = 50;

/// A category of parcel (clothing, electronics, ...). Seeded by migrations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ParcelType {
    pub id: ParcelTypeId,
    pub name: String,
}

/// A transport company a parcel can be handed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
}

impl Company {
    /// Checks a company name before it reaches the store.
    pub fn validate_name(name: &str) -> Result<(), DomainError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DomainError::ValidationError(
                "Company name cannot be empty".into(),
            ));
        }
        if trimmed.chars().count() > MAX_COMPANY_NAME_LEN {
            return Err(DomainError::ValidationError(format!(
                "Company name must be at most {} characters",
                MAX_COMPANY_NAME_LEN
            )));
        }
        Ok(())
    }
}
