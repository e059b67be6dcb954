//! Data Transfer Objects (DTOs) for requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{Company, CompanyId, ParcelId, ParcelType, ParcelTypeId, ParcelWithType};

// ─────────────────────────────────────────────────────────────────────────────
// Parcel DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to register a parcel.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateParcelRequest {
    /// Parcel name, unique within a session
    #[schema(example = "Box")]
    pub name: String,
    /// Weight in kilograms
    #[schema(example = 1.2)]
    pub weight: f64,
    #[schema(value_type = i64, example = 1)]
    pub type_id: ParcelTypeId,
    /// Declared value of the contents in USD
    #[schema(example = 50.0)]
    pub content_value_usd: f64,
}

/// Response after registering a parcel.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ParcelCreatedResponse {
    #[schema(value_type = i64, example = 1)]
    pub parcel_id: ParcelId,
}

/// Text shown in place of a price the job has not computed yet.
pub const NOT_CALCULATED: &str = "not calculated";

/// Delivery price as rendered to clients: a number, or [`NOT_CALCULATED`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DeliveryPriceView {
    Calculated(f64),
    NotCalculated,
}

impl From<Option<f64>> for DeliveryPriceView {
    fn from(price: Option<f64>) -> Self {
        match price {
            Some(p) => DeliveryPriceView::Calculated(p),
            None => DeliveryPriceView::NotCalculated,
        }
    }
}

impl DeliveryPriceView {
    pub fn amount(&self) -> Option<f64> {
        match self {
            DeliveryPriceView::Calculated(p) => Some(*p),
            DeliveryPriceView::NotCalculated => None,
        }
    }
}

impl Serialize for DeliveryPriceView {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DeliveryPriceView::Calculated(p) => serializer.serialize_f64(*p),
            DeliveryPriceView::NotCalculated => serializer.serialize_str(NOT_CALCULATED),
        }
    }
}

impl<'de> Deserialize<'de> for DeliveryPriceView {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(p) => Ok(DeliveryPriceView::Calculated(p)),
            Raw::Text(s) if s == NOT_CALCULATED => Ok(DeliveryPriceView::NotCalculated),
            Raw::Text(s) => Err(serde::de::Error::custom(format!(
                "unexpected delivery price: {}",
                s
            ))),
        }
    }
}

/// Parcel as shown in list and detail responses.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ParcelView {
    #[schema(value_type = i64)]
    pub parcel_id: ParcelId,
    pub name: String,
    pub weight: f64,
    #[schema(value_type = i64)]
    pub type_id: ParcelTypeId,
    pub type_name: String,
    pub content_value_usd: f64,
    /// Price in local currency, or "not calculated"
    #[schema(value_type = Object, example = 88.0)]
    pub delivery_price: DeliveryPriceView,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[schema(value_type = Option<i64>)]
    pub company_id: Option<CompanyId>,
    pub created_at: DateTime<Utc>,
}

impl From<ParcelWithType> for ParcelView {
    fn from(row: ParcelWithType) -> Self {
        let p = row.parcel;
        Self {
            parcel_id: p.id,
            name: p.name,
            weight: p.weight,
            type_id: p.type_id,
            type_name: row.type_name,
            content_value_usd: p.content_value_usd,
            delivery_price: p.delivery_price.into(),
            company_id: p.company_id,
            created_at: p.created_at,
        }
    }
}

/// Parcel type as listed to clients.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ParcelTypeResponse {
    #[schema(value_type = i64)]
    pub type_id: ParcelTypeId,
    #[schema(example = "electronics")]
    pub name: String,
}

impl From<ParcelType> for ParcelTypeResponse {
    fn from(t: ParcelType) -> Self {
        Self {
            type_id: t.id,
            name: t.name,
        }
    }
}

pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

fn default_limit() -> i64 {
    DEFAULT_PAGE_LIMIT
}

/// Filters and pagination for listing a session's parcels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListParcelsQuery {
    /// Only parcels of this type
    #[serde(default)]
    #[param(value_type = Option<i64>)]
    pub type_id: Option<ParcelTypeId>,
    /// true: priced only, false: unpriced only
    #[serde(default)]
    pub has_delivery_cost: Option<bool>,
    /// Page size (1..=100)
    #[serde(default = "default_limit")]
    pub limit: i64,
    /// Rows to skip
    #[serde(default)]
    pub offset: i64,
}

impl Default for ListParcelsQuery {
    fn default() -> Self {
        Self {
            type_id: None,
            has_delivery_cost: None,
            limit: DEFAULT_PAGE_LIMIT,
            offset: 0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Company DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to create a transport company.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateCompanyRequest {
    #[schema(example = "DHL")]
    pub name: String,
}

/// A transport company.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompanyResponse {
    #[schema(value_type = i64)]
    pub id: CompanyId,
    #[schema(example = "DHL")]
    pub name: String,
}

impl From<Company> for CompanyResponse {
    fn from(c: Company) -> Self {
        Self {
            id: c.id,
            name: c.name,
        }
    }
}

/// Request to hand a parcel to a transport company.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BindCompanyRequest {
    #[schema(value_type = i64, example = 1)]
    pub parcel_id: ParcelId,
    #[schema(value_type = i64, example = 1)]
    pub company_id: CompanyId,
}

/// Response after a successful bind.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BindCompanyResponse {
    pub message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Job DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Counts produced by one run of a background job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JobOutcome {
    pub succeeded: usize,
    pub failed: usize,
    /// Exchange rate the run priced at, for jobs that use one
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub rate: Option<f64>,
}

/// Final status of a job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Completed,
    CompletedWithErrors,
}

/// Response after running a job on demand.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JobRunResponse {
    #[schema(example = "update_delivery_prices")]
    pub job: String,
    pub status: JobStatus,
    pub succeeded: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[schema(example = 80.0)]
    pub rate: Option<f64>,
}

impl JobRunResponse {
    pub fn new(job: impl Into<String>, outcome: JobOutcome) -> Self {
        let status = if outcome.failed == 0 {
            JobStatus::Completed
        } else {
            JobStatus::CompletedWithErrors
        };
        Self {
            job: job.into(),
            status,
            succeeded: outcome.succeeded,
            failed: outcome.failed,
            rate: outcome.rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delivery_price_view_serialization() {
        let priced = serde_json::to_value(DeliveryPriceView::Calculated(88.0)).unwrap();
        let unpriced = serde_json::to_value(DeliveryPriceView::NotCalculated).unwrap();
        assert_eq!(priced, serde_json::json!(88.0));
        assert_eq!(unpriced, serde_json::json!("not calculated"));
    }

    #[test]
    fn test_delivery_price_view_deserialization() {
        let priced: DeliveryPriceView = serde_json::from_str("180.0").unwrap();
        let unpriced: DeliveryPriceView = serde_json::from_str("\"not calculated\"").unwrap();
        assert_eq!(priced.amount(), Some(180.0));
        assert_eq!(unpriced, DeliveryPriceView::NotCalculated);
        assert!(serde_json::from_str::<DeliveryPriceView>("\"soon\"").is_err());
    }

    #[test]
    fn test_list_query_defaults() {
        let q: ListParcelsQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(q, ListParcelsQuery::default());
        assert_eq!(q.limit, 20);
    }

    #[test]
    fn test_job_run_status() {
        let ok = JobRunResponse::new(
            "job",
            JobOutcome {
                succeeded: 3,
                failed: 0,
                rate: None,
            },
        );
        let partial = JobRunResponse::new(
            "job",
            JobOutcome {
                succeeded: 2,
                failed: 1,
                rate: Some(80.0),
            },
        );
        assert_eq!(ok.status, JobStatus::Completed);
        assert_eq!(partial.status, JobStatus::CompletedWithErrors);
        assert_eq!(partial.rate, Some(80.0));

        // Jobs without a rate leave it out of the body
        let body = serde_json::to_value(&ok).unwrap();
        assert!(body.get("rate").is_none());
    }
}
