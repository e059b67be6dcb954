//! Database row types for SQLite and PostgreSQL.

use sqlx::FromRow;

#[cfg(feature = "postgres")]
use chrono::{DateTime, Utc};

use delivery_types::{
    Company, CompanyId, Parcel, ParcelId, ParcelType, ParcelTypeId, ParcelWithType, RepoError,
    SessionId,
};

/// Column list shared by every parcel query (`p` aliases `parcels`).
pub const PARCEL_COLUMNS: &str = "p.id, p.session_id, p.name, p.weight, p.type_id, \
     p.content_value_usd, p.delivery_price, p.created_at, p.updated_at, p.company_id";

// ─────────────────────────────────────────────────────────────────────────────
// Database row structs (derive FromRow for automatic mapping)
// ─────────────────────────────────────────────────────────────────────────────

/// Parcel row from SQLite (timestamps stored as RFC 3339 text).
#[cfg(feature = "sqlite")]
#[derive(FromRow)]
pub struct SqliteParcelRow {
    pub id: i64,
    pub session_id: String,
    pub name: String,
    pub weight: f64,
    pub type_id: i64,
    pub content_value_usd: f64,
    pub delivery_price: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
    pub company_id: Option<i64>,
}

/// Parcel row from PostgreSQL.
#[cfg(feature = "postgres")]
#[derive(FromRow)]
pub struct PgParcelRow {
    pub id: i64,
    pub session_id: String,
    pub name: String,
    pub weight: f64,
    pub type_id: i64,
    pub content_value_usd: f64,
    pub delivery_price: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub company_id: Option<i64>,
}

/// SQLite parcel row joined with its type name.
#[cfg(feature = "sqlite")]
#[derive(FromRow)]
pub struct SqliteParcelWithTypeRow {
    #[sqlx(flatten)]
    pub parcel: SqliteParcelRow,
    pub type_name: String,
}

/// PostgreSQL parcel row joined with its type name.
#[cfg(feature = "postgres")]
#[derive(FromRow)]
pub struct PgParcelWithTypeRow {
    #[sqlx(flatten)]
    pub parcel: PgParcelRow,
    pub type_name: String,
}

/// Parcel type row from database.
#[derive(FromRow)]
pub struct DbParcelType {
    pub id: i64,
    pub name: String,
}

/// Company row from database.
#[derive(FromRow)]
pub struct DbCompany {
    pub id: i64,
    pub name: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversions
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "sqlite")]
impl SqliteParcelRow {
    pub fn into_domain(self) -> Result<Parcel, RepoError> {
        let created_at = parse_timestamp(&self.created_at)?;
        let updated_at = parse_timestamp(&self.updated_at)?;
        Ok(Parcel::from_parts(
            ParcelId::new(self.id),
            SessionId::new(self.session_id),
            self.name,
            self.weight,
            ParcelTypeId::new(self.type_id),
            self.content_value_usd,
            self.delivery_price,
            created_at,
            updated_at,
            self.company_id.map(CompanyId::new),
        ))
    }
}

#[cfg(feature = "postgres")]
impl PgParcelRow {
    pub fn into_domain(self) -> Result<Parcel, RepoError> {
        Ok(Parcel::from_parts(
            ParcelId::new(self.id),
            SessionId::new(self.session_id),
            self.name,
            self.weight,
            ParcelTypeId::new(self.type_id),
            self.content_value_usd,
            self.delivery_price,
            self.created_at,
            self.updated_at,
            self.company_id.map(CompanyId::new),
        ))
    }
}

#[cfg(feature = "sqlite")]
impl SqliteParcelWithTypeRow {
    pub fn into_domain(self) -> Result<ParcelWithType, RepoError> {
        Ok(ParcelWithType {
            parcel: self.parcel.into_domain()?,
            type_name: self.type_name,
        })
    }
}

#[cfg(feature = "postgres")]
impl PgParcelWithTypeRow {
    pub fn into_domain(self) -> Result<ParcelWithType, RepoError> {
        Ok(ParcelWithType {
            parcel: self.parcel.into_domain()?,
            type_name: self.type_name,
        })
    }
}

impl From<DbParcelType> for ParcelType {
    fn from(row: DbParcelType) -> Self {
        ParcelType {
            id: ParcelTypeId::new(row.id),
            name: row.name,
        }
    }
}

impl From<DbCompany> for Company {
    fn from(row: DbCompany) -> Self {
        Company {
            id: CompanyId::new(row.id),
            name: row.name,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Maps a driver error, surfacing unique violations as conflicts.
pub fn map_db_error(err: sqlx::Error) -> RepoError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return RepoError::Conflict(db.message().to_string());
        }
    }
    RepoError::Database(err.to_string())
}

/// Fixed-width RFC 3339 so that stored timestamps sort lexicographically.
#[cfg(feature = "sqlite")]
pub fn format_timestamp(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

#[cfg(feature = "sqlite")]
pub fn parse_timestamp(s: &str) -> Result<chrono::DateTime<chrono::Utc>, RepoError> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .map_err(|e| RepoError::Database(format!("Invalid timestamp {}: {}", s, e)))
}
