//! Repository port traits.
//!
//! These are the primary ports in our hexagonal architecture.
//! Adapters (Postgres, SQLite, in-memory mocks) implement them.

use crate::domain::{
    Company, CompanyId, NewParcel, Parcel, ParcelId, ParcelType, ParcelTypeId, ParcelWithType,
    SessionId,
};
use crate::dto::{CreateCompanyRequest, ListParcelsQuery};
use crate::error::RepoError;

/// Parcel store.
///
/// `bind_company` MUST evaluate its `company_id IS NULL` predicate atomically
/// with the write.
#[async_trait::async_trait]
pub trait ParcelRepository: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────────
    // Registration & lookup
    // ─────────────────────────────────────────────────────────────────────────────

    /// Inserts a new parcel without a delivery price and returns its id.
    async fn create_parcel(&self, parcel: NewParcel) -> Result<ParcelId, RepoError>;

    /// Finds a parcel by name within a session.
    async fn find_by_name_and_session(
        &self,
        name: &str,
        session_id: &SessionId,
    ) -> Result<Option<Parcel>, RepoError>;

    /// Gets a parcel (with its type name) that belongs to the session.
    async fn get_by_id_and_session(
        &self,
        id: ParcelId,
        session_id: &SessionId,
    ) -> Result<Option<ParcelWithType>, RepoError>;

    /// Lists a session's parcels, newest first.
    async fn list_by_filters(
        &self,
        session_id: &SessionId,
        query: &ListParcelsQuery,
    ) -> Result<Vec<ParcelWithType>, RepoError>;

    /// Lists all parcel types.
    async fn list_parcel_types(&self) -> Result<Vec<ParcelType>, RepoError>;

    /// Gets a parcel type by id.
    async fn get_parcel_type(&self, id: ParcelTypeId) -> Result<Option<ParcelType>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Pricing
    // ─────────────────────────────────────────────────────────────────────────────

    /// Returns every parcel whose delivery price has not been computed.
    async fn get_unpriced_parcels(&self) -> Result<Vec<Parcel>, RepoError>;

    /// Writes the parcel's `delivery_price` and `updated_at`.
    ///
    /// Returns `RepoError::NotFound` if the row no longer exists.
    async fn persist(&self, parcel: &Parcel) -> Result<(), RepoError>;

    // ─────────────────────────────────────────────────────────────────────────────
    // Company binding (atomic compare-and-set)
    // ─────────────────────────────────────────────────────────────────────────────

    /// Sets `company_id` only if it is currently absent.
    ///
    /// Returns `true` if the row changed, `false` if it was already bound
    /// (or does not exist).
    async fn bind_company(
        &self,
        parcel_id: ParcelId,
        company_id: CompanyId,
    ) -> Result<bool, RepoError>;
}

/// Transport company store.
#[async_trait::async_trait]
pub trait CompanyRepository: Send + Sync + 'static {
    /// Creates a company.
    async fn create_company(&self, req: CreateCompanyRequest) -> Result<Company, RepoError>;

    /// Lists all companies.
    async fn list_companies(&self) -> Result<Vec<Company>, RepoError>;

    /// Gets a company by id.
    async fn get_company(&self, id: CompanyId) -> Result<Option<Company>, RepoError>;
}

/// Everything the HTTP adapter needs from a single store.
pub trait DeliveryRepository: ParcelRepository + CompanyRepository {}

impl<T: ParcelRepository + CompanyRepository> DeliveryRepository for T {}
