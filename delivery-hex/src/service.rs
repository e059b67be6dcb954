//! Delivery Application Service
//!
//! Orchestrates parcel and company operations through the repository ports.
//! Contains NO infrastructure logic - pure business orchestration.

use std::sync::Arc;

use delivery_types::{
    AppError, BindCompanyRequest, Company, CreateCompanyRequest, CreateParcelRequest,
    DeliveryRepository, ListParcelsQuery, MAX_PAGE_LIMIT, NewParcel, ParcelId, ParcelType,
    ParcelView, RepoError, SessionId,
};

/// Application service for parcel registration, lookup and company binding.
///
/// Generic over `R: DeliveryRepository` - the adapter is injected at compile time.
/// The repository is shared with the price update job, hence the `Arc`.
pub struct DeliveryService<R: DeliveryRepository> {
    repo: Arc<R>,
}

impl<R: DeliveryRepository> DeliveryService<R> {
    /// Creates a new delivery service over the given repository.
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// Returns a reference to the underlying repository.
    pub fn repo(&self) -> &Arc<R> {
        &self.repo
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Parcels
    // ─────────────────────────────────────────────────────────────────────────────

    /// Registers a parcel in the caller's session.
    ///
    /// Idempotent per `(name, session)`: a repeat registration returns the id
    /// of the parcel already stored under that name.
    pub async fn register_parcel(
        &self,
        session_id: SessionId,
        req: CreateParcelRequest,
    ) -> Result<ParcelId, AppError> {
        let parcel = NewParcel::new(
            session_id,
            req.name,
            req.weight,
            req.type_id,
            req.content_value_usd,
        )?;

        if let Some(existing) = self.existing_parcel(&parcel).await? {
            tracing::debug!(parcel_id = %existing, "parcel already registered");
            return Ok(existing);
        }

        if self.repo.get_parcel_type(parcel.type_id).await?.is_none() {
            return Err(AppError::BadRequest(format!(
                "Unknown parcel type {}",
                parcel.type_id
            )));
        }

        match self.repo.create_parcel(parcel.clone()).await {
            Ok(id) => {
                tracing::info!(parcel_id = %id, "parcel registered");
                Ok(id)
            }
            // A concurrent registration with the same name won the insert.
            Err(RepoError::Conflict(_)) => self
                .existing_parcel(&parcel)
                .await?
                .ok_or_else(|| AppError::Conflict("Parcel name already in use".into())),
            Err(e) => Err(e.into()),
        }
    }

    async fn existing_parcel(&self, parcel: &NewParcel) -> Result<Option<ParcelId>, AppError> {
        let found = self
            .repo
            .find_by_name_and_session(&parcel.name, &parcel.session_id)
            .await?;
        Ok(found.map(|p| p.id))
    }

    /// Lists the caller's parcels, newest first.
    pub async fn list_parcels(
        &self,
        session_id: &SessionId,
        query: ListParcelsQuery,
    ) -> Result<Vec<ParcelView>, AppError> {
        if !(1..=MAX_PAGE_LIMIT).contains(&query.limit) {
            return Err(AppError::BadRequest(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_LIMIT
            )));
        }
        if query.offset < 0 {
            return Err(AppError::BadRequest("offset cannot be negative".into()));
        }

        let rows = self.repo.list_by_filters(session_id, &query).await?;
        Ok(rows.into_iter().map(ParcelView::from).collect())
    }

    /// Gets one of the caller's parcels.
    pub async fn get_parcel(
        &self,
        session_id: &SessionId,
        id: ParcelId,
    ) -> Result<ParcelView, AppError> {
        self.repo
            .get_by_id_and_session(id, session_id)
            .await?
            .map(ParcelView::from)
            .ok_or_else(|| AppError::NotFound(format!("Parcel {}", id)))
    }

    /// Lists all parcel types.
    pub async fn list_parcel_types(&self) -> Result<Vec<ParcelType>, AppError> {
        self.repo.list_parcel_types().await.map_err(Into::into)
    }

    /// Hands one of the caller's parcels to a company.
    ///
    /// A parcel can be bound once; later attempts are a `Conflict`.
    #[tracing::instrument(skip(self), fields(parcel_id = %req.parcel_id, company_id = %req.company_id))]
    pub async fn bind_company(
        &self,
        session_id: &SessionId,
        req: BindCompanyRequest,
    ) -> Result<(), AppError> {
        if self
            .repo
            .get_by_id_and_session(req.parcel_id, session_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound(format!("Parcel {}", req.parcel_id)));
        }

        if self.repo.get_company(req.company_id).await?.is_none() {
            return Err(AppError::NotFound(format!("Company {}", req.company_id)));
        }

        if self.repo.bind_company(req.parcel_id, req.company_id).await? {
            tracing::info!("parcel bound to company");
            Ok(())
        } else {
            Err(AppError::Conflict(format!(
                "Parcel {} is already bound to a company",
                req.parcel_id
            )))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Companies
    // ─────────────────────────────────────────────────────────────────────────────

    /// Creates a transport company.
    pub async fn create_company(&self, req: CreateCompanyRequest) -> Result<Company, AppError> {
        if req.name.trim().is_empty() {
            return Err(AppError::BadRequest("Company name cannot be empty".into()));
        }

        self.repo.create_company(req).await.map_err(Into::into)
    }

    /// Lists all companies.
    pub async fn list_companies(&self) -> Result<Vec<Company>, AppError> {
        self.repo.list_companies().await.map_err(Into::into)
    }
}
