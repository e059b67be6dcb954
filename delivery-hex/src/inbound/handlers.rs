//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use utoipa::OpenApi;

use delivery_types::{
    AppError, BindCompanyRequest, BindCompanyResponse, CompanyResponse, CreateCompanyRequest,
    CreateParcelRequest, DeliveryRepository, ListParcelsQuery, ParcelCreatedResponse, ParcelId,
    ParcelTypeResponse, SessionId,
};

use crate::DeliveryService;
use crate::openapi::ApiDoc;
use crate::pricing::UPDATE_DELIVERY_PRICES;
use crate::scheduler::Scheduler;

/// Application state shared across handlers.
pub struct AppState<R: DeliveryRepository> {
    pub service: DeliveryService<R>,
    pub scheduler: Arc<Scheduler>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
            "code": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// Serves the OpenAPI document.
pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ─────────────────────────────────────────────────────────────────────────────
// Parcels
// ─────────────────────────────────────────────────────────────────────────────

/// Register a parcel in the caller's session.
#[tracing::instrument(skip(state, req), fields(session_id = %session, name = %req.name))]
pub async fn register_parcel<R: DeliveryRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(session): Extension<SessionId>,
    Json(req): Json<CreateParcelRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let parcel_id = state.service.register_parcel(session, req).await?;
    Ok((StatusCode::CREATED, Json(ParcelCreatedResponse { parcel_id })))
}

/// List the caller's parcels.
#[tracing::instrument(skip(state), fields(session_id = %session))]
pub async fn list_parcels<R: DeliveryRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(session): Extension<SessionId>,
    Query(query): Query<ListParcelsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let parcels = state.service.list_parcels(&session, query).await?;
    Ok(Json(parcels))
}

/// List parcel types.
#[tracing::instrument(skip(state))]
pub async fn list_parcel_types<R: DeliveryRepository>(
    State(state): State<Arc<AppState<R>>>,
) -> Result<impl IntoResponse, ApiError> {
    let types: Vec<ParcelTypeResponse> = state
        .service
        .list_parcel_types()
        .await?
        .into_iter()
        .map(ParcelTypeResponse::from)
        .collect();
    Ok(Json(types))
}

/// Get one of the caller's parcels.
#[tracing::instrument(skip(state), fields(session_id = %session, parcel_id = %id))]
pub async fn get_parcel<R: DeliveryRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(session): Extension<SessionId>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let parcel_id: ParcelId = id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid parcel ID".into()))?;

    let parcel = state.service.get_parcel(&session, parcel_id).await?;
    Ok(Json(parcel))
}

/// Bind one of the caller's parcels to a transport company.
#[tracing::instrument(skip(state), fields(session_id = %session))]
pub async fn bind_company<R: DeliveryRepository>(
    State(state): State<Arc<AppState<R>>>,
    Extension(session): Extension<SessionId>,
    Json(req): Json<BindCompanyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let parcel_id = req.parcel_id;
    let company_id = req.company_id;
    state.service.bind_company(&session, req).await?;

    Ok(Json(BindCompanyResponse {
        message: format!("Parcel {} bound to company {}", parcel_id, company_id),
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Companies
// ─────────────────────────────────────────────────────────────────────────────

/// Create a transport company.
#[tracing::instrument(skip(state))]
pub async fn create_company<R: DeliveryRepository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<CreateCompanyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let company = state.service.create_company(req).await?;
    Ok((StatusCode::CREATED, Json(CompanyResponse::from(company))))
}

/// List transport companies.
#[tracing::instrument(skip(state))]
pub async fn list_companies<R: DeliveryRepository>(
    State(state): State<Arc<AppState<R>>>,
) -> Result<impl IntoResponse, ApiError> {
    let companies: Vec<CompanyResponse> = state
        .service
        .list_companies()
        .await?
        .into_iter()
        .map(CompanyResponse::from)
        .collect();
    Ok(Json(companies))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tasks
// ─────────────────────────────────────────────────────────────────────────────

/// Run the delivery price update now and report its outcome.
#[tracing::instrument(skip(state))]
pub async fn trigger_price_update<R: DeliveryRepository>(
    State(state): State<Arc<AppState<R>>>,
) -> Result<impl IntoResponse, ApiError> {
    let report = state.scheduler.run_now(UPDATE_DELIVERY_PRICES).await?;
    Ok(Json(report))
}
