//! OpenAPI specification and documentation.

#![allow(dead_code)] // Path functions are only used by utoipa for documentation generation

use delivery_types::dto::{
    BindCompanyRequest, BindCompanyResponse, CompanyResponse, CreateCompanyRequest,
    CreateParcelRequest, JobRunResponse, JobStatus, ListParcelsQuery, ParcelCreatedResponse,
    ParcelTypeResponse, ParcelView,
};
use utoipa::OpenApi;

// Dummy functions to generate path documentation
// These are not the actual handlers, just for OpenAPI path generation

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = inline(serde_json::Value), example = json!({"status": "healthy"}))
    )
)]
async fn health() {}

/// Register a parcel
///
/// Registering the same name twice in one session returns the existing id.
#[utoipa::path(
    post,
    path = "/api/parcels",
    tag = "parcels",
    request_body = CreateParcelRequest,
    responses(
        (status = 201, description = "Parcel registered", body = ParcelCreatedResponse),
        (status = 400, description = "Invalid request or unknown parcel type")
    )
)]
async fn register_parcel() {}

/// List the session's parcels, newest first
#[utoipa::path(
    get,
    path = "/api/parcels",
    tag = "parcels",
    params(ListParcelsQuery),
    responses(
        (status = 200, description = "Parcels of the current session", body = Vec<ParcelView>),
        (status = 400, description = "Invalid pagination")
    )
)]
async fn list_parcels() {}

/// List parcel types
#[utoipa::path(
    get,
    path = "/api/parcels/types",
    tag = "parcels",
    responses(
        (status = 200, description = "All parcel types", body = Vec<ParcelTypeResponse>)
    )
)]
async fn list_parcel_types() {}

/// Get a parcel of the current session
#[utoipa::path(
    get,
    path = "/api/parcels/{id}",
    tag = "parcels",
    params(
        ("id" = i64, Path, description = "Parcel ID")
    ),
    responses(
        (status = 200, description = "Parcel details", body = ParcelView),
        (status = 404, description = "Parcel not found in this session")
    )
)]
async fn get_parcel() {}

/// Bind a parcel to a transport company
#[utoipa::path(
    post,
    path = "/api/parcels/bind-company",
    tag = "parcels",
    request_body = BindCompanyRequest,
    responses(
        (status = 200, description = "Parcel bound", body = BindCompanyResponse),
        (status = 404, description = "Parcel or company not found"),
        (status = 409, description = "Parcel already bound to a company")
    )
)]
async fn bind_company() {}

/// Create a transport company
#[utoipa::path(
    post,
    path = "/api/companies",
    tag = "companies",
    request_body = CreateCompanyRequest,
    responses(
        (status = 201, description = "Company created", body = CompanyResponse),
        (status = 400, description = "Invalid name")
    )
)]
async fn create_company() {}

/// List transport companies
#[utoipa::path(
    get,
    path = "/api/companies",
    tag = "companies",
    responses(
        (status = 200, description = "All companies", body = Vec<CompanyResponse>)
    )
)]
async fn list_companies() {}

/// Run the delivery price update now
#[utoipa::path(
    post,
    path = "/api/tasks/price-update",
    tag = "tasks",
    responses(
        (status = 200, description = "Job finished", body = JobRunResponse),
        (status = 502, description = "Exchange rate unavailable, no parcel was changed")
    )
)]
async fn trigger_price_update() {}

/// OpenAPI documentation for the Delivery API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Parcel Delivery Service API",
        version = "1.0.0",
        description = "Register parcels in an anonymous session, bind them to transport companies and get delivery prices in RUB.\n\n## Sessions\n\nThe first response sets a `session_id` cookie. Send it back to see the parcels registered under it.\n\n## Prices\n\nDelivery prices are computed by a background job every 5 minutes. Until then a parcel shows `\"not calculated\"`.",
        license(name = "MIT"),
    ),
    paths(
        health,
        register_parcel,
        list_parcels,
        list_parcel_types,
        get_parcel,
        bind_company,
        create_company,
        list_companies,
        trigger_price_update,
    ),
    components(
        schemas(
            CreateParcelRequest,
            ParcelCreatedResponse,
            ParcelView,
            ParcelTypeResponse,
            BindCompanyRequest,
            BindCompanyResponse,
            CreateCompanyRequest,
            CompanyResponse,
            JobRunResponse,
            JobStatus,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "parcels", description = "Parcel registration and lookup"),
        (name = "companies", description = "Transport companies"),
        (name = "tasks", description = "Background job triggers"),
    )
)]
pub struct ApiDoc;
