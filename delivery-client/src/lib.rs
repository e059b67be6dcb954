//! # Delivery Client SDK
//!
//! A typed Rust client for the Delivery API.
//!
//! The server identifies callers by an anonymous `session_id` cookie. The
//! client remembers the cookie it is issued and sends it on every later
//! request, so one client instance sees one session's parcels.

use std::sync::Mutex;

use delivery_types::{
    BindCompanyRequest, BindCompanyResponse, CompanyId, CompanyResponse, CreateCompanyRequest,
    CreateParcelRequest, JobRunResponse, ListParcelsQuery, ParcelCreatedResponse, ParcelId,
    ParcelTypeId, ParcelTypeResponse, ParcelView,
};
use reqwest::{Client, RequestBuilder, header};
use serde::de::DeserializeOwned;

/// Cookie the server keys sessions on.
pub const SESSION_COOKIE: &str = "session_id";

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Delivery API client.
pub struct DeliveryClient {
    base_url: String,
    session_id: Mutex<Option<String>>,
    http: Client,
}

impl DeliveryClient {
    /// Creates a new client without a session.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session_id: Mutex::new(None),
            http: Client::new(),
        }
    }

    /// Resumes an existing session.
    pub fn with_session(self, session_id: impl Into<String>) -> Self {
        self.remember_session(session_id.into());
        self
    }

    /// Returns the session id in use, if the server has issued one.
    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().ok().and_then(|s| s.clone())
    }

    /// Checks if the API is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    /// Registers a parcel in the current session.
    pub async fn register_parcel(
        &self,
        name: &str,
        weight: f64,
        type_id: ParcelTypeId,
        content_value_usd: f64,
    ) -> Result<ParcelId, ClientError> {
        let req = CreateParcelRequest {
            name: name.to_string(),
            weight,
            type_id,
            content_value_usd,
        };
        let created: ParcelCreatedResponse = self.post("/api/parcels", &req).await?;
        Ok(created.parcel_id)
    }

    /// Lists the session's parcels.
    pub async fn list_parcels(&self, query: &ListParcelsQuery) -> Result<Vec<ParcelView>, ClientError> {
        let req = self
            .http
            .get(format!("{}/api/parcels", self.base_url))
            .query(query);
        self.send(req).await
    }

    /// Gets one of the session's parcels.
    pub async fn get_parcel(&self, id: ParcelId) -> Result<ParcelView, ClientError> {
        self.get(&format!("/api/parcels/{}", id)).await
    }

    /// Lists parcel types.
    pub async fn list_parcel_types(&self) -> Result<Vec<ParcelTypeResponse>, ClientError> {
        self.get("/api/parcels/types").await
    }

    /// Binds a parcel to a transport company.
    pub async fn bind_company(
        &self,
        parcel_id: ParcelId,
        company_id: CompanyId,
    ) -> Result<BindCompanyResponse, ClientError> {
        let req = BindCompanyRequest {
            parcel_id,
            company_id,
        };
        self.post("/api/parcels/bind-company", &req).await
    }

    /// Creates a transport company.
    pub async fn create_company(&self, name: &str) -> Result<CompanyResponse, ClientError> {
        let req = CreateCompanyRequest {
            name: name.to_string(),
        };
        self.post("/api/companies", &req).await
    }

    /// Lists transport companies.
    pub async fn list_companies(&self) -> Result<Vec<CompanyResponse>, ClientError> {
        self.get("/api/companies").await
    }

    /// Runs the delivery price update now.
    pub async fn run_price_update(&self) -> Result<JobRunResponse, ClientError> {
        let req = self
            .http
            .post(format!("{}/api/tasks/price-update", self.base_url));
        self.send(req).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let req = self.http.get(format!("{}{}", self.base_url, path));
        self.send(req).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let req = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body);
        self.send(req).await
    }

    async fn send<T: DeserializeOwned>(&self, mut req: RequestBuilder) -> Result<T, ClientError> {
        if let Some(session) = self.session_id() {
            req = req.header(header::COOKIE, format!("{}={}", SESSION_COOKIE, session));
        }
        let resp = req.send().await?;
        if let Some(issued) = issued_session(&resp) {
            self.remember_session(issued);
        }
        self.handle_response(resp).await
    }

    fn remember_session(&self, session_id: String) {
        if let Ok(mut slot) = self.session_id.lock() {
            *slot = Some(session_id);
        }
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                .unwrap_or(body);
            Err(ClientError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

/// Extracts the session id from a `Set-Cookie` response header.
fn issued_session(resp: &reqwest::Response) -> Option<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|cookie| {
            let pair = cookie.split(';').next()?.trim();
            let (name, value) = pair.split_once('=')?;
            (name == SESSION_COOKIE && !value.is_empty()).then(|| value.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use delivery_types::{DeliveryPriceView, JobStatus};
    use serde_json::json;
    use wiremock::matchers::{body_json, header as header_eq, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_client_creation() {
        let client = DeliveryClient::new("http://localhost:3000");
        assert_eq!(client.base_url, "http://localhost:3000");
        assert_eq!(client.session_id(), None);
    }

    #[test]
    fn test_client_with_trailing_slash() {
        let client = DeliveryClient::new("http://localhost:3000/");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_client_with_session() {
        let client = DeliveryClient::new("http://localhost:3000").with_session("abc");
        assert_eq!(client.session_id().as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_remembers_issued_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/parcels"))
            .and(body_json(json!({
                "name": "Box", "weight": 1.2, "type_id": 1, "content_value_usd": 50.0
            })))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("set-cookie", "session_id=s-123; Path=/; HttpOnly")
                    .set_body_json(json!({ "parcel_id": 7 })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/parcels/7"))
            .and(header_eq("cookie", "session_id=s-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "parcel_id": 7,
                "name": "Box",
                "weight": 1.2,
                "type_id": 1,
                "type_name": "clothing",
                "content_value_usd": 50.0,
                "delivery_price": "not calculated",
                "created_at": "2025-06-07T11:30:00Z"
            })))
            .mount(&server)
            .await;

        let client = DeliveryClient::new(server.uri());
        let id = client
            .register_parcel("Box", 1.2, ParcelTypeId::new(1), 50.0)
            .await
            .unwrap();
        assert_eq!(id, ParcelId::new(7));
        assert_eq!(client.session_id().as_deref(), Some("s-123"));

        let parcel = client.get_parcel(id).await.unwrap();
        assert_eq!(parcel.type_name, "clothing");
        assert_eq!(parcel.delivery_price, DeliveryPriceView::NotCalculated);
    }

    #[tokio::test]
    async fn test_list_parcels_sends_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/parcels"))
            .and(query_param("has_delivery_cost", "true"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let client = DeliveryClient::new(server.uri());
        let query = ListParcelsQuery {
            has_delivery_cost: Some(true),
            limit: 5,
            ..Default::default()
        };

        assert!(client.list_parcels(&query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_api_error_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/parcels/bind-company"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "error": "Parcel 1 is already bound to a company",
                "code": 409
            })))
            .mount(&server)
            .await;

        let client = DeliveryClient::new(server.uri());
        let err = client
            .bind_company(ParcelId::new(1), CompanyId::new(2))
            .await
            .unwrap_err();

        match err {
            ClientError::Api { status, message } => {
                assert_eq!(status, 409);
                assert!(message.contains("already bound"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_run_price_update() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/tasks/price-update"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "job": "update_delivery_prices",
                "status": "COMPLETED_WITH_ERRORS",
                "succeeded": 3,
                "failed": 1
            })))
            .mount(&server)
            .await;

        let client = DeliveryClient::new(server.uri());
        let report = client.run_price_update().await.unwrap();

        assert_eq!(report.status, JobStatus::CompletedWithErrors);
        assert_eq!(report.succeeded, 3);
    }
}
