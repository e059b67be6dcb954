//! HTTP Server configuration and startup.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use delivery_types::DeliveryRepository;

use super::handlers::{self, AppState};
use super::rate_limit::{RateLimiterState, rate_limit_middleware};
use super::session::session_middleware;
use crate::DeliveryService;
use crate::scheduler::Scheduler;

/// HTTP Server for the Delivery API.
pub struct HttpServer<R: DeliveryRepository> {
    state: Arc<AppState<R>>,
    rate_limiter: Arc<RateLimiterState>,
}

impl<R: DeliveryRepository> HttpServer<R> {
    /// Creates a new HTTP server with the given service and job registry.
    pub fn new(service: DeliveryService<R>, scheduler: Arc<Scheduler>) -> Self {
        Self {
            state: Arc::new(AppState { service, scheduler }),
            rate_limiter: Arc::new(RateLimiterState::default()), // 100 req/min default
        }
    }

    /// Creates a new HTTP server with custom rate limiting.
    pub fn with_rate_limit(
        service: DeliveryService<R>,
        scheduler: Arc<Scheduler>,
        requests_per_minute: u32,
    ) -> Self {
        Self {
            state: Arc::new(AppState { service, scheduler }),
            rate_limiter: Arc::new(RateLimiterState::new(
                requests_per_minute,
                Duration::from_secs(60),
            )),
        }
    }

    /// Builds the Axum router with all routes.
    pub fn router(&self) -> Router {
        // Build HTTP metrics layer (uses globally set MeterProvider)
        let metrics = axum_otel_metrics::HttpMetricsLayerBuilder::new().build();

        Router::new()
            .route("/health", get(handlers::health))
            .route("/api-docs/openapi.json", get(handlers::openapi_json))
            .route(
                "/api/parcels",
                post(handlers::register_parcel::<R>).get(handlers::list_parcels::<R>),
            )
            .route("/api/parcels/types", get(handlers::list_parcel_types::<R>))
            .route(
                "/api/parcels/bind-company",
                post(handlers::bind_company::<R>),
            )
            .route("/api/parcels/{id}", get(handlers::get_parcel::<R>))
            .route(
                "/api/companies",
                post(handlers::create_company::<R>).get(handlers::list_companies::<R>),
            )
            .route(
                "/api/tasks/price-update",
                post(handlers::trigger_price_update::<R>),
            )
            .layer(metrics)
            .layer(middleware::from_fn_with_state(
                self.rate_limiter.clone(),
                rate_limit_middleware,
            ))
            .layer(middleware::from_fn(session_middleware))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Runs the server on the given address with graceful shutdown.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        let sweeper = self.rate_limiter.spawn_sweeper();
        let served = axum::serve(
            listener,
            self.router()
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await;
        sweeper.abort();

        served.map_err(Into::into)
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
