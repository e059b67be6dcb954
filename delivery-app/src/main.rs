//! # Delivery Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Initialize the repository adapter
//! - Build the rate cache, rate provider and the price update job
//! - Schedule the job and start the HTTP server

mod config;

use std::sync::Arc;

use opentelemetry::global;
use opentelemetry_sdk::{propagation::TraceContextPropagator, trace as sdktrace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use delivery_hex::{
    DeliveryService, PriceUpdateService, RateService, Scheduler, UPDATE_DELIVERY_PRICES,
    inbound::HttpServer,
};
use delivery_repo::build_repo;
use delivery_types::RateProvider;
use exchange_rates::{CbrRateProvider, KvRateCache, StaticRateProvider};

use config::{Config, RateSource};

fn init_tracer() -> anyhow::Result<(sdktrace::Tracer, sdktrace::SdkTracerProvider)> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // Use gRPC exporter with batch processing (non-blocking)
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()?;

    let provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();

    global::set_tracer_provider(provider.clone());

    use opentelemetry::trace::TracerProvider as _;
    Ok((provider.tracer("delivery-service"), provider))
}

fn rate_provider(source: &RateSource) -> anyhow::Result<Arc<dyn RateProvider>> {
    Ok(match source {
        RateSource::Feed { url, timeout } => {
            tracing::info!("Using rate feed: {}", url);
            Arc::new(CbrRateProvider::new(url.clone(), *timeout)?)
        }
        RateSource::Static(rate) => {
            tracing::warn!("Using static USD rate {}", rate);
            Arc::new(StaticRateProvider::new(*rate))
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // OpenTelemetry export is opt-in
    let otel = if std::env::var_os("OTEL_EXPORTER_OTLP_ENDPOINT").is_some() {
        Some(init_tracer()?)
    } else {
        None
    };
    let telemetry = otel
        .as_ref()
        .map(|(tracer, _)| tracing_opentelemetry::layer().with_tracer(tracer.clone()));

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,delivery_app=debug,delivery_hex=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry)
        .init();

    // Load configuration
    let config = Config::from_env()?;

    tracing::info!("Starting delivery server on port {}", config.port);
    tracing::info!("Using database: {}", config.database_url);

    // Build repository (handles connection and migration)
    let repo = Arc::new(build_repo(&config.database_url).await?);

    // Exchange rate lookup shared by every price update run
    let rates = Arc::new(RateService::new(
        Arc::new(KvRateCache::new()),
        rate_provider(&config.rate_source)?,
        config.rate_ttl,
    ));

    let mut scheduler = Scheduler::new();
    scheduler.register(Arc::new(PriceUpdateService::new(repo.clone(), rates)));
    let scheduler = Arc::new(scheduler);

    let price_job = scheduler.spawn_interval(UPDATE_DELIVERY_PRICES, config.price_update_interval)?;

    // Create and run the HTTP server
    let server = HttpServer::with_rate_limit(
        DeliveryService::new(repo),
        scheduler,
        config.rate_limit_per_minute,
    );
    let addr = format!("0.0.0.0:{}", config.port);

    let result = server.run(&addr).await;

    price_job.abort();

    // Ensure traces are flushed before exit
    if let Some((_, provider)) = otel {
        let _ = provider.shutdown();
    }
    result
}
