//! Client example walking through a full delivery flow against a running server.
//!
//! Run with: cargo run -p delivery-app --example client_example --no-default-features --features sqlite

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use delivery_client::DeliveryClient;
use delivery_hex::{
    DeliveryService, PriceUpdateService, RateService, Scheduler, inbound::HttpServer,
};
use delivery_repo::build_repo;
use delivery_types::{ListParcelsQuery, ParcelTypeId, Rate};
use exchange_rates::{KvRateCache, StaticRateProvider};
use tempfile::tempdir;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt().with_env_filter("info").init();

    // Find an available port
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr: SocketAddr = listener.local_addr()?;
    let port = addr.port();
    drop(listener);

    // Use a temp file-backed SQLite DB
    let tmp = tempdir()?;
    let db_path = tmp.path().join("delivery.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    println!("🚀 Starting server on port {port}...");
    println!("   Database: {db_url}");

    // Build repository (handles connection and migration)
    let repo = Arc::new(build_repo(&db_url).await?);

    // Fixed rate so the demo does not depend on the public feed
    let rates = Arc::new(RateService::new(
        Arc::new(KvRateCache::new()),
        Arc::new(StaticRateProvider::new(Rate::new(80.0)?)),
        Duration::from_secs(300),
    ));
    let mut scheduler = Scheduler::new();
    scheduler.register(Arc::new(PriceUpdateService::new(repo.clone(), rates)));

    // Start server in background
    let server = HttpServer::new(DeliveryService::new(repo), Arc::new(scheduler));
    let server_addr = format!("127.0.0.1:{port}");
    tokio::spawn(async move {
        if let Err(e) = server.run(&server_addr).await {
            eprintln!("server error: {e}");
        }
    });

    // Wait for server to start
    tokio::time::sleep(Duration::from_millis(500)).await;

    let client = DeliveryClient::new(format!("http://127.0.0.1:{port}"));

    // ─────────────────────────────────────────────────────────────────────────
    // Demo: register, price and bind a parcel
    // ─────────────────────────────────────────────────────────────────────────

    let health = client.health().await?;
    println!("✅ Server health: {health}");

    let types = client.list_parcel_types().await?;
    println!("✅ Parcel types:");
    for t in &types {
        println!("   - {} ({})", t.name, t.type_id);
    }

    let parcel_id = client
        .register_parcel("Box", 1.2, ParcelTypeId::new(1), 50.0)
        .await?;
    println!("✅ Registered parcel Box (id={parcel_id})");
    if let Some(session) = client.session_id() {
        println!("   Session: {session}");
    }

    let parcel = client.get_parcel(parcel_id).await?;
    println!("   Delivery price before update: {:?}", parcel.delivery_price);

    let report = client.run_price_update().await?;
    println!(
        "✅ Price update {:?}: {} priced, {} failed",
        report.status, report.succeeded, report.failed
    );

    let parcel = client.get_parcel(parcel_id).await?;
    if let Some(price) = parcel.delivery_price.amount() {
        println!("   Delivery price: {price:.2} RUB");
    }

    let dhl = client.create_company("DHL").await?;
    println!("✅ Created company: {} (id={})", dhl.name, dhl.id);

    let bound = client.bind_company(parcel_id, dhl.id).await?;
    println!("✅ {}", bound.message);

    let again = client.bind_company(parcel_id, dhl.id).await;
    assert!(again.is_err());
    println!("✅ Second bind rejected: {}", again.unwrap_err());

    // A fresh client is a fresh session and sees nothing
    let stranger = DeliveryClient::new(format!("http://127.0.0.1:{port}"));
    let seen = stranger.list_parcels(&ListParcelsQuery::default()).await?;
    println!("✅ Another session sees {} parcels", seen.len());

    let parcels = client.list_parcels(&ListParcelsQuery::default()).await?;
    println!("\n📋 Parcels in this session:");
    for p in parcels {
        println!("   - {} ({}): {:?}", p.name, p.type_name, p.delivery_price);
    }

    println!("\n🎉 Example completed successfully!");

    Ok(())
}
