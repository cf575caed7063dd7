use actix::prelude::*;
use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod actors;
mod api;
mod catalog;
mod clock;
mod config;
mod domain;
mod inventory;
mod metrics;
mod repository;

use actors::PromoterActor;
use catalog::InMemoryCatalog;
use clock::SystemClock;
use config::AppConfig;
use domain::order::{OrderLifecycleManager, Product, StaleOrderPromoter, ValidatorChain};
use inventory::StockLedger;
use repository::InMemoryOrderRepository;

#[actix::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,order_lifecycle=debug")),
        )
        .init();

    tracing::info!("Starting order lifecycle service");

    // === 1. Configuration ===
    let config = AppConfig::load()?;
    tracing::info!(
        host = %config.http.host,
        port = config.http.port,
        products = config.products.len(),
        cancellation_window_secs = config.lifecycle.cancellation_window_secs,
        "Configuration loaded"
    );

    // === 2. Prometheus metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!("Metrics registry created with {} metrics", metrics.registry().gather().len());

    // === 3. Seed catalog and ledger ===
    let catalog = Arc::new(InMemoryCatalog::from_products(
        config
            .products
            .iter()
            .map(|seed| Product::new(seed.id.clone(), seed.name.clone(), seed.price)),
    ));
    let ledger = Arc::new(StockLedger::from_seed(
        config.products.iter().map(|seed| (seed.id.clone(), seed.stock)),
    ));
    for seed in &config.products {
        tracing::debug!(
            product_id = %seed.id,
            stock = ?ledger.available(&seed.id),
            "Seeded product"
        );
    }
    tracing::info!(products = catalog.len(), "Catalog and stock ledger seeded");

    // === 4. Domain services ===
    let repository = Arc::new(InMemoryOrderRepository::new());
    let clock = Arc::new(SystemClock);

    let manager = OrderLifecycleManager::new(
        catalog,
        ledger.clone(),
        ValidatorChain::default_for(ledger),
        repository.clone(),
        clock.clone(),
    )
    .with_cancellation_window(config.cancellation_window())
    .with_metrics(metrics.clone());

    let promoter = StaleOrderPromoter::new(repository, clock)
        .with_stale_after(config.stale_after())
        .with_metrics(metrics.clone());

    // === 5. Background promoter ===
    let _promoter_actor =
        PromoterActor::new(Arc::new(promoter), config.promoter_interval()).start();

    // === 6. HTTP server ===
    let manager = web::Data::new(manager);
    let metrics = web::Data::from(metrics);

    tracing::info!(
        "Listening on http://{}:{}",
        config.http.host,
        config.http.port
    );

    HttpServer::new(move || {
        App::new()
            .app_data(manager.clone())
            .app_data(metrics.clone())
            .configure(api::configure)
            .configure(metrics::configure)
    })
    .bind((config.http.host.as_str(), config.http.port))?
    .run()
    .await?;

    tracing::info!("Order lifecycle service stopped");

    Ok(())
}
