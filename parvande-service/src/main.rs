use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod api;
mod config;
mod db;
mod error;
mod i18n;
mod ocr;
mod service;
mod storage;

use crate::config::{RuntimeConfig, load_static_config};
use crate::db::Database;
use crate::i18n::I18n;
use crate::ocr::{OcrService, build_engine};
use crate::service::ArchiveService;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    init_logging();

    info!("Starting Parvande service v{}", env!("CARGO_PKG_VERSION"));

    let metrics = PrometheusBuilder::new().install_recorder()?;

    // Load static configuration (server binding, storage path, engine)
    // We need to load this first to know where the database is
    let static_config = load_static_config()?;

    info!(
        host = %static_config.server.host,
        port = static_config.server.port,
        locale = %static_config.server.locale,
        "Static configuration loaded"
    );

    // Ensure data directory exists
    std::fs::create_dir_all(&static_config.storage.data_dir)?;

    // Initialize database
    let db_path = static_config.storage.data_dir.join("parvande.db");
    let db = Arc::new(Database::open(&db_path)?);
    info!(path = %db_path.display(), "Database initialized");

    // Load runtime config (static + dynamic with DB overrides)
    let runtime_config = Arc::new(RuntimeConfig::load(static_config, &db)?);
    info!("Runtime configuration loaded with DB settings");

    let locale = runtime_config.static_config.server.locale.clone();
    let i18n = Arc::new(I18n::new(&locale));

    // The service keeps running without an engine; extractions that need one
    // report it as unavailable
    let engine = build_engine(&runtime_config.static_config.engine);
    match engine.unavailable_reason() {
        None => info!(
            languages = %runtime_config.static_config.engine.languages,
            "Recognition engine ready"
        ),
        Some(reason) => warn!(reason = %reason, "Recognition engine unavailable"),
    }
    let ocr = Arc::new(OcrService::new(engine, i18n.clone(), locale));

    // Initialize the service
    let service = Arc::new(ArchiveService::new(
        db,
        runtime_config.clone(),
        ocr,
        i18n,
    ));

    // Records left in processing never revert to pending
    service.recover_stale_queue_items()?;

    let shutdown = CancellationToken::new();

    // Start the OCR queue worker (resumes any pending records)
    let worker = if runtime_config.static_config.server.run_worker {
        Some(ArchiveService::start_queue_worker(
            service.clone(),
            shutdown.clone(),
        ))
    } else {
        info!("Queue worker disabled by configuration");
        None
    };

    // Periodic recorder upkeep so histograms do not grow unbounded
    let upkeep_handle = metrics.clone();
    let upkeep_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        loop {
            tokio::select! {
                _ = upkeep_shutdown.cancelled() => break,
                _ = interval.tick() => upkeep_handle.run_upkeep(),
            }
        }
    });

    // Build the router
    let app = api::router(service, metrics);

    // Start the server
    let addr = format!(
        "{}:{}",
        runtime_config.static_config.server.host, runtime_config.static_config.server.port
    );
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
        .await?;

    // The worker finishes its current item before stopping
    shutdown.cancel();
    if let Some(worker) = worker {
        if let Err(e) = worker.await {
            warn!(error = %e, "Queue worker ended abnormally");
        }
    }

    info!("Parvande service stopped");
    Ok(())
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        shutdown.cancelled().await;
        return;
    }
    info!("Shutdown signal received");
    shutdown.cancel();
}

fn init_logging() {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let format = fmt::format()
        .with_target(true)
        .with_thread_ids(true)
        .compact();

    // Use RUST_LOG if set, otherwise default to info level for our crate
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("parvande_service=info"));

    tracing_subscriber::registry()
        .with(fmt::layer().event_format(format))
        .with(filter)
        .init();
}
