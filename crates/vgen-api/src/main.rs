//! Axum API server binary.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vgen_api::{create_router, metrics, ApiConfig, AppState};
use vgen_ledger::{CreditSettlement, InMemoryLedgerStore, InMemoryWalletStore};
use vgen_providers::{AdapterRegistry, ProviderCatalog, ProviderSettings};
use vgen_worker::{
    GenerationService, HttpAssemblyClient, HttpTelemetry, PricingConfig, ServiceDeps,
    TelemetrySink, TracingTelemetry, WorkerConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Install rustls crypto provider (required for rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    init_tracing()?;
    info!("Starting vgen-api");

    let config = ApiConfig::from_env();
    let worker_config = WorkerConfig::from_env();
    let pricing = PricingConfig::from_env();
    info!(
        host = %config.host,
        port = config.port,
        max_jobs = worker_config.max_concurrent_jobs,
        "Configuration loaded"
    );

    let catalog = Arc::new(ProviderCatalog::from_env().context("loading provider catalog")?);
    let settings = ProviderSettings::from_env(&catalog);
    let adapters = Arc::new(
        AdapterRegistry::from_settings(&catalog, &settings).context("building provider adapters")?,
    );
    info!(providers = catalog.len(), "Provider catalog loaded");

    let assembly = Arc::new(
        HttpAssemblyClient::with_timeout(&worker_config.assembly_url, worker_config.attempt_timeout)
            .context("building assembly client")?,
    );
    let telemetry: Arc<dyn TelemetrySink> = match &worker_config.telemetry_url {
        Some(url) => Arc::new(HttpTelemetry::new(url.clone(), reqwest::Client::new())),
        None => Arc::new(TracingTelemetry),
    };

    // The relational ledger is an external collaborator; the in-memory stores
    // stand in for it in this binary.
    let settlement = Arc::new(CreditSettlement::new(
        Arc::new(InMemoryLedgerStore::new()),
        Arc::new(InMemoryWalletStore::new()),
    ));

    let service = Arc::new(GenerationService::new(
        worker_config,
        pricing,
        ServiceDeps {
            catalog,
            adapters,
            assembly,
            settlement,
            telemetry,
        },
    ));

    let metrics_enabled = std::env::var("METRICS_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);
    let metrics_handle = if metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics().context("installing Prometheus recorder")?)
    } else {
        None
    };

    let addr = config.bind_address();
    let app = create_router(AppState::new(config, Arc::clone(&service)), metrics_handle);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    service.shutdown().await;
    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("vgen=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
