//! Creator paywall server.
//!
//! Wires configuration, storage, the payment network verifier, the
//! reconciliation coordinator, and the HTTP API, then serves until SIGINT or
//! SIGTERM.

use std::error::Error;
use std::sync::Arc;

use axum::http::{HeaderValue, Method};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use creator_paywall::adapters::http::{api_router, AppState};
use creator_paywall::adapters::memory::{
    InMemoryContentOwnership, InMemoryEntitlementStore, InMemoryPaymentStore,
};
use creator_paywall::adapters::network::{PlatformApiConfig, PlatformApiVerifier};
use creator_paywall::adapters::postgres::{
    PostgresContentOwnership, PostgresEntitlementStore, PostgresPaymentStore,
};
use creator_paywall::adapters::TracingEventPublisher;
use creator_paywall::application::reconciliation::{
    IncompletePaymentSweeper, ReconciliationCoordinator,
};
use creator_paywall::config::{
    AppConfig, DatabaseConfig, PaymentNetworkConfig, ServerConfig, ValidationError,
};
use creator_paywall::ports::{
    ContentOwnership, EntitlementStore, PaymentRecordStore, VerificationContract,
};

struct Stores {
    payments: Arc<dyn PaymentRecordStore>,
    entitlements: Arc<dyn EntitlementStore>,
    content_ownership: Arc<dyn ContentOwnership>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    let stores = build_stores(&config.database).await?;
    let verifier = build_verifier(&config.payment_network)?;

    let coordinator = Arc::new(ReconciliationCoordinator::new(
        stores.payments.clone(),
        stores.entitlements.clone(),
        verifier,
        Arc::new(TracingEventPublisher::new()),
        config.payment_network.verification_timeout(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_handle = if config.reconciliation.enable_sweeper {
        let sweeper = IncompletePaymentSweeper::new(
            stores.payments.clone(),
            coordinator.clone(),
            config.reconciliation.sweeper_config(),
        );
        Some(tokio::spawn(async move { sweeper.run(shutdown_rx).await }))
    } else {
        info!("Incomplete payment sweeper disabled");
        None
    };

    let state = AppState::new(
        coordinator,
        stores.payments,
        stores.entitlements,
        stores.content_ownership,
    );
    let app = api_router()
        .with_state(state)
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(cors_layer(&config.server))
        .layer(TraceLayer::new_for_http());

    let addr = config.server.listen_addr;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, environment = ?config.server.environment, "Creator paywall listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = sweeper_handle {
        if let Err(err) = handle.await {
            warn!(error = %err, "Sweeper task ended abnormally");
        }
    }
    info!("Shutdown complete");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    if config.is_production() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(filter)
            .init();
    }
}

async fn build_stores(config: &DatabaseConfig) -> Result<Stores, Box<dyn Error + Send + Sync>> {
    let Some(url) = config.url() else {
        warn!("No database URL configured, using in-memory stores");
        return Ok(Stores {
            payments: Arc::new(InMemoryPaymentStore::new()),
            entitlements: Arc::new(InMemoryEntitlementStore::new()),
            content_ownership: Arc::new(InMemoryContentOwnership::new()),
        });
    };

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .connect(url)
        .await?;

    if config.run_migrations {
        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&pool).await?;
    }

    Ok(Stores {
        payments: Arc::new(PostgresPaymentStore::new(pool.clone())),
        entitlements: Arc::new(PostgresEntitlementStore::new(pool.clone())),
        content_ownership: Arc::new(PostgresContentOwnership::new(pool)),
    })
}

fn build_verifier(
    config: &PaymentNetworkConfig,
) -> Result<Arc<dyn VerificationContract>, Box<dyn Error + Send + Sync>> {
    let api_key = config
        .api_key
        .clone()
        .ok_or(ValidationError::MissingRequired("PAYMENT_NETWORK__API_KEY"))?;
    info!(base_url = %config.api_base_url, sandbox = config.sandbox, "Using payment network platform API");
    let api_config = PlatformApiConfig::new(api_key)
        .with_base_url(config.api_base_url.clone())
        .with_request_timeout(config.verification_timeout());
    Ok(Arc::new(PlatformApiVerifier::new(api_config)?))
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Could not listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Could not listen for SIGTERM");
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
    info!("Shutdown signal received");
}
