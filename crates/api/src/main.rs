//! API server entry point.

use std::sync::Arc;

use api::AppState;
use api::config::{Config, LogFormat};
use booking::{
    BookingOrchestrator, InMemoryPaymentGateway, LoggingNotifier, PayPalGateway, PaymentGateway,
};
use sqlx::postgres::PgPoolOptions;
use store::{InMemoryStore, PostgresStore, Store};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let (pretty, json) = match config.log_format {
        LogFormat::Pretty => (Some(tracing_subscriber::fmt::layer()), None),
        LogFormat::Json => (None, Some(tracing_subscriber::fmt::layer().json())),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .init();
}

async fn connect_store(config: &Config) -> Result<(Arc<dyn Store>, &'static str), BoxError> {
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            let store = PostgresStore::new(pool);
            store.run_migrations().await?;
            tracing::info!("using PostgreSQL storage");
            let store: Arc<dyn Store> = Arc::new(store);
            Ok((store, "postgres"))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, bookings will not survive a restart");
            let store: Arc<dyn Store> = Arc::new(InMemoryStore::new());
            Ok((store, "memory"))
        }
    }
}

fn select_gateway(config: &Config) -> (Arc<dyn PaymentGateway>, &'static str) {
    match &config.paypal {
        Some(paypal) => {
            tracing::info!(base_url = %paypal.base_url, "using PayPal gateway");
            let gateway: Arc<dyn PaymentGateway> = Arc::new(PayPalGateway::new(paypal.clone()));
            (gateway, "paypal")
        }
        None => {
            tracing::warn!("PayPal credentials not set, payments are simulated");
            let gateway: Arc<dyn PaymentGateway> = Arc::new(InMemoryPaymentGateway::new());
            (gateway, "simulated")
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env();
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Wire storage, gateway and notifier into the orchestrator
    let (store, storage) = connect_store(&config).await?;
    let (gateway, payment_gateway) = select_gateway(&config);
    let orchestrator = Arc::new(BookingOrchestrator::new(
        store,
        gateway,
        Arc::new(LoggingNotifier),
        config.booking.clone(),
    ));

    // 4. Start the expiry sweep
    let sweeper = api::spawn_expiry_sweeper(orchestrator.clone(), config.expiry_sweep_interval);

    // 5. Build the application
    let state = Arc::new(AppState {
        orchestrator,
        storage,
        payment_gateway,
    });
    let app = api::create_app(state, metrics_handle);

    // 6. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("server shut down gracefully");
    Ok(())
}
