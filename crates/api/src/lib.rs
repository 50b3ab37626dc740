//! HTTP API server for hostel bookings and payments.
//!
//! Provides REST endpoints for rooms, resident profiles, bookings and
//! payments, with structured logging (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use booking::{BookingConfig, BookingOrchestrator, InMemoryPaymentGateway, LoggingNotifier};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use store::InMemoryStore;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state for all handlers.
pub struct AppState {
    pub orchestrator: Arc<BookingOrchestrator>,
    /// Storage backend name, reported by `/health`.
    pub storage: &'static str,
    /// Payment gateway name, reported by `/health`.
    pub payment_gateway: &'static str,
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::system::health))
        .route("/rooms", post(routes::rooms::create).get(routes::rooms::list))
        .route("/rooms/{id}", get(routes::rooms::get))
        .route("/residents", post(routes::residents::register))
        .route("/residents/{id}", get(routes::residents::get))
        .route(
            "/bookings",
            post(routes::bookings::create).get(routes::bookings::list),
        )
        .route("/bookings/{reference}", get(routes::bookings::get))
        .route("/bookings/{reference}/cancel", post(routes::bookings::cancel))
        .route("/bookings/{reference}/refund", post(routes::bookings::refund))
        .route(
            "/bookings/{reference}/complete",
            post(routes::bookings::complete),
        )
        .route("/payments/orders", post(routes::payments::create_order))
        .route("/payments/capture", post(routes::payments::capture))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates application state backed by in-memory storage and a simulated
/// payment gateway.
pub fn create_default_state(config: BookingConfig) -> Arc<AppState> {
    let orchestrator = BookingOrchestrator::new(
        Arc::new(InMemoryStore::new()),
        Arc::new(InMemoryPaymentGateway::new()),
        Arc::new(LoggingNotifier),
        config,
    );
    Arc::new(AppState {
        orchestrator: Arc::new(orchestrator),
        storage: "memory",
        payment_gateway: "simulated",
    })
}

/// Spawns the background task that expires pending bookings whose payment
/// window has lapsed.
pub fn spawn_expiry_sweeper(
    orchestrator: Arc<BookingOrchestrator>,
    every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            metrics::counter!("expiry_sweeps_total").increment(1);
            match orchestrator.expire_pending(Utc::now()).await {
                Ok(0) => tracing::debug!("no stale pending bookings"),
                Ok(expired) => tracing::info!(expired, "expired stale pending bookings"),
                Err(err) => tracing::error!(error = %err, "expiry sweep failed"),
            }
        }
    })
}
