//! Dashboard: Axum control API for the watch.
//!
//! Serves a JSON API over the runner handle and the session manager.
//! CORS enabled so the page-side panel can call it.

pub mod error;
pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

pub use error::ApiError;
pub use routes::{AppState, DashboardState};

/// Start the control API server.
///
/// Binds before returning so a port clash fails startup; serving runs in
/// a background task.
pub async fn spawn_dashboard(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind dashboard port {port}"))?;
    info!(port, "Control API listening on http://localhost:{port}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "Control API server error");
        }
    });

    Ok(())
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/status", get(routes::get_status))
        .route("/api/arm", post(routes::arm))
        .route("/api/disarm", post(routes::disarm))
        .route("/api/reset", post(routes::reset))
        .route("/api/refresh", post(routes::refresh))
        .route("/api/releases", get(routes::get_releases))
        .route("/api/trades", get(routes::get_trades))
        .route("/api/click", post(routes::click))
        .route("/api/login", post(routes::login))
        .route("/api/logout", post(routes::logout))
        .route("/api/session", get(routes::get_session))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
