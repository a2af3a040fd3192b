//! Control API route handlers.
//!
//! All endpoints return JSON. Watch operations go through the runner's
//! `WatchHandle`; session operations go to the `SessionManager` directly.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::ApiError;
use crate::auth::{SessionManager, SessionStatus};
use crate::engine::{WatchHandle, WatchStatus};
use crate::types::{Direction, ReleaseKey, ReleaseRecord, TradeLogEntry, WatchError};

const REASON_LOGOUT: &str = "logged out";

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

pub struct DashboardState {
    pub watch: WatchHandle,
    /// `None` when the auth service is disabled.
    pub session: Option<Arc<SessionManager>>,
}

pub type AppState = Arc<DashboardState>;

impl DashboardState {
    pub fn new(watch: WatchHandle, session: Option<Arc<SessionManager>>) -> Self {
        Self { watch, session }
    }

    fn session(&self) -> Result<&Arc<SessionManager>, ApiError> {
        self.session
            .as_ref()
            .ok_or_else(|| WatchError::NotFound("auth is disabled".into()).into())
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ArmRequest {
    pub event_name: String,
    pub currency_code: String,
    pub asset: String,
    pub pair: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DisarmRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReleasesQuery {
    #[serde(default)]
    pub min_importance: Option<u8>,
}

#[derive(Debug, Deserialize)]
pub struct ClickRequest {
    pub direction: Direction,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct ClickResponse {
    pub clicked: bool,
    pub direction: Direction,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub enabled: bool,
    #[serde(flatten)]
    pub status: Option<SessionStatus>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn get_status(State(state): State<AppState>) -> Result<Json<WatchStatus>, ApiError> {
    Ok(Json(state.watch.status().await?))
}

pub async fn arm(
    State(state): State<AppState>,
    Json(req): Json<ArmRequest>,
) -> Result<Json<WatchStatus>, ApiError> {
    let focus = ReleaseKey::new(req.event_name.trim(), req.currency_code.trim());
    Ok(Json(state.watch.arm(focus, &req.asset, &req.pair).await?))
}

pub async fn disarm(
    State(state): State<AppState>,
    body: Option<Json<DisarmRequest>>,
) -> Result<Json<WatchStatus>, ApiError> {
    let reason = body.and_then(|Json(b)| b.reason).unwrap_or_default();
    Ok(Json(state.watch.disarm(&reason).await?))
}

pub async fn reset(State(state): State<AppState>) -> Result<Json<WatchStatus>, ApiError> {
    Ok(Json(state.watch.reset().await?))
}

pub async fn refresh(State(state): State<AppState>) -> Result<Json<Vec<ReleaseRecord>>, ApiError> {
    Ok(Json(state.watch.refresh().await?))
}

pub async fn get_releases(
    State(state): State<AppState>,
    Query(q): Query<ReleasesQuery>,
) -> Result<Json<Vec<ReleaseRecord>>, ApiError> {
    let min = q.min_importance.unwrap_or(0);
    Ok(Json(state.watch.releases(min).await?))
}

pub async fn get_trades(State(state): State<AppState>) -> Result<Json<Vec<TradeLogEntry>>, ApiError> {
    Ok(Json(state.watch.trades().await?))
}

pub async fn click(
    State(state): State<AppState>,
    Json(req): Json<ClickRequest>,
) -> Result<Json<ClickResponse>, ApiError> {
    state.watch.click(req.direction).await?;
    Ok(Json(ClickResponse { clicked: true, direction: req.direction }))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.session()?;
    session
        .login(&req.login, &SecretString::new(req.password))
        .await?;
    Ok(Json(SessionResponse { enabled: true, status: Some(session.status()) }))
}

pub async fn logout(State(state): State<AppState>) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.session()?;
    session.logout();
    state.watch.disarm(REASON_LOGOUT).await?;
    info!("Session closed from the control API");
    Ok(Json(SessionResponse { enabled: true, status: Some(session.status()) }))
}

pub async fn get_session(State(state): State<AppState>) -> Json<SessionResponse> {
    Json(SessionResponse {
        enabled: state.session.is_some(),
        status: state.session.as_ref().map(|s| s.status()),
    })
}
