//! Subscription session.
//!
//! Arming the watch requires an active subscription session tied to the
//! broker account that is logged in on the broker tab (the "BID").
//!
//! - `AuthApi`: the remote auth service (login / verify)
//! - `AuthClient`: reqwest implementation of `AuthApi`
//! - `session::SessionManager`: BID acquisition, login, periodic verify

pub mod session;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

pub use session::{SessionCheck, SessionManager, SessionStatus};

const AUTH_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct LoginResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub subscription_active: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// The subscription backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, login: &str, password: &str, bid: &str) -> Result<LoginResponse>;

    /// `bid` is empty when the broker account could not be read.
    async fn verify(&self, token: &str, bid: &str) -> Result<VerifyResponse>;
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    login: &'a str,
    password: &'a str,
    bid: &'a str,
}

#[derive(Serialize)]
struct VerifyRequest<'a> {
    token: &'a str,
    bid: Option<&'a str>,
}

pub struct AuthClient {
    http: Client,
    base_url: String,
}

impl AuthClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(AUTH_TIMEOUT_SECS))
            .build()
            .context("Failed to build auth HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl AuthApi for AuthClient {
    async fn login(&self, login: &str, password: &str, bid: &str) -> Result<LoginResponse> {
        let url = format!("{}/login", self.base_url);
        debug!(%url, login, bid, "Auth login");
        let resp = self
            .http
            .post(&url)
            .json(&LoginRequest { login, password, bid })
            .send()
            .await
            .context("Auth login request failed")?;
        // Rejections come back as JSON with a message, whatever the status.
        resp.json::<LoginResponse>()
            .await
            .context("Failed to parse auth login response")
    }

    async fn verify(&self, token: &str, bid: &str) -> Result<VerifyResponse> {
        let url = format!("{}/verify", self.base_url);
        let bid = (!bid.is_empty()).then_some(bid);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&VerifyRequest { token, bid })
            .send()
            .await
            .context("Auth verify request failed")?;
        resp.json::<VerifyResponse>()
            .await
            .context("Failed to parse auth verify response")
    }
}
