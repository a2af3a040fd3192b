//! Session manager.
//!
//! Reads the broker account id (BID) from the broker tab, logs in against
//! the auth service and re-verifies the session periodically. A session is
//! bound to the BID it was created with; a different account on the broker
//! tab invalidates it.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::AuthApi;
use crate::browser::{BrokerClassifier, BrowserBridge};
use crate::config::{AuthConfig, BrokerConfig};
use crate::storage::WatchStore;
use crate::types::WatchError;

const BID_PREFIX: &str = "id ";
const DEFAULT_INVALID_REASON: &str = "subscription inactive";
pub const REASON_USER_CHANGED: &str = "user changed";

/// Result of a periodic session check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCheck {
    Valid,
    /// The session was dropped; the watch must stop.
    Invalid(String),
    LoggedOut,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub logged_in: bool,
    pub user_bid: Option<String>,
    pub expected_bid: Option<String>,
}

pub struct SessionManager {
    api: Arc<dyn AuthApi>,
    bridge: Arc<dyn BrowserBridge>,
    classifier: BrokerClassifier,
    bid_selector: String,
    bid_attribute: String,
    bid_attempts: u32,
    bid_retry: Duration,
    store: WatchStore,
}

impl SessionManager {
    pub fn new(
        api: Arc<dyn AuthApi>,
        bridge: Arc<dyn BrowserBridge>,
        broker: &BrokerConfig,
        auth: &AuthConfig,
        store: WatchStore,
    ) -> Self {
        Self {
            api,
            bridge,
            classifier: BrokerClassifier::new(broker),
            bid_selector: broker.bid_selector.clone(),
            bid_attribute: broker.bid_attribute.clone(),
            bid_attempts: auth.bid_attempts.max(1),
            bid_retry: Duration::from_millis(auth.bid_retry_ms),
            store,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.store.load_token().is_some()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            logged_in: self.is_logged_in(),
            user_bid: self.store.load_user_bid(),
            expected_bid: self.store.load_expected_bid(),
        }
    }

    /// One attempt at reading the BID off the broker tab.
    async fn read_bid(&self) -> Option<String> {
        let tab = match self.classifier.find_candidate_tab(self.bridge.as_ref()).await {
            Ok(Some(tab)) => tab,
            Ok(None) => return None,
            Err(e) => {
                debug!(error = %e, "Broker tab lookup failed");
                return None;
            }
        };
        let raw = self
            .bridge
            .read_attribute(tab.id, &self.bid_selector, &self.bid_attribute)
            .await
            .unwrap_or_else(|e| {
                debug!(tab = tab.id, error = %e, "BID read failed");
                None
            })?;
        parse_bid(&raw)
    }

    /// Read the BID, retrying while the broker page is still rendering.
    pub async fn acquire_bid(&self) -> Option<String> {
        for attempt in 1..=self.bid_attempts {
            if let Some(bid) = self.read_bid().await {
                self.store.save_user_bid(&bid);
                return Some(bid);
            }
            if attempt < self.bid_attempts {
                debug!(attempt, "BID not available yet, retrying");
                tokio::time::sleep(self.bid_retry).await;
            }
        }
        warn!(attempts = self.bid_attempts, "Could not read broker account id");
        None
    }

    pub async fn login(&self, login: &str, password: &SecretString) -> Result<(), WatchError> {
        if login.trim().is_empty() || password.expose_secret().is_empty() {
            return Err(WatchError::InvalidArgument("login and password are required".into()));
        }
        let bid = self
            .acquire_bid()
            .await
            .ok_or_else(|| WatchError::Auth("broker account id not found".into()))?;

        let resp = self
            .api
            .login(login.trim(), password.expose_secret(), &bid)
            .await
            .map_err(|e| WatchError::Transient(format!("{e:#}")))?;

        match (resp.success, resp.token) {
            (true, Some(token)) if !token.is_empty() => {
                self.store.save_token(&token);
                self.store.save_expected_bid(&bid);
                info!(%bid, "Logged in");
                Ok(())
            }
            _ => Err(WatchError::Auth(
                resp.message.unwrap_or_else(|| "login failed".to_string()),
            )),
        }
    }

    pub fn logout(&self) {
        self.store.clear_session();
        info!("Logged out");
    }

    /// Re-check the session. Network trouble never invalidates it.
    pub async fn verify(&self) -> SessionCheck {
        let Some(token) = self.store.load_token().map(SecretString::new) else {
            return SessionCheck::LoggedOut;
        };

        let Some(bid) = self.acquire_bid().await else {
            debug!("No BID on the broker tab, keeping session");
            return SessionCheck::Valid;
        };

        if let Some(expected) = self.store.load_expected_bid() {
            if expected != bid {
                warn!(%expected, actual = %bid, "Broker account changed");
                return self.invalidate(REASON_USER_CHANGED.to_string());
            }
        }

        match self.api.verify(token.expose_secret(), &bid).await {
            Ok(resp) if resp.success && resp.subscription_active => {
                debug!(%bid, "Session verified");
                SessionCheck::Valid
            }
            Ok(resp) => self.invalidate(
                resp.message.unwrap_or_else(|| DEFAULT_INVALID_REASON.to_string()),
            ),
            Err(e) => {
                warn!(error = %e, "Session verification failed, keeping session");
                SessionCheck::Valid
            }
        }
    }

    fn invalidate(&self, reason: String) -> SessionCheck {
        self.store.clear_session();
        warn!(%reason, "Session invalidated");
        SessionCheck::Invalid(reason)
    }
}

fn parse_bid(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let bid = raw.strip_prefix(BID_PREFIX).unwrap_or(raw).trim();
    (!bid.is_empty()).then(|| bid.to_string())
}
