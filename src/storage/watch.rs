//! Typed access to every persisted key.
//!
//! Writes are fire-and-forget: a failed write is logged and swallowed so
//! persistence problems never interrupt the watch loop. Reads that fail to
//! parse are treated as absent.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::warn;

use super::KeyValueStore;
use crate::types::{FactId, FocusSelection, ReleaseKey, ReleaseRecord, TradeLogEntry};

const KEY_WATCH_SESSION: &str = "watch_session";
const KEY_SELECTION: &str = "selection";
const KEY_PROCESSED: &str = "processed_facts";
const KEY_INITIAL_FACTS: &str = "initial_facts";
const KEY_TRADE_HISTORY: &str = "trade_history";
const KEY_LATEST_RELEASES: &str = "latest_releases";
const KEY_AUTH_TOKEN: &str = "auth_token";
const KEY_EXPECTED_BID: &str = "expected_bid";
const KEY_USER_BID: &str = "user_bid";

/// Armed-watch snapshot written on arm and cleared on disarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedWatch {
    pub armed: bool,
    pub focus: FocusSelection,
    pub asset: String,
    pub pair: String,
    pub armed_at: DateTime<Utc>,
}

/// The user's last selection; survives disarm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedSelection {
    pub focus: FocusSelection,
    pub asset: String,
    pub pair: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct InitialFactEntry {
    release: ReleaseKey,
    had_fact: bool,
}

#[derive(Clone)]
pub struct WatchStore {
    inner: Arc<dyn KeyValueStore>,
}

impl WatchStore {
    pub fn new(inner: Arc<dyn KeyValueStore>) -> Self {
        Self { inner }
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.inner.get(key) {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(v) => Some(v),
                Err(e) => {
                    warn!(key, error = %e, "Ignoring unreadable persisted value");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "Failed to read persisted value");
                None
            }
        }
    }

    fn write<T: Serialize>(&self, key: &str, value: &T) {
        let result = serde_json::to_value(value)
            .map_err(anyhow::Error::from)
            .and_then(|v| self.inner.set(key, v));
        if let Err(e) = result {
            warn!(key, error = %e, "Failed to persist value");
        }
    }

    fn delete(&self, key: &str) {
        if let Err(e) = self.inner.remove(key) {
            warn!(key, error = %e, "Failed to remove persisted value");
        }
    }

    // -- Watch session ---------------------------------------------------

    pub fn save_watch(&self, watch: &PersistedWatch) {
        self.write(KEY_WATCH_SESSION, watch);
        self.write(
            KEY_SELECTION,
            &PersistedSelection {
                focus: watch.focus.clone(),
                asset: watch.asset.clone(),
                pair: watch.pair.clone(),
            },
        );
    }

    pub fn load_watch(&self) -> Option<PersistedWatch> {
        self.read(KEY_WATCH_SESSION)
    }

    pub fn clear_watch(&self) {
        self.delete(KEY_WATCH_SESSION);
    }

    pub fn load_selection(&self) -> Option<PersistedSelection> {
        self.read(KEY_SELECTION)
    }

    // -- Fact bookkeeping ------------------------------------------------

    pub fn save_processed(&self, processed: &HashSet<FactId>) {
        let mut facts: Vec<&FactId> = processed.iter().collect();
        facts.sort();
        self.write(KEY_PROCESSED, &facts);
    }

    pub fn load_processed(&self) -> HashSet<FactId> {
        self.read::<Vec<FactId>>(KEY_PROCESSED)
            .unwrap_or_default()
            .into_iter()
            .collect()
    }

    pub fn save_initial_facts(&self, snapshot: &HashMap<ReleaseKey, bool>) {
        let mut entries: Vec<InitialFactEntry> = snapshot
            .iter()
            .map(|(release, had_fact)| InitialFactEntry {
                release: release.clone(),
                had_fact: *had_fact,
            })
            .collect();
        entries.sort_by(|a, b| a.release.cmp(&b.release));
        self.write(KEY_INITIAL_FACTS, &entries);
    }

    pub fn load_initial_facts(&self) -> HashMap<ReleaseKey, bool> {
        self.read::<Vec<InitialFactEntry>>(KEY_INITIAL_FACTS)
            .unwrap_or_default()
            .into_iter()
            .map(|e| (e.release, e.had_fact))
            .collect()
    }

    // -- Trade history ---------------------------------------------------

    pub fn append_trade(&self, entry: &TradeLogEntry) -> usize {
        let mut history = self.load_trades();
        history.push(entry.clone());
        self.write(KEY_TRADE_HISTORY, &history);
        history.len()
    }

    pub fn load_trades(&self) -> Vec<TradeLogEntry> {
        self.read(KEY_TRADE_HISTORY).unwrap_or_default()
    }

    // -- Calendar cache --------------------------------------------------

    pub fn save_releases(&self, releases: &[ReleaseRecord]) {
        self.write(KEY_LATEST_RELEASES, &releases);
    }

    pub fn load_releases(&self) -> Vec<ReleaseRecord> {
        self.read(KEY_LATEST_RELEASES).unwrap_or_default()
    }

    // -- Session ---------------------------------------------------------

    pub fn save_token(&self, token: &str) {
        self.write(KEY_AUTH_TOKEN, &token);
    }

    pub fn load_token(&self) -> Option<String> {
        self.read(KEY_AUTH_TOKEN)
    }

    pub fn save_expected_bid(&self, bid: &str) {
        self.write(KEY_EXPECTED_BID, &bid);
    }

    pub fn load_expected_bid(&self) -> Option<String> {
        self.read(KEY_EXPECTED_BID)
    }

    pub fn save_user_bid(&self, bid: &str) {
        self.write(KEY_USER_BID, &bid);
    }

    pub fn load_user_bid(&self) -> Option<String> {
        self.read(KEY_USER_BID)
    }

    /// Drop the session token and the bound BID.
    pub fn clear_session(&self) {
        self.delete(KEY_AUTH_TOKEN);
        self.delete(KEY_EXPECTED_BID);
    }
}
