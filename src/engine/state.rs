//! Watch state: the single owned record of what is being watched and
//! which facts have already been seen or acted upon.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::types::{FactId, FocusSelection, ReleaseKey, ReleaseRecord};

#[derive(Debug, Clone, Default)]
pub struct WatchState {
    pub armed: bool,
    pub focus: Option<FocusSelection>,
    /// Currency used for rule lookup.
    pub asset: String,
    /// Traded pair, e.g. `EUR/USD`.
    pub pair: String,
    pub armed_at: Option<DateTime<Utc>>,
    /// Fingerprint of the last evaluated fact of the focused release.
    pub last_seen_fact_key: Option<String>,
    /// Whether a release already had a published value when first seen.
    pub initial_had_fact: HashMap<ReleaseKey, bool>,
    /// Releases snapshotted since the current arm.
    pub(crate) observed_since_arm: HashSet<ReleaseKey>,
    /// Facts already acted upon.
    pub processed: HashSet<FactId>,
    /// Set after a successful click; the next tick past it disarms.
    pub disarm_due: Option<DateTime<Utc>>,
}

impl WatchState {
    /// Fresh state carrying over the grow-only bookkeeping.
    pub fn with_history(
        processed: HashSet<FactId>,
        initial_had_fact: HashMap<ReleaseKey, bool>,
    ) -> Self {
        Self {
            processed,
            initial_had_fact,
            ..Self::default()
        }
    }

    /// Reset the per-arm fields. `processed` and `initial_had_fact` survive.
    pub fn arm(
        &mut self,
        focus: FocusSelection,
        asset: &str,
        pair: &str,
        armed_at: DateTime<Utc>,
    ) {
        self.armed = true;
        self.focus = Some(focus);
        self.asset = asset.to_string();
        self.pair = pair.to_string();
        self.armed_at = Some(armed_at);
        self.last_seen_fact_key = None;
        self.observed_since_arm.clear();
        self.disarm_due = None;
    }

    pub fn disarm(&mut self) {
        self.armed = false;
        self.disarm_due = None;
    }

    /// Whether the watch has been armed for longer than `max`.
    pub fn expired(&self, now: DateTime<Utc>, max: Duration) -> bool {
        match self.armed_at {
            Some(at) => now - at > max,
            None => false,
        }
    }

    pub fn is_processed(&self, record: &ReleaseRecord) -> bool {
        self.processed.contains(&record.fact_id())
    }

    /// Returns false if the fact was already recorded.
    pub fn mark_processed(&mut self, record: &ReleaseRecord) -> bool {
        self.processed.insert(record.fact_id())
    }

    pub fn had_fact_initially(&self, record: &ReleaseRecord) -> bool {
        self.initial_had_fact.get(&record.key()).copied().unwrap_or(false)
    }

    /// Snapshot the release on its first sighting since arming.
    ///
    /// Once a release is known to have had a fact the entry stays true, so a
    /// stale value can never look fresh after a re-arm. Returns whether the
    /// snapshot map changed.
    pub fn observe(&mut self, record: &ReleaseRecord) -> bool {
        let key = record.key();
        if !self.observed_since_arm.insert(key.clone()) {
            return false;
        }
        let previous = self.initial_had_fact.get(&key).copied();
        let had_fact = previous.unwrap_or(false) || record.has_fact();
        self.initial_had_fact.insert(key, had_fact);
        previous != Some(had_fact)
    }

    /// Drop all fact bookkeeping.
    pub fn reset_history(&mut self) {
        self.processed.clear();
        self.initial_had_fact.clear();
        self.observed_since_arm.clear();
        self.last_seen_fact_key = None;
    }

    pub fn status(&self, max: Duration) -> WatchStatus {
        WatchStatus {
            armed: self.armed,
            focus: self.focus.clone(),
            asset: self.asset.clone(),
            pair: self.pair.clone(),
            armed_at: self.armed_at,
            expires_at: self.armed_at.map(|at| at + max),
            last_seen_fact_key: self.last_seen_fact_key.clone(),
            processed_count: self.processed.len(),
            disarm_due: self.disarm_due,
        }
    }
}

/// Serializable snapshot of the watch, for the control API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WatchStatus {
    pub armed: bool,
    pub focus: Option<FocusSelection>,
    pub asset: String,
    pub pair: String,
    pub armed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub last_seen_fact_key: Option<String>,
    pub processed_count: usize,
    pub disarm_due: Option<DateTime<Utc>>,
}
