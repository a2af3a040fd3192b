//! Lifecycle controller.
//!
//! Owns the watch state and drives one detection tick at a time:
//! expiry check → scrape → detect → resolve → execute. Arming persists the
//! session so a restart can resume it with the original time budget.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::detector::{self, Detection};
use super::executor::ActionExecutor;
use super::state::{WatchState, WatchStatus};
use crate::calendar::CalendarSource;
use crate::notify::{Notifier, NOTIFICATION_TITLE};
use crate::storage::{PersistedWatch, WatchStore};
use crate::strategy;
use crate::types::{Direction, FocusSelection, ReleaseRecord, TradeLogEntry, WatchError};

pub const REASON_MAX_DURATION: &str = "max duration exceeded";
pub const REASON_TRADE_DONE: &str = "trade executed";
pub const REASON_MANUAL: &str = "disarmed by user";

/// What a single detection tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not armed; nothing ran.
    Idle,
    /// The tick disarmed the watch instead of scraping.
    Disarmed(String),
    /// The calendar could not be scraped.
    ScrapeFailed,
    /// Scraped, but no new fact for the focused release.
    NoFact,
    /// A new fact that does not qualify for a trade.
    Ineligible,
    /// A qualifying fact whose click failed.
    ExecutionFailed(Direction),
    Traded(Direction),
    /// This arming already traded; waiting for the auto-disarm.
    Cooldown,
}

pub struct WatchController {
    state: WatchState,
    calendar: Arc<dyn CalendarSource>,
    executor: ActionExecutor,
    store: WatchStore,
    notifier: Arc<dyn Notifier>,
    max_duration: Duration,
    latest: Vec<ReleaseRecord>,
}

impl WatchController {
    /// Build a controller, loading persisted bookkeeping from `store`.
    pub fn new(
        calendar: Arc<dyn CalendarSource>,
        executor: ActionExecutor,
        store: WatchStore,
        notifier: Arc<dyn Notifier>,
        max_duration: Duration,
    ) -> Self {
        let mut state = WatchState::with_history(store.load_processed(), store.load_initial_facts());
        // Last choice prefills the status while disarmed.
        if let Some(selection) = store.load_selection() {
            state.focus = Some(selection.focus);
            state.asset = selection.asset;
            state.pair = selection.pair;
        }
        let latest = store.load_releases();
        Self {
            state,
            calendar,
            executor,
            store,
            notifier,
            max_duration,
            latest,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.state.armed
    }

    pub fn state(&self) -> &WatchState {
        &self.state
    }

    pub fn status(&self) -> WatchStatus {
        self.state.status(self.max_duration)
    }

    pub fn latest_releases(&self) -> &[ReleaseRecord] {
        &self.latest
    }

    pub fn trade_history(&self) -> Vec<TradeLogEntry> {
        self.store.load_trades()
    }

    // -- Arm / disarm ----------------------------------------------------

    /// Start watching `focus`, trading `pair` by the rules of `asset`.
    pub fn arm(
        &mut self,
        focus: FocusSelection,
        asset: &str,
        pair: &str,
        now: DateTime<Utc>,
    ) -> Result<(), WatchError> {
        if focus.is_blank() {
            return Err(WatchError::InvalidArgument("focus release is required".into()));
        }
        if asset.trim().is_empty() {
            return Err(WatchError::InvalidArgument("asset is required".into()));
        }
        if pair.trim().is_empty() {
            return Err(WatchError::InvalidArgument("pair is required".into()));
        }
        self.arm_at(focus, asset.trim(), pair.trim(), now);
        Ok(())
    }

    fn arm_at(&mut self, focus: FocusSelection, asset: &str, pair: &str, armed_at: DateTime<Utc>) {
        self.state.arm(focus.clone(), asset, pair, armed_at);
        self.store.save_watch(&PersistedWatch {
            armed: true,
            focus: focus.clone(),
            asset: asset.to_string(),
            pair: pair.to_string(),
            armed_at,
        });
        info!(
            release = %focus,
            asset,
            pair,
            armed_at = %armed_at,
            expires_at = %(armed_at + self.max_duration),
            "Watch armed"
        );
    }

    /// Stop watching. Safe to call when already disarmed.
    pub async fn disarm(&mut self, reason: &str) {
        if !self.state.armed {
            debug!(reason, "Disarm requested while already disarmed");
            return;
        }
        self.state.disarm();
        self.store.clear_watch();
        info!(reason, "Watch disarmed");
        self.notifier
            .notify(NOTIFICATION_TITLE, &format!("Watch disarmed: {reason}"))
            .await;
    }

    /// Resume a persisted session, keeping its original arm time.
    /// Returns whether the watch is armed afterwards.
    pub fn restore(&mut self, now: DateTime<Utc>) -> bool {
        let Some(saved) = self.store.load_watch() else {
            debug!("No persisted watch session");
            return false;
        };

        if saved.armed && now - saved.armed_at < self.max_duration && !saved.focus.is_blank() {
            info!(armed_at = %saved.armed_at, "Restoring active watch");
            self.arm_at(saved.focus, &saved.asset, &saved.pair, saved.armed_at);
            true
        } else {
            info!(armed_at = %saved.armed_at, "Persisted watch expired, clearing");
            self.store.clear_watch();
            false
        }
    }

    /// Forget every processed fact and initial snapshot.
    pub fn reset_history(&mut self) {
        self.state.reset_history();
        self.store.save_processed(&self.state.processed);
        self.store.save_initial_facts(&self.state.initial_had_fact);
        info!("Fact history reset");
    }

    // -- Ticks -----------------------------------------------------------

    /// One detection pass.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if !self.state.armed {
            return TickOutcome::Idle;
        }

        if let Some(due) = self.state.disarm_due {
            if now >= due {
                self.disarm(REASON_TRADE_DONE).await;
                return TickOutcome::Disarmed(REASON_TRADE_DONE.to_string());
            }
            // Single shot: nothing is scraped or clicked until the disarm.
            return TickOutcome::Cooldown;
        }

        if self.state.expired(now, self.max_duration) {
            warn!(armed_at = ?self.state.armed_at, "Watch exceeded its maximum duration");
            self.disarm(REASON_MAX_DURATION).await;
            return TickOutcome::Disarmed(REASON_MAX_DURATION.to_string());
        }

        let records = match self.refresh().await {
            Ok(records) => records,
            Err(_) => return TickOutcome::ScrapeFailed,
        };

        // A command may have landed while the scrape was in flight.
        if !self.state.armed {
            return TickOutcome::Idle;
        }

        let snapshot_before = self.state.initial_had_fact.clone();
        let detection = detector::detect(&mut self.state, &records);
        if self.state.initial_had_fact != snapshot_before {
            self.store.save_initial_facts(&self.state.initial_had_fact);
        }

        let record = match detection {
            Detection::Fresh(record) => record.clone(),
            other => {
                debug!(detection = ?other, "No actionable fact");
                return TickOutcome::NoFact;
            }
        };

        let (asset, pair) = (self.state.asset.clone(), self.state.pair.clone());
        let Some(direction) = strategy::resolve(&self.state, &asset, &pair, &record) else {
            return TickOutcome::Ineligible;
        };

        if self.executor.execute(&mut self.state, direction, &record, now).await {
            TickOutcome::Traded(direction)
        } else {
            // Let the next tick re-evaluate the same fact.
            self.state.last_seen_fact_key = None;
            TickOutcome::ExecutionFailed(direction)
        }
    }

    /// Scrape the calendar and cache the result.
    pub async fn refresh(&mut self) -> Result<Vec<ReleaseRecord>, WatchError> {
        match self.calendar.fetch_releases().await {
            Ok(records) => {
                // Most ticks scrape an unchanged table.
                if records != self.latest {
                    self.store.save_releases(&records);
                    self.latest = records.clone();
                }
                Ok(records)
            }
            Err(e) => {
                warn!(source = self.calendar.name(), error = %e, "Calendar scrape failed");
                Err(WatchError::Transient(format!("{e:#}")))
            }
        }
    }

    /// Keep the calendar on the "today" view.
    pub async fn housekeeping(&mut self) {
        if !self.state.armed {
            return;
        }
        match self.calendar.show_today().await {
            Ok(clicked) => debug!(clicked, "Housekeeping click"),
            Err(e) => debug!(error = %e, "Housekeeping click failed"),
        }
    }

    /// Click buy/sell on the broker tab at the user's request.
    pub async fn manual_click(&self, direction: Direction) -> Result<(), WatchError> {
        let tab = self.executor.click(direction).await?;
        info!(%direction, tab = tab.id, "Manual click executed");
        Ok(())
    }
}
