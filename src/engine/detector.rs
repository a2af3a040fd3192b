//! Transition detector.
//!
//! Compares a fresh scrape against the watch state and reports the focused
//! release when it carries a fact that has not been evaluated yet. The
//! caller still runs the eligibility checks before acting.

use tracing::debug;

use super::state::WatchState;
use crate::types::ReleaseRecord;

/// Outcome of comparing one scrape against the watch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection<'a> {
    /// No focus is set or the scrape was empty.
    Idle,
    /// The focused release is not in the feed.
    Missing,
    /// The focused release has no published value yet.
    Waiting,
    /// Same fact as the last evaluation.
    Unchanged,
    /// A fact not evaluated before.
    Fresh(&'a ReleaseRecord),
}

impl<'a> Detection<'a> {
    pub fn fact(self) -> Option<&'a ReleaseRecord> {
        match self {
            Detection::Fresh(r) => Some(r),
            _ => None,
        }
    }
}

/// Find the focused release in `records` and decide whether it carries a
/// new fact.
pub fn detect<'a>(state: &mut WatchState, records: &'a [ReleaseRecord]) -> Detection<'a> {
    let Some(focus) = state.focus.as_ref() else {
        return Detection::Idle;
    };
    if records.is_empty() {
        return Detection::Idle;
    }

    let Some(record) = records
        .iter()
        .find(|r| r.event_name == focus.event_name && r.currency_code == focus.currency_code)
    else {
        // Forget the last fact so a reappearing release counts as new.
        state.last_seen_fact_key = None;
        return Detection::Missing;
    };

    if state.observe(record) {
        debug!(
            release = %record.key(),
            had_fact = record.has_fact(),
            "Initial release state recorded"
        );
    }

    if !record.has_fact() {
        state.last_seen_fact_key = None;
        return Detection::Waiting;
    }

    let fact_key = record.fact_key();
    if state.last_seen_fact_key.as_deref() == Some(fact_key.as_str()) {
        return Detection::Unchanged;
    }

    debug!(release = %record.key(), fact = %fact_key, "New fact detected");
    state.last_seen_fact_key = Some(fact_key);
    Detection::Fresh(record)
}
