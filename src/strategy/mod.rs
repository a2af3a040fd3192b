//! Rule resolution: maps a detected fact to a trade direction.
//!
//! A fact is eligible only if it was not acted upon before, appeared after
//! the watch started, and has a directional polarity. The direction itself
//! is a pure table lookup (see [`rules`]).

pub mod rules;

use tracing::debug;

use crate::engine::state::WatchState;
use crate::types::{Direction, Polarity, ReleaseRecord};
use rules::FactBucket;

/// Why a detected fact does not produce a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    AlreadyProcessed,
    PreExistingFact,
    NonDirectional,
    NoRule,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Rejection::AlreadyProcessed => "fact already processed",
            Rejection::PreExistingFact => "fact was published before the watch started",
            Rejection::NonDirectional => "neutral or missing polarity",
            Rejection::NoRule => "no rule for asset/pair",
        };
        f.write_str(s)
    }
}

/// Resolve the direction for `record`, or explain why there is none.
pub fn evaluate(
    state: &WatchState,
    asset: &str,
    pair: &str,
    record: &ReleaseRecord,
) -> Result<Direction, Rejection> {
    if state.is_processed(record) {
        return Err(Rejection::AlreadyProcessed);
    }
    if state.had_fact_initially(record) {
        return Err(Rejection::PreExistingFact);
    }
    let bucket = match record.actual_polarity {
        Polarity::Positive => FactBucket::Green,
        Polarity::Negative => FactBucket::Red,
        Polarity::Neutral | Polarity::NoData => return Err(Rejection::NonDirectional),
    };
    rules::lookup(asset, pair, bucket).ok_or(Rejection::NoRule)
}

/// Resolve the direction for `record`; `None` means no trade.
pub fn resolve(
    state: &WatchState,
    asset: &str,
    pair: &str,
    record: &ReleaseRecord,
) -> Option<Direction> {
    match evaluate(state, asset, pair, record) {
        Ok(direction) => Some(direction),
        Err(reason) => {
            debug!(release = %record.key(), asset, pair, %reason, "No trade");
            None
        }
    }
}
