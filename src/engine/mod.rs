//! Core engine: the arm → scrape → detect → resolve → click loop.
//!
//! - `state`: the owned watch record
//! - `detector`: spots a new fact on the focused release
//! - `executor`: clicks buy/sell on the broker tab
//! - `lifecycle`: arming, expiry and the per-tick pipeline
//! - `runner`: the task that serializes ticks and commands

pub mod detector;
pub mod executor;
pub mod lifecycle;
pub mod runner;
pub mod state;

pub use lifecycle::{TickOutcome, WatchController};
pub use runner::{WatchHandle, WatchRunner};
pub use state::{WatchState, WatchStatus};
