//! Economic calendar sources.
//!
//! Defines the `CalendarSource` trait (the scraper port) and provides:
//! - `rows`: normalisation of raw table rows into `ReleaseRecord`s
//! - `TabCalendarSource`: scrapes the calendar tab through the browser bridge

pub mod rows;
pub mod tab;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::ReleaseRecord;

pub use tab::TabCalendarSource;

/// Abstraction over the page the releases are scraped from.
///
/// A page-structure change surfaces as an empty list, not an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Scrape the current list of releases.
    async fn fetch_releases(&self) -> Result<Vec<ReleaseRecord>>;

    /// Keep the calendar on the "today" view. Returns whether a click landed.
    async fn show_today(&self) -> Result<bool>;

    /// Source name for logging.
    fn name(&self) -> &str;
}
