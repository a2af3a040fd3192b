//! Browser integration.
//!
//! Defines the `BrowserBridge` trait, the narrow port through which every
//! page-touching step is performed (listing tabs, extracting calendar rows,
//! dispatching synthetic clicks), and provides:
//! - `HttpBridge`: talks to the page-side companion agent over HTTP
//! - `BrokerClassifier`: heuristic that picks the broker tab

pub mod classifier;
pub mod http;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use classifier::BrokerClassifier;
pub use http::HttpBridge;

/// Browser tab identifier.
pub type TabId = i64;

/// Metadata about an open tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TabInfo {
    pub id: TabId,
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub active: bool,
    /// `<meta name=... content=...>` pairs of the tab's document.
    #[serde(default)]
    pub meta: BTreeMap<String, String>,
}

impl TabInfo {
    /// Browser-internal pages can never host the calendar or the broker.
    pub fn is_system(&self) -> bool {
        self.url.is_empty()
            || self.url.starts_with("chrome://")
            || self.url.starts_with("chrome-extension://")
            || self.url.starts_with("about:")
    }
}

/// One calendar table row as extracted in-page, before normalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RawCalendarRow {
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub event: String,
    /// Text of the currency flag cell, e.g. `" USD"`.
    #[serde(default)]
    pub currency: String,
    /// Count of filled bull icons.
    #[serde(default)]
    pub bulls: u32,
    #[serde(default)]
    pub actual: Option<ValueCell>,
    #[serde(default)]
    pub forecast: Option<ValueCell>,
    #[serde(default)]
    pub previous: Option<ValueCell>,
}

/// Text and CSS classes of a value cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ValueCell {
    pub text: String,
    #[serde(default)]
    pub classes: Vec<String>,
}

/// Abstraction over the browser the service automates.
///
/// Every call is a round-trip into another browsing context and may fail
/// transiently; callers treat errors as "try again next tick".
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BrowserBridge: Send + Sync {
    /// All open tabs in iteration order.
    async fn list_tabs(&self) -> Result<Vec<TabInfo>>;

    /// Open `url` in a background tab; resolves once it finished loading.
    async fn open_tab(&self, url: &str) -> Result<TabInfo>;

    /// Extract the economic calendar table of a tab.
    async fn extract_calendar(&self, tab: TabId) -> Result<Vec<RawCalendarRow>>;

    /// Whether `selector` matches an element in the tab's document.
    async fn element_exists(&self, tab: TabId, selector: &str) -> Result<bool>;

    /// Dispatch a synthetic bubbling click on the first match of `selector`.
    /// Returns `false` when the element is absent.
    async fn click(&self, tab: TabId, selector: &str) -> Result<bool>;

    /// Read an attribute of the first match of `selector`.
    async fn read_attribute(
        &self,
        tab: TabId,
        selector: &str,
        attribute: &str,
    ) -> Result<Option<String>>;
}
