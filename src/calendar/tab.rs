//! Calendar scraping through an open browser tab.
//!
//! Finds the tab whose URL starts with the configured calendar URL (opening
//! one in the background when none exists), extracts its table rows and
//! normalises them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::{rows, CalendarSource};
use crate::browser::{BrowserBridge, TabInfo};
use crate::config::CalendarConfig;
use crate::types::ReleaseRecord;

pub struct TabCalendarSource {
    bridge: Arc<dyn BrowserBridge>,
    url: String,
    today_selector: String,
}

impl TabCalendarSource {
    pub fn new(bridge: Arc<dyn BrowserBridge>, cfg: &CalendarConfig) -> Self {
        Self {
            bridge,
            url: cfg.url.clone(),
            today_selector: cfg.today_selector.clone(),
        }
    }

    async fn existing_tab(&self) -> Result<Option<TabInfo>> {
        let tabs = self.bridge.list_tabs().await?;
        Ok(tabs.into_iter().find(|t| t.url.starts_with(&self.url)))
    }

    async fn calendar_tab(&self) -> Result<TabInfo> {
        if let Some(tab) = self.existing_tab().await? {
            return Ok(tab);
        }
        info!(url = %self.url, "No calendar tab open, opening one");
        self.bridge
            .open_tab(&self.url)
            .await
            .context("Failed to open calendar tab")
    }
}

#[async_trait]
impl CalendarSource for TabCalendarSource {
    async fn fetch_releases(&self) -> Result<Vec<ReleaseRecord>> {
        let tab = self.calendar_tab().await?;
        let raw = self
            .bridge
            .extract_calendar(tab.id)
            .await
            .with_context(|| format!("Calendar extraction failed on tab {}", tab.id))?;
        let releases = rows::normalise(raw);
        debug!(tab = tab.id, count = releases.len(), "Calendar scraped");
        Ok(releases)
    }

    async fn show_today(&self) -> Result<bool> {
        // Housekeeping only: never opens a tab.
        let Some(tab) = self.existing_tab().await? else {
            return Ok(false);
        };
        let clicked = self.bridge.click(tab.id, &self.today_selector).await?;
        debug!(tab = tab.id, clicked, "Today view click");
        Ok(clicked)
    }

    fn name(&self) -> &str {
        "calendar-tab"
    }
}
