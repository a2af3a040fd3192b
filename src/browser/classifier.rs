//! Broker tab detection.
//!
//! The broker is an arbitrary third-party page, so identification is a
//! heuristic over URL keywords, two distinctive meta tags and (optionally)
//! the presence of a price-source element. Tabs are tried in iteration
//! order and the first match wins.

use anyhow::Result;
use tracing::{debug, info};

use super::{BrowserBridge, TabInfo};
use crate::config::BrokerConfig;

#[derive(Debug, Clone)]
pub struct BrokerClassifier {
    url_keywords: Vec<String>,
    theme_color: String,
    color_schemes: String,
    price_source_selector: Option<String>,
}

impl BrokerClassifier {
    pub fn new(cfg: &BrokerConfig) -> Self {
        Self {
            url_keywords: cfg.url_keywords.iter().map(|k| k.to_lowercase()).collect(),
            theme_color: cfg.theme_color.clone(),
            color_schemes: cfg.color_schemes.clone(),
            price_source_selector: cfg.price_source_selector.clone(),
        }
    }

    fn url_matches(&self, tab: &TabInfo) -> bool {
        let url = tab.url.to_lowercase();
        self.url_keywords.iter().any(|kw| url.contains(kw.as_str()))
    }

    fn meta_matches(&self, tab: &TabInfo) -> bool {
        let theme = tab.meta.get("theme-color").map(|v| v.eq_ignore_ascii_case(&self.theme_color));
        let schemes = tab.meta.get("supported-color-schemes").map(|v| v.trim() == self.color_schemes);
        theme == Some(true) && schemes == Some(true)
    }

    /// Match on metadata alone, without probing the page.
    pub fn matches(&self, tab: &TabInfo) -> bool {
        !tab.is_system() && (self.url_matches(tab) || self.meta_matches(tab))
    }

    /// Locate the first broker tab among the open tabs.
    pub async fn find_candidate_tab(&self, bridge: &dyn BrowserBridge) -> Result<Option<TabInfo>> {
        let tabs = bridge.list_tabs().await?;
        let mut checked = 0usize;

        for tab in tabs {
            if tab.is_system() {
                continue;
            }
            checked += 1;

            if self.matches(&tab) {
                info!(tab = tab.id, url = %tab.url, "Broker tab found");
                return Ok(Some(tab));
            }

            if let Some(selector) = &self.price_source_selector {
                match bridge.element_exists(tab.id, selector).await {
                    Ok(true) => {
                        info!(tab = tab.id, url = %tab.url, "Broker tab found by price source");
                        return Ok(Some(tab));
                    }
                    Ok(false) => {}
                    Err(e) => debug!(tab = tab.id, error = %e, "Price-source probe failed"),
                }
            }
        }

        debug!(checked, "No broker tab among open tabs");
        Ok(None)
    }
}
