//! HTTP client for the page-side companion agent.
//!
//! The companion runs inside the browser and executes the DOM work on our
//! behalf. Endpoints (all JSON):
//! - `GET  /tabs`                      → `[TabInfo]`
//! - `POST /tabs {url}`                → `TabInfo` once loaded
//! - `GET  /tabs/{id}/calendar`        → `[RawCalendarRow]`
//! - `POST /tabs/{id}/exists {selector}`             → `{found}`
//! - `POST /tabs/{id}/click {selector}`              → `{clicked}`
//! - `POST /tabs/{id}/attribute {selector, attribute}` → `{value}`

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::{BrowserBridge, RawCalendarRow, TabId, TabInfo};

pub struct HttpBridge {
    http: Client,
    base_url: String,
}

#[derive(Serialize)]
struct OpenTabRequest<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct SelectorRequest<'a> {
    selector: &'a str,
}

#[derive(Serialize)]
struct AttributeRequest<'a> {
    selector: &'a str,
    attribute: &'a str,
}

#[derive(Deserialize)]
struct ExistsResponse {
    found: bool,
}

#[derive(Deserialize)]
struct ClickResponse {
    clicked: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct AttributeResponse {
    value: Option<String>,
}

impl HttpBridge {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("NEWSWATCH/0.1.0")
            .build()
            .context("Failed to build bridge HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.http.get(self.url(path)).send().await
            .with_context(|| format!("Bridge request failed: GET {path}"))?;
        Self::decode(resp, path).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let resp = self.http.post(self.url(path)).json(body).send().await
            .with_context(|| format!("Bridge request failed: POST {path}"))?;
        Self::decode(resp, path).await
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response, path: &str) -> Result<T> {
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Bridge error on {path}: {status} {body}");
        }
        resp.json().await
            .with_context(|| format!("Failed to parse bridge response for {path}"))
    }
}

fn tab_path(tab: TabId, action: &str) -> String {
    format!("/tabs/{}/{action}", urlencoding::encode(&tab.to_string()))
}

#[async_trait]
impl BrowserBridge for HttpBridge {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>> {
        let tabs: Vec<TabInfo> = self.get_json("/tabs").await?;
        debug!(count = tabs.len(), "Tabs listed");
        Ok(tabs)
    }

    async fn open_tab(&self, url: &str) -> Result<TabInfo> {
        let tab: TabInfo = self.post_json("/tabs", &OpenTabRequest { url }).await?;
        debug!(tab = tab.id, url, "Tab opened");
        Ok(tab)
    }

    async fn extract_calendar(&self, tab: TabId) -> Result<Vec<RawCalendarRow>> {
        self.get_json(&tab_path(tab, "calendar")).await
    }

    async fn element_exists(&self, tab: TabId, selector: &str) -> Result<bool> {
        let resp: ExistsResponse = self
            .post_json(&tab_path(tab, "exists"), &SelectorRequest { selector })
            .await?;
        Ok(resp.found)
    }

    async fn click(&self, tab: TabId, selector: &str) -> Result<bool> {
        let resp: ClickResponse = self
            .post_json(&tab_path(tab, "click"), &SelectorRequest { selector })
            .await?;
        if let Some(err) = resp.error {
            debug!(tab, selector, error = %err, "Companion reported click problem");
        }
        Ok(resp.clicked)
    }

    async fn read_attribute(
        &self,
        tab: TabId,
        selector: &str,
        attribute: &str,
    ) -> Result<Option<String>> {
        let resp: AttributeResponse = self
            .post_json(&tab_path(tab, "attribute"), &AttributeRequest { selector, attribute })
            .await?;
        Ok(resp.value)
    }
}
