//! User-visible notifications.
//!
//! `LogNotifier` emits a structured `tracing` event on the `notification`
//! target. `WebhookNotifier` additionally posts a Discord-style embed; the
//! post is spawned so a slow webhook never stalls the watch loop.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{error, info};

pub const NOTIFICATION_TITLE: &str = "NEWSWATCH";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, message: &str);
}

#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, title: &str, message: &str) {
        info!(target: "notification", title, message, "Notification");
    }
}

#[derive(Clone)]
pub struct WebhookNotifier {
    client: Client,
    webhook_url: String,
}

impl WebhookNotifier {
    pub fn new(webhook_url: String) -> Self {
        Self {
            client: Client::new(),
            webhook_url,
        }
    }

    fn payload(title: &str, message: &str) -> serde_json::Value {
        json!({
            "embeds": [{
                "title": title,
                "description": message,
                "color": 0x1F1F23,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }]
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, title: &str, message: &str) {
        info!(target: "notification", title, message, "Notification");

        let client = self.client.clone();
        let url = self.webhook_url.clone();
        let body = Self::payload(title, message);
        tokio::spawn(async move {
            match client.post(&url).json(&body).send().await {
                Ok(resp) if !resp.status().is_success() => {
                    error!(status = %resp.status(), "Webhook rejected notification");
                }
                Ok(_) => {}
                Err(e) => error!(error = %e, "Failed to send webhook notification"),
            }
        });
    }
}
