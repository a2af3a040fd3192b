//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (auth credentials, webhook URLs) are referenced by env-var name
//! in the config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use chrono::Duration;
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub watch: WatchConfig,
    pub calendar: CalendarConfig,
    pub broker: BrokerConfig,
    pub bridge: BridgeConfig,
    pub auth: AuthConfig,
    pub storage: StorageConfig,
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatchConfig {
    /// Detection tick period.
    pub tick_interval_ms: u64,
    /// Period of the "keep calendar on today" click.
    pub housekeeping_interval_secs: u64,
    /// Hard ceiling on how long a watch stays armed.
    pub max_duration_hours: i64,
    /// Delay between a successful click and the automatic disarm.
    pub auto_disarm_secs: i64,
}

impl WatchConfig {
    pub fn max_duration(&self) -> Duration {
        Duration::hours(self.max_duration_hours)
    }

    pub fn auto_disarm_delay(&self) -> Duration {
        Duration::seconds(self.auto_disarm_secs)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1_000,
            housekeeping_interval_secs: 15,
            max_duration_hours: 24,
            auto_disarm_secs: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CalendarConfig {
    /// Calendar page; the tab whose URL starts with this is scraped.
    pub url: String,
    pub today_selector: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            url: "https://ru.investing.com/economic-calendar/".to_string(),
            today_selector: "a#timeFrame_today.newBtn.toggleButton.LightGray".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BrokerConfig {
    pub url_keywords: Vec<String>,
    pub buy_selector: String,
    pub sell_selector: String,
    pub theme_color: String,
    pub color_schemes: String,
    #[serde(default)]
    pub price_source_selector: Option<String>,
    pub bid_selector: String,
    pub bid_attribute: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            url_keywords: ["broker", "trading", "olymptrade", "pocket", "binomo"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            buy_selector: ".action-high-low.button-call-wrap a.btn.btn-call".to_string(),
            sell_selector: ".action-high-low.button-put-wrap a.btn.btn-put".to_string(),
            theme_color: "#1F1F23".to_string(),
            color_schemes: "light dark".to_string(),
            price_source_selector: None,
            bid_selector: ".info__id [data-hd-show]".to_string(),
            bid_attribute: "data-hd-show".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    /// Base URL of the page-side companion agent.
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub enabled: bool,
    pub base_url: String,
    pub verify_interval_secs: u64,
    pub require_session_to_arm: bool,
    pub bid_attempts: u32,
    pub bid_retry_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AlertsConfig {
    /// Env var holding a Discord-style webhook URL for notifications.
    pub webhook_url_env: Option<String>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.watch.tick_interval_ms == 0 || self.watch.housekeeping_interval_secs == 0 {
            anyhow::bail!("watch intervals must be non-zero");
        }
        if self.watch.max_duration_hours <= 0 {
            anyhow::bail!("watch.max_duration_hours must be positive");
        }
        if self.broker.buy_selector.is_empty() || self.broker.sell_selector.is_empty() {
            anyhow::bail!("broker buy/sell selectors must be set");
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r##"
[watch]
tick_interval_ms = 1000
housekeeping_interval_secs = 15
max_duration_hours = 24
auto_disarm_secs = 5

[calendar]
url = "https://ru.investing.com/economic-calendar/"
today_selector = "a#timeFrame_today.newBtn.toggleButton.LightGray"

[broker]
url_keywords = ["broker", "pocket"]
buy_selector = ".button-call-wrap a.btn.btn-call"
sell_selector = ".button-put-wrap a.btn.btn-put"
theme_color = "#1F1F23"
color_schemes = "light dark"
bid_selector = ".info__id [data-hd-show]"
bid_attribute = "data-hd-show"

[bridge]
base_url = "http://127.0.0.1:9230"
timeout_secs = 10

[auth]
enabled = true
base_url = "http://127.0.0.1:8000"
verify_interval_secs = 300
require_session_to_arm = true
bid_attempts = 5
bid_retry_ms = 2000

[storage]
path = "newswatch_state.json"

[dashboard]
enabled = true
port = 8090
"##;

    #[test]
    fn test_parse_sample() {
        let cfg = AppConfig::parse(SAMPLE).unwrap();
        assert_eq!(cfg.watch.max_duration(), Duration::hours(24));
        assert_eq!(cfg.watch.auto_disarm_delay(), Duration::seconds(5));
        assert_eq!(cfg.broker.url_keywords, vec!["broker", "pocket"]);
        assert!(cfg.broker.price_source_selector.is_none());
        assert!(cfg.alerts.webhook_url_env.is_none());
        assert_eq!(cfg.dashboard.port, 8090);
    }

    #[test]
    fn test_rejects_zero_tick() {
        let bad = SAMPLE.replace("tick_interval_ms = 1000", "tick_interval_ms = 0");
        assert!(AppConfig::parse(&bad).is_err());
    }

    #[test]
    fn test_load_config() {
        // Only checked when config.toml is present in the working directory.
        if let Ok(cfg) = AppConfig::load("config.toml") {
            assert!(cfg.watch.max_duration_hours > 0);
            assert!(!cfg.calendar.url.is_empty());
        }
    }

    #[test]
    fn test_defaults_match_calendar_and_broker() {
        let cal = CalendarConfig::default();
        assert!(cal.url.contains("economic-calendar"));
        let broker = BrokerConfig::default();
        assert!(broker.buy_selector.contains("btn-call"));
        assert!(broker.sell_selector.contains("btn-put"));
        assert_eq!(WatchConfig::default().max_duration_hours, 24);
    }
}
