//! Full watch cycles against the scripted browser.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;
use std::sync::{Arc, Mutex};

use newswatch::auth::{AuthApi, LoginResponse, SessionCheck, SessionManager, VerifyResponse};
use newswatch::calendar::TabCalendarSource;
use newswatch::config::{AuthConfig, BrokerConfig, CalendarConfig, WatchConfig};
use newswatch::engine::executor::ActionExecutor;
use newswatch::engine::{TickOutcome, WatchController, WatchRunner};
use newswatch::notify::Notifier;
use newswatch::storage::{MemoryStore, WatchStore};
use newswatch::types::{Direction, ReleaseKey, WatchError};

use crate::mock_browser::{row, FakeBrowser, CALENDAR_URL};

/// Collects notifications instead of sending them.
#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, _title: &str, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

struct Harness {
    browser: FakeBrowser,
    store: WatchStore,
    notifier: Arc<RecordingNotifier>,
}

impl Harness {
    fn new() -> Self {
        Self {
            browser: FakeBrowser::new(),
            store: WatchStore::new(Arc::new(MemoryStore::new())),
            notifier: Arc::new(RecordingNotifier::default()),
        }
    }

    /// A controller over the shared browser and store, as after a restart.
    fn controller(&self) -> WatchController {
        let bridge = Arc::new(self.browser.clone());
        let calendar_cfg = CalendarConfig { url: CALENDAR_URL.to_string(), ..CalendarConfig::default() };
        let calendar = Arc::new(TabCalendarSource::new(bridge.clone(), &calendar_cfg));
        let notifier: Arc<dyn Notifier> = self.notifier.clone();
        let watch = WatchConfig::default();
        let executor = ActionExecutor::new(
            bridge,
            &BrokerConfig::default(),
            self.store.clone(),
            notifier.clone(),
            watch.auto_disarm_delay(),
        );
        WatchController::new(calendar, executor, self.store.clone(), notifier, watch.max_duration())
    }
}

fn focus() -> ReleaseKey {
    ReleaseKey::new("CPI (YoY)", "USD")
}

fn at(base: DateTime<Utc>, secs: i64) -> DateTime<Utc> {
    base + Duration::seconds(secs)
}

#[tokio::test]
async fn test_publish_trades_once_and_auto_disarms() {
    let h = Harness::new();
    h.browser.set_rows(vec![
        row("CPI (YoY)", "USD", "", ""),
        row("GDP (QoQ)", "EUR", "0.1%", "redFont"),
    ]);
    let mut c = h.controller();
    let t0 = Utc::now();

    c.arm(focus(), "USD", "EUR/USD", t0).unwrap();
    assert_eq!(c.tick(t0).await, TickOutcome::NoFact);

    h.browser.set_rows(vec![row("CPI (YoY)", "USD", "3.4%", "greenFont")]);
    // USD strengthening sells EUR/USD.
    assert_eq!(c.tick(at(t0, 1)).await, TickOutcome::Traded(Direction::Sell));
    assert_eq!(
        h.browser.broker_clicks(),
        vec![BrokerConfig::default().sell_selector]
    );

    for s in 2..5 {
        assert_eq!(c.tick(at(t0, s)).await, TickOutcome::Cooldown);
    }
    assert_eq!(
        c.tick(at(t0, 6)).await,
        TickOutcome::Disarmed("trade executed".to_string())
    );
    assert_eq!(h.browser.broker_clicks().len(), 1);

    let trades = c.trade_history();
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].event_name, "CPI (YoY)");
    assert_eq!(trades[0].actual_value, "3.4%");

    let messages = h.notifier.messages();
    assert!(messages.iter().any(|m| m == "Auto-trade: Sell (USD / EUR/USD)"));
    assert!(messages.iter().any(|m| m == "Watch disarmed: trade executed"));
}

#[tokio::test]
async fn test_revised_value_during_grace_period_is_ignored() {
    let h = Harness::new();
    h.browser.set_rows(vec![row("CPI (YoY)", "USD", "", "")]);
    let mut c = h.controller();
    let t0 = Utc::now();

    c.arm(focus(), "USD", "EUR/USD", t0).unwrap();
    c.tick(t0).await;

    h.browser.set_rows(vec![row("CPI (YoY)", "USD", "3.4%", "greenFont")]);
    assert_eq!(c.tick(at(t0, 1)).await, TickOutcome::Traded(Direction::Sell));

    h.browser.set_rows(vec![row("CPI (YoY)", "USD", "3.1%", "redFont")]);
    assert_eq!(c.tick(at(t0, 2)).await, TickOutcome::Cooldown);
    assert_eq!(
        c.tick(at(t0, 6)).await,
        TickOutcome::Disarmed("trade executed".to_string())
    );
    assert_eq!(
        h.browser.broker_clicks(),
        vec![BrokerConfig::default().sell_selector]
    );
    assert_eq!(c.trade_history().len(), 1);
}

#[tokio::test]
async fn test_value_present_at_arm_is_never_traded() {
    let h = Harness::new();
    h.browser.set_rows(vec![row("CPI (YoY)", "USD", "3.4%", "greenFont")]);
    let mut c = h.controller();
    let t0 = Utc::now();

    c.arm(focus(), "USD", "EUR/USD", t0).unwrap();
    assert_eq!(c.tick(t0).await, TickOutcome::Ineligible);
    for s in 1..10 {
        assert_eq!(c.tick(at(t0, s)).await, TickOutcome::NoFact);
    }
    assert!(h.browser.broker_clicks().is_empty());
    assert!(c.is_armed());
}

#[tokio::test]
async fn test_neutral_fact_does_not_trade() {
    let h = Harness::new();
    h.browser.set_rows(vec![row("CPI (YoY)", "USD", "", "")]);
    let mut c = h.controller();
    let t0 = Utc::now();
    c.arm(focus(), "USD", "EUR/USD", t0).unwrap();
    c.tick(t0).await;

    h.browser.set_rows(vec![row("CPI (YoY)", "USD", "3.1%", "blackFont")]);
    assert_eq!(c.tick(at(t0, 1)).await, TickOutcome::Ineligible);
    assert!(h.browser.broker_clicks().is_empty());
}

#[tokio::test]
async fn test_missing_broker_tab_retries_until_it_opens() {
    let h = Harness::new();
    h.browser.close_broker();
    h.browser.set_rows(vec![row("CPI (YoY)", "USD", "", "")]);
    let mut c = h.controller();
    let t0 = Utc::now();
    c.arm(focus(), "USD", "USD/JPY", t0).unwrap();
    c.tick(t0).await;

    h.browser.set_rows(vec![row("CPI (YoY)", "USD", "3.4%", "redFont")]);
    assert_eq!(
        c.tick(at(t0, 1)).await,
        TickOutcome::ExecutionFailed(Direction::Sell)
    );
    assert!(!c.state().is_processed(&c.latest_releases()[0]));

    h.browser.open_broker();
    assert_eq!(c.tick(at(t0, 2)).await, TickOutcome::Traded(Direction::Sell));
    assert_eq!(h.browser.broker_clicks().len(), 1);
}

#[tokio::test]
async fn test_bridge_outage_keeps_watch_armed() {
    let h = Harness::new();
    h.browser.set_rows(vec![row("CPI (YoY)", "USD", "", "")]);
    let mut c = h.controller();
    let t0 = Utc::now();
    c.arm(focus(), "USD", "EUR/USD", t0).unwrap();

    h.browser.fail_with("companion agent unreachable");
    assert_eq!(c.tick(t0).await, TickOutcome::ScrapeFailed);
    assert!(c.is_armed());

    h.browser.recover();
    h.browser.set_rows(vec![row("CPI (YoY)", "USD", "3.4%", "redFont")]);
    // First sighting after the outage already carries the value.
    assert_eq!(c.tick(at(t0, 1)).await, TickOutcome::Ineligible);
}

#[tokio::test]
async fn test_timeout_disarms_and_notifies() {
    let h = Harness::new();
    h.browser.set_rows(vec![row("CPI (YoY)", "USD", "", "")]);
    let mut c = h.controller();
    let t0 = Utc::now();
    c.arm(focus(), "USD", "EUR/USD", t0).unwrap();
    assert_eq!(c.tick(at(t0, 60)).await, TickOutcome::NoFact);

    let late = t0 + Duration::hours(24) + Duration::seconds(1);
    assert_eq!(
        c.tick(late).await,
        TickOutcome::Disarmed("max duration exceeded".to_string())
    );
    assert!(h.store.load_watch().is_none());
    assert!(h
        .notifier
        .messages()
        .contains(&"Watch disarmed: max duration exceeded".to_string()));
}

#[tokio::test]
async fn test_restart_keeps_budget_and_processed_facts() {
    let h = Harness::new();
    h.browser.set_rows(vec![row("CPI (YoY)", "USD", "", "")]);
    let t0 = Utc::now() - Duration::hours(2);
    {
        let mut c = h.controller();
        c.arm(focus(), "USD", "EUR/USD", t0).unwrap();
        c.tick(t0).await;
        h.browser.set_rows(vec![row("CPI (YoY)", "USD", "3.4%", "greenFont")]);
        assert_eq!(c.tick(at(t0, 1)).await, TickOutcome::Traded(Direction::Sell));
    }

    // Restart before the auto-disarm fired.
    let mut c = h.controller();
    let now = at(t0, 3);
    assert!(c.restore(now));
    assert_eq!(c.status().armed_at, Some(t0));
    assert_eq!(c.status().processed_count, 1);
    for s in 3..8 {
        assert_ne!(c.tick(at(t0, s)).await, TickOutcome::Traded(Direction::Sell));
    }
    assert_eq!(h.browser.broker_clicks().len(), 1);
}

#[tokio::test]
async fn test_manual_click_does_not_touch_state() {
    let h = Harness::new();
    let c = h.controller();
    c.manual_click(Direction::Buy).await.unwrap();
    assert_eq!(h.browser.broker_clicks(), vec![BrokerConfig::default().buy_selector]);
    assert_eq!(c.status().processed_count, 0);
    assert!(c.trade_history().is_empty());

    h.browser.close_broker();
    assert_eq!(
        c.manual_click(Direction::Sell).await.unwrap_err(),
        WatchError::NotFound("broker tab".to_string())
    );
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Auth backend that accepts one account and tracks subscription state.
struct FakeAuth {
    active: Mutex<bool>,
}

#[async_trait]
impl AuthApi for FakeAuth {
    async fn login(&self, login: &str, password: &str, bid: &str) -> Result<LoginResponse> {
        let ok = login == "trader" && password == "secret" && !bid.is_empty();
        Ok(LoginResponse {
            success: ok,
            token: ok.then(|| format!("token-{bid}")),
            message: (!ok).then(|| "invalid credentials".to_string()),
        })
    }

    async fn verify(&self, token: &str, _bid: &str) -> Result<VerifyResponse> {
        let active = *self.active.lock().unwrap();
        Ok(VerifyResponse {
            success: token.starts_with("token-"),
            subscription_active: active,
            message: (!active).then(|| "subscription expired".to_string()),
        })
    }
}

fn auth_config() -> AuthConfig {
    AuthConfig {
        enabled: true,
        base_url: "http://127.0.0.1:8000".to_string(),
        verify_interval_secs: 300,
        require_session_to_arm: true,
        bid_attempts: 1,
        bid_retry_ms: 0,
    }
}

fn session(h: &Harness, auth: Arc<FakeAuth>) -> Arc<SessionManager> {
    Arc::new(SessionManager::new(
        auth,
        Arc::new(h.browser.clone()),
        &BrokerConfig::default(),
        &auth_config(),
        h.store.clone(),
    ))
}

#[tokio::test]
async fn test_session_login_verify_and_expiry() {
    let h = Harness::new();
    h.browser.set_bid("id 4242");
    let auth = Arc::new(FakeAuth { active: Mutex::new(true) });
    let s = session(&h, auth.clone());

    assert!(s
        .login("trader", &SecretString::new("wrong".to_string()))
        .await
        .is_err());
    s.login("trader", &SecretString::new("secret".to_string())).await.unwrap();
    assert_eq!(h.store.load_expected_bid().as_deref(), Some("4242"));
    assert_eq!(s.verify().await, SessionCheck::Valid);

    *auth.active.lock().unwrap() = false;
    assert_eq!(
        s.verify().await,
        SessionCheck::Invalid("subscription expired".to_string())
    );
    assert!(!s.is_logged_in());
    assert_eq!(s.verify().await, SessionCheck::LoggedOut);
}

#[tokio::test]
async fn test_account_switch_invalidates_session() {
    let h = Harness::new();
    h.browser.set_bid("id 4242");
    let s = session(&h, Arc::new(FakeAuth { active: Mutex::new(true) }));
    s.login("trader", &SecretString::new("secret".to_string())).await.unwrap();

    h.browser.set_bid("id 9999");
    assert_eq!(s.verify().await, SessionCheck::Invalid("user changed".to_string()));
}

#[tokio::test]
async fn test_arming_requires_session() {
    let h = Harness::new();
    h.browser.set_bid("id 4242");
    let s = session(&h, Arc::new(FakeAuth { active: Mutex::new(true) }));

    let (runner, handle) = WatchRunner::new(h.controller(), &WatchConfig::default());
    let runner = runner.with_session(s.clone(), true, std::time::Duration::from_secs(300));
    tokio::spawn(runner.run(std::future::pending::<()>()));

    let err = handle.arm(focus(), "USD", "EUR/USD").await.unwrap_err();
    assert!(matches!(err, WatchError::Auth(_)));

    s.login("trader", &SecretString::new("secret".to_string())).await.unwrap();
    let status = handle.arm(focus(), "USD", "EUR/USD").await.unwrap();
    assert!(status.armed);
}
