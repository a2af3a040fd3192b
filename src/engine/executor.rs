//! Action executor.
//!
//! Locates the broker tab and dispatches a synthetic click on the buy or
//! sell control. State is mutated only after the click was confirmed:
//! the fact is marked processed, an audit entry is appended, a notification
//! fires and the watch is scheduled to disarm shortly after.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use super::state::WatchState;
use crate::browser::{BrokerClassifier, BrowserBridge, TabInfo};
use crate::config::BrokerConfig;
use crate::notify::{Notifier, NOTIFICATION_TITLE};
use crate::storage::WatchStore;
use crate::types::{Direction, ReleaseRecord, TradeLogEntry, WatchError};

pub struct ActionExecutor {
    bridge: Arc<dyn BrowserBridge>,
    classifier: BrokerClassifier,
    buy_selector: String,
    sell_selector: String,
    store: WatchStore,
    notifier: Arc<dyn Notifier>,
    auto_disarm_delay: Duration,
}

impl ActionExecutor {
    pub fn new(
        bridge: Arc<dyn BrowserBridge>,
        broker: &BrokerConfig,
        store: WatchStore,
        notifier: Arc<dyn Notifier>,
        auto_disarm_delay: Duration,
    ) -> Self {
        Self {
            bridge,
            classifier: BrokerClassifier::new(broker),
            buy_selector: broker.buy_selector.clone(),
            sell_selector: broker.sell_selector.clone(),
            store,
            notifier,
            auto_disarm_delay,
        }
    }

    fn selector(&self, direction: Direction) -> &str {
        match direction {
            Direction::Buy => &self.buy_selector,
            Direction::Sell => &self.sell_selector,
        }
    }

    /// Find the broker tab and click the control for `direction`.
    pub async fn click(&self, direction: Direction) -> Result<TabInfo, WatchError> {
        let tab = self
            .classifier
            .find_candidate_tab(self.bridge.as_ref())
            .await
            .map_err(|e| WatchError::Transient(format!("tab lookup failed: {e:#}")))?
            .ok_or_else(|| WatchError::NotFound("broker tab".to_string()))?;

        let selector = self.selector(direction);
        let clicked = self
            .bridge
            .click(tab.id, selector)
            .await
            .map_err(|e| WatchError::Transient(format!("click on tab {} failed: {e:#}", tab.id)))?;

        if !clicked {
            return Err(WatchError::NotFound(format!("element {selector}")));
        }
        Ok(tab)
    }

    /// Act on a resolved fact. Returns whether the click went through.
    pub async fn execute(
        &self,
        state: &mut WatchState,
        direction: Direction,
        record: &ReleaseRecord,
        now: DateTime<Utc>,
    ) -> bool {
        if !state.armed {
            warn!(release = %record.key(), "Watch disarmed before execution, skipping");
            return false;
        }
        if state.is_processed(record) {
            info!(fact = %record.fact_id(), "Fact already processed, skipping");
            return false;
        }
        if let Some(due) = state.disarm_due {
            warn!(%due, release = %record.key(), "Already traded this arming, skipping");
            return false;
        }

        info!(
            %direction,
            asset = %state.asset,
            pair = %state.pair,
            release = %record.key(),
            actual = %record.actual_value,
            polarity = %record.actual_polarity,
            "Executing trade"
        );

        let tab = match self.click(direction).await {
            Ok(tab) => tab,
            Err(e) => {
                warn!(%direction, error = %e, "Trade execution failed");
                return false;
            }
        };

        state.mark_processed(record);
        self.store.save_processed(&state.processed);

        let entry = TradeLogEntry {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: now,
            direction,
            asset: state.asset.clone(),
            pair: state.pair.clone(),
            event_name: record.event_name.clone(),
            actual_value: record.actual_value.clone(),
            polarity: record.actual_polarity,
            broker_tab_id: tab.id,
            broker_url: tab.url.clone(),
        };
        let total = self.store.append_trade(&entry);
        info!(trade = %entry, history = total, "Trade executed");

        let verb = match direction {
            Direction::Buy => "Buy",
            Direction::Sell => "Sell",
        };
        self.notifier
            .notify(
                NOTIFICATION_TITLE,
                &format!("Auto-trade: {verb} ({} / {})", state.asset, state.pair),
            )
            .await;

        // One trade per arming.
        state.disarm_due = Some(now + self.auto_disarm_delay);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::MockBrowserBridge;
    use crate::notify::MockNotifier;
    use crate::storage::MemoryStore;
    use crate::types::{Polarity, ReleaseKey};
    use mockall::predicate::eq;

    const BUY: &str = ".action-high-low.button-call-wrap a.btn.btn-call";
    const SELL: &str = ".action-high-low.button-put-wrap a.btn.btn-put";

    fn broker_tab() -> TabInfo {
        TabInfo { id: 7, url: "https://pocketoption.com/cabinet".into(), ..Default::default() }
    }

    fn armed() -> WatchState {
        let mut s = WatchState::default();
        s.arm(ReleaseKey::new("CPI", "EUR"), "EUR", "EUR/USD", Utc::now());
        s
    }

    fn record() -> ReleaseRecord {
        ReleaseRecord::sample("CPI", "EUR", "0.4%", Polarity::Positive)
    }

    fn executor(bridge: MockBrowserBridge, notifier: MockNotifier) -> (ActionExecutor, WatchStore) {
        let store = WatchStore::new(Arc::new(MemoryStore::new()));
        let exec = ActionExecutor::new(
            Arc::new(bridge),
            &BrokerConfig::default(),
            store.clone(),
            Arc::new(notifier),
            Duration::seconds(5),
        );
        (exec, store)
    }

    #[tokio::test]
    async fn test_successful_buy() {
        let mut bridge = MockBrowserBridge::new();
        bridge.expect_list_tabs().returning(|| Ok(vec![broker_tab()]));
        bridge.expect_click()
            .with(eq(7), eq(BUY))
            .times(1)
            .returning(|_, _| Ok(true));
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(1).returning(|_, _| ());

        let (exec, store) = executor(bridge, notifier);
        let mut state = armed();
        let now = Utc::now();

        assert!(exec.execute(&mut state, Direction::Buy, &record(), now).await);
        assert!(state.is_processed(&record()));
        assert_eq!(state.disarm_due, Some(now + Duration::seconds(5)));
        assert_eq!(store.load_processed().len(), 1);

        let trades = store.load_trades();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].direction, Direction::Buy);
        assert_eq!(trades[0].pair, "EUR/USD");
        assert_eq!(trades[0].broker_tab_id, 7);
    }

    #[tokio::test]
    async fn test_sell_uses_sell_selector() {
        let mut bridge = MockBrowserBridge::new();
        bridge.expect_list_tabs().returning(|| Ok(vec![broker_tab()]));
        bridge.expect_click().with(eq(7), eq(SELL)).returning(|_, _| Ok(true));
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().returning(|_, _| ());

        let (exec, _) = executor(bridge, notifier);
        assert!(exec.execute(&mut armed(), Direction::Sell, &record(), Utc::now()).await);
    }

    #[tokio::test]
    async fn test_already_processed_has_no_side_effects() {
        let mut bridge = MockBrowserBridge::new();
        bridge.expect_list_tabs().never();
        bridge.expect_click().never();
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().never();

        let (exec, store) = executor(bridge, notifier);
        let mut state = armed();
        state.mark_processed(&record());
        assert!(!exec.execute(&mut state, Direction::Buy, &record(), Utc::now()).await);
        assert!(store.load_trades().is_empty());
        assert!(state.disarm_due.is_none());
    }

    #[tokio::test]
    async fn test_pending_auto_disarm_refuses_second_trade() {
        let mut bridge = MockBrowserBridge::new();
        bridge.expect_list_tabs().returning(|| Ok(vec![broker_tab()]));
        bridge.expect_click().times(1).returning(|_, _| Ok(true));
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(1).returning(|_, _| ());

        let (exec, store) = executor(bridge, notifier);
        let mut state = armed();
        let now = Utc::now();
        assert!(exec.execute(&mut state, Direction::Buy, &record(), now).await);

        let revised = ReleaseRecord::sample("CPI", "EUR", "0.5%", Polarity::Negative);
        let later = now + Duration::seconds(1);
        assert!(!exec.execute(&mut state, Direction::Sell, &revised, later).await);
        assert!(!state.is_processed(&revised));
        assert_eq!(store.load_trades().len(), 1);
        assert_eq!(state.disarm_due, Some(now + Duration::seconds(5)));
    }

    #[tokio::test]
    async fn test_disarmed_state_is_not_touched() {
        let mut bridge = MockBrowserBridge::new();
        bridge.expect_list_tabs().never();
        let (exec, _) = executor(bridge, MockNotifier::new());
        let mut state = armed();
        state.disarm();
        assert!(!exec.execute(&mut state, Direction::Buy, &record(), Utc::now()).await);
        assert!(!state.is_processed(&record()));
    }

    #[tokio::test]
    async fn test_no_broker_tab() {
        let mut bridge = MockBrowserBridge::new();
        bridge.expect_list_tabs()
            .returning(|| Ok(vec![TabInfo { id: 1, url: "https://news.example".into(), ..Default::default() }]));
        bridge.expect_click().never();
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().never();

        let (exec, _) = executor(bridge, notifier);
        let mut state = armed();
        assert!(!exec.execute(&mut state, Direction::Buy, &record(), Utc::now()).await);
        assert!(!state.is_processed(&record()));
        assert_eq!(exec.click(Direction::Buy).await.unwrap_err(), WatchError::NotFound("broker tab".into()));
    }

    #[tokio::test]
    async fn test_missing_element() {
        let mut bridge = MockBrowserBridge::new();
        bridge.expect_list_tabs().returning(|| Ok(vec![broker_tab()]));
        bridge.expect_click().returning(|_, _| Ok(false));
        let (exec, store) = executor(bridge, MockNotifier::new());
        let mut state = armed();
        assert!(!exec.execute(&mut state, Direction::Buy, &record(), Utc::now()).await);
        assert!(store.load_processed().is_empty());
    }

    #[tokio::test]
    async fn test_bridge_error_is_transient() {
        let mut bridge = MockBrowserBridge::new();
        bridge.expect_list_tabs().returning(|| Err(anyhow::anyhow!("bridge down")));
        let (exec, _) = executor(bridge, MockNotifier::new());
        assert!(matches!(exec.click(Direction::Sell).await, Err(WatchError::Transient(_))));
        assert!(!exec.execute(&mut armed(), Direction::Sell, &record(), Utc::now()).await);
    }
}
