//! In-memory browser for integration testing.
//!
//! Holds a calendar tab and a broker tab. The calendar rows can be swapped
//! between ticks to simulate a release being published; clicks on the
//! broker tab are recorded.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use newswatch::browser::{BrowserBridge, RawCalendarRow, TabId, TabInfo, ValueCell};

pub const CALENDAR_TAB: TabId = 1;
pub const BROKER_TAB: TabId = 2;
pub const CALENDAR_URL: &str = "https://ru.investing.com/economic-calendar/";

#[derive(Clone, Default)]
pub struct FakeBrowser {
    rows: Arc<Mutex<Vec<RawCalendarRow>>>,
    clicks: Arc<Mutex<Vec<(TabId, String)>>>,
    broker_open: Arc<Mutex<bool>>,
    bid: Arc<Mutex<Option<String>>>,
    /// If set, every call fails with this message.
    force_error: Arc<Mutex<Option<String>>>,
}

impl FakeBrowser {
    pub fn new() -> Self {
        let browser = Self::default();
        *browser.broker_open.lock().unwrap() = true;
        browser
    }

    pub fn set_rows(&self, rows: Vec<RawCalendarRow>) {
        *self.rows.lock().unwrap() = rows;
    }

    pub fn close_broker(&self) {
        *self.broker_open.lock().unwrap() = false;
    }

    pub fn open_broker(&self) {
        *self.broker_open.lock().unwrap() = true;
    }

    pub fn set_bid(&self, bid: &str) {
        *self.bid.lock().unwrap() = Some(bid.to_string());
    }

    pub fn fail_with(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn recover(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    /// Clicks that landed on the broker tab.
    pub fn broker_clicks(&self) -> Vec<String> {
        self.clicks
            .lock()
            .unwrap()
            .iter()
            .filter(|(tab, _)| *tab == BROKER_TAB)
            .map(|(_, sel)| sel.clone())
            .collect()
    }

    fn check_error(&self) -> Result<()> {
        match self.force_error.lock().unwrap().as_ref() {
            Some(msg) => Err(anyhow!("{msg}")),
            None => Ok(()),
        }
    }
}

/// A calendar row as the page-side agent would report it.
pub fn row(event: &str, currency: &str, actual: &str, polarity_class: &str) -> RawCalendarRow {
    let actual = (!actual.is_empty()).then(|| ValueCell {
        text: actual.to_string(),
        classes: vec!["bold".to_string(), polarity_class.to_string()],
    });
    RawCalendarRow {
        time: "15:30".to_string(),
        event: event.to_string(),
        currency: format!(" {currency}"),
        bulls: 3,
        actual,
        forecast: Some(ValueCell { text: "0.3%".to_string(), classes: vec![] }),
        previous: Some(ValueCell { text: "0.2%".to_string(), classes: vec![] }),
    }
}

#[async_trait]
impl BrowserBridge for FakeBrowser {
    async fn list_tabs(&self) -> Result<Vec<TabInfo>> {
        self.check_error()?;
        let mut tabs = vec![TabInfo {
            id: CALENDAR_TAB,
            url: CALENDAR_URL.to_string(),
            title: "Economic Calendar".to_string(),
            active: false,
            meta: BTreeMap::new(),
        }];
        if *self.broker_open.lock().unwrap() {
            tabs.push(TabInfo {
                id: BROKER_TAB,
                url: "https://pocketoption.com/en/cabinet/demo-quick-high-low".to_string(),
                title: "Pocket Option".to_string(),
                active: true,
                meta: BTreeMap::new(),
            });
        }
        Ok(tabs)
    }

    async fn open_tab(&self, url: &str) -> Result<TabInfo> {
        Err(anyhow!("unexpected open_tab({url})"))
    }

    async fn extract_calendar(&self, tab: TabId) -> Result<Vec<RawCalendarRow>> {
        self.check_error()?;
        if tab != CALENDAR_TAB {
            return Err(anyhow!("tab {tab} is not the calendar"));
        }
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn element_exists(&self, _tab: TabId, _selector: &str) -> Result<bool> {
        self.check_error()?;
        Ok(true)
    }

    async fn click(&self, tab: TabId, selector: &str) -> Result<bool> {
        self.check_error()?;
        self.clicks.lock().unwrap().push((tab, selector.to_string()));
        Ok(true)
    }

    async fn read_attribute(&self, tab: TabId, _selector: &str, _attribute: &str) -> Result<Option<String>> {
        self.check_error()?;
        if tab != BROKER_TAB {
            return Ok(None);
        }
        Ok(self.bid.lock().unwrap().clone())
    }
}
