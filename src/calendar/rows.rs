//! Normalisation of extracted calendar rows.

use crate::browser::{RawCalendarRow, ValueCell};
use crate::types::{Polarity, ReleaseRecord, EMPTY_VALUE};

const UNKNOWN_CURRENCY: &str = "Unknown";
const MAX_IMPORTANCE: u32 = 3;

/// Turn raw rows into release records, dropping rows without a time or
/// an event name.
pub fn normalise(rows: Vec<RawCalendarRow>) -> Vec<ReleaseRecord> {
    rows.into_iter().filter_map(normalise_row).collect()
}

fn normalise_row(row: RawCalendarRow) -> Option<ReleaseRecord> {
    let time = row.time.trim();
    let event = row.event.trim();
    if time.is_empty() || event.is_empty() {
        return None;
    }

    let currency = row
        .currency
        .split_whitespace()
        .last()
        .unwrap_or(UNKNOWN_CURRENCY)
        .to_string();

    let (actual_value, actual_polarity) = cell(row.actual.as_ref());
    let (forecast_value, forecast_polarity) = cell(row.forecast.as_ref());
    let (previous_value, previous_polarity) = cell(row.previous.as_ref());

    Some(ReleaseRecord {
        time: time.to_string(),
        event_name: event.to_string(),
        currency_code: currency,
        importance: row.bulls.min(MAX_IMPORTANCE) as u8,
        actual_value,
        actual_polarity,
        forecast_value,
        forecast_polarity,
        previous_value,
        previous_polarity,
    })
}

fn cell(cell: Option<&ValueCell>) -> (String, Polarity) {
    match cell {
        Some(c) => {
            let text = c.text.trim();
            let text = if text.is_empty() { EMPTY_VALUE } else { text };
            (text.to_string(), Polarity::from_classes(c.classes.as_slice()))
        }
        None => (EMPTY_VALUE.to_string(), Polarity::NoData),
    }
}
