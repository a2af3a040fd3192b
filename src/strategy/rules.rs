//! Static directional rule table.
//!
//! Keyed by the watched currency (the asset), then by the traded pair, then
//! by the fact bucket. A currency strengthening on good data means buying
//! pairs where it is the base and selling pairs where it is the quote.

use crate::types::Direction::{self, Buy, Sell};

/// Colour bucket of a directional fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactBucket {
    Green,
    Red,
}

struct PairRule {
    pair: &'static str,
    green: Direction,
    red: Direction,
}

struct AssetRules {
    asset: &'static str,
    pairs: &'static [PairRule],
}

const fn rule(pair: &'static str, green: Direction, red: Direction) -> PairRule {
    PairRule { pair, green, red }
}

const TRADING_RULES: &[AssetRules] = &[
    AssetRules {
        asset: "AUD",
        pairs: &[
            rule("EUR/AUD", Sell, Buy),
            rule("AUD/USD", Buy, Sell),
            rule("AUD/CHF", Buy, Sell),
            rule("AUD/CAD", Buy, Sell),
            rule("GBP/AUD", Sell, Buy),
            rule("AUD/JPY", Buy, Sell),
        ],
    },
    AssetRules {
        asset: "GBP",
        pairs: &[
            rule("GBP/CAD", Buy, Sell),
            rule("GBP/USD", Buy, Sell),
            rule("GBP/CHF", Buy, Sell),
            rule("GBP/JPY", Buy, Sell),
            rule("EUR/GBP", Sell, Buy),
            rule("GBP/AUD", Buy, Sell),
        ],
    },
    AssetRules {
        asset: "EUR",
        pairs: &[
            rule("EUR/AUD", Buy, Sell),
            rule("EUR/USD", Buy, Sell),
            rule("EUR/JPY", Buy, Sell),
            rule("EUR/CAD", Buy, Sell),
            rule("EUR/CHF", Buy, Sell),
            rule("EUR/GBP", Buy, Sell),
        ],
    },
    AssetRules {
        asset: "USD",
        pairs: &[
            rule("EUR/USD", Sell, Buy),
            rule("AUD/USD", Sell, Buy),
            rule("USD/CAD", Buy, Sell),
            rule("GBP/USD", Sell, Buy),
            rule("USD/JPY", Buy, Sell),
            rule("USD/CHF", Buy, Sell),
        ],
    },
    AssetRules {
        asset: "JPY",
        pairs: &[
            rule("EUR/JPY", Sell, Buy),
            rule("USD/JPY", Sell, Buy),
            rule("CHF/JPY", Sell, Buy),
            rule("GBP/JPY", Sell, Buy),
            rule("AUD/JPY", Sell, Buy),
            rule("CAD/JPY", Sell, Buy),
        ],
    },
    AssetRules {
        asset: "CHF",
        pairs: &[
            rule("AUD/CHF", Sell, Buy),
            rule("GBP/CHF", Sell, Buy),
            rule("EUR/CHF", Sell, Buy),
            rule("CHF/JPY", Buy, Sell),
            rule("USD/CHF", Sell, Buy),
            rule("CAD/CHF", Sell, Buy),
        ],
    },
    AssetRules {
        asset: "CAD",
        pairs: &[
            rule("GBP/CAD", Sell, Buy),
            rule("EUR/CAD", Sell, Buy),
            rule("USD/CAD", Sell, Buy),
            rule("CAD/CHF", Buy, Sell),
            rule("AUD/CAD", Sell, Buy),
            rule("CAD/JPY", Buy, Sell),
        ],
    },
];

/// Look up the direction for `asset` / `pair` / `bucket`.
///
/// Absent combinations yield `None`; there is no default guess.
pub fn lookup(asset: &str, pair: &str, bucket: FactBucket) -> Option<Direction> {
    let rules = TRADING_RULES.iter().find(|r| r.asset == asset)?;
    let rule = rules.pairs.iter().find(|p| p.pair == pair)?;
    Some(match bucket {
        FactBucket::Green => rule.green,
        FactBucket::Red => rule.red,
    })
}

/// Pairs configured for an asset, in table order.
pub fn pairs_for(asset: &str) -> Vec<&'static str> {
    TRADING_RULES
        .iter()
        .find(|r| r.asset == asset)
        .map(|r| r.pairs.iter().map(|p| p.pair).collect())
        .unwrap_or_default()
}

/// All assets with rules, in table order.
pub fn assets() -> Vec<&'static str> {
    TRADING_RULES.iter().map(|r| r.asset).collect()
}
