//! Quote and cache row models.
//!
//! A `Quote` is the transient snapshot returned by the quote source. It is never
//! stored as-is: the synchronizer turns it into a `TickerUpdate` (price, change
//! and percent change rounded to two decimals) and the store keeps the result as
//! a `TickerRow` together with the popularity counter.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::tickers::Symbol;

/// Round to two decimal places, halves away from zero.
///
/// The value is scaled by 100 and passed to `f64::round`. Binary floats can
/// still land just below a written half, so `1.005` becomes `1.0` and `0.285`
/// becomes `0.28`.
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    (value * 100.0).round() / 100.0
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_default())
}

/// Point-in-time quote for one symbol, in the upstream wire layout.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Quote {
    /// Current price.
    #[serde(rename = "c", deserialize_with = "null_as_zero", default)]
    pub current_price: f64,
    /// Absolute change against the previous close.
    #[serde(rename = "d", deserialize_with = "null_as_zero", default)]
    pub change: f64,
    /// Percent change against the previous close.
    #[serde(rename = "dp", deserialize_with = "null_as_zero", default)]
    pub percent_change: f64,
    /// High price of the day.
    #[serde(rename = "h", deserialize_with = "null_as_zero", default)]
    pub high: f64,
    /// Low price of the day.
    #[serde(rename = "l", deserialize_with = "null_as_zero", default)]
    pub low: f64,
    /// Open price of the day.
    #[serde(rename = "o", deserialize_with = "null_as_zero", default)]
    pub open: f64,
    /// Previous close price.
    #[serde(rename = "pc", deserialize_with = "null_as_zero", default)]
    pub previous_close: f64,
    /// Upstream timestamp in seconds since the Unix epoch.
    #[serde(rename = "t", default)]
    pub timestamp: i64,
}

impl Quote {
    /// Copy with price, change and percent change rounded the way the cache stores them.
    pub fn rounded(&self) -> Quote {
        Quote {
            current_price: round2(self.current_price),
            change: round2(self.change),
            percent_change: round2(self.percent_change),
            ..*self
        }
    }

    /// Upstream reports unknown symbols as an all-zero quote.
    pub fn is_empty(&self) -> bool {
        self.current_price == 0.0 && self.previous_close == 0.0 && self.timestamp == 0
    }
}

/// Write-side view of a cache row.
///
/// `popularity_count` is `None` on the refresh path so an update never touches
/// the counter; it only seeds the value when the row is first inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct TickerUpdate {
    /// Row key.
    pub symbol: Symbol,
    /// Current price, two decimals.
    pub current_price: f64,
    /// Percent change against the previous close, two decimals.
    pub percent_change: f64,
    /// Absolute change against the previous close, two decimals.
    pub change: f64,
    /// Counter to write, `None` to keep the stored one.
    pub popularity_count: Option<i64>,
}

impl TickerUpdate {
    /// Build an update from a fetched quote, rounding to two decimals.
    pub fn from_quote(symbol: Symbol, quote: &Quote) -> Self {
        let rounded = quote.rounded();
        TickerUpdate {
            symbol,
            current_price: rounded.current_price,
            percent_change: rounded.percent_change,
            change: rounded.change,
            popularity_count: None,
        }
    }

    /// Include an explicit popularity value in the write.
    pub fn with_popularity(mut self, count: i64) -> Self {
        self.popularity_count = Some(count.max(0));
        self
    }
}

/// One cached ticker, exactly one per symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerRow {
    /// Primary key.
    pub symbol: Symbol,
    /// Last known price, two decimals.
    pub current_price: f64,
    /// Last known percent change, two decimals.
    pub percent_change: f64,
    /// Last known absolute change, two decimals.
    pub change: f64,
    /// Number of successful searches, never negative.
    pub popularity_count: i64,
    /// Time of the last upsert.
    pub last_updated: DateTime<Utc>,
}

impl TickerRow {
    /// Whether the row was last written more than `max_age` before `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now.signed_duration_since(self.last_updated) > max_age
    }

    /// Price fields match the update (popularity and timestamp ignored).
    pub fn matches(&self, update: &TickerUpdate) -> bool {
        self.symbol == update.symbol
            && self.current_price == update.current_price
            && self.percent_change == update.percent_change
            && self.change == update.change
    }
}
