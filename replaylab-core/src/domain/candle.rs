//! Candle: the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV sample for the traded instrument.
///
/// `price` is the price the engine trades at (entries, exits and trigger
/// checks). The OHLC columns are carried for strategies and risk rules that
/// need the candle's shape. Timestamps are expected to be non-decreasing across
/// a sequence; the engine does not enforce this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub volume: f64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl Candle {
    /// Candle whose OHLC and trade price all equal `price`.
    pub fn flat(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self {
            timestamp,
            price,
            volume: 0.0,
            open: price,
            high: price,
            low: price,
            close: price,
        }
    }

    /// High minus low.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// Returns true if the trade price or any OHLC field is NaN.
    pub fn is_void(&self) -> bool {
        self.price.is_nan()
            || self.open.is_nan()
            || self.high.is_nan()
            || self.low.is_nan()
            || self.close.is_nan()
    }

    /// Basic OHLC sanity check: high bounds the candle from above, low from below.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.price > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_candle() -> Candle {
        Candle {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            price: 103.0,
            volume: 50_000.0,
            open: 100.0,
            high: 105.0,
            low: 98.0,
            close: 103.0,
        }
    }

    #[test]
    fn candle_is_sane() {
        assert!(sample_candle().is_sane());
    }

    #[test]
    fn candle_detects_void() {
        let mut candle = sample_candle();
        candle.price = f64::NAN;
        assert!(candle.is_void());
        assert!(!candle.is_sane());
    }

    #[test]
    fn candle_detects_insane_high_low() {
        let mut candle = sample_candle();
        candle.high = 97.0;
        assert!(!candle.is_sane());
    }

    #[test]
    fn range_is_high_minus_low() {
        assert_eq!(sample_candle().range(), 7.0);
    }

    #[test]
    fn flat_candle_has_zero_range() {
        let candle = Candle::flat(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(), 50.0);
        assert_eq!(candle.range(), 0.0);
        assert_eq!(candle.close, 50.0);
        assert!(candle.is_sane());
    }

    #[test]
    fn candle_deserializes_rfc3339_timestamp() {
        let json = r#"{"timestamp":"2024-01-02T00:00:00Z","price":103.0,"volume":50000.0,
            "open":100.0,"high":105.0,"low":98.0,"close":103.0}"#;
        let candle: Candle = serde_json::from_str(json).unwrap();
        assert_eq!(candle, sample_candle());
    }
}
