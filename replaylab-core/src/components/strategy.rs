//! Strategy contract and reference strategies.
//!
//! A strategy maps one candle plus its parameters to a [`Signal`]. The engine
//! may hand the same instance every candle of every run, on any thread, so
//! implementations must not keep mutable state between calls. A strategy that
//! needs history has to derive it from what it is given.

use crate::domain::{Candle, Signal};

use super::params::{invalid, param, require_param, Params, PluginError};

/// Trait for trade-signal generators.
///
/// # Architecture invariant
/// `evaluate` receives only the candle and parameters, never the account
/// balance or the open position. The engine calls it only while flat.
pub trait Strategy: Send + Sync {
    /// Registry name (e.g., "candle_momentum").
    fn name(&self) -> &str;

    /// Check parameters before a run starts. The default accepts anything.
    fn validate(&self, _params: &Params) -> Result<(), PluginError> {
        Ok(())
    }

    /// Evaluate a single candle.
    fn evaluate(&self, candle: &Candle, params: &Params) -> Result<Signal, PluginError>;
}

// ─── Candle momentum ────────────────────────────────────────────────

/// Trades in the direction of the candle body.
///
/// Long when `(close - open) / open * 100 >= threshold_pct` (default 0.5),
/// short when the body falls by at least the threshold, otherwise no signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandleMomentum;

impl CandleMomentum {
    pub const NAME: &'static str = "candle_momentum";
    pub const DEFAULT_THRESHOLD_PCT: f64 = 0.5;

    fn threshold(params: &Params) -> Result<f64, PluginError> {
        let threshold = param(params, "threshold_pct", Self::DEFAULT_THRESHOLD_PCT);
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(invalid(
                Self::NAME,
                "threshold_pct",
                threshold,
                "must be a non-negative number",
            ));
        }
        Ok(threshold)
    }
}

impl Strategy for CandleMomentum {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn validate(&self, params: &Params) -> Result<(), PluginError> {
        Self::threshold(params).map(|_| ())
    }

    fn evaluate(&self, candle: &Candle, params: &Params) -> Result<Signal, PluginError> {
        let threshold = Self::threshold(params)?;
        if candle.open <= 0.0 || candle.is_void() {
            return Ok(Signal::None);
        }

        let change_pct = (candle.close - candle.open) / candle.open * 100.0;
        let signal = if change_pct > 0.0 && change_pct >= threshold {
            Signal::Long
        } else if change_pct < 0.0 && -change_pct >= threshold {
            Signal::Short
        } else {
            Signal::None
        };
        Ok(signal)
    }
}

// ─── Price band ─────────────────────────────────────────────────────

/// Mean-reversion band: long at or below `lower`, short at or above `upper`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PriceBand;

impl PriceBand {
    pub const NAME: &'static str = "price_band";

    fn bounds(params: &Params) -> Result<(f64, f64), PluginError> {
        let lower = require_param(Self::NAME, params, "lower")?;
        let upper = require_param(Self::NAME, params, "upper")?;
        if lower.is_nan() || upper.is_nan() || lower >= upper {
            return Err(invalid(Self::NAME, "upper", upper, "must be above 'lower'"));
        }
        Ok((lower, upper))
    }
}

impl Strategy for PriceBand {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn validate(&self, params: &Params) -> Result<(), PluginError> {
        Self::bounds(params).map(|_| ())
    }

    fn evaluate(&self, candle: &Candle, params: &Params) -> Result<Signal, PluginError> {
        let (lower, upper) = Self::bounds(params)?;

        let signal = if candle.price <= lower {
            Signal::Long
        } else if candle.price >= upper {
            Signal::Short
        } else {
            Signal::None
        };
        Ok(signal)
    }
}

// ─── Null ───────────────────────────────────────────────────────────

/// Never signals. Useful as a baseline and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullStrategy;

impl NullStrategy {
    pub const NAME: &'static str = "null";
}

impl Strategy for NullStrategy {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn evaluate(&self, _candle: &Candle, _params: &Params) -> Result<Signal, PluginError> {
        Ok(Signal::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn candle(open: f64, close: f64) -> Candle {
        Candle {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            price: close,
            volume: 1_000.0,
            open,
            high: open.max(close),
            low: open.min(close),
            close,
        }
    }

    fn params(pairs: &[(&str, f64)]) -> Params {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn momentum_follows_body_direction() {
        let s = CandleMomentum;
        let p = Params::new();
        assert_eq!(s.evaluate(&candle(100.0, 101.0), &p).unwrap(), Signal::Long);
        assert_eq!(s.evaluate(&candle(100.0, 99.0), &p).unwrap(), Signal::Short);
        assert_eq!(s.evaluate(&candle(100.0, 100.2), &p).unwrap(), Signal::None);
    }

    #[test]
    fn momentum_zero_threshold_ignores_doji() {
        let p = params(&[("threshold_pct", 0.0)]);
        assert_eq!(
            CandleMomentum.evaluate(&candle(100.0, 100.0), &p).unwrap(),
            Signal::None
        );
        assert_eq!(
            CandleMomentum.evaluate(&candle(100.0, 100.01), &p).unwrap(),
            Signal::Long
        );
    }

    #[test]
    fn momentum_rejects_negative_threshold() {
        let p = params(&[("threshold_pct", -1.0)]);
        let err = CandleMomentum.evaluate(&candle(100.0, 101.0), &p).unwrap_err();
        assert!(matches!(err, PluginError::InvalidParam { ref param, .. } if param == "threshold_pct"));
    }

    #[test]
    fn band_signals_at_edges() {
        let p = params(&[("lower", 95.0), ("upper", 105.0)]);
        assert_eq!(PriceBand.evaluate(&candle(96.0, 95.0), &p).unwrap(), Signal::Long);
        assert_eq!(PriceBand.evaluate(&candle(104.0, 105.0), &p).unwrap(), Signal::Short);
        assert_eq!(PriceBand.evaluate(&candle(100.0, 100.0), &p).unwrap(), Signal::None);
    }

    #[test]
    fn band_requires_both_edges() {
        let p = params(&[("lower", 95.0)]);
        let err = PriceBand.evaluate(&candle(100.0, 100.0), &p).unwrap_err();
        assert!(matches!(err, PluginError::MissingParam { ref param, .. } if param == "upper"));
    }

    #[test]
    fn band_rejects_inverted_edges() {
        let p = params(&[("lower", 105.0), ("upper", 95.0)]);
        assert!(PriceBand.evaluate(&candle(100.0, 100.0), &p).is_err());
    }

    #[test]
    fn validate_checks_params_without_a_candle() {
        assert!(PriceBand.validate(&params(&[("lower", 95.0)])).is_err());
        assert!(PriceBand
            .validate(&params(&[("lower", 95.0), ("upper", 105.0)]))
            .is_ok());
        assert!(CandleMomentum.validate(&Params::new()).is_ok());
        assert!(NullStrategy.validate(&params(&[("anything", 1.0)])).is_ok());
    }

    #[test]
    fn null_never_signals() {
        assert_eq!(
            NullStrategy.evaluate(&candle(100.0, 150.0), &Params::new()).unwrap(),
            Signal::None
        );
    }
}
