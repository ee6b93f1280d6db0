//! Risk contract: position size, stop-loss and take-profit for a new position.
//!
//! Every reference rule picks a stop-loss price its own way and then hands off
//! to [`compute_risk`], the canonical sizing algorithm:
//!
//! ```text
//! risk_amount   = balance * risk_percent / 100
//! price_diff    = |entry_price - stop_loss_price|
//! position_size = risk_amount / price_diff
//! take_profit   = entry ± price_diff * risk_reward_ratio   (+ long, - short)
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::{Candle, Direction};

use super::params::{invalid, param, positive_param, require_param, Params, PluginError};

/// Risk-reward ratio used when a rule is not given one.
pub const DEFAULT_RISK_REWARD_RATIO: f64 = 2.0;

/// Inputs for one sizing decision.
#[derive(Debug, Clone, Copy)]
pub struct RiskRequest<'a> {
    pub direction: Direction,
    /// Account balance before the position is opened.
    pub balance: f64,
    /// Price the position will be filled at.
    pub entry_price: f64,
    /// Percent of `balance` to put at risk, in (0, 100].
    pub risk_percent: f64,
    /// Candle the signal fired on.
    pub candle: &'a Candle,
}

/// Sizing decision for one position. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskResult {
    pub position_size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub risk_amount: f64,
    pub risk_percent: f64,
    pub risk_reward_ratio: f64,
}

/// Errors from sizing.
///
/// Everything except `Plugin` is an invalid-risk-parameters condition: the
/// inputs cannot produce a meaningful size and the run must stop.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RiskError {
    #[error("invalid risk parameters: risk percent {0} is outside (0, 100]")]
    RiskPercentOutOfRange(f64),
    #[error("invalid risk parameters: account balance {0} is not positive")]
    NonPositiveBalance(f64),
    #[error("invalid risk parameters: entry price {entry_price} equals stop-loss price")]
    ZeroStopDistance { entry_price: f64 },
    #[error(
        "invalid risk parameters: non-finite prices (entry {entry_price}, stop-loss {stop_loss_price})"
    )]
    NonFinitePrice {
        entry_price: f64,
        stop_loss_price: f64,
    },
    #[error(transparent)]
    Plugin(#[from] PluginError),
}

impl RiskError {
    /// True for the invalid-risk-parameters family, false for plugin failures.
    pub fn is_invalid_parameters(&self) -> bool {
        !matches!(self, Self::Plugin(_))
    }
}

/// Trait for risk-sizing rules.
pub trait RiskRule: Send + Sync {
    /// Registry name (e.g., "fixed_percent_stop").
    fn name(&self) -> &str;

    /// Check parameters before a run starts. The default accepts anything.
    fn validate(&self, _params: &Params) -> Result<(), PluginError> {
        Ok(())
    }

    fn size(&self, request: &RiskRequest<'_>, params: &Params) -> Result<RiskResult, RiskError>;
}

/// Canonical sizing from an explicit stop-loss price.
pub fn compute_risk(
    direction: Direction,
    balance: f64,
    risk_percent: f64,
    entry_price: f64,
    stop_loss_price: f64,
    risk_reward_ratio: f64,
) -> Result<RiskResult, RiskError> {
    if !(balance > 0.0 && balance.is_finite()) {
        return Err(RiskError::NonPositiveBalance(balance));
    }
    if !(risk_percent > 0.0 && risk_percent <= 100.0) {
        return Err(RiskError::RiskPercentOutOfRange(risk_percent));
    }
    if !entry_price.is_finite() || !stop_loss_price.is_finite() {
        return Err(RiskError::NonFinitePrice {
            entry_price,
            stop_loss_price,
        });
    }

    let risk_amount = balance * risk_percent / 100.0;
    let price_diff = (entry_price - stop_loss_price).abs();
    if price_diff == 0.0 {
        return Err(RiskError::ZeroStopDistance { entry_price });
    }
    let position_size = risk_amount / price_diff;
    let take_profit = match direction {
        Direction::Long => entry_price + price_diff * risk_reward_ratio,
        Direction::Short => entry_price - price_diff * risk_reward_ratio,
    };

    Ok(RiskResult {
        position_size,
        stop_loss: stop_loss_price,
        take_profit,
        risk_amount,
        risk_percent,
        risk_reward_ratio,
    })
}

fn risk_reward(plugin: &str, params: &Params) -> Result<f64, PluginError> {
    positive_param(plugin, params, "risk_reward_ratio", DEFAULT_RISK_REWARD_RATIO)
}

/// Offset `distance` from `entry` on the losing side for `direction`.
fn stop_from_distance(direction: Direction, entry: f64, distance: f64) -> f64 {
    match direction {
        Direction::Long => entry - distance,
        Direction::Short => entry + distance,
    }
}

// ─── Fixed percent stop ─────────────────────────────────────────────

/// Stop-loss `stop_loss_pct` percent (default 2) away from entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPercentStop;

impl FixedPercentStop {
    pub const NAME: &'static str = "fixed_percent_stop";
    pub const DEFAULT_STOP_LOSS_PCT: f64 = 2.0;

    fn stop_pct(params: &Params) -> Result<f64, PluginError> {
        let stop_pct = param(params, "stop_loss_pct", Self::DEFAULT_STOP_LOSS_PCT);
        if !(stop_pct > 0.0 && stop_pct < 100.0) {
            return Err(invalid(Self::NAME, "stop_loss_pct", stop_pct, "must lie in (0, 100)"));
        }
        Ok(stop_pct)
    }
}

impl RiskRule for FixedPercentStop {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn validate(&self, params: &Params) -> Result<(), PluginError> {
        Self::stop_pct(params)?;
        risk_reward(Self::NAME, params).map(|_| ())
    }

    fn size(&self, request: &RiskRequest<'_>, params: &Params) -> Result<RiskResult, RiskError> {
        let stop_pct = Self::stop_pct(params)?;
        let rr = risk_reward(Self::NAME, params)?;
        let distance = request.entry_price * stop_pct / 100.0;
        let stop = stop_from_distance(request.direction, request.entry_price, distance);
        compute_risk(
            request.direction,
            request.balance,
            request.risk_percent,
            request.entry_price,
            stop,
            rr,
        )
    }
}

// ─── Fixed stop price ───────────────────────────────────────────────

/// Stop-loss at an absolute `stop_loss_price`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedStopPrice;

impl FixedStopPrice {
    pub const NAME: &'static str = "fixed_stop_price";
}

impl RiskRule for FixedStopPrice {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn validate(&self, params: &Params) -> Result<(), PluginError> {
        require_param(Self::NAME, params, "stop_loss_price")?;
        risk_reward(Self::NAME, params).map(|_| ())
    }

    fn size(&self, request: &RiskRequest<'_>, params: &Params) -> Result<RiskResult, RiskError> {
        let stop = require_param(Self::NAME, params, "stop_loss_price")?;
        let rr = risk_reward(Self::NAME, params)?;
        compute_risk(
            request.direction,
            request.balance,
            request.risk_percent,
            request.entry_price,
            stop,
            rr,
        )
    }
}

// ─── Candle range stop ──────────────────────────────────────────────

/// Volatility stop: distance is `range_multiplier` (default 1) times the
/// signal candle's high-low range.
///
/// A zero-range candle yields a zero stop distance and fails sizing.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandleRangeStop;

impl CandleRangeStop {
    pub const NAME: &'static str = "candle_range_stop";
    pub const DEFAULT_RANGE_MULTIPLIER: f64 = 1.0;

    fn multiplier(params: &Params) -> Result<f64, PluginError> {
        positive_param(
            Self::NAME,
            params,
            "range_multiplier",
            Self::DEFAULT_RANGE_MULTIPLIER,
        )
    }
}

impl RiskRule for CandleRangeStop {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn validate(&self, params: &Params) -> Result<(), PluginError> {
        Self::multiplier(params)?;
        risk_reward(Self::NAME, params).map(|_| ())
    }

    fn size(&self, request: &RiskRequest<'_>, params: &Params) -> Result<RiskResult, RiskError> {
        let multiplier = Self::multiplier(params)?;
        let rr = risk_reward(Self::NAME, params)?;
        let distance = multiplier * request.candle.range();
        let stop = stop_from_distance(request.direction, request.entry_price, distance);
        compute_risk(
            request.direction,
            request.balance,
            request.risk_percent,
            request.entry_price,
            stop,
            rr,
        )
    }
}
