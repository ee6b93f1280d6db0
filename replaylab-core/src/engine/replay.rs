//! Candle-by-candle replay loop.
//!
//! One strictly sequential pass over the market data. For each candle:
//! 1. Flat: ask the strategy for a signal; on long/short, size it with the
//!    risk rule and open a position at the candle's price.
//! 2. In a position: check stop-loss / take-profit and close on a hit.
//!
//! The candle that closes a position never opens the next one, since the
//! strategy is only asked while flat and that check comes first.
//!
//! A position still open when the data runs out is force-closed against the
//! last candle, so every completed replay leaves the ledger balanced.

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use crate::components::{Params, PluginError, RiskError, RiskRequest, RiskRule, Strategy};
use crate::domain::{Candle, ExitReason, Trade};

use super::ledger::TradeLedger;
use super::lifecycle::{LifecycleError, PositionLifecycle};

/// The cancellation flag is polled once per this many candles.
pub const CANCEL_CHECK_INTERVAL: usize = 256;

/// Numeric settings for a single replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub initial_balance: f64,
    /// Percent of the running balance risked per position, in (0, 100].
    pub risk_percent: f64,
    /// Flat fee rate charged on each leg's notional.
    pub fee_rate: f64,
    pub strategy_params: Params,
    pub risk_params: Params,
}

impl EngineConfig {
    pub fn new(initial_balance: f64, risk_percent: f64) -> Self {
        Self {
            initial_balance,
            risk_percent,
            fee_rate: 0.0,
            strategy_params: Params::new(),
            risk_params: Params::new(),
        }
    }
}

/// Everything a completed replay produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOutcome {
    /// Balanced OPEN/CLOSE ledger in event order.
    pub trades: Vec<Trade>,
    pub final_balance: f64,
    pub candle_count: usize,
    /// Number of long/short signals acted on.
    pub signal_count: usize,
    /// True if the last position was closed by end-of-data liquidation.
    pub forced_liquidation: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no market data to replay")]
    EmptyMarketData,
    #[error("strategy '{strategy}' failed at candle {index}: {source}")]
    Strategy {
        strategy: String,
        index: usize,
        source: PluginError,
    },
    #[error("risk rule '{rule}' failed at candle {index}: {source}")]
    Risk {
        rule: String,
        index: usize,
        source: RiskError,
    },
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("replay cancelled after {processed} of {total} candles")]
    Cancelled { processed: usize, total: usize },
}

/// Replay `candles` through `strategy` and `risk`.
///
/// Any plugin failure aborts the run; the partial ledger is dropped and never
/// returned. `cancel` is polled every [`CANCEL_CHECK_INTERVAL`] candles, between
/// iterations, and a cancelled run is likewise discarded.
pub fn replay(
    candles: &[Candle],
    strategy: &dyn Strategy,
    risk: &dyn RiskRule,
    config: &EngineConfig,
    cancel: Option<&AtomicBool>,
) -> Result<ReplayOutcome, EngineError> {
    let last = candles.last().ok_or(EngineError::EmptyMarketData)?;

    let mut balance = config.initial_balance;
    let mut lifecycle = PositionLifecycle::new(config.fee_rate);
    let mut ledger = TradeLedger::new();
    let mut signal_count = 0;

    for (index, candle) in candles.iter().enumerate() {
        if index % CANCEL_CHECK_INTERVAL == 0 && cancel.is_some_and(|f| f.load(Ordering::Relaxed))
        {
            tracing::warn!(processed = index, total = candles.len(), "replay cancelled");
            return Err(EngineError::Cancelled {
                processed: index,
                total: candles.len(),
            });
        }

        if !lifecycle.is_open() {
            let signal = strategy
                .evaluate(candle, &config.strategy_params)
                .map_err(|source| EngineError::Strategy {
                    strategy: strategy.name().to_string(),
                    index,
                    source,
                })?;
            if let Some(direction) = signal.direction() {
                signal_count += 1;
                let request = RiskRequest {
                    direction,
                    balance,
                    entry_price: candle.price,
                    risk_percent: config.risk_percent,
                    candle,
                };
                let sizing = risk
                    .size(&request, &config.risk_params)
                    .map_err(|source| EngineError::Risk {
                        rule: risk.name().to_string(),
                        index,
                        source,
                    })?;
                let trade = lifecycle.open(direction, &sizing, candle, balance)?;
                ledger.record(trade);
            }
        }

        // Includes a position opened on this very candle.
        if let Some(reason) = lifecycle.check_exit(candle) {
            let closed = lifecycle.close(candle, balance, reason)?;
            balance = closed.balance();
            ledger.record(closed.trade);
        }
    }

    let forced_liquidation = lifecycle.is_open();
    if forced_liquidation {
        let closed = lifecycle.close(last, balance, ExitReason::EndOfData)?;
        tracing::info!(
            price = last.price,
            pnl = closed.trade.pnl,
            "force-closed open position at end of data"
        );
        balance = closed.balance();
        ledger.record(closed.trade);
    }

    debug_assert!(ledger.is_balanced(), "ledger must pair every OPEN with a CLOSE");

    Ok(ReplayOutcome {
        trades: ledger.into_trades(),
        final_balance: balance,
        candle_count: candles.len(),
        signal_count,
        forced_liquidation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{FixedPercentStop, NullStrategy};
    use crate::domain::{Signal, TradeAction};
    use chrono::{Duration, TimeZone, Utc};

    /// Signals long on the first candle it sees priced at `trigger`.
    struct LongAt(f64);

    impl Strategy for LongAt {
        fn name(&self) -> &str {
            "long_at"
        }

        fn evaluate(&self, candle: &Candle, _params: &Params) -> Result<Signal, PluginError> {
            Ok(if candle.price == self.0 {
                Signal::Long
            } else {
                Signal::None
            })
        }
    }

    fn candles(prices: &[f64]) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| Candle::flat(start + Duration::days(i as i64), p))
            .collect()
    }

    #[test]
    fn empty_data_is_rejected() {
        let err = replay(
            &[],
            &NullStrategy,
            &FixedPercentStop,
            &EngineConfig::new(10_000.0, 2.0),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::EmptyMarketData));
    }

    #[test]
    fn take_profit_closes_position() {
        let data = candles(&[100.0, 101.0, 104.0, 90.0]);
        let out = replay(
            &data,
            &LongAt(100.0),
            &FixedPercentStop,
            &EngineConfig::new(10_000.0, 2.0),
            None,
        )
        .unwrap();

        assert_eq!(out.trades.len(), 2);
        let close = &out.trades[1];
        assert_eq!(close.action, TradeAction::Close);
        assert_eq!(close.exit_reason, Some(ExitReason::TakeProfit));
        assert_eq!(close.timestamp, data[2].timestamp);
        assert!((out.final_balance - 10_400.0).abs() < 1e-6);
        assert!(!out.forced_liquidation);
    }

    #[test]
    fn closing_candle_does_not_reopen() {
        // The candle that closes the position must not also query the strategy.
        let data = candles(&[100.0, 98.0, 100.0]);
        let out = replay(
            &data,
            &LongAt(100.0),
            &FixedPercentStop,
            &EngineConfig::new(10_000.0, 2.0),
            None,
        )
        .unwrap();
        assert_eq!(out.trades.len(), 4);
        assert_eq!(out.trades[1].exit_reason, Some(ExitReason::StopLoss));
        assert_eq!(out.trades[3].exit_reason, Some(ExitReason::EndOfData));
        assert!(out.forced_liquidation);
        assert_eq!(out.signal_count, 2);
    }

    #[test]
    fn preset_cancel_flag_stops_before_first_candle() {
        let flag = AtomicBool::new(true);
        let err = replay(
            &candles(&[100.0, 101.0]),
            &NullStrategy,
            &FixedPercentStop,
            &EngineConfig::new(10_000.0, 2.0),
            Some(&flag),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Cancelled {
                processed: 0,
                total: 2
            }
        ));
    }
}
