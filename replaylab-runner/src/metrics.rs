//! Performance metrics: pure functions over the trade ledger.
//!
//! Every metric is a pure function: ledger and/or balances in, scalar out.
//! Percent-valued metrics are returned as percents (e.g. `12.5` for 12.5%).

use serde::{Deserialize, Serialize};

use replaylab_core::domain::Trade;

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Completed round trips (CLOSE events).
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate_pct: f64,
    pub total_return_pct: f64,
    pub max_drawdown_pct: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: f64,
    pub total_fees: f64,
}

impl PerformanceMetrics {
    pub fn compute(trades: &[Trade], initial_balance: f64, final_balance: f64) -> Self {
        Self {
            total_trades: total_trades(trades),
            winning_trades: winning_trades(trades),
            losing_trades: losing_trades(trades),
            win_rate_pct: win_rate_pct(trades),
            total_return_pct: total_return_pct(initial_balance, final_balance),
            max_drawdown_pct: max_drawdown_pct(trades),
            gross_profit: gross_profit(trades),
            gross_loss: gross_loss(trades),
            profit_factor: profit_factor(trades),
            total_fees: total_fees(trades),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// `(final - initial) / initial * 100`. Zero for a non-positive initial balance.
pub fn total_return_pct(initial_balance: f64, final_balance: f64) -> f64 {
    if initial_balance <= 0.0 {
        return 0.0;
    }
    (final_balance - initial_balance) / initial_balance * 100.0
}

pub fn total_trades(trades: &[Trade]) -> usize {
    trades.iter().filter(|t| t.is_close()).count()
}

/// CLOSE events with a positive realized PnL.
pub fn winning_trades(trades: &[Trade]) -> usize {
    trades.iter().filter(|t| t.is_winner()).count()
}

pub fn losing_trades(trades: &[Trade]) -> usize {
    trades.iter().filter(|t| t.is_close() && t.pnl < 0.0).count()
}

/// Winners over completed trades, in percent. Zero when nothing closed.
pub fn win_rate_pct(trades: &[Trade]) -> f64 {
    let total = total_trades(trades);
    if total == 0 {
        return 0.0;
    }
    winning_trades(trades) as f64 / total as f64 * 100.0
}

/// Largest peak-to-trough decline of the balance-at-event sequence, in
/// percent. The peak starts at the first recorded balance.
pub fn max_drawdown_pct(trades: &[Trade]) -> f64 {
    let Some(first) = trades.first() else {
        return 0.0;
    };
    let mut peak = first.balance;
    let mut max_dd = 0.0_f64;

    for t in trades {
        if t.balance > peak {
            peak = t.balance;
        }
        if peak > 0.0 {
            let dd = (peak - t.balance) / peak * 100.0;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Sum of positive net (after fee) results.
pub fn gross_profit(trades: &[Trade]) -> f64 {
    trades
        .iter()
        .filter(|t| t.is_close())
        .map(Trade::net_pnl)
        .filter(|pnl| *pnl > 0.0)
        .sum()
}

/// Sum of negative net (after fee) results, as a positive number.
pub fn gross_loss(trades: &[Trade]) -> f64 {
    trades
        .iter()
        .filter(|t| t.is_close())
        .map(Trade::net_pnl)
        .filter(|pnl| *pnl < 0.0)
        .map(f64::abs)
        .sum()
}

/// Gross profit / gross loss.
///
/// Capped at 100.0 for edge cases (all winners, zero losses).
pub fn profit_factor(trades: &[Trade]) -> f64 {
    let profit = gross_profit(trades);
    let loss = gross_loss(trades);
    if loss < 1e-10 {
        return if profit > 0.0 { 100.0 } else { 0.0 };
    }
    (profit / loss).min(100.0)
}

pub fn total_fees(trades: &[Trade]) -> f64 {
    trades.iter().map(|t| t.fee).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use replaylab_core::domain::{Direction, ExitReason, TradeAction};

    /// Builds a ledger of round trips from `(pnl, fee)` pairs, tracking the
    /// account balance the way the engine does.
    fn ledger(initial: f64, results: &[(f64, f64)]) -> Vec<Trade> {
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut balance = initial;
        let mut out = Vec::new();
        for (i, &(pnl, fee)) in results.iter().enumerate() {
            let ts = t0 + Duration::hours(i as i64 * 2);
            out.push(Trade {
                direction: Direction::Long,
                action: TradeAction::Open,
                price: 100.0,
                size: 1.0,
                timestamp: ts,
                balance,
                pnl: 0.0,
                fee: 0.0,
                risk_amount: 2.0,
                exit_reason: None,
            });
            balance += pnl - fee;
            out.push(Trade {
                direction: Direction::Long,
                action: TradeAction::Close,
                price: 100.0 + pnl,
                size: 1.0,
                timestamp: ts + Duration::hours(1),
                balance,
                pnl,
                fee,
                risk_amount: 2.0,
                exit_reason: Some(ExitReason::TakeProfit),
            });
        }
        out
    }

    #[test]
    fn empty_ledger_is_all_zero() {
        let m = PerformanceMetrics::compute(&[], 10_000.0, 10_000.0);
        assert_eq!(m.total_trades, 0);
        assert_eq!(m.win_rate_pct, 0.0);
        assert!(!m.win_rate_pct.is_nan());
        assert_eq!(m.max_drawdown_pct, 0.0);
        assert_eq!(m.total_return_pct, 0.0);
        assert_eq!(m.profit_factor, 0.0);
    }

    #[test]
    fn counts_closes_only() {
        let trades = ledger(1_000.0, &[(10.0, 0.0), (-5.0, 0.0), (3.0, 0.0)]);
        assert_eq!(trades.len(), 6);
        assert_eq!(total_trades(&trades), 3);
        assert_eq!(winning_trades(&trades), 2);
        assert_eq!(losing_trades(&trades), 1);
        assert!((win_rate_pct(&trades) - 200.0 / 3.0).abs() < 1e-10);
    }

    #[test]
    fn open_without_close_is_not_a_trade() {
        // OPEN, CLOSE, OPEN: a trailing open leg is not a completed trade.
        let mut trades = ledger(1_000.0, &[(10.0, 0.0), (-5.0, 0.0)]);
        trades.truncate(3);
        assert_eq!(total_trades(&trades), 1);
        assert_eq!(winning_trades(&trades), 1);
        assert_eq!(win_rate_pct(&trades), 100.0);

        // CLOSE, OPEN, CLOSE: two completed trades in three events.
        let trades = ledger(1_000.0, &[(10.0, 0.0), (-5.0, 0.0)]).split_off(1);
        assert_eq!(trades.len(), 3);
        assert_eq!(total_trades(&trades), 2);
        assert_eq!(losing_trades(&trades), 1);
        assert_eq!(win_rate_pct(&trades), 50.0);
    }

    #[test]
    fn breakeven_is_neither_win_nor_loss() {
        let trades = ledger(1_000.0, &[(0.0, 0.0)]);
        assert_eq!(winning_trades(&trades), 0);
        assert_eq!(losing_trades(&trades), 0);
        assert_eq!(win_rate_pct(&trades), 0.0);
    }

    #[test]
    fn total_return_known() {
        assert!((total_return_pct(10_000.0, 10_400.0) - 4.0).abs() < 1e-10);
        assert!((total_return_pct(10_000.0, 9_000.0) + 10.0).abs() < 1e-10);
        assert_eq!(total_return_pct(0.0, 100.0), 0.0);
    }

    #[test]
    fn max_drawdown_known() {
        // Balances: 1000, 1100, 1100, 900, 900, 950. Peak 1100, trough 900.
        let trades = ledger(1_000.0, &[(100.0, 0.0), (-200.0, 0.0), (50.0, 0.0)]);
        let expected = (1_100.0 - 900.0) / 1_100.0 * 100.0;
        assert!((max_drawdown_pct(&trades) - expected).abs() < 1e-10);
    }

    #[test]
    fn max_drawdown_from_first_balance() {
        let trades = ledger(1_000.0, &[(-100.0, 0.0)]);
        assert!((max_drawdown_pct(&trades) - 10.0).abs() < 1e-10);
    }

    #[test]
    fn max_drawdown_monotonic_increase() {
        let trades = ledger(1_000.0, &[(10.0, 0.0), (20.0, 0.0), (30.0, 0.0)]);
        assert_eq!(max_drawdown_pct(&trades), 0.0);
    }

    #[test]
    fn profit_factor_uses_net_results() {
        let trades = ledger(1_000.0, &[(30.0, 0.0), (-10.0, 0.0)]);
        assert!((profit_factor(&trades) - 3.0).abs() < 1e-10);
        // A 1.0 gross winner paying 1.5 in fees is a net loser.
        let trades = ledger(1_000.0, &[(1.0, 1.5)]);
        assert_eq!(gross_profit(&trades), 0.0);
        assert!((gross_loss(&trades) - 0.5).abs() < 1e-10);
        assert_eq!(winning_trades(&trades), 1);
    }

    #[test]
    fn profit_factor_capped() {
        let trades = ledger(1_000.0, &[(30.0, 0.0)]);
        assert_eq!(profit_factor(&trades), 100.0);
    }

    #[test]
    fn fees_are_summed() {
        let trades = ledger(1_000.0, &[(5.0, 0.25), (-5.0, 0.5)]);
        assert!((total_fees(&trades) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn metrics_serialize_round_trip() {
        let trades = ledger(1_000.0, &[(10.0, 0.1)]);
        let m = PerformanceMetrics::compute(&trades, 1_000.0, 1_009.9);
        let json = serde_json::to_string(&m).unwrap();
        let back: PerformanceMetrics = serde_json::from_str(&json).unwrap();
        assert_eq!(m, back);
    }
}
