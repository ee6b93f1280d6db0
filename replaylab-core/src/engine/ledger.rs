//! Trade ledger: append-only record of OPEN / CLOSE events.

use serde::{Deserialize, Serialize};

use crate::domain::{Trade, TradeAction};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeLedger {
    trades: Vec<Trade>,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, trade: Trade) {
        self.trades.push(trade);
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn open_count(&self) -> usize {
        self.trades.iter().filter(|t| t.is_open()).count()
    }

    pub fn close_count(&self) -> usize {
        self.trades.iter().filter(|t| t.is_close()).count()
    }

    /// OPEN and CLOSE strictly alternate, starting with OPEN and ending with CLOSE.
    pub fn is_balanced(&self) -> bool {
        self.trades.len() % 2 == 0
            && self.trades.iter().enumerate().all(|(i, t)| {
                let expected = if i % 2 == 0 {
                    TradeAction::Open
                } else {
                    TradeAction::Close
                };
                t.action == expected
            })
    }

    pub fn into_trades(self) -> Vec<Trade> {
        self.trades
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Direction;
    use chrono::{TimeZone, Utc};

    fn trade(action: TradeAction) -> Trade {
        Trade {
            direction: Direction::Long,
            action,
            price: 100.0,
            size: 1.0,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            balance: 10_000.0,
            pnl: 0.0,
            fee: 0.0,
            risk_amount: 200.0,
            exit_reason: None,
        }
    }

    #[test]
    fn empty_ledger_is_balanced() {
        let ledger = TradeLedger::new();
        assert!(ledger.is_empty());
        assert!(ledger.is_balanced());
    }

    #[test]
    fn paired_ledger_is_balanced() {
        let mut ledger = TradeLedger::new();
        ledger.record(trade(TradeAction::Open));
        ledger.record(trade(TradeAction::Close));
        assert!(ledger.is_balanced());
        assert_eq!(ledger.open_count(), 1);
        assert_eq!(ledger.close_count(), 1);
    }

    #[test]
    fn dangling_open_is_unbalanced() {
        let mut ledger = TradeLedger::new();
        ledger.record(trade(TradeAction::Open));
        assert!(!ledger.is_balanced());
    }

    #[test]
    fn misordered_pair_is_unbalanced() {
        let mut ledger = TradeLedger::new();
        ledger.record(trade(TradeAction::Close));
        ledger.record(trade(TradeAction::Open));
        assert_eq!(ledger.len(), 2);
        assert!(!ledger.is_balanced());
    }
}
