//! Trade: immutable ledger entry emitted at position open and close.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::position::ExitReason;
use super::signal::Direction;

/// Which side of the position lifecycle produced the trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    Open,
    Close,
}

/// Snapshot of a position event.
///
/// `balance` is the account balance immediately after the event. Opening a
/// position does not move the balance, so an OPEN trade carries the balance the
/// position was sized against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub direction: Direction,
    pub action: TradeAction,
    pub price: f64,
    pub size: f64,
    pub timestamp: DateTime<Utc>,
    pub balance: f64,
    /// Realized PnL before fees. Always zero for OPEN trades.
    pub pnl: f64,
    /// Fee charged on close. Always zero for OPEN trades.
    #[serde(default)]
    pub fee: f64,
    /// Amount put at risk by the sizing rule.
    #[serde(default)]
    pub risk_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_reason: Option<ExitReason>,
}

impl Trade {
    pub fn is_open(&self) -> bool {
        self.action == TradeAction::Open
    }

    pub fn is_close(&self) -> bool {
        self.action == TradeAction::Close
    }

    /// A CLOSE trade with positive realized PnL.
    pub fn is_winner(&self) -> bool {
        self.is_close() && self.pnl > 0.0
    }

    /// Realized PnL after fees; the amount the balance moved by.
    pub fn net_pnl(&self) -> f64 {
        self.pnl - self.fee
    }
}
