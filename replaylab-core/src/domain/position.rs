//! Position: the single in-flight trade of a run.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::signal::Direction;

/// Lifecycle status. A position moves OPEN → CLOSED exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    Open,
    Closed,
}

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    /// Forced liquidation against the last candle of the run.
    EndOfData,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StopLoss => write!(f, "stop_loss"),
            Self::TakeProfit => write!(f, "take_profit"),
            Self::EndOfData => write!(f, "end_of_data"),
        }
    }
}

/// Exit-side fields, filled in by the close transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionExit {
    pub exit_price: f64,
    pub exit_timestamp: DateTime<Utc>,
    /// Account balance after PnL and fees were applied.
    pub exit_balance: f64,
    /// Direction-adjusted PnL before fees.
    pub realized_pnl: f64,
    pub fee: f64,
    pub reason: ExitReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub direction: Direction,
    pub entry_price: f64,
    pub size: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub entry_timestamp: DateTime<Utc>,
    /// Risk amount committed at entry (not the account balance).
    pub entry_balance: f64,
    pub status: PositionStatus,
    pub exit: Option<PositionExit>,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.status == PositionStatus::Open
    }

    /// Exit condition at `price`, if any.
    ///
    /// Long: stop when `price <= stop_loss`, target when `price >= take_profit`.
    /// Short: mirrored. The stop is checked first, so a price satisfying both
    /// records a stop-loss exit.
    pub fn exit_trigger(&self, price: f64) -> Option<ExitReason> {
        let (stopped, target_hit) = match self.direction {
            Direction::Long => (price <= self.stop_loss, price >= self.take_profit),
            Direction::Short => (price >= self.stop_loss, price <= self.take_profit),
        };
        if stopped {
            Some(ExitReason::StopLoss)
        } else if target_hit {
            Some(ExitReason::TakeProfit)
        } else {
            None
        }
    }

    /// PnL before fees if the position were closed at `exit_price`.
    pub fn gross_pnl(&self, exit_price: f64) -> f64 {
        match self.direction {
            Direction::Long => (exit_price - self.entry_price) * self.size,
            Direction::Short => (self.entry_price - exit_price) * self.size,
        }
    }

    /// Fee charged on the notional of both legs.
    pub fn round_trip_fee(&self, exit_price: f64, fee_rate: f64) -> f64 {
        fee_rate * self.size * (self.entry_price + exit_price)
    }
}
