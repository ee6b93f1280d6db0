//! Position lifecycle: owns the single in-flight position of a run.
//!
//! Two states: flat (no position object) and OPEN. Closing marks the position
//! CLOSED, records the exit, and hands it back to the caller; the manager is
//! flat again afterwards. A closed position is never reopened.

use chrono::{DateTime, Utc};

use crate::components::RiskResult;
use crate::domain::{
    Candle, Direction, ExitReason, Position, PositionExit, PositionStatus, Trade, TradeAction,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    #[error("a position opened at {opened_at} is still open")]
    AlreadyOpen { opened_at: DateTime<Utc> },
    #[error("no open position to close")]
    NoOpenPosition,
}

/// Result of a close transition.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedPosition {
    /// The position with status CLOSED and its exit recorded.
    pub position: Position,
    /// The CLOSE ledger entry.
    pub trade: Trade,
}

impl ClosedPosition {
    /// Account balance after the close.
    pub fn balance(&self) -> f64 {
        self.trade.balance
    }
}

#[derive(Debug, Clone)]
pub struct PositionLifecycle {
    fee_rate: f64,
    position: Option<Position>,
}

impl PositionLifecycle {
    pub fn new(fee_rate: f64) -> Self {
        Self {
            fee_rate,
            position: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.position.is_some()
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    /// Open a position at the candle's price.
    ///
    /// `balance` is the account balance the risk rule sized against; it is
    /// recorded on the OPEN trade. The position itself keeps the risk amount.
    pub fn open(
        &mut self,
        direction: Direction,
        risk: &RiskResult,
        candle: &Candle,
        balance: f64,
    ) -> Result<Trade, LifecycleError> {
        if let Some(existing) = &self.position {
            return Err(LifecycleError::AlreadyOpen {
                opened_at: existing.entry_timestamp,
            });
        }

        let position = Position {
            direction,
            entry_price: candle.price,
            size: risk.position_size,
            stop_loss: risk.stop_loss,
            take_profit: risk.take_profit,
            entry_timestamp: candle.timestamp,
            entry_balance: risk.risk_amount,
            status: PositionStatus::Open,
            exit: None,
        };

        let trade = Trade {
            direction,
            action: TradeAction::Open,
            price: position.entry_price,
            size: position.size,
            timestamp: position.entry_timestamp,
            balance,
            pnl: 0.0,
            fee: 0.0,
            risk_amount: risk.risk_amount,
            exit_reason: None,
        };

        tracing::debug!(
            %direction,
            price = position.entry_price,
            size = position.size,
            stop_loss = position.stop_loss,
            take_profit = position.take_profit,
            "position opened"
        );
        self.position = Some(position);
        Ok(trade)
    }

    /// Exit condition for the open position at this candle's price.
    pub fn check_exit(&self, candle: &Candle) -> Option<ExitReason> {
        self.position
            .as_ref()
            .and_then(|p| p.exit_trigger(candle.price))
    }

    /// Close the open position at the candle's price.
    ///
    /// New balance = `balance + pnl - fee`, where the fee is charged on both
    /// legs' notional.
    pub fn close(
        &mut self,
        candle: &Candle,
        balance: f64,
        reason: ExitReason,
    ) -> Result<ClosedPosition, LifecycleError> {
        let mut position = self.position.take().ok_or(LifecycleError::NoOpenPosition)?;

        let exit_price = candle.price;
        let pnl = position.gross_pnl(exit_price);
        let fee = position.round_trip_fee(exit_price, self.fee_rate);
        let new_balance = balance + pnl - fee;

        position.status = PositionStatus::Closed;
        position.exit = Some(PositionExit {
            exit_price,
            exit_timestamp: candle.timestamp,
            exit_balance: new_balance,
            realized_pnl: pnl,
            fee,
            reason,
        });

        let trade = Trade {
            direction: position.direction,
            action: TradeAction::Close,
            price: exit_price,
            size: position.size,
            timestamp: candle.timestamp,
            balance: new_balance,
            pnl,
            fee,
            risk_amount: position.entry_balance,
            exit_reason: Some(reason),
        };

        tracing::debug!(
            direction = %position.direction,
            price = exit_price,
            pnl,
            fee,
            balance = new_balance,
            ?reason,
            "position closed"
        );
        Ok(ClosedPosition { position, trade })
    }
}
