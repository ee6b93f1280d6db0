//! Domain types for ReplayLab

pub mod candle;
pub mod position;
pub mod signal;
pub mod trade;

pub use candle::Candle;
pub use position::{ExitReason, Position, PositionExit, PositionStatus};
pub use signal::{Direction, Signal};
pub use trade::{Trade, TradeAction};
