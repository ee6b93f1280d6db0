//! Backtesting engine: position lifecycle, trade ledger and the replay loop.
//!
//! The engine consumes a fully materialized candle sequence plus one strategy
//! and one risk rule, and produces a balanced trade ledger and final balance.
//! It performs no I/O; metrics and persistence live in the runner.

pub mod ledger;
pub mod lifecycle;
pub mod replay;

pub use ledger::TradeLedger;
pub use lifecycle::{ClosedPosition, LifecycleError, PositionLifecycle};
pub use replay::{replay, EngineConfig, EngineError, ReplayOutcome, CANCEL_CHECK_INTERVAL};
