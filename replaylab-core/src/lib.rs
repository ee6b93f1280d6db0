//! ReplayLab Core: domain types, plugin contracts, position lifecycle, replay loop.
//!
//! This crate contains the heart of the backtesting engine:
//! - Domain types (candles, signals, positions, trades)
//! - Strategy and risk-rule contracts with reference implementations
//! - Immutable plugin registries built once at startup
//! - Single-position lifecycle state machine and append-only trade ledger
//! - Candle-by-candle replay loop with end-of-data liquidation

pub mod components;
pub mod domain;
pub mod engine;
