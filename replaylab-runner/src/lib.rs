//! ReplayLab Runner: run orchestration, metrics, persistence, data loading.
//!
//! This crate builds on `replaylab-core` to provide:
//! - Serializable run configuration with validation
//! - The run entry point (single, cancellable, and batch runs)
//! - Performance metrics over the trade ledger
//! - Result stores (in-memory and JSON-lines)
//! - CSV and synthetic market data
//! - JSON/CSV artifact export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod store;

pub use config::{BacktestConfig, ConfigError, ConfigId};
pub use data_loader::{
    generate_synthetic_candles, load_candles_csv, read_candles_csv, LoadError, Window,
};
pub use export::{export_json, export_trades_csv, import_json, save_artifacts};
pub use metrics::PerformanceMetrics;
pub use runner::{BacktestResult, RunError, Runner, SCHEMA_VERSION};
pub use store::{
    result_id, InMemoryResultStore, JsonlResultStore, ResultId, ResultStore, StoreError,
    StoredResult,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn results_are_send_sync() {
        assert_send::<BacktestResult>();
        assert_sync::<BacktestResult>();
        assert_send::<PerformanceMetrics>();
        assert_sync::<PerformanceMetrics>();
    }

    #[test]
    fn config_is_send_sync() {
        assert_send::<BacktestConfig>();
        assert_sync::<BacktestConfig>();
    }

    #[test]
    fn runner_is_send_sync() {
        assert_send::<Runner>();
        assert_sync::<Runner>();
    }

    #[test]
    fn stores_are_send_sync() {
        assert_send::<InMemoryResultStore>();
        assert_sync::<InMemoryResultStore>();
        assert_send::<JsonlResultStore>();
        assert_sync::<JsonlResultStore>();
    }

    #[test]
    fn errors_are_send_sync() {
        assert_send::<RunError>();
        assert_sync::<RunError>();
        assert_send::<StoreError>();
        assert_send::<LoadError>();
    }
}
