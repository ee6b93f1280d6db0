//! Backtest runner: wires together config, registries, engine, and metrics.
//!
//! Entry points:
//! - `Runner::run()`: validate, resolve plugins, replay, compute metrics.
//! - `Runner::run_with_cancel()`: same, with a cooperative cancellation flag.
//! - `Runner::run_batch()`: many independent configs on the rayon pool.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use replaylab_core::components::{
    PluginConfig, PluginError, RegistryError, RiskError, RiskRegistry, StrategyRegistry,
};
use replaylab_core::domain::Trade;
use replaylab_core::engine::{replay, EngineError};

use crate::config::{BacktestConfig, ConfigError};
use crate::metrics::PerformanceMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    UnknownPlugin(#[from] RegistryError),
    #[error("invalid parameters for '{plugin}': {source}")]
    InvalidPluginParams { plugin: String, source: PluginError },
    #[error("risk computation failed in '{rule}' at candle {index}: {source}")]
    RiskComputation {
        rule: String,
        index: usize,
        source: RiskError,
    },
    #[error("plugin '{plugin}' failed at candle {index}: {source}")]
    PluginExecution {
        plugin: String,
        index: usize,
        source: PluginError,
    },
    #[error("engine invariant violated: {0}")]
    Engine(String),
    #[error("run cancelled after {processed} of {total} candles")]
    Cancelled { processed: usize, total: usize },
}

impl From<EngineError> for RunError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::EmptyMarketData => RunError::Config(ConfigError::EmptyMarketData),
            EngineError::Strategy {
                strategy,
                index,
                source,
            } => RunError::PluginExecution {
                plugin: strategy,
                index,
                source,
            },
            EngineError::Risk {
                rule,
                index,
                source: RiskError::Plugin(source),
            } => RunError::PluginExecution {
                plugin: rule,
                index,
                source,
            },
            EngineError::Risk {
                rule,
                index,
                source,
            } => RunError::RiskComputation {
                rule,
                index,
                source,
            },
            EngineError::Lifecycle(e) => RunError::Engine(e.to_string()),
            EngineError::Cancelled { processed, total } => {
                RunError::Cancelled { processed, total }
            }
        }
    }
}

/// Current schema version for persisted results.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub strategy: PluginConfig,
    pub risk: PluginConfig,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<Trade>,
    pub candle_count: usize,
    pub signal_count: usize,
    pub forced_liquidation: bool,
    pub run_timestamp: DateTime<Utc>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    pub fn total_trades(&self) -> usize {
        self.metrics.total_trades
    }

    pub fn winning_trades(&self) -> usize {
        self.metrics.winning_trades
    }

    pub fn win_rate_pct(&self) -> f64 {
        self.metrics.win_rate_pct
    }

    pub fn total_return_pct(&self) -> f64 {
        self.metrics.total_return_pct
    }

    pub fn max_drawdown_pct(&self) -> f64 {
        self.metrics.max_drawdown_pct
    }

    /// Same run, ignoring when it happened.
    pub fn same_outcome(&self, other: &BacktestResult) -> bool {
        BacktestResult {
            run_timestamp: other.run_timestamp,
            ..self.clone()
        } == *other
    }
}

/// Runs backtests against a fixed pair of plugin registries.
///
/// The registries are read-only and shared, so a runner is cheap to clone
/// and safe to use from many threads at once.
#[derive(Clone)]
pub struct Runner {
    strategies: Arc<StrategyRegistry>,
    risks: Arc<RiskRegistry>,
}

impl Default for Runner {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Runner {
    pub fn new(strategies: Arc<StrategyRegistry>, risks: Arc<RiskRegistry>) -> Self {
        Self { strategies, risks }
    }

    /// Runner over the built-in strategies and risk rules.
    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(StrategyRegistry::with_defaults()),
            Arc::new(RiskRegistry::with_defaults()),
        )
    }

    pub fn strategies(&self) -> &StrategyRegistry {
        &self.strategies
    }

    pub fn risks(&self) -> &RiskRegistry {
        &self.risks
    }

    pub fn run(&self, config: &BacktestConfig) -> Result<BacktestResult, RunError> {
        self.run_with_cancel(config, None)
    }

    /// Run a single backtest.
    ///
    /// Configuration, plugin names and plugin parameters are all checked
    /// before the first candle is replayed. Any failure discards the run.
    pub fn run_with_cancel(
        &self,
        config: &BacktestConfig,
        cancel: Option<&AtomicBool>,
    ) -> Result<BacktestResult, RunError> {
        config.validate()?;

        let strategy = self.strategies.resolve(&config.strategy.name)?;
        let risk = self.risks.resolve(&config.risk.name)?;
        strategy
            .validate(&config.strategy.params)
            .map_err(|source| RunError::InvalidPluginParams {
                plugin: config.strategy.name.clone(),
                source,
            })?;
        risk.validate(&config.risk.params)
            .map_err(|source| RunError::InvalidPluginParams {
                plugin: config.risk.name.clone(),
                source,
            })?;

        let outside = config.out_of_window_count();
        if outside > 0 {
            tracing::warn!(
                count = outside,
                start = %config.start,
                end = %config.end,
                "market data contains candles outside the configured window"
            );
        }

        tracing::info!(
            strategy = %config.strategy.name,
            risk = %config.risk.name,
            candles = config.market_data.len(),
            initial_balance = config.initial_balance,
            "starting backtest"
        );

        let engine_config = config.engine_config();
        let outcome = replay(
            &config.market_data,
            strategy.as_ref(),
            risk.as_ref(),
            &engine_config,
            cancel,
        )?;

        let metrics = PerformanceMetrics::compute(
            &outcome.trades,
            config.initial_balance,
            outcome.final_balance,
        );

        tracing::info!(
            trades = metrics.total_trades,
            win_rate_pct = metrics.win_rate_pct,
            total_return_pct = metrics.total_return_pct,
            max_drawdown_pct = metrics.max_drawdown_pct,
            final_balance = outcome.final_balance,
            "backtest finished"
        );

        Ok(BacktestResult {
            schema_version: SCHEMA_VERSION,
            strategy: config.strategy.clone(),
            risk: config.risk.clone(),
            start: config.start,
            end: config.end,
            initial_balance: config.initial_balance,
            final_balance: outcome.final_balance,
            metrics,
            trades: outcome.trades,
            candle_count: outcome.candle_count,
            signal_count: outcome.signal_count,
            forced_liquidation: outcome.forced_liquidation,
            run_timestamp: Utc::now(),
        })
    }

    /// Run many configs concurrently. Results come back in input order and
    /// one failing config does not affect the others.
    pub fn run_batch(
        &self,
        configs: &[BacktestConfig],
        cancel: Option<&AtomicBool>,
    ) -> Vec<Result<BacktestResult, RunError>> {
        tracing::info!(runs = configs.len(), "starting batch");
        configs
            .par_iter()
            .map(|config| self.run_with_cancel(config, cancel))
            .collect()
    }
}
