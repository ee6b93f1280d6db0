//! Serializable run configuration and its validation rules.
//!
//! A config is normally written as TOML without market data and the candles
//! are attached afterwards from a CSV file or the synthetic generator. Inline
//! `[[market_data]]` tables are accepted too.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use replaylab_core::components::PluginConfig;
use replaylab_core::domain::Candle;
use replaylab_core::engine::EngineConfig;

/// Unique identifier for a configuration (content-addressable hash).
pub type ConfigId = String;

/// Everything needed to reproduce a single backtest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BacktestConfig {
    pub initial_balance: f64,

    /// Window the run is meant to cover. The engine does not filter on it.
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,

    /// Percent of the running balance risked per position, in (0, 100].
    pub risk_percent: f64,

    /// Flat fee rate charged per leg on notional. Defaults to zero.
    #[serde(default)]
    pub fee_rate: f64,

    pub strategy: PluginConfig,
    pub risk: PluginConfig,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub market_data: Vec<Candle>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("market data is empty")]
    EmptyMarketData,
    #[error("initial_balance must be positive, got {0}")]
    NonPositiveBalance(f64),
    #[error("risk_percent must lie in (0, 100], got {0}")]
    RiskPercentOutOfRange(f64),
    #[error("start ({start}) must be before end ({end})")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("fee_rate must be finite and non-negative, got {0}")]
    InvalidFeeRate(f64),
    #[error("market_data[{index}] has a non-positive or non-finite price {price}")]
    InvalidCandle { index: usize, price: f64 },
}

impl BacktestConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Replace the market data, keeping everything else.
    pub fn with_market_data(mut self, candles: Vec<Candle>) -> Self {
        self.market_data = candles;
        self
    }

    /// Check every configuration rule. Called by the runner before any
    /// candle is replayed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.market_data.is_empty() {
            return Err(ConfigError::EmptyMarketData);
        }
        if !(self.initial_balance > 0.0 && self.initial_balance.is_finite()) {
            return Err(ConfigError::NonPositiveBalance(self.initial_balance));
        }
        if !(self.risk_percent > 0.0 && self.risk_percent <= 100.0) {
            return Err(ConfigError::RiskPercentOutOfRange(self.risk_percent));
        }
        if self.start >= self.end {
            return Err(ConfigError::InvalidWindow {
                start: self.start,
                end: self.end,
            });
        }
        if !(self.fee_rate >= 0.0 && self.fee_rate.is_finite()) {
            return Err(ConfigError::InvalidFeeRate(self.fee_rate));
        }
        if let Some((index, candle)) = self
            .market_data
            .iter()
            .enumerate()
            .find(|(_, c)| !(c.price > 0.0 && c.price.is_finite()))
        {
            return Err(ConfigError::InvalidCandle {
                index,
                price: candle.price,
            });
        }
        Ok(())
    }

    /// Number of candles whose timestamp falls outside `[start, end]`.
    pub fn out_of_window_count(&self) -> usize {
        self.market_data
            .iter()
            .filter(|c| c.timestamp < self.start || c.timestamp > self.end)
            .count()
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            initial_balance: self.initial_balance,
            risk_percent: self.risk_percent,
            fee_rate: self.fee_rate,
            strategy_params: self.strategy.params.clone(),
            risk_params: self.risk.params.clone(),
        }
    }

    /// Deterministic hash of the configuration, market data included.
    pub fn config_id(&self) -> Result<ConfigId, serde_json::Error> {
        let json = serde_json::to_string(self)?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}
