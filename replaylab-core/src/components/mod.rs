//! Plugin contracts: the two pluggable pieces of every run.
//!
//! - Strategy: candle + parameters → long / short / none
//! - Risk rule: signal + balance + parameters → size, stop-loss, take-profit
//!
//! Plus the registries that map plugin names to implementations.

pub mod params;
pub mod registry;
pub mod risk;
pub mod strategy;

pub use params::{Params, PluginConfig, PluginError};
pub use registry::{PluginKind, Registry, RegistryError, RiskRegistry, StrategyRegistry};
pub use risk::{
    compute_risk, CandleRangeStop, FixedPercentStop, FixedStopPrice, RiskError, RiskRequest,
    RiskResult, RiskRule, DEFAULT_RISK_REWARD_RATIO,
};
pub use strategy::{CandleMomentum, NullStrategy, PriceBand, Strategy};
