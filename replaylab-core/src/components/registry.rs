//! Plugin registries: name → strategy / risk rule tables.
//!
//! A registry is built once at startup (defaults plus any extra registrations)
//! and is read-only afterwards. Share it across runs and threads behind an
//! `Arc`; the plugins it hands out are stateless, so concurrent runs never see
//! each other.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::risk::{CandleRangeStop, FixedPercentStop, FixedStopPrice, RiskRule};
use super::strategy::{CandleMomentum, NullStrategy, PriceBand, Strategy};

/// Which kind of plugin a registry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginKind {
    Strategy,
    RiskRule,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strategy => write!(f, "strategy"),
            Self::RiskRule => write!(f, "risk rule"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown {kind} '{name}' (available: {})", .available.join(", "))]
    NotFound {
        kind: PluginKind,
        name: String,
        available: Vec<String>,
    },
}

/// Immutable name → plugin table.
pub struct Registry<T: ?Sized> {
    kind: PluginKind,
    entries: BTreeMap<String, Arc<T>>,
}

pub type StrategyRegistry = Registry<dyn Strategy>;
pub type RiskRegistry = Registry<dyn RiskRule>;

impl<T: ?Sized> Registry<T> {
    fn empty(kind: PluginKind) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    fn insert(mut self, name: String, plugin: Arc<T>) -> Self {
        if self.entries.insert(name.clone(), plugin).is_some() {
            tracing::debug!(kind = %self.kind, %name, "replaced registered plugin");
        }
        self
    }

    /// Look up a plugin by name.
    pub fn resolve(&self, name: &str) -> Result<Arc<T>, RegistryError> {
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                kind: self.kind,
                name: name.to_string(),
                available: self.names(),
            })
    }

    /// Registered names in ascending order.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Registry<dyn Strategy> {
    pub fn new() -> Self {
        Self::empty(PluginKind::Strategy)
    }

    /// Registry holding every built-in strategy.
    pub fn with_defaults() -> Self {
        Self::new()
            .with(CandleMomentum)
            .with(PriceBand)
            .with(NullStrategy)
    }

    /// Add a strategy under its own name, replacing any previous entry.
    pub fn with<S: Strategy + 'static>(self, strategy: S) -> Self {
        let name = strategy.name().to_string();
        self.insert(name, Arc::new(strategy))
    }
}

impl Default for Registry<dyn Strategy> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Registry<dyn RiskRule> {
    pub fn new() -> Self {
        Self::empty(PluginKind::RiskRule)
    }

    /// Registry holding every built-in risk rule.
    pub fn with_defaults() -> Self {
        Self::new()
            .with(FixedPercentStop)
            .with(FixedStopPrice)
            .with(CandleRangeStop)
    }

    /// Add a risk rule under its own name, replacing any previous entry.
    pub fn with<R: RiskRule + 'static>(self, rule: R) -> Self {
        let name = rule.name().to_string();
        self.insert(name, Arc::new(rule))
    }
}

impl Default for Registry<dyn RiskRule> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::params::{Params, PluginError};
    use crate::domain::{Candle, Signal};

    struct AlwaysLong;

    impl Strategy for AlwaysLong {
        fn name(&self) -> &str {
            "always_long"
        }

        fn evaluate(&self, _candle: &Candle, _params: &Params) -> Result<Signal, PluginError> {
            Ok(Signal::Long)
        }
    }

    #[test]
    fn default_strategies_are_listed_in_order() {
        let reg = StrategyRegistry::with_defaults();
        assert_eq!(reg.names(), vec!["candle_momentum", "null", "price_band"]);
    }

    #[test]
    fn default_risk_rules_are_listed_in_order() {
        let reg = RiskRegistry::with_defaults();
        assert_eq!(
            reg.names(),
            vec!["candle_range_stop", "fixed_percent_stop", "fixed_stop_price"]
        );
    }

    #[test]
    fn resolve_returns_registered_plugin() {
        let reg = StrategyRegistry::with_defaults().with(AlwaysLong);
        let s = reg.resolve("always_long").unwrap();
        assert_eq!(s.name(), "always_long");
        assert_eq!(reg.len(), 4);
    }

    #[test]
    fn resolve_unknown_is_not_found() {
        let reg = RiskRegistry::with_defaults();
        let err = reg.resolve("kelly").err().unwrap();
        let RegistryError::NotFound { kind, name, available } = &err;
        assert_eq!(*kind, PluginKind::RiskRule);
        assert_eq!(name, "kelly");
        assert_eq!(available.len(), 3);
        assert!(err.to_string().starts_with("unknown risk rule 'kelly'"));
    }

    #[test]
    fn empty_registry_resolves_nothing() {
        let reg = StrategyRegistry::new();
        assert!(reg.is_empty());
        assert!(reg.resolve("null").is_err());
    }

    #[test]
    fn registries_are_shareable_across_threads() {
        let reg = Arc::new(StrategyRegistry::with_defaults());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || reg.resolve("null").map(|s| s.name().to_string()))
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap().unwrap(), "null");
        }
    }
}
