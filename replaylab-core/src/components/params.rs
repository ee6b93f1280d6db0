//! Plugin parameters and the error type plugins raise while evaluating.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Named numeric parameters for a strategy or risk rule.
///
/// `BTreeMap` keeps key order deterministic for serialization and hashing.
pub type Params = BTreeMap<String, f64>;

/// A named plugin together with its parameters, as it appears in a run config.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginConfig {
    pub name: String,
    #[serde(default)]
    pub params: Params,
}

impl PluginConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Params::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: f64) -> Self {
        self.params.insert(key.into(), value);
        self
    }
}

/// Failure raised by a strategy or risk rule while evaluating a candle.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PluginError {
    #[error("{plugin}: missing required parameter '{param}'")]
    MissingParam { plugin: String, param: String },
    #[error("{plugin}: invalid parameter '{param}' = {value}: {reason}")]
    InvalidParam {
        plugin: String,
        param: String,
        value: f64,
        reason: String,
    },
    #[error("{plugin}: {message}")]
    Failed { plugin: String, message: String },
}

/// Extract a named parameter, falling back to `default`.
pub fn param(params: &Params, name: &str, default: f64) -> f64 {
    params.get(name).copied().unwrap_or(default)
}

/// Extract a named parameter that has no default.
pub fn require_param(plugin: &str, params: &Params, name: &str) -> Result<f64, PluginError> {
    params
        .get(name)
        .copied()
        .ok_or_else(|| PluginError::MissingParam {
            plugin: plugin.to_string(),
            param: name.to_string(),
        })
}

/// Extract a parameter that must be finite and strictly positive.
pub fn positive_param(
    plugin: &str,
    params: &Params,
    name: &str,
    default: f64,
) -> Result<f64, PluginError> {
    let value = param(params, name, default);
    if !value.is_finite() || value <= 0.0 {
        return Err(invalid(plugin, name, value, "must be a positive number"));
    }
    Ok(value)
}

pub(crate) fn invalid(plugin: &str, name: &str, value: f64, reason: &str) -> PluginError {
    PluginError::InvalidParam {
        plugin: plugin.to_string(),
        param: name.to_string(),
        value,
        reason: reason.to_string(),
    }
}
