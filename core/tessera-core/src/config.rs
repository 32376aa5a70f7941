//! Engine configuration
//!
//! Sources, later wins: `Default`, a JSON file ([`EngineConfig::from_file`]),
//! then environment variables ([`EngineConfig::apply_env`]):
//!
//! - `TESSERA_JOIN_HASH_THRESHOLD`: row count at which joins switch to hash
//! - `TESSERA_JOIN_STRATEGY`: `vectorized` or `hash` to force a strategy
//! - `TESSERA_RAGGED_ROWS`: `pad_with_null` or `reject`
//! - `TESSERA_CROSS_JOIN_MAX_ROWS`: cross-join row guard, or `none` to lift it

use crate::error::{TesseraError, TesseraResult};
use crate::ops::join::{DEFAULT_JOIN_HASH_THRESHOLD, JoinStrategy, Suffixes};
use crate::storage::RaggedRows;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

pub const ENV_JOIN_HASH_THRESHOLD: &str = "TESSERA_JOIN_HASH_THRESHOLD";
pub const ENV_JOIN_STRATEGY: &str = "TESSERA_JOIN_STRATEGY";
pub const ENV_RAGGED_ROWS: &str = "TESSERA_RAGGED_ROWS";
pub const ENV_CROSS_JOIN_MAX_ROWS: &str = "TESSERA_CROSS_JOIN_MAX_ROWS";

/// Cross-join output rows allowed when the caller passes no guard.
pub const DEFAULT_CROSS_JOIN_MAX_ROWS: usize = 10_000_000;

/// Tunables shared by every verb an [`Engine`](crate::Engine) runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// `left_rows + right_rows` at or above which joins use the hash strategy
    pub join_hash_threshold: usize,
    /// Overrides threshold-based strategy selection
    pub force_join_strategy: Option<JoinStrategy>,
    /// Policy for row literals missing a field
    pub ragged_rows: RaggedRows,
    /// Suffixes used when join options leave them unset
    pub default_suffixes: Suffixes,
    /// Guard for cross joins called without one; `None` leaves them unbounded
    pub cross_join_max_rows: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            join_hash_threshold: DEFAULT_JOIN_HASH_THRESHOLD,
            force_join_strategy: None,
            ragged_rows: RaggedRows::default(),
            default_suffixes: Suffixes::default(),
            cross_join_max_rows: Some(DEFAULT_CROSS_JOIN_MAX_ROWS),
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> TesseraResult<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> TesseraResult<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Save as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> TesseraResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, json)?;
        Ok(())
    }

    /// Overlay `TESSERA_*` environment variables.
    pub fn apply_env(&mut self) -> TesseraResult<()> {
        self.apply_env_from(|name| env::var(name).ok())
    }

    /// Overlay values from `lookup`, which maps a variable name to its value.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> TesseraResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_JOIN_HASH_THRESHOLD) {
            self.join_hash_threshold = value.trim().parse().map_err(|_| {
                TesseraError::Config(format!(
                    "{ENV_JOIN_HASH_THRESHOLD} must be a non-negative integer, got '{value}'"
                ))
            })?;
        }
        if let Some(value) = lookup(ENV_JOIN_STRATEGY) {
            self.force_join_strategy = match value.trim().to_lowercase().as_str() {
                "" | "auto" => None,
                other => Some(JoinStrategy::parse(other)?),
            };
        }
        if let Some(value) = lookup(ENV_RAGGED_ROWS) {
            self.ragged_rows = RaggedRows::parse(value.trim())?;
        }
        if let Some(value) = lookup(ENV_CROSS_JOIN_MAX_ROWS) {
            self.cross_join_max_rows = match value.trim().to_lowercase().as_str() {
                "none" | "unlimited" => None,
                other => Some(other.parse().map_err(|_| {
                    TesseraError::Config(format!(
                        "{ENV_CROSS_JOIN_MAX_ROWS} must be a row count or 'none', got '{value}'"
                    ))
                })?),
            };
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.join_hash_threshold, 50_000);
        assert_eq!(config.force_join_strategy, None);
        assert_eq!(config.ragged_rows, RaggedRows::PadWithNull);
        assert_eq!(config.default_suffixes, Suffixes::default());
        assert_eq!(config.cross_join_max_rows, Some(DEFAULT_CROSS_JOIN_MAX_ROWS));
    }

    #[test]
    fn test_env_cross_join_guard() {
        let mut config = EngineConfig::default();
        config
            .apply_env_from(env(&[(ENV_CROSS_JOIN_MAX_ROWS, "500")]))
            .unwrap();
        assert_eq!(config.cross_join_max_rows, Some(500));
        config
            .apply_env_from(env(&[(ENV_CROSS_JOIN_MAX_ROWS, "None")]))
            .unwrap();
        assert_eq!(config.cross_join_max_rows, None);
        let err = config
            .apply_env_from(env(&[(ENV_CROSS_JOIN_MAX_ROWS, "lots")]))
            .unwrap_err();
        assert!(matches!(err, TesseraError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let mut config = EngineConfig::default();
        config
            .apply_env_from(env(&[
                (ENV_JOIN_HASH_THRESHOLD, "10"),
                (ENV_JOIN_STRATEGY, "hash"),
                (ENV_RAGGED_ROWS, "reject"),
            ]))
            .unwrap();
        assert_eq!(config.join_hash_threshold, 10);
        assert_eq!(config.force_join_strategy, Some(JoinStrategy::Hash));
        assert_eq!(config.ragged_rows, RaggedRows::Reject);
    }

    #[test]
    fn test_env_auto_clears_forced_strategy() {
        let mut config = EngineConfig {
            force_join_strategy: Some(JoinStrategy::Hash),
            ..Default::default()
        };
        config
            .apply_env_from(env(&[(ENV_JOIN_STRATEGY, "auto")]))
            .unwrap();
        assert_eq!(config.force_join_strategy, None);
    }

    #[test]
    fn test_invalid_env_values() {
        let mut config = EngineConfig::default();
        let err = config
            .apply_env_from(env(&[(ENV_JOIN_HASH_THRESHOLD, "lots")]))
            .unwrap_err();
        assert!(matches!(err, TesseraError::Config(_)));

        let err = config
            .apply_env_from(env(&[(ENV_RAGGED_ROWS, "truncate")]))
            .unwrap_err();
        assert!(matches!(err, TesseraError::Config(_)));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{"join_hash_threshold": 7}"#).unwrap();
        assert_eq!(config.join_hash_threshold, 7);
        assert_eq!(config.default_suffixes, Suffixes::default());
    }
}
