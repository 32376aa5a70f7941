//! Join strategy selection

use crate::error::{TesseraError, TesseraResult};
use serde::{Deserialize, Serialize};

/// Default `left_rows + right_rows` at which the hash strategy takes over.
pub const DEFAULT_JOIN_HASH_THRESHOLD: usize = 50_000;

/// How equi-join index pairs are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinStrategy {
    /// Project keys to fixed-width or byte-encoded arrays and hand them to the
    /// configured [`JoinBackend`](super::JoinBackend)
    Vectorized,
    /// Build a hash table on one side and probe it with the other
    Hash,
}

impl JoinStrategy {
    /// Parse from string (case-insensitive)
    pub fn parse(s: &str) -> TesseraResult<Self> {
        match s.to_lowercase().as_str() {
            "vectorized" | "vector" => Ok(JoinStrategy::Vectorized),
            "hash" => Ok(JoinStrategy::Hash),
            _ => Err(TesseraError::Config(format!(
                "Invalid join strategy: '{}'. Valid options: vectorized, hash",
                s
            ))),
        }
    }

    /// Get strategy name
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinStrategy::Vectorized => "vectorized",
            JoinStrategy::Hash => "hash",
        }
    }

    /// Choose a strategy from the combined input size.
    ///
    /// A forced strategy always wins. Otherwise inputs below `threshold` rows
    /// run vectorized and larger ones use the hash strategy.
    pub fn choose(total_rows: usize, threshold: usize, forced: Option<JoinStrategy>) -> Self {
        if let Some(strategy) = forced {
            return strategy;
        }
        if total_rows < threshold {
            JoinStrategy::Vectorized
        } else {
            JoinStrategy::Hash
        }
    }
}
