//! Join engine
//!
//! - [`options`]: key lists, suffixes, join kinds and [`JoinIndices`]
//! - [`strategy`]: vectorized vs hash selection
//! - [`backend`]: the [`JoinBackend`] trait and [`SortMergeBackend`]
//! - `hash`, `keys`, `assemble`, `asof`, `cross`: matching and output internals
//!
//! The verbs themselves live on [`Engine`](crate::Engine).

pub(crate) mod assemble;
pub(crate) mod asof;
pub mod backend;
pub(crate) mod cross;
pub(crate) mod hash;
pub(crate) mod keys;
pub mod options;
pub mod strategy;

pub use backend::{JoinBackend, MatchPicks, NO_MATCH, SortMergeBackend};
pub use options::{AsofDirection, AsofOptions, JoinIndices, JoinKind, JoinOn, JoinOptions, Suffixes};
pub use strategy::{DEFAULT_JOIN_HASH_THRESHOLD, JoinStrategy};
