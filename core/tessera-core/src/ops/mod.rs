//! Operators over stores and views
//!
//! - [`join`]: equi, asof and cross joins
//! - [`group`]: [`GroupPartition`](group::GroupPartition) grouping
//! - `key_encoding` / `ordering`: key equality and ordering shared by both

pub mod group;
pub mod join;
pub(crate) mod key_encoding;
pub(crate) mod ordering;
