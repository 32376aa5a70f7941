//! # Tessera — In-Memory Columnar Table Engine
//!
//! Tessera keeps tables as shared, immutable Apache Arrow column buffers with
//! lazily composed views on top, and runs relational verbs over them: joins
//! (inner, left, right, outer, cross, asof) and grouping. Verbs never mutate
//! their inputs.
//!
//! ## Quick start
//!
//! ```rust
//! use tessera_core::{Row, Table};
//!
//! # fn main() -> tessera_core::TesseraResult<()> {
//! let left = Table::from_rows(vec![
//!     Row::new().with("id", 1).with("v", "a"),
//!     Row::new().with("id", 2).with("v", "b"),
//! ])?;
//! let right = Table::from_rows(vec![
//!     Row::new().with("id", 2).with("w", "x"),
//!     Row::new().with("id", 3).with("w", "y"),
//! ])?;
//!
//! let joined = left.inner_join(&right, "id")?;
//! assert_eq!(joined.num_rows(), 1);
//! assert_eq!(joined.column_names(), &["id", "v", "w"]);
//! # Ok(())
//! # }
//! ```
//!
//! ### Records
//!
//! ```rust
//! use tessera_core::{Record, Table};
//!
//! #[derive(Record)]
//! struct Order {
//!     id: i64,
//!     #[tessera(rename = "customer")]
//!     customer_name: String,
//!     note: Option<String>,
//! }
//!
//! # fn main() -> tessera_core::TesseraResult<()> {
//! let orders = Table::from_rows(vec![
//!     Order { id: 1, customer_name: "kim".into(), note: None },
//!     Order { id: 2, customer_name: "lee".into(), note: Some("rush".into()) },
//! ])?;
//! let counts = orders.group_by(&["customer"])?.count()?;
//! assert_eq!(counts.num_rows(), 2);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Table = Arc<ColumnarStore> + Option<View>
//!            │                     │
//!            │        materialize_index ─▶ visible physical rows
//!            ▼                     ▼
//!    Engine ─┬─ join  ─▶ index pairs ─▶ gather ─▶ new Table
//!            └─ group ─▶ GroupPartition (no copy)
//! ```
//!
//! ## Modules
//!
//! - [`storage`] — [`ColumnarStore`], [`View`] and [`materialize_index`]
//! - [`table`] — [`Table`] and [`GroupedTable`]
//! - [`engine`] — [`Engine`], the verbs under an [`EngineConfig`]
//! - [`ops`] — join and grouping internals
//! - [`config`] — [`EngineConfig`] from defaults, files and environment
//! - [`logging`] — tracing subscriber setup (`logging` feature)

pub mod config;
pub mod engine;
pub mod error;
pub mod ops;
pub mod storage;
pub mod table;

// Logging utilities
pub mod logging;

// Re-export commonly used types
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{JoinSide, TesseraError, TesseraResult};
pub use ops::group::{GroupPartition, GroupRows, NO_ROW};
pub use ops::join::{
    AsofDirection, AsofOptions, JoinBackend, JoinIndices, JoinKind, JoinOn, JoinOptions,
    JoinStrategy, MatchPicks, NO_MATCH, SortMergeBackend, Suffixes,
};
pub use storage::{
    ColumnarStore, IntoRow, RaggedRows, Row, ScalarValue, View, ViewStep, materialize_index,
};
pub use table::{GroupedTable, Table};

// Re-export derive macros
pub use tessera_derive::Record;
