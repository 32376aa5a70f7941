//! Storage module — column buffers and the views layered over them.
//!
//! - [`columnar`]: [`ColumnarStore`], the immutable physical table.
//! - [`view`]: [`View`] overlays and [`materialize_index`].

pub mod columnar;
pub mod view;

pub use columnar::{ColumnarStore, IntoRow, RaggedRows, Row, ScalarValue};
pub use view::{View, ViewStep, materialize_index};
