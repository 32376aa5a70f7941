//! Table — a shared store plus an optional view.
//!
//! Every verb returns a new [`Table`]. View producers (`filter`, `slice`,
//! `order_by`) only extend the view chain; the store `Arc` is shared.
//! Column mutation goes through [`ColumnarStore::cow_store`].

use crate::engine::Engine;
use crate::error::{TesseraError, TesseraResult};
use crate::ops::group::GroupPartition;
use crate::ops::join::{AsofOptions, JoinKind, JoinOn, JoinOptions};
use crate::ops::key_encoding::KeyColumn;
use crate::ops::ordering::{SortColumn, sort_positions};
use crate::storage::{
    ColumnarStore, IntoRow, RaggedRows, Row, ScalarValue, View, ViewStep, materialize_index,
};
use arrow::array::{ArrayRef, Int64Array, RecordBatch, UInt64Array};
use arrow::compute;
use std::sync::Arc;

/// Logical table: `store` seen through `view`.
#[derive(Debug, Clone)]
pub struct Table {
    store: Arc<ColumnarStore>,
    view: Option<View>,
    num_rows: usize,
}

impl Table {
    pub fn new(store: ColumnarStore) -> Self {
        Self::from_shared(Arc::new(store))
    }

    pub fn from_shared(store: Arc<ColumnarStore>) -> Self {
        let num_rows = store.len();
        Self {
            store,
            view: None,
            num_rows,
        }
    }

    /// A table over `store` seen through `view`; the view is validated here.
    pub fn with_view(store: Arc<ColumnarStore>, view: View) -> TesseraResult<Self> {
        let num_rows = materialize_index(store.len(), Some(&view))?.len();
        Ok(Self {
            store,
            view: Some(view),
            num_rows,
        })
    }

    /// Build from row literals; missing fields become nulls.
    pub fn from_rows<I, R>(rows: I) -> TesseraResult<Self>
    where
        I: IntoIterator<Item = R>,
        R: IntoRow,
    {
        Self::from_rows_with(rows, RaggedRows::default())
    }

    pub fn from_rows_with<I, R>(rows: I, ragged: RaggedRows) -> TesseraResult<Self>
    where
        I: IntoIterator<Item = R>,
        R: IntoRow,
    {
        Ok(Self::new(ColumnarStore::from_rows(rows, ragged)?))
    }

    pub fn from_columns<S: Into<String>>(columns: Vec<(S, ArrayRef)>) -> TesseraResult<Self> {
        Ok(Self::new(ColumnarStore::from_columns(columns)?))
    }

    pub fn from_record_batch(batch: &RecordBatch) -> TesseraResult<Self> {
        Ok(Self::new(ColumnarStore::from_record_batch(batch)?))
    }

    pub fn store(&self) -> &ColumnarStore {
        &self.store
    }

    pub fn shared_store(&self) -> &Arc<ColumnarStore> {
        &self.store
    }

    pub fn view(&self) -> Option<&View> {
        self.view.as_ref()
    }

    /// Logical row count.
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn is_empty(&self) -> bool {
        self.num_rows == 0
    }

    pub fn column_names(&self) -> &[String] {
        self.store.column_names()
    }

    /// Physical indices of the visible rows, in logical order.
    pub fn indices(&self) -> TesseraResult<Vec<usize>> {
        materialize_index(self.store.len(), self.view.as_ref())
    }

    fn then(&self, step: ViewStep) -> TesseraResult<Self> {
        let view = match &self.view {
            Some(view) => view.then(step),
            None => View::new().then(step),
        };
        Self::with_view(Arc::clone(&self.store), view)
    }

    /// Keep logical rows whose `mask` entry is true.
    pub fn filter(&self, mask: &[bool]) -> TesseraResult<Self> {
        if mask.len() != self.num_rows {
            return Err(TesseraError::LengthMismatch {
                column: "<filter mask>".to_string(),
                expected: self.num_rows,
                actual: mask.len(),
            });
        }
        let mut physical = vec![false; self.store.len()];
        for (&row, &keep) in self.indices()?.iter().zip(mask) {
            physical[row] = keep;
        }
        self.then(ViewStep::Filter(Arc::from(physical)))
    }

    /// Keep rows whose `column` value satisfies `predicate`.
    pub fn filter_by<F>(&self, column: &str, predicate: F) -> TesseraResult<Self>
    where
        F: Fn(&ScalarValue) -> bool,
    {
        let array = self.store.column(column)?;
        let mut physical = vec![false; self.store.len()];
        for row in self.indices()? {
            physical[row] = predicate(&ScalarValue::from_array(array, row)?);
        }
        self.then(ViewStep::Filter(Arc::from(physical)))
    }

    /// Window of at most `len` logical rows starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> TesseraResult<Self> {
        self.then(ViewStep::Slice {
            offset,
            len: Some(len),
        })
    }

    pub fn head(&self, n: usize) -> TesseraResult<Self> {
        self.slice(0, n)
    }

    /// Stable sort by `(column, ascending)` pairs; nulls sort first.
    pub fn order_by(&self, by: &[(&str, bool)]) -> TesseraResult<Self> {
        let columns = by
            .iter()
            .map(|&(name, ascending)| {
                Ok(SortColumn {
                    key: KeyColumn::try_new(name, self.store.column(name)?)?,
                    descending: !ascending,
                })
            })
            .collect::<TesseraResult<Vec<_>>>()?;
        let rows = self.indices()?;
        let permutation = sort_positions(&columns, &rows);
        self.then(ViewStep::Order(Arc::from(permutation)))
    }

    /// Gather visible rows into a compact store with no view.
    pub fn materialize(&self) -> TesseraResult<Self> {
        if self.view.is_none() {
            return Ok(self.clone());
        }
        Ok(Self::new(self.store.gather(&self.indices()?)?))
    }

    /// One column in logical order.
    pub fn column(&self, name: &str) -> TesseraResult<ArrayRef> {
        let array = self.store.column(name)?;
        if self.view.is_none() {
            return Ok(Arc::clone(array));
        }
        let idx = UInt64Array::from_iter_values(self.indices()?.into_iter().map(|r| r as u64));
        Ok(compute::take(array.as_ref(), &idx, None)?)
    }

    pub fn value(&self, column: &str, row: usize) -> TesseraResult<ScalarValue> {
        let physical = self.physical_row(row)?;
        self.store.value(column, physical)
    }

    pub fn row(&self, row: usize) -> TesseraResult<Row> {
        self.store.row(self.physical_row(row)?)
    }

    /// All logical rows.
    pub fn rows(&self) -> TesseraResult<Vec<Row>> {
        self.indices()?
            .into_iter()
            .map(|row| self.store.row(row))
            .collect()
    }

    fn physical_row(&self, row: usize) -> TesseraResult<usize> {
        if self.view.is_none() {
            return Ok(row);
        }
        self.indices()?
            .get(row)
            .copied()
            .ok_or(TesseraError::RowOutOfRange {
                index: row,
                length: self.num_rows,
            })
    }

    /// Add or replace columns (each `num_rows()` long).
    ///
    /// Without a view untouched buffers are shared with `self`; with a view
    /// the visible rows are materialized first.
    pub fn with_columns<S: Into<String>>(&self, columns: Vec<(S, ArrayRef)>) -> TesseraResult<Self> {
        let updates: Vec<(String, ArrayRef)> =
            columns.into_iter().map(|(n, a)| (n.into(), a)).collect();
        let base = self.materialize()?;
        Ok(Self::new(base.store.cow_store::<&str>(updates, &[])?))
    }

    /// Drop columns; the view is kept and no rows are copied.
    pub fn drop_columns(&self, names: &[&str]) -> TesseraResult<Self> {
        let store = Arc::new(self.store.cow_store(Vec::new(), names)?);
        Ok(Self {
            store,
            view: self.view.clone(),
            num_rows: self.num_rows,
        })
    }

    pub fn to_record_batch(&self) -> TesseraResult<RecordBatch> {
        self.materialize()?.store.to_record_batch()
    }

    /// Render visible rows as an ASCII table.
    pub fn pretty(&self) -> TesseraResult<String> {
        self.materialize()?.store.pretty()
    }

    pub fn group_by(&self, columns: &[&str]) -> TesseraResult<GroupedTable> {
        Engine::default().group_by(self, columns)
    }

    pub fn join(&self, right: &Table, kind: JoinKind, options: &JoinOptions) -> TesseraResult<Self> {
        Engine::default().join(self, right, kind, options)
    }

    pub fn inner_join(&self, right: &Table, on: impl Into<JoinOn>) -> TesseraResult<Self> {
        self.join(right, JoinKind::Inner, &JoinOptions::new(on))
    }

    pub fn left_join(&self, right: &Table, on: impl Into<JoinOn>) -> TesseraResult<Self> {
        self.join(right, JoinKind::Left, &JoinOptions::new(on))
    }

    pub fn right_join(&self, right: &Table, on: impl Into<JoinOn>) -> TesseraResult<Self> {
        self.join(right, JoinKind::Right, &JoinOptions::new(on))
    }

    pub fn outer_join(&self, right: &Table, on: impl Into<JoinOn>) -> TesseraResult<Self> {
        self.join(right, JoinKind::Outer, &JoinOptions::new(on))
    }

    pub fn cross_join(&self, right: &Table, max_rows: Option<usize>) -> TesseraResult<Self> {
        Engine::default().cross_join(self, right, max_rows)
    }

    pub fn asof_join(&self, right: &Table, options: &AsofOptions) -> TesseraResult<Self> {
        Engine::default().asof_join(self, right, options)
    }
}

impl From<ColumnarStore> for Table {
    fn from(store: ColumnarStore) -> Self {
        Table::new(store)
    }
}

/// A table together with a partition of its visible rows.
#[derive(Debug, Clone)]
pub struct GroupedTable {
    table: Table,
    partition: GroupPartition,
}

impl GroupedTable {
    pub(crate) fn new(table: Table, partition: GroupPartition) -> Self {
        Self { table, partition }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn partition(&self) -> &GroupPartition {
        &self.partition
    }

    pub fn num_groups(&self) -> usize {
        self.partition.size()
    }

    /// Rows of one group, in visible order.
    pub fn group(&self, group: usize) -> TesseraResult<Table> {
        Ok(Table::new(
            self.partition.materialize_group(self.table.store(), group)?,
        ))
    }

    /// One row per group with its key values.
    pub fn keys(&self) -> TesseraResult<Table> {
        Ok(Table::new(self.partition.keys(self.table.store())?))
    }

    /// Key columns plus an `Int64` `count` column.
    pub fn count(&self) -> TesseraResult<Table> {
        let keys = self.partition.keys(self.table.store())?;
        if keys.has_column("count") {
            return Err(TesseraError::DuplicateColumn("count".to_string()));
        }
        let counts: ArrayRef = Arc::new(Int64Array::from_iter_values(
            self.partition.counts().iter().map(|&c| c as i64),
        ));
        Ok(Table::new(
            keys.cow_store::<&str>(vec![("count".to_string(), counts)], &[])?,
        ))
    }

    /// Groups renumbered in ascending key order.
    pub fn sorted(&self) -> TesseraResult<Self> {
        Ok(Self {
            table: self.table.clone(),
            partition: self.partition.sort_by_keys(self.table.store())?,
        })
    }
}
