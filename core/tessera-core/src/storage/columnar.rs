//! Columnar Store — shared, immutable Arrow column buffers.
//!
//! A [`ColumnarStore`] maps column names to Arrow arrays (`ArrayRef`), keeps a
//! display order and a row count. Buffers are never written after a store is
//! published; every verb builds fresh arrays and a new store, and columns a verb
//! does not touch are shared by reference count ([`ColumnarStore::cow_store`]).

use crate::error::{TesseraError, TesseraResult};
use ahash::{AHashMap, AHashSet};
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanBuilder, Float64Builder, Int32Builder, Int64Builder,
    NullArray, RecordBatch, StringBuilder, TimestampMillisecondBuilder, UInt64Array,
};
use arrow::compute;
use arrow::datatypes::{
    DataType, Field, Float32Type, Float64Type, Int8Type, Int16Type, Int32Type, Int64Type, Schema,
    TimeUnit, TimestampMillisecondType, UInt8Type, UInt16Type, UInt32Type, UInt64Type,
};
use arrow::record_batch::RecordBatchOptions;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Represents a scalar value that can be stored in a column.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Utf8(String),
    Boolean(bool),
    /// Milliseconds since the Unix epoch
    TimestampMillis(i64),
}

impl ScalarValue {
    /// Get the Arrow DataType for this value.
    pub fn data_type(&self) -> DataType {
        match self {
            ScalarValue::Null => DataType::Null,
            ScalarValue::Int32(_) => DataType::Int32,
            ScalarValue::Int64(_) => DataType::Int64,
            ScalarValue::Float64(_) => DataType::Float64,
            ScalarValue::Utf8(_) => DataType::Utf8,
            ScalarValue::Boolean(_) => DataType::Boolean,
            ScalarValue::TimestampMillis(_) => DataType::Timestamp(TimeUnit::Millisecond, None),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    pub fn timestamp_millis(ms: i64) -> Self {
        ScalarValue::TimestampMillis(ms)
    }

    /// Extract a value from an Arrow array at the given index.
    pub fn from_array(array: &ArrayRef, idx: usize) -> TesseraResult<Self> {
        if idx >= array.len() {
            return Err(TesseraError::RowOutOfRange {
                index: idx,
                length: array.len(),
            });
        }
        if array.is_null(idx) {
            return Ok(ScalarValue::Null);
        }
        let value = match array.data_type() {
            DataType::Int8 => ScalarValue::Int32(array.as_primitive::<Int8Type>().value(idx) as i32),
            DataType::Int16 => {
                ScalarValue::Int32(array.as_primitive::<Int16Type>().value(idx) as i32)
            }
            DataType::Int32 => ScalarValue::Int32(array.as_primitive::<Int32Type>().value(idx)),
            DataType::Int64 => ScalarValue::Int64(array.as_primitive::<Int64Type>().value(idx)),
            DataType::UInt8 => {
                ScalarValue::Int32(array.as_primitive::<UInt8Type>().value(idx) as i32)
            }
            DataType::UInt16 => {
                ScalarValue::Int32(array.as_primitive::<UInt16Type>().value(idx) as i32)
            }
            DataType::UInt32 => {
                ScalarValue::Int64(array.as_primitive::<UInt32Type>().value(idx) as i64)
            }
            DataType::UInt64 => {
                let v = array.as_primitive::<UInt64Type>().value(idx);
                let v = i64::try_from(v).map_err(|_| TesseraError::TypeMismatch {
                    expected: "UInt64 value within Int64 range".to_string(),
                    actual: v.to_string(),
                })?;
                ScalarValue::Int64(v)
            }
            DataType::Float32 => {
                ScalarValue::Float64(array.as_primitive::<Float32Type>().value(idx) as f64)
            }
            DataType::Float64 => {
                ScalarValue::Float64(array.as_primitive::<Float64Type>().value(idx))
            }
            DataType::Boolean => ScalarValue::Boolean(array.as_boolean().value(idx)),
            DataType::Utf8 => ScalarValue::Utf8(array.as_string::<i32>().value(idx).to_string()),
            DataType::LargeUtf8 => {
                ScalarValue::Utf8(array.as_string::<i64>().value(idx).to_string())
            }
            DataType::Timestamp(TimeUnit::Millisecond, _) => ScalarValue::TimestampMillis(
                array.as_primitive::<TimestampMillisecondType>().value(idx),
            ),
            dt => {
                return Err(TesseraError::TypeMismatch {
                    expected: "Int|UInt|Float|Boolean|Utf8|Timestamp(ms)".to_string(),
                    actual: format!("{dt:?}"),
                });
            }
        };
        Ok(value)
    }
}

impl From<i8> for ScalarValue {
    fn from(v: i8) -> Self {
        ScalarValue::Int32(v as i32)
    }
}

impl From<i16> for ScalarValue {
    fn from(v: i16) -> Self {
        ScalarValue::Int32(v as i32)
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        ScalarValue::Int32(v)
    }
}

impl From<u8> for ScalarValue {
    fn from(v: u8) -> Self {
        ScalarValue::Int32(v as i32)
    }
}

impl From<u16> for ScalarValue {
    fn from(v: u16) -> Self {
        ScalarValue::Int32(v as i32)
    }
}

impl From<u32> for ScalarValue {
    fn from(v: u32) -> Self {
        ScalarValue::Int64(v as i64)
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        ScalarValue::Int64(v)
    }
}

impl From<f32> for ScalarValue {
    fn from(v: f32) -> Self {
        ScalarValue::Float64(v as f64)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        ScalarValue::Float64(v)
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        ScalarValue::Boolean(v)
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        ScalarValue::Utf8(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        ScalarValue::Utf8(v.to_string())
    }
}

impl<T: Into<ScalarValue>> From<Option<T>> for ScalarValue {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => ScalarValue::Null,
        }
    }
}

/// A named-field record used to build stores from literal rows.
///
/// Field order is kept; pushing a field name twice replaces the earlier value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    fields: Vec<(String, ScalarValue)>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    /// Builder-style [`Row::push`].
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<ScalarValue>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ScalarValue> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn fields(&self) -> &[(String, ScalarValue)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<K: Into<String>, V: Into<ScalarValue>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (k, v) in iter {
            row.push(k, v);
        }
        row
    }
}

/// Conversion into a [`Row`]; implemented by `Row` and by `#[derive(Record)]`.
pub trait IntoRow {
    fn into_row(self) -> Row;
}

impl IntoRow for Row {
    fn into_row(self) -> Row {
        self
    }
}

/// What to do when a row literal lacks a field that other rows have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaggedRows {
    /// Missing fields become nulls
    #[default]
    PadWithNull,
    /// Missing fields are a [`TesseraError::RaggedRow`]
    Reject,
}

impl RaggedRows {
    /// Parse from string (case-insensitive)
    pub fn parse(s: &str) -> TesseraResult<Self> {
        match s.to_lowercase().as_str() {
            "pad" | "pad_with_null" => Ok(RaggedRows::PadWithNull),
            "reject" => Ok(RaggedRows::Reject),
            _ => Err(TesseraError::Config(format!(
                "Invalid ragged row policy: '{s}'. Valid options: pad_with_null, reject"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RaggedRows::PadWithNull => "pad_with_null",
            RaggedRows::Reject => "reject",
        }
    }
}

static NULL: ScalarValue = ScalarValue::Null;

/// In-memory columnar store backed by shared Arrow arrays.
#[derive(Debug, Clone, Default)]
pub struct ColumnarStore {
    columns: AHashMap<String, ArrayRef>,
    column_names: Vec<String>,
    length: usize,
}

impl ColumnarStore {
    /// A store with no columns and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a store from named columns; the row count is taken from the first column.
    pub fn from_columns<S: Into<String>>(columns: Vec<(S, ArrayRef)>) -> TesseraResult<Self> {
        let length = columns.first().map(|(_, a)| a.len()).unwrap_or(0);
        Self::from_columns_with_length(columns, length)
    }

    /// Build a store with an explicit row count (needed for zero-column stores).
    pub fn from_columns_with_length<S: Into<String>>(
        columns: Vec<(S, ArrayRef)>,
        length: usize,
    ) -> TesseraResult<Self> {
        let mut map = AHashMap::with_capacity(columns.len());
        let mut names = Vec::with_capacity(columns.len());
        for (name, array) in columns {
            let name = name.into();
            if array.len() != length {
                return Err(TesseraError::LengthMismatch {
                    column: name,
                    expected: length,
                    actual: array.len(),
                });
            }
            if map.contains_key(&name) {
                return Err(TesseraError::DuplicateColumn(name));
            }
            map.insert(name.clone(), array);
            names.push(name);
        }
        Ok(Self {
            columns: map,
            column_names: names,
            length,
        })
    }

    /// Build a store from row literals.
    ///
    /// The column set is the union of observed fields in first-seen order.
    /// Column types come from the first non-null value: `Int32` and `Int64`
    /// widen to `Int64`, integers mixed with floats widen to `Float64`, any
    /// other mix is a [`TesseraError::TypeMismatch`]. Text is never coerced to
    /// numbers.
    pub fn from_rows<I, R>(rows: I, ragged: RaggedRows) -> TesseraResult<Self>
    where
        I: IntoIterator<Item = R>,
        R: IntoRow,
    {
        let rows: Vec<Row> = rows.into_iter().map(IntoRow::into_row).collect();

        let mut names: Vec<String> = Vec::new();
        let mut seen: AHashSet<&str> = AHashSet::new();
        for row in &rows {
            for (name, _) in row.fields() {
                if seen.insert(name.as_str()) {
                    names.push(name.clone());
                }
            }
        }

        let mut columns = Vec::with_capacity(names.len());
        for name in &names {
            let mut values: Vec<&ScalarValue> = Vec::with_capacity(rows.len());
            for (row_idx, row) in rows.iter().enumerate() {
                match row.get(name) {
                    Some(v) => values.push(v),
                    None if ragged == RaggedRows::Reject => {
                        return Err(TesseraError::RaggedRow {
                            row: row_idx,
                            column: name.clone(),
                        });
                    }
                    None => values.push(&NULL),
                }
            }
            let data_type = infer_column_type(name, &values)?;
            columns.push((name.clone(), build_column(name, &data_type, &values)?));
        }

        debug!(
            target: "tessera::store",
            rows = rows.len(),
            columns = names.len(),
            "store built from rows"
        );
        Self::from_columns_with_length(columns, rows.len())
    }

    /// Wrap an Arrow RecordBatch; the batch's arrays are shared, not copied.
    pub fn from_record_batch(batch: &RecordBatch) -> TesseraResult<Self> {
        let columns: Vec<(String, ArrayRef)> = batch
            .schema()
            .fields()
            .iter()
            .zip(batch.columns())
            .map(|(field, array)| (field.name().clone(), Arc::clone(array)))
            .collect();
        Self::from_columns_with_length(columns, batch.num_rows())
    }

    /// Convert into an Arrow RecordBatch (columns in display order).
    pub fn to_record_batch(&self) -> TesseraResult<RecordBatch> {
        let mut fields = Vec::with_capacity(self.column_names.len());
        let mut arrays = Vec::with_capacity(self.column_names.len());
        for (name, array) in self.iter() {
            fields.push(Field::new(name, array.data_type().clone(), true));
            arrays.push(Arc::clone(array));
        }
        let options = RecordBatchOptions::new().with_row_count(Some(self.length));
        Ok(RecordBatch::try_new_with_options(
            Arc::new(Schema::new(fields)),
            arrays,
            &options,
        )?)
    }

    /// Render as an ASCII table.
    pub fn pretty(&self) -> TesseraResult<String> {
        let batch = self.to_record_batch()?;
        Ok(arrow::util::pretty::pretty_format_batches(&[batch])?.to_string())
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn num_columns(&self) -> usize {
        self.column_names.len()
    }

    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column(&self, name: &str) -> TesseraResult<&ArrayRef> {
        self.columns
            .get(name)
            .ok_or_else(|| TesseraError::ColumnNotFound(name.to_string()))
    }

    /// Columns in display order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArrayRef)> + '_ {
        self.column_names
            .iter()
            .filter_map(|name| self.columns.get(name).map(|a| (name.as_str(), a)))
    }

    pub fn value(&self, column: &str, row: usize) -> TesseraResult<ScalarValue> {
        ScalarValue::from_array(self.column(column)?, row)
    }

    /// Read one physical row as a [`Row`].
    pub fn row(&self, row: usize) -> TesseraResult<Row> {
        if row >= self.length {
            return Err(TesseraError::RowOutOfRange {
                index: row,
                length: self.length,
            });
        }
        let mut out = Row::with_capacity(self.column_names.len());
        for (name, array) in self.iter() {
            out.push(name, ScalarValue::from_array(array, row)?);
        }
        Ok(out)
    }

    /// Select rows by physical index into a new store.
    pub fn gather(&self, indices: &[usize]) -> TesseraResult<Self> {
        self.check_bounds(indices.iter().copied())?;
        let idx = UInt64Array::from_iter_values(indices.iter().map(|&i| i as u64));
        self.take_all(&idx, indices.len())
    }

    /// Like [`ColumnarStore::gather`], but `None` yields a null in every column.
    pub fn gather_optional(&self, indices: &[Option<usize>]) -> TesseraResult<Self> {
        self.check_bounds(indices.iter().flatten().copied())?;
        let idx: UInt64Array = indices.iter().map(|i| i.map(|i| i as u64)).collect();
        self.take_all(&idx, indices.len())
    }

    /// Keep only `names`, in the given order; buffers are shared.
    pub fn select(&self, names: &[&str]) -> TesseraResult<Self> {
        let columns = names
            .iter()
            .map(|&name| Ok((name.to_string(), Arc::clone(self.column(name)?))))
            .collect::<TesseraResult<Vec<_>>>()?;
        Self::from_columns_with_length(columns, self.length)
    }

    /// Copy-on-write derivation.
    ///
    /// The result holds `(column_names \ drops) ∪ keys(updates)`. Replaced
    /// columns keep their position, new columns are appended in update order,
    /// and every other column is the same `Arc` as in `self`.
    pub fn cow_store<S: AsRef<str>>(
        &self,
        updates: Vec<(String, ArrayRef)>,
        drops: &[S],
    ) -> TesseraResult<Self> {
        let mut updated: AHashMap<String, ArrayRef> = AHashMap::with_capacity(updates.len());
        let mut added: Vec<String> = Vec::new();
        for (name, array) in updates {
            if array.len() != self.length {
                return Err(TesseraError::LengthMismatch {
                    column: name,
                    expected: self.length,
                    actual: array.len(),
                });
            }
            if updated.contains_key(&name) {
                return Err(TesseraError::DuplicateColumn(name));
            }
            if !self.columns.contains_key(&name) {
                added.push(name.clone());
            }
            updated.insert(name, array);
        }

        let mut dropped: AHashSet<&str> = AHashSet::with_capacity(drops.len());
        for name in drops {
            let name = name.as_ref();
            if !self.columns.contains_key(name) {
                return Err(TesseraError::ColumnNotFound(name.to_string()));
            }
            dropped.insert(name);
        }

        let mut columns = AHashMap::with_capacity(self.columns.len() + added.len());
        let mut names = Vec::with_capacity(self.column_names.len() + added.len());
        for name in self.column_names.iter().chain(added.iter()) {
            let array = match updated.get(name) {
                Some(array) => Arc::clone(array),
                None if dropped.contains(name.as_str()) => continue,
                None => Arc::clone(self.column(name)?),
            };
            columns.insert(name.clone(), array);
            names.push(name.clone());
        }

        debug!(
            target: "tessera::store",
            replaced = updated.len() - added.len(),
            added = added.len(),
            dropped = dropped.len(),
            "copy-on-write store derived"
        );
        Ok(Self {
            columns,
            column_names: names,
            length: self.length,
        })
    }

    fn check_bounds(&self, indices: impl Iterator<Item = usize>) -> TesseraResult<()> {
        for index in indices {
            if index >= self.length {
                return Err(TesseraError::RowOutOfRange {
                    index,
                    length: self.length,
                });
            }
        }
        Ok(())
    }

    fn take_all(&self, idx: &UInt64Array, length: usize) -> TesseraResult<Self> {
        let mut columns = AHashMap::with_capacity(self.columns.len());
        for (name, array) in self.iter() {
            columns.insert(name.to_string(), compute::take(array.as_ref(), idx, None)?);
        }
        Ok(Self {
            columns,
            column_names: self.column_names.clone(),
            length,
        })
    }
}

fn type_label(value: &ScalarValue) -> String {
    format!("{:?}", value.data_type())
}

/// Settle one column type from its values (nulls ignored).
fn infer_column_type(name: &str, values: &[&ScalarValue]) -> TesseraResult<DataType> {
    let mut current = DataType::Null;
    for value in values {
        let next = value.data_type();
        current = match (&current, &next) {
            (_, DataType::Null) => continue,
            (DataType::Null, _) => next.clone(),
            (a, b) if a == b => continue,
            (DataType::Int32, DataType::Int64) | (DataType::Int64, DataType::Int32) => {
                DataType::Int64
            }
            (DataType::Int32 | DataType::Int64, DataType::Float64)
            | (DataType::Float64, DataType::Int32 | DataType::Int64) => DataType::Float64,
            _ => {
                return Err(TesseraError::TypeMismatch {
                    expected: format!("column '{name}': {current:?}"),
                    actual: type_label(value),
                });
            }
        };
    }
    Ok(current)
}

/// Build a single column array from row values already checked by
/// [`infer_column_type`].
fn build_column(name: &str, data_type: &DataType, values: &[&ScalarValue]) -> TesseraResult<ArrayRef> {
    let mismatch = |other: &ScalarValue| TesseraError::TypeMismatch {
        expected: format!("column '{name}': {data_type:?}"),
        actual: type_label(other),
    };
    match data_type {
        DataType::Null => Ok(Arc::new(NullArray::new(values.len()))),
        DataType::Int32 => {
            let mut builder = Int32Builder::with_capacity(values.len());
            for value in values {
                match value {
                    ScalarValue::Int32(v) => builder.append_value(*v),
                    ScalarValue::Null => builder.append_null(),
                    other => return Err(mismatch(other)),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Int64 => {
            let mut builder = Int64Builder::with_capacity(values.len());
            for value in values {
                match value {
                    ScalarValue::Int64(v) => builder.append_value(*v),
                    ScalarValue::Int32(v) => builder.append_value(*v as i64),
                    ScalarValue::Null => builder.append_null(),
                    other => return Err(mismatch(other)),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Float64 => {
            let mut builder = Float64Builder::with_capacity(values.len());
            for value in values {
                match value {
                    ScalarValue::Float64(v) => builder.append_value(*v),
                    ScalarValue::Int64(v) => builder.append_value(*v as f64),
                    ScalarValue::Int32(v) => builder.append_value(*v as f64),
                    ScalarValue::Null => builder.append_null(),
                    other => return Err(mismatch(other)),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Utf8 => {
            let mut builder = StringBuilder::with_capacity(values.len(), values.len() * 8);
            for value in values {
                match value {
                    ScalarValue::Utf8(v) => builder.append_value(v),
                    ScalarValue::Null => builder.append_null(),
                    other => return Err(mismatch(other)),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Boolean => {
            let mut builder = BooleanBuilder::with_capacity(values.len());
            for value in values {
                match value {
                    ScalarValue::Boolean(v) => builder.append_value(*v),
                    ScalarValue::Null => builder.append_null(),
                    other => return Err(mismatch(other)),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        DataType::Timestamp(TimeUnit::Millisecond, None) => {
            let mut builder = TimestampMillisecondBuilder::with_capacity(values.len());
            for value in values {
                match value {
                    ScalarValue::TimestampMillis(v) => builder.append_value(*v),
                    ScalarValue::Null => builder.append_null(),
                    other => return Err(mismatch(other)),
                }
            }
            Ok(Arc::new(builder.finish()))
        }
        dt => Err(TesseraError::TypeMismatch {
            expected: "Int32|Int64|Float64|Utf8|Boolean|Timestamp(ms)".to_string(),
            actual: format!("{dt:?}"),
        }),
    }
}
