//! Key encoding — equality and ordering over join and group keys.
//!
//! Join and group only need to compare key cells, not interpret them. A
//! [`KeyColumn`] normalises an Arrow array to one of a few physical
//! representations once, so every later comparison or byte encoding is a plain
//! typed read.

use crate::error::{TesseraError, TesseraResult};
use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Int64Array, StringArray, UInt64Array,
};
use arrow::compute::{CastOptions, cast, cast_with_options};
use arrow::datatypes::{DataType, Float64Type, Int64Type, TimeUnit, UInt64Type};
use smallvec::SmallVec;
use std::cmp::Ordering;

/// Coarse type class of a key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyClass {
    /// Losslessly representable as `i64` (ints up to 32-bit unsigned)
    Integer,
    Unsigned64,
    Float,
    /// Dates and timestamps, stored as `i64` in their own unit
    Temporal,
    Text,
    Boolean,
    Null,
    Unsupported,
}

pub(crate) fn classify(data_type: &DataType) -> KeyClass {
    match data_type {
        DataType::Int8
        | DataType::Int16
        | DataType::Int32
        | DataType::Int64
        | DataType::UInt8
        | DataType::UInt16
        | DataType::UInt32 => KeyClass::Integer,
        DataType::UInt64 => KeyClass::Unsigned64,
        DataType::Float16 | DataType::Float32 | DataType::Float64 => KeyClass::Float,
        DataType::Timestamp(_, _) | DataType::Date32 | DataType::Date64 => KeyClass::Temporal,
        DataType::Utf8 | DataType::LargeUtf8 | DataType::Utf8View => KeyClass::Text,
        DataType::Boolean => KeyClass::Boolean,
        DataType::Null => KeyClass::Null,
        _ => KeyClass::Unsupported,
    }
}

/// Common temporal type of two date/timestamp types, at the finer unit.
///
/// Dates widen to milliseconds. Timestamps with and without a time zone
/// do not mix, and neither do dates and zoned timestamps.
fn common_temporal(left: &DataType, right: &DataType) -> Option<DataType> {
    match (left, right) {
        (DataType::Date32, DataType::Date64) | (DataType::Date64, DataType::Date32) => {
            Some(DataType::Date64)
        }
        (DataType::Timestamp(lu, ltz), DataType::Timestamp(ru, rtz)) => {
            if ltz.is_some() != rtz.is_some() {
                return None;
            }
            Some(DataType::Timestamp((*lu).max(*ru), ltz.clone()))
        }
        (DataType::Date32 | DataType::Date64, DataType::Timestamp(unit, None))
        | (DataType::Timestamp(unit, None), DataType::Date32 | DataType::Date64) => Some(
            DataType::Timestamp((*unit).max(TimeUnit::Millisecond), None),
        ),
        _ => None,
    }
}

/// Type both sides of a key pair are compared in.
///
/// Identical types pass through and a `Null`-typed side adopts the other
/// side's type. Integer-like pairs compare as `Int64`, numeric pairs
/// involving a float as `Float64`, and text as `Utf8`. Temporal pairs
/// compare at the finer unit; temporal keys never pair with plain numbers.
pub(crate) fn common_key_type(
    left_name: &str,
    left: &DataType,
    right_name: &str,
    right: &DataType,
) -> TesseraResult<DataType> {
    if left == right {
        return Ok(left.clone());
    }
    let target = match (classify(left), classify(right)) {
        (KeyClass::Null, _) => Some(right.clone()),
        (_, KeyClass::Null) => Some(left.clone()),
        (KeyClass::Integer, KeyClass::Integer)
        | (KeyClass::Integer, KeyClass::Unsigned64)
        | (KeyClass::Unsigned64, KeyClass::Integer) => Some(DataType::Int64),
        (KeyClass::Integer | KeyClass::Unsigned64 | KeyClass::Float, KeyClass::Float)
        | (KeyClass::Float, KeyClass::Integer | KeyClass::Unsigned64) => Some(DataType::Float64),
        (KeyClass::Temporal, KeyClass::Temporal) => common_temporal(left, right),
        (KeyClass::Text, KeyClass::Text) => Some(DataType::Utf8),
        _ => None,
    };
    target.ok_or_else(|| TesseraError::TypeMismatch {
        expected: format!("key '{left_name}' of type {left:?}"),
        actual: format!("key '{right_name}' of type {right:?}"),
    })
}

/// Cast a key array to `target`; overflow is an error rather than a silent null.
pub(crate) fn cast_key(array: &ArrayRef, target: &DataType) -> TesseraResult<ArrayRef> {
    if array.data_type() == target {
        return Ok(array.clone());
    }
    let options = CastOptions {
        safe: false,
        ..Default::default()
    };
    Ok(cast_with_options(array.as_ref(), target, &options)?)
}

/// Bring a left/right key pair to their [`common_key_type`].
pub(crate) fn unify_key_pair(
    left_name: &str,
    left: &ArrayRef,
    right_name: &str,
    right: &ArrayRef,
) -> TesseraResult<(ArrayRef, ArrayRef)> {
    let target = common_key_type(left_name, left.data_type(), right_name, right.data_type())?;
    Ok((cast_key(left, &target)?, cast_key(right, &target)?))
}

/// One key column in normalised form.
#[derive(Debug, Clone)]
pub(crate) enum KeyColumn {
    Int(Int64Array),
    UInt(UInt64Array),
    Float(Float64Array),
    Text(StringArray),
    Bool(BooleanArray),
    Null(usize),
}

const TAG_NULL: u8 = 0;
const TAG_INT: u8 = 1;
const TAG_UINT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_TEXT: u8 = 4;
const TAG_BOOL: u8 = 5;

impl KeyColumn {
    pub(crate) fn try_new(name: &str, array: &ArrayRef) -> TesseraResult<Self> {
        let column = match classify(array.data_type()) {
            KeyClass::Integer | KeyClass::Temporal => {
                KeyColumn::Int(cast(array.as_ref(), &DataType::Int64)?.as_primitive::<Int64Type>().clone())
            }
            KeyClass::Unsigned64 => KeyColumn::UInt(array.as_primitive::<UInt64Type>().clone()),
            KeyClass::Float => KeyColumn::Float(
                cast(array.as_ref(), &DataType::Float64)?
                    .as_primitive::<Float64Type>()
                    .clone(),
            ),
            KeyClass::Text => {
                KeyColumn::Text(cast(array.as_ref(), &DataType::Utf8)?.as_string::<i32>().clone())
            }
            KeyClass::Boolean => KeyColumn::Bool(array.as_boolean().clone()),
            KeyClass::Null => KeyColumn::Null(array.len()),
            KeyClass::Unsupported => {
                return Err(TesseraError::TypeMismatch {
                    expected: format!(
                        "key column '{name}' of integer, float, text, boolean or temporal type"
                    ),
                    actual: format!("{:?}", array.data_type()),
                });
            }
        };
        Ok(column)
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            KeyColumn::Int(a) => a.len(),
            KeyColumn::UInt(a) => a.len(),
            KeyColumn::Float(a) => a.len(),
            KeyColumn::Text(a) => a.len(),
            KeyColumn::Bool(a) => a.len(),
            KeyColumn::Null(len) => *len,
        }
    }

    pub(crate) fn is_null(&self, row: usize) -> bool {
        match self {
            KeyColumn::Int(a) => a.is_null(row),
            KeyColumn::UInt(a) => a.is_null(row),
            KeyColumn::Float(a) => a.is_null(row),
            KeyColumn::Text(a) => a.is_null(row),
            KeyColumn::Bool(a) => a.is_null(row),
            KeyColumn::Null(_) => true,
        }
    }

    /// Whether the column fits the fixed-width `i64` projection.
    pub(crate) fn is_fixed_width(&self) -> bool {
        matches!(self, KeyColumn::Int(_) | KeyColumn::Bool(_) | KeyColumn::Null(_))
    }

    /// `i64` view of integer-like cells; `None` for nulls and other classes.
    pub(crate) fn as_i64(&self, row: usize) -> Option<i64> {
        if self.is_null(row) {
            return None;
        }
        match self {
            KeyColumn::Int(a) => Some(a.value(row)),
            KeyColumn::Bool(a) => Some(a.value(row) as i64),
            _ => None,
        }
    }

    /// Append a self-delimiting encoding of one cell to `out`.
    pub(crate) fn encode(&self, row: usize, out: &mut Vec<u8>) {
        if self.is_null(row) {
            out.push(TAG_NULL);
            return;
        }
        match self {
            KeyColumn::Int(a) => {
                out.push(TAG_INT);
                out.extend_from_slice(&a.value(row).to_le_bytes());
            }
            KeyColumn::UInt(a) => {
                out.push(TAG_UINT);
                out.extend_from_slice(&a.value(row).to_le_bytes());
            }
            KeyColumn::Float(a) => {
                out.push(TAG_FLOAT);
                out.extend_from_slice(&canonical_f64(a.value(row)).to_bits().to_le_bytes());
            }
            KeyColumn::Text(a) => {
                let s = a.value(row);
                out.push(TAG_TEXT);
                out.extend_from_slice(&(s.len() as u64).to_le_bytes());
                out.extend_from_slice(s.as_bytes());
            }
            KeyColumn::Bool(a) => {
                out.push(TAG_BOOL);
                out.push(a.value(row) as u8);
            }
            KeyColumn::Null(_) => out.push(TAG_NULL),
        }
    }

    /// Compare two rows of this column; nulls sort first.
    pub(crate) fn compare(&self, a: usize, b: usize) -> Ordering {
        match (self.is_null(a), self.is_null(b)) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }
        match self {
            KeyColumn::Int(arr) => arr.value(a).cmp(&arr.value(b)),
            KeyColumn::UInt(arr) => arr.value(a).cmp(&arr.value(b)),
            KeyColumn::Float(arr) => {
                canonical_f64(arr.value(a)).total_cmp(&canonical_f64(arr.value(b)))
            }
            KeyColumn::Text(arr) => arr.value(a).cmp(arr.value(b)),
            KeyColumn::Bool(arr) => arr.value(a).cmp(&arr.value(b)),
            KeyColumn::Null(_) => Ordering::Equal,
        }
    }
}

/// `-0.0` folds into `0.0` and every NaN into one bit pattern.
fn canonical_f64(v: f64) -> f64 {
    if v.is_nan() {
        f64::NAN
    } else if v == 0.0 {
        0.0
    } else {
        v
    }
}

/// Several key columns read in declared order.
#[derive(Debug, Clone)]
pub(crate) struct CompositeKey {
    columns: SmallVec<[KeyColumn; 4]>,
}

impl CompositeKey {
    pub(crate) fn new(columns: impl IntoIterator<Item = KeyColumn>) -> Self {
        Self {
            columns: columns.into_iter().collect(),
        }
    }

    /// Normalise each `(name, array)` pair into a key column.
    pub(crate) fn from_arrays<'a>(
        names: impl IntoIterator<Item = (&'a str, &'a ArrayRef)>,
    ) -> TesseraResult<Self> {
        let columns = names
            .into_iter()
            .map(|(name, array)| KeyColumn::try_new(name, array))
            .collect::<TesseraResult<SmallVec<[KeyColumn; 4]>>>()?;
        Ok(Self { columns })
    }

    pub(crate) fn columns(&self) -> &[KeyColumn] {
        &self.columns
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub(crate) fn has_null(&self, row: usize) -> bool {
        self.columns.iter().any(|c| c.is_null(row))
    }

    /// Overwrite `out` with the encoding of `row`.
    pub(crate) fn encode_into(&self, row: usize, out: &mut Vec<u8>) {
        out.clear();
        for column in &self.columns {
            column.encode(row, out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{
        Date32Array, Date64Array, Float32Array, Int32Array, NullArray, TimestampMillisecondArray,
        TimestampSecondArray,
    };
    use arrow::datatypes::TimestampMillisecondType;
    use std::sync::Arc;

    #[test]
    fn classify_types() {
        assert_eq!(classify(&DataType::Int32), KeyClass::Integer);
        assert_eq!(classify(&DataType::UInt64), KeyClass::Unsigned64);
        assert_eq!(classify(&DataType::Float32), KeyClass::Float);
        assert_eq!(classify(&DataType::LargeUtf8), KeyClass::Text);
        assert_eq!(
            classify(&DataType::List(Arc::new(arrow::datatypes::Field::new(
                "item",
                DataType::Int32,
                true
            )))),
            KeyClass::Unsupported
        );
    }

    #[test]
    fn unify_int_and_float_to_float() {
        let l: ArrayRef = Arc::new(Int32Array::from(vec![1, 2]));
        let r: ArrayRef = Arc::new(Float32Array::from(vec![1.0, 2.5]));
        let (l, r) = unify_key_pair("a", &l, "b", &r).unwrap();
        assert_eq!(l.data_type(), &DataType::Float64);
        assert_eq!(r.data_type(), &DataType::Float64);
    }

    #[test]
    fn unify_unsigned_with_signed() {
        let l: ArrayRef = Arc::new(Int32Array::from(vec![1, -2]));
        let r: ArrayRef = Arc::new(UInt64Array::from(vec![1, 7]));
        let (l, r) = unify_key_pair("a", &l, "b", &r).unwrap();
        assert_eq!(l.data_type(), &DataType::Int64);
        assert_eq!(r.data_type(), &DataType::Int64);

        let huge: ArrayRef = Arc::new(UInt64Array::from(vec![u64::MAX]));
        let small: ArrayRef = Arc::new(Int64Array::from(vec![1]));
        assert!(unify_key_pair("a", &small, "b", &huge).is_err());
    }

    #[test]
    fn unify_text_with_int_fails() {
        let l: ArrayRef = Arc::new(Int32Array::from(vec![1]));
        let r: ArrayRef = Arc::new(StringArray::from(vec!["1"]));
        assert!(matches!(
            unify_key_pair("a", &l, "b", &r),
            Err(TesseraError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn unify_null_adopts_other_type() {
        let l: ArrayRef = Arc::new(NullArray::new(2));
        let r: ArrayRef = Arc::new(StringArray::from(vec!["x"]));
        let (l, _) = unify_key_pair("a", &l, "b", &r).unwrap();
        assert_eq!(l.data_type(), &DataType::Utf8);
        assert_eq!(l.null_count(), 2);
    }

    #[test]
    fn unify_dates_and_timestamps_at_finer_unit() {
        let days: ArrayRef = Arc::new(Date32Array::from(vec![1]));
        let millis: ArrayRef = Arc::new(Date64Array::from(vec![86_400_000, 1]));
        let (l, r) = unify_key_pair("a", &days, "b", &millis).unwrap();
        assert_eq!(l.data_type(), &DataType::Date64);
        let l = KeyColumn::try_new("a", &l).unwrap();
        let r = KeyColumn::try_new("b", &r).unwrap();
        assert_eq!(l.as_i64(0), r.as_i64(0));
        assert_ne!(l.as_i64(0), r.as_i64(1));

        let secs: ArrayRef = Arc::new(TimestampSecondArray::from(vec![1]));
        let ms: ArrayRef = Arc::new(TimestampMillisecondArray::from(vec![1_500]));
        let (l, r) = unify_key_pair("a", &secs, "b", &ms).unwrap();
        assert_eq!(l.data_type(), &DataType::Timestamp(TimeUnit::Millisecond, None));
        assert_eq!(l.as_primitive::<TimestampMillisecondType>().value(0), 1_000);
        assert_eq!(r.as_primitive::<TimestampMillisecondType>().value(0), 1_500);

        let (l, _) = unify_key_pair("a", &days, "b", &secs).unwrap();
        assert_eq!(l.data_type(), &DataType::Timestamp(TimeUnit::Millisecond, None));
    }

    #[test]
    fn temporal_keys_do_not_pair_with_numbers_or_zones() {
        let days: ArrayRef = Arc::new(Date32Array::from(vec![1]));
        let ints: ArrayRef = Arc::new(Int64Array::from(vec![1]));
        assert!(matches!(
            unify_key_pair("a", &days, "b", &ints),
            Err(TesseraError::TypeMismatch { .. })
        ));

        let naive: ArrayRef = Arc::new(TimestampSecondArray::from(vec![1]));
        let zoned: ArrayRef = Arc::new(TimestampSecondArray::from(vec![1]).with_timezone("UTC"));
        assert!(unify_key_pair("a", &naive, "b", &zoned).is_err());
    }

    #[test]
    fn float_encoding_is_canonical() {
        let a: ArrayRef = Arc::new(Float64Array::from(vec![0.0, -0.0, f64::NAN, -f64::NAN]));
        let col = KeyColumn::try_new("f", &a).unwrap();
        let enc = |row| {
            let mut out = Vec::new();
            col.encode(row, &mut out);
            out
        };
        assert_eq!(enc(0), enc(1));
        assert_eq!(enc(2), enc(3));
    }

    #[test]
    fn text_encoding_is_length_prefixed() {
        let a: ArrayRef = Arc::new(StringArray::from(vec!["ab", "a"]));
        let b: ArrayRef = Arc::new(StringArray::from(vec!["c", "bc"]));
        let key = CompositeKey::from_arrays([("a", &a), ("b", &b)]).unwrap();
        let mut k0 = Vec::new();
        let mut k1 = Vec::new();
        key.encode_into(0, &mut k0);
        key.encode_into(1, &mut k1);
        assert_ne!(k0, k1, "(\"ab\",\"c\") must differ from (\"a\",\"bc\")");
    }

    #[test]
    fn compare_puts_nulls_first() {
        let a: ArrayRef = Arc::new(Int32Array::from(vec![Some(3), None, Some(1)]));
        let col = KeyColumn::try_new("a", &a).unwrap();
        assert_eq!(col.compare(1, 2), Ordering::Less);
        assert_eq!(col.compare(0, 2), Ordering::Greater);
        assert_eq!(col.as_i64(0), Some(3));
        assert_eq!(col.as_i64(1), None);
    }
}
