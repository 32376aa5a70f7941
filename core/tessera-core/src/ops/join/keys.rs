//! Join key resolution and projection.

use crate::error::{JoinSide, TesseraError, TesseraResult};
use crate::ops::key_encoding::{CompositeKey, KeyColumn, unify_key_pair};
use crate::storage::ColumnarStore;
use ahash::AHashMap;
use arrow::array::{ArrayRef, UInt64Array};
use arrow::compute;
use smallvec::SmallVec;

/// `name` from `store`, restricted to the visible `rows` in order.
pub(crate) fn visible_column(
    store: &ColumnarStore,
    name: &str,
    rows: &[usize],
    side: JoinSide,
) -> TesseraResult<ArrayRef> {
    let array = store
        .column(name)
        .map_err(|_| TesseraError::JoinKeyNotFound {
            side,
            column: name.to_string(),
        })?;
    if is_identity(rows, store.len()) {
        return Ok(array.clone());
    }
    let idx = UInt64Array::from_iter_values(rows.iter().map(|&r| r as u64));
    Ok(compute::take(array.as_ref(), &idx, None)?)
}

fn is_identity(rows: &[usize], len: usize) -> bool {
    rows.len() == len && rows.iter().enumerate().all(|(i, &r)| i == r)
}

/// Both sides' key columns, aligned to visible rows and unified pairwise.
pub(crate) fn resolve_keys(
    left: &ColumnarStore,
    left_rows: &[usize],
    right: &ColumnarStore,
    right_rows: &[usize],
    pairs: &[(String, String)],
) -> TesseraResult<(CompositeKey, CompositeKey)> {
    let mut left_cols = Vec::with_capacity(pairs.len());
    let mut right_cols = Vec::with_capacity(pairs.len());
    for (l, r) in pairs {
        let la = visible_column(left, l, left_rows, JoinSide::Left)?;
        let ra = visible_column(right, r, right_rows, JoinSide::Right)?;
        let (la, ra) = unify_key_pair(l, &la, r, &ra)?;
        left_cols.push(KeyColumn::try_new(l, &la)?);
        right_cols.push(KeyColumn::try_new(r, &ra)?);
    }
    Ok((CompositeKey::new(left_cols), CompositeKey::new(right_cols)))
}

/// Keys in the flat form handed to a matcher.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum KeyProjection {
    Fixed {
        left: Vec<Option<i64>>,
        right: Vec<Option<i64>>,
    },
    Encoded {
        left: Vec<Option<Vec<u8>>>,
        right: Vec<Option<Vec<u8>>>,
    },
}

impl KeyProjection {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            KeyProjection::Fixed { .. } => "fixed",
            KeyProjection::Encoded { .. } => "encoded",
        }
    }
}

/// Project both sides to `i64` when every key column is integer-like,
/// otherwise to encoded bytes.
///
/// A single integer key is used as is. Composite keys, and keys where nulls
/// must compare equal, are factorized into dense codes through a dictionary
/// shared by both sides.
pub(crate) fn project_keys(
    left: &CompositeKey,
    right: &CompositeKey,
    null_equals_null: bool,
) -> KeyProjection {
    let fixed = left
        .columns()
        .iter()
        .chain(right.columns())
        .all(KeyColumn::is_fixed_width);

    if !fixed {
        let mut encoder = Encoder::default();
        return KeyProjection::Encoded {
            left: encoder.encode_all(left, null_equals_null),
            right: encoder.encode_all(right, null_equals_null),
        };
    }

    if left.columns().len() == 1 && !null_equals_null {
        let single = |key: &CompositeKey| {
            let column = &key.columns()[0];
            (0..column.len()).map(|row| column.as_i64(row)).collect()
        };
        return KeyProjection::Fixed {
            left: single(left),
            right: single(right),
        };
    }

    let mut dictionary: AHashMap<SmallVec<[Option<i64>; 4]>, i64> = AHashMap::new();
    let mut factorize = |key: &CompositeKey| -> Vec<Option<i64>> {
        let rows = key.columns().first().map(KeyColumn::len).unwrap_or(0);
        (0..rows)
            .map(|row| {
                if !null_equals_null && key.has_null(row) {
                    return None;
                }
                let tuple: SmallVec<[Option<i64>; 4]> =
                    key.columns().iter().map(|c| c.as_i64(row)).collect();
                let next = dictionary.len() as i64;
                Some(*dictionary.entry(tuple).or_insert(next))
            })
            .collect()
    };
    let left = factorize(left);
    let right = factorize(right);
    KeyProjection::Fixed { left, right }
}

#[derive(Default)]
struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    fn encode_all(&mut self, key: &CompositeKey, null_equals_null: bool) -> Vec<Option<Vec<u8>>> {
        let rows = key.columns().first().map(KeyColumn::len).unwrap_or(0);
        (0..rows)
            .map(|row| {
                if !null_equals_null && key.has_null(row) {
                    return None;
                }
                key.encode_into(row, &mut self.buf);
                Some(self.buf.clone())
            })
            .collect()
    }
}
