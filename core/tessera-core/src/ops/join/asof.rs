//! Asof join — nearest-key matching within exact-match groups.
//!
//! Both sides are sorted by `(group, key, row)` and swept once per group with
//! two monotone cursors, so the join is `O((n + m) log(n + m))`.

use super::keys::visible_column;
use super::options::{AsofDirection, AsofOptions, JoinIndices};
use crate::error::{JoinSide, TesseraError, TesseraResult};
use crate::ops::key_encoding::{
    CompositeKey, KeyClass, KeyColumn, cast_key, classify, common_key_type, unify_key_pair,
};
use crate::storage::ColumnarStore;
use ahash::AHashMap;
use arrow::array::{Array, ArrayRef, AsArray};
use arrow::compute::cast;
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use std::cmp::Ordering;

/// Orderable asof key value.
trait AsofKey: Copy {
    fn order(&self, other: &Self) -> Ordering;
    fn distance(&self, other: &Self) -> f64;
}

impl AsofKey for i64 {
    fn order(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }

    fn distance(&self, other: &Self) -> f64 {
        (*self as i128 - *other as i128).unsigned_abs() as f64
    }
}

impl AsofKey for f64 {
    fn order(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }

    fn distance(&self, other: &Self) -> f64 {
        (self - other).abs()
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry<K> {
    group: u32,
    key: K,
    row: usize,
}

fn sort_entries<K: AsofKey>(entries: &mut [Entry<K>]) {
    entries.sort_by(|a, b| {
        a.group
            .cmp(&b.group)
            .then_with(|| a.key.order(&b.key))
            .then_with(|| a.row.cmp(&b.row))
    });
}

enum AsofValues {
    Int(Vec<Option<i64>>, Vec<Option<i64>>),
    Float(Vec<Option<f64>>, Vec<Option<f64>>),
}

fn unorderable(name: &str, array: &ArrayRef) -> TesseraError {
    TesseraError::UnorderableKey {
        column: name.to_string(),
        data_type: format!("{:?}", array.data_type()),
    }
}

fn int_values(array: &ArrayRef) -> TesseraResult<Vec<Option<i64>>> {
    let ints = cast(array.as_ref(), &DataType::Int64)?;
    Ok(ints.as_primitive::<Int64Type>().iter().collect())
}

fn float_values(array: &ArrayRef) -> TesseraResult<Vec<Option<f64>>> {
    let floats = cast(array.as_ref(), &DataType::Float64)?;
    Ok(floats
        .as_primitive::<Float64Type>()
        .iter()
        .map(|v| v.filter(|v| !v.is_nan()))
        .collect())
}

/// Project the `on` key pair to `i64` or `f64`.
///
/// Integer and temporal pairs stay exact in their common type, so a
/// tolerance is measured in that type's unit.
fn project_on(
    left_name: &str,
    left: &ArrayRef,
    right_name: &str,
    right: &ArrayRef,
) -> TesseraResult<AsofValues> {
    let lc = classify(left.data_type());
    let rc = classify(right.data_type());
    let orderable = |c: KeyClass| {
        matches!(
            c,
            KeyClass::Integer
                | KeyClass::Unsigned64
                | KeyClass::Float
                | KeyClass::Temporal
                | KeyClass::Null
        )
    };
    if !orderable(lc) {
        return Err(unorderable(left_name, left));
    }
    if !orderable(rc) {
        return Err(unorderable(right_name, right));
    }

    let target = common_key_type(left_name, left.data_type(), right_name, right.data_type())?;
    let exact = |c: KeyClass| matches!(c, KeyClass::Integer | KeyClass::Temporal | KeyClass::Null);
    if exact(lc) && exact(rc) {
        let (l, r) = (cast_key(left, &target)?, cast_key(right, &target)?);
        Ok(AsofValues::Int(int_values(&l)?, int_values(&r)?))
    } else {
        Ok(AsofValues::Float(float_values(left)?, float_values(right)?))
    }
}

/// Group codes from the `by` keys through a dictionary shared by both sides.
fn group_codes(
    left: &ColumnarStore,
    left_rows: &[usize],
    right: &ColumnarStore,
    right_rows: &[usize],
    options: &AsofOptions,
) -> TesseraResult<(Vec<Option<u32>>, Vec<Option<u32>>)> {
    let Some(by) = &options.by else {
        return Ok((vec![Some(0); left_rows.len()], vec![Some(0); right_rows.len()]));
    };
    let pairs = by.resolve()?;
    let mut left_cols = Vec::with_capacity(pairs.len());
    let mut right_cols = Vec::with_capacity(pairs.len());
    for (l, r) in &pairs {
        let la = visible_column(left, l, left_rows, JoinSide::Left)?;
        let ra = visible_column(right, r, right_rows, JoinSide::Right)?;
        let (la, ra) = unify_key_pair(l, &la, r, &ra)?;
        left_cols.push(KeyColumn::try_new(l, &la)?);
        right_cols.push(KeyColumn::try_new(r, &ra)?);
    }
    let left_key = CompositeKey::new(left_cols);
    let right_key = CompositeKey::new(right_cols);

    let mut dictionary: AHashMap<Vec<u8>, u32> = AHashMap::new();
    let mut buf = Vec::new();
    let mut codes = |key: &CompositeKey, rows: usize| -> Vec<Option<u32>> {
        (0..rows)
            .map(|row| {
                if key.has_null(row) {
                    return None;
                }
                key.encode_into(row, &mut buf);
                let next = dictionary.len() as u32;
                Some(*dictionary.entry(buf.clone()).or_insert(next))
            })
            .collect()
    };
    let l = codes(&left_key, left_rows.len());
    let r = codes(&right_key, right_rows.len());
    Ok((l, r))
}

/// Index pairs of an asof join, as positions into `left_rows`/`right_rows`.
///
/// Every left position appears exactly once, in order.
pub(crate) fn asof_match(
    left: &ColumnarStore,
    left_rows: &[usize],
    right: &ColumnarStore,
    right_rows: &[usize],
    options: &AsofOptions,
) -> TesseraResult<JoinIndices> {
    let on = options.on.resolve()?;
    if on.len() != 1 {
        return Err(TesseraError::InvalidArguments(format!(
            "asof join needs exactly one 'on' key, got {}",
            on.len()
        )));
    }
    if let Some(tolerance) = options.tolerance {
        if tolerance.is_nan() || tolerance < 0.0 {
            return Err(TesseraError::InvalidArguments(format!(
                "asof tolerance must be a non-negative number, got {tolerance}"
            )));
        }
    }
    let (ln, rn) = &on[0];
    let la = visible_column(left, ln, left_rows, JoinSide::Left)?;
    let ra = visible_column(right, rn, right_rows, JoinSide::Right)?;
    let values = project_on(ln, &la, rn, &ra)?;
    let (lg, rg) = group_codes(left, left_rows, right, right_rows, options)?;

    let picks = match values {
        AsofValues::Int(lk, rk) => sweep(&lk, &lg, &rk, &rg, options),
        AsofValues::Float(lk, rk) => sweep(&lk, &lg, &rk, &rg, options),
    };
    let mut indices = JoinIndices::with_capacity(left_rows.len());
    for (pos, pick) in picks.into_iter().enumerate() {
        indices.push(Some(pos), pick);
    }
    Ok(indices)
}

fn entries<K: AsofKey>(keys: &[Option<K>], groups: &[Option<u32>]) -> Vec<Entry<K>> {
    let mut out: Vec<Entry<K>> = keys
        .iter()
        .zip(groups)
        .enumerate()
        .filter_map(|(row, (key, group))| {
            Some(Entry {
                group: (*group)?,
                key: (*key)?,
                row,
            })
        })
        .collect();
    sort_entries(&mut out);
    out
}

fn sweep<K: AsofKey>(
    left_keys: &[Option<K>],
    left_groups: &[Option<u32>],
    right_keys: &[Option<K>],
    right_groups: &[Option<u32>],
    options: &AsofOptions,
) -> Vec<Option<usize>> {
    let left = entries(left_keys, left_groups);
    let right = entries(right_keys, right_groups);
    let mut picks = vec![None; left_keys.len()];

    let mut start = 0; // first right entry of the current group
    let mut end = 0; // one past its last entry
    let mut back = 0; // right entries with key <= left key
    let mut fwd = 0; // first right entry with key >= left key
    let mut current: Option<u32> = None;

    for entry in &left {
        if current != Some(entry.group) {
            current = Some(entry.group);
            start = end.max(start);
            while start < right.len() && right[start].group < entry.group {
                start += 1;
            }
            end = start;
            while end < right.len() && right[end].group == entry.group {
                end += 1;
            }
            back = start;
            fwd = start;
        }
        while back < end && right[back].key.order(&entry.key) != Ordering::Greater {
            back += 1;
        }
        while fwd < end && right[fwd].key.order(&entry.key) == Ordering::Less {
            fwd += 1;
        }
        let predecessor = (back > start).then(|| &right[back - 1]);
        let successor = (fwd < end).then(|| &right[fwd]);

        let candidate = match options.direction {
            AsofDirection::Backward => predecessor,
            AsofDirection::Forward => successor,
            AsofDirection::Nearest => match (predecessor, successor) {
                (Some(p), Some(s)) => {
                    if s.key.distance(&entry.key) < p.key.distance(&entry.key) {
                        Some(s)
                    } else {
                        Some(p)
                    }
                }
                (p, s) => p.or(s),
            },
        };
        picks[entry.row] = candidate
            .filter(|c| {
                options
                    .tolerance
                    .is_none_or(|tol| c.key.distance(&entry.key) <= tol)
            })
            .map(|c| c.row);
    }
    picks
}
