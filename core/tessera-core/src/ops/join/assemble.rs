//! Join output assembly — column naming and gathering.

use super::options::{JoinIndices, Suffixes};
use crate::error::{TesseraError, TesseraResult};
use crate::ops::key_encoding::{cast_key, common_key_type};
use crate::storage::ColumnarStore;
use ahash::AHashSet;
use arrow::array::{Array, ArrayRef, UInt64Array, new_null_array};
use arrow::compute::{self, kernels::interleave::interleave};

/// Where a unified key column takes its values from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeySource {
    Left,
    Right,
    /// Left value where present, right otherwise, in the common key type
    Coalesce,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    Left(String),
    Right(String),
    Key { left: String, right: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct OutputColumn {
    name: String,
    source: Source,
}

/// Output column layout of a join.
#[derive(Debug, Clone)]
pub(crate) struct OutputPlan {
    columns: Vec<OutputColumn>,
    key_source: KeySource,
}

impl OutputPlan {
    #[cfg(test)]
    fn names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }
}

/// Lay out output columns: left columns in order, then right columns.
///
/// Same-named key pairs collapse into one column at the left position.
/// Remaining name collisions take the side's suffix; a collision that
/// survives suffixing is a [`TesseraError::DuplicateColumn`].
pub(crate) fn plan_output(
    left: &ColumnarStore,
    right: &ColumnarStore,
    key_pairs: &[(String, String)],
    key_source: KeySource,
    suffixes: &Suffixes,
) -> TesseraResult<OutputPlan> {
    let merged: AHashSet<&str> = key_pairs
        .iter()
        .filter(|(l, r)| l == r)
        .map(|(l, _)| l.as_str())
        .collect();
    let left_names: AHashSet<&str> = left.column_names().iter().map(String::as_str).collect();
    let right_names: AHashSet<&str> = right
        .column_names()
        .iter()
        .map(String::as_str)
        .filter(|n| !merged.contains(n))
        .collect();

    let rename = |name: &str, suffix: &Option<String>| match suffix {
        Some(suffix) => format!("{name}{suffix}"),
        None => name.to_string(),
    };

    let mut columns = Vec::with_capacity(left.num_columns() + right.num_columns());
    for name in left.column_names() {
        let source = if merged.contains(name.as_str()) && right.has_column(name) {
            Source::Key {
                left: name.clone(),
                right: name.clone(),
            }
        } else {
            Source::Left(name.clone())
        };
        let out = if right_names.contains(name.as_str()) {
            rename(name, &suffixes.left)
        } else {
            name.clone()
        };
        columns.push(OutputColumn { name: out, source });
    }
    for name in right.column_names() {
        if merged.contains(name.as_str()) {
            continue;
        }
        let out = if left_names.contains(name.as_str()) {
            rename(name, &suffixes.right)
        } else {
            name.clone()
        };
        columns.push(OutputColumn {
            name: out,
            source: Source::Right(name.clone()),
        });
    }

    let mut seen = AHashSet::with_capacity(columns.len());
    for column in &columns {
        if !seen.insert(column.name.as_str()) {
            return Err(TesseraError::DuplicateColumn(column.name.clone()));
        }
    }
    Ok(OutputPlan {
        columns,
        key_source,
    })
}

/// Gather the planned columns for the given physical row pairs.
pub(crate) fn assemble(
    plan: &OutputPlan,
    left: &ColumnarStore,
    right: &ColumnarStore,
    indices: &JoinIndices,
) -> TesseraResult<ColumnarStore> {
    let left_idx = pick_array(&indices.left);
    let right_idx = pick_array(&indices.right);

    let mut out = Vec::with_capacity(plan.columns.len());
    for column in &plan.columns {
        let array = match &column.source {
            Source::Left(name) => take_or_null(left.column(name)?, &left_idx)?,
            Source::Right(name) => take_or_null(right.column(name)?, &right_idx)?,
            Source::Key {
                left: l,
                right: r,
            } => match plan.key_source {
                KeySource::Left => take_or_null(left.column(l)?, &left_idx)?,
                KeySource::Right => take_or_null(right.column(r)?, &right_idx)?,
                KeySource::Coalesce => {
                    let lv = take_or_null(left.column(l)?, &left_idx)?;
                    let rv = take_or_null(right.column(r)?, &right_idx)?;
                    coalesce(l, lv, r, rv)?
                }
            },
        };
        out.push((column.name.clone(), array));
    }
    ColumnarStore::from_columns_with_length(out, indices.len())
}

fn pick_array(picks: &[Option<usize>]) -> UInt64Array {
    picks.iter().map(|p| p.map(|p| p as u64)).collect()
}

fn take_or_null(array: &ArrayRef, idx: &UInt64Array) -> TesseraResult<ArrayRef> {
    // an empty side is only ever referenced through null picks
    if array.is_empty() {
        return Ok(new_null_array(array.data_type(), idx.len()));
    }
    Ok(compute::take(array.as_ref(), idx, None)?)
}

/// Both sides go through the type the keys were matched in, so no value
/// from either side is truncated or dropped.
fn coalesce(
    left_name: &str,
    left: ArrayRef,
    right_name: &str,
    right: ArrayRef,
) -> TesseraResult<ArrayRef> {
    let target = common_key_type(left_name, left.data_type(), right_name, right.data_type())?;
    let left = cast_key(&left, &target)?;
    let right = cast_key(&right, &target)?;
    let picks: Vec<(usize, usize)> = (0..left.len())
        .map(|row| if left.is_valid(row) { (0, row) } else { (1, row) })
        .collect();
    Ok(interleave(&[left.as_ref(), right.as_ref()], &picks)?)
}
