//! Stable multi-column ordering over physical rows.

use super::key_encoding::KeyColumn;
use std::cmp::Ordering;

/// One sort column with its direction.
#[derive(Debug, Clone)]
pub(crate) struct SortColumn {
    pub(crate) key: KeyColumn,
    pub(crate) descending: bool,
}

impl SortColumn {
    fn compare(&self, a: usize, b: usize) -> Ordering {
        let ord = self.key.compare(a, b);
        // nulls stay first whichever way the column sorts
        if self.descending && !self.key.is_null(a) && !self.key.is_null(b) {
            ord.reverse()
        } else {
            ord
        }
    }
}

/// Positions into `rows` in sorted order. Ties keep their position in `rows`.
pub(crate) fn sort_positions(columns: &[SortColumn], rows: &[usize]) -> Vec<usize> {
    let mut positions: Vec<usize> = (0..rows.len()).collect();
    positions.sort_by(|&a, &b| {
        for column in columns {
            match column.compare(rows[a], rows[b]) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        a.cmp(&b)
    });
    positions
}
