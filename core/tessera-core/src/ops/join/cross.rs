//! Cross join index generation

use super::options::JoinIndices;
use crate::error::{TesseraError, TesseraResult};

/// Left-major Cartesian product of `left_len` x `right_len` positions.
///
/// The product size is checked against `max_rows` (or the address space when
/// no guard is given) before anything is allocated.
pub(crate) fn cross_indices(
    left_len: usize,
    right_len: usize,
    max_rows: Option<usize>,
) -> TesseraResult<JoinIndices> {
    let rows = left_len as u128 * right_len as u128;
    let limit = max_rows.unwrap_or(usize::MAX);
    if rows > limit as u128 {
        return Err(TesseraError::RowCountGuardExceeded {
            rows,
            max_rows: limit,
        });
    }

    let mut indices = JoinIndices::with_capacity(rows as usize);
    for l in 0..left_len {
        for r in 0..right_len {
            indices.push(Some(l), Some(r));
        }
    }
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_left_major_order() {
        let idx = cross_indices(2, 3, None).unwrap();
        assert_eq!(idx.len(), 6);
        assert_eq!(
            idx.left,
            vec![Some(0), Some(0), Some(0), Some(1), Some(1), Some(1)]
        );
        assert_eq!(
            idx.right,
            vec![Some(0), Some(1), Some(2), Some(0), Some(1), Some(2)]
        );
    }

    #[test]
    fn test_guard() {
        let err = cross_indices(1_000, 1_000, Some(999_999)).unwrap_err();
        assert!(matches!(
            err,
            TesseraError::RowCountGuardExceeded {
                rows: 1_000_000,
                max_rows: 999_999
            }
        ));
        assert_eq!(cross_indices(1_000, 1_000, Some(1_000_000)).unwrap().len(), 1_000_000);
    }

    #[test]
    fn test_guard_checks_before_allocating() {
        let err = cross_indices(usize::MAX, usize::MAX, None).unwrap_err();
        assert!(matches!(err, TesseraError::RowCountGuardExceeded { .. }));
    }

    #[test]
    fn test_empty_side() {
        assert!(cross_indices(0, 5, Some(0)).unwrap().is_empty());
    }
}
