//! Views — lazily composed row-visibility overlays.
//!
//! A [`View`] never touches column data. It is a chain of [`ViewStep`]s that
//! [`materialize_index`] resolves to the physical row indices visible through
//! the view, in logical order.

use crate::error::{TesseraError, TesseraResult};
use std::sync::Arc;

/// One step of a view chain, applied to the sequence produced by the previous
/// step (the first step sees `[0..store_len)`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewStep {
    /// Keep rows whose physical mask entry is true; mask length == store length
    Filter(Arc<[bool]>),
    /// `permutation[i]` is the position, in the current sequence, of output row `i`
    Order(Arc<[usize]>),
    /// Window over the current sequence; out-of-range bounds are clamped
    Slice { offset: usize, len: Option<usize> },
}

/// Row-visibility overlay on a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct View {
    steps: Vec<ViewStep>,
}

impl View {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step; the receiver is left unchanged.
    pub fn then(&self, step: ViewStep) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self { steps }
    }

    pub fn steps(&self) -> &[ViewStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Resolve a view into physical row indices in logical order.
///
/// Without a view this is `[0..store_len)`. Every returned index lies in
/// `[0, store_len)` and the result length is the view's logical row count.
pub fn materialize_index(store_len: usize, view: Option<&View>) -> TesseraResult<Vec<usize>> {
    let mut current: Vec<usize> = (0..store_len).collect();
    let Some(view) = view else {
        return Ok(current);
    };

    for step in view.steps() {
        current = match step {
            ViewStep::Filter(mask) => {
                if mask.len() != store_len {
                    return Err(TesseraError::LengthMismatch {
                        column: "<filter mask>".to_string(),
                        expected: store_len,
                        actual: mask.len(),
                    });
                }
                current.into_iter().filter(|&row| mask[row]).collect()
            }
            ViewStep::Order(permutation) => apply_permutation(&current, permutation)?,
            ViewStep::Slice { offset, len } => {
                let start = (*offset).min(current.len());
                let end = match len {
                    Some(len) => start.saturating_add(*len).min(current.len()),
                    None => current.len(),
                };
                current[start..end].to_vec()
            }
        };
    }
    Ok(current)
}

fn apply_permutation(current: &[usize], permutation: &[usize]) -> TesseraResult<Vec<usize>> {
    if permutation.len() != current.len() {
        return Err(TesseraError::LengthMismatch {
            column: "<order permutation>".to_string(),
            expected: current.len(),
            actual: permutation.len(),
        });
    }
    let mut seen = vec![false; current.len()];
    let mut out = Vec::with_capacity(current.len());
    for &pos in permutation {
        if pos >= current.len() {
            return Err(TesseraError::RowOutOfRange {
                index: pos,
                length: current.len(),
            });
        }
        if seen[pos] {
            return Err(TesseraError::InvalidArguments(format!(
                "order permutation repeats position {pos}"
            )));
        }
        seen[pos] = true;
        out.push(current[pos]);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask(bits: &[bool]) -> ViewStep {
        ViewStep::Filter(Arc::from(bits))
    }

    #[test]
    fn no_view_is_identity() {
        assert_eq!(materialize_index(4, None).unwrap(), vec![0, 1, 2, 3]);
        assert!(materialize_index(0, None).unwrap().is_empty());
    }

    #[test]
    fn filter_then_order_then_slice() {
        let view = View::new()
            .then(mask(&[true, false, true, true, false]))
            .then(ViewStep::Order(Arc::from(vec![2, 0, 1])))
            .then(ViewStep::Slice {
                offset: 1,
                len: Some(5),
            });
        // filter -> [0, 2, 3]; order -> [3, 0, 2]; slice -> [0, 2]
        assert_eq!(materialize_index(5, Some(&view)).unwrap(), vec![0, 2]);
    }

    #[test]
    fn order_then_filter_keeps_order() {
        let view = View::new()
            .then(ViewStep::Order(Arc::from(vec![3, 2, 1, 0])))
            .then(mask(&[true, true, false, true]));
        assert_eq!(materialize_index(4, Some(&view)).unwrap(), vec![3, 1, 0]);
    }

    #[test]
    fn slice_is_clamped() {
        let view = View::new().then(ViewStep::Slice {
            offset: 10,
            len: None,
        });
        assert!(materialize_index(3, Some(&view)).unwrap().is_empty());
    }

    #[test]
    fn filter_mask_length_checked() {
        let view = View::new().then(mask(&[true]));
        let err = materialize_index(2, Some(&view)).unwrap_err();
        assert!(matches!(err, TesseraError::LengthMismatch { expected: 2, actual: 1, .. }));
    }

    #[test]
    fn permutation_must_be_a_permutation() {
        let view = View::new().then(ViewStep::Order(Arc::from(vec![0, 0])));
        assert!(matches!(
            materialize_index(2, Some(&view)),
            Err(TesseraError::InvalidArguments(_))
        ));
        let view = View::new().then(ViewStep::Order(Arc::from(vec![0, 5])));
        assert!(matches!(
            materialize_index(2, Some(&view)),
            Err(TesseraError::RowOutOfRange { index: 5, .. })
        ));
    }

    #[test]
    fn then_does_not_mutate_receiver() {
        let base = View::new().then(mask(&[true, false]));
        let _derived = base.then(ViewStep::Slice {
            offset: 0,
            len: Some(0),
        });
        assert_eq!(base.steps().len(), 1);
    }
}
