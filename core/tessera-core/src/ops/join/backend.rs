//! Join backends — pluggable key matchers for the vectorized strategy.
//!
//! A backend receives both sides' keys already projected to a flat form
//! (`i64` or encoded bytes) and returns `u32` pick arrays. The engine owns
//! everything else: key resolution, null handling, output assembly.

use super::options::JoinKind;
use crate::error::{TesseraError, TesseraResult};
use std::cmp::Ordering;

/// Pick value for "no row on this side".
pub const NO_MATCH: u32 = u32::MAX;

/// Parallel pick arrays; `left[i]`/`right[i]` form output row `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchPicks {
    pub left: Vec<u32>,
    pub right: Vec<u32>,
}

impl MatchPicks {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            left: Vec::with_capacity(capacity),
            right: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn push(&mut self, left: u32, right: u32) {
        self.left.push(left);
        self.right.push(right);
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }

    /// Reject malformed output from a backend.
    pub(crate) fn validate(&self, backend: &str, left_len: usize, right_len: usize) -> TesseraResult<()> {
        let fail = |message: String| TesseraError::Backend {
            backend: backend.to_string(),
            message,
        };
        if self.left.len() != self.right.len() {
            return Err(fail(format!(
                "pick arrays differ in length ({} vs {})",
                self.left.len(),
                self.right.len()
            )));
        }
        for (&l, &r) in self.left.iter().zip(&self.right) {
            if l == NO_MATCH && r == NO_MATCH {
                return Err(fail("pair with no row on either side".to_string()));
            }
            if l != NO_MATCH && l as usize >= left_len {
                return Err(fail(format!("left pick {l} out of range for {left_len} rows")));
            }
            if r != NO_MATCH && r as usize >= right_len {
                return Err(fail(format!("right pick {r} out of range for {right_len} rows")));
            }
        }
        Ok(())
    }
}

/// Key matcher used by the vectorized strategy.
///
/// `None` keys never match. Implementations must emit pairs in probe order
/// (left rows, or right rows for [`JoinKind::Right`]), matches for one probe
/// row in build-side order, unmatched probe rows in place for preserving
/// kinds, and outer-join leftovers last in right order.
pub trait JoinBackend: Send + Sync {
    fn name(&self) -> &str;

    fn match_fixed(
        &self,
        left: &[Option<i64>],
        right: &[Option<i64>],
        kind: JoinKind,
    ) -> TesseraResult<MatchPicks>;

    fn match_encoded(
        &self,
        left: &[Option<Vec<u8>>],
        right: &[Option<Vec<u8>>],
        kind: JoinKind,
    ) -> TesseraResult<MatchPicks>;
}

/// Sort-merge matcher; the built-in backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortMergeBackend;

impl JoinBackend for SortMergeBackend {
    fn name(&self) -> &str {
        "sort_merge"
    }

    fn match_fixed(
        &self,
        left: &[Option<i64>],
        right: &[Option<i64>],
        kind: JoinKind,
    ) -> TesseraResult<MatchPicks> {
        Ok(sort_merge(left, right, kind))
    }

    fn match_encoded(
        &self,
        left: &[Option<Vec<u8>>],
        right: &[Option<Vec<u8>>],
        kind: JoinKind,
    ) -> TesseraResult<MatchPicks> {
        Ok(sort_merge(left, right, kind))
    }
}

/// Non-null positions of `keys`, stably sorted by key.
fn sorted_positions<K: Ord>(keys: &[Option<K>]) -> Vec<u32> {
    let mut positions: Vec<u32> = keys
        .iter()
        .enumerate()
        .filter(|(_, k)| k.is_some())
        .map(|(i, _)| i as u32)
        .collect();
    positions.sort_by(|&a, &b| keys[a as usize].cmp(&keys[b as usize]));
    positions
}

pub(crate) fn sort_merge<K: Ord>(left: &[Option<K>], right: &[Option<K>], kind: JoinKind) -> MatchPicks {
    let (probe, build) = match kind {
        JoinKind::Right => (right, left),
        _ => (left, right),
    };
    let probe_sorted = sorted_positions(probe);
    let build_sorted = sorted_positions(build);

    // range of build_sorted matching each probe row
    let mut runs: Vec<Option<(usize, usize)>> = vec![None; probe.len()];
    let mut build_matched = vec![false; build.len()];
    let (mut i, mut j) = (0usize, 0usize);
    while i < probe_sorted.len() && j < build_sorted.len() {
        let pk = &probe[probe_sorted[i] as usize];
        let bk = &build[build_sorted[j] as usize];
        match pk.cmp(bk) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                let start = j;
                let mut end = j;
                while end < build_sorted.len() && &build[build_sorted[end] as usize] == pk {
                    build_matched[build_sorted[end] as usize] = true;
                    end += 1;
                }
                while i < probe_sorted.len() && &probe[probe_sorted[i] as usize] == pk {
                    runs[probe_sorted[i] as usize] = Some((start, end));
                    i += 1;
                }
                j = end;
            }
        }
    }

    let preserve_probe = kind != JoinKind::Inner;
    let mut picks = MatchPicks::with_capacity(probe.len());
    for (p, run) in runs.iter().enumerate() {
        match run {
            Some((start, end)) => {
                for &b in &build_sorted[*start..*end] {
                    picks.push(p as u32, b);
                }
            }
            None if preserve_probe => picks.push(p as u32, NO_MATCH),
            None => {}
        }
    }
    if kind == JoinKind::Outer {
        for (b, matched) in build_matched.iter().enumerate() {
            if !matched {
                picks.push(NO_MATCH, b as u32);
            }
        }
    }
    if kind == JoinKind::Right {
        std::mem::swap(&mut picks.left, &mut picks.right);
    }
    picks
}
