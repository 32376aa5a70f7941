//! Hash join matcher — build on one side, probe with the other.
//!
//! Output order is the same as the sort-merge backend, so switching strategy
//! never reorders a result.

use super::backend::{MatchPicks, NO_MATCH};
use super::options::JoinKind;
use ahash::AHashMap;
use smallvec::SmallVec;
use std::hash::Hash;

pub(crate) fn hash_match<K: Hash + Eq>(
    left: &[Option<K>],
    right: &[Option<K>],
    kind: JoinKind,
) -> MatchPicks {
    let (probe, build) = match kind {
        JoinKind::Right => (right, left),
        _ => (left, right),
    };

    // Build phase: key → build rows in ascending order
    let mut table: AHashMap<&K, SmallVec<[u32; 4]>> = AHashMap::with_capacity(build.len());
    for (row, key) in build.iter().enumerate() {
        if let Some(key) = key {
            table.entry(key).or_default().push(row as u32);
        }
    }

    // Probe phase
    let preserve_probe = kind != JoinKind::Inner;
    let track_build = kind == JoinKind::Outer;
    let mut build_matched = if track_build {
        vec![false; build.len()]
    } else {
        Vec::new()
    };
    let mut picks = MatchPicks::with_capacity(probe.len());
    for (row, key) in probe.iter().enumerate() {
        let matches = key.as_ref().and_then(|k| table.get(k));
        match matches {
            Some(rows) => {
                for &b in rows {
                    picks.push(row as u32, b);
                    if track_build {
                        build_matched[b as usize] = true;
                    }
                }
            }
            None if preserve_probe => picks.push(row as u32, NO_MATCH),
            None => {}
        }
    }

    if track_build {
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
