//! Grouping engine — adjacency-list partitions over visible rows.
//!
//! A [`GroupPartition`] never copies column data. Each group is a singly
//! linked chain threaded through a per-physical-row `next` array:
//!
//! ```text
//! head[g] ──▶ row ──next──▶ row ──next──▶ … ──▶ NO_ROW
//! ```
//!
//! Rows are prepended while scanning, so a chain visits its rows in reverse
//! visible order; [`GroupPartition::indices`] restores visible order.

use super::key_encoding::{CompositeKey, KeyColumn};
use super::ordering::{SortColumn, sort_positions};
use crate::error::{TesseraError, TesseraResult};
use crate::storage::ColumnarStore;
use ahash::AHashMap;
use tracing::debug;

/// Chain terminator.
pub const NO_ROW: u32 = u32::MAX;

/// Partition of a store's visible rows by key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupPartition {
    columns: Vec<String>,
    head: Vec<u32>,
    next: Vec<u32>,
    count: Vec<u32>,
    key_row: Vec<u32>,
}

impl GroupPartition {
    /// Partition `visible` (physical row indices, in logical order) by the
    /// values of `columns`.
    ///
    /// Groups are numbered in order of first appearance. Nulls form their own
    /// group. With no grouping columns every visible row lands in a single
    /// group, which exists even when there are no rows.
    pub fn build<S: AsRef<str>>(
        store: &ColumnarStore,
        visible: &[usize],
        columns: &[S],
    ) -> TesseraResult<Self> {
        if store.len() >= NO_ROW as usize {
            return Err(TesseraError::InvalidArguments(format!(
                "cannot group a store of {} rows",
                store.len()
            )));
        }
        let names: Vec<String> = columns.iter().map(|c| c.as_ref().to_string()).collect();
        let key = CompositeKey::from_arrays(
            names
                .iter()
                .map(|n| Ok((n.as_str(), store.column(n)?)))
                .collect::<TesseraResult<Vec<_>>>()?,
        )?;

        let mut partition = Self {
            columns: names,
            head: Vec::new(),
            next: vec![NO_ROW; store.len()],
            count: Vec::new(),
            key_row: Vec::new(),
        };
        let mut seen = vec![false; store.len()];

        if key.is_empty() {
            partition.open_group(visible.first().map_or(NO_ROW, |&r| r as u32));
            for &row in visible {
                partition.check_row(&mut seen, row)?;
                partition.link(0, row);
            }
            return Ok(partition);
        }

        let mut groups: AHashMap<Vec<u8>, u32> = AHashMap::new();
        let mut buf = Vec::new();
        for &row in visible {
            partition.check_row(&mut seen, row)?;
            key.encode_into(row, &mut buf);
            let group = match groups.get(buf.as_slice()) {
                Some(&g) => g,
                None => {
                    let g = partition.open_group(row as u32);
                    groups.insert(buf.clone(), g);
                    g
                }
            };
            partition.link(group, row);
        }

        debug!(
            target: "tessera::group",
            rows = visible.len(),
            groups = partition.size(),
            "partition built"
        );
        Ok(partition)
    }

    fn check_row(&self, seen: &mut [bool], row: usize) -> TesseraResult<()> {
        if row >= seen.len() {
            return Err(TesseraError::RowOutOfRange {
                index: row,
                length: seen.len(),
            });
        }
        if seen[row] {
            return Err(TesseraError::InvalidArguments(format!(
                "row {row} is visible more than once"
            )));
        }
        seen[row] = true;
        Ok(())
    }

    fn open_group(&mut self, key_row: u32) -> u32 {
        self.head.push(NO_ROW);
        self.count.push(0);
        self.key_row.push(key_row);
        (self.head.len() - 1) as u32
    }

    #[inline]
    fn link(&mut self, group: u32, row: usize) {
        let g = group as usize;
        self.next[row] = self.head[g];
        self.head[g] = row as u32;
        self.count[g] += 1;
    }

    /// Number of groups.
    pub fn size(&self) -> usize {
        self.head.len()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn head(&self) -> &[u32] {
        &self.head
    }

    /// Per physical row; `NO_ROW` ends a chain and marks rows in no group.
    pub fn next(&self) -> &[u32] {
        &self.next
    }

    pub fn counts(&self) -> &[u32] {
        &self.count
    }

    pub fn count(&self, group: usize) -> usize {
        self.count.get(group).copied().unwrap_or(0) as usize
    }

    /// Physical row holding each group's key values (its first visible row).
    pub fn key_rows(&self) -> &[u32] {
        &self.key_row
    }

    /// Walk a group's chain. An unknown group yields nothing.
    pub fn rows(&self, group: usize) -> GroupRows<'_> {
        GroupRows {
            next: &self.next,
            current: self.head.get(group).copied().unwrap_or(NO_ROW),
        }
    }

    /// Physical rows of `group` in visible order.
    pub fn indices(&self, group: usize) -> TesseraResult<Vec<usize>> {
        self.check_group(group)?;
        let mut rows: Vec<usize> = self.rows(group).collect();
        rows.reverse();
        Ok(rows)
    }

    /// Group id per physical row; `NO_ROW` for rows that were not visible.
    pub fn group_of_rows(&self) -> Vec<u32> {
        let mut out = vec![NO_ROW; self.next.len()];
        for group in 0..self.size() {
            for row in self.rows(group) {
                out[row] = group as u32;
            }
        }
        out
    }

    /// Gather one group's rows (visible order) into a new store.
    pub fn materialize_group(&self, store: &ColumnarStore, group: usize) -> TesseraResult<ColumnarStore> {
        store.gather(&self.indices(group)?)
    }

    /// One row per group holding the grouping columns' values.
    pub fn keys(&self, store: &ColumnarStore) -> TesseraResult<ColumnarStore> {
        if self.columns.is_empty() {
            return ColumnarStore::from_columns_with_length(Vec::<(String, _)>::new(), self.size());
        }
        let names: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        let rows: Vec<usize> = self.key_row.iter().map(|&r| r as usize).collect();
        store.select(&names)?.gather(&rows)
    }

    /// Reorder group ids by key value (ascending, nulls first). Groups with
    /// equal keys keep their relative order; chains are untouched.
    pub fn sort_by_keys(&self, store: &ColumnarStore) -> TesseraResult<Self> {
        if self.columns.is_empty() {
            return Ok(self.clone());
        }
        let sort_columns = self
            .columns
            .iter()
            .map(|name| {
                Ok(SortColumn {
                    key: KeyColumn::try_new(name, store.column(name)?)?,
                    descending: false,
                })
            })
            .collect::<TesseraResult<Vec<_>>>()?;
        let rows: Vec<usize> = self.key_row.iter().map(|&r| r as usize).collect();
        let order = sort_positions(&sort_columns, &rows);

        Ok(Self {
            columns: self.columns.clone(),
            head: order.iter().map(|&g| self.head[g]).collect(),
            next: self.next.clone(),
            count: order.iter().map(|&g| self.count[g]).collect(),
            key_row: order.iter().map(|&g| self.key_row[g]).collect(),
        })
    }

    fn check_group(&self, group: usize) -> TesseraResult<()> {
        if group >= self.size() {
            return Err(TesseraError::InvalidArguments(format!(
                "group {group} out of range for {} groups",
                self.size()
            )));
        }
        Ok(())
    }
}

/// Iterator over one group's chain.
#[derive(Debug, Clone)]
pub struct GroupRows<'a> {
    next: &'a [u32],
    current: u32,
}

impl Iterator for GroupRows<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.current == NO_ROW {
            return None;
        }
        let row = self.current as usize;
        self.current = self.next[row];
        Some(row)
    }
}
