//! Engine — runs join and group verbs under one configuration.
//!
//! ```text
//! Table ─▶ resolve keys ─▶ empty input? ──yes──▶ preserved-side rows
//!                              │ no
//!                              ▼
//!                    JoinStrategy::choose
//!                     │               │
//!                Vectorized          Hash
//!              (JoinBackend)     (hash_match)
//!                     │  failure ──▶  │
//!                     ▼               ▼
//!                 index pairs ─▶ plan_output ─▶ assemble ─▶ Table
//! ```

use crate::config::EngineConfig;
use crate::error::{TesseraError, TesseraResult};
use crate::ops::group::GroupPartition;
use crate::ops::join::assemble::{KeySource, assemble, plan_output};
use crate::ops::join::asof::asof_match;
use crate::ops::join::cross::cross_indices;
use crate::ops::join::hash::hash_match;
use crate::ops::join::keys::{KeyProjection, project_keys, resolve_keys};
use crate::ops::join::{
    AsofOptions, JoinBackend, JoinIndices, JoinKind, JoinOptions, JoinStrategy, MatchPicks,
    NO_MATCH, SortMergeBackend, Suffixes,
};
use crate::storage::IntoRow;
use crate::table::{GroupedTable, Table};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Configuration plus the backend used by the vectorized join strategy.
#[derive(Clone)]
pub struct Engine {
    config: EngineConfig,
    backend: Arc<dyn JoinBackend>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .finish()
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            backend: Arc::new(SortMergeBackend),
        }
    }

    /// Replace the vectorized join backend.
    pub fn with_backend(mut self, backend: Arc<dyn JoinBackend>) -> Self {
        self.backend = backend;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn backend(&self) -> &dyn JoinBackend {
        self.backend.as_ref()
    }

    fn suffixes<'a>(&'a self, requested: &'a Option<Suffixes>) -> &'a Suffixes {
        requested.as_ref().unwrap_or(&self.config.default_suffixes)
    }

    /// Equi-join `left` and `right`.
    pub fn join(
        &self,
        left: &Table,
        right: &Table,
        kind: JoinKind,
        options: &JoinOptions,
    ) -> TesseraResult<Table> {
        let start = Instant::now();
        let pairs = options.on.resolve()?;
        let key_source = match kind {
            JoinKind::Inner | JoinKind::Left => KeySource::Left,
            JoinKind::Right => KeySource::Right,
            JoinKind::Outer => KeySource::Coalesce,
        };
        let plan = plan_output(
            left.store(),
            right.store(),
            &pairs,
            key_source,
            self.suffixes(&options.suffixes),
        )?;
        let indices = self.join_indices(left, right, kind, options)?;
        let store = assemble(&plan, left.store(), right.store(), &indices)?;

        debug!(
            target: "tessera::join",
            kind = kind.as_str(),
            output_rows = store.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "join complete"
        );
        Ok(Table::new(store))
    }

    /// Physical row pairs of an equi-join, without building the output.
    pub fn join_indices(
        &self,
        left: &Table,
        right: &Table,
        kind: JoinKind,
        options: &JoinOptions,
    ) -> TesseraResult<JoinIndices> {
        let pairs = options.on.resolve()?;
        let left_rows = left.indices()?;
        let right_rows = right.indices()?;
        let (left_key, right_key) =
            resolve_keys(left.store(), &left_rows, right.store(), &right_rows, &pairs)?;

        if left_rows.is_empty() || right_rows.is_empty() {
            debug!(
                target: "tessera::join",
                kind = kind.as_str(),
                left_rows = left_rows.len(),
                right_rows = right_rows.len(),
                "empty input short-circuit"
            );
            let logical = empty_input_indices(
                left_rows.len(),
                right_rows.len(),
                kind.preserves_left(),
                kind.preserves_right(),
            );
            return Ok(logical.to_physical(&left_rows, &right_rows));
        }

        for (len, side) in [(left_rows.len(), "left"), (right_rows.len(), "right")] {
            if len >= NO_MATCH as usize {
                return Err(TesseraError::InvalidArguments(format!(
                    "{side} input of {len} rows is too large to join"
                )));
            }
        }

        let projection = project_keys(&left_key, &right_key, options.null_equals_null);
        let total = left_rows.len() + right_rows.len();
        let strategy = JoinStrategy::choose(
            total,
            self.config.join_hash_threshold,
            self.config.force_join_strategy,
        );
        debug!(
            target: "tessera::join",
            kind = kind.as_str(),
            strategy = strategy.as_str(),
            keys = projection.label(),
            left_rows = left_rows.len(),
            right_rows = right_rows.len(),
            "join strategy selected"
        );

        let picks = match strategy {
            JoinStrategy::Vectorized => {
                match self.run_backend(&projection, kind, left_rows.len(), right_rows.len()) {
                    Ok(picks) => picks,
                    Err(err) => {
                        warn!(
                            target: "tessera::join",
                            backend = self.backend.name(),
                            error = %err,
                            "join backend failed, falling back to hash strategy"
                        );
                        run_hash(&projection, kind)
                    }
                }
            }
            JoinStrategy::Hash => run_hash(&projection, kind),
        };
        Ok(picks_to_indices(&picks).to_physical(&left_rows, &right_rows))
    }

    fn run_backend(
        &self,
        projection: &KeyProjection,
        kind: JoinKind,
        left_len: usize,
        right_len: usize,
    ) -> TesseraResult<MatchPicks> {
        let picks = match projection {
            KeyProjection::Fixed { left, right } => self.backend.match_fixed(left, right, kind)?,
            KeyProjection::Encoded { left, right } => {
                self.backend.match_encoded(left, right, kind)?
            }
        };
        picks.validate(self.backend.name(), left_len, right_len)?;
        Ok(picks)
    }

    /// Left-major Cartesian product, guarded by `max_rows` or, when that is
    /// `None`, by [`EngineConfig::cross_join_max_rows`].
    pub fn cross_join(
        &self,
        left: &Table,
        right: &Table,
        max_rows: Option<usize>,
    ) -> TesseraResult<Table> {
        let start = Instant::now();
        let max_rows = max_rows.or(self.config.cross_join_max_rows);
        let left_rows = left.indices()?;
        let right_rows = right.indices()?;
        let plan = plan_output(
            left.store(),
            right.store(),
            &[],
            KeySource::Left,
            &self.config.default_suffixes,
        )?;
        let indices =
            cross_indices(left_rows.len(), right_rows.len(), max_rows)?.to_physical(&left_rows, &right_rows);
        let store = assemble(&plan, left.store(), right.store(), &indices)?;

        debug!(
            target: "tessera::join",
            kind = "cross",
            output_rows = store.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "join complete"
        );
        Ok(Table::new(store))
    }

    /// For each left row, the nearest right row by the `on` key.
    pub fn asof_join(
        &self,
        left: &Table,
        right: &Table,
        options: &AsofOptions,
    ) -> TesseraResult<Table> {
        let start = Instant::now();
        let mut pairs = options.on.resolve()?;
        if let Some(by) = &options.by {
            pairs.extend(by.resolve()?);
        }
        let plan = plan_output(
            left.store(),
            right.store(),
            &pairs,
            KeySource::Left,
            self.suffixes(&options.suffixes),
        )?;
        let left_rows = left.indices()?;
        let right_rows = right.indices()?;
        let indices = asof_match(left.store(), &left_rows, right.store(), &right_rows, options)?
            .to_physical(&left_rows, &right_rows);
        let store = assemble(&plan, left.store(), right.store(), &indices)?;

        debug!(
            target: "tessera::join",
            kind = "asof",
            direction = ?options.direction,
            output_rows = store.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "join complete"
        );
        Ok(Table::new(store))
    }

    /// Build a table from row literals under the configured ragged-row policy.
    pub fn table_from_rows<I, R>(&self, rows: I) -> TesseraResult<Table>
    where
        I: IntoIterator<Item = R>,
        R: IntoRow,
    {
        Table::from_rows_with(rows, self.config.ragged_rows)
    }

    /// Partition the visible rows of `table` by `columns`.
    pub fn group_by(&self, table: &Table, columns: &[&str]) -> TesseraResult<GroupedTable> {
        let start = Instant::now();
        let visible = table.indices()?;
        let partition = GroupPartition::build(table.store(), &visible, columns)?;
        debug!(
            target: "tessera::group",
            columns = ?columns,
            groups = partition.size(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "group_by complete"
        );
        Ok(GroupedTable::new(table.clone(), partition))
    }
}

fn run_hash(projection: &KeyProjection, kind: JoinKind) -> MatchPicks {
    match projection {
        KeyProjection::Fixed { left, right } => hash_match(left, right, kind),
        KeyProjection::Encoded { left, right } => hash_match(left, right, kind),
    }
}

fn picks_to_indices(picks: &MatchPicks) -> JoinIndices {
    let convert = |p: &u32| (*p != NO_MATCH).then_some(*p as usize);
    JoinIndices {
        left: picks.left.iter().map(convert).collect(),
        right: picks.right.iter().map(convert).collect(),
    }
}

/// Index pairs when at least one side has no visible rows.
fn empty_input_indices(
    left_len: usize,
    right_len: usize,
    keep_left: bool,
    keep_right: bool,
) -> JoinIndices {
    let mut indices = JoinIndices::default();
    if right_len == 0 && keep_left {
        for l in 0..left_len {
            indices.push(Some(l), None);
        }
    } else if left_len == 0 && keep_right {
        for r in 0..right_len {
            indices.push(None, Some(r));
        }
    }
    indices
}
