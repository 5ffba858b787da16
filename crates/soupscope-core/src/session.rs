//! # Analysis Session
//!
//! One open trace directory: configuration, snapshot store, scan backend
//! and the derived per-epoch pair indexes.
//!
//! An `Analysis` is the unit of lifetime for every cache. Nothing it loads
//! or derives is written anywhere; dropping it releases all of it.
//!
//! ## Epoch Conventions
//!
//! The soup of epoch `E` is the population after epoch `E`'s interactions.
//! The pairing and step counts of epoch `E` describe interactions whose
//! participants come from the soup of epoch `E - 1`. Epoch 0 therefore has
//! no replayable interactions.

use crate::backend::{BackendChoice, ScanBackend, select_backend};
use crate::formats::table::StatsRow;
use crate::inspect::{PairReplay, PairSummary, PairView, StepCheck, TapeSides, TapeView, rank_pairs};
use crate::lineage::{LineageSummary, LineageTrace, lineage_summary, trace_dominant_lineage};
use crate::pairing::{PairIndex, Pairing};
use crate::primitives::MAX_STEPS;
use crate::search::{SearchMatch, find_matching, project};
use crate::stats::{SoupStats, StepSummary, compute_stats, step_summary};
use crate::store::{EpochCache, SnapshotStore, Soup};
use crate::vm::replay;
use crate::{Epoch, SoupError, TapeIndex, TraceConfig};
use std::path::Path;
use std::sync::Arc;

/// A read-only analysis session over one trace directory.
#[derive(Debug)]
pub struct Analysis {
    store: SnapshotStore,
    backend: Box<dyn ScanBackend>,
    pair_indexes: EpochCache<PairIndex>,
}

impl Analysis {
    /// Open a trace directory: load its configuration, then select the
    /// scan backend.
    pub fn open(trace_dir: impl AsRef<Path>, choice: BackendChoice) -> Result<Self, SoupError> {
        let store = SnapshotStore::open(trace_dir)?;
        tracing::info!(
            "Opened {:?}: soup_size={} half_len={} tape_len={} npairs={}",
            store.dir(),
            store.config().soup_size,
            store.config().half_len,
            store.config().tape_len(),
            store.config().npairs
        );
        Ok(Self::with_store(store, select_backend(choice)))
    }

    /// Build a session from an existing store and backend.
    #[must_use]
    pub fn with_store(store: SnapshotStore, backend: Box<dyn ScanBackend>) -> Self {
        Self {
            store,
            backend,
            pair_indexes: EpochCache::default(),
        }
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &TraceConfig {
        self.store.config()
    }

    #[must_use]
    pub fn backend(&self) -> &dyn ScanBackend {
        self.backend.as_ref()
    }

    /// Epochs with a soup snapshot, ascending.
    pub fn available_epochs(&self) -> Result<Vec<Epoch>, SoupError> {
        self.store.available_epochs()
    }

    /// The most recent epoch with a soup snapshot.
    pub fn latest_epoch(&self) -> Result<Option<Epoch>, SoupError> {
        Ok(self.available_epochs()?.last().copied())
    }

    // =========================================================================
    // STATS
    // =========================================================================

    /// Aggregate statistics of one epoch's soup.
    pub fn compute_stats(&self, epoch: Epoch) -> Result<Option<SoupStats>, SoupError> {
        Ok(self
            .store
            .load_soup(epoch)?
            .map(|soup| compute_stats(self.backend(), &soup)))
    }

    /// Mean and maximum recorded steps of one epoch.
    pub fn step_summary(&self, epoch: Epoch) -> Result<Option<StepSummary>, SoupError> {
        Ok(self.store.load_steps(epoch)?.map(|s| step_summary(&s)))
    }

    /// One stats-table row per available epoch. With `with_steps`, epochs
    /// that have a step record carry its summary.
    pub fn stats_table(&self, with_steps: bool) -> Result<Vec<StatsRow>, SoupError> {
        let mut rows = Vec::new();
        for epoch in self.available_epochs()? {
            let Some(summary) = self.lineage_summary(epoch)? else {
                continue;
            };
            let steps = if with_steps {
                self.step_summary(epoch)?
            } else {
                None
            };
            rows.push(StatsRow::from_summary(&summary, steps));
        }
        Ok(rows)
    }

    // =========================================================================
    // PAIRING
    // =========================================================================

    /// Reverse pair index of one epoch, built once and cached.
    pub fn pair_index(&self, epoch: Epoch) -> Result<Option<Arc<PairIndex>>, SoupError> {
        self.pair_indexes.get_or_load(epoch, || {
            Ok(self
                .store
                .load_permutation(epoch)?
                .map(|perm| PairIndex::build(&perm, self.config().soup_size)))
        })
    }

    /// Where a tape sat in one epoch's pairing.
    pub fn locate(&self, tape: TapeIndex, epoch: Epoch) -> Result<Option<Pairing>, SoupError> {
        Ok(self.pair_index(epoch)?.and_then(|index| index.locate(tape)))
    }

    // =========================================================================
    // INSPECTION
    // =========================================================================

    /// Decoded view of one tape.
    pub fn tape_view(&self, tape: TapeIndex, epoch: Epoch) -> Result<Option<TapeView>, SoupError> {
        let Some(soup) = self.store.load_soup(epoch)? else {
            return Ok(None);
        };
        let cells = soup.require_tape(tape)?;
        Ok(Some(TapeView::build(epoch, tape, cells)))
    }

    /// The pair a tape took part in, with before/after projections.
    pub fn pair_view(&self, tape: TapeIndex, epoch: Epoch) -> Result<Option<PairView>, SoupError> {
        let Some(index) = self.pair_index(epoch)? else {
            return Ok(None);
        };
        let Some(pairing) = index.locate(tape) else {
            return Ok(None);
        };
        let Some((a, b)) = index.participants(pairing.pair_index) else {
            return Ok(None);
        };

        let steps = self
            .store
            .load_steps(epoch)?
            .and_then(|s| s.get(pairing.pair_index));
        let before = self.previous_soup(epoch)?;
        let after = self.store.load_soup(epoch)?;

        Ok(Some(PairView {
            epoch,
            tape,
            pairing,
            a,
            b,
            steps,
            a_sides: TapeSides::of(a, before.as_deref(), after.as_deref()),
            b_sides: TapeSides::of(b, before.as_deref(), after.as_deref()),
        }))
    }

    /// The `k` pairs with the most recorded steps. Needs both the pairing
    /// and the step record of the epoch.
    pub fn top_pairs(&self, epoch: Epoch, k: usize) -> Result<Option<Vec<PairSummary>>, SoupError> {
        let Some(steps) = self.store.load_steps(epoch)? else {
            return Ok(None);
        };
        let Some(perm) = self.store.load_permutation(epoch)? else {
            return Ok(None);
        };
        let before = self.previous_soup(epoch)?;
        let after = self.store.load_soup(epoch)?;

        let pairs = rank_pairs(steps.counts(), k)
            .into_iter()
            .filter_map(|pair_index| {
                let (a, b) = perm.pair(pair_index)?;
                Some(PairSummary {
                    pair_index,
                    a,
                    b,
                    steps: steps.get(pair_index)?,
                    a_sides: TapeSides::of(a, before.as_deref(), after.as_deref()),
                    b_sides: TapeSides::of(b, before.as_deref(), after.as_deref()),
                })
            })
            .collect();
        Ok(Some(pairs))
    }

    /// Stats of an epoch plus its representative tape.
    pub fn lineage_summary(&self, epoch: Epoch) -> Result<Option<LineageSummary>, SoupError> {
        lineage_summary(self, epoch)
    }

    /// Trail of the latest epoch's modal id across all epochs.
    pub fn trace_dominant_lineage(&self) -> Result<Option<LineageTrace>, SoupError> {
        trace_dominant_lineage(self)
    }

    /// Tapes whose projection contains `pattern`.
    pub fn find_matching(&self, pattern: &str, epoch: Epoch) -> Result<Option<Vec<SearchMatch>>, SoupError> {
        Ok(self
            .store
            .load_soup(epoch)?
            .map(|soup| find_matching(self.backend(), &soup, pattern)))
    }

    // =========================================================================
    // REPLAY
    // =========================================================================

    /// Replay the interaction a tape took part in, recording every step.
    /// `None` when the pairing or the previous soup is missing.
    pub fn replay_pair(
        &self,
        tape: TapeIndex,
        epoch: Epoch,
        max_steps: u32,
    ) -> Result<Option<PairReplay>, SoupError> {
        let Some(index) = self.pair_index(epoch)? else {
            return Ok(None);
        };
        let Some(pairing) = index.locate(tape) else {
            return Ok(None);
        };
        let Some((a, b)) = index.participants(pairing.pair_index) else {
            return Ok(None);
        };
        let Some(before) = self.previous_soup(epoch)? else {
            return Ok(None);
        };

        let tape_a = before.require_tape(a)?;
        let tape_b = before.require_tape(b)?;
        let recorded_steps = self
            .store
            .load_steps(epoch)?
            .and_then(|s| s.get(pairing.pair_index));

        Ok(Some(PairReplay {
            epoch,
            tape,
            pairing,
            a,
            b,
            recorded_steps,
            a_before: project(tape_a),
            b_before: project(tape_b),
            replay: replay(tape_a, tape_b, max_steps, true),
        }))
    }

    /// Replay one pair with the full step budget and compare against the
    /// recorded step count.
    pub fn check_recorded_steps(&self, epoch: Epoch, pair_index: usize) -> Result<Option<StepCheck>, SoupError> {
        let Some(perm) = self.store.load_permutation(epoch)? else {
            return Ok(None);
        };
        let Some(recorded) = self.store.load_steps(epoch)?.and_then(|s| s.get(pair_index)) else {
            return Ok(None);
        };
        let Some((a, b)) = perm.pair(pair_index) else {
            return Ok(None);
        };
        let Some(before) = self.previous_soup(epoch)? else {
            return Ok(None);
        };

        let result = replay(before.require_tape(a)?, before.require_tape(b)?, MAX_STEPS, false);
        if result.steps != recorded {
            tracing::warn!(
                "Epoch {} pair {}: recorded {} steps, replay gives {}",
                epoch,
                pair_index,
                recorded,
                result.steps
            );
        }

        Ok(Some(StepCheck {
            epoch,
            pair_index,
            recorded,
            replayed: result.steps,
            halt: result.halt,
            matches: result.steps == recorded,
        }))
    }

    fn previous_soup(&self, epoch: Epoch) -> Result<Option<Arc<Soup>>, SoupError> {
        match epoch.checked_sub(1) {
            Some(previous) => self.store.load_soup(previous),
            None => Ok(None),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ScalarBackend;
    use crate::store::RecordKind;
    use crate::{Role, Token};

    /// Two tapes of four cells. Epoch 0 = [A0, B0]; epoch 1 pairs tape 0
    /// (A) with tape 1 (B) and records the replayed result.
    fn trace_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("metadata.txt"), "soup_size=2\nhalf_len=4\nnpairs=1\n")
            .expect("metadata");

        let a: Vec<Token> = [4u8, 0, b'+', b'+'].iter().map(|&c| Token::new(c, 1, 0)).collect();
        let b: Vec<Token> = [0u8; 4].iter().map(|&c| Token::new(c, 2, 0)).collect();
        let epoch0: Vec<Token> = a.iter().chain(&b).copied().collect();
        let result = replay(&a, &b, MAX_STEPS, false);
        let epoch1: Vec<Token> = result.a.iter().chain(&result.b).copied().collect();

        let write = |kind: RecordKind, epoch: Epoch, bytes: &[u8]| {
            std::fs::write(dir.path().join(kind.file_name(epoch)), bytes).expect("record");
        };
        write(RecordKind::Soup, 0, bytemuck::cast_slice(&epoch0));
        write(RecordKind::Soup, 1, bytemuck::cast_slice(&epoch1));
        write(RecordKind::Permutation, 1, bytemuck::cast_slice(&[0u32, 1]));
        write(RecordKind::Steps, 1, bytemuck::cast_slice(&[result.steps]));
        dir
    }

    fn analysis(dir: &tempfile::TempDir) -> Analysis {
        let store = SnapshotStore::open(dir.path()).expect("open");
        Analysis::with_store(store, Box::new(ScalarBackend))
    }

    #[test]
    fn locate_and_pair_view() {
        let dir = trace_dir();
        let analysis = analysis(&dir);

        let pairing = analysis.locate(1, 1).expect("locate").expect("paired");
        assert_eq!(pairing.role, Role::B);
        assert_eq!(pairing.partner, 0);

        let view = analysis.pair_view(0, 1).expect("view").expect("present");
        assert_eq!((view.a, view.b), (0, 1));
        assert_eq!(view.steps, Some(MAX_STEPS));
        assert_eq!(view.a_sides.before.as_deref(), Some("..++"));
        assert!(view.b_sides.after.is_some());
    }

    #[test]
    fn replay_matches_recorded_steps() {
        let dir = trace_dir();
        let analysis = analysis(&dir);

        let check = analysis.check_recorded_steps(1, 0).expect("check").expect("present");
        assert!(check.matches);
        assert_eq!(check.replayed, check.recorded);

        assert!(analysis.check_recorded_steps(1, 5).expect("check").is_none());
        assert!(analysis.check_recorded_steps(0, 0).expect("check").is_none());
    }

    #[test]
    fn replay_needs_previous_soup() {
        let dir = trace_dir();
        let analysis = analysis(&dir);

        let replayed = analysis.replay_pair(1, 1, 4).expect("replay").expect("present");
        assert_eq!(replayed.replay.steps, 4);
        assert_eq!(replayed.replay.events.len(), 4);
        assert_eq!(replayed.recorded_steps, Some(MAX_STEPS));

        std::fs::remove_file(analysis.store().record_path(0, RecordKind::Soup)).expect("remove");
        let fresh = Analysis::with_store(
            SnapshotStore::open(dir.path()).expect("open"),
            Box::new(ScalarBackend),
        );
        assert!(fresh.replay_pair(1, 1, 4).expect("replay").is_none());
    }

    #[test]
    fn tape_view_out_of_range() {
        let dir = trace_dir();
        let analysis = analysis(&dir);

        assert!(analysis.tape_view(1, 0).expect("view").is_some());
        assert!(matches!(
            analysis.tape_view(2, 0),
            Err(SoupError::TapeOutOfRange { tape: 2, soup_size: 2 })
        ));
        assert!(analysis.tape_view(0, 9).expect("view").is_none());
    }

    #[test]
    fn pair_index_is_cached() {
        let dir = trace_dir();
        let analysis = analysis(&dir);

        let first = analysis.pair_index(1).expect("index").expect("present");
        let second = analysis.pair_index(1).expect("index").expect("present");
        assert!(Arc::ptr_eq(&first, &second));
        assert!(analysis.pair_index(0).expect("index").is_none());
    }

    #[test]
    fn top_pairs_requires_steps() {
        let dir = trace_dir();
        let analysis = analysis(&dir);

        let top = analysis.top_pairs(1, 10).expect("top").expect("present");
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].steps, MAX_STEPS);
        assert!(analysis.top_pairs(0, 10).expect("top").is_none());
    }
}
