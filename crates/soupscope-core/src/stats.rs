//! # Stats Engine
//!
//! Per-epoch aggregates over a soup snapshot.
//!
//! ## Modal Id Tie-Break
//!
//! When several ids share the highest cell count, the modal id is the one
//! whose first cell comes earliest in tape-major, then cell-major order.
//! The same soup therefore always reports the same modal id, independent of
//! backend or of how ids happen to sort.
//!
//! ## Representative Tape
//!
//! The tape holding the most cells of the modal id; the lowest index wins
//! a tie.

use crate::backend::ScanBackend;
use crate::store::{Soup, StepCounts};
use crate::{Epoch, TapeIndex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate statistics of one soup snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoupStats {
    pub epoch: Epoch,
    /// Mean number of instruction cells per tape.
    pub mean_ops: f64,
    /// Median number of instruction cells per tape.
    pub median_ops: f64,
    /// Number of distinct ids across the whole soup.
    pub unique_ids: usize,
    pub modal_id: u32,
    /// Cells holding the modal id, soup-wide.
    pub modal_count: u64,
    /// Birth epochs of the modal id's cells, with their counts.
    pub modal_birth_epochs: BTreeMap<u16, u64>,
}

/// A tape together with how many cells of some id it holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TapeMatch {
    pub tape: TapeIndex,
    pub cells: u32,
}

/// Step-count aggregates of one epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepSummary {
    pub mean_steps: f64,
    pub max_steps: u32,
}

/// Compute [`SoupStats`] for a snapshot.
#[must_use]
pub fn compute_stats(backend: &dyn ScanBackend, soup: &Soup) -> SoupStats {
    let ops = backend.ops_per_tape(soup);
    let total_ops: u64 = ops.iter().map(|&n| u64::from(n)).sum();
    let mean_ops = if ops.is_empty() {
        0.0
    } else {
        total_ops as f64 / ops.len() as f64
    };

    let mut freq = vec![0u64; soup.half_len() + 1];
    for &n in &ops {
        freq[n as usize] += 1;
    }
    let median_ops = median_from_histogram(&freq, ops.len() as u64);

    let ids = backend.sorted_ids(soup);
    let runs = id_runs(&ids);
    let unique_ids = runs.len();
    let (modal_id, modal_count) = modal_id(soup, &runs);

    let mut modal_birth_epochs = BTreeMap::new();
    if modal_count > 0 {
        for cell in soup.cells().iter().filter(|t| t.id() == modal_id) {
            *modal_birth_epochs.entry(cell.birth_epoch()).or_insert(0) += 1;
        }
    }

    SoupStats {
        epoch: soup.epoch(),
        mean_ops,
        median_ops,
        unique_ids,
        modal_id,
        modal_count,
        modal_birth_epochs,
    }
}

/// Median of `total` samples given as a value histogram (`freq[v]` samples
/// equal `v`). Even totals average the two middle values. Zero samples
/// give `0.0`.
#[must_use]
pub fn median_from_histogram(freq: &[u64], total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let hi_pos = total / 2;
    let lo_pos = if total % 2 == 0 { hi_pos - 1 } else { hi_pos };

    let mut lo = None;
    let mut hi = None;
    let mut cumulative = 0u64;
    for (value, &count) in freq.iter().enumerate() {
        cumulative += count;
        if lo.is_none() && cumulative > lo_pos {
            lo = Some(value);
        }
        if hi.is_none() && cumulative > hi_pos {
            hi = Some(value);
            break;
        }
    }

    match (lo, hi) {
        (Some(lo), Some(hi)) => (lo + hi) as f64 / 2.0,
        _ => 0.0,
    }
}

/// `(id, count)` runs of a sorted id list.
fn id_runs(sorted: &[u32]) -> Vec<(u32, u64)> {
    let mut runs: Vec<(u32, u64)> = Vec::new();
    for &id in sorted {
        match runs.last_mut() {
            Some((last, count)) if *last == id => *count += 1,
            _ => runs.push((id, 1)),
        }
    }
    runs
}

/// Highest-count id, ties broken by first occurrence in the soup.
fn modal_id(soup: &Soup, runs: &[(u32, u64)]) -> (u32, u64) {
    let Some(best) = runs.iter().map(|&(_, count)| count).max() else {
        return (0, 0);
    };

    // runs are sorted by id, so the candidate list is too
    let candidates: Vec<u32> = runs
        .iter()
        .filter(|&&(_, count)| count == best)
        .map(|&(id, _)| id)
        .collect();

    if let [only] = candidates.as_slice() {
        return (*only, best);
    }

    let first = soup
        .cells()
        .iter()
        .map(|t| t.id())
        .find(|id| candidates.binary_search(id).is_ok())
        .unwrap_or(candidates[0]);
    (first, best)
}

/// The tape with the most cells of `id`, or `None` if no cell holds it.
#[must_use]
pub fn representative_tape(backend: &dyn ScanBackend, soup: &Soup, id: u32) -> Option<TapeMatch> {
    best_tape(&backend.id_cells_per_tape(soup, id))
}

/// Index of the largest non-zero count, lowest index on ties.
pub(crate) fn best_tape(per_tape: &[u32]) -> Option<TapeMatch> {
    per_tape
        .iter()
        .enumerate()
        .filter(|&(_, &cells)| cells > 0)
        .fold(None, |best: Option<TapeMatch>, (tape, &cells)| match best {
            Some(b) if b.cells >= cells => Some(b),
            _ => Some(TapeMatch { tape, cells }),
        })
}

/// Mean and maximum of one epoch's step counts. An empty record yields
/// zeros.
#[must_use]
pub fn step_summary(steps: &StepCounts) -> StepSummary {
    let counts = steps.counts();
    if counts.is_empty() {
        return StepSummary {
            mean_steps: 0.0,
            max_steps: 0,
        };
    }
    let total: u64 = counts.iter().map(|&n| u64::from(n)).sum();
    StepSummary {
        mean_steps: total as f64 / counts.len() as f64,
        max_steps: counts.iter().copied().max().unwrap_or(0),
    }
}
