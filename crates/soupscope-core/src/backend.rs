//! # Scan Backends
//!
//! Bulk passes over a soup snapshot, behind one trait with a scalar and a
//! `rayon` implementation. The backend is chosen once when an analysis
//! session opens; nothing downstream branches on which one is active.
//!
//! Every method returns results in tape order, so both backends produce
//! identical output for identical input.

use crate::search::project_bytes;
use crate::store::Soup;
use crate::{SoupError, TapeIndex, Token};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// =============================================================================
// TRAIT
// =============================================================================

/// Whole-soup scans used by the stats, lineage and search components.
///
/// Implementations must be `Send + Sync` and hold no per-soup state.
pub trait ScanBackend: Send + Sync + std::fmt::Debug {
    /// Name for diagnostics.
    fn name(&self) -> &'static str;

    /// Number of instruction cells in each tape.
    fn ops_per_tape(&self, soup: &Soup) -> Vec<u32>;

    /// Every cell's id, sorted ascending (duplicates kept).
    fn sorted_ids(&self, soup: &Soup) -> Vec<u32>;

    /// Number of cells holding `id` in each tape.
    fn id_cells_per_tape(&self, soup: &Soup, id: u32) -> Vec<u32>;

    /// Tapes whose projection contains `pattern`, ascending.
    fn matching_tapes(&self, soup: &Soup, pattern: &[u8]) -> Vec<TapeIndex>;
}

fn count_ops(tape: &[Token]) -> u32 {
    tape.iter().filter(|t| t.is_op()).count() as u32
}

fn count_id(tape: &[Token], id: u32) -> u32 {
    tape.iter().filter(|t| t.id() == id).count() as u32
}

fn contains(tape: &[Token], pattern: &[u8]) -> bool {
    if pattern.is_empty() {
        return true;
    }
    project_bytes(tape)
        .windows(pattern.len())
        .any(|window| window == pattern)
}

// =============================================================================
// SCALAR
// =============================================================================

/// Single-threaded backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarBackend;

impl ScanBackend for ScalarBackend {
    fn name(&self) -> &'static str {
        "scalar"
    }

    fn ops_per_tape(&self, soup: &Soup) -> Vec<u32> {
        soup.tapes().map(count_ops).collect()
    }

    fn sorted_ids(&self, soup: &Soup) -> Vec<u32> {
        let mut ids: Vec<u32> = soup.cells().iter().map(|t| t.id()).collect();
        ids.sort_unstable();
        ids
    }

    fn id_cells_per_tape(&self, soup: &Soup, id: u32) -> Vec<u32> {
        soup.tapes().map(|tape| count_id(tape, id)).collect()
    }

    fn matching_tapes(&self, soup: &Soup, pattern: &[u8]) -> Vec<TapeIndex> {
        soup.tapes()
            .enumerate()
            .filter(|(_, tape)| contains(tape, pattern))
            .map(|(i, _)| i)
            .collect()
    }
}

// =============================================================================
// PARALLEL
// =============================================================================

/// Data-parallel backend on the global `rayon` pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParallelBackend;

impl ScanBackend for ParallelBackend {
    fn name(&self) -> &'static str {
        "parallel"
    }

    fn ops_per_tape(&self, soup: &Soup) -> Vec<u32> {
        soup.cells()
            .par_chunks_exact(soup.half_len())
            .map(count_ops)
            .collect()
    }

    fn sorted_ids(&self, soup: &Soup) -> Vec<u32> {
        let mut ids: Vec<u32> = soup.cells().par_iter().map(|t| t.id()).collect();
        ids.par_sort_unstable();
        ids
    }

    fn id_cells_per_tape(&self, soup: &Soup, id: u32) -> Vec<u32> {
        soup.cells()
            .par_chunks_exact(soup.half_len())
            .map(|tape| count_id(tape, id))
            .collect()
    }

    fn matching_tapes(&self, soup: &Soup, pattern: &[u8]) -> Vec<TapeIndex> {
        soup.cells()
            .par_chunks_exact(soup.half_len())
            .enumerate()
            .filter(|(_, tape)| contains(tape, pattern))
            .map(|(i, _)| i)
            .collect()
    }
}

// =============================================================================
// SELECTION
// =============================================================================

/// Which backend a session should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendChoice {
    /// Parallel when more than one hardware thread is available.
    #[default]
    Auto,
    Scalar,
    Parallel,
}

impl FromStr for BackendChoice {
    type Err = SoupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "scalar" => Ok(Self::Scalar),
            "parallel" => Ok(Self::Parallel),
            other => Err(SoupError::InvalidConfig(format!(
                "unknown backend '{}' (expected auto, scalar or parallel)",
                other
            ))),
        }
    }
}

/// Resolve a choice to a backend instance.
#[must_use]
pub fn select_backend(choice: BackendChoice) -> Box<dyn ScanBackend> {
    let backend: Box<dyn ScanBackend> = match choice {
        BackendChoice::Scalar => Box::new(ScalarBackend),
        BackendChoice::Parallel => Box::new(ParallelBackend),
        BackendChoice::Auto => {
            let threads = std::thread::available_parallelism().map_or(1, |n| n.get());
            if threads > 1 {
                Box::new(ParallelBackend)
            } else {
                Box::new(ScalarBackend)
            }
        }
    };
    tracing::info!("Scan backend: {} ({:?} requested)", backend.name(), choice);
    backend
}

// =============================================================================
// TESTS
// =============================================================================
