//! # soupscope-core
//!
//! Read-only trace analysis engine for BFF primordial-soup simulations.
//!
//! A simulation run writes, per epoch, a snapshot of every tape, the
//! random pairing used for that epoch, and how many instructions each pair
//! executed. This crate decodes those records, resolves pairings, replays
//! interactions exactly, and follows the dominant lineage across epochs.
//!
//! ## Components
//!
//! - `codec`: the packed 64-bit token
//! - `config`: trace geometry from `metadata.txt`
//! - `store`: per-epoch record loading and caching
//! - `backend`: scalar and `rayon` whole-soup scans
//! - `pairing`: tape -> pair reverse index
//! - `stats`: op density, id cardinality, modal id
//! - `vm`: the BFF interpreter
//! - `lineage`: modal-id trail across epochs
//! - `search`: pattern search over projected tapes
//! - `inspect`: tape, pair and replay views
//! - `formats`: stats table and run-length log
//! - `session`: the `Analysis` entry point that owns all caches
//!
//! ## Architectural Constraints
//!
//! - Never writes to the trace directory
//! - No async, no network dependencies
//! - Every result has a documented order and tie-break

// =============================================================================
// MODULES
// =============================================================================

pub mod backend;
pub mod codec;
pub mod config;
pub mod formats;
pub mod inspect;
pub mod lineage;
pub mod pairing;
pub mod primitives;
pub mod search;
pub mod session;
pub mod stats;
pub mod store;
pub mod types;
pub mod vm;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{Epoch, Role, SoupError, TapeIndex, Token};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use backend::{BackendChoice, ParallelBackend, ScalarBackend, ScanBackend, select_backend};
pub use codec::{pack, unpack};
pub use config::{ConfigValue, TraceConfig};
pub use inspect::{
    CellView, IdCount, PairReplay, PairSummary, PairView, StepCheck, TapeSides, TapeView,
};
pub use lineage::{LineagePartner, LineageRecord, LineageSummary, LineageTrace};
pub use pairing::{PairIndex, Pairing};
pub use search::{SearchMatch, project};
pub use session::Analysis;
pub use stats::{SoupStats, StepSummary, TapeMatch, compute_stats};
pub use store::{CacheCounts, Permutation, RecordKind, SnapshotStore, Soup, StepCounts};
pub use vm::{Effect, Halt, Replay, StepEvent, Vm, replay};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{
    ParsedTable, RunlogSummary, StatsRow, format_header, format_table, parse_table, read_runlog,
    write_runlog,
};
