//! # Innate Primitives
//!
//! Fixed constants of the BFF soup trace format and of the replay machine.
//!
//! These mirror what the simulation compiled in when it wrote the trace.
//! Geometry constants (`DEFAULT_*`) can be overridden per trace directory
//! by `metadata.txt`; machine constants cannot.

// =============================================================================
// MACHINE CONSTANTS
// =============================================================================

/// Instruction pointer position at the start of every interaction.
///
/// Cells 0 and 1 of the combined tape hold the initial head positions.
pub const IP_START: usize = 2;

/// Capacity of the bracket stack. A `[` executed at this depth halts.
pub const STACK_DEPTH: usize = 64;

/// Hard cap on executed instructions per interaction.
pub const MAX_STEPS: u32 = 16384;

/// The instruction bytes. Every other byte value is data (a no-op).
pub const OPS: &[u8; 7] = b"<>+-,[]";

/// Lookup table: `IS_OP[b]` is true when `b` is one of [`OPS`].
pub const IS_OP: [bool; 256] = build_op_table();

const fn build_op_table() -> [bool; 256] {
    let mut table = [false; 256];
    let mut i = 0;
    while i < OPS.len() {
        table[OPS[i] as usize] = true;
        i += 1;
    }
    table
}

// =============================================================================
// DEFAULT GEOMETRY
// =============================================================================

/// Default number of tapes in the soup (2^17).
pub const DEFAULT_SOUP_SIZE: usize = 131_072;

/// Default number of tokens per tape.
pub const DEFAULT_HALF_LEN: usize = 64;

/// Default number of pairs per epoch.
pub const DEFAULT_NPAIRS: usize = 65_536;

/// Upper bound for `half_len`. Heads are initialised from a single byte,
/// and birth epochs are 16-bit, so absurd tape lengths indicate a bad
/// metadata file rather than a real trace.
pub const MAX_HALF_LEN: usize = 65_536;

// =============================================================================
// PRESENTATION DEFAULTS
// =============================================================================

/// Character standing in for a data cell in a projected tape.
pub const PLACEHOLDER: char = '.';

/// Default step budget for an interactive replay.
pub const DEFAULT_REPLAY_STEPS: u32 = 200;

/// Default number of pairs listed by a top-pairs query.
pub const DEFAULT_TOP_PAIRS: usize = 10;

/// Number of search matches printed before the remainder is summarised.
pub const SEARCH_DISPLAY_LIMIT: usize = 20;

/// Number of ids listed in a tape's id breakdown.
pub const TOP_IDS_PER_TAPE: usize = 4;

// =============================================================================
// FILE NAMES
// =============================================================================

/// Metadata file overriding the default geometry.
pub const METADATA_FILE: &str = "metadata.txt";

/// Prefix shared by every per-epoch record file.
pub const EPOCH_FILE_PREFIX: &str = "epoch";

/// Extension shared by every per-epoch record file.
pub const EPOCH_FILE_SUFFIX: &str = ".bin";
