//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the analyzer:
//! - The packed 64-bit cell value (`Token`)
//! - Epoch and tape addressing (`Epoch`, `TapeIndex`)
//! - Pair roles (`Role`)
//! - Error types (`SoupError`)
//!
//! ## Result Conventions
//!
//! Absence is not an error. A snapshot that was never written is `Ok(None)`,
//! a tape that is not in a pairing is `None`, a search with no hits is an
//! empty `Vec`. `SoupError` is reserved for I/O failures, records whose
//! shape contradicts the configuration, and caller mistakes.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

use crate::primitives::IS_OP;

// =============================================================================
// ADDRESSING
// =============================================================================

/// Generation number. Epoch 0 is the initial soup; epoch `E > 0` is the
/// state after the E-th round of interactions.
pub type Epoch = u32;

/// Position of a tape within a soup snapshot.
pub type TapeIndex = usize;

// =============================================================================
// TOKEN
// =============================================================================

/// One cell of a tape.
///
/// Bit layout: `[id:32][birth_epoch:16][reserved:8][char:8]`.
/// Arithmetic instructions change only the char field; copies move the
/// whole token, so the id follows the value it was born with.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    Pod,
    Zeroable,
    Serialize,
    Deserialize,
)]
#[repr(transparent)]
pub struct Token(pub u64);

impl Token {
    /// Build a token from its fields.
    #[inline]
    #[must_use]
    pub const fn new(ch: u8, id: u32, birth_epoch: u16) -> Self {
        crate::codec::pack(ch, id, birth_epoch)
    }

    /// The instruction/data byte.
    #[inline]
    #[must_use]
    pub const fn ch(self) -> u8 {
        (self.0 & crate::codec::CHAR_MASK) as u8
    }

    /// The lineage identifier.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u32 {
        (self.0 >> crate::codec::ID_SHIFT) as u32
    }

    /// The epoch in which this value was last written from scratch.
    #[inline]
    #[must_use]
    pub const fn birth_epoch(self) -> u16 {
        ((self.0 >> crate::codec::EPOCH_SHIFT) & 0xFFFF) as u16
    }

    /// Same token with the char field replaced; id, birth epoch and the
    /// reserved byte are preserved.
    #[inline]
    #[must_use]
    pub const fn with_ch(self, ch: u8) -> Self {
        Self((self.0 & !crate::codec::CHAR_MASK) | ch as u64)
    }

    /// Whether the char field is one of the seven instructions.
    #[inline]
    #[must_use]
    pub const fn is_op(self) -> bool {
        IS_OP[self.ch() as usize]
    }
}

// =============================================================================
// PAIR ROLE
// =============================================================================

/// Which half of the combined tape a participant occupied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// First half: cells `[0, HALF_LEN)`, holds the head bytes and IP start.
    A,
    /// Second half: cells `[HALF_LEN, 2 * HALF_LEN)`.
    B,
}

impl Role {
    /// The other participant's role.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Role::A => Role::B,
            Role::B => Role::A,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::A => f.write_str("A"),
            Role::B => f.write_str("B"),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur while analysing a trace.
///
/// - A missing snapshot is NOT an error (see module docs)
/// - No variant is fatal to a session; callers may continue with other epochs
#[derive(Debug, Error)]
pub enum SoupError {
    /// An I/O operation failed for a reason other than the file being absent.
    #[error("I/O error: {0}")]
    Io(String),

    /// A binary record's size contradicts the configured geometry.
    #[error("Malformed record {path:?}: expected {expected_bytes} bytes, found {actual_bytes}")]
    MalformedRecord {
        path: PathBuf,
        expected_bytes: usize,
        actual_bytes: usize,
    },

    /// A permutation entry points outside the soup.
    #[error(
        "Permutation for epoch {epoch} has index {index} at position {position} (soup size {soup_size})"
    )]
    IndexOutOfRange {
        epoch: Epoch,
        position: usize,
        index: u32,
        soup_size: usize,
    },

    /// The caller asked for a tape that does not exist.
    #[error("Tape {tape} out of range (soup size {soup_size})")]
    TapeOutOfRange { tape: TapeIndex, soup_size: usize },

    /// The configuration describes an impossible geometry.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A run-length log would have a hole at this epoch.
    #[error("Step record missing for epoch {0}; run-length log needs a contiguous range")]
    RunlogGap(Epoch),
}

// =============================================================================
// TESTS
// =============================================================================
