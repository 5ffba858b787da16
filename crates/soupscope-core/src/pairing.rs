//! # Pair Index
//!
//! Reverse lookup from a tape to the pair it took part in.
//!
//! The A half of the permutation is searched before the B half, and within
//! a half the lowest position wins, so a malformed permutation that lists a
//! tape twice still resolves deterministically.

use crate::store::Permutation;
use crate::{Epoch, Role, TapeIndex};
use serde::{Deserialize, Serialize};

/// Where a tape sat in one epoch's pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pairing {
    pub pair_index: usize,
    pub partner: TapeIndex,
    pub role: Role,
}

/// Sentinel for tapes that appear in neither half.
const UNPAIRED: u32 = u32::MAX;

/// Precomputed tape -> (pair, role) table for one epoch.
#[derive(Debug, Clone)]
pub struct PairIndex {
    epoch: Epoch,
    /// `slots[tape]` is `2 * pair + role_bit`, or [`UNPAIRED`].
    slots: Vec<u32>,
    a_half: Vec<u32>,
    b_half: Vec<u32>,
}

impl PairIndex {
    /// Build the reverse table. `soup_size` bounds the tape indices that can
    /// be looked up.
    #[must_use]
    pub fn build(permutation: &Permutation, soup_size: usize) -> Self {
        let mut slots = vec![UNPAIRED; soup_size];

        for (role_bit, half) in [permutation.a_half(), permutation.b_half()]
            .into_iter()
            .enumerate()
        {
            for (pair, &tape) in half.iter().enumerate() {
                if let Some(slot) = slots.get_mut(tape as usize)
                    && *slot == UNPAIRED
                {
                    *slot = (2 * pair + role_bit) as u32;
                }
            }
        }

        Self {
            epoch: permutation.epoch(),
            slots,
            a_half: permutation.a_half().to_vec(),
            b_half: permutation.b_half().to_vec(),
        }
    }

    /// Epoch of the underlying permutation.
    #[must_use]
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Number of pairs.
    #[must_use]
    pub fn npairs(&self) -> usize {
        self.a_half.len()
    }

    /// Resolve a tape to its pairing, or `None` if it did not take part.
    #[must_use]
    pub fn locate(&self, tape: TapeIndex) -> Option<Pairing> {
        let slot = *self.slots.get(tape)?;
        if slot == UNPAIRED {
            return None;
        }

        let pair_index = (slot / 2) as usize;
        let role = if slot % 2 == 0 { Role::A } else { Role::B };
        let partner = match role.opposite() {
            Role::A => self.a_half[pair_index],
            Role::B => self.b_half[pair_index],
        };

        Some(Pairing {
            pair_index,
            partner: partner as TapeIndex,
            role,
        })
    }

    /// `(A, B)` tapes of a pair.
    #[must_use]
    pub fn participants(&self, pair_index: usize) -> Option<(TapeIndex, TapeIndex)> {
        let a = *self.a_half.get(pair_index)?;
        let b = *self.b_half.get(pair_index)?;
        Some((a as TapeIndex, b as TapeIndex))
    }
}
