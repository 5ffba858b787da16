//! # Token Codec
//!
//! Pack and unpack the 64-bit cell representation.
//!
//! ```text
//!  63            32 31          16 15      8 7        0
//! ┌────────────────┬──────────────┬─────────┬──────────┐
//! │       id       │ birth_epoch  │ reserved│   char   │
//! └────────────────┴──────────────┴─────────┴──────────┘
//! ```
//!
//! Both directions are total and allocation-free.

use crate::Token;

/// Mask selecting the char field.
pub const CHAR_MASK: u64 = 0xFF;

/// Bit offset of the birth epoch field.
pub const EPOCH_SHIFT: u32 = 16;

/// Bit offset of the id field.
pub const ID_SHIFT: u32 = 32;

/// Pack the three fields into a token. The reserved byte is zero.
#[inline]
#[must_use]
pub const fn pack(ch: u8, id: u32, birth_epoch: u16) -> Token {
    Token(((id as u64) << ID_SHIFT) | ((birth_epoch as u64) << EPOCH_SHIFT) | ch as u64)
}

/// Split a token into `(char, id, birth_epoch)`.
#[inline]
#[must_use]
pub const fn unpack(token: Token) -> (u8, u32, u16) {
    (token.ch(), token.id(), token.birth_epoch())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_positions() {
        let token = pack(0xAB, 0x1234_5678, 0x9ABC);
        assert_eq!(token.0, 0x1234_5678_9ABC_00AB);
    }

    #[test]
    fn extremes_roundtrip() {
        for (ch, id, epoch) in [(0, 0, 0), (255, u32::MAX, u16::MAX), (b']', 1, 65535)] {
            assert_eq!(unpack(pack(ch, id, epoch)), (ch, id, epoch));
        }
    }

    #[test]
    fn unpack_ignores_reserved_byte() {
        let token = Token(pack(9, 10, 11).0 | 0xFF00);
        assert_eq!(unpack(token), (9, 10, 11));
    }
}
