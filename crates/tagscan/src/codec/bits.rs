// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Boolean overlay on 16-bit words.

use crate::error::{Error, Result};

/// Number of addressable bits in a word tag.
pub const WORD_BITS: u8 = 16;

fn check_bit(bit: u8) -> Result<()> {
    if bit >= WORD_BITS {
        return Err(Error::IndexOutOfRange {
            index: usize::from(bit),
            max: usize::from(WORD_BITS - 1),
        });
    }
    Ok(())
}

/// Read bit `bit` (0 = least significant) of a little-endian word.
pub fn get_bit(word: i16, bit: u8) -> Result<bool> {
    check_bit(bit)?;
    let bytes = word.to_le_bytes();
    let byte = bytes[usize::from(bit / 8)];
    Ok(byte & (1 << (bit % 8)) != 0)
}

/// Return `word` with bit `bit` set to `value`; other bits are untouched.
pub fn set_bit(word: i16, bit: u8, value: bool) -> Result<i16> {
    check_bit(bit)?;
    let mut bytes = word.to_le_bytes();
    let idx = usize::from(bit / 8);
    let mask = 1u8 << (bit % 8);
    if value {
        bytes[idx] |= mask;
    } else {
        bytes[idx] &= !mask;
    }
    Ok(i16::from_le_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_bit_examples() {
        assert!(get_bit(1, 0).unwrap());
        assert!(!get_bit(1, 1).unwrap());
        assert!(get_bit(0x0100, 8).unwrap());
        assert!(get_bit(i16::MIN, 15).unwrap());
        assert!(!get_bit(i16::MAX, 15).unwrap());
    }

    #[test]
    fn test_set_bit_high_byte() {
        assert_eq!(set_bit(0, 15, true).unwrap(), i16::MIN);
        assert_eq!(set_bit(-1, 0, false).unwrap(), -2);
    }

    #[test]
    fn test_bit_out_of_range() {
        assert!(matches!(
            get_bit(0, 16),
            Err(Error::IndexOutOfRange { index: 16, max: 15 })
        ));
        assert!(matches!(
            set_bit(0, 200, true),
            Err(Error::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_set_then_get_preserves_other_bits() {
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        for _ in 0..2000 {
            let word = rng.i16(..);
            let bit = rng.u8(0..16);
            let value = rng.bool();

            let updated = set_bit(word, bit, value).unwrap();
            assert_eq!(get_bit(updated, bit).unwrap(), value);

            let mask = !(1u16 << bit);
            assert_eq!(
                (updated as u16) & mask,
                (word as u16) & mask,
                "word={:#06x} bit={}",
                word,
                bit
            );
        }
    }
}
