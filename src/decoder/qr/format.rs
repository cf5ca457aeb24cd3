//! Format and version information: BCH encoding, nearest-codeword decoding,
//! module positions and the eight data masks.

use super::tables::EcLevel;
use crate::models::BitMatrix;

const FORMAT_GENERATOR: u32 = 0x537;
const FORMAT_XOR: u32 = 0x5412;
const VERSION_GENERATOR: u32 = 0x1F25;
/// Both BCH codes have minimum distance 7 or more
const MAX_BIT_ERRORS: u32 = 3;

/// EC level and mask read from the format area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatInfo {
    /// Error correction level
    pub ec_level: EcLevel,
    /// Data mask 0..=7
    pub mask: u8,
}

fn bch_remainder(value: u32, data_bits: u32, generator: u32) -> u32 {
    let degree = 31 - generator.leading_zeros();
    let mut rem = value << degree;
    for bit in (degree..degree + data_bits).rev() {
        if rem & (1 << bit) != 0 {
            rem ^= generator << (bit - degree);
        }
    }
    rem
}

/// 15-bit masked format word for a level and mask
pub fn format_word(ec_level: EcLevel, mask: u8) -> u16 {
    let data = ((ec_level.format_bits() as u32) << 3) | (mask as u32 & 7);
    (((data << 10) | bch_remainder(data, 5, FORMAT_GENERATOR)) ^ FORMAT_XOR) as u16
}

/// 18-bit version word (versions 7 and up)
pub fn version_word(version: u8) -> u32 {
    let v = version as u32;
    (v << 12) | bch_remainder(v, 6, VERSION_GENERATOR)
}

/// Nearest valid format word, with its Hamming distance
pub fn decode_format_word(word: u16) -> Option<(FormatInfo, u32)> {
    let (data, distance) = (0u8..32)
        .map(|d| {
            let candidate = format_word(EcLevel::from_format_bits(d >> 3), d & 7);
            (d, (candidate ^ word).count_ones())
        })
        .min_by_key(|&(d, dist)| (dist, d))?;
    (distance <= MAX_BIT_ERRORS).then_some((
        FormatInfo {
            ec_level: EcLevel::from_format_bits(data >> 3),
            mask: data & 7,
        },
        distance,
    ))
}

/// Nearest valid version word, with its Hamming distance
pub fn decode_version_word(word: u32) -> Option<(u8, u32)> {
    let (version, distance) = (7u8..=40)
        .map(|v| (v, (version_word(v) ^ word).count_ones()))
        .min_by_key(|&(v, dist)| (dist, v))?;
    (distance <= MAX_BIT_ERRORS).then_some((version, distance))
}

/// Module `(x, y)` of format bit `i` (bit 0 = least significant) for both copies
pub fn format_positions(size: usize, i: usize) -> [(usize, usize); 2] {
    let first = match i {
        0..=5 => (8, i),
        6 => (8, 7),
        7 => (8, 8),
        8 => (7, 8),
        _ => (14 - i, 8),
    };
    let second = if i < 8 {
        (size - 1 - i, 8)
    } else {
        (8, size - 15 + i)
    };
    [first, second]
}

/// Module `(x, y)` of version bit `i` for both copies
pub fn version_positions(size: usize, i: usize) -> [(usize, usize); 2] {
    let (a, b) = (size - 11 + i % 3, i / 3);
    [(a, b), (b, a)]
}

/// Read the format information, preferring the copy closer to a valid word
pub fn read_format(modules: &BitMatrix) -> Option<FormatInfo> {
    let size = modules.width();
    let mut words = [0u16; 2];
    for i in 0..15 {
        for (copy, &(x, y)) in format_positions(size, i).iter().enumerate() {
            if modules.get(x, y) {
                words[copy] |= 1 << i;
            }
        }
    }
    words
        .iter()
        .filter_map(|&w| decode_format_word(w))
        .min_by_key(|&(_, dist)| dist)
        .map(|(info, _)| info)
}

/// Read the version information of a symbol of version 7 or more
pub fn read_version(modules: &BitMatrix) -> Option<u8> {
    let size = modules.width();
    let mut words = [0u32; 2];
    for i in 0..18 {
        for (copy, &(x, y)) in version_positions(size, i).iter().enumerate() {
            if modules.get(x, y) {
                words[copy] |= 1 << i;
            }
        }
    }
    words
        .iter()
        .filter_map(|&w| decode_version_word(w))
        .min_by_key(|&(_, dist)| dist)
        .map(|(v, _)| v)
}

/// Whether the data mask inverts module `(x, y)` (x = column, y = row)
pub fn mask_bit(mask: u8, x: usize, y: usize) -> bool {
    match mask {
        0 => (x + y) % 2 == 0,
        1 => y % 2 == 0,
        2 => x % 3 == 0,
        3 => (x + y) % 3 == 0,
        4 => (x / 3 + y / 2) % 2 == 0,
        5 => x * y % 2 + x * y % 3 == 0,
        6 => (x * y % 2 + x * y % 3) % 2 == 0,
        _ => ((x + y) % 2 + x * y % 3) % 2 == 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_format_words() {
        assert_eq!(format_word(EcLevel::M, 0), 0x5412);
        assert_eq!(format_word(EcLevel::L, 0), 0x77C4);
        assert_eq!(format_word(EcLevel::H, 0), 0x1689);
        assert_eq!(format_word(EcLevel::Q, 0), 0x355F);
    }

    #[test]
    fn test_known_version_word() {
        assert_eq!(version_word(7), 0x07C94);
        assert_eq!(version_word(40), 0x28C69);
    }

    #[test]
    fn test_format_corrects_three_errors() {
        let word = format_word(EcLevel::Q, 5);
        let damaged = word ^ 0b100_0000_0100_0001;
        let (info, dist) = decode_format_word(damaged).unwrap();
        assert_eq!(info, FormatInfo { ec_level: EcLevel::Q, mask: 5 });
        assert_eq!(dist, 3);
    }

    #[test]
    fn test_version_roundtrip_with_errors() {
        for v in 7..=40u8 {
            let damaged = version_word(v) ^ 0b101;
            assert_eq!(decode_version_word(damaged), Some((v, 2)));
        }
    }

    #[test]
    fn test_read_format_from_modules() {
        let size = 25;
        let word = format_word(EcLevel::H, 3);
        let mut m = BitMatrix::new(size, size);
        for i in 0..15 {
            // only the second copy is written; the first reads as all zeros
            let [_, (x, y)] = format_positions(size, i);
            m.set(x, y, word >> i & 1 == 1);
        }
        let info = read_format(&m).unwrap();
        assert_eq!(info.ec_level, EcLevel::H);
        assert_eq!(info.mask, 3);
    }

    #[test]
    fn test_mask_zero_checkerboard() {
        assert!(mask_bit(0, 0, 0));
        assert!(!mask_bit(0, 1, 0));
        assert!(mask_bit(1, 5, 0));
        assert!(!mask_bit(2, 1, 7));
    }
}
