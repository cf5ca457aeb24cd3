//! QR capacity tables and symbol geometry per version.

use serde::{Deserialize, Serialize};

/// Error correction level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EcLevel {
    /// Recovers about 7% of codewords
    L,
    /// About 15%
    M,
    /// About 25%
    Q,
    /// About 30%
    H,
}

impl EcLevel {
    /// Two-bit value stored in the format information
    pub fn format_bits(self) -> u8 {
        match self {
            EcLevel::L => 0b01,
            EcLevel::M => 0b00,
            EcLevel::Q => 0b11,
            EcLevel::H => 0b10,
        }
    }

    /// Inverse of [`EcLevel::format_bits`]
    pub fn from_format_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b01 => EcLevel::L,
            0b00 => EcLevel::M,
            0b11 => EcLevel::Q,
            _ => EcLevel::H,
        }
    }

    fn index(self) -> usize {
        match self {
            EcLevel::L => 0,
            EcLevel::M => 1,
            EcLevel::Q => 2,
            EcLevel::H => 3,
        }
    }
}

// Index: [ec_level][version], from the Model 2 tables
const ECC_CODEWORDS_PER_BLOCK: [[u8; 41]; 4] = [
    [
        0, 7, 10, 15, 20, 26, 18, 20, 24, 30, 18, 20, 24, 26, 30, 22, 24, 28, 30, 28, 28, 28, 28,
        30, 30, 26, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
    [
        0, 10, 16, 26, 18, 24, 16, 18, 22, 22, 26, 30, 22, 22, 24, 24, 28, 28, 26, 26, 26, 26, 28,
        28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28, 28,
    ],
    [
        0, 13, 22, 18, 26, 18, 24, 18, 22, 20, 24, 28, 26, 24, 20, 30, 24, 28, 28, 26, 30, 28, 30,
        30, 30, 30, 28, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
    [
        0, 17, 28, 22, 16, 22, 28, 26, 26, 24, 28, 24, 28, 22, 24, 24, 30, 28, 28, 26, 28, 30, 24,
        30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    ],
];

const NUM_ERROR_CORRECTION_BLOCKS: [[u8; 41]; 4] = [
    [
        0, 1, 1, 1, 1, 1, 2, 2, 2, 2, 4, 4, 4, 4, 4, 6, 6, 6, 6, 7, 8, 8, 9, 9, 10, 12, 12, 12,
        13, 14, 15, 16, 17, 18, 19, 19, 20, 21, 22, 24, 25,
    ],
    [
        0, 1, 1, 1, 2, 2, 4, 4, 4, 5, 5, 5, 8, 9, 9, 10, 10, 11, 13, 14, 16, 17, 17, 18, 20, 21,
        23, 25, 26, 28, 29, 31, 33, 35, 37, 38, 40, 43, 45, 47, 49,
    ],
    [
        0, 1, 1, 2, 2, 4, 4, 6, 6, 8, 8, 8, 10, 12, 16, 12, 17, 16, 18, 21, 20, 23, 23, 25, 27,
        29, 34, 34, 35, 38, 40, 43, 45, 48, 51, 53, 56, 59, 62, 65, 68,
    ],
    [
        0, 1, 1, 2, 4, 4, 4, 5, 6, 8, 8, 11, 11, 16, 16, 18, 16, 19, 21, 25, 25, 25, 34, 30, 32,
        35, 37, 40, 42, 45, 48, 51, 54, 57, 60, 63, 66, 70, 74, 77, 81,
    ],
];

/// Side length in modules
pub fn dimension(version: u8) -> usize {
    17 + 4 * version as usize
}

/// Version implied by a side length
pub fn version_for_dimension(dimension: usize) -> Option<u8> {
    if dimension < 21 || (dimension - 17) % 4 != 0 {
        return None;
    }
    let v = (dimension - 17) / 4;
    (1..=40).contains(&v).then_some(v as u8)
}

/// Modules available for data and error correction, remainder bits included
pub fn raw_data_modules(version: u8) -> usize {
    let v = version as usize;
    let mut result = (16 * v + 128) * v + 64;
    if v >= 2 {
        let align = v / 7 + 2;
        result -= (25 * align - 10) * align - 55;
        if v >= 7 {
            result -= 36;
        }
    }
    result
}

/// How the codewords of one symbol split into Reed-Solomon blocks.
///
/// Short blocks come first; long blocks carry one extra data codeword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockLayout {
    /// Number of blocks
    pub blocks: usize,
    /// Error correction codewords per block
    pub ecc_per_block: usize,
    /// All codewords in the symbol
    pub total_codewords: usize,
    /// Blocks with the shorter data length
    pub short_blocks: usize,
    /// Data codewords in a short block
    pub short_data_len: usize,
}

impl BlockLayout {
    /// Layout for a version and level
    pub fn new(version: u8, ec: EcLevel) -> Option<Self> {
        if !(1..=40).contains(&version) {
            return None;
        }
        let ecc_per_block = ECC_CODEWORDS_PER_BLOCK[ec.index()][version as usize] as usize;
        let blocks = NUM_ERROR_CORRECTION_BLOCKS[ec.index()][version as usize] as usize;
        let total_codewords = raw_data_modules(version) / 8;
        let short_blocks = blocks - total_codewords % blocks;
        let short_len = total_codewords / blocks;
        Some(Self {
            blocks,
            ecc_per_block,
            total_codewords,
            short_blocks,
            short_data_len: short_len - ecc_per_block,
        })
    }

    /// Data codewords over all blocks
    pub fn data_codewords(&self) -> usize {
        self.total_codewords - self.blocks * self.ecc_per_block
    }

    /// Total error correction codewords
    pub fn ecc_codewords(&self) -> usize {
        self.blocks * self.ecc_per_block
    }

    /// Data length of block `b`
    pub fn data_len(&self, b: usize) -> usize {
        self.short_data_len + usize::from(b >= self.short_blocks)
    }

    /// Block index and offset within the block of every interleaved codeword
    pub fn interleave_order(&self) -> Vec<(usize, usize)> {
        let mut order = Vec::with_capacity(self.total_codewords);
        for i in 0..=self.short_data_len {
            for b in 0..self.blocks {
                if i < self.data_len(b) {
                    order.push((b, i));
                }
            }
        }
        for i in 0..self.ecc_per_block {
            for b in 0..self.blocks {
                order.push((b, self.data_len(b) + i));
            }
        }
        order
    }

    /// Split interleaved codewords into blocks (data then ecc per block)
    pub fn deinterleave(&self, codewords: &[u8]) -> Option<Vec<Vec<u8>>> {
        if codewords.len() < self.total_codewords {
            return None;
        }
        let mut blocks: Vec<Vec<u8>> = (0..self.blocks)
            .map(|b| vec![0u8; self.data_len(b) + self.ecc_per_block])
            .collect();
        for (&(b, i), &c) in self.interleave_order().iter().zip(codewords) {
            blocks[b][i] = c;
        }
        Some(blocks)
    }

    /// Inverse of [`BlockLayout::deinterleave`]
    pub fn interleave(&self, blocks: &[Vec<u8>]) -> Vec<u8> {
        self.interleave_order()
            .into_iter()
            .map(|(b, i)| blocks[b][i])
            .collect()
    }
}

/// Alignment pattern centers along one axis (empty for version 1)
pub fn alignment_pattern_positions(version: u8) -> Vec<usize> {
    if version < 2 {
        return Vec::new();
    }
    let v = version as usize;
    let count = v / 7 + 2;
    let step = if v == 32 {
        26
    } else {
        (v * 8 + count * 3 + 5) / (count * 4 - 4) * 2
    };
    let mut positions = vec![6usize];
    let mut pos = dimension(version) - 7;
    let mut tail = Vec::with_capacity(count - 1);
    for _ in 1..count {
        tail.push(pos);
        pos -= step;
    }
    positions.extend(tail.into_iter().rev());
    positions
}

/// Width of the character count field for a mode indicator
pub fn char_count_bits(mode: u8, version: u8) -> usize {
    let band = match version {
        0..=9 => 0,
        10..=26 => 1,
        _ => 2,
    };
    match mode {
        0b0001 => [10, 12, 14][band],
        0b0010 => [9, 11, 13][band],
        0b0100 => [8, 16, 16][band],
        0b1000 => [8, 10, 12][band],
        _ => 0,
    }
}
