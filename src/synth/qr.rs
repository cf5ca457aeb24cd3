//! Reference QR encoder: one segment (numeric, alphanumeric or byte),
//! smallest fitting version, Reed-Solomon blocks, function patterns and the
//! lowest-penalty mask unless one is requested.

use crate::decoder::qr::format::{format_positions, format_word, version_positions, version_word};
use crate::decoder::qr::function_mask::FunctionMask;
use crate::decoder::qr::grid::{data_positions, place_codewords};
use crate::decoder::qr::payload::ALPHANUMERIC;
use crate::decoder::qr::tables::{
    BlockLayout, EcLevel, alignment_pattern_positions, char_count_bits, dimension,
};
use crate::models::BitMatrix;
use crate::reconstruct::reed_solomon::ReedSolomon;

/// An encoded symbol
#[derive(Debug, Clone)]
pub struct QrSymbol {
    /// Modules, set = dark
    pub modules: BitMatrix,
    /// Version 1..=40
    pub version: u8,
    /// Error correction level
    pub ec_level: EcLevel,
    /// Data mask applied
    pub mask: u8,
}

/// Encoder settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrOptions {
    /// Error correction level
    pub ec_level: EcLevel,
    /// Smallest version to use
    pub min_version: u8,
    /// Fixed mask, or `None` to pick by penalty
    pub mask: Option<u8>,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            ec_level: EcLevel::M,
            min_version: 1,
            mask: None,
        }
    }
}

struct BitWriter {
    bits: Vec<bool>,
}

impl BitWriter {
    fn push(&mut self, value: u32, n: usize) {
        for i in (0..n).rev() {
            self.bits.push((value >> i) & 1 == 1);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Numeric,
    Alphanumeric,
    Byte,
}

impl Mode {
    fn for_text(text: &str) -> Self {
        let bytes = text.as_bytes();
        if bytes.iter().all(u8::is_ascii_digit) {
            Mode::Numeric
        } else if bytes.iter().all(|b| ALPHANUMERIC.contains(b)) {
            Mode::Alphanumeric
        } else {
            Mode::Byte
        }
    }

    fn indicator(self) -> u8 {
        match self {
            Mode::Numeric => 0b0001,
            Mode::Alphanumeric => 0b0010,
            Mode::Byte => 0b0100,
        }
    }

    fn count(self, text: &str) -> usize {
        match self {
            Mode::Byte => text.len(),
            _ => text.chars().count(),
        }
    }

    fn data_bits(self, text: &str) -> usize {
        let n = self.count(text);
        match self {
            Mode::Numeric => 10 * (n / 3) + [0, 4, 7][n % 3],
            Mode::Alphanumeric => 11 * (n / 2) + 6 * (n % 2),
            Mode::Byte => 8 * n,
        }
    }
}

fn write_segment(w: &mut BitWriter, mode: Mode, text: &str, version: u8) {
    let bytes = text.as_bytes();
    w.push(mode.indicator() as u32, 4);
    w.push(mode.count(text) as u32, char_count_bits(mode.indicator(), version));
    match mode {
        Mode::Numeric => {
            for chunk in bytes.chunks(3) {
                let value = chunk.iter().fold(0u32, |acc, &b| acc * 10 + (b - b'0') as u32);
                w.push(value, [0, 4, 7, 10][chunk.len()]);
            }
        }
        Mode::Alphanumeric => {
            let index = |b: &u8| ALPHANUMERIC.iter().position(|a| a == b).unwrap_or(0) as u32;
            for chunk in bytes.chunks(2) {
                match chunk {
                    [a, b] => w.push(index(a) * 45 + index(b), 11),
                    [a] => w.push(index(a), 6),
                    _ => {}
                }
            }
        }
        Mode::Byte => {
            for &b in bytes {
                w.push(b as u32, 8);
            }
        }
    }
}

/// Data codewords for `text`: segment, terminator, padding
fn data_codewords(text: &str, version: u8, capacity: usize) -> Option<Vec<u8>> {
    let mode = Mode::for_text(text);
    let needed = 4 + char_count_bits(mode.indicator(), version) + mode.data_bits(text);
    if needed > capacity * 8 || mode.count(text) >= 1 << char_count_bits(mode.indicator(), version)
    {
        return None;
    }
    let mut w = BitWriter { bits: Vec::new() };
    write_segment(&mut w, mode, text, version);
    let terminator = (capacity * 8 - w.bits.len()).min(4);
    w.push(0, terminator);
    let align = (8 - w.bits.len() % 8) % 8;
    w.push(0, align);
    let mut out: Vec<u8> = w
        .bits
        .chunks(8)
        .map(|c| c.iter().fold(0u8, |acc, &b| (acc << 1) | u8::from(b)))
        .collect();
    for pad in [0xEC, 0x11].into_iter().cycle() {
        if out.len() >= capacity {
            break;
        }
        out.push(pad);
    }
    Some(out)
}

/// Interleaved data and check codewords
pub fn symbol_codewords(data: &[u8], layout: &BlockLayout) -> Vec<u8> {
    let rs = ReedSolomon::new(layout.ecc_per_block);
    let mut offset = 0;
    let blocks: Vec<Vec<u8>> = (0..layout.blocks)
        .map(|b| {
            let len = layout.data_len(b);
            let mut block = data[offset..offset + len].to_vec();
            offset += len;
            let ecc = rs.encode(&block);
            block.extend(ecc);
            block
        })
        .collect();
    layout.interleave(&blocks)
}

fn draw_function_patterns(m: &mut BitMatrix, version: u8) {
    let size = m.width();
    for (cx, cy) in [(3, 3), (size - 4, 3), (3, size - 4)] {
        for dy in -3isize..=3 {
            for dx in -3isize..=3 {
                let d = dx.abs().max(dy.abs());
                let (x, y) = ((cx as isize + dx) as usize, (cy as isize + dy) as usize);
                m.set(x, y, d != 2);
            }
        }
    }
    for i in 8..size - 8 {
        m.set(6, i, i % 2 == 0);
        m.set(i, 6, i % 2 == 0);
    }
    let centers = alignment_pattern_positions(version);
    let last = centers.len().saturating_sub(1);
    for (i, &cx) in centers.iter().enumerate() {
        for (j, &cy) in centers.iter().enumerate() {
            if (i == 0 && j == 0) || (i == 0 && j == last) || (i == last && j == 0) {
                continue;
            }
            for dy in -2isize..=2 {
                for dx in -2isize..=2 {
                    let d = dx.abs().max(dy.abs());
                    m.set((cx as isize + dx) as usize, (cy as isize + dy) as usize, d != 1);
                }
            }
        }
    }
    m.set(8, size - 8, true);
    if version >= 7 {
        let word = version_word(version);
        for i in 0..18 {
            for (x, y) in version_positions(size, i) {
                m.set(x, y, (word >> i) & 1 == 1);
            }
        }
    }
}

fn draw_format(m: &mut BitMatrix, ec_level: EcLevel, mask: u8) {
    let size = m.width();
    let word = format_word(ec_level, mask);
    for i in 0..15 {
        for (x, y) in format_positions(size, i) {
            m.set(x, y, (word >> i) & 1 == 1);
        }
    }
}

/// Mask penalty: runs, 2x2 blocks, finder-like sequences and dark balance
fn penalty(m: &BitMatrix) -> usize {
    let size = m.width();
    let mut score = 0;
    let line = |k: usize, horizontal: bool| -> Vec<bool> {
        (0..size)
            .map(|i| if horizontal { m.get(i, k) } else { m.get(k, i) })
            .collect()
    };
    const FINDER_LIKE: [[bool; 11]; 2] = [
        [true, false, true, true, true, false, true, false, false, false, false],
        [false, false, false, false, true, false, true, true, true, false, true],
    ];
    for horizontal in [true, false] {
        for k in 0..size {
            let cells = line(k, horizontal);
            let mut run = 1;
            for i in 1..=size {
                if i < size && cells[i] == cells[i - 1] {
                    run += 1;
                } else {
                    if run >= 5 {
                        score += run - 2;
                    }
                    run = 1;
                }
            }
            for window in cells.windows(11) {
                if FINDER_LIKE.iter().any(|p| window == p) {
                    score += 40;
                }
            }
        }
    }
    for y in 0..size - 1 {
        for x in 0..size - 1 {
            let c = m.get(x, y);
            if m.get(x + 1, y) == c && m.get(x, y + 1) == c && m.get(x + 1, y + 1) == c {
                score += 3;
            }
        }
    }
    let total = size * size;
    let dark = m.count_ones();
    let deviation = (dark * 20).abs_diff(total * 10);
    score + 10 * (deviation / total)
}

/// Encode `text` as a QR symbol; `None` when it does not fit in version 40
pub fn encode_qr(text: &str, options: QrOptions) -> Option<QrSymbol> {
    let (version, layout, data) = (options.min_version.max(1)..=40).find_map(|v| {
        let layout = BlockLayout::new(v, options.ec_level)?;
        let data = data_codewords(text, v, layout.data_codewords())?;
        Some((v, layout, data))
    })?;
    let codewords = symbol_codewords(&data, &layout);
    let size = dimension(version);
    let positions = data_positions(&FunctionMask::new(version));

    let build = |mask: u8| {
        let mut m = BitMatrix::new(size, size);
        draw_function_patterns(&mut m, version);
        draw_format(&mut m, options.ec_level, mask);
        place_codewords(&mut m, &positions, mask, &codewords);
        m
    };
    let (mask, modules) = match options.mask {
        Some(mask) => (mask & 7, build(mask & 7)),
        None => (0u8..8)
            .map(|mask| (mask, build(mask)))
            .min_by_key(|(mask, m)| (penalty(m), *mask))?,
    };
    Some(QrSymbol {
        modules,
        version,
        ec_level: options.ec_level,
        mask,
    })
}
