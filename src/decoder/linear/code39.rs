//! Code 39: nine elements per character, three of them wide, characters
//! separated by a narrow gap and framed by `*`.
//!
//! There is no check character, so a symbol is accepted only when at least
//! two scanlines read it and every character has exactly three wide elements.

use super::scanline::Run;
use super::{CharRead, decode_runs, total_width};
use crate::decoder::{DecodeAttempt, PartialDecode, Payload, SymbolDecoder};
use crate::error::NotThisSymbology;
use crate::models::Symbology;

/// Character set in value order
pub(crate) const ALPHABET: &[u8; 43] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ-. $/+%";

/// Wide-element bitmaps, first element in the most significant of 9 bits
pub(crate) const ENCODINGS: [u16; 43] = [
    0x034, 0x121, 0x061, 0x160, 0x031, 0x130, 0x070, 0x025, 0x124, 0x064, 0x109, 0x049, 0x148,
    0x019, 0x118, 0x058, 0x00D, 0x10C, 0x04C, 0x01C, 0x103, 0x043, 0x142, 0x013, 0x112, 0x052,
    0x007, 0x106, 0x046, 0x016, 0x181, 0x0C1, 0x1C0, 0x091, 0x190, 0x0D0, 0x085, 0x184, 0x0C4,
    0x0A8, 0x0A2, 0x08A, 0x02A,
];

/// Start/stop character `*`
pub(crate) const ASTERISK: u16 = 0x094;

const ASTERISK_VALUE: u16 = 43;
const MIN_WIDE_RATIO: f32 = 1.8;
const MAX_CHARS: usize = 60;

/// Position of each element between narrow (0) and wide (1), or `None` when
/// the character has no usable wide/narrow contrast
fn element_levels(runs: &[Run]) -> Option<(Vec<f32>, f32)> {
    let mut sorted: Vec<f32> = runs.iter().map(|r| r.width).collect();
    sorted.sort_by(f32::total_cmp);
    let narrow = sorted[..6].iter().sum::<f32>() / 6.0;
    let wide = sorted[6..].iter().sum::<f32>() / 3.0;
    if narrow <= 0.0 || wide < MIN_WIDE_RATIO * narrow {
        return None;
    }
    let levels = runs
        .iter()
        .map(|r| (r.width - narrow) / (wide - narrow))
        .collect();
    Some((levels, narrow))
}

fn bitmap_cost(levels: &[f32], bitmap: u16) -> f32 {
    levels
        .iter()
        .enumerate()
        .map(|(k, &x)| {
            let wide = (bitmap >> (8 - k)) & 1 == 1;
            (x - if wide { 1.0 } else { 0.0 }).abs()
        })
        .sum()
}

fn read_char(runs: &[Run]) -> Option<(CharRead, f32, f32)> {
    let (levels, narrow) = element_levels(runs)?;
    let star = bitmap_cost(&levels, ASTERISK);
    let read = CharRead::from_costs(
        ENCODINGS
            .iter()
            .enumerate()
            .map(|(v, &bitmap)| (v as u16, bitmap_cost(&levels, bitmap)))
            .chain(std::iter::once((ASTERISK_VALUE, star))),
    )?;
    Some((read, star, narrow))
}

fn read_code39(runs: &[Run], i: usize) -> Option<(Vec<CharRead>, usize)> {
    if i + 10 >= runs.len() {
        return None;
    }
    let (_, star, narrow) = read_char(&runs[i..i + 9])?;
    if star > 1.0 || !runs[i - 1].is_quiet(narrow) {
        return None;
    }
    let char_width = total_width(&runs[i..i + 9]);

    let mut chars = Vec::new();
    let mut j = i + 9;
    while chars.len() <= MAX_CHARS {
        // inter-character gap, then the next character
        let gap = runs.get(j)?;
        if gap.width > 3.0 * narrow || j + 10 >= runs.len() {
            return None;
        }
        let body = &runs[j + 1..j + 10];
        let width = total_width(body);
        if width < 0.7 * char_width || width > 1.3 * char_width {
            return None;
        }
        let (read, star, _) = read_char(body)?;
        if star <= 1.0 && read.best() == ASTERISK_VALUE {
            let after = &runs[j + 10];
            return (!chars.is_empty() && after.is_quiet(narrow)).then_some((chars, j + 10));
        }
        if read.cost() > 3.0 {
            return None;
        }
        chars.push(read);
        j += 10;
    }
    None
}

/// Code 39 decoder
#[derive(Debug)]
pub struct Code39Decoder;

impl SymbolDecoder for Code39Decoder {
    fn symbology(&self) -> Symbology {
        Symbology::Code39
    }

    fn try_decode(&self, attempt: &DecodeAttempt<'_, '_>) -> Result<PartialDecode, NotThisSymbology> {
        decode_runs(attempt, read_code39, super::min_lines_for(Symbology::Code39))
    }

    fn is_valid(&self, _partial: &PartialDecode, codewords: &[u16]) -> bool {
        !codewords.is_empty() && codewords.iter().all(|&c| (c as usize) < ALPHABET.len())
    }

    fn assemble(&self, partial: &PartialDecode, codewords: &[u16]) -> Option<Payload> {
        if !self.is_valid(partial, codewords) {
            return None;
        }
        let text = codewords
            .iter()
            .map(|&c| char::from(ALPHABET[c as usize]))
            .collect();
        Some(Payload::from_text(text))
    }
}
