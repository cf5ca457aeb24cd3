//! Interleaved 2 of 5. Digits come in pairs: the first digit is carried by
//! five bars, the second by the five spaces between them.

use super::scanline::Run;
use super::{CharRead, decode_runs, min_lines_for};
use crate::decoder::{DecodeAttempt, PartialDecode, Payload, SymbolDecoder};
use crate::error::NotThisSymbology;
use crate::models::Symbology;

/// Wide elements per digit, 1 = wide
pub(crate) const DIGITS: [[u8; 5]; 10] = [
    [0, 0, 1, 1, 0],
    [1, 0, 0, 0, 1],
    [0, 1, 0, 0, 1],
    [1, 1, 0, 0, 0],
    [0, 0, 1, 0, 1],
    [1, 0, 1, 0, 0],
    [0, 1, 1, 0, 0],
    [0, 0, 0, 1, 1],
    [1, 0, 0, 1, 0],
    [0, 1, 0, 1, 0],
];

const MIN_WIDE_RATIO: f32 = 1.8;
const MAX_PAIRS: usize = 40;

fn read_digit(widths: [f32; 5], narrow_ref: f32) -> Option<CharRead> {
    let mut sorted = widths;
    sorted.sort_by(f32::total_cmp);
    let narrow = sorted[..3].iter().sum::<f32>() / 3.0;
    let wide = sorted[3..].iter().sum::<f32>() / 2.0;
    if wide < MIN_WIDE_RATIO * narrow || narrow < 0.5 * narrow_ref || narrow > 2.0 * narrow_ref {
        return None;
    }
    let levels = widths.map(|w| (w - narrow) / (wide - narrow));
    let read = CharRead::from_costs(DIGITS.iter().enumerate().map(|(d, pattern)| {
        let cost = levels
            .iter()
            .zip(pattern)
            .map(|(x, &p)| (x - p as f32).abs())
            .sum();
        (d as u16, cost)
    }))?;
    (read.cost() <= 3.0).then_some(read)
}

fn is_end(runs: &[Run], j: usize, narrow: f32) -> bool {
    if j + 3 >= runs.len() {
        return false;
    }
    let (bar, space, last) = (runs[j].width, runs[j + 1].width, runs[j + 2].width);
    bar >= MIN_WIDE_RATIO * narrow
        && bar <= 4.0 * narrow
        && space <= 1.5 * narrow
        && last <= 1.5 * narrow
        && runs[j + 3].is_quiet(narrow)
}

fn read_itf(runs: &[Run], i: usize) -> Option<(Vec<CharRead>, usize)> {
    if i + 4 + 10 + 3 >= runs.len() {
        return None;
    }
    let start = &runs[i..i + 4];
    let narrow = start.iter().map(|r| r.width).sum::<f32>() / 4.0;
    if start
        .iter()
        .any(|r| r.width < 0.6 * narrow || r.width > 1.4 * narrow)
        || !runs[i - 1].is_quiet(narrow)
    {
        return None;
    }

    let mut chars = Vec::new();
    let mut j = i + 4;
    while chars.len() < 2 * MAX_PAIRS {
        if is_end(runs, j, narrow) {
            return (chars.len() >= 4).then_some((chars, j + 3));
        }
        if j + 10 > runs.len() {
            return None;
        }
        let pair = &runs[j..j + 10];
        let bars = [0, 2, 4, 6, 8].map(|k| pair[k].width);
        let spaces = [1, 3, 5, 7, 9].map(|k| pair[k].width);
        chars.push(read_digit(bars, narrow)?);
        chars.push(read_digit(spaces, narrow)?);
        j += 10;
    }
    None
}

/// Interleaved 2 of 5 decoder
#[derive(Debug)]
pub struct ItfDecoder;

impl SymbolDecoder for ItfDecoder {
    fn symbology(&self) -> Symbology {
        Symbology::Itf
    }

    fn try_decode(&self, attempt: &DecodeAttempt<'_, '_>) -> Result<PartialDecode, NotThisSymbology> {
        decode_runs(attempt, read_itf, min_lines_for(Symbology::Itf))
    }

    fn is_valid(&self, _partial: &PartialDecode, codewords: &[u16]) -> bool {
        codewords.len() >= 4 && codewords.len() % 2 == 0 && codewords.iter().all(|&c| c < 10)
    }

    fn assemble(&self, partial: &PartialDecode, codewords: &[u16]) -> Option<Payload> {
        if !self.is_valid(partial, codewords) {
            return None;
        }
        let text = codewords
            .iter()
            .map(|&c| char::from(b'0' + c as u8))
            .collect();
        Some(Payload::from_text(text))
    }
}
