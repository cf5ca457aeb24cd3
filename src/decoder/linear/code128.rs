//! Code 128, code sets A, B and C with SHIFT, CODE switches and FNC1.
//!
//! Codewords are the symbol values in reading order: the start code, the
//! data symbols and the mod-103 check symbol. The stop pattern is structural
//! and not part of the sequence.

use super::scanline::Run;
use super::{CharRead, decode_runs, normalized, pattern_cost, total_width};
use crate::decoder::{DecodeAttempt, PartialDecode, Payload, SymbolDecoder};
use crate::error::NotThisSymbology;
use crate::models::Symbology;

/// Element widths of values 0..=105, one decimal digit per element
const PATTERN_DIGITS: [u32; 106] = [
    212222, 222122, 222221, 121223, 121322, 131222, 122213, 122312, 132212, 221213, 221312, 231212,
    112232, 122132, 122231, 113222, 123122, 123221, 223211, 221132, 221231, 213212, 223112, 312131,
    311222, 321122, 321221, 312212, 322112, 322211, 212123, 212321, 232121, 111323, 131123, 131321,
    112313, 132113, 132311, 211313, 231113, 231311, 112133, 112331, 132131, 113123, 113321, 133121,
    313121, 211331, 231131, 213113, 213311, 213131, 311123, 311321, 331121, 312113, 312311, 332111,
    314111, 221411, 431111, 111224, 111422, 121124, 121421, 141122, 141221, 112214, 112412, 122114,
    122411, 142112, 142211, 241211, 221114, 413111, 241112, 134111, 111242, 121142, 121241, 114212,
    124112, 124211, 411212, 421112, 421211, 212141, 214121, 412121, 111143, 111341, 131141, 114113,
    114311, 411113, 411311, 113141, 114131, 311141, 411131, 211412, 211214, 211232,
];

/// Expanded symbol patterns
pub(crate) const PATTERNS: [[u8; 6]; 106] = expand_patterns();

/// Stop pattern including the final bar
pub(crate) const STOP: [u8; 7] = [2, 3, 3, 1, 1, 1, 2];

pub(crate) const START_A: u16 = 103;
pub(crate) const START_B: u16 = 104;
pub(crate) const START_C: u16 = 105;
const SHIFT: u16 = 98;
pub(crate) const CODE_C: u16 = 99;
pub(crate) const CODE_B: u16 = 100;
const CODE_A: u16 = 101;
const FNC1: u16 = 102;

/// Longest symbol the reader will follow before giving up on a stop pattern
const MAX_SYMBOLS: usize = 80;
const GROUP_SEPARATOR: char = '\u{1d}';

const fn expand_patterns() -> [[u8; 6]; 106] {
    let mut out = [[0u8; 6]; 106];
    let mut i = 0;
    while i < 106 {
        let mut v = PATTERN_DIGITS[i];
        let mut k = 6;
        while k > 0 {
            k -= 1;
            out[i][k] = (v % 10) as u8;
            v /= 10;
        }
        i += 1;
    }
    out
}

/// Mod-103 check symbol over the start code and data values
pub fn checksum(values: &[u16]) -> u16 {
    let sum: u32 = values
        .iter()
        .enumerate()
        .map(|(i, &v)| v as u32 * (i as u32).max(1))
        .sum();
    (sum % 103) as u16
}

fn read_code128(runs: &[Run], i: usize) -> Option<(Vec<CharRead>, usize)> {
    if i + 6 + 7 >= runs.len() {
        return None;
    }
    let m = total_width(&runs[i..i + 6]) / 11.0;
    if !runs[i - 1].is_quiet(m) {
        return None;
    }
    let start = normalized(&runs[i..i + 6], 11.0);
    let start_read = CharRead::from_costs(
        (START_A..=START_C).map(|v| (v, pattern_cost(&start, &PATTERNS[v as usize]))),
    )?;
    if start_read.cost() > 1.4 {
        return None;
    }

    let mut chars = vec![start_read];
    let mut j = i + 6;
    while chars.len() <= MAX_SYMBOLS {
        if j + 7 < runs.len() {
            let stop = &runs[j..j + 7];
            let width = total_width(stop);
            if width >= 0.7 * 13.0 * m
                && width <= 1.3 * 13.0 * m
                && pattern_cost(&normalized(stop, 13.0), &STOP) <= 1.4
                && runs[j + 7].is_quiet(m)
            {
                return (chars.len() >= 3).then_some((chars, j + 7));
            }
        }
        if j + 6 >= runs.len() {
            return None;
        }
        let symbol = &runs[j..j + 6];
        let width = total_width(symbol);
        if width < 0.6 * 11.0 * m || width > 1.4 * 11.0 * m {
            return None;
        }
        let n = normalized(symbol, 11.0);
        chars.push(CharRead::from_costs(
            (0..=FNC1).map(|v| (v, pattern_cost(&n, &PATTERNS[v as usize]))),
        )?);
        j += 6;
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CodeSet {
    A,
    B,
    C,
}

/// Interpret data values (start code first, check symbol excluded)
fn interpret(values: &[u16]) -> Option<String> {
    let (&start, data) = values.split_first()?;
    let mut set = match start {
        START_A => CodeSet::A,
        START_B => CodeSet::B,
        START_C => CodeSet::C,
        _ => return None,
    };
    let mut out = String::new();
    let mut shifted = false;
    for (pos, &v) in data.iter().enumerate() {
        let active = match (shifted, set) {
            (true, CodeSet::A) => CodeSet::B,
            (true, CodeSet::B) => CodeSet::A,
            _ => set,
        };
        shifted = false;
        if v == FNC1 {
            if pos > 0 {
                out.push(GROUP_SEPARATOR);
            }
            continue;
        }
        match active {
            CodeSet::C => match v {
                0..=99 => {
                    out.push(char::from(b'0' + (v / 10) as u8));
                    out.push(char::from(b'0' + (v % 10) as u8));
                }
                CODE_B => set = CodeSet::B,
                CODE_A => set = CodeSet::A,
                _ => return None,
            },
            CodeSet::A | CodeSet::B => match v {
                0..=63 => out.push(char::from(32 + v as u8)),
                64..=95 if active == CodeSet::A => out.push(char::from(v as u8 - 64)),
                64..=95 => out.push(char::from(32 + v as u8)),
                SHIFT => shifted = true,
                CODE_C => set = CodeSet::C,
                CODE_B if active == CodeSet::A => set = CodeSet::B,
                CODE_A if active == CodeSet::B => set = CodeSet::A,
                // FNC2, FNC3 and FNC4 carry no characters here
                96 | 97 | CODE_B | CODE_A => {}
                _ => return None,
            },
        }
    }
    Some(out)
}

/// Code 128 decoder
#[derive(Debug)]
pub struct Code128Decoder;

impl SymbolDecoder for Code128Decoder {
    fn symbology(&self) -> Symbology {
        Symbology::Code128
    }

    fn try_decode(&self, attempt: &DecodeAttempt<'_, '_>) -> Result<PartialDecode, NotThisSymbology> {
        decode_runs(attempt, read_code128, 1)
    }

    fn is_valid(&self, _partial: &PartialDecode, codewords: &[u16]) -> bool {
        let Some((&check, values)) = codewords.split_last() else {
            return false;
        };
        values.len() >= 2
            && (START_A..=START_C).contains(&values[0])
            && values[1..].iter().all(|&v| v <= FNC1)
            && check < 103
            && checksum(values) == check
            && interpret(values).is_some()
    }

    fn assemble(&self, partial: &PartialDecode, codewords: &[u16]) -> Option<Payload> {
        if !self.is_valid(partial, codewords) {
            return None;
        }
        let text = interpret(&codewords[..codewords.len() - 1])?;
        Some(Payload::from_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::linear::scanline::tests::line_from_widths;

    fn widths(values: &[u16], m: f32) -> Vec<f32> {
        let mut w = vec![12.0 * m];
        for &v in values {
            w.extend(PATTERNS[v as usize].iter().map(|&x| x as f32 * m));
        }
        w.extend(STOP.iter().map(|&x| x as f32 * m));
        w.push(12.0 * m);
        w
    }

    fn with_check(mut values: Vec<u16>) -> Vec<u16> {
        let c = checksum(&values);
        values.push(c);
        values
    }

    #[test]
    fn test_patterns_sum_to_eleven() {
        for p in PATTERNS.iter() {
            assert_eq!(p.iter().map(|&x| x as u32).sum::<u32>(), 11);
        }
        assert_eq!(PATTERNS[START_C as usize], [2, 1, 1, 2, 3, 2]);
    }

    #[test]
    fn test_checksum_known_value() {
        // "PJJ123C" in set B
        let values = [104, 48, 42, 42, 17, 18, 19, 35];
        assert_eq!(checksum(&values), 55);
    }

    #[test]
    fn test_read_set_b_line() {
        let values = with_check(vec![START_B, 40, 69, 76, 76, 79]);
        let line = line_from_widths(&widths(&values, 2.0), false);
        let (chars, _) = read_code128(line.runs(), 1).unwrap();
        let read: Vec<u16> = chars.iter().map(|c| c.best()).collect();
        assert_eq!(read, values);
        assert_eq!(interpret(&read[..read.len() - 1]).unwrap(), "Hello");
    }

    #[test]
    fn test_set_switches() {
        // set C "1234", CODE B, "A", FNC1 mid-stream, SHIFT to A for a control char
        let values = [START_C, 12, 34, CODE_B, 33, FNC1, SHIFT, 64 + 9];
        assert_eq!(interpret(&values).unwrap(), "1234A\u{1d}\t");
        // leading FNC1 is dropped
        assert_eq!(interpret(&[START_B, FNC1, 16]).unwrap(), "0");
    }

    #[test]
    fn test_validity() {
        let dec = Code128Decoder;
        let good = with_check(vec![START_B, 40, 69]);
        let mut bad = good.clone();
        bad[1] = 41;
        let partial = crate::decoder::PartialDecode::new(
            Symbology::Code128,
            good.clone(),
            {
                let mut d = crate::decoder::DamageMap::new();
                for _ in &good {
                    d.push(false, 1.0, vec![]);
                }
                d
            },
            crate::decoder::Layout::Linear,
            crate::models::Rect::new(0, 0, 1, 1),
            crate::decoder::RegionQuality { contrast: 1.0, rotation_deg: 0.0 },
        );
        assert!(dec.is_valid(&partial, &good));
        assert!(!dec.is_valid(&partial, &bad));
        assert_eq!(dec.assemble(&partial, &good).unwrap().text, "He");
    }
}
