//! EAN-13, UPC-A and EAN-8.
//!
//! UPC-A is an EAN-13 whose leading digit is 0, so both share one reader.
//! Left-half characters carry their parity in the codeword: `digit` for odd
//! (L) parity and `digit + 10` for even (G) parity. The leading EAN-13 digit
//! is not a codeword; it is implied by the parity pattern.

use super::scanline::Run;
use super::{CharRead, all_within, decode_runs, normalized, pattern_cost, total_width};
use crate::decoder::{DecodeAttempt, PartialDecode, Payload, SymbolDecoder};
use crate::error::NotThisSymbology;
use crate::models::Symbology;

/// Odd-parity (L) element widths, space-bar-space-bar. R patterns have the
/// same widths starting with a bar; G patterns are L reversed.
pub(crate) const L_PATTERNS: [[u8; 4]; 10] = [
    [3, 2, 1, 1],
    [2, 2, 2, 1],
    [2, 1, 2, 2],
    [1, 4, 1, 1],
    [1, 1, 3, 2],
    [1, 2, 3, 1],
    [1, 1, 1, 4],
    [1, 3, 1, 2],
    [1, 2, 1, 3],
    [3, 1, 1, 2],
];

/// Left-half parity per leading digit, bit 5 = first character, 1 = G
pub(crate) const PARITY_MASKS: [u8; 10] = [
    0b000000, 0b001011, 0b001101, 0b001110, 0b010011, 0b011001, 0b011100, 0b010101, 0b010110,
    0b011010,
];

/// Character width error, in modules, tolerated before reads are penalized
const WIDTH_SLACK: f32 = 0.5;
/// Cost added per module of width error beyond the slack
const WIDTH_PENALTY: f32 = 3.0;

const EAN13_RUNS: usize = 59;
const EAN8_RUNS: usize = 43;

pub(crate) fn g_pattern(digit: usize) -> [u8; 4] {
    let l = L_PATTERNS[digit];
    [l[3], l[2], l[1], l[0]]
}

/// Mod-10 check digit over `data` (check digit excluded)
pub fn check_digit(data: &[u8]) -> u8 {
    let sum: u32 = data
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| d as u32 * if i % 2 == 0 { 3 } else { 1 })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

fn read_digit(runs: &[Run], m: f32, with_parity: bool) -> Option<CharRead> {
    let width = total_width(runs);
    if width < 0.6 * 7.0 * m || width > 1.4 * 7.0 * m {
        return None;
    }
    // a moved edge between two characters leaves one 8 and one 6 modules
    // wide; normalizing would hide that, so it costs every candidate
    let penalty = ((width / m - 7.0).abs() - WIDTH_SLACK).max(0.0) * WIDTH_PENALTY;
    let n = normalized(runs, 7.0);
    let odd = (0..10).map(|d| (d as u16, pattern_cost(&n, &L_PATTERNS[d]) + penalty));
    if with_parity {
        let even = (0..10).map(|d| (d as u16 + 10, pattern_cost(&n, &g_pattern(d)) + penalty));
        CharRead::from_costs(odd.chain(even))
    } else {
        CharRead::from_costs(odd)
    }
}

/// Odd-parity character; a clearly even-parity one means the symbol is
/// being read backwards
fn read_odd(runs: &[Run], m: f32) -> Option<CharRead> {
    let either = read_digit(runs, m, true)?;
    if either.is_clean() && either.best() >= 10 {
        return None;
    }
    read_digit(runs, m, false)
}

/// Guards, quiet zones and `digits_per_half` characters on each side
fn read_symbol(
    runs: &[Run],
    i: usize,
    digits_per_half: usize,
    parity_left: bool,
) -> Option<(Vec<CharRead>, usize)> {
    let count = 6 + 8 * digits_per_half + 5;
    if i + count >= runs.len() {
        return None;
    }
    let modules = (11 + 14 * digits_per_half) as f32;
    let m = total_width(&runs[i..i + count]) / modules;
    if !runs[i - 1].is_quiet(m) || !runs[i + count].is_quiet(m) {
        return None;
    }
    let middle = i + 3 + 4 * digits_per_half;
    let end = i + count - 3;
    if !all_within(&runs[i..i + 3], m, 0.5, 1.6)
        || !all_within(&runs[middle..middle + 5], m, 0.5, 1.6)
        || !all_within(&runs[end..end + 3], m, 0.5, 1.6)
    {
        return None;
    }

    let mut chars = Vec::with_capacity(2 * digits_per_half);
    for k in 0..digits_per_half {
        let s = i + 3 + 4 * k;
        let half = &runs[s..s + 4];
        chars.push(if parity_left { read_digit(half, m, true)? } else { read_odd(half, m)? });
    }
    for k in 0..digits_per_half {
        let s = middle + 5 + 4 * k;
        chars.push(read_odd(&runs[s..s + 4], m)?);
    }
    Some((chars, i + count))
}

fn read_ean13(runs: &[Run], i: usize) -> Option<(Vec<CharRead>, usize)> {
    debug_assert_eq!(6 + 8 * 6 + 5, EAN13_RUNS);
    read_symbol(runs, i, 6, true)
}

fn read_ean8(runs: &[Run], i: usize) -> Option<(Vec<CharRead>, usize)> {
    debug_assert_eq!(6 + 8 * 4 + 5, EAN8_RUNS);
    read_symbol(runs, i, 4, false)
}

/// Full 13-digit sequence implied by 12 EAN-13 codewords
fn ean13_digits(codewords: &[u16]) -> Option<Vec<u8>> {
    if codewords.len() != 12 || codewords[6..].iter().any(|&c| c >= 10) {
        return None;
    }
    let mut mask = 0u8;
    for &c in &codewords[..6] {
        if c >= 20 {
            return None;
        }
        mask = (mask << 1) | u8::from(c >= 10);
    }
    let first = PARITY_MASKS.iter().position(|&p| p == mask)? as u8;
    let mut digits = vec![first];
    digits.extend(codewords.iter().map(|&c| (c % 10) as u8));
    Some(digits)
}

fn checksum_ok(digits: &[u8]) -> bool {
    match digits.split_last() {
        Some((&check, data)) => check_digit(data) == check,
        None => false,
    }
}

/// Decoder for one member of the EAN/UPC family
#[derive(Debug)]
pub struct EanDecoder {
    symbology: Symbology,
}

impl EanDecoder {
    /// Decoder for `symbology` (UPC-A, EAN-13 or EAN-8)
    pub const fn new(symbology: Symbology) -> Self {
        Self { symbology }
    }

    fn digits(&self, codewords: &[u16]) -> Option<Vec<u8>> {
        match self.symbology {
            Symbology::Ean8 => {
                if codewords.len() != 8 || codewords.iter().any(|&c| c >= 10) {
                    return None;
                }
                Some(codewords.iter().map(|&c| c as u8).collect())
            }
            Symbology::UpcA => {
                let digits = ean13_digits(codewords)?;
                (digits[0] == 0).then(|| digits[1..].to_vec())
            }
            _ => ean13_digits(codewords),
        }
    }
}

impl SymbolDecoder for EanDecoder {
    fn symbology(&self) -> Symbology {
        self.symbology
    }

    fn try_decode(&self, attempt: &DecodeAttempt<'_, '_>) -> Result<PartialDecode, NotThisSymbology> {
        if self.symbology == Symbology::Ean8 {
            return decode_runs(attempt, read_ean8, 1);
        }
        let partial = decode_runs(attempt, read_ean13, 1)?;
        if self.symbology == Symbology::UpcA {
            // a clearly read even-parity character means a non-zero leading digit
            let damage = partial.damage();
            let even = partial.codewords()[..6]
                .iter()
                .enumerate()
                .any(|(i, &c)| c >= 10 && !damage.is_uncertain(i));
            if even {
                return Err(NotThisSymbology);
            }
        }
        Ok(partial)
    }

    fn is_valid(&self, _partial: &PartialDecode, codewords: &[u16]) -> bool {
        self.digits(codewords).is_some_and(|d| checksum_ok(&d))
    }

    fn assemble(&self, partial: &PartialDecode, codewords: &[u16]) -> Option<Payload> {
        if !self.is_valid(partial, codewords) {
            return None;
        }
        let text: String = self
            .digits(codewords)?
            .iter()
            .map(|&d| char::from(b'0' + d))
            .collect();
        Some(Payload::from_text(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::linear::scanline::tests::line_from_widths;
    use crate::decoder::{DamageMap, Layout, RegionQuality};
    use crate::models::Rect;

    fn widths_ean13(digits: &str, m: f32) -> Vec<f32> {
        let d: Vec<usize> = digits.bytes().map(|b| (b - b'0') as usize).collect();
        let mut w = vec![10.0 * m, m, m, m];
        let mask = PARITY_MASKS[d[0]];
        for (k, &digit) in d[1..7].iter().enumerate() {
            let g = (mask >> (5 - k)) & 1 == 1;
            let p = if g { g_pattern(digit) } else { L_PATTERNS[digit] };
            w.extend(p.iter().map(|&x| x as f32 * m));
        }
        w.extend([m; 5]);
        for &digit in &d[7..] {
            w.extend(L_PATTERNS[digit].iter().map(|&x| x as f32 * m));
        }
        w.extend([m, m, m, 10.0 * m]);
        w
    }

    fn partial(symbology: Symbology, codewords: Vec<u16>) -> PartialDecode {
        let mut damage = DamageMap::new();
        for _ in &codewords {
            damage.push(false, 1.0, vec![]);
        }
        PartialDecode::new(
            symbology,
            codewords,
            damage,
            Layout::Linear,
            Rect::new(0, 0, 1, 1),
            RegionQuality { contrast: 1.0, rotation_deg: 0.0 },
        )
    }

    #[test]
    fn test_check_digit() {
        assert_eq!(check_digit(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 0]), 5);
        assert_eq!(check_digit(&[4, 0, 0, 6, 3, 8, 1, 3, 3, 3, 9, 3]), 1);
        assert_eq!(check_digit(&[9, 6, 3, 8, 5, 0, 7]), 4);
    }

    #[test]
    fn test_read_ean13_line() {
        let line = line_from_widths(&widths_ean13("4006381333931", 3.0), false);
        let (chars, end) = read_ean13(line.runs(), 1).unwrap();
        assert_eq!(end, 1 + EAN13_RUNS);
        let values: Vec<u16> = chars.iter().map(|c| c.best()).collect();
        let digits = ean13_digits(&values).unwrap();
        assert_eq!(digits, vec![4, 0, 0, 6, 3, 8, 1, 3, 3, 3, 9, 3, 1]);
        assert!(chars.iter().all(|c| c.is_clean()));
    }

    #[test]
    fn test_missing_quiet_zone_rejected() {
        let mut widths = widths_ean13("4006381333931", 3.0);
        widths[0] = 3.0;
        let line = line_from_widths(&widths, false);
        assert!(read_ean13(line.runs(), 1).is_none());
    }

    #[test]
    fn test_backwards_read_rejected() {
        let line = line_from_widths(&widths_ean13("4006381333931", 3.0), false).reversed();
        assert!(read_ean13(line.runs(), 1).is_none());
        let line = line_from_widths(&widths_ean13("0012345678905", 3.0), false).reversed();
        assert!(read_ean13(line.runs(), 1).is_none());
    }

    #[test]
    fn test_stretched_character_is_not_clean() {
        // the bar ending the fourth character grows one module into the fifth
        let mut widths = widths_ean13("4006381333931", 3.0);
        let boundary = 4 + 4 * 3 + 3;
        widths[boundary] += 3.0;
        widths[boundary + 1] -= 3.0;
        let line = line_from_widths(&widths, false);
        let (chars, _) = read_ean13(line.runs(), 1).unwrap();
        assert!(!chars[3].is_clean());
        assert!(!chars[4].is_clean());
        assert!(chars.iter().enumerate().all(|(i, c)| i == 3 || i == 4 || c.is_clean()));
    }

    #[test]
    fn test_upc_and_ean_validity() {
        let upc = EanDecoder::new(Symbology::UpcA);
        let ean = EanDecoder::new(Symbology::Ean13);
        // 0 12345 67890 5, all odd parity
        let cw: Vec<u16> = vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 0, 6];
        let cw_fixed: Vec<u16> = vec![0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 0, 5];
        assert!(!upc.is_valid(&partial(Symbology::UpcA, cw.clone()), &cw));
        let p = partial(Symbology::UpcA, cw_fixed.clone());
        assert!(upc.is_valid(&p, &cw_fixed));
        assert_eq!(upc.assemble(&p, &cw_fixed).unwrap().text, "012345678905");
        assert_eq!(ean.assemble(&p, &cw_fixed).unwrap().text, "0012345678905");
        // even parity in the left half moves the leading digit off 0
        let mut even = cw_fixed.clone();
        even[1] += 10;
        assert!(!upc.is_valid(&p, &even));
    }

    #[test]
    fn test_ean8_validity() {
        let dec = EanDecoder::new(Symbology::Ean8);
        let cw: Vec<u16> = vec![9, 6, 3, 8, 5, 0, 7, 4];
        let p = partial(Symbology::Ean8, cw.clone());
        assert_eq!(dec.assemble(&p, &cw).unwrap().text, "96385074");
        let bad: Vec<u16> = vec![9, 6, 3, 8, 5, 0, 7, 5];
        assert!(!dec.is_valid(&p, &bad));
    }
}
