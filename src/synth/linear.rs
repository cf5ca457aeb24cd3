//! Reference encoders for the linear symbologies.
//!
//! Each encoder returns the module sequence of the symbol without quiet
//! zones, `true` for a dark module. Wide elements of Code 39 and ITF are
//! three modules.

use crate::decoder::linear::code128::{self, PATTERNS, START_B, START_C, STOP};
use crate::decoder::linear::code39::{ALPHABET, ASTERISK, ENCODINGS};
use crate::decoder::linear::ean::{L_PATTERNS, PARITY_MASKS, check_digit, g_pattern};
use crate::decoder::linear::itf::DIGITS;
use crate::models::Symbology;

const WIDE: usize = 3;

/// Element widths in modules, first element dark
fn modules_from_widths(widths: &[usize]) -> Vec<bool> {
    let mut out = Vec::with_capacity(widths.iter().sum());
    for (i, &w) in widths.iter().enumerate() {
        out.extend(std::iter::repeat_n(i % 2 == 0, w));
    }
    out
}

fn digits(text: &str) -> Option<Vec<u8>> {
    text.bytes()
        .map(|b| b.is_ascii_digit().then(|| b - b'0'))
        .collect()
}

fn with_valid_check(text: &str, len: usize) -> Option<Vec<u8>> {
    let d = digits(text)?;
    if d.len() != len {
        return None;
    }
    let (&check, data) = d.split_last()?;
    (check_digit(data) == check).then_some(d)
}

fn push_pattern(out: &mut Vec<bool>, widths: [u8; 4], first_dark: bool) {
    for (k, &w) in widths.iter().enumerate() {
        let dark = (k % 2 == 0) == first_dark;
        out.extend(std::iter::repeat_n(dark, w as usize));
    }
}

/// EAN-13 from 13 digits, check digit included
pub fn ean13(text: &str) -> Option<Vec<bool>> {
    let d = with_valid_check(text, 13)?;
    let mask = PARITY_MASKS[d[0] as usize];
    let mut out = vec![true, false, true];
    for (k, &digit) in d[1..7].iter().enumerate() {
        let even = (mask >> (5 - k)) & 1 == 1;
        let widths = if even {
            g_pattern(digit as usize)
        } else {
            L_PATTERNS[digit as usize]
        };
        push_pattern(&mut out, widths, false);
    }
    out.extend([false, true, false, true, false]);
    for &digit in &d[7..] {
        push_pattern(&mut out, L_PATTERNS[digit as usize], true);
    }
    out.extend([true, false, true]);
    Some(out)
}

/// UPC-A from 12 digits: an EAN-13 with a leading zero
pub fn upc_a(text: &str) -> Option<Vec<bool>> {
    if text.len() != 12 {
        return None;
    }
    ean13(&format!("0{text}"))
}

/// EAN-8 from 8 digits, check digit included
pub fn ean8(text: &str) -> Option<Vec<bool>> {
    let d = with_valid_check(text, 8)?;
    let mut out = vec![true, false, true];
    for &digit in &d[..4] {
        push_pattern(&mut out, L_PATTERNS[digit as usize], false);
    }
    out.extend([false, true, false, true, false]);
    for &digit in &d[4..] {
        push_pattern(&mut out, L_PATTERNS[digit as usize], true);
    }
    out.extend([true, false, true]);
    Some(out)
}

/// Code 128 symbol values for `text`: set C for even-length digit strings,
/// set B otherwise; check symbol appended
pub fn code128_values(text: &str) -> Option<Vec<u16>> {
    let bytes = text.as_bytes();
    if bytes.is_empty() {
        return None;
    }
    let mut values = if bytes.len() % 2 == 0 && bytes.iter().all(u8::is_ascii_digit) {
        let mut v = vec![START_C];
        v.extend(
            bytes
                .chunks(2)
                .map(|p| ((p[0] - b'0') * 10 + (p[1] - b'0')) as u16),
        );
        v
    } else {
        let mut v = vec![START_B];
        for &b in bytes {
            if !(32..127).contains(&b) {
                return None;
            }
            v.push((b - 32) as u16);
        }
        v
    };
    values.push(code128::checksum(&values));
    Some(values)
}

/// Code 128 modules, stop pattern included
pub fn code128(text: &str) -> Option<Vec<bool>> {
    let values = code128_values(text)?;
    let mut widths: Vec<usize> = values
        .iter()
        .flat_map(|&v| PATTERNS[v as usize].iter().map(|&w| w as usize))
        .collect();
    widths.extend(STOP.iter().map(|&w| w as usize));
    Some(modules_from_widths(&widths))
}

fn code39_char(bitmap: u16) -> impl Iterator<Item = usize> {
    (0..9).map(move |k| if (bitmap >> (8 - k)) & 1 == 1 { WIDE } else { 1 })
}

/// Code 39 modules, `*` start and stop included
pub fn code39(text: &str) -> Option<Vec<bool>> {
    if text.is_empty() {
        return None;
    }
    let mut bitmaps = vec![ASTERISK];
    for b in text.bytes() {
        let v = ALPHABET.iter().position(|&a| a == b)?;
        bitmaps.push(ENCODINGS[v]);
    }
    bitmaps.push(ASTERISK);
    let mut widths = Vec::new();
    for (i, &bm) in bitmaps.iter().enumerate() {
        if i > 0 {
            // inter-character gap; keeps dark/light alternation
            widths.push(1);
        }
        widths.extend(code39_char(bm));
    }
    Some(modules_from_widths(&widths))
}

/// Interleaved 2 of 5 modules for an even number of digits (at least 4)
pub fn itf(text: &str) -> Option<Vec<bool>> {
    let d = digits(text)?;
    if d.len() < 4 || d.len() % 2 != 0 {
        return None;
    }
    let mut widths = vec![1, 1, 1, 1];
    for pair in d.chunks(2) {
        for k in 0..5 {
            let bar = DIGITS[pair[0] as usize][k];
            let space = DIGITS[pair[1] as usize][k];
            widths.push(if bar == 1 { WIDE } else { 1 });
            widths.push(if space == 1 { WIDE } else { 1 });
        }
    }
    widths.extend([WIDE, 1, 1]);
    Some(modules_from_widths(&widths))
}

/// Modules for a linear symbology; `None` for QR or content the symbology
/// cannot carry
pub fn encode_linear(symbology: Symbology, text: &str) -> Option<Vec<bool>> {
    match symbology {
        Symbology::UpcA => upc_a(text),
        Symbology::Ean13 => ean13(text),
        Symbology::Ean8 => ean8(text),
        Symbology::Code128 => code128(text),
        Symbology::Code39 => code39(text),
        Symbology::Itf => itf(text),
        Symbology::QrCode => None,
    }
}
