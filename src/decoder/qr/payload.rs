//! Segment parsing of corrected QR data codewords.

use super::tables::char_count_bits;
use crate::decoder::Payload;

pub(crate) const ALPHANUMERIC: &[u8; 45] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";
const ECI_UTF8: u32 = 26;
const GROUP_SEPARATOR: u8 = 0x1D;

/// MSB-first reader over data codewords
struct BitReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> BitReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.bytes.len() * 8 - self.pos
    }

    fn read(&mut self, n: usize) -> Option<u32> {
        if n > self.remaining() {
            return None;
        }
        let mut value = 0u32;
        for _ in 0..n {
            let bit = (self.bytes[self.pos / 8] >> (7 - self.pos % 8)) & 1;
            value = (value << 1) | bit as u32;
            self.pos += 1;
        }
        Some(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Charset {
    /// ISO-8859-1 unless the bytes happen to be valid UTF-8
    Default,
    Utf8,
}

/// Text and bytes accumulated segment by segment
struct Collector {
    text: String,
    bytes: Vec<u8>,
    pending: Vec<u8>,
    charset: Charset,
}

impl Collector {
    fn flush(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        match (self.charset, std::str::from_utf8(&self.pending)) {
            (_, Ok(s)) => self.text.push_str(s),
            (Charset::Utf8, Err(_)) => self.text.push_str(&String::from_utf8_lossy(&self.pending)),
            (Charset::Default, Err(_)) => self.text.extend(self.pending.iter().map(|&b| char::from(b))),
        }
        self.bytes.append(&mut self.pending);
    }

    fn push_ascii(&mut self, s: &[u8]) {
        self.flush();
        self.text.extend(s.iter().map(|&b| char::from(b)));
        self.bytes.extend_from_slice(s);
    }
}

/// Parse the segments of a symbol's data codewords.
///
/// Fails on an unknown mode or a segment running past the data; a stream
/// that ends without a terminator is accepted.
pub fn parse(data: &[u8], version: u8) -> Option<Payload> {
    let mut reader = BitReader::new(data);
    let mut out = Collector {
        text: String::new(),
        bytes: Vec::new(),
        pending: Vec::new(),
        charset: Charset::Default,
    };
    let mut segments = 0;
    let mut fnc1 = false;

    while reader.remaining() >= 4 {
        let mode = reader.read(4)? as u8;
        match mode {
            0 => break,
            0b0001 => {
                let count = reader.read(char_count_bits(mode, version))? as usize;
                let digits = read_numeric(&mut reader, count)?;
                out.push_ascii(&digits);
            }
            0b0010 => {
                let count = reader.read(char_count_bits(mode, version))? as usize;
                let chars = read_alphanumeric(&mut reader, count)?;
                let chars: Vec<u8> = if fnc1 {
                    // in FNC1 mode "%" stands for GS and "%%" for a literal "%"
                    let mut v = Vec::with_capacity(chars.len());
                    let mut it = chars.into_iter().peekable();
                    while let Some(c) = it.next() {
                        if c == b'%' {
                            if it.peek() == Some(&b'%') {
                                it.next();
                                v.push(b'%');
                            } else {
                                v.push(GROUP_SEPARATOR);
                            }
                        } else {
                            v.push(c);
                        }
                    }
                    v
                } else {
                    chars
                };
                out.push_ascii(&chars);
            }
            0b0100 => {
                let count = reader.read(char_count_bits(mode, version))? as usize;
                for _ in 0..count {
                    out.pending.push(reader.read(8)? as u8);
                }
            }
            0b1000 => {
                let count = reader.read(char_count_bits(mode, version))? as usize;
                out.flush();
                let sjis = read_kanji(&mut reader, count)?;
                out.text.push_str(&String::from_utf8_lossy(&sjis));
                out.bytes.extend_from_slice(&sjis);
            }
            0b0111 => {
                out.flush();
                let eci = read_eci(&mut reader)?;
                out.charset = if eci == ECI_UTF8 { Charset::Utf8 } else { Charset::Default };
                continue;
            }
            0b0011 => {
                // structured append: sequence, parity; the part is decoded alone
                reader.read(16)?;
                continue;
            }
            0b0101 => {
                fnc1 = true;
                continue;
            }
            0b1001 => {
                fnc1 = true;
                reader.read(8)?;
                continue;
            }
            _ => return None,
        }
        segments += 1;
    }
    out.flush();
    (segments > 0).then_some(Payload {
        text: out.text,
        bytes: out.bytes,
    })
}

fn read_numeric(reader: &mut BitReader<'_>, count: usize) -> Option<Vec<u8>> {
    let mut digits = Vec::with_capacity(count);
    let mut left = count;
    while left > 0 {
        let take = left.min(3);
        let bits = [0, 4, 7, 10][take];
        let value = reader.read(bits)?;
        if value >= 10u32.pow(take as u32) {
            return None;
        }
        let text = format!("{value:0take$}");
        digits.extend_from_slice(text.as_bytes());
        left -= take;
    }
    Some(digits)
}

fn read_alphanumeric(reader: &mut BitReader<'_>, count: usize) -> Option<Vec<u8>> {
    let mut chars = Vec::with_capacity(count);
    let mut left = count;
    while left >= 2 {
        let value = reader.read(11)? as usize;
        let (hi, lo) = (value / 45, value % 45);
        chars.push(*ALPHANUMERIC.get(hi)?);
        chars.push(ALPHANUMERIC[lo]);
        left -= 2;
    }
    if left == 1 {
        chars.push(*ALPHANUMERIC.get(reader.read(6)? as usize)?);
    }
    Some(chars)
}

/// Kanji values expanded back to Shift JIS byte pairs
fn read_kanji(reader: &mut BitReader<'_>, count: usize) -> Option<Vec<u8>> {
    let mut bytes = Vec::with_capacity(count * 2);
    for _ in 0..count {
        let value = reader.read(13)?;
        let mut code = ((value / 0xC0) << 8) | (value % 0xC0);
        code += if code < 0x1F00 { 0x8140 } else { 0xC140 };
        bytes.push((code >> 8) as u8);
        bytes.push(code as u8);
    }
    Some(bytes)
}

fn read_eci(reader: &mut BitReader<'_>) -> Option<u32> {
    let first = reader.read(8)?;
    if first & 0x80 == 0 {
        Some(first)
    } else if first & 0xC0 == 0x80 {
        Some(((first & 0x3F) << 8) | reader.read(8)?)
    } else if first & 0xE0 == 0xC0 {
        Some(((first & 0x1F) << 16) | reader.read(16)?)
    } else {
        None
    }
}
