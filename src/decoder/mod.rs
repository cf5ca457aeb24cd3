//! Symbology decoders.
//!
//! Every decoder reads a candidate region into a [`PartialDecode`]: the raw
//! codewords as read, a [`DamageMap`] of positions it could not read with
//! certainty, and the geometry it found. Turning codewords into a payload is
//! deferred until the reconstruction engine has settled on the final values,
//! so each decoder also exposes its validity check, its error correction (if
//! any) and its payload assembly through [`SymbolDecoder`].

pub mod dispatch;
pub mod linear;
pub mod qr;

use crate::error::NotThisSymbology;
use crate::models::{CandidateRegion, NormalizedImage, Rect, Symbology};
use linear::scanline::LinearScan;
use std::cell::OnceCell;

pub use dispatch::Dispatcher;

/// A possible value for an uncertain position, lower cost is more likely
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Alternative {
    /// Codeword value
    pub value: u16,
    /// Distance between the measurement and this value's ideal pattern
    pub cost: f32,
}

/// Per-position certainty of a read.
///
/// Positions are codeword indices. A flagged position is one whose
/// measurement did not match any valid pattern cleanly; its value in the
/// codeword sequence is only the decoder's best guess.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DamageMap {
    uncertain: Vec<bool>,
    confidence: Vec<f32>,
    alternatives: Vec<Vec<Alternative>>,
}

impl DamageMap {
    /// Empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the next position
    pub fn push(&mut self, uncertain: bool, confidence: f32, alternatives: Vec<Alternative>) {
        self.uncertain.push(uncertain);
        self.confidence.push(confidence.clamp(0.0, 1.0));
        self.alternatives.push(alternatives);
    }

    /// Number of positions
    pub fn len(&self) -> usize {
        self.uncertain.len()
    }

    /// True when the map covers no positions
    pub fn is_empty(&self) -> bool {
        self.uncertain.is_empty()
    }

    /// Whether position `i` is flagged
    pub fn is_uncertain(&self, i: usize) -> bool {
        self.uncertain.get(i).copied().unwrap_or(false)
    }

    /// Indices of flagged positions, ascending
    pub fn flagged(&self) -> Vec<usize> {
        self.uncertain
            .iter()
            .enumerate()
            .filter_map(|(i, &u)| u.then_some(i))
            .collect()
    }

    /// Read confidence of position `i` in `[0, 1]`
    pub fn confidence(&self, i: usize) -> f32 {
        self.confidence.get(i).copied().unwrap_or(0.0)
    }

    /// Ranked alternatives for position `i`, best first (may be empty)
    pub fn alternatives(&self, i: usize) -> &[Alternative] {
        self.alternatives.get(i).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Mark position `i` uncertain
    pub fn flag(&mut self, i: usize) {
        if let Some(u) = self.uncertain.get_mut(i) {
            *u = true;
        }
    }
}

/// QR symbol parameters read from the format and version areas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrLayout {
    /// Version 1..=40
    pub version: u8,
    /// Error correction level
    pub ec_level: qr::tables::EcLevel,
    /// Data mask 0..=7
    pub mask: u8,
}

/// Symbology-specific structure needed to interpret the codewords
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Linear symbol, codewords are symbol characters in reading order
    Linear,
    /// QR symbol, codewords are in interleaved (placement) order
    Qr(QrLayout),
}

/// Image quality of the decoded area, used by the scorer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionQuality {
    /// Dark/light separation in `[0, 1]`
    pub contrast: f32,
    /// Orientation of the symbol in degrees
    pub rotation_deg: f32,
}

/// Decoder output before reconstruction
#[derive(Debug, Clone, PartialEq)]
pub struct PartialDecode {
    symbology: Symbology,
    codewords: Vec<u16>,
    damage: DamageMap,
    layout: Layout,
    bounds: Rect,
    quality: RegionQuality,
}

impl PartialDecode {
    /// Assemble a read; `damage` must cover every codeword
    pub fn new(
        symbology: Symbology,
        codewords: Vec<u16>,
        damage: DamageMap,
        layout: Layout,
        bounds: Rect,
        quality: RegionQuality,
    ) -> Self {
        debug_assert_eq!(codewords.len(), damage.len());
        Self {
            symbology,
            codewords,
            damage,
            layout,
            bounds,
            quality,
        }
    }

    /// Symbology that produced this read
    pub fn symbology(&self) -> Symbology {
        self.symbology
    }

    /// Codewords as read
    pub fn codewords(&self) -> &[u16] {
        &self.codewords
    }

    /// Damage map over the codewords
    pub fn damage(&self) -> &DamageMap {
        &self.damage
    }

    /// Structural parameters
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Symbol bounds in image coordinates
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Image quality of the symbol area
    pub fn quality(&self) -> RegionQuality {
        self.quality
    }
}

/// Decoded content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    /// Text form of the content
    pub text: String,
    /// Raw bytes of the content
    pub bytes: Vec<u8>,
}

impl Payload {
    /// Payload whose bytes are the UTF-8 text
    pub fn from_text(text: String) -> Self {
        let bytes = text.as_bytes().to_vec();
        Self { text, bytes }
    }
}

/// Result of running a symbology's error correction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EccOutcome {
    /// Corrected codewords in the same order as the input
    pub codewords: Vec<u16>,
    /// Codewords fixed without being flagged beforehand
    pub errors: usize,
    /// Flagged codewords handed to the corrector as erasures
    pub erasures: usize,
    /// Total redundancy (error-correction codewords) of the symbol
    pub capacity: usize,
    /// Codewords whose value actually changed
    pub changed: usize,
}

/// Shared per-region state, built lazily and reused by every decoder
pub struct RegionContext<'a> {
    image: &'a NormalizedImage,
    region: &'a CandidateRegion,
    linear: OnceCell<LinearScan>,
}

impl<'a> RegionContext<'a> {
    /// Context for one region of one image
    pub fn new(image: &'a NormalizedImage, region: &'a CandidateRegion) -> Self {
        Self {
            image,
            region,
            linear: OnceCell::new(),
        }
    }

    /// Source image
    pub fn image(&self) -> &'a NormalizedImage {
        self.image
    }

    /// Region under test
    pub fn region(&self) -> &'a CandidateRegion {
        self.region
    }

    /// Scanlines through the region, sampled on first use
    pub fn linear_scan(&self) -> &LinearScan {
        self.linear
            .get_or_init(|| LinearScan::sample(self.image, self.region))
    }
}

/// One decoder applied to one region
pub struct DecodeAttempt<'c, 'a> {
    context: &'c RegionContext<'a>,
    symbology: Symbology,
}

impl<'c, 'a> DecodeAttempt<'c, 'a> {
    /// Pair a region context with the symbology being tried
    pub fn new(context: &'c RegionContext<'a>, symbology: Symbology) -> Self {
        Self { context, symbology }
    }

    /// Region context
    pub fn context(&self) -> &'c RegionContext<'a> {
        self.context
    }

    /// Symbology being tried
    pub fn symbology(&self) -> Symbology {
        self.symbology
    }
}

/// The common decode contract
pub trait SymbolDecoder: Sync {
    /// Symbology handled by this decoder
    fn symbology(&self) -> Symbology;

    /// Read the region, or fail fast when its start/finder pattern is absent
    fn try_decode(&self, attempt: &DecodeAttempt<'_, '_>) -> Result<PartialDecode, NotThisSymbology>;

    /// Whether `codewords` satisfy the symbology's checksum and structure
    fn is_valid(&self, partial: &PartialDecode, codewords: &[u16]) -> bool;

    /// Run the symbology's error correction with the given erasure positions
    fn correct(&self, _partial: &PartialDecode, _erasures: &[usize]) -> Option<EccOutcome> {
        None
    }

    /// Turn valid codewords into a payload
    fn assemble(&self, partial: &PartialDecode, codewords: &[u16]) -> Option<Payload>;
}

static UPC_A: linear::ean::EanDecoder = linear::ean::EanDecoder::new(Symbology::UpcA);
static EAN_13: linear::ean::EanDecoder = linear::ean::EanDecoder::new(Symbology::Ean13);
static EAN_8: linear::ean::EanDecoder = linear::ean::EanDecoder::new(Symbology::Ean8);
static CODE_128: linear::code128::Code128Decoder = linear::code128::Code128Decoder;
static CODE_39: linear::code39::Code39Decoder = linear::code39::Code39Decoder;
static ITF: linear::itf::ItfDecoder = linear::itf::ItfDecoder;
static QR: qr::QrDecoder = qr::QrDecoder;

/// The decoder for a symbology
pub fn decoder_for(symbology: Symbology) -> &'static dyn SymbolDecoder {
    match symbology {
        Symbology::UpcA => &UPC_A,
        Symbology::Ean13 => &EAN_13,
        Symbology::Ean8 => &EAN_8,
        Symbology::Code128 => &CODE_128,
        Symbology::Code39 => &CODE_39,
        Symbology::Itf => &ITF,
        Symbology::QrCode => &QR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_damage_map_flags() {
        let mut map = DamageMap::new();
        map.push(false, 1.0, vec![]);
        map.push(true, 0.2, vec![Alternative { value: 3, cost: 0.9 }]);
        map.push(false, 1.5, vec![]);
        assert_eq!(map.len(), 3);
        assert_eq!(map.flagged(), vec![1]);
        assert_eq!(map.confidence(2), 1.0);
        assert_eq!(map.alternatives(1)[0].value, 3);
        assert!(map.alternatives(7).is_empty());
        map.flag(0);
        assert_eq!(map.flagged(), vec![0, 1]);
    }

    #[test]
    fn test_every_symbology_has_a_decoder() {
        for s in Symbology::ALL {
            assert_eq!(decoder_for(s).symbology(), s);
        }
    }
}
