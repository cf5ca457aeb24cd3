use super::{Rect, Symbology};
use serde::{Deserialize, Serialize};

/// How a payload was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReconstructionPath {
    /// Read directly, every codeword certain and valid
    None,
    /// Repaired by the symbology's error-correction codewords
    EccCorrected,
    /// Completed by the statistical pass
    StatisticallyReconstructed,
}

/// Non-fatal notes about input quality
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum QualityNote {
    /// The image exceeded the area limit and was scanned at reduced resolution
    Downsampled {
        /// Integer reduction factor per axis
        factor: usize,
    },
    /// The source declared a low resolution and was interpolated up
    Upsampled {
        /// Integer enlargement factor per axis
        factor: usize,
        /// Resolution declared by the source
        declared_dpi: f32,
    },
}

/// A decoded barcode
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarcodeResult {
    symbology: Symbology,
    text: String,
    bytes: Vec<u8>,
    confidence: u8,
    bounds: Rect,
    source_index: usize,
    page_index: Option<usize>,
    path: ReconstructionPath,
}

impl BarcodeResult {
    pub(crate) fn new(
        symbology: Symbology,
        text: String,
        bytes: Vec<u8>,
        confidence: u8,
        bounds: Rect,
        path: ReconstructionPath,
    ) -> Self {
        Self {
            symbology,
            text,
            bytes,
            confidence: confidence.min(100),
            bounds,
            source_index: 0,
            page_index: None,
            path,
        }
    }

    pub(crate) fn with_origin(mut self, source_index: usize, page_index: Option<usize>) -> Self {
        self.source_index = source_index;
        self.page_index = page_index;
        self
    }

    pub(crate) fn with_bounds(mut self, bounds: Rect) -> Self {
        self.bounds = bounds;
        self
    }

    /// Symbology of the decoded symbol
    pub fn symbology(&self) -> Symbology {
        self.symbology
    }

    /// Payload as text (lossy for non-UTF-8 byte payloads)
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Raw payload bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Confidence score, 0..=100
    pub fn confidence(&self) -> u8 {
        self.confidence
    }

    /// Location in source image coordinates
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Position of the source in the batch input (0 for single scans)
    pub fn source_index(&self) -> usize {
        self.source_index
    }

    /// Page within a multi-page source
    pub fn page_index(&self) -> Option<usize> {
        self.page_index
    }

    /// Which repair path produced the payload
    pub fn reconstruction_path(&self) -> ReconstructionPath {
        self.path
    }
}
