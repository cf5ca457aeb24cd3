use super::{QualityNote, Rect};
use std::sync::Arc;

/// Where a normalized image came from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceRef {
    /// Position of the source in the batch input
    pub index: usize,
    /// Page within a multi-page document
    pub page: Option<usize>,
    /// Human readable label (path, `bytes`, `stream`, document id)
    pub label: String,
    /// Identifier of the parent document for rendered pages
    pub document: Option<Arc<str>>,
}

impl SourceRef {
    /// Reference for a standalone source
    pub fn new(index: usize, label: impl Into<String>) -> Self {
        Self {
            index,
            page: None,
            label: label.into(),
            document: None,
        }
    }
}

/// Canonical 8-bit grayscale raster. Immutable once built.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pixels: Vec<u8>,
    width: usize,
    height: usize,
    dpi: Option<f32>,
    source: SourceRef,
    notes: Vec<QualityNote>,
}

impl NormalizedImage {
    /// Wrap a grayscale buffer; `None` when the buffer size does not match
    pub fn from_gray(pixels: Vec<u8>, width: usize, height: usize) -> Option<Self> {
        if width == 0 || height == 0 || pixels.len() != width * height {
            return None;
        }
        Some(Self {
            pixels,
            width,
            height,
            dpi: None,
            source: SourceRef::default(),
            notes: Vec::new(),
        })
    }

    pub(crate) fn with_source(mut self, source: SourceRef) -> Self {
        self.source = source;
        self
    }

    pub(crate) fn with_dpi(mut self, dpi: Option<f32>) -> Self {
        self.dpi = dpi;
        self
    }

    pub(crate) fn with_note(mut self, note: QualityNote) -> Self {
        self.notes.push(note);
        self
    }

    /// Width in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Row-major samples, 0 = black
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Declared resolution, if known
    pub fn dpi(&self) -> Option<f32> {
        self.dpi
    }

    /// Origin of this image
    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    /// Quality notes collected while normalizing
    pub fn notes(&self) -> &[QualityNote] {
        &self.notes
    }

    /// Full image rectangle
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    /// Sample at integer coordinates, clamped to the border
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        self.pixels[y * self.width + x]
    }

    /// Bilinear sample at sub-pixel coordinates; pixel centers sit at integers
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        crate::utils::geometry::bilinear(&self.pixels, self.width, self.height, x, y)
    }

    /// Box-filter reduction by an integer factor
    pub fn downsampled(&self, factor: usize) -> NormalizedImage {
        if factor <= 1 {
            return self.clone();
        }
        let pixels = crate::utils::grayscale::box_downsample(&self.pixels, self.width, self.height, factor);
        let width = (self.width / factor).max(1);
        let height = (self.height / factor).max(1);
        NormalizedImage {
            pixels,
            width,
            height,
            dpi: self.dpi.map(|d| d / factor as f32),
            source: self.source.clone(),
            notes: self.notes.clone(),
        }
    }
}
