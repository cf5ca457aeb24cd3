//! rust_barcode - barcode recognition engine
//!
//! Locates barcodes in raster images, decodes them (UPC-A, EAN-13, EAN-8,
//! Code 128, Code 39, ITF and QR), repairs damaged symbols through error
//! correction or a checksum-guided search, and reports a confidence score
//! that tells the three apart.
//!
//! Single images go through a [`Scanner`]; many sources at once go through
//! a [`BatchScanner`], which owns the worker pool.

#![warn(missing_docs)]
#![allow(clippy::missing_docs_in_private_items)]

/// Batch orchestration over a worker pool
pub mod batch;
/// Scan options and environment overrides
pub mod config;
/// Symbology decoders and dispatch
pub mod decoder;
/// Region location and QR finder detection
pub mod detector;
/// Error taxonomy and per-item outcomes
pub mod error;
/// Core data structures (images, regions, results, bit matrices)
pub mod models;
/// Input normalization into grayscale images
pub mod normalizer;
/// Single-image pipeline
pub mod pipeline;
/// Damage repair: Reed-Solomon and the statistical pass
pub mod reconstruct;
/// Confidence scoring
pub mod scorer;
/// Reference encoders and rendering for tests and benches
pub mod synth;
/// Utility functions (grayscale, binarization, geometry)
pub mod utils;

pub use batch::{BatchError, BatchReport, BatchScanner, CancellationToken, ItemReport, Progress};
pub use config::{ReadingSpeed, ScanOptions};
pub use error::{ItemOutcome, ScanError};
pub use models::{BarcodeResult, QualityNote, ReconstructionPath, Rect, Symbology};
pub use normalizer::{DocumentSource, PageBitmap, PageRenderer, PixelLayout, Source};
pub use pipeline::{ImageScan, Pipeline};

use models::{NormalizedImage, SourceRef};
use std::time::Instant;
use utils::grayscale::rgb_to_grayscale;

/// Scans one source at a time on the calling thread
#[derive(Debug, Clone)]
pub struct Scanner {
    pipeline: Pipeline,
}

impl Scanner {
    /// Scanner for a set of options
    pub fn new(options: ScanOptions) -> Self {
        Self {
            pipeline: Pipeline::new(options),
        }
    }

    /// Options in effect
    pub fn options(&self) -> &ScanOptions {
        self.pipeline.options()
    }

    /// Normalize and scan a single-image source
    pub fn scan(&self, source: impl Into<Source>) -> ItemOutcome {
        let source = source.into();
        let origin = SourceRef::new(0, source.label());
        let started = Instant::now();
        let deadline = self.options().item_timeout().map(|t| started + t);
        let results = normalizer::normalize(source, origin, self.options())
            .and_then(|image| self.pipeline.scan(&image, deadline))
            .map(|scan| scan.results);
        ItemOutcome::from_results(results)
    }

    /// Scan an already normalized image, without a time limit
    pub fn scan_image(&self, image: &NormalizedImage) -> Result<ImageScan, ScanError> {
        self.pipeline.scan(image, None)
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(ScanOptions::default())
    }
}

/// Detect barcodes in an RGB image (3 bytes per pixel) with default options
pub fn detect(image: &[u8], width: usize, height: usize) -> Vec<BarcodeResult> {
    if image.len() != width * height * 3 {
        return Vec::new();
    }
    detect_from_grayscale(&rgb_to_grayscale(image, width, height), width, height)
}

/// Detect barcodes in an 8-bit grayscale image with default options
pub fn detect_from_grayscale(image: &[u8], width: usize, height: usize) -> Vec<BarcodeResult> {
    let Some(image) = NormalizedImage::from_gray(image.to_vec(), width, height) else {
        return Vec::new();
    };
    Scanner::default()
        .scan_image(&image)
        .map(|scan| scan.results)
        .unwrap_or_default()
}

/// Scan many sources with a fresh [`BatchScanner`]
pub fn process_many(sources: Vec<Source>, options: ScanOptions) -> Result<BatchReport, BatchError> {
    Ok(BatchScanner::new(options)?.process_many(sources))
}
