//! Scan options.
//!
//! Options are a plain value handed to the pipeline or the batch orchestrator;
//! nothing is cached process-wide, so scanners with different options can run
//! side by side. `BARCODE_*` environment variables can be layered on top with
//! [`ScanOptions::with_env_overrides`].

use crate::models::{Rect, Symbology};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// How hard the reconstruction engine works on damaged symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReadingSpeed {
    /// Error correction only, never the statistical pass
    Faster,
    /// Statistical pass when error correction is absent or fails
    #[default]
    Balanced,
    /// Statistical pass always, also to corroborate error correction
    Detailed,
}

impl FromStr for ReadingSpeed {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "faster" | "fast" => Ok(ReadingSpeed::Faster),
            "balanced" => Ok(ReadingSpeed::Balanced),
            "detailed" => Ok(ReadingSpeed::Detailed),
            other => Err(format!("unknown reading speed: {other}")),
        }
    }
}

/// Options for a scan or a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    /// Keep scanning after the first result
    pub expect_multiple_barcodes: bool,
    /// Explicit allow-list, tried in the given order. `None` = automatic detection
    pub expect_barcode_types: Option<Vec<Symbology>>,
    /// Reconstruction effort
    pub reading_speed: ReadingSpeed,
    /// Restrict region search to this rectangle (source image coordinates)
    pub crop_area: Option<Rect>,
    /// Worker count for batches; 0 means one per core
    pub max_parallel_threads: usize,
    /// Regions/results overlapping more than this fraction are duplicates
    pub overlap_tolerance: f32,
    /// Sources declaring a lower resolution are upsampled
    pub min_useful_dpi: f32,
    /// Images larger than this many pixels are downsampled before locating
    pub max_image_area: usize,
    /// Per-item time budget in milliseconds
    pub item_timeout_ms: u64,
    /// Items queued ahead of the workers
    pub lookahead: usize,
    /// Resolution requested from the page renderer
    pub pdf_dpi: f32,
    /// Scale requested from the page renderer
    pub pdf_scale: f32,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            expect_multiple_barcodes: false,
            expect_barcode_types: None,
            reading_speed: ReadingSpeed::Balanced,
            crop_area: None,
            max_parallel_threads: 0,
            overlap_tolerance: 0.3,
            min_useful_dpi: 150.0,
            max_image_area: 16_000_000,
            item_timeout_ms: 10_000,
            lookahead: 2,
            pdf_dpi: 300.0,
            pdf_scale: 1.0,
        }
    }
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: u64) -> u64 {
    lookup(name)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_usize(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: usize) -> usize {
    lookup(name)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn parse_f32(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: f32) -> f32 {
    lookup(name)
        .and_then(|v| v.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(default)
}

fn parse_bool_u8(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: bool) -> bool {
    lookup(name)
        .and_then(|v| v.trim().parse::<u8>().ok())
        .map(|v| v != 0)
        .unwrap_or(default)
}

fn parse_rect(value: &str) -> Option<Rect> {
    let parts: Vec<usize> = value
        .split(',')
        .map(|p| p.trim().parse::<usize>().ok())
        .collect::<Option<Vec<_>>>()?;
    match parts.as_slice() {
        [x, y, w, h] if *w > 0 && *h > 0 => Some(Rect::new(*x, *y, *w, *h)),
        _ => None,
    }
}

fn parse_types(value: &str) -> Option<Vec<Symbology>> {
    let types = value
        .split(',')
        .filter(|p| !p.trim().is_empty())
        .map(|p| p.parse::<Symbology>().ok())
        .collect::<Option<Vec<_>>>()?;
    (!types.is_empty()).then_some(types)
}

impl ScanOptions {
    /// Layer `BARCODE_*` environment variables over these options
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Layer overrides from an arbitrary key lookup; malformed values are ignored
    pub fn with_overrides_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        self.expect_multiple_barcodes =
            parse_bool_u8(&lookup, "BARCODE_EXPECT_MULTIPLE", self.expect_multiple_barcodes);
        if let Some(types) = lookup("BARCODE_TYPES").as_deref().and_then(parse_types) {
            self.expect_barcode_types = Some(types);
        }
        if let Some(speed) = lookup("BARCODE_READING_SPEED").and_then(|v| v.parse().ok()) {
            self.reading_speed = speed;
        }
        if let Some(crop) = lookup("BARCODE_CROP").as_deref().and_then(parse_rect) {
            self.crop_area = Some(crop);
        }
        self.max_parallel_threads =
            parse_usize(&lookup, "BARCODE_MAX_THREADS", self.max_parallel_threads);
        self.overlap_tolerance =
            parse_f32(&lookup, "BARCODE_OVERLAP_TOLERANCE", self.overlap_tolerance).clamp(0.0, 1.0);
        self.min_useful_dpi = parse_f32(&lookup, "BARCODE_MIN_DPI", self.min_useful_dpi).max(0.0);
        self.max_image_area = parse_usize(&lookup, "BARCODE_MAX_AREA", self.max_image_area).max(4096);
        self.item_timeout_ms = parse_u64(&lookup, "BARCODE_TIMEOUT_MS", self.item_timeout_ms);
        self.lookahead = parse_usize(&lookup, "BARCODE_LOOKAHEAD", self.lookahead);
        self.pdf_dpi = parse_f32(&lookup, "BARCODE_PDF_DPI", self.pdf_dpi).max(1.0);
        self.pdf_scale = parse_f32(&lookup, "BARCODE_PDF_SCALE", self.pdf_scale).max(0.01);
        self
    }

    /// Per-item budget as a `Duration`; zero disables the timeout
    pub fn item_timeout(&self) -> Option<Duration> {
        (self.item_timeout_ms > 0).then(|| Duration::from_millis(self.item_timeout_ms))
    }

    /// Whether the caller pinned an explicit symbology list
    pub fn has_explicit_types(&self) -> bool {
        self.expect_barcode_types.as_ref().is_some_and(|t| !t.is_empty())
    }
}
