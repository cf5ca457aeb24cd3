//! Error taxonomy.
//!
//! Only item-level failures surface to callers ([`ScanError`]). Per-region
//! failures (a decoder rejecting a region, reconstruction giving up, two
//! decoders claiming one region) are recovered inside the pipeline and only
//! show up in the logs.

use crate::models::BarcodeResult;
use thiserror::Error;

/// A failure scoped to one input item (file, buffer, stream or page)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScanError {
    /// The container format is not one the normalizer can read
    #[error("unsupported source kind: {0}")]
    UnsupportedSourceKind(String),

    /// Empty, truncated or unreadable input
    #[error("corrupt input: {0}")]
    CorruptInput(String),

    /// The item exceeded its per-item time budget
    #[error("item timed out after {elapsed_ms} ms")]
    ItemTimeout {
        /// Time spent before giving up
        elapsed_ms: u64,
    },

    /// Any other failure while processing the item (renderer error, panic)
    #[error("item processing failed: {0}")]
    ItemProcessingError(String),

    /// The batch was cancelled before this item was processed
    #[error("cancelled before processing")]
    Cancelled,
}

impl ScanError {
    /// True for failures raised while turning the source into an image
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ScanError::UnsupportedSourceKind(_) | ScanError::CorruptInput(_)
        )
    }
}

/// Raised by a decoder that does not recognize the region's start/finder pattern
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("region does not match this symbology")]
pub struct NotThisSymbology;

/// Outcome for one processed item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    /// At least one barcode decoded, ordered by descending confidence
    Found(Vec<BarcodeResult>),
    /// The pipeline ran to completion and decoded nothing
    NoBarcodeFound,
    /// Something broke before the pipeline could finish
    Failed(ScanError),
}

impl ItemOutcome {
    /// Build from a pipeline result, mapping an empty set to `NoBarcodeFound`
    pub fn from_results(results: Result<Vec<BarcodeResult>, ScanError>) -> Self {
        match results {
            Ok(r) if r.is_empty() => ItemOutcome::NoBarcodeFound,
            Ok(r) => ItemOutcome::Found(r),
            Err(e) => ItemOutcome::Failed(e),
        }
    }

    /// Decoded results, empty unless `Found`
    pub fn results(&self) -> &[BarcodeResult] {
        match self {
            ItemOutcome::Found(r) => r,
            _ => &[],
        }
    }

    /// The failure, if any
    pub fn error(&self) -> Option<&ScanError> {
        match self {
            ItemOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}
