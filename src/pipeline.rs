//! Single-image pipeline: locate, dispatch, reconstruct, score.
//!
//! Sequential and free of shared state, so the batch orchestrator can run
//! one pipeline per worker. A deadline, when given, is checked once the
//! regions are located, then between regions and between decode attempts.

use crate::config::ScanOptions;
use crate::decoder::{Dispatcher, PartialDecode, RegionContext, decoder_for};
use crate::detector::RegionLocator;
use crate::error::ScanError;
use crate::models::{BarcodeResult, CandidateRegion, NormalizedImage, QualityNote};
use crate::reconstruct::reconstruct;
use crate::scorer::score;
use std::borrow::Cow;
use std::time::Instant;
use tracing::{debug, trace};

/// Results for one image plus the quality notes collected on the way
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageScan {
    /// Decoded barcodes, highest confidence first
    pub results: Vec<BarcodeResult>,
    /// Resampling applied to the image
    pub notes: Vec<QualityNote>,
}

/// Reusable per-options pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    options: ScanOptions,
    dispatcher: Dispatcher,
}

impl Pipeline {
    /// Pipeline for a set of options
    pub fn new(options: ScanOptions) -> Self {
        let dispatcher = Dispatcher::new(&options);
        Self {
            options,
            dispatcher,
        }
    }

    /// Options in effect
    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Scan one normalized image
    pub fn scan(
        &self,
        image: &NormalizedImage,
        deadline: Option<Instant>,
    ) -> Result<ImageScan, ScanError> {
        let started = Instant::now();
        let check = || match deadline {
            Some(d) if Instant::now() >= d => Err(ScanError::ItemTimeout {
                elapsed_ms: started.elapsed().as_millis() as u64,
            }),
            _ => Ok(()),
        };

        let mut notes = image.notes().to_vec();
        let area = image.width() * image.height();
        let factor = if area > self.options.max_image_area {
            let f = (area as f64 / self.options.max_image_area as f64).sqrt().ceil() as usize;
            f.max(2)
        } else {
            1
        };
        let located: Cow<'_, NormalizedImage> = if factor > 1 {
            debug!(factor, area, "downsampling before locating");
            notes.push(QualityNote::Downsampled { factor });
            Cow::Owned(image.downsampled(factor))
        } else {
            Cow::Borrowed(image)
        };

        // crop areas are given in source coordinates
        let upsampled = image.notes().iter().find_map(|n| match n {
            QualityNote::Upsampled { factor, .. } => Some(*factor),
            _ => None,
        });
        let crop = self
            .options
            .crop_area
            .map(|c| c.scaled_up(upsampled.unwrap_or(1)).scaled_down(factor));
        let locator = RegionLocator::with_window(crop, self.options.overlap_tolerance);
        let regions: Vec<CandidateRegion> = locator
            .locate(&located)
            .filter_map(|r| {
                let bounds = r.bounds().scaled_up(factor).clipped(image.width(), image.height())?;
                Some(CandidateRegion::new(
                    bounds,
                    r.rotation_deg(),
                    r.class(),
                    r.contrast_variance(),
                ))
            })
            .collect();
        check()?;

        let mut results: Vec<BarcodeResult> = Vec::new();
        for region in regions {
            check()?;
            let context = RegionContext::new(image, &region);
            let Some(result) = self.decode_region(&context, &check)? else {
                continue;
            };
            let duplicate = results.iter().position(|r| {
                r.bounds().overlap_ratio(&result.bounds()) > self.options.overlap_tolerance
            });
            match duplicate {
                Some(i) if results[i].confidence() >= result.confidence() => {
                    trace!(bounds = ?result.bounds(), "dropping overlapping result");
                }
                Some(i) => results[i] = result,
                None => results.push(result),
            }
            if !self.options.expect_multiple_barcodes && !results.is_empty() {
                break;
            }
        }

        let source = image.source();
        let mut results: Vec<BarcodeResult> = results
            .into_iter()
            .map(|r| {
                let r = match upsampled {
                    Some(f) => {
                        let (w, h) = (image.width() / f, image.height() / f);
                        let bounds = r.bounds().scaled_down(f);
                        let bounds = bounds.clipped(w, h).unwrap_or(bounds);
                        r.with_bounds(bounds)
                    }
                    None => r,
                };
                r.with_origin(source.index, source.page)
            })
            .collect();
        results.sort_by(|a, b| b.confidence().cmp(&a.confidence()));
        debug!(
            source = %source.label,
            results = results.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "image scanned"
        );
        Ok(ImageScan { results, notes })
    }

    /// Best result for one region.
    ///
    /// Single-result mode keeps the first decoder that succeeds. Otherwise
    /// every decoder runs and, if more than one succeeds, the region is
    /// ambiguous and the most confident result wins.
    fn decode_region(
        &self,
        context: &RegionContext<'_>,
        check: &dyn Fn() -> Result<(), ScanError>,
    ) -> Result<Option<BarcodeResult>, ScanError> {
        let mut best: Option<BarcodeResult> = None;
        let mut successes = 0;
        for partial in self.dispatcher.dispatch(context) {
            check()?;
            let Some(result) = self.finish(&partial) else {
                continue;
            };
            successes += 1;
            if !self.options.expect_multiple_barcodes {
                return Ok(Some(result));
            }
            if best.as_ref().is_none_or(|b| result.confidence() > b.confidence()) {
                best = Some(result);
            }
        }
        if successes > 1 {
            debug!(
                bounds = ?context.region().bounds(),
                successes,
                "ambiguous region, keeping the most confident read"
            );
        }
        Ok(best)
    }

    fn finish(&self, partial: &PartialDecode) -> Option<BarcodeResult> {
        let outcome = reconstruct(partial, self.options.reading_speed);
        let path = outcome.path()?;
        let confidence = score(&outcome, partial.quality())?;
        let payload = decoder_for(partial.symbology()).assemble(partial, outcome.codewords()?)?;
        trace!(
            symbology = %partial.symbology(),
            confidence,
            ?path,
            "decoded"
        );
        Some(BarcodeResult::new(
            partial.symbology(),
            payload.text,
            payload.bytes,
            confidence,
            partial.bounds(),
            path,
        ))
    }
}
