//! QR Code (model 2), versions 1-40.
//!
//! The decoder locates finder patterns in an Otsu-binarized window around
//! the region, samples the module grid, reads format and version
//! information and extracts the codewords in placement order. Error
//! correction and payload parsing run later, through [`SymbolDecoder`].

pub mod format;
pub mod function_mask;
pub mod grid;
pub mod payload;
pub mod tables;

use self::format::{read_format, read_version};
use self::function_mask::FunctionMask;
use self::grid::{SampledGrid, data_positions, read_codewords, sample_grid};
use self::tables::{BlockLayout, dimension, version_for_dimension};
use crate::decoder::{
    DamageMap, DecodeAttempt, EccOutcome, Layout, PartialDecode, Payload, QrLayout, RegionQuality,
    SymbolDecoder,
};
use crate::detector::finder::{FinderDetector, FinderTriple, group_finder_patterns};
use crate::error::NotThisSymbology;
use crate::models::{Rect, Symbology};
use crate::reconstruct::reed_solomon::ReedSolomon;
use crate::utils::binarization::otsu_binarize_window;
use tracing::trace;

const MAX_TRIPLES: usize = 6;
const MAX_TIMING_MISMATCH: f32 = 0.25;

/// QR Code decoder
#[derive(Debug)]
pub struct QrDecoder;

impl QrDecoder {
    fn read_grid(grid: &SampledGrid, triple: &FinderTriple, image_size: (usize, usize)) -> Option<PartialDecode> {
        if grid.timing_mismatch() > MAX_TIMING_MISMATCH {
            return None;
        }
        let format = read_format(grid.modules())?;
        let size = grid.size();
        let version = if size >= dimension(7) {
            match read_version(grid.modules()) {
                Some(v) if dimension(v) == size => v,
                Some(_) => return None,
                None => version_for_dimension(size)?,
            }
        } else {
            version_for_dimension(size)?
        };

        let positions = data_positions(&FunctionMask::new(version));
        let codewords: Vec<u16> = read_codewords(grid.modules(), &positions, format.mask)
            .into_iter()
            .map(u16::from)
            .collect();
        let mut damage = DamageMap::new();
        for chunk in positions.chunks_exact(8) {
            let confidence = chunk
                .iter()
                .map(|&(x, y)| grid.confidence(x, y))
                .fold(1.0f32, f32::min);
            let uncertain = chunk.iter().any(|&(x, y)| grid.is_flagged(x, y));
            damage.push(uncertain, confidence, Vec::new());
        }

        let bounds = Rect::bounding(&grid.corners(), image_size.0, image_size.1)?;
        let quality = RegionQuality {
            contrast: grid.contrast(),
            rotation_deg: triple.top_left.angle_to(&triple.top_right),
        };
        Some(PartialDecode::new(
            Symbology::QrCode,
            codewords,
            damage,
            Layout::Qr(QrLayout {
                version,
                ec_level: format.ec_level,
                mask: format.mask,
            }),
            bounds,
            quality,
        ))
    }

    /// Blocks of `codewords` (interleaved order) with their layout
    fn blocks(partial: &PartialDecode, codewords: &[u16]) -> Option<(QrLayout, BlockLayout, Vec<Vec<u8>>)> {
        let Layout::Qr(qr) = partial.layout() else {
            return None;
        };
        let layout = BlockLayout::new(qr.version, qr.ec_level)?;
        if codewords.len() != layout.total_codewords {
            return None;
        }
        let bytes = codewords
            .iter()
            .map(|&c| u8::try_from(c).ok())
            .collect::<Option<Vec<u8>>>()?;
        let blocks = layout.deinterleave(&bytes)?;
        Some((qr, layout, blocks))
    }

    fn data_of(layout: &BlockLayout, blocks: &[Vec<u8>]) -> Vec<u8> {
        blocks
            .iter()
            .enumerate()
            .flat_map(|(b, block)| block[..layout.data_len(b)].iter().copied())
            .collect()
    }
}

impl SymbolDecoder for QrDecoder {
    fn symbology(&self) -> Symbology {
        Symbology::QrCode
    }

    fn try_decode(&self, attempt: &DecodeAttempt<'_, '_>) -> Result<PartialDecode, NotThisSymbology> {
        let image = attempt.context().image();
        let bounds = attempt.context().region().bounds();
        let margin = 16.max(bounds.width.max(bounds.height) / 10);
        let window = bounds.expanded(margin, image.width(), image.height());
        let binary = otsu_binarize_window(image, window);
        let patterns = FinderDetector::detect(&binary);
        if patterns.len() < 3 {
            return Err(NotThisSymbology);
        }

        let (ox, oy) = (window.x as f32, window.y as f32);
        for local in group_finder_patterns(&patterns, MAX_TRIPLES) {
            let triple = FinderTriple {
                top_left: local.top_left.translate(ox, oy),
                top_right: local.top_right.translate(ox, oy),
                bottom_left: local.bottom_left.translate(ox, oy),
                ..local
            };
            let base = triple.dimension;
            for dim in [Some(base), base.checked_add(4), base.checked_sub(4)]
                .into_iter()
                .flatten()
                .filter(|&d| version_for_dimension(d).is_some())
            {
                let candidate = triple.with_dimension(dim);
                let Some(grid) = sample_grid(image, &candidate) else {
                    continue;
                };
                if let Some(partial) = Self::read_grid(&grid, &candidate, (image.width(), image.height())) {
                    return Ok(partial);
                }
                trace!(dim, "grid rejected");
            }
        }
        Err(NotThisSymbology)
    }

    fn is_valid(&self, partial: &PartialDecode, codewords: &[u16]) -> bool {
        let Some((qr, layout, blocks)) = Self::blocks(partial, codewords) else {
            return false;
        };
        let rs = ReedSolomon::new(layout.ecc_per_block);
        blocks.iter().all(|b| rs.is_codeword(b))
            && payload::parse(&Self::data_of(&layout, &blocks), qr.version).is_some()
    }

    fn correct(&self, partial: &PartialDecode, erasures: &[usize]) -> Option<EccOutcome> {
        let (_, layout, mut blocks) = Self::blocks(partial, partial.codewords())?;
        let order = layout.interleave_order();
        let mut per_block: Vec<Vec<usize>> = vec![Vec::new(); layout.blocks];
        for &i in erasures {
            let &(b, j) = order.get(i)?;
            per_block[b].push(j);
        }

        let rs = ReedSolomon::new(layout.ecc_per_block);
        let (mut errors, mut erased, mut changed) = (0, 0, 0);
        for (block, erasures) in blocks.iter_mut().zip(&per_block) {
            let fix = match rs.decode(block, erasures) {
                Ok(fix) => fix,
                Err(e) => {
                    trace!(error = %e, "erasure decode failed, retrying errors-only");
                    rs.decode(block, &[]).ok()?
                }
            };
            errors += fix.errors;
            erased += fix.erasures;
            changed += fix.changed.len();
        }
        Some(EccOutcome {
            codewords: layout.interleave(&blocks).into_iter().map(u16::from).collect(),
            errors,
            erasures: erased,
            capacity: layout.ecc_codewords(),
            changed,
        })
    }

    fn assemble(&self, partial: &PartialDecode, codewords: &[u16]) -> Option<Payload> {
        if !self.is_valid(partial, codewords) {
            return None;
        }
        let (qr, layout, blocks) = Self::blocks(partial, codewords)?;
        payload::parse(&Self::data_of(&layout, &blocks), qr.version)
    }
}
