//! Module grid sampling and codeword placement.
//!
//! The grid is sampled through a homography fitted to the finder centers.
//! Each module is read as the mean of five points around its center and
//! gets a confidence from its distance to the grid's own Otsu threshold.

use super::format::mask_bit;
use super::function_mask::FunctionMask;
use crate::detector::finder::FinderTriple;
use crate::models::{BitMatrix, NormalizedImage, Point};
use crate::utils::binarization::otsu_threshold_f32;
use crate::utils::geometry::PerspectiveTransform;

/// Below this a module reads as uncertain
pub const MIN_MODULE_CONFIDENCE: f32 = 0.25;
const SAMPLE_OFFSET: f32 = 0.2;
const MIN_GRID_CONTRAST: f32 = 24.0;
const MAX_LOW_CONFIDENCE_FRACTION: f32 = 0.5;

/// A sampled module grid
#[derive(Debug, Clone)]
pub struct SampledGrid {
    modules: BitMatrix,
    confidence: Vec<f32>,
    flagged: BitMatrix,
    contrast: f32,
    corners: [Point; 4],
}

impl SampledGrid {
    /// Side length in modules
    pub fn size(&self) -> usize {
        self.modules.width()
    }

    /// Module values, set = dark
    pub fn modules(&self) -> &BitMatrix {
        &self.modules
    }

    /// Confidence of module `(x, y)` in `[0, 1]`
    pub fn confidence(&self, x: usize, y: usize) -> f32 {
        self.confidence[y * self.size() + x]
    }

    /// Whether module `(x, y)` is uncertain: weak contrast, or part of a
    /// solid dark blot (a full dark 3x3 block and the dark modules around it)
    pub fn is_flagged(&self, x: usize, y: usize) -> bool {
        self.flagged.get(x, y)
    }

    /// Dark/light separation in `[0, 1]`
    pub fn contrast(&self) -> f32 {
        self.contrast
    }

    /// Image positions of the symbol's outer corners (tl, tr, bl, br)
    pub fn corners(&self) -> [Point; 4] {
        self.corners
    }

    /// Fraction of timing-pattern modules that disagree with the expected
    /// alternation, a cheap check that the grid size is right
    pub fn timing_mismatch(&self) -> f32 {
        let size = self.size();
        if size < 17 {
            return 1.0;
        }
        let mut wrong = 0;
        let mut total = 0;
        for i in 8..size - 8 {
            let expect = i % 2 == 0;
            wrong += usize::from(self.modules.get(i, 6) != expect);
            wrong += usize::from(self.modules.get(6, i) != expect);
            total += 2;
        }
        wrong as f32 / total as f32
    }
}

/// Sample the grid described by a finder triple.
///
/// Returns `None` when the homography degenerates, the grid has no usable
/// contrast, or more than half the modules are uncertain.
pub fn sample_grid(image: &NormalizedImage, triple: &FinderTriple) -> Option<SampledGrid> {
    let dim = triple.dimension;
    let d = dim as f32;
    let src = [
        Point::new(3.5, 3.5),
        Point::new(d - 3.5, 3.5),
        Point::new(3.5, d - 3.5),
        Point::new(d - 3.5, d - 3.5),
    ];
    let dst = [
        triple.top_left,
        triple.top_right,
        triple.bottom_left,
        triple.bottom_right(),
    ];
    let transform = PerspectiveTransform::from_points(&src, &dst)?;

    let corners = [
        Point::new(0.0, 0.0),
        Point::new(d, 0.0),
        Point::new(0.0, d),
        Point::new(d, d),
    ]
    .map(|p| transform.transform(&p));
    let slack = 2.0 * triple.module_size;
    let (w, h) = (image.width() as f32, image.height() as f32);
    if corners
        .iter()
        .any(|c| c.x < -slack || c.y < -slack || c.x > w + slack || c.y > h + slack)
    {
        return None;
    }

    let offsets = [
        (0.0, 0.0),
        (-SAMPLE_OFFSET, 0.0),
        (SAMPLE_OFFSET, 0.0),
        (0.0, -SAMPLE_OFFSET),
        (0.0, SAMPLE_OFFSET),
    ];
    let mut samples = Vec::with_capacity(dim * dim);
    for y in 0..dim {
        for x in 0..dim {
            let total: f32 = offsets
                .iter()
                .map(|&(ox, oy)| {
                    let p = transform.transform(&Point::new(x as f32 + 0.5 + ox, y as f32 + 0.5 + oy));
                    image.sample(p.x - 0.5, p.y - 0.5)
                })
                .sum();
            samples.push(total / offsets.len() as f32);
        }
    }

    let threshold = otsu_threshold_f32(&samples);
    let (mut dark_sum, mut dark_n, mut light_sum, mut light_n) = (0.0f32, 0usize, 0.0f32, 0usize);
    for &s in &samples {
        if s < threshold {
            dark_sum += s;
            dark_n += 1;
        } else {
            light_sum += s;
            light_n += 1;
        }
    }
    if dark_n == 0 || light_n == 0 {
        return None;
    }
    let spread = light_sum / light_n as f32 - dark_sum / dark_n as f32;
    if spread < MIN_GRID_CONTRAST {
        return None;
    }

    let modules = BitMatrix::from_fn(dim, dim, |x, y| samples[y * dim + x] < threshold);
    let confidence: Vec<f32> = samples
        .iter()
        .map(|&s| ((s - threshold).abs() / (0.5 * spread)).min(1.0))
        .collect();
    let low = confidence.iter().filter(|&&c| c < MIN_MODULE_CONFIDENCE).count();
    if low as f32 > MAX_LOW_CONFIDENCE_FRACTION * (dim * dim) as f32 {
        return None;
    }
    // solid dark cores and the dark modules touching them read as a blot
    let solid = BitMatrix::from_fn(dim, dim, |x, y| modules.neighborhood_all_set(x, y)).dilate(1);
    let flagged = BitMatrix::from_fn(dim, dim, |x, y| {
        confidence[y * dim + x] < MIN_MODULE_CONFIDENCE || (solid.get(x, y) && modules.get(x, y))
    });

    Some(SampledGrid {
        modules,
        confidence,
        flagged,
        contrast: (spread / 255.0).clamp(0.0, 1.0),
        corners,
    })
}

/// Data module positions `(x, y)` in placement order
pub fn data_positions(function: &FunctionMask) -> Vec<(usize, usize)> {
    let size = function.size();
    let mut out = Vec::with_capacity(function.data_modules());
    let mut right = size as isize - 1;
    while right >= 1 {
        if right == 6 {
            right = 5;
        }
        let upward = ((right + 1) & 2) == 0;
        for vert in 0..size {
            let y = if upward { size - 1 - vert } else { vert };
            for j in 0..2 {
                let x = right as usize - j;
                if !function.is_function(x, y) {
                    out.push((x, y));
                }
            }
        }
        right -= 2;
    }
    out
}

/// Unmasked codewords in placement (interleaved) order, remainder bits dropped
pub fn read_codewords(modules: &BitMatrix, positions: &[(usize, usize)], mask: u8) -> Vec<u8> {
    positions
        .chunks_exact(8)
        .map(|chunk| {
            chunk.iter().fold(0u8, |acc, &(x, y)| {
                (acc << 1) | u8::from(modules.get(x, y) ^ mask_bit(mask, x, y))
            })
        })
        .collect()
}

/// Write codewords into the data area with `mask` applied; remainder bits are 0
pub fn place_codewords(
    modules: &mut BitMatrix,
    positions: &[(usize, usize)],
    mask: u8,
    codewords: &[u8],
) {
    for (i, &(x, y)) in positions.iter().enumerate() {
        let bit = codewords
            .get(i / 8)
            .is_some_and(|&c| (c >> (7 - i % 8)) & 1 == 1);
        modules.set(x, y, bit ^ mask_bit(mask, x, y));
    }
}
