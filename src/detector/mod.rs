//! Region location: find sub-areas of an image that look like barcodes.
//!
//! The image is swept at two cell scales. Cells with strong gradients and a
//! wide intensity range are marked active, the mask is closed to bridge quiet
//! gaps inside symbols, and each connected blob becomes a candidate. The
//! structure tensor of the blob tells bars (one dominant direction) from
//! module grids (two perpendicular directions). Bars take their rotation from
//! the tensor itself; grids use a coarse 5-degree histogram of gradient
//! directions folded to 90 degrees.

pub mod components;
pub mod finder;
pub mod gradient;

use crate::config::ScanOptions;
use crate::models::{BitMatrix, CandidateRegion, NormalizedImage, Rect, RegionClass};
use components::label_components;
use gradient::{
    CellGrid, CellStats, angle_histogram, coherence, dominant_angle, mass_near, tensor_angle,
    variance,
};
use tracing::{debug, trace};

/// Cell sizes in pixels, fine to coarse
const CELL_SIZES: [usize; 2] = [8, 16];
/// Mean |gx| + |gy| per pixel for an active cell
const MIN_MEAN_ENERGY: f32 = 20.0;
/// Minimum intensity range inside an active cell
const MIN_RANGE: u8 = 48;
/// Smallest region side in pixels
const MIN_SIDE: usize = 16;
/// Smallest number of active cells in a region
const MIN_CELLS: usize = 3;
/// Tensor coherence above which a region is treated as bars
const LINEAR_COHERENCE: f32 = 0.6;

/// Finds candidate regions
#[derive(Debug, Clone)]
pub struct RegionLocator {
    crop: Option<Rect>,
    overlap_tolerance: f32,
}

impl RegionLocator {
    /// Locator configured from scan options (crop area and overlap tolerance)
    pub fn new(options: &ScanOptions) -> Self {
        Self {
            crop: options.crop_area,
            overlap_tolerance: options.overlap_tolerance,
        }
    }

    /// Locator with an explicit search window (image coordinates)
    pub fn with_window(crop: Option<Rect>, overlap_tolerance: f32) -> Self {
        Self {
            crop,
            overlap_tolerance,
        }
    }

    /// Candidate regions, most barcode-like first.
    ///
    /// Regions never overlap by more than the configured tolerance: the one
    /// with higher contrast variance is kept, then the larger one.
    pub fn locate(&self, image: &NormalizedImage) -> std::vec::IntoIter<CandidateRegion> {
        let window = match self.crop {
            Some(crop) => match crop.clipped(image.width(), image.height()) {
                Some(w) => w,
                None => return Vec::new().into_iter(),
            },
            None => image.bounds(),
        };

        let mut candidates: Vec<CandidateRegion> = CELL_SIZES
            .iter()
            .filter(|&&cell| window.width >= 2 * cell && window.height >= 2 * cell)
            .flat_map(|&cell| regions_at_scale(image, window, cell))
            .collect();

        candidates.sort_by(|a, b| {
            b.contrast_variance()
                .total_cmp(&a.contrast_variance())
                .then(b.bounds().area().cmp(&a.bounds().area()))
                .then((a.bounds().y, a.bounds().x).cmp(&(b.bounds().y, b.bounds().x)))
        });

        let mut kept: Vec<CandidateRegion> = Vec::new();
        for candidate in candidates {
            let duplicate = kept.iter().any(|k| {
                k.bounds().overlap_ratio(&candidate.bounds()) > self.overlap_tolerance
            });
            if duplicate {
                trace!(bounds = ?candidate.bounds(), "dropping overlapping region");
                continue;
            }
            kept.push(candidate);
        }
        debug!(regions = kept.len(), "located regions");
        kept.into_iter()
    }
}

fn regions_at_scale(image: &NormalizedImage, window: Rect, cell: usize) -> Vec<CandidateRegion> {
    let grid = CellGrid::compute(image, window, cell);
    let active = BitMatrix::from_fn(grid.cols, grid.rows, |c, r| {
        let s = grid.get(c, r);
        s.mean_energy() >= MIN_MEAN_ENERGY && s.range() >= MIN_RANGE
    });
    let closed = active.dilate(1).erode(1);

    let mut regions = Vec::new();
    for component in label_components(&closed) {
        let members: Vec<(usize, usize)> = component
            .iter()
            .copied()
            .filter(|&(c, r)| active.get(c, r))
            .collect();
        if members.len() < MIN_CELLS {
            continue;
        }
        let col0 = component.iter().map(|p| p.0).min().unwrap_or(0);
        let col1 = component.iter().map(|p| p.0).max().unwrap_or(0);
        let row0 = component.iter().map(|p| p.1).min().unwrap_or(0);
        let row1 = component.iter().map(|p| p.1).max().unwrap_or(0);
        let core = grid.cell_rect(col0, row0, col1, row1);
        if core.width < MIN_SIDE || core.height < MIN_SIDE {
            continue;
        }

        let tensor = grid.aggregate(&members);
        let contrast_variance = variance(&grid.aggregate_rect(col0, row0, col1, row1));
        let hist = angle_histogram(image, core);
        let (class, rotation) = classify(&tensor, &hist);
        let bounds = core.expanded(cell, image.width(), image.height());
        trace!(?bounds, ?class, rotation, cell, "candidate region");
        regions.push(CandidateRegion::new(bounds, rotation, class, contrast_variance));
    }
    regions
}

fn classify(tensor: &CellStats, hist: &[f32; gradient::ANGLE_BINS]) -> (RegionClass, f32) {
    if coherence(tensor) >= LINEAR_COHERENCE {
        return (RegionClass::Linear, tensor_angle(tensor));
    }
    let total: f32 = hist.iter().sum();
    let (grid_angle, _) = dominant_angle(hist, 90.0);
    let primary = mass_near(hist, grid_angle);
    let secondary = mass_near(hist, grid_angle + 90.0);
    if total > 0.0 && (primary + secondary) / total >= 0.5 && secondary >= 0.35 * primary {
        (RegionClass::Matrix, grid_angle)
    } else {
        (RegionClass::Unknown, dominant_angle(hist, 180.0).0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas(width: usize, height: usize) -> Vec<u8> {
        vec![255u8; width * height]
    }

    fn paint_bars(px: &mut [u8], width: usize, x0: usize, y0: usize, w: usize, h: usize) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                if ((x - x0) / 3) % 2 == 0 {
                    px[y * width + x] = 0;
                }
            }
        }
    }

    fn paint_checker(px: &mut [u8], width: usize, x0: usize, y0: usize, side: usize) {
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                if (((x - x0) / 4) * 7 + ((y - y0) / 4) * 3) % 5 < 2 {
                    px[y * width + x] = 0;
                }
            }
        }
    }

    #[test]
    fn test_blank_image_has_no_regions() {
        let img = NormalizedImage::from_gray(canvas(200, 100), 200, 100).unwrap();
        let locator = RegionLocator::with_window(None, 0.3);
        assert_eq!(locator.locate(&img).count(), 0);
    }

    #[test]
    fn test_bars_are_linear() {
        let mut px = canvas(300, 200);
        paint_bars(&mut px, 300, 60, 50, 150, 80);
        let img = NormalizedImage::from_gray(px, 300, 200).unwrap();
        let regions: Vec<_> = RegionLocator::with_window(None, 0.3).locate(&img).collect();
        assert_eq!(regions.len(), 1);
        let r = &regions[0];
        assert_eq!(r.class(), RegionClass::Linear);
        assert!(r.rotation_deg() < 3.0 || r.rotation_deg() > 177.0);
        let b = r.bounds();
        assert!(b.x <= 60 && b.right() >= 210);
        assert!(b.y <= 50 && b.bottom() >= 130);
    }

    #[test]
    fn test_rotated_bars_report_their_angle() {
        for deg in [20.0f32, 35.0, 160.0] {
            let (width, height) = (300, 240);
            let mut px = canvas(width, height);
            let (sin, cos) = deg.to_radians().sin_cos();
            for y in 60..180 {
                for x in 90..210 {
                    let u = (x - 90) as f32 * cos + (y - 60) as f32 * sin;
                    if (u / 3.0).floor().rem_euclid(2.0) == 0.0 {
                        px[y * width + x] = 0;
                    }
                }
            }
            let img = NormalizedImage::from_gray(px, width, height).unwrap();
            let regions: Vec<_> = RegionLocator::with_window(None, 0.3).locate(&img).collect();
            assert_eq!(regions.len(), 1, "{deg}");
            assert_eq!(regions[0].class(), RegionClass::Linear);
            let rotation = regions[0].rotation_deg();
            assert!((rotation - deg).abs() < 2.0, "{deg}: {rotation}");
        }
    }

    #[test]
    fn test_grid_is_matrix() {
        let mut px = canvas(200, 200);
        paint_checker(&mut px, 200, 50, 50, 100);
        let img = NormalizedImage::from_gray(px, 200, 200).unwrap();
        let regions: Vec<_> = RegionLocator::with_window(None, 0.3).locate(&img).collect();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].class(), RegionClass::Matrix);
    }

    #[test]
    fn test_two_separate_symbols() {
        let mut px = canvas(500, 200);
        paint_bars(&mut px, 500, 30, 40, 120, 100);
        paint_checker(&mut px, 500, 320, 40, 100);
        let img = NormalizedImage::from_gray(px, 500, 200).unwrap();
        let regions: Vec<_> = RegionLocator::with_window(None, 0.3).locate(&img).collect();
        assert_eq!(regions.len(), 2);
        for (i, a) in regions.iter().enumerate() {
            for b in &regions[i + 1..] {
                assert!(a.bounds().overlap_ratio(&b.bounds()) <= 0.3);
            }
        }
    }

    #[test]
    fn test_crop_restricts_search() {
        let mut px = canvas(500, 200);
        paint_bars(&mut px, 500, 30, 40, 120, 100);
        paint_checker(&mut px, 500, 320, 40, 100);
        let img = NormalizedImage::from_gray(px, 500, 200).unwrap();
        let locator = RegionLocator::with_window(Some(Rect::new(250, 0, 250, 200)), 0.3);
        let regions: Vec<_> = locator.locate(&img).collect();
        assert_eq!(regions.len(), 1);
        assert!(regions[0].bounds().x >= 250);
        assert!(locator.locate(&img).all(|r| r.bounds().fits_within(500, 200)));
    }
}
