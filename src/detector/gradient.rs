/// Per-cell gradient statistics for region location.
///
/// Each cell accumulates Scharr gradients into a structure tensor plus simple
/// intensity moments. Everything is integer/float accumulation in one pass
/// over the window. Scharr weights keep the gradient direction close to the
/// true edge normal at any angle, where plain central differences drift
/// toward the diagonals on thin bars.
use crate::models::{NormalizedImage, Rect};

/// Number of 5-degree bins covering [0, 180)
pub const ANGLE_BINS: usize = 36;
const BIN_WIDTH: f32 = 180.0 / ANGLE_BINS as f32;

/// Accumulated statistics of one cell
#[derive(Debug, Clone, Copy)]
pub struct CellStats {
    /// Sum of |gx| + |gy|
    pub energy: f32,
    /// Structure tensor components
    pub jxx: f32,
    /// Structure tensor components
    pub jyy: f32,
    /// Structure tensor components
    pub jxy: f32,
    /// Darkest sample
    pub min: u8,
    /// Brightest sample
    pub max: u8,
    /// Sum of samples
    pub sum: u64,
    /// Sum of squared samples
    pub sum_sq: u64,
    /// Number of samples
    pub count: u32,
}

impl Default for CellStats {
    fn default() -> Self {
        Self {
            energy: 0.0,
            jxx: 0.0,
            jyy: 0.0,
            jxy: 0.0,
            min: u8::MAX,
            max: 0,
            sum: 0,
            sum_sq: 0,
            count: 0,
        }
    }
}

impl CellStats {
    /// Mean gradient magnitude per pixel
    pub fn mean_energy(&self) -> f32 {
        if self.count == 0 { 0.0 } else { self.energy / self.count as f32 }
    }

    /// Intensity range
    pub fn range(&self) -> u8 {
        self.max.saturating_sub(self.min)
    }

    fn merge(&mut self, other: &CellStats) {
        self.energy += other.energy;
        self.jxx += other.jxx;
        self.jyy += other.jyy;
        self.jxy += other.jxy;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
        self.count += other.count;
    }
}

/// Cell statistics over a window, laid out row-major
pub struct CellGrid {
    /// Cell side in pixels
    pub cell: usize,
    /// Window the grid covers
    pub window: Rect,
    /// Cells per row
    pub cols: usize,
    /// Cell rows
    pub rows: usize,
    cells: Vec<CellStats>,
}

impl CellGrid {
    /// Accumulate gradients for every pixel of `window`
    pub fn compute(image: &NormalizedImage, window: Rect, cell: usize) -> Self {
        let cols = window.width.div_ceil(cell).max(1);
        let rows = window.height.div_ceil(cell).max(1);
        let mut cells = vec![CellStats::default(); cols * rows];
        let (w, h) = (image.width(), image.height());
        let px = image.pixels();

        for y in window.y..window.bottom() {
            let row = (y - window.y) / cell;
            for x in window.x..window.right() {
                let col = (x - window.x) / cell;
                let (gx, gy) = scharr(px, w, h, x, y);
                let v = px[y * w + x];

                let c = &mut cells[row * cols + col];
                c.energy += gx.abs() + gy.abs();
                c.jxx += gx * gx;
                c.jyy += gy * gy;
                c.jxy += gx * gy;
                c.min = c.min.min(v);
                c.max = c.max.max(v);
                c.sum += v as u64;
                c.sum_sq += v as u64 * v as u64;
                c.count += 1;
            }
        }

        Self {
            cell,
            window,
            cols,
            rows,
            cells,
        }
    }

    /// Stats of cell (col, row)
    pub fn get(&self, col: usize, row: usize) -> &CellStats {
        &self.cells[row * self.cols + col]
    }

    /// Pixel rectangle of a cell range (inclusive cell coordinates)
    pub fn cell_rect(&self, col0: usize, row0: usize, col1: usize, row1: usize) -> Rect {
        let x0 = self.window.x + col0 * self.cell;
        let y0 = self.window.y + row0 * self.cell;
        let x1 = (self.window.x + (col1 + 1) * self.cell).min(self.window.right());
        let y1 = (self.window.y + (row1 + 1) * self.cell).min(self.window.bottom());
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Merged stats over a set of cells
    pub fn aggregate(&self, cells: &[(usize, usize)]) -> CellStats {
        let mut total = CellStats::default();
        for &(c, r) in cells {
            total.merge(self.get(c, r));
        }
        total
    }

    /// Merged stats over every cell in an inclusive cell rectangle
    pub fn aggregate_rect(&self, col0: usize, row0: usize, col1: usize, row1: usize) -> CellStats {
        let mut total = CellStats::default();
        for r in row0..=row1.min(self.rows - 1) {
            for c in col0..=col1.min(self.cols - 1) {
                total.merge(self.get(c, r));
            }
        }
        total
    }
}

/// Scharr gradient at (x, y), scaled to match a central difference on a
/// straight edge. Borders are clamped.
pub fn scharr(px: &[u8], width: usize, height: usize, x: usize, y: usize) -> (f32, f32) {
    let (l, r) = (x.saturating_sub(1), (x + 1).min(width - 1));
    let (u, d) = (y.saturating_sub(1), (y + 1).min(height - 1));
    let at = |xx: usize, yy: usize| px[yy * width + xx] as f32;
    let gx = 3.0 * (at(r, u) - at(l, u)) + 10.0 * (at(r, y) - at(l, y)) + 3.0 * (at(r, d) - at(l, d));
    let gy = 3.0 * (at(l, d) - at(l, u)) + 10.0 * (at(x, d) - at(x, u)) + 3.0 * (at(r, d) - at(r, u));
    (gx / 16.0, gy / 16.0)
}

/// Dominant gradient direction of a structure tensor, degrees in [0, 180)
pub fn tensor_angle(stats: &CellStats) -> f32 {
    (0.5 * (2.0 * stats.jxy).atan2(stats.jxx - stats.jyy).to_degrees()).rem_euclid(180.0)
}

/// Orientation coherence of a structure tensor, 0 (isotropic) to 1 (one direction)
pub fn coherence(stats: &CellStats) -> f32 {
    let trace = stats.jxx + stats.jyy;
    if trace <= f32::EPSILON {
        return 0.0;
    }
    let diff = stats.jxx - stats.jyy;
    (diff * diff + 4.0 * stats.jxy * stats.jxy).sqrt() / trace
}

/// Intensity variance of the accumulated samples
pub fn variance(stats: &CellStats) -> f32 {
    if stats.count == 0 {
        return 0.0;
    }
    let n = stats.count as f64;
    let mean = stats.sum as f64 / n;
    (stats.sum_sq as f64 / n - mean * mean).max(0.0) as f32
}

/// Magnitude-weighted histogram of gradient directions (mod 180) over a rectangle
pub fn angle_histogram(image: &NormalizedImage, rect: Rect) -> [f32; ANGLE_BINS] {
    let mut hist = [0.0f32; ANGLE_BINS];
    let (w, h) = (image.width(), image.height());
    let px = image.pixels();
    for y in rect.y..rect.bottom().min(h) {
        for x in rect.x..rect.right().min(w) {
            let (gx, gy) = scharr(px, w, h, x, y);
            let magnitude = gx.hypot(gy);
            if magnitude < 16.0 {
                continue;
            }
            let deg = gy.atan2(gx).to_degrees().rem_euclid(180.0);
            // bins are centered on multiples of BIN_WIDTH
            let bin = ((deg / BIN_WIDTH).round() as usize) % ANGLE_BINS;
            hist[bin] += magnitude;
        }
    }
    hist
}

/// Peak direction of a histogram with `period` degrees of symmetry (180 or 90).
///
/// Returns the refined peak angle in degrees and the fraction of the total
/// weight within one bin of the peak.
pub fn dominant_angle(hist: &[f32; ANGLE_BINS], period: f32) -> (f32, f32) {
    let fold = (period / BIN_WIDTH).round() as usize;
    let mut folded = vec![0.0f32; fold];
    for (i, &v) in hist.iter().enumerate() {
        folded[i % fold] += v;
    }
    let total: f32 = folded.iter().sum();
    if total <= 0.0 {
        return (0.0, 0.0);
    }
    let peak = (0..fold)
        .max_by(|&a, &b| folded[a].total_cmp(&folded[b]))
        .unwrap_or(0);
    let prev = (peak + fold - 1) % fold;
    let next = (peak + 1) % fold;
    let (wp, wc, wn) = (folded[prev], folded[peak], folded[next]);
    // weighted mean of the peak and its neighbours
    let offset = (wn - wp) / (wp + wc + wn).max(f32::EPSILON);
    let angle = ((peak as f32 + offset) * BIN_WIDTH).rem_euclid(period);
    (angle, (wp + wc + wn) / total)
}

/// Histogram weight within one bin of `angle`
pub fn mass_near(hist: &[f32; ANGLE_BINS], angle: f32) -> f32 {
    let center = ((angle.rem_euclid(180.0) / BIN_WIDTH).round() as usize) % ANGLE_BINS;
    (0..3)
        .map(|d| hist[(center + ANGLE_BINS + d - 1) % ANGLE_BINS])
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stripes(width: usize, height: usize, period: usize, vertical: bool) -> NormalizedImage {
        let mut px = vec![0u8; width * height];
        for y in 0..height {
            for x in 0..width {
                let t = if vertical { x } else { y };
                px[y * width + x] = if (t / period) % 2 == 0 { 0 } else { 255 };
            }
        }
        NormalizedImage::from_gray(px, width, height).unwrap()
    }

    #[test]
    fn test_vertical_bars_are_coherent() {
        let img = stripes(64, 64, 3, true);
        let grid = CellGrid::compute(&img, img.bounds(), 16);
        assert_eq!((grid.cols, grid.rows), (4, 4));
        let stats = grid.aggregate_rect(0, 0, 3, 3);
        assert!(coherence(&stats) > 0.95);
        assert!(stats.mean_energy() > 50.0);
        assert_eq!(stats.range(), 255);

        let hist = angle_histogram(&img, img.bounds());
        let (angle, share) = dominant_angle(&hist, 180.0);
        assert!(angle < 1.0 || angle > 179.0, "angle {angle}");
        assert!(share > 0.9);
    }

    #[test]
    fn test_tensor_angle_of_stripes() {
        let vertical = stripes(64, 64, 3, true);
        let grid = CellGrid::compute(&vertical, vertical.bounds(), 16);
        let angle = tensor_angle(&grid.aggregate_rect(0, 0, 3, 3));
        assert!(angle < 0.5 || angle > 179.5, "angle {angle}");

        let horizontal = stripes(64, 64, 4, false);
        let grid = CellGrid::compute(&horizontal, horizontal.bounds(), 16);
        let angle = tensor_angle(&grid.aggregate_rect(0, 0, 3, 3));
        assert!((angle - 90.0).abs() < 0.5, "angle {angle}");
    }

    #[test]
    fn test_horizontal_bars_point_down() {
        let img = stripes(64, 64, 4, false);
        let hist = angle_histogram(&img, img.bounds());
        let (angle, _) = dominant_angle(&hist, 180.0);
        assert!((angle - 90.0).abs() < 5.0, "angle {angle}");
    }

    #[test]
    fn test_checkerboard_is_isotropic() {
        let mut px = vec![0u8; 64 * 64];
        for y in 0..64 {
            for x in 0..64 {
                px[y * 64 + x] = if ((x / 4) + (y / 4)) % 2 == 0 { 0 } else { 255 };
            }
        }
        let img = NormalizedImage::from_gray(px, 64, 64).unwrap();
        let grid = CellGrid::compute(&img, img.bounds(), 8);
        assert!(coherence(&grid.aggregate_rect(0, 0, 7, 7)) < 0.2);
        let hist = angle_histogram(&img, img.bounds());
        let (angle, _) = dominant_angle(&hist, 90.0);
        assert!(mass_near(&hist, angle) > 0.0);
        assert!(mass_near(&hist, angle + 90.0) > 0.5 * mass_near(&hist, angle));
    }

    #[test]
    fn test_blank_has_no_energy() {
        let img = NormalizedImage::from_gray(vec![255; 32 * 32], 32, 32).unwrap();
        let grid = CellGrid::compute(&img, img.bounds(), 8);
        assert_eq!(grid.get(1, 1).mean_energy(), 0.0);
        assert_eq!(variance(grid.get(1, 1)), 0.0);
    }
}
