/// QR finder pattern detection: 1:1:3:1:1 row scan confirmed by a vertical
/// and a horizontal cross-check, then grouping of finder triples.
use crate::models::{BitMatrix, Point};

/// A confirmed finder pattern center
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinderPattern {
    /// Center in matrix coordinates
    pub center: Point,
    /// Estimated module size in pixels
    pub module_size: f32,
    /// Number of scan rows that confirmed this pattern
    pub count: usize,
}

impl FinderPattern {
    /// New pattern seen once
    pub fn new(x: f32, y: f32, module_size: f32) -> Self {
        Self {
            center: Point::new(x, y),
            module_size,
            count: 1,
        }
    }
}

/// Three finder patterns in symbol order plus the derived grid size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinderTriple {
    /// Top-left finder center
    pub top_left: Point,
    /// Top-right finder center
    pub top_right: Point,
    /// Bottom-left finder center
    pub bottom_left: Point,
    /// Module size derived from finder distances
    pub module_size: f32,
    /// Symbol side in modules (17 + 4 * version)
    pub dimension: usize,
}

impl FinderTriple {
    /// Fourth corner of the parallelogram spanned by the finders
    pub fn bottom_right(&self) -> Point {
        Point::new(
            self.top_right.x + self.bottom_left.x - self.top_left.x,
            self.top_right.y + self.bottom_left.y - self.top_left.y,
        )
    }

    /// Same finders, different grid size
    pub fn with_dimension(&self, dimension: usize) -> Self {
        Self { dimension, ..*self }
    }
}

/// Stateless detector
pub struct FinderDetector;

impl FinderDetector {
    /// Find finder patterns in a binarized window (true = dark)
    pub fn detect(matrix: &BitMatrix) -> Vec<FinderPattern> {
        let mut candidates = Vec::new();
        for y in 0..matrix.height() {
            Self::scan_row(matrix, y, &mut candidates);
        }
        Self::merge_candidates(candidates)
    }

    fn scan_row(matrix: &BitMatrix, y: usize, out: &mut Vec<FinderPattern>) {
        let width = matrix.width();
        if width < 7 {
            return;
        }
        // (start, length, dark) runs
        let mut runs: Vec<(usize, usize, bool)> = Vec::new();
        let mut start = 0usize;
        let mut color = matrix.get(0, y);
        for x in 1..=width {
            let c = x < width && matrix.get(x, y);
            if x == width || c != color {
                runs.push((start, x - start, color));
                start = x;
                color = c;
            }
        }
        for w in runs.windows(5) {
            if !(w[0].2 && !w[1].2 && w[2].2 && !w[3].2 && w[4].2) {
                continue;
            }
            let counts = [w[0].1, w[1].1, w[2].1, w[3].1, w[4].1];
            let Some(unit) = finder_ratio(&counts) else {
                continue;
            };
            let center_x = w[2].0 as f32 + w[2].1 as f32 / 2.0;
            let total = counts.iter().sum::<usize>();
            if let Some(p) = Self::confirm(matrix, center_x, y as f32 + 0.5, total, unit) {
                out.push(p);
            }
        }
    }

    /// Cross-check vertically, then re-center horizontally
    fn confirm(
        matrix: &BitMatrix,
        center_x: f32,
        center_y: f32,
        total: usize,
        row_unit: f32,
    ) -> Option<FinderPattern> {
        let cx = center_x.floor() as usize;
        let (cy, v_unit) = cross_check(matrix, cx, center_y.floor() as usize, total, Axis::Vertical)?;
        let (cx, h_unit) = cross_check(matrix, cy.floor() as usize, cx, total, Axis::Horizontal)?;
        let module = (row_unit + v_unit + h_unit) / 3.0;
        Some(FinderPattern::new(cx, cy, module))
    }

    fn merge_candidates(candidates: Vec<FinderPattern>) -> Vec<FinderPattern> {
        let mut merged: Vec<FinderPattern> = Vec::new();
        for candidate in candidates {
            let existing = merged.iter_mut().find(|e| {
                let limit = e.module_size.max(candidate.module_size) * 2.0;
                let ratio = e.module_size.max(candidate.module_size)
                    / e.module_size.min(candidate.module_size);
                e.center.distance(&candidate.center) < limit && ratio < 1.5
            });
            match existing {
                Some(e) => {
                    let n = e.count as f32;
                    e.center = Point::new(
                        (e.center.x * n + candidate.center.x) / (n + 1.0),
                        (e.center.y * n + candidate.center.y) / (n + 1.0),
                    );
                    e.module_size = (e.module_size * n + candidate.module_size) / (n + 1.0);
                    e.count += 1;
                }
                None => merged.push(candidate),
            }
        }
        merged.retain(|p| p.count >= 2);
        merged.sort_by(|a, b| b.count.cmp(&a.count));
        merged
    }
}

#[derive(Clone, Copy)]
enum Axis {
    Vertical,
    Horizontal,
}

/// Module size if the five run lengths follow 1:1:3:1:1
fn finder_ratio(counts: &[usize; 5]) -> Option<f32> {
    let total: usize = counts.iter().sum();
    if total < 7 || counts.contains(&0) {
        return None;
    }
    // the center must clearly outweigh the outer ring
    let outer = counts[0].min(counts[4]);
    if counts[2] < 2 * outer || counts[2] > 5 * outer {
        return None;
    }
    let unit = total as f32 / 7.0;
    let tolerance = unit * 0.7;
    let ok = (counts[0] as f32 - unit).abs() < tolerance
        && (counts[1] as f32 - unit).abs() < tolerance
        && (counts[2] as f32 - 3.0 * unit).abs() < 3.0 * tolerance
        && (counts[3] as f32 - unit).abs() < tolerance
        && (counts[4] as f32 - unit).abs() < tolerance;
    ok.then_some(unit)
}

/// Walk along `axis` through (fixed, start) and re-measure the pattern.
///
/// Returns the refined center coordinate along the axis and the module size.
fn cross_check(
    matrix: &BitMatrix,
    fixed: usize,
    start: usize,
    expected_total: usize,
    axis: Axis,
) -> Option<(f32, f32)> {
    let (limit, get): (usize, Box<dyn Fn(usize) -> bool + '_>) = match axis {
        Axis::Vertical => (matrix.height(), Box::new(move |i| matrix.get(fixed, i))),
        Axis::Horizontal => (matrix.width(), Box::new(move |i| matrix.get(i, fixed))),
    };
    if start >= limit || !get(start) {
        return None;
    }
    let max_run = expected_total;
    let mut counts = [0usize; 5];

    // backwards: center, inner light ring, outer dark ring
    let mut i = start as isize;
    for (slot, dark) in [(2usize, true), (1, false), (0, true)] {
        while i >= 0 && get(i as usize) == dark && counts[slot] <= max_run {
            counts[slot] += 1;
            i -= 1;
        }
    }
    // forwards
    let mut j = start + 1;
    for (slot, dark) in [(2usize, true), (3, false), (4, true)] {
        while j < limit && get(j) == dark && counts[slot] <= max_run {
            counts[slot] += 1;
            j += 1;
        }
    }

    let total: usize = counts.iter().sum();
    if 2 * total < expected_total || total > 2 * expected_total {
        return None;
    }
    let unit = finder_ratio(&counts)?;
    let center = j as f32 - counts[4] as f32 - counts[3] as f32 - counts[2] as f32 / 2.0;
    Some((center, unit))
}

/// Order three finders as (top-left, top-right, bottom-left) and size the grid
pub fn order_finder_patterns(
    a: &FinderPattern,
    b: &FinderPattern,
    c: &FinderPattern,
) -> Option<FinderTriple> {
    let patterns = [a, b, c];
    if patterns.iter().any(|p| p.module_size < 1.0) {
        return None;
    }

    // the corner with the angle closest to 90 degrees is top-left
    let corner_cos = |i: usize| {
        let p = patterns[i].center;
        let p1 = patterns[(i + 1) % 3].center;
        let p2 = patterns[(i + 2) % 3].center;
        let (v1x, v1y) = (p1.x - p.x, p1.y - p.y);
        let (v2x, v2y) = (p2.x - p.x, p2.y - p.y);
        let denom = (v1x * v1x + v1y * v1y).sqrt() * (v2x * v2x + v2y * v2y).sqrt();
        if denom == 0.0 {
            f32::INFINITY
        } else {
            ((v1x * v2x + v1y * v2y) / denom).abs()
        }
    };
    let tl_idx = (0..3).min_by(|&i, &j| corner_cos(i).total_cmp(&corner_cos(j)))?;
    if corner_cos(tl_idx) > 0.35 {
        return None;
    }

    let tl = patterns[tl_idx];
    let p1 = patterns[(tl_idx + 1) % 3];
    let p2 = patterns[(tl_idx + 2) % 3];
    let cross = (p1.center.x - tl.center.x) * (p2.center.y - tl.center.y)
        - (p1.center.y - tl.center.y) * (p2.center.x - tl.center.x);
    // y grows downwards, so a positive cross product means p1 is clockwise of p2
    let (tr, bl) = if cross > 0.0 { (p1, p2) } else { (p2, p1) };

    // runs are measured along rows and columns, which cut a rotated
    // finder on the slant and stretch it by 1 / max(|cos|, |sin|)
    let axis = (tr.center.y - tl.center.y).atan2(tr.center.x - tl.center.x);
    let slant = axis.cos().abs().max(axis.sin().abs());
    let avg_module = slant * (tl.module_size + tr.module_size + bl.module_size) / 3.0;
    let d_tr = tl.center.distance(&tr.center);
    let d_bl = tl.center.distance(&bl.center);
    let dim1 = estimate_dimension(d_tr, avg_module)?;
    let dim2 = estimate_dimension(d_bl, avg_module)?;
    let dimension = if dim1 == dim2 {
        dim1
    } else if dim1.abs_diff(dim2) <= 4 {
        // round the average back onto the 17 + 4v lattice
        let v = ((dim1 + dim2) as f32 / 2.0 - 17.0) / 4.0;
        17 + 4 * (v.round() as usize).max(1)
    } else {
        return None;
    };

    let module_size = (d_tr + d_bl) / 2.0 / (dimension as f32 - 7.0);
    let module_ratio = module_size / avg_module;
    if !(0.7..=1.3).contains(&module_ratio) {
        return None;
    }

    Some(FinderTriple {
        top_left: tl.center,
        top_right: tr.center,
        bottom_left: bl.center,
        module_size,
        dimension,
    })
}

/// Grid size implied by the distance between two finder centers
pub fn estimate_dimension(distance: f32, module_size: f32) -> Option<usize> {
    if module_size <= 0.0 {
        return None;
    }
    let raw_dim = distance / module_size + 7.0;
    let version = ((raw_dim - 17.0) / 4.0).round() as i32;
    if !(1..=40).contains(&version) {
        return None;
    }
    Some(17 + 4 * version as usize)
}

/// Candidate finder triples, best first, at most `max_groups`
pub fn group_finder_patterns(patterns: &[FinderPattern], max_groups: usize) -> Vec<FinderTriple> {
    let n = patterns.len();
    let mut scored: Vec<(f32, FinderTriple)> = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            for k in (j + 1)..n {
                let (pi, pj, pk) = (&patterns[i], &patterns[j], &patterns[k]);
                let sizes = [pi.module_size, pj.module_size, pk.module_size];
                let min_size = sizes.iter().copied().fold(f32::INFINITY, f32::min);
                let max_size = sizes.iter().copied().fold(0.0f32, f32::max);
                let size_ratio = max_size / min_size;
                if size_ratio > 1.6 {
                    continue;
                }
                let d = [
                    pi.center.distance(&pj.center),
                    pi.center.distance(&pk.center),
                    pj.center.distance(&pk.center),
                ];
                let min_d = d.iter().copied().fold(f32::INFINITY, f32::min);
                let max_d = d.iter().copied().fold(0.0f32, f32::max);
                let avg_module = sizes.iter().sum::<f32>() / 3.0;
                if min_d < avg_module * 7.0 {
                    continue;
                }
                // isoceles right triangle: hypotenuse / leg = sqrt(2)
                let distortion = max_d / min_d;
                if !(1.1..=1.8).contains(&distortion) {
                    continue;
                }
                let Some(triple) = order_finder_patterns(pi, pj, pk) else {
                    continue;
                };
                let score = size_ratio * 2.0 + (distortion - std::f32::consts::SQRT_2).abs();
                scored.push((score, triple));
            }
        }
    }
    scored.sort_by(|a, b| a.0.total_cmp(&b.0));
    scored.truncate(max_groups);
    scored.into_iter().map(|(_, t)| t).collect()
}
