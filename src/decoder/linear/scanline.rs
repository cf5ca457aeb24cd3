//! Scanlines through a region: bilinear sampling along parallel lines,
//! a per-line Otsu threshold and sub-pixel edge positions.

use crate::models::{CandidateRegion, NormalizedImage, Point, RegionClass};
use crate::utils::binarization::otsu_threshold_f32;
use crate::utils::geometry::line_angle_diff;

/// Parallel lines per scan direction
const LINES_PER_ANGLE: usize = 12;
/// Lines with less dark/light separation are skipped
const MIN_LINE_CONTRAST: f32 = 0.15;
/// Offsets from the estimated direction that are sampled as well, degrees
const ANGLE_OFFSETS: [f32; 5] = [0.0, -5.0, 5.0, -10.0, 10.0];

/// A stretch of constant color along a line
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Run {
    /// Offset of the run start along the line, pixels
    pub start: f32,
    /// Length in pixels
    pub width: f32,
    /// Dark (bar) or light (space)
    pub dark: bool,
    /// Touches an end of the line, so its true width is unknown
    pub open: bool,
}

impl Run {
    /// Whether this light run can serve as a quiet zone for module size `m`
    pub fn is_quiet(&self, m: f32) -> bool {
        !self.dark && (self.width >= 5.0 * m || (self.open && self.width >= 2.0 * m))
    }
}

/// One sampled line, segmented into runs
#[derive(Debug, Clone)]
pub struct Line {
    /// Line number, shared by both reading directions
    pub index: usize,
    origin: Point,
    dir: Point,
    length: f32,
    runs: Vec<Run>,
    contrast: f32,
    angle_deg: f32,
}

impl Line {
    /// Runs in reading order
    pub fn runs(&self) -> &[Run] {
        &self.runs
    }

    /// Dark/light separation of the line in `[0, 1]`
    pub fn contrast(&self) -> f32 {
        self.contrast
    }

    /// Sampling direction in degrees
    pub fn angle_deg(&self) -> f32 {
        self.angle_deg
    }

    /// Image point at offset `t` along the line (pixel-center coordinates)
    pub fn point_at(&self, t: f32) -> Point {
        Point::new(self.origin.x + self.dir.x * t, self.origin.y + self.dir.y * t)
    }

    /// Same line read from the other end
    pub fn reversed(&self) -> Line {
        let runs = self
            .runs
            .iter()
            .rev()
            .map(|r| Run {
                start: self.length - (r.start + r.width),
                ..*r
            })
            .collect();
        Line {
            index: self.index,
            origin: self.point_at(self.length),
            dir: Point::new(-self.dir.x, -self.dir.y),
            length: self.length,
            runs,
            contrast: self.contrast,
            angle_deg: (self.angle_deg + 180.0).rem_euclid(360.0),
        }
    }
}

/// All scanlines through one region
#[derive(Debug, Clone, Default)]
pub struct LinearScan {
    lines: Vec<Line>,
}

impl LinearScan {
    /// Sample the region along its estimated direction and a fan of nearby
    /// directions, plus both axes when the region was not classified as bars.
    pub fn sample(image: &NormalizedImage, region: &CandidateRegion) -> Self {
        let estimate = region.rotation_deg();
        let mut angles: Vec<f32> = ANGLE_OFFSETS
            .iter()
            .map(|off| (estimate + off).rem_euclid(360.0))
            .collect();
        if region.class() != RegionClass::Linear {
            for axis in [0.0f32, 90.0] {
                if angles.iter().all(|&a| line_angle_diff(a, axis) >= 3.0) {
                    angles.push(axis);
                }
            }
        }

        let mut lines = Vec::new();
        for angle in angles {
            for line in lines_at_angle(image, region, angle) {
                let index = lines.len();
                lines.push(Line { index, ..line });
            }
        }
        Self { lines }
    }

    /// Lines in sampling order
    pub fn lines(&self) -> &[Line] {
        &self.lines
    }
}

fn lines_at_angle(image: &NormalizedImage, region: &CandidateRegion, angle: f32) -> Vec<Line> {
    let rect = region.bounds();
    let theta = angle.to_radians();
    let (sin, cos) = theta.sin_cos();
    let dir = Point::new(cos, sin);
    let normal = Point::new(-sin, cos);

    let (w, h) = (rect.width as f32, rect.height as f32);
    let ext_d = w * cos.abs() + h * sin.abs();
    let ext_n = w * sin.abs() + h * cos.abs();
    let half = ext_d / 2.0 + (0.25 * ext_d).max(24.0);
    let center = rect.center().translate(-0.5, -0.5);

    let mut out = Vec::with_capacity(LINES_PER_ANGLE);
    for k in 0..LINES_PER_ANGLE {
        let off = ((k as f32 + 0.5) / LINES_PER_ANGLE as f32 - 0.5) * 0.8 * ext_n;
        let mid = center.translate(normal.x * off, normal.y * off);
        let a = mid.translate(-dir.x * half, -dir.y * half);
        let b = mid.translate(dir.x * half, dir.y * half);
        let Some((a, b)) = clip_segment(a, b, image.width(), image.height()) else {
            continue;
        };
        // integer start keeps axis-aligned samples on pixel centers
        let a = Point::new(a.x.round(), a.y.round());
        let length = a.distance(&b).floor();
        if length < 16.0 {
            continue;
        }
        if let Some(line) = segment(image, a, dir, length as usize) {
            out.push(Line {
                angle_deg: angle,
                ..line
            });
        }
    }
    out
}

/// Liang-Barsky clip against `[0, w-1] x [0, h-1]`
fn clip_segment(a: Point, b: Point, width: usize, height: usize) -> Option<(Point, Point)> {
    let (max_x, max_y) = ((width - 1) as f32, (height - 1) as f32);
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let mut t0 = 0.0f32;
    let mut t1 = 1.0f32;
    for (p, q) in [(-dx, a.x), (dx, max_x - a.x), (-dy, a.y), (dy, max_y - a.y)] {
        if p.abs() < 1e-9 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    Some((
        a.translate(dx * t0, dy * t0),
        a.translate(dx * t1, dy * t1),
    ))
}

fn segment(image: &NormalizedImage, origin: Point, dir: Point, steps: usize) -> Option<Line> {
    let samples: Vec<f32> = (0..=steps)
        .map(|j| {
            let t = j as f32;
            image.sample(origin.x + dir.x * t, origin.y + dir.y * t)
        })
        .collect();
    let otsu = otsu_threshold_f32(&samples);

    let (mut dark_sum, mut dark_n, mut light_sum, mut light_n) = (0.0f32, 0usize, 0.0f32, 0usize);
    for &s in &samples {
        if s < otsu {
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
    let (dark_mean, light_mean) = (dark_sum / dark_n as f32, light_sum / light_n as f32);
    let contrast = (light_mean - dark_mean) / 255.0;
    if contrast < MIN_LINE_CONTRAST {
        return None;
    }
    // edges sit where the signal crosses halfway between the two classes
    let threshold = (dark_mean + light_mean) / 2.0;

    let mut edges = Vec::new();
    for i in 1..samples.len() {
        let (p, c) = (samples[i - 1], samples[i]);
        if (p < threshold) != (c < threshold) {
            edges.push((i - 1) as f32 + (threshold - p) / (c - p));
        }
    }

    let length = steps as f32;
    let first_dark = samples[0] < threshold;
    let mut runs = Vec::with_capacity(edges.len() + 1);
    let mut start = 0.0f32;
    let mut dark = first_dark;
    for &e in &edges {
        runs.push(Run {
            start,
            width: e - start,
            dark,
            open: runs.is_empty(),
        });
        start = e;
        dark = !dark;
    }
    runs.push(Run {
        start,
        width: length - start,
        dark,
        open: true,
    });

    Some(Line {
        index: 0,
        origin,
        dir,
        length,
        runs,
        contrast,
        angle_deg: 0.0,
    })
}
