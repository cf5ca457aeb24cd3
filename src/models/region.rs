use super::Point;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge
    pub x: usize,
    /// Top edge
    pub y: usize,
    /// Width in pixels
    pub width: usize,
    /// Height in pixels
    pub height: usize,
}

impl Rect {
    /// Create a new rectangle
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Exclusive right edge
    pub fn right(&self) -> usize {
        self.x + self.width
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> usize {
        self.y + self.height
    }

    /// Area in pixels
    pub fn area(&self) -> usize {
        self.width * self.height
    }

    /// Center point
    pub fn center(&self) -> Point {
        Point::new(
            self.x as f32 + self.width as f32 / 2.0,
            self.y as f32 + self.height as f32 / 2.0,
        )
    }

    /// True if the rectangle lies entirely inside a `width` x `height` image
    pub fn fits_within(&self, width: usize, height: usize) -> bool {
        self.right() <= width && self.bottom() <= height
    }

    /// Intersection of two rectangles, if non-empty
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = self.right().min(other.right());
        let y1 = self.bottom().min(other.bottom());
        (x1 > x0 && y1 > y0).then(|| Rect::new(x0, y0, x1 - x0, y1 - y0))
    }

    /// Smallest rectangle containing both
    pub fn union(&self, other: &Rect) -> Rect {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Overlap measured as intersection area over the smaller of the two areas.
    ///
    /// A small box fully inside a large one reports 1.0, which is what duplicate
    /// suppression needs.
    pub fn overlap_ratio(&self, other: &Rect) -> f32 {
        let smaller = self.area().min(other.area());
        if smaller == 0 {
            return 0.0;
        }
        self.intersection(other)
            .map(|i| i.area() as f32 / smaller as f32)
            .unwrap_or(0.0)
    }

    /// Clip to a `width` x `height` image; `None` if nothing remains
    pub fn clipped(&self, width: usize, height: usize) -> Option<Rect> {
        self.intersection(&Rect::new(0, 0, width, height))
    }

    /// Grow by `margin` on every side, clipped to the image
    pub fn expanded(&self, margin: usize, width: usize, height: usize) -> Rect {
        let x0 = self.x.saturating_sub(margin);
        let y0 = self.y.saturating_sub(margin);
        let x1 = (self.right() + margin).min(width);
        let y1 = (self.bottom() + margin).min(height);
        Rect::new(x0, y0, x1.saturating_sub(x0), y1.saturating_sub(y0))
    }

    /// Multiply all coordinates by an integer factor
    pub fn scaled_up(&self, factor: usize) -> Rect {
        Rect::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }

    /// Divide all coordinates by an integer factor, rounding outward
    pub fn scaled_down(&self, factor: usize) -> Rect {
        let factor = factor.max(1);
        let x0 = self.x / factor;
        let y0 = self.y / factor;
        let x1 = self.right().div_ceil(factor);
        let y1 = self.bottom().div_ceil(factor);
        Rect::new(x0, y0, x1 - x0, y1 - y0)
    }

    /// Bounding box of a set of points, clipped to the image
    pub fn bounding(points: &[Point], width: usize, height: usize) -> Option<Rect> {
        if points.is_empty() {
            return None;
        }
        let (mut min_x, mut min_y) = (f32::MAX, f32::MAX);
        let (mut max_x, mut max_y) = (f32::MIN, f32::MIN);
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        let x0 = min_x.floor().max(0.0) as usize;
        let y0 = min_y.floor().max(0.0) as usize;
        let x1 = (max_x.ceil().max(0.0) as usize).min(width);
        let y1 = (max_y.ceil().max(0.0) as usize).min(height);
        (x1 > x0 && y1 > y0).then(|| Rect::new(x0, y0, x1 - x0, y1 - y0))
    }
}

/// Coarse structural class of a region or symbology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionClass {
    /// Parallel bars along one axis
    Linear,
    /// Grid of modules in two axes
    Matrix,
    /// Structure not recognized with confidence
    Unknown,
}

/// A sub-area of an image suspected to contain one barcode
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRegion {
    bounds: Rect,
    rotation_deg: f32,
    class: RegionClass,
    contrast_variance: f32,
}

impl CandidateRegion {
    /// Create a region; rotation is normalized into [0, 180)
    pub fn new(bounds: Rect, rotation_deg: f32, class: RegionClass, contrast_variance: f32) -> Self {
        Self {
            bounds,
            rotation_deg: rotation_deg.rem_euclid(180.0),
            class,
            contrast_variance,
        }
    }

    /// Bounding box in image coordinates
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Dominant bar/edge direction, degrees in [0, 180).
    ///
    /// For linear regions this is the scan direction across the bars.
    pub fn rotation_deg(&self) -> f32 {
        self.rotation_deg
    }

    /// Coarse class hint
    pub fn class(&self) -> RegionClass {
        self.class
    }

    /// Intensity variance inside the region, used for overlap tie-breaks
    pub fn contrast_variance(&self) -> f32 {
        self.contrast_variance
    }
}
