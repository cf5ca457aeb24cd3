/// Geometry helpers: projective mapping for matrix sampling, bilinear
/// interpolation for scanlines and a few angle utilities.
use crate::models::Point;

/// Projective transform (3x3 homography, h33 = 1) mapping one quad onto another
#[derive(Debug, Clone, Copy)]
pub struct PerspectiveTransform {
    h: [f64; 8],
}

impl PerspectiveTransform {
    /// Transform taking `src[i]` to `dst[i]` for the four correspondences
    pub fn from_points(src: &[Point; 4], dst: &[Point; 4]) -> Option<Self> {
        // direct linear transform: two equations per correspondence
        let mut a = [[0.0f64; 8]; 8];
        let mut b = [0.0f64; 8];
        for (i, (s, d)) in src.iter().zip(dst.iter()).enumerate() {
            let (sx, sy) = (s.x as f64, s.y as f64);
            let (dx, dy) = (d.x as f64, d.y as f64);
            a[2 * i] = [sx, sy, 1.0, 0.0, 0.0, 0.0, -dx * sx, -dx * sy];
            b[2 * i] = dx;
            a[2 * i + 1] = [0.0, 0.0, 0.0, sx, sy, 1.0, -dy * sx, -dy * sy];
            b[2 * i + 1] = dy;
        }
        solve_linear_system(a, b).map(|h| Self { h })
    }

    /// Map a point; points on the line at infinity map to the origin
    pub fn transform(&self, p: &Point) -> Point {
        let (x, y) = (p.x as f64, p.y as f64);
        let h = &self.h;
        let w = h[6] * x + h[7] * y + 1.0;
        if w.abs() < 1e-12 {
            return Point::default();
        }
        Point::new(
            ((h[0] * x + h[1] * y + h[2]) / w) as f32,
            ((h[3] * x + h[4] * y + h[5]) / w) as f32,
        )
    }
}

/// Gaussian elimination with partial pivoting
#[allow(clippy::needless_range_loop)]
fn solve_linear_system(mut a: [[f64; 8]; 8], mut b: [f64; 8]) -> Option<[f64; 8]> {
    const N: usize = 8;
    for col in 0..N {
        let pivot = (col..N).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < 1e-12 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in (col + 1)..N {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..N {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = [0.0f64; N];
    for row in (0..N).rev() {
        let tail: f64 = ((row + 1)..N).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Some(x)
}

/// Bilinear sample of a row-major gray buffer, clamped at the borders
pub fn bilinear(gray: &[u8], width: usize, height: usize, x: f32, y: f32) -> f32 {
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;
    let p = |xx: usize, yy: usize| gray[yy * width + xx] as f32;
    let top = p(x0, y0) + (p(x1, y0) - p(x0, y0)) * fx;
    let bottom = p(x0, y1) + (p(x1, y1) - p(x0, y1)) * fx;
    top + (bottom - top) * fy
}

/// Smallest difference between two undirected line angles, degrees in [0, 90]
pub fn line_angle_diff(a: f32, b: f32) -> f32 {
    let d = (a - b).rem_euclid(180.0);
    d.min(180.0 - d)
}

/// Distance of an angle from the nearest axis, degrees in [0, 45]
pub fn axis_residue(deg: f32) -> f32 {
    let d = deg.rem_euclid(90.0);
    d.min(90.0 - d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perspective_scale() {
        let src = [
            Point::new(0.0, 0.0),
            Point::new(100.0, 0.0),
            Point::new(100.0, 100.0),
            Point::new(0.0, 100.0),
        ];
        let dst = [
            Point::new(0.0, 0.0),
            Point::new(50.0, 0.0),
            Point::new(50.0, 50.0),
            Point::new(0.0, 50.0),
        ];
        let t = PerspectiveTransform::from_points(&src, &dst).unwrap();
        let p = t.transform(&Point::new(50.0, 50.0));
        assert!((p.x - 25.0).abs() < 1e-3);
        assert!((p.y - 25.0).abs() < 1e-3);
    }

    #[test]
    fn test_perspective_rotation() {
        let src = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        // 90 degree rotation about the origin, then shifted
        let dst = [
            Point::new(50.0, 0.0),
            Point::new(50.0, 10.0),
            Point::new(40.0, 10.0),
            Point::new(40.0, 0.0),
        ];
        let t = PerspectiveTransform::from_points(&src, &dst).unwrap();
        let p = t.transform(&Point::new(3.0, 0.0));
        assert!((p.x - 50.0).abs() < 1e-3);
        assert!((p.y - 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_degenerate_quad() {
        let p = Point::new(1.0, 1.0);
        assert!(PerspectiveTransform::from_points(&[p; 4], &[p; 4]).is_none());
    }

    #[test]
    fn test_bilinear() {
        let gray = vec![0, 100, 100, 200];
        assert!((bilinear(&gray, 2, 2, 0.5, 0.5) - 100.0).abs() < 1e-4);
        assert_eq!(bilinear(&gray, 2, 2, -3.0, 9.0), 100.0);
    }

    #[test]
    fn test_angles() {
        assert!((line_angle_diff(5.0, 175.0) - 10.0).abs() < 1e-4);
        assert!((axis_residue(93.0) - 3.0).abs() < 1e-4);
        assert!((axis_residue(44.0) - 44.0).abs() < 1e-4);
    }
}
