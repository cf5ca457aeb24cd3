/// Grayscale reduction and resampling.
///
/// Luma uses fast integer arithmetic: Y = (76*R + 150*G + 29*B) >> 8
/// (0.299, 0.587, 0.114 scaled by 256).

/// Coefficients for grayscale conversion: Y = (76*R + 150*G + 29*B) >> 8
const COEF_R: u32 = 76;
const COEF_G: u32 = 150;
const COEF_B: u32 = 29;

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((COEF_R * r as u32 + COEF_G * g as u32 + COEF_B * b as u32) >> 8) as u8
}

/// Composite a gray value over a white background
#[inline]
fn over_white(gray: u8, alpha: u8) -> u8 {
    let a = alpha as u32;
    ((gray as u32 * a + 255 * (255 - a) + 127) / 255) as u8
}

/// Convert RGB image to grayscale
pub fn rgb_to_grayscale(rgb: &[u8], width: usize, height: usize) -> Vec<u8> {
    let pixel_count = width * height;
    rgb.chunks_exact(3)
        .take(pixel_count)
        .map(|px| luma(px[0], px[1], px[2]))
        .collect()
}

/// Convert RGBA image to grayscale; transparent pixels read as white paper
pub fn rgba_to_grayscale(rgba: &[u8], width: usize, height: usize) -> Vec<u8> {
    let pixel_count = width * height;
    rgba.chunks_exact(4)
        .take(pixel_count)
        .map(|px| over_white(luma(px[0], px[1], px[2]), px[3]))
        .collect()
}

/// Convert gray+alpha image to grayscale over white
pub fn gray_alpha_to_grayscale(ga: &[u8], width: usize, height: usize) -> Vec<u8> {
    let pixel_count = width * height;
    ga.chunks_exact(2)
        .take(pixel_count)
        .map(|px| over_white(px[0], px[1]))
        .collect()
}

/// Average each `factor` x `factor` block into one pixel
pub fn box_downsample(gray: &[u8], width: usize, height: usize, factor: usize) -> Vec<u8> {
    let factor = factor.max(1);
    let out_w = (width / factor).max(1);
    let out_h = (height / factor).max(1);
    let mut out = Vec::with_capacity(out_w * out_h);
    for oy in 0..out_h {
        let y0 = oy * factor;
        let y1 = (y0 + factor).min(height);
        for ox in 0..out_w {
            let x0 = ox * factor;
            let x1 = (x0 + factor).min(width);
            let mut sum = 0u32;
            let mut count = 0u32;
            for y in y0..y1 {
                let row = &gray[y * width..y * width + width];
                for &v in &row[x0..x1] {
                    sum += v as u32;
                    count += 1;
                }
            }
            out.push((sum / count.max(1)) as u8);
        }
    }
    out
}

/// Enlarge by an integer factor with bilinear interpolation
pub fn bilinear_upsample(gray: &[u8], width: usize, height: usize, factor: usize) -> Vec<u8> {
    let factor = factor.max(1);
    let out_w = width * factor;
    let out_h = height * factor;
    let inv = 1.0 / factor as f32;
    let mut out = Vec::with_capacity(out_w * out_h);
    for oy in 0..out_h {
        // map output pixel centers back onto source pixel centers
        let sy = (oy as f32 + 0.5) * inv - 0.5;
        for ox in 0..out_w {
            let sx = (ox as f32 + 0.5) * inv - 0.5;
            let v = super::geometry::bilinear(gray, width, height, sx, sy);
            out.push(v.round().clamp(0.0, 255.0) as u8);
        }
    }
    out
}
