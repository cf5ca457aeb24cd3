//! Grayscale drawing surface for synthesized symbols.

use crate::models::{BitMatrix, NormalizedImage, Rect};
use crate::normalizer::PageBitmap;
use image::{GrayImage, ImageOutputFormat};
use std::io::Cursor;

const WHITE: u8 = 255;
const BLACK: u8 = 0;

/// White-initialized 8-bit canvas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Canvas {
    /// Blank canvas, at least 1x1
    pub fn new(width: usize, height: usize) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        Self {
            width,
            height,
            pixels: vec![WHITE; width * height],
        }
    }

    /// Width in pixels
    pub fn width(&self) -> usize {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> usize {
        self.height
    }

    /// Row-major pixels
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Fill the part of `rect` that lies on the canvas
    pub fn fill_rect(&mut self, rect: Rect, value: u8) {
        let Some(r) = rect.clipped(self.width, self.height) else {
            return;
        };
        for y in r.y..r.bottom() {
            self.pixels[y * self.width + r.x..y * self.width + r.right()].fill(value);
        }
    }

    /// Draw a module grid with its top-left module at `(x0, y0)`
    pub fn draw_matrix(&mut self, modules: &BitMatrix, x0: usize, y0: usize, module_px: usize) {
        for my in 0..modules.height() {
            for mx in 0..modules.width() {
                if modules.get(mx, my) {
                    let rect = Rect::new(x0 + mx * module_px, y0 + my * module_px, module_px, module_px);
                    self.fill_rect(rect, BLACK);
                }
            }
        }
    }

    /// Draw vertical bars, one column of `module_px` pixels per module
    pub fn draw_bars(&mut self, modules: &[bool], x0: usize, y0: usize, module_px: usize, height: usize) {
        for (i, &dark) in modules.iter().enumerate() {
            if dark {
                self.fill_rect(Rect::new(x0 + i * module_px, y0, module_px, height), BLACK);
            }
        }
    }

    /// Copy `other` onto this canvas at `(x0, y0)`
    pub fn blit(&mut self, other: &Canvas, x0: usize, y0: usize) {
        for y in 0..other.height {
            let ty = y0 + y;
            if ty >= self.height {
                break;
            }
            for x in 0..other.width {
                let tx = x0 + x;
                if tx >= self.width {
                    break;
                }
                self.pixels[ty * self.width + tx] = other.pixels[y * other.width + x];
            }
        }
    }

    /// Rotated clockwise by `quarter_turns` x 90 degrees
    pub fn rotated(&self, quarter_turns: u8) -> Canvas {
        let mut out = self.clone();
        for _ in 0..quarter_turns % 4 {
            let (w, h) = (out.width, out.height);
            let mut pixels = vec![WHITE; w * h];
            for y in 0..h {
                for x in 0..w {
                    // (x, y) moves to (h - 1 - y, x) in an h-wide image
                    pixels[x * h + (h - 1 - y)] = out.pixels[y * w + x];
                }
            }
            out = Canvas {
                width: h,
                height: w,
                pixels,
            };
        }
        out
    }

    /// Rotated clockwise by `degrees`, grown to fit, with white corners.
    ///
    /// Pixels are resampled bilinearly.
    pub fn rotated_by(&self, degrees: f32) -> Canvas {
        let (s, c) = degrees.to_radians().sin_cos();
        let (w, h) = (self.width as f32, self.height as f32);
        let out_w = (w * c.abs() + h * s.abs()).ceil() as usize + 2;
        let out_h = (w * s.abs() + h * c.abs()).ceil() as usize + 2;
        let mut out = Canvas::new(out_w, out_h);
        let (cx, cy) = (w / 2.0, h / 2.0);
        let (ocx, ocy) = (out_w as f32 / 2.0, out_h as f32 / 2.0);
        for y in 0..out_h {
            for x in 0..out_w {
                let dx = x as f32 + 0.5 - ocx;
                let dy = y as f32 + 0.5 - ocy;
                // inverse rotation back into source pixel centers
                let sx = c * dx + s * dy + cx - 0.5;
                let sy = -s * dx + c * dy + cy - 0.5;
                out.pixels[y * out_w + x] = self.bilinear(sx, sy);
            }
        }
        out
    }

    fn bilinear(&self, x: f32, y: f32) -> u8 {
        let at = |xi: i64, yi: i64| -> f32 {
            if xi < 0 || yi < 0 || xi >= self.width as i64 || yi >= self.height as i64 {
                WHITE as f32
            } else {
                self.pixels[yi as usize * self.width + xi as usize] as f32
            }
        };
        let (x0, y0) = (x.floor(), y.floor());
        let (fx, fy) = (x - x0, y - y0);
        let (xi, yi) = (x0 as i64, y0 as i64);
        let top = at(xi, yi) * (1.0 - fx) + at(xi + 1, yi) * fx;
        let bottom = at(xi, yi + 1) * (1.0 - fx) + at(xi + 1, yi + 1) * fx;
        (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8
    }

    /// Add deterministic noise of up to `amplitude` levels either way
    pub fn add_noise(&mut self, seed: u64, amplitude: u8) {
        let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
        let span = 2 * amplitude as i32 + 1;
        for p in &mut self.pixels {
            // xorshift64*
            state ^= state >> 12;
            state ^= state << 25;
            state ^= state >> 27;
            let r = (state.wrapping_mul(0x2545_F491_4F6C_DD1D) >> 33) as i32;
            let delta = r.rem_euclid(span) - amplitude as i32;
            *p = (*p as i32 + delta).clamp(0, 255) as u8;
        }
    }

    /// Wrap as a normalized image
    pub fn to_image(&self) -> Option<NormalizedImage> {
        NormalizedImage::from_gray(self.pixels.clone(), self.width, self.height)
    }

    /// Wrap as a grayscale page bitmap with a declared resolution
    pub fn into_bitmap(self, dpi: Option<f32>) -> PageBitmap {
        let mut bitmap = PageBitmap::gray(self.pixels, self.width, self.height);
        bitmap.dpi = dpi;
        bitmap
    }

    /// PNG encoding of the canvas
    pub fn to_png(&self) -> Result<Vec<u8>, image::ImageError> {
        let img = GrayImage::from_raw(self.width as u32, self.height as u32, self.pixels.clone())
            .ok_or_else(|| {
                image::ImageError::Parameter(image::error::ParameterError::from_kind(
                    image::error::ParameterErrorKind::DimensionMismatch,
                ))
            })?;
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageOutputFormat::Png)?;
        Ok(out.into_inner())
    }
}
