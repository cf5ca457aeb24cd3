use crate::models::{BitMatrix, NormalizedImage, Rect};

/// Otsu's optimal threshold over a 256-bin histogram.
///
/// Cumulative sums keep this at one pass over the bins. When several
/// thresholds share the maximum between-class variance the middle of that
/// plateau is returned, which for two clean peaks lands halfway between them.
pub fn otsu_threshold(histogram: &[u32; 256]) -> u8 {
    let total: u64 = histogram.iter().map(|&c| c as u64).sum();
    if total == 0 {
        return 128;
    }
    let total_sum: u64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &c)| i as u64 * c as u64)
        .sum();

    let mut below_count = 0u64;
    let mut below_sum = 0u64;
    let mut best_variance = -1.0f64;
    let mut first_best = 128usize;
    let mut last_best = 128usize;

    // pixels with intensity < t are dark
    for t in 1..256usize {
        below_count += histogram[t - 1] as u64;
        below_sum += (t as u64 - 1) * histogram[t - 1] as u64;
        let above_count = total - below_count;
        if below_count == 0 || above_count == 0 {
            continue;
        }
        let mean_below = below_sum as f64 / below_count as f64;
        let mean_above = (total_sum - below_sum) as f64 / above_count as f64;
        let variance =
            below_count as f64 * above_count as f64 * (mean_below - mean_above).powi(2);
        if variance > best_variance * (1.0 + 1e-9) {
            best_variance = variance;
            first_best = t;
            last_best = t;
        } else if (variance - best_variance).abs() <= best_variance * 1e-9 {
            last_best = t;
        }
    }

    ((first_best + last_best) / 2) as u8
}

/// Otsu threshold of a sample set
pub fn otsu_threshold_of(samples: &[u8]) -> u8 {
    let mut histogram = [0u32; 256];
    for &v in samples {
        histogram[v as usize] += 1;
    }
    otsu_threshold(&histogram)
}

/// Otsu threshold of floating point samples in 0..=255
pub fn otsu_threshold_f32(samples: &[f32]) -> f32 {
    let mut histogram = [0u32; 256];
    for &v in samples {
        histogram[v.round().clamp(0.0, 255.0) as usize] += 1;
    }
    otsu_threshold(&histogram) as f32
}

/// Binarize a window of the image with a single Otsu threshold.
///
/// Returns the matrix (true = dark) in window-local coordinates.
pub fn otsu_binarize_window(image: &NormalizedImage, window: Rect) -> BitMatrix {
    let mut histogram = [0u32; 256];
    for y in window.y..window.bottom() {
        for x in window.x..window.right() {
            histogram[image.get(x, y) as usize] += 1;
        }
    }
    let threshold = otsu_threshold(&histogram);
    BitMatrix::from_fn(window.width, window.height, |x, y| {
        image.get(window.x + x, window.y + y) < threshold
    })
}
