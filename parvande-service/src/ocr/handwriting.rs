//! Printed vs. handwritten heuristic.
//!
//! Scans of handwriting tend to be soft with few hard edges, so the variance
//! of the Laplacian (a sharpness measure) is low. This is a best-effort
//! threshold test, not a trained classifier.

use image::GrayImage;

/// Reflect-101 border handling (`dcb|abcd|cba`)
fn reflect(i: i64, n: i64) -> u32 {
    if n == 1 {
        return 0;
    }
    let mut i = i;
    if i < 0 {
        i = -i;
    }
    if i >= n {
        i = 2 * (n - 1) - i;
    }
    i as u32
}

/// Variance of the 4-neighbour Laplacian over the whole image
pub fn laplacian_variance(image: &GrayImage) -> f64 {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return 0.0;
    }
    let (w, h) = (width as i64, height as i64);

    let px = |x: i64, y: i64| -> f64 { image.get_pixel(reflect(x, w), reflect(y, h))[0] as f64 };

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for y in 0..h {
        for x in 0..w {
            let lap = px(x - 1, y) + px(x + 1, y) + px(x, y - 1) + px(x, y + 1) - 4.0 * px(x, y);
            sum += lap;
            sum_sq += lap * lap;
        }
    }

    let n = (w * h) as f64;
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}
