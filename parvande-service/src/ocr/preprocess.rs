//! Image preprocessing before recognition: grayscale, CLAHE, median denoise.

use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::median_filter;

use crate::config::OcrConfig;

const BINS: usize = 256;

pub fn preprocess(image: &DynamicImage, config: &OcrConfig) -> GrayImage {
    let gray = image.to_luma8();
    let equalized = clahe(&gray, config.clahe_clip_limit, config.clahe_tile_grid);
    if config.median_radius == 0 {
        return equalized;
    }
    median_filter(&equalized, config.median_radius, config.median_radius)
}

/// Contrast-limited adaptive histogram equalization.
///
/// The image is split into `grid x grid` tiles; each tile gets an equalization
/// lookup table built from its clipped histogram, and every pixel is mapped by
/// bilinear interpolation between the tables of the four nearest tile centres.
pub fn clahe(image: &GrayImage, clip_limit: f32, grid: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return image.clone();
    }

    let grid = grid.max(1);
    let tile_w = width.div_ceil(grid).max(1);
    let tile_h = height.div_ceil(grid).max(1);
    let tiles_x = width.div_ceil(tile_w);
    let tiles_y = height.div_ceil(tile_h);

    let mut luts = Vec::with_capacity((tiles_x * tiles_y) as usize);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx * tile_w;
            let y0 = ty * tile_h;
            let x1 = (x0 + tile_w).min(width);
            let y1 = (y0 + tile_h).min(height);
            luts.push(tile_lut(image, x0, y0, x1, y1, clip_limit));
        }
    }

    let lut_at = |tx: u32, ty: u32| &luts[(ty * tiles_x + tx) as usize];

    GrayImage::from_fn(width, height, |x, y| {
        let value = image.get_pixel(x, y)[0] as usize;

        // Position relative to tile centres
        let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
        let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let tx0 = fx.floor().max(0.0) as u32;
        let ty0 = fy.floor().max(0.0) as u32;
        let tx0 = tx0.min(tiles_x - 1);
        let ty0 = ty0.min(tiles_y - 1);
        let tx1 = (tx0 + 1).min(tiles_x - 1);
        let ty1 = (ty0 + 1).min(tiles_y - 1);
        let ax = (fx - tx0 as f32).clamp(0.0, 1.0);
        let ay = (fy - ty0 as f32).clamp(0.0, 1.0);

        let top = lut_at(tx0, ty0)[value] as f32 * (1.0 - ax) + lut_at(tx1, ty0)[value] as f32 * ax;
        let bottom =
            lut_at(tx0, ty1)[value] as f32 * (1.0 - ax) + lut_at(tx1, ty1)[value] as f32 * ax;
        let mapped = top * (1.0 - ay) + bottom * ay;

        Luma([mapped.round().clamp(0.0, 255.0) as u8])
    })
}

fn tile_lut(image: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f32) -> [u8; BINS] {
    let mut hist = [0u32; BINS];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[image.get_pixel(x, y)[0] as usize] += 1;
        }
    }
    let area = (x1 - x0) * (y1 - y0);

    if clip_limit > 0.0 {
        let limit = ((clip_limit * area as f32 / BINS as f32) as u32).max(1);

        let mut excess = 0u32;
        for count in hist.iter_mut() {
            if *count > limit {
                excess += *count - limit;
                *count = limit;
            }
        }

        let per_bin = excess / BINS as u32;
        let residual = (excess % BINS as u32) as usize;
        for count in hist.iter_mut() {
            *count += per_bin;
        }
        if residual > 0 {
            let step = (BINS / residual).max(1);
            for count in hist.iter_mut().step_by(step).take(residual) {
                *count += 1;
            }
        }
    }

    let scale = 255.0 / area as f32;
    let mut lut = [0u8; BINS];
    let mut cumulative = 0u32;
    for (value, count) in hist.iter().enumerate() {
        cumulative += count;
        lut[value] = (cumulative as f32 * scale).round().clamp(0.0, 255.0) as u8;
    }
    lut
}
