//! Gaussian blur for the background layer.
//!
//! [`imageproc::filter::gaussian_blur_f32`] only accepts single-channel
//! images, so [`gaussian_blur_frame`] splits the three color channels
//! into [`GrayImage`]s, blurs them in parallel and reassembles the frame.
//! Alpha is copied through untouched: blurring it would make opaque
//! video translucent along object edges.

use image::{GrayImage, Luma};
use rayon::prelude::*;

use crate::types::{BYTES_PER_PIXEL, PixelBuffer};

/// Apply Gaussian blur to the color channels of `frame`.
///
/// Higher `sigma` values produce more smoothing. Non-positive sigma
/// values return the frame unchanged (repacked), since `imageproc`'s
/// underlying function panics on `sigma <= 0.0`.
#[must_use = "returns the blurred frame"]
pub fn gaussian_blur_frame(frame: &PixelBuffer, sigma: f32) -> PixelBuffer {
    let dimensions = frame.dimensions();
    if sigma <= 0.0 || !sigma.is_finite() || dimensions.is_empty() {
        return frame.repack();
    }

    let (w, h) = (dimensions.width, dimensions.height);
    let format = frame.format();
    let color_offsets = format.rgb_offsets();

    let blurred: Vec<GrayImage> = color_offsets
        .par_iter()
        .map(|&c| {
            let channel = GrayImage::from_fn(w, h, |x, y| {
                Luma([frame.pixel(x as usize, y as usize)[c]])
            });
            imageproc::filter::gaussian_blur_f32(&channel, sigma)
        })
        .collect();

    let alpha = format.alpha_offset();
    let mut data = Vec::with_capacity(dimensions.canonical_stride() * h as usize);
    for y in 0..h {
        let row = frame.row(y as usize);
        for (x, src) in (0..w).zip(row.chunks_exact(BYTES_PER_PIXEL)) {
            let mut px = [0u8; BYTES_PER_PIXEL];
            for (channel, &offset) in blurred.iter().zip(&color_offsets) {
                px[offset] = channel.get_pixel(x, y).0[0];
            }
            px[alpha] = src[alpha];
            data.extend_from_slice(&px);
        }
    }

    PixelBuffer::from_packed_parts(dimensions, format, data)
}
