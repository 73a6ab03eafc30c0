//! Saturation / brightness / contrast adjustment.
//!
//! One [`ColorAdjustment`] describes a full color-controls pass. Per
//! pixel, in normalized space and in this order:
//!
//! 1. saturation: interpolate from the Rec. 709 luma toward the color by
//!    the multiplier (`0` = grayscale, `1` = unchanged, `> 1` = boosted);
//! 2. brightness: add the offset to every color channel;
//! 3. contrast: scale each channel's distance from mid-gray `0.5`;
//!
//! then clamp to `[0, 1]` and round back to 8 bits. Alpha is copied
//! unchanged. Output buffers are always tightly packed.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::types::{BYTES_PER_PIXEL, PixelBuffer, unit_to_u8};

/// Rec. 709 luma weights for red, green and blue.
pub const LUMA_WEIGHTS: [f32; 3] = [0.2126, 0.7152, 0.0722];

/// Parameters of one color-controls pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorAdjustment {
    /// Saturation multiplier. `0.0` desaturates fully.
    pub saturation: f32,
    /// Additive brightness offset in normalized units.
    pub brightness: f32,
    /// Contrast multiplier around mid-gray. `1.0` is neutral.
    pub contrast: f32,
}

impl ColorAdjustment {
    /// The identity adjustment.
    pub const NEUTRAL: Self = Self {
        saturation: 1.0,
        brightness: 0.0,
        contrast: 1.0,
    };

    /// Returns `true` if applying this adjustment changes nothing.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn is_neutral(&self) -> bool {
        *self == Self::NEUTRAL
    }

    /// Same adjustment with a different saturation multiplier.
    #[must_use]
    pub const fn with_saturation(self, saturation: f32) -> Self {
        Self { saturation, ..self }
    }

    /// Adjust one normalized RGB triple.
    #[must_use]
    pub fn apply_rgb(&self, rgb: [f32; 3]) -> [f32; 3] {
        let luma = LUMA_WEIGHTS[0].mul_add(rgb[0], LUMA_WEIGHTS[1].mul_add(rgb[1], LUMA_WEIGHTS[2] * rgb[2]));
        rgb.map(|c| {
            let saturated = (c - luma).mul_add(self.saturation, luma);
            let brightened = saturated + self.brightness;
            ((brightened - 0.5).mul_add(self.contrast, 0.5)).clamp(0.0, 1.0)
        })
    }

    /// Adjust one 8-bit RGB triple.
    #[must_use]
    pub fn apply_rgb8(&self, rgb: [u8; 3]) -> [u8; 3] {
        let normalized = rgb.map(|c| f32::from(c) / 255.0);
        self.apply_rgb(normalized).map(unit_to_u8)
    }
}

impl Default for ColorAdjustment {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Apply a color-controls pass to every pixel of `frame`.
///
/// The result has the same dimensions and format as `frame`, with
/// canonical stride.
#[must_use = "returns the adjusted frame"]
pub fn apply_color_controls(frame: &PixelBuffer, adjustment: &ColorAdjustment) -> PixelBuffer {
    let dimensions = frame.dimensions();
    let format = frame.format();
    if adjustment.is_neutral() {
        return frame.repack();
    }

    let [r, g, b] = format.rgb_offsets();
    let a = format.alpha_offset();
    let row_len = dimensions.canonical_stride();
    let mut data = vec![0u8; row_len * dimensions.height as usize];

    data.par_chunks_mut(row_len).enumerate().for_each(|(y, out_row)| {
        let in_row = frame.row(y);
        for (out_px, in_px) in out_row
            .chunks_exact_mut(BYTES_PER_PIXEL)
            .zip(in_row.chunks_exact(BYTES_PER_PIXEL))
        {
            let [nr, ng, nb] = adjustment.apply_rgb8([in_px[r], in_px[g], in_px[b]]);
            out_px[r] = nr;
            out_px[g] = ng;
            out_px[b] = nb;
            out_px[a] = in_px[a];
        }
    });

    PixelBuffer::from_packed_parts(dimensions, format, data)
}
