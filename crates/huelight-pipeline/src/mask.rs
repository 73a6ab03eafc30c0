//! Selection mask: which pixels belong to an active color category.
//!
//! Every pixel is converted to HSV and tested against the active
//! categories; matches become 255, everything else 0. The decision is
//! hard and per-pixel (no smoothing), so edges stay crisp here and any
//! softening is left to the compositor's background blur.
//!
//! Rows are classified in parallel with rayon.

use rayon::prelude::*;

use crate::criteria::{ActiveCategories, matches_any};
use crate::hsv::rgb8_to_hsv;
use crate::types::{BYTES_PER_PIXEL, MaskBuffer, PixelBuffer};

/// Mask value for a highlighted pixel.
pub const MASK_ON: u8 = 255;

/// Mask value for a background pixel.
pub const MASK_OFF: u8 = 0;

/// Build the selection mask for `frame`.
///
/// An empty `active` set yields an all-zero mask without reading any
/// pixel data.
#[must_use = "returns the selection mask"]
pub fn build_mask(frame: &PixelBuffer, active: ActiveCategories) -> MaskBuffer {
    build_mask_counted(frame, active).0
}

/// Build the selection mask and report how many pixels were classified.
///
/// The count is `0` for an empty `active` set and `width * height`
/// otherwise; diagnostics use it to confirm the empty-selection
/// shortcut.
#[must_use = "returns the selection mask and scanned pixel count"]
pub fn build_mask_counted(frame: &PixelBuffer, active: ActiveCategories) -> (MaskBuffer, u64) {
    let dimensions = frame.dimensions();
    if active.is_empty() {
        log::trace!("empty selection, skipping mask scan");
        return (MaskBuffer::empty(dimensions), 0);
    }

    let width = dimensions.width as usize;
    let [r, g, b] = frame.format().rgb_offsets();
    let mut data = vec![MASK_OFF; width * dimensions.height as usize];

    let scanned: u64 = data
        .par_chunks_mut(width)
        .enumerate()
        .map(|(y, mask_row)| {
            let row = frame.row(y);
            for (m, px) in mask_row.iter_mut().zip(row.chunks_exact(BYTES_PER_PIXEL)) {
                let hsv = rgb8_to_hsv(px[r], px[g], px[b]);
                *m = if matches_any(hsv, active) {
                    MASK_ON
                } else {
                    MASK_OFF
                };
            }
            mask_row.len() as u64
        })
        .sum();

    (MaskBuffer::from_packed_parts(dimensions, data), scanned)
}
