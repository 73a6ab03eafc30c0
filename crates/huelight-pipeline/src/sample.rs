//! Center color readout.

use crate::criteria::ColorCategory;
use crate::types::{BYTES_PER_PIXEL, Color, FrameError, PixelBuffer};

/// Color of the pixel at `(width / 2, height / 2)`.
///
/// Reads the unprocessed frame. Returns `None` only if the frame cannot
/// be read (zero-sized or truncated).
#[must_use]
pub fn sample_center(frame: &PixelBuffer) -> Option<Color> {
    read_center(frame).ok()
}

/// [`sample_center`] reporting the layout error of an unreadable frame.
pub(crate) fn read_center(frame: &PixelBuffer) -> Result<Color, FrameError> {
    frame.validate()?;
    let x = frame.width() as usize / 2;
    let y = frame.height() as usize / 2;
    let px = frame
        .get_pixel(x, y)
        .ok_or_else(|| FrameError::BufferTooShort {
            len: frame.as_raw().len(),
            required: y * frame.stride() + (x + 1) * BYTES_PER_PIXEL,
        })?;
    let [r, g, b] = frame.format().rgb_offsets();
    Ok(Color::from_rgb8(px[r], px[g], px[b]))
}

/// Category of the center color, if it falls in one.
#[must_use]
pub fn classify_center(frame: &PixelBuffer) -> Option<ColorCategory> {
    sample_center(frame).and_then(|c| ColorCategory::classify(c.to_hsv()))
}
