//! RGB ↔ HSV conversion.
//!
//! Channels are normalized to `[0, 1]`. Hue is expressed as a fraction
//! of a full turn (degrees / 360), so pure red is `0.0`, pure green
//! `1/3` and pure blue `2/3`.
//!
//! The conversion is the textbook max/min/delta derivation carried out
//! in `f32` with no smoothing or gamma handling, so results are
//! reproducible bit-for-bit across runs.

use serde::{Deserialize, Serialize};

/// A color in hue/saturation/value form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hsv {
    /// Hue as a fraction of a full turn, `[0, 1]`.
    pub h: f32,
    /// Saturation, `[0, 1]`.
    pub s: f32,
    /// Value (brightness), `[0, 1]`.
    pub v: f32,
}

impl Hsv {
    /// Hue in degrees, `[0, 360]`.
    #[must_use]
    pub fn hue_degrees(self) -> f32 {
        self.h * 360.0
    }
}

/// Convert normalized RGB to HSV.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn rgb_to_hsv(r: f32, g: f32, b: f32) -> Hsv {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let mut hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta) % 6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    if hue < 0.0 {
        hue += 360.0;
    }

    let s = if max == 0.0 { 0.0 } else { delta / max };

    Hsv {
        h: hue / 360.0,
        s,
        v: max,
    }
}

/// Convert 8-bit RGB to HSV.
#[must_use]
pub fn rgb8_to_hsv(r: u8, g: u8, b: u8) -> Hsv {
    rgb_to_hsv(
        f32::from(r) / 255.0,
        f32::from(g) / 255.0,
        f32::from(b) / 255.0,
    )
}

/// Convert HSV back to normalized RGB.
///
/// `h` is a fraction of a turn; `1.0` wraps to `0.0`.
#[must_use]
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let hue = (h.rem_euclid(1.0)) * 6.0;
    let c = v * s;
    let x = c * (1.0 - ((hue % 2.0) - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if hue < 1.0 {
        (c, x, 0.0)
    } else if hue < 2.0 {
        (x, c, 0.0)
    } else if hue < 3.0 {
        (0.0, c, x)
    } else if hue < 4.0 {
        (0.0, x, c)
    } else if hue < 5.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    (r + m, g + m, b + m)
}
