//! Background/foreground derivation and mask-weighted blending.
//!
//! The compositor knows nothing about color categories: it receives a
//! frame and a mask and produces
//!
//! - a **background** layer: optionally desaturated, slightly darkened
//!   and softened with a Gaussian blur;
//! - a **foreground** layer: derived from the *original* frame (never
//!   from the desaturated background) with boosted saturation,
//!   brightness and contrast;
//!
//! and blends them with the mask as a per-pixel weight. The two layers
//! are independent, so [`derive_layers`] builds them concurrently.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::adjust::{ColorAdjustment, apply_color_controls};
use crate::blur::gaussian_blur_frame;
use crate::types::{BYTES_PER_PIXEL, FrameError, MaskBuffer, PixelBuffer};

/// Fixed compositing parameters.
///
/// [`Default`] yields the values the product is tuned for; other values
/// are accepted for experimentation (e.g. via the CLI's
/// `--config-json`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositeParams {
    /// Color controls for the suppressed layer. Its saturation is
    /// overridden with `0.0` when the grayscale background is enabled.
    pub background: ColorAdjustment,
    /// Gaussian blur sigma for the suppressed layer, in pixels.
    pub background_blur_sigma: f32,
    /// Color controls for the boosted layer.
    pub foreground: ColorAdjustment,
}

impl CompositeParams {
    /// Default background saturation multiplier (unchanged color).
    pub const DEFAULT_BACKGROUND_SATURATION: f32 = 1.0;

    /// Default background brightness offset (mild darkening).
    pub const DEFAULT_BACKGROUND_BRIGHTNESS: f32 = -0.15;

    /// Default background contrast multiplier (neutral).
    pub const DEFAULT_BACKGROUND_CONTRAST: f32 = 1.0;

    /// Default background blur sigma in pixels.
    pub const DEFAULT_BACKGROUND_BLUR_SIGMA: f32 = 2.0;

    /// Default foreground saturation multiplier.
    pub const DEFAULT_FOREGROUND_SATURATION: f32 = 1.6;

    /// Default foreground brightness offset.
    pub const DEFAULT_FOREGROUND_BRIGHTNESS: f32 = 0.08;

    /// Default foreground contrast multiplier.
    pub const DEFAULT_FOREGROUND_CONTRAST: f32 = 1.15;

    /// Background color controls for the given grayscale setting.
    #[must_use]
    pub const fn background_adjustment(&self, grayscale_background: bool) -> ColorAdjustment {
        if grayscale_background {
            self.background.with_saturation(0.0)
        } else {
            self.background
        }
    }

    /// Check that every parameter is finite and in range.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::InvalidParams`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), FrameError> {
        check_adjustment("background", &self.background)?;
        check_adjustment("foreground", &self.foreground)?;
        if !self.background_blur_sigma.is_finite() || self.background_blur_sigma < 0.0 {
            return Err(FrameError::InvalidParams(format!(
                "background_blur_sigma must be finite and >= 0, got {}",
                self.background_blur_sigma
            )));
        }
        Ok(())
    }
}

impl Default for CompositeParams {
    fn default() -> Self {
        Self {
            background: ColorAdjustment {
                saturation: Self::DEFAULT_BACKGROUND_SATURATION,
                brightness: Self::DEFAULT_BACKGROUND_BRIGHTNESS,
                contrast: Self::DEFAULT_BACKGROUND_CONTRAST,
            },
            background_blur_sigma: Self::DEFAULT_BACKGROUND_BLUR_SIGMA,
            foreground: ColorAdjustment {
                saturation: Self::DEFAULT_FOREGROUND_SATURATION,
                brightness: Self::DEFAULT_FOREGROUND_BRIGHTNESS,
                contrast: Self::DEFAULT_FOREGROUND_CONTRAST,
            },
        }
    }
}

fn check_adjustment(layer: &str, adjustment: &ColorAdjustment) -> Result<(), FrameError> {
    let fields = [
        ("saturation", adjustment.saturation, 0.0..=f32::MAX),
        ("brightness", adjustment.brightness, -1.0..=1.0),
        ("contrast", adjustment.contrast, 0.0..=f32::MAX),
    ];
    for (name, value, range) in fields {
        if !value.is_finite() || !range.contains(&value) {
            return Err(FrameError::InvalidParams(format!(
                "{layer}.{name} must be finite and within {}..={}, got {value}",
                range.start(),
                range.end(),
            )));
        }
    }
    Ok(())
}

/// Build the suppressed layer: color controls, then blur.
#[must_use = "returns the background layer"]
pub fn derive_background(
    frame: &PixelBuffer,
    grayscale_background: bool,
    params: &CompositeParams,
) -> PixelBuffer {
    let adjusted = apply_color_controls(frame, &params.background_adjustment(grayscale_background));
    gaussian_blur_frame(&adjusted, params.background_blur_sigma)
}

/// Build the boosted layer from the original frame.
#[must_use = "returns the foreground layer"]
pub fn derive_foreground(frame: &PixelBuffer, params: &CompositeParams) -> PixelBuffer {
    apply_color_controls(frame, &params.foreground)
}

/// Build `(background, foreground)` concurrently.
#[must_use = "returns the background and foreground layers"]
pub fn derive_layers(
    frame: &PixelBuffer,
    grayscale_background: bool,
    params: &CompositeParams,
) -> (PixelBuffer, PixelBuffer) {
    rayon::join(
        || derive_background(frame, grayscale_background, params),
        || derive_foreground(frame, params),
    )
}

/// Blend `foreground` over `background` weighted by `mask`.
///
/// Per color channel: `(fg * m + bg * (255 - m) + 127) / 255`, so a mask
/// value of 255 yields the foreground exactly and 0 the background
/// exactly. Alpha is taken from `frame`.
///
/// # Errors
///
/// Returns [`FrameError::MaskMismatch`] if the mask or either layer
/// does not match the frame's dimensions.
pub fn blend(
    frame: &PixelBuffer,
    foreground: &PixelBuffer,
    background: &PixelBuffer,
    mask: &MaskBuffer,
) -> Result<PixelBuffer, FrameError> {
    let dimensions = frame.dimensions();
    for other in [
        mask.dimensions(),
        foreground.dimensions(),
        background.dimensions(),
    ] {
        if other != dimensions {
            return Err(FrameError::MaskMismatch {
                frame: dimensions,
                mask: other,
            });
        }
    }

    let format = frame.format();
    let [r, g, b] = format.rgb_offsets();
    let alpha = format.alpha_offset();
    let row_len = dimensions.canonical_stride();
    let mut data = vec![0u8; row_len * dimensions.height as usize];

    data.par_chunks_mut(row_len).enumerate().for_each(|(y, out_row)| {
        let pixels = out_row
            .chunks_exact_mut(BYTES_PER_PIXEL)
            .zip(frame.row(y).chunks_exact(BYTES_PER_PIXEL))
            .zip(foreground.row(y).chunks_exact(BYTES_PER_PIXEL))
            .zip(background.row(y).chunks_exact(BYTES_PER_PIXEL))
            .zip(mask.row(y));
        for ((((out, src), fg), bg), &m) in pixels {
            for c in [r, g, b] {
                out[c] = mix(fg[c], bg[c], m);
            }
            out[alpha] = src[alpha];
        }
    });

    Ok(PixelBuffer::from_packed_parts(dimensions, format, data))
}

/// Weighted average of two channel values, `weight / 255` toward `fg`.
#[allow(clippy::cast_possible_truncation)]
const fn mix(fg: u8, bg: u8, weight: u8) -> u8 {
    let m = weight as u32;
    ((fg as u32 * m + bg as u32 * (255 - m) + 127) / 255) as u8
}

/// Derive both layers from `frame` and blend them through `mask`.
///
/// # Errors
///
/// Returns [`FrameError::InvalidParams`] for out-of-range parameters and
/// [`FrameError::MaskMismatch`] if the mask does not match the frame.
pub fn composite(
    frame: &PixelBuffer,
    mask: &MaskBuffer,
    grayscale_background: bool,
    params: &CompositeParams,
) -> Result<PixelBuffer, FrameError> {
    params.validate()?;
    if mask.dimensions() != frame.dimensions() {
        return Err(FrameError::MaskMismatch {
            frame: frame.dimensions(),
            mask: mask.dimensions(),
        });
    }
    let (background, foreground) = derive_layers(frame, grayscale_background, params);
    blend(frame, &foreground, &background, mask)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use crate::types::{Dimensions, PixelFormat, RgbaImage};

    fn uniform(width: u32, height: u32, px: [u8; 4]) -> PixelBuffer {
        let img = RgbaImage::from_pixel(width, height, image::Rgba(px));
        PixelBuffer::from_rgba_image(img).unwrap()
    }

    fn filled_mask(width: u32, height: u32, value: u8) -> MaskBuffer {
        MaskBuffer::from_raw(width, height, vec![value; (width * height) as usize]).unwrap()
    }

    #[test]
    fn defaults_match_constants() {
        let p = CompositeParams::default();
        assert_eq!(p.background.saturation, CompositeParams::DEFAULT_BACKGROUND_SATURATION);
        assert_eq!(p.background.brightness, CompositeParams::DEFAULT_BACKGROUND_BRIGHTNESS);
        assert_eq!(p.background.contrast, CompositeParams::DEFAULT_BACKGROUND_CONTRAST);
        assert_eq!(p.background_blur_sigma, CompositeParams::DEFAULT_BACKGROUND_BLUR_SIGMA);
        assert_eq!(p.foreground.saturation, CompositeParams::DEFAULT_FOREGROUND_SATURATION);
        assert_eq!(p.foreground.brightness, CompositeParams::DEFAULT_FOREGROUND_BRIGHTNESS);
        assert_eq!(p.foreground.contrast, CompositeParams::DEFAULT_FOREGROUND_CONTRAST);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn grayscale_only_overrides_background_saturation() {
        let p = CompositeParams::default();
        let gray = p.background_adjustment(true);
        assert_eq!(gray.saturation, 0.0);
        assert_eq!(gray.brightness, p.background.brightness);
        assert_eq!(p.background_adjustment(false), p.background);
    }

    #[test]
    fn validate_rejects_nan() {
        let mut p = CompositeParams::default();
        p.foreground.contrast = f32::NAN;
        let err = p.validate().unwrap_err();
        assert!(matches!(err, FrameError::InvalidParams(ref msg) if msg.contains("foreground.contrast")));
    }

    #[test]
    fn validate_rejects_negative_sigma() {
        let p = CompositeParams {
            background_blur_sigma: -1.0,
            ..CompositeParams::default()
        };
        assert!(matches!(p.validate(), Err(FrameError::InvalidParams(_))));
    }

    #[test]
    fn validate_rejects_out_of_range_brightness() {
        let mut p = CompositeParams::default();
        p.background.brightness = -2.0;
        assert!(matches!(p.validate(), Err(FrameError::InvalidParams(_))));
    }

    #[test]
    fn params_deserialize_with_missing_fields() {
        let p: CompositeParams = serde_json::from_str(r#"{"background_blur_sigma": 0.5}"#).unwrap();
        assert_eq!(p.background_blur_sigma, 0.5);
        assert_eq!(p.foreground, CompositeParams::default().foreground);
    }

    #[test]
    fn params_serde_round_trip() {
        let p = CompositeParams::default();
        let json = serde_json::to_string(&p).unwrap();
        let back: CompositeParams = serde_json::from_str(&json).unwrap();
        assert_eq!(p, back);
    }

    #[test]
    fn mix_endpoints_are_exact() {
        for (fg, bg) in [(0, 255), (255, 0), (17, 200), (123, 123)] {
            assert_eq!(mix(fg, bg, 255), fg);
            assert_eq!(mix(fg, bg, 0), bg);
        }
    }

    #[test]
    fn full_mask_yields_foreground() {
        let frame = uniform(6, 4, [200, 60, 40, 255]);
        let params = CompositeParams::default();
        let out = composite(&frame, &filled_mask(6, 4, 255), false, &params).unwrap();
        assert_eq!(out, derive_foreground(&frame, &params));
    }

    #[test]
    fn empty_mask_yields_background() {
        let frame = uniform(6, 4, [200, 60, 40, 255]);
        let params = CompositeParams::default();
        let out = composite(&frame, &filled_mask(6, 4, 0), false, &params).unwrap();
        assert_eq!(out, derive_background(&frame, false, &params));
    }

    #[test]
    fn soft_mask_blends_proportionally() {
        let frame = uniform(1, 1, [100, 100, 100, 255]);
        let fg = uniform(1, 1, [200, 0, 100, 255]);
        let bg = uniform(1, 1, [0, 200, 100, 255]);
        let out = blend(&frame, &fg, &bg, &filled_mask(1, 1, 128)).unwrap();
        // 128/255 of the way from background to foreground.
        assert_eq!(out.pixel(0, 0), [100, 100, 100, 255]);

        let out = blend(&frame, &fg, &bg, &filled_mask(1, 1, 64)).unwrap();
        let [r, g, _, _] = out.pixel(0, 0);
        assert_eq!(r, 50);
        assert_eq!(g, 150);
    }

    #[test]
    fn alpha_comes_from_source() {
        let frame = uniform(3, 3, [10, 200, 10, 42]);
        let out = composite(&frame, &filled_mask(3, 3, 255), true, &CompositeParams::default()).unwrap();
        assert!(out.as_raw().chunks_exact(4).all(|px| px[3] == 42));
    }

    #[test]
    fn grayscale_background_keeps_foreground_colorful() {
        let frame = uniform(2, 1, [200, 40, 40, 255]);
        let mask = MaskBuffer::from_raw(2, 1, vec![255, 0]).unwrap();
        let out = composite(&frame, &mask, true, &CompositeParams::default()).unwrap();
        let [fr, fg, fb, _] = out.pixel(0, 0);
        assert!(fr > fg && fr > fb, "foreground lost its color: {:?}", out.pixel(0, 0));
        let [br, bg, bb, _] = out.pixel(1, 0);
        assert_eq!(br, bg);
        assert_eq!(bg, bb);
    }

    #[test]
    fn background_is_darker_than_source() {
        let frame = uniform(5, 5, [150, 150, 150, 255]);
        let bg = derive_background(&frame, false, &CompositeParams::default());
        assert!(bg.pixel(2, 2)[0] < 150);
    }

    #[test]
    fn mismatched_mask_is_rejected() {
        let frame = uniform(4, 4, [0, 0, 0, 255]);
        let err = composite(&frame, &filled_mask(4, 3, 0), false, &CompositeParams::default()).unwrap_err();
        assert_eq!(
            err,
            FrameError::MaskMismatch {
                frame: Dimensions { width: 4, height: 4 },
                mask: Dimensions { width: 4, height: 3 },
            }
        );
    }

    #[test]
    fn output_has_canonical_stride_for_padded_input() {
        let mut data = Vec::new();
        for _ in 0..3 {
            data.extend_from_slice(&[30, 200, 40, 255, 30, 200, 40, 255]);
            data.extend_from_slice(&[0; 8]);
        }
        let frame = PixelBuffer::new(2, 3, 16, PixelFormat::Bgra8, data).unwrap();
        let out = composite(&frame, &filled_mask(2, 3, 255), false, &CompositeParams::default()).unwrap();
        assert_eq!(out.dimensions(), frame.dimensions());
        assert_eq!(out.stride(), 8);
        assert_eq!(out.format(), PixelFormat::Bgra8);
    }
}
