//! huelight-pipeline: per-frame color highlighting (sans-IO).
//!
//! Turns one captured video frame into a frame where pixels of the
//! chosen color categories are boosted and everything else is
//! suppressed:
//!
//! selection snapshot -> active categories -> HSV mask ->
//! background/foreground layers -> mask-weighted blend,
//!
//! plus a readout of the color under the frame center.
//!
//! This crate has **no I/O dependencies** and owns no threads: it
//! operates on in-memory [`PixelBuffer`]s and uses rayon only for
//! intra-frame parallelism. Frame delivery and presentation live in
//! `huelight-stream` and the CLI.

pub mod adjust;
pub mod blur;
pub mod composite;
pub mod criteria;
pub mod diagnostics;
pub mod hsv;
pub mod mask;
pub mod sample;
pub mod selection;
pub mod types;

pub use composite::CompositeParams;
pub use criteria::{ActiveCategories, ColorCategory, ParseSelectionError, VisionMode};
pub use selection::{Selection, SelectionState, SharedSelection, active_categories};
pub use types::{Color, Dimensions, FrameError, FrameOutput, MaskBuffer, PixelBuffer, PixelFormat};

use diagnostics::{
    Clock, FrameDiagnostics, FrameSummary, StageDiagnostics, StageMetrics, mask_metrics,
};

/// Process one frame with the default [`CompositeParams`].
///
/// # Errors
///
/// See [`process_frame_with`].
pub fn process_frame(
    frame: &PixelBuffer,
    state: &SelectionState,
) -> Result<FrameOutput, FrameError> {
    process_frame_with(frame, state, &CompositeParams::default())
}

/// Process one frame.
///
/// `state` is the selection snapshot for this frame; take it once with
/// [`SharedSelection::snapshot`] and do not re-read mid-frame.
///
/// # Pipeline steps
///
/// 1. Resolve the active categories from `state`
/// 2. Sample the center color of the unprocessed frame
/// 3. If nothing is selected, return the frame unchanged (no mask scan,
///    no layer derivation)
/// 4. Build the mask and derive both layers concurrently
/// 5. Blend the layers through the mask
///
/// # Errors
///
/// Returns the layout errors of [`PixelBuffer::validate`] for an
/// unreadable frame and [`FrameError::InvalidParams`] for out-of-range
/// `params`. Either way nothing is produced for the frame.
pub fn process_frame_with(
    frame: &PixelBuffer,
    state: &SelectionState,
    params: &CompositeParams,
) -> Result<FrameOutput, FrameError> {
    frame.validate()?;
    params.validate()?;

    let active = active_categories(state);
    let center_color = center_color(frame)?;

    if active.is_empty() {
        log::trace!("no active categories, passing frame through");
        return Ok(FrameOutput {
            composited: frame.repack(),
            center_color,
        });
    }

    let grayscale = state.grayscale_background();
    let (mask, (background, foreground)) = rayon::join(
        || mask::build_mask(frame, active),
        || composite::derive_layers(frame, grayscale, params),
    );
    let composited = composite::blend(frame, &foreground, &background, &mask)?;

    Ok(FrameOutput {
        composited,
        center_color,
    })
}

/// Process one frame, timing each stage with `clock`.
///
/// Stages run sequentially so each duration is attributable; output is
/// identical to [`process_frame_with`].
///
/// # Errors
///
/// Same as [`process_frame_with`].
pub fn process_frame_with_diagnostics(
    frame: &PixelBuffer,
    state: &SelectionState,
    params: &CompositeParams,
    clock: &impl Clock,
) -> Result<(FrameOutput, FrameDiagnostics), FrameError> {
    let total_start = clock.now();
    frame.validate()?;
    params.validate()?;

    let active = active_categories(state);
    let grayscale = state.grayscale_background();
    let dimensions = frame.dimensions();

    // Center sample.
    let start = clock.now();
    let center_color = center_color(frame)?;
    let sample = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Sample {
            hex: center_color.to_hex(),
            category: ColorCategory::classify(center_color.to_hsv()).map(|c| c.to_string()),
        },
    };

    // Mask.
    let start = clock.now();
    let (mask, pixels_scanned) = mask::build_mask_counted(frame, active);
    let coverage = mask.coverage();
    let mask_stage = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: mask_metrics(active, pixels_scanned, coverage),
    };

    if active.is_empty() {
        let output = FrameOutput {
            composited: frame.repack(),
            center_color,
        };
        let diag = FrameDiagnostics {
            mask: mask_stage,
            background: None,
            foreground: None,
            blend: None,
            sample,
            total_duration: clock.elapsed(&total_start),
            summary: FrameSummary::new(dimensions.width, dimensions.height, true, 0),
        };
        return Ok((output, diag));
    }

    // Background.
    let start = clock.now();
    let background = composite::derive_background(frame, grayscale, params);
    let background_stage = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Background {
            grayscale,
            sigma: params.background_blur_sigma,
        },
    };

    // Foreground.
    let start = clock.now();
    let foreground = composite::derive_foreground(frame, params);
    let foreground_stage = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Foreground {
            saturation: params.foreground.saturation,
        },
    };

    // Blend.
    let start = clock.now();
    let composited = composite::blend(frame, &foreground, &background, &mask)?;
    let blend_stage = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Blend {
            stride: composited.stride(),
        },
    };

    let diag = FrameDiagnostics {
        mask: mask_stage,
        background: Some(background_stage),
        foreground: Some(foreground_stage),
        blend: Some(blend_stage),
        sample,
        total_duration: clock.elapsed(&total_start),
        summary: FrameSummary::new(dimensions.width, dimensions.height, false, coverage),
    };
    log::debug!(
        "frame {}x{} processed in {:.3}ms ({} of {} pixels highlighted)",
        dimensions.width,
        dimensions.height,
        diagnostics::duration_ms(diag.total_duration),
        coverage,
        dimensions.pixel_count(),
    );

    Ok((
        FrameOutput {
            composited,
            center_color,
        },
        diag,
    ))
}

fn center_color(frame: &PixelBuffer) -> Result<Color, FrameError> {
    sample::read_center(frame)
}
