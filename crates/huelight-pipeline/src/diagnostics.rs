//! Per-frame diagnostics: timing and counts for each pipeline stage.
//!
//! Collected by [`process_frame_with_diagnostics`](crate::process_frame_with_diagnostics)
//! for tuning and benchmarking. The pipeline never reads the system
//! clock itself; callers inject a [`Clock`] so the crate stays free of
//! platform time APIs.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::criteria::ActiveCategories;

/// Injectable time source.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// Capture the current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from processing a single frame.
///
/// Stages skipped by the passthrough shortcut are `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameDiagnostics {
    /// Selection mask construction.
    pub mask: StageDiagnostics,
    /// Background derivation (color controls + blur).
    pub background: Option<StageDiagnostics>,
    /// Foreground derivation.
    pub foreground: Option<StageDiagnostics>,
    /// Mask-weighted blend.
    pub blend: Option<StageDiagnostics>,
    /// Center color readout.
    pub sample: StageDiagnostics,
    /// Total wall-clock duration for the frame (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary across stages.
    pub summary: FrameSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Mask construction metrics.
    Mask {
        /// Active categories, e.g. `"red+blue"`.
        categories: String,
        /// Pixels converted and tested (0 on the passthrough path).
        pixels_scanned: u64,
        /// Pixels selected for the foreground.
        coverage: u64,
    },
    /// Background layer metrics.
    Background {
        /// Whether the background was fully desaturated.
        grayscale: bool,
        /// Blur sigma used.
        sigma: f32,
    },
    /// Foreground layer metrics.
    Foreground {
        /// Saturation multiplier used.
        saturation: f32,
    },
    /// Blend metrics.
    Blend {
        /// Output row length in bytes.
        stride: usize,
    },
    /// Center sample metrics.
    Sample {
        /// Center color as `#rrggbb`.
        hex: String,
        /// Category of the center color, if any.
        category: Option<String>,
    },
}

/// High-level summary for the frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameSummary {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// `true` if the frame was passed through unchanged.
    pub passthrough: bool,
    /// Fraction of pixels highlighted, `[0, 1]`.
    pub coverage_ratio: f64,
}

impl FrameSummary {
    #[allow(clippy::cast_precision_loss)]
    pub(crate) fn new(width: u32, height: u32, passthrough: bool, coverage: u64) -> Self {
        let pixel_count = u64::from(width) * u64::from(height);
        let coverage_ratio = if pixel_count > 0 {
            coverage as f64 / pixel_count as f64
        } else {
            0.0
        };
        Self {
            width,
            height,
            pixel_count,
            passthrough,
            coverage_ratio,
        }
    }
}

impl FrameDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Frame Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Frame: {}x{} ({} pixels){}",
            self.summary.width,
            self.summary.height,
            self.summary.pixel_count,
            if self.summary.passthrough {
                "  [passthrough]"
            } else {
                ""
            },
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<16} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(72));

        let total_ms = duration_ms(self.total_duration);
        for (name, diag) in self.stages() {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<16} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Highlighted: {:.1}% of pixels",
            self.summary.coverage_ratio * 100.0,
        ));

        lines.join("\n")
    }

    /// Executed stages in pipeline order.
    #[must_use]
    pub fn stages(&self) -> Vec<(&'static str, &StageDiagnostics)> {
        let mut stages = vec![("Mask", &self.mask)];
        if let Some(ref bg) = self.background {
            stages.push(("Background", bg));
        }
        if let Some(ref fg) = self.foreground {
            stages.push(("Foreground", fg));
        }
        if let Some(ref blend) = self.blend {
            stages.push(("Blend", blend));
        }
        stages.push(("Sample", &self.sample));
        stages
    }
}

/// Mask stage metrics for the given selection and counts.
pub(crate) fn mask_metrics(active: ActiveCategories, pixels_scanned: u64, coverage: u64) -> StageMetrics {
    StageMetrics::Mask {
        categories: active.to_string(),
        pixels_scanned,
        coverage,
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
#[must_use]
pub fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Mask {
            categories,
            pixels_scanned,
            coverage,
        } => format!("{categories} scanned={pixels_scanned} selected={coverage}"),
        StageMetrics::Background { grayscale, sigma } => {
            format!("grayscale={grayscale} sigma={sigma:.2}")
        }
        StageMetrics::Foreground { saturation } => format!("saturation={saturation:.2}"),
        StageMetrics::Blend { stride } => format!("stride={stride}"),
        StageMetrics::Sample { hex, category } => match category {
            Some(category) => format!("{hex} ({category})"),
            None => hex.clone(),
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn stage(ms: u64, metrics: StageMetrics) -> StageDiagnostics {
        StageDiagnostics {
            duration: Duration::from_millis(ms),
            metrics,
        }
    }

    fn sample_diagnostics() -> FrameDiagnostics {
        FrameDiagnostics {
            mask: stage(
                4,
                StageMetrics::Mask {
                    categories: "red+green".to_string(),
                    pixels_scanned: 100,
                    coverage: 25,
                },
            ),
            background: Some(stage(
                6,
                StageMetrics::Background {
                    grayscale: true,
                    sigma: 2.0,
                },
            )),
            foreground: Some(stage(3, StageMetrics::Foreground { saturation: 1.6 })),
            blend: Some(stage(2, StageMetrics::Blend { stride: 40 })),
            sample: stage(
                0,
                StageMetrics::Sample {
                    hex: "#ff0000".to_string(),
                    category: Some("red".to_string()),
                },
            ),
            total_duration: Duration::from_millis(15),
            summary: FrameSummary::new(10, 10, false, 25),
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn summary_computes_coverage_ratio() {
        let summary = FrameSummary::new(10, 10, false, 25);
        assert_eq!(summary.pixel_count, 100);
        assert!((summary.coverage_ratio - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn report_lists_every_stage() {
        let report = sample_diagnostics().report();
        for name in ["Mask", "Background", "Foreground", "Blend", "Sample"] {
            assert!(report.contains(name), "missing {name} in report:\n{report}");
        }
        assert!(report.contains("scanned=100"));
        assert!(report.contains("#ff0000 (red)"));
    }

    #[test]
    fn passthrough_report_skips_layer_stages() {
        let mut diag = sample_diagnostics();
        diag.background = None;
        diag.foreground = None;
        diag.blend = None;
        diag.summary = FrameSummary::new(10, 10, true, 0);
        let names: Vec<_> = diag.stages().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["Mask", "Sample"]);
        assert!(diag.report().contains("[passthrough]"));
    }

    #[test]
    fn json_round_trip_preserves_durations() {
        let diag = sample_diagnostics();
        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("\"total_duration\":0.015"));
        let back: FrameDiagnostics = serde_json::from_str(&json).unwrap();
        assert!(back.total_duration.abs_diff(diag.total_duration) <= Duration::from_nanos(1));
        assert!(back.mask.duration.abs_diff(diag.mask.duration) <= Duration::from_nanos(1));
    }

    #[test]
    fn negative_duration_is_rejected() {
        let mut value = serde_json::to_value(sample_diagnostics()).unwrap();
        value["total_duration"] = serde_json::json!(-1.0);
        assert!(serde_json::from_value::<FrameDiagnostics>(value).is_err());
    }
}
