//! huelight: run the highlighting pipeline over still frames.
//!
//! Loads an image (or a directory of frames), applies a color selection
//! or vision mode, writes the highlighted result and prints per-stage
//! diagnostics. Useful for:
//!
//! - Checking which regions a color category or vision mode picks up
//! - Tuning the background/foreground parameters via `--config-json`
//! - Measuring per-stage durations at realistic frame sizes
//! - Exercising the streaming worker on a sequence of frames
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin huelight -- [OPTIONS] <INPUT>
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `warn`).

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{Parser, ValueEnum};
use huelight_pipeline::diagnostics::{Clock, FrameDiagnostics, duration_ms};
use huelight_pipeline::sample;
use huelight_pipeline::{
    Color, ColorCategory, CompositeParams, FrameError, FrameOutput, PixelBuffer, PixelFormat,
    SelectionState, SharedSelection, VisionMode,
};
use huelight_stream::{FrameWorker, PresentedFrame, RawFrame, StreamConfig};

/// Image extensions picked up when `<INPUT>` is a directory.
const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "webp"];

/// Real-time color highlighting for color-vision-deficient viewers.
///
/// Boosts pixels of the selected color categories and suppresses the
/// rest of the frame, printing per-stage timing diagnostics.
#[derive(Parser)]
#[command(name = "huelight", version)]
struct Cli {
    /// Input image (PNG, JPEG, BMP, WebP) or a directory of frames.
    input: PathBuf,

    /// Highlight a color category (red, yellow, green, blue).
    ///
    /// Repeatable. Colors are toggled in order, keeping at most two:
    /// a third evicts the first.
    #[arg(long = "color", value_name = "COLOR")]
    colors: Vec<ColorCategory>,

    /// Highlight the categories for a vision mode (normal, green-weak,
    /// red-weak, blue-weak, or deuteranomaly/protanomaly/tritanomaly).
    #[arg(long, conflicts_with = "colors")]
    mode: Option<VisionMode>,

    /// Fully desaturate the background.
    #[arg(long)]
    grayscale: bool,

    /// Channel order to present frames in, as a capture device would.
    #[arg(long, value_enum, default_value_t = Layout::Rgba)]
    layout: Layout,

    /// Write the highlighted frame here (a directory for directory input).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Full compositing parameters as a JSON string.
    ///
    /// The JSON must be a valid `CompositeParams` serialization; missing
    /// fields take their defaults.
    #[arg(long)]
    config_json: Option<String>,

    /// Number of runs per frame for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of a human-readable report.
    #[arg(long)]
    json: bool,

    /// Feed frames through the streaming worker instead of processing
    /// them inline.
    #[arg(long)]
    stream: bool,
}

/// Frame channel order selection.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Layout {
    /// Red, green, blue, alpha.
    Rgba,
    /// Blue, green, red, alpha.
    Bgra,
}

impl From<Layout> for PixelFormat {
    fn from(layout: Layout) -> Self {
        match layout {
            Layout::Rgba => Self::Rgba8,
            Layout::Bgra => Self::Bgra8,
        }
    }
}

/// Build [`CompositeParams`] from CLI arguments.
///
/// `--config-json` is parsed directly; otherwise the defaults apply.
fn params_from_cli(cli: &Cli) -> Result<CompositeParams, String> {
    let params = match cli.config_json {
        Some(ref json) => serde_json::from_str(json)
            .map_err(|e| format!("Error parsing --config-json: {e}"))?,
        None => CompositeParams::default(),
    };
    params.validate().map_err(|e| e.to_string())?;
    Ok(params)
}

/// Build the selection the way a user would through the UI.
fn selection_from_cli(cli: &Cli) -> SelectionState {
    let mut state = SelectionState::new();
    for &color in &cli.colors {
        state.toggle(color);
    }
    if let Some(mode) = cli.mode {
        state.select_mode(mode);
    }
    state.set_grayscale_background(cli.grayscale);
    state
}

/// Resolve `<INPUT>` to the frames to process, in name order.
fn frame_paths(input: &Path) -> Result<Vec<PathBuf>, String> {
    if !input.is_dir() {
        return Ok(vec![input.to_path_buf()]);
    }
    let entries = std::fs::read_dir(input)
        .map_err(|e| format!("Error reading directory {}: {e}", input.display()))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| FRAME_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        })
        .collect();
    paths.sort();
    if paths.is_empty() {
        return Err(format!("No image frames found in {}", input.display()));
    }
    Ok(paths)
}

/// Convert a decoded image into a frame with the requested channel order.
///
/// # Errors
///
/// Returns [`FrameError::UnsupportedFormat`] for images with more than
/// 8 bits per channel, and the layout errors of [`PixelBuffer`] for
/// empty images.
fn frame_from_image(image: image::DynamicImage, format: PixelFormat) -> Result<PixelBuffer, FrameError> {
    let color = image.color();
    if color.bytes_per_pixel() != color.channel_count() {
        return Err(FrameError::UnsupportedFormat(format!(
            "{color:?} has more than 8 bits per channel"
        )));
    }
    let rgba = image.into_rgba8();
    let (width, height) = rgba.dimensions();
    let mut data = rgba.into_raw();
    if format == PixelFormat::Bgra8 {
        for px in data.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
    }
    PixelBuffer::packed(width, height, format, data)
}

fn load_frame(path: &Path, format: PixelFormat) -> Result<PixelBuffer, String> {
    let image = image::open(path).map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    frame_from_image(image, format).map_err(|e| format!("Error loading {}: {e}", path.display()))
}

/// Where to write the output for `frame_path`, if anywhere.
fn output_path(cli: &Cli, frame_path: &Path) -> Option<PathBuf> {
    let output = cli.output.as_ref()?;
    if cli.input.is_dir() {
        let stem = frame_path.file_stem()?.to_string_lossy();
        Some(output.join(format!("{stem}.png")))
    } else {
        Some(output.clone())
    }
}

fn write_output(path: &Path, output: &FrameOutput) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Error creating {}: {e}", parent.display()))?;
    }
    output
        .composited
        .to_rgba_image()
        .save(path)
        .map_err(|e| format!("Error writing {}: {e}", path.display()))?;
    eprintln!("Output written to {}", path.display());
    Ok(())
}

/// Center readout, with the category of the source frame's center pixel.
fn describe_center(center: Color, category: Option<ColorCategory>) -> String {
    let hex = center.to_hex();
    match category {
        Some(category) => format!("{hex} ({category})"),
        None => hex,
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let params = match params_from_cli(&cli) {
        Ok(p) => p,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    let selection = selection_from_cli(&cli);

    let paths = match frame_paths(&cli.input) {
        Ok(paths) => paths,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    eprintln!("Input: {} ({} frame(s))", cli.input.display(), paths.len());
    eprintln!(
        "Selection: {} (grayscale background: {})",
        huelight_pipeline::active_categories(&selection),
        selection.grayscale_background(),
    );
    eprintln!("Params: {params:#?}");
    eprintln!();

    let result = if cli.stream {
        run_stream(&cli, &paths, selection, params)
    } else {
        run_inline(&cli, &paths, &selection, &params)
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}

/// Process every frame on this thread, `--runs` times each, with
/// diagnostics.
fn run_inline(
    cli: &Cli,
    paths: &[PathBuf],
    selection: &SelectionState,
    params: &CompositeParams,
) -> Result<(), String> {
    let format = PixelFormat::from(cli.layout);
    let mut all_diagnostics = Vec::with_capacity(paths.len() * cli.runs);

    for path in paths {
        let frame = load_frame(path, format)?;
        eprintln!(
            "Frame: {} ({}x{})",
            path.display(),
            frame.width(),
            frame.height()
        );

        for run in 0..cli.runs {
            if cli.runs > 1 {
                eprintln!("--- Run {}/{} ---", run + 1, cli.runs);
            }

            let (output, diagnostics) = huelight_pipeline::process_frame_with_diagnostics(
                &frame, selection, params, &StdClock,
            )
            .map_err(|e| format!("Pipeline error: {e}"))?;

            if cli.json {
                let json = serde_json::to_string_pretty(&diagnostics)
                    .map_err(|e| format!("Error serializing diagnostics: {e}"))?;
                println!("{json}");
            } else {
                println!("{}", diagnostics.report());
            }

            // Write output on the first run only.
            if run == 0 {
                let category = sample::classify_center(&frame);
                eprintln!("Center: {}", describe_center(output.center_color, category));
                if let Some(out) = output_path(cli, path) {
                    write_output(&out, &output)?;
                }
            }

            all_diagnostics.push(diagnostics);
        }

        if cli.runs > 1 || paths.len() > 1 {
            eprintln!();
        }
    }

    if all_diagnostics.len() > 1 {
        print_multi_run_summary(&all_diagnostics);
    }
    Ok(())
}

/// Push every frame through a [`FrameWorker`] as a capture source would.
fn run_stream(
    cli: &Cli,
    paths: &[PathBuf],
    selection: SelectionState,
    params: CompositeParams,
) -> Result<(), String> {
    let format = PixelFormat::from(cli.layout);
    let (tx, rx) = crossbeam_channel::unbounded::<PresentedFrame>();
    let started = Instant::now();

    let worker = FrameWorker::spawn(
        SharedSelection::new(selection),
        move |frame: PresentedFrame| {
            if tx.send(frame).is_err() {
                log::warn!("presentation channel closed");
            }
        },
        StreamConfig {
            params,
            ..StreamConfig::default()
        },
    )
    .map_err(|e| format!("Error starting worker: {e}"))?;

    let mut sequence_paths = Vec::with_capacity(paths.len());
    for path in paths {
        // Unreadable files never become frames; the stream carries on.
        let frame = match load_frame(path, format) {
            Ok(frame) => frame,
            Err(msg) => {
                log::warn!("{msg}");
                continue;
            }
        };
        let category = sample::classify_center(&frame);
        let sequence = worker
            .submit(RawFrame::from(frame))
            .map_err(|e| format!("Error submitting frame: {e}"))?;
        sequence_paths.push((sequence, path.clone(), category));
    }

    let stats = worker
        .shutdown()
        .map_err(|e| format!("Worker error: {e}"))?;
    let elapsed = started.elapsed();

    for presented in rx.try_iter() {
        let Some((_, path, category)) = sequence_paths
            .iter()
            .find(|(sequence, ..)| *sequence == presented.sequence)
        else {
            continue;
        };
        eprintln!(
            "Frame {} ({}): center {}",
            presented.sequence,
            path.display(),
            describe_center(presented.output.center_color, *category),
        );
        if let Some(out) = output_path(cli, path) {
            write_output(&out, &presented.output)?;
        }
    }

    #[allow(clippy::cast_precision_loss)]
    let per_frame = if stats.processed > 0 {
        duration_ms(elapsed) / stats.processed as f64
    } else {
        0.0
    };
    if cli.json {
        let summary = serde_json::json!({
            "submitted": stats.submitted,
            "processed": stats.processed,
            "skipped": stats.skipped,
            "dropped": stats.dropped,
            "elapsed_seconds": elapsed.as_secs_f64(),
        });
        println!("{summary:#}");
    } else {
        println!(
            "Stream: {} submitted, {} processed, {} skipped, {} dropped in {:.3}ms ({per_frame:.3}ms/frame)",
            stats.submitted,
            stats.processed,
            stats.skipped,
            stats.dropped,
            duration_ms(elapsed),
        );
    }
    Ok(())
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&FrameDiagnostics) -> Option<Duration>;

/// Print aggregated statistics across runs and frames.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[FrameDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| duration_ms(d.total_duration))
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");
    if mean > 0.0 {
        println!("Throughput: {:.1} frames/s", 1000.0 / mean);
    }

    println!();
    println!("{:<16} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(32));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Mask", |d| Some(d.mask.duration)),
        ("Background", |d| d.background.as_ref().map(|s| s.duration)),
        ("Foreground", |d| d.foreground.as_ref().map(|s| s.duration)),
        ("Blend", |d| d.blend.as_ref().map(|s| s.duration)),
        ("Sample", |d| Some(d.sample.duration)),
    ];

    for (name, extractor) in stage_extractors {
        let stage_durations: Vec<f64> = all_diagnostics
            .iter()
            .filter_map(extractor)
            .map(duration_ms)
            .collect();

        if stage_durations.is_empty() {
            continue;
        }

        let stage_mean = stage_durations.iter().sum::<f64>() / stage_durations.len() as f64;
        println!("{name:<16} {stage_mean:>10.3}ms");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use huelight_pipeline::{Selection, active_categories};

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("huelight").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn colors_are_toggled_in_order() {
        let cli = parse(&["--color", "red", "--color", "green", "--color", "blue", "in.png"]);
        let state = selection_from_cli(&cli);
        assert_eq!(
            state.manual().to_vec(),
            [ColorCategory::Green, ColorCategory::Blue]
        );
    }

    #[test]
    fn clinical_mode_names_are_accepted() {
        let cli = parse(&["--mode", "tritanomaly", "--grayscale", "in.png"]);
        let state = selection_from_cli(&cli);
        assert_eq!(state.selection(), Selection::Vision(VisionMode::BlueWeak));
        assert!(state.grayscale_background());
        assert_eq!(active_categories(&state).len(), 2);
    }

    #[test]
    fn color_and_mode_conflict() {
        let result = Cli::try_parse_from(["huelight", "--color", "red", "--mode", "red-weak", "in.png"]);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_color_is_rejected() {
        assert!(Cli::try_parse_from(["huelight", "--color", "purple", "in.png"]).is_err());
    }

    #[test]
    fn config_json_overrides_defaults() {
        let cli = parse(&["--config-json", r#"{"background_blur_sigma": 0.0}"#, "in.png"]);
        let params = params_from_cli(&cli).unwrap();
        assert_eq!(params.background_blur_sigma.to_bits(), 0.0_f32.to_bits());
        assert_eq!(params.foreground, CompositeParams::default().foreground);
    }

    #[test]
    fn invalid_config_json_is_reported() {
        let cli = parse(&["--config-json", "{not json", "in.png"]);
        assert!(params_from_cli(&cli).unwrap_err().contains("--config-json"));
    }

    #[test]
    fn out_of_range_params_are_reported() {
        let cli = parse(&["--config-json", r#"{"background_blur_sigma": -3.0}"#, "in.png"]);
        assert!(params_from_cli(&cli).unwrap_err().contains("background_blur_sigma"));
    }

    #[test]
    fn bgra_layout_swaps_red_and_blue() {
        let img = image::RgbaImage::from_pixel(2, 2, image::Rgba([10, 20, 30, 255]));
        let frame = frame_from_image(image::DynamicImage::ImageRgba8(img), PixelFormat::Bgra8).unwrap();
        assert_eq!(frame.pixel(1, 1), [30, 20, 10, 255]);
        assert_eq!(frame.to_rgba_image().get_pixel(1, 1).0, [10, 20, 30, 255]);
    }

    #[test]
    fn sixteen_bit_images_are_unsupported() {
        let img = image::DynamicImage::new_rgba16(2, 2);
        assert!(matches!(
            frame_from_image(img, PixelFormat::Rgba8),
            Err(FrameError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn rgb_images_gain_opaque_alpha() {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(1, 1, image::Rgb([1, 2, 3])));
        let frame = frame_from_image(img, PixelFormat::Rgba8).unwrap();
        assert_eq!(frame.pixel(0, 0), [1, 2, 3, 255]);
    }

    #[test]
    fn center_description_names_the_source_category() {
        let frame = PixelBuffer::packed(3, 3, PixelFormat::Bgra8, [220, 40, 30, 255].repeat(9)).unwrap();
        let center = sample::sample_center(&frame).unwrap();
        let text = describe_center(center, sample::classify_center(&frame));
        assert_eq!(text, format!("{} (blue)", center.to_hex()));

        let gray = Color::from_rgb8(128, 128, 128);
        assert_eq!(describe_center(gray, None), gray.to_hex());
    }
}
