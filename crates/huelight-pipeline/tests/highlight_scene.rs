//! Integration test: run a synthesized scene through the full pipeline
//! under each selection mechanism.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use huelight_pipeline::hsv::rgb8_to_hsv;
use huelight_pipeline::{
    ColorCategory, CompositeParams, PixelBuffer, PixelFormat, SharedSelection, VisionMode,
    mask, process_frame,
};

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;

/// A red disk in the center of a muted olive field, with a blue bar
/// along the top. Stored as BGRA like a typical camera frame.
fn scene() -> PixelBuffer {
    let mut data = Vec::with_capacity((WIDTH * HEIGHT * 4) as usize);
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let dx = f64::from(x) - f64::from(WIDTH / 2);
            let dy = f64::from(y) - f64::from(HEIGHT / 2);
            let rgb: [u8; 3] = if dx.hypot(dy) < 10.0 {
                [210, 35, 30]
            } else if y < 6 {
                [25, 50, 210]
            } else {
                [110, 105, 90]
            };
            data.extend_from_slice(&[rgb[2], rgb[1], rgb[0], 255]);
        }
    }
    PixelBuffer::packed(WIDTH, HEIGHT, PixelFormat::Bgra8, data).unwrap()
}

fn rgb_at(frame: &PixelBuffer, x: usize, y: usize) -> [u8; 3] {
    let px = frame.pixel(x, y);
    let [r, g, b] = frame.format().rgb_offsets();
    [px[r], px[g], px[b]]
}

fn saturation(rgb: [u8; 3]) -> f32 {
    rgb8_to_hsv(rgb[0], rgb[1], rgb[2]).s
}

#[test]
fn red_selection_boosts_disk_and_suppresses_field() {
    let frame = scene();
    let shared = SharedSelection::default();
    shared.toggle_manual_color(ColorCategory::Red);
    shared.set_grayscale_background(true);

    let out = process_frame(&frame, &shared.snapshot()).expect("frame should process");

    let center = (WIDTH as usize / 2, HEIGHT as usize / 2);
    let src_center = rgb_at(&frame, center.0, center.1);
    let out_center = rgb_at(&out.composited, center.0, center.1);
    assert!(
        saturation(out_center) >= saturation(src_center),
        "disk should stay at least as saturated: {src_center:?} -> {out_center:?}",
    );

    // Corner of the olive field: grayscale and darker.
    let [r, g, b] = rgb_at(&out.composited, 2, HEIGHT as usize - 3);
    assert_eq!(r, g);
    assert_eq!(g, b);
    assert!(r < 110);

    // The blue bar is not selected, so it is grayed out too.
    let [r, g, b] = rgb_at(&out.composited, 20, 1);
    assert!(r.abs_diff(g) <= 1 && g.abs_diff(b) <= 1, "bar kept color: {r},{g},{b}");

    assert_eq!(out.center_color.to_rgb8(), [210, 35, 30]);
    assert_eq!(
        ColorCategory::classify(out.center_color.to_hsv()),
        Some(ColorCategory::Red)
    );
}

#[test]
fn vision_modes_select_expected_regions() {
    let frame = scene();
    let disk = (WIDTH / 2, HEIGHT / 2);
    let bar = (20, 1);
    let field = (2, HEIGHT - 3);

    let cases = [
        (VisionMode::RedWeak, true, false),
        (VisionMode::BlueWeak, false, true),
        (VisionMode::GreenWeak, false, false),
    ];
    for (mode, disk_on, bar_on) in cases {
        let m = mask::build_mask(&frame, mode.categories());
        assert_eq!(m.get(disk.0, disk.1), Some(if disk_on { 255 } else { 0 }), "{mode} disk");
        assert_eq!(m.get(bar.0, bar.1), Some(if bar_on { 255 } else { 0 }), "{mode} bar");
        assert_eq!(m.get(field.0, field.1), Some(0), "{mode} field");
    }
}

#[test]
fn switching_back_to_normal_restores_passthrough() {
    let frame = scene();
    let shared = SharedSelection::default();
    shared.select_vision_mode(VisionMode::BlueWeak);
    let highlighted = process_frame(&frame, &shared.snapshot()).unwrap();
    assert_ne!(highlighted.composited, frame);

    shared.select_vision_mode(VisionMode::Normal);
    let plain = process_frame(&frame, &shared.snapshot()).unwrap();
    assert_eq!(plain.composited.as_raw(), frame.as_raw());
}

#[test]
fn snapshots_taken_while_another_thread_mutates_are_consistent() {
    let frame = scene();
    let shared = SharedSelection::default();

    let writer = {
        let shared = shared.clone();
        std::thread::spawn(move || {
            for i in 0..200 {
                if i % 2 == 0 {
                    shared.toggle_manual_color(ColorCategory::Red);
                } else {
                    shared.select_vision_mode(VisionMode::BlueWeak);
                }
            }
        })
    };

    for _ in 0..10 {
        let snapshot = shared.snapshot();
        let out = process_frame(&frame, &snapshot).unwrap();
        assert_eq!(out.composited.dimensions(), frame.dimensions());
    }
    writer.join().unwrap();
}

#[test]
fn default_params_round_trip_through_json() {
    let json = serde_json::to_string_pretty(&CompositeParams::default()).unwrap();
    let parsed: CompositeParams = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, CompositeParams::default());
}
