use std::rc::Rc;

use approx::assert_relative_eq;
use chart_overlay::core::{
    Anchor, ChartHost, CoordinateBridge, HeadlessChart, HeadlessChartOptions, OhlcBar, PixelPoint,
    resolved,
};
use chart_overlay::OverlayError;
use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;

fn chart() -> Rc<HeadlessChart> {
    HeadlessChart::create_view(800, 400, HeadlessChartOptions::new((0.0, 100.0), (0.0, 100.0)))
        .expect("chart init")
}

#[test]
fn anchors_map_to_pixels_through_host_scales() {
    let chart = chart();
    let bridge = CoordinateBridge::new(&*chart);

    assert_relative_eq!(bridge.time_to_pixel_x(50.0).expect("x"), 400.0);
    assert_relative_eq!(bridge.price_to_pixel_y(25.0).expect("y"), 300.0);

    let pixel = bridge
        .anchor_to_pixel(Anchor::new(10.0, 75.0))
        .expect("anchor pixel");
    assert_relative_eq!(pixel.x, 80.0);
    assert_relative_eq!(pixel.y, 100.0);
}

#[test]
fn pixel_to_anchor_inverts_anchor_to_pixel() {
    let chart = chart();
    let bridge = CoordinateBridge::new(&*chart);

    let anchor = Anchor::new(37.5, 62.25);
    let pixel = bridge.anchor_to_pixel(anchor).expect("anchor pixel");
    let back = bridge.pixel_to_anchor(pixel).expect("anchor back");

    assert_relative_eq!(back.time, anchor.time, epsilon = 1e-9);
    assert_relative_eq!(back.price, anchor.price, epsilon = 1e-9);
}

#[test]
fn values_outside_visible_range_resolve_to_none() {
    let chart = chart();
    let bridge = CoordinateBridge::new(&*chart);

    assert!(bridge.time_to_pixel_x(150.0).is_none());
    assert!(bridge.price_to_pixel_y(-1.0).is_none());
    assert!(bridge.pixel_x_to_time(900.0).is_none());
    assert!(bridge.pixel_y_to_price(-5.0).is_none());
    assert!(bridge.time_to_pixel_x(f64::NAN).is_none());
    assert!(bridge.anchor_to_pixel(Anchor::new(50.0, 500.0)).is_none());
}

#[test]
fn unready_host_resolves_nothing() {
    let chart = chart();
    chart
        .set_bars(vec![OhlcBar::new(10.0, 5.0, 8.0, 4.0, 6.0).expect("bar")])
        .expect("bars");
    chart.set_ready(false);
    let bridge = CoordinateBridge::new(&*chart);

    assert!(bridge.time_to_pixel_x(50.0).is_none());
    assert!(bridge.pixel_to_anchor(PixelPoint::new(10.0, 10.0)).is_none());
    assert!(bridge.bar_at(10.0).is_none());

    chart.set_ready(true);
    assert!(bridge.bar_at(10.0).is_some());
}

#[test]
fn visible_range_changes_are_seen_on_next_lookup() {
    let chart = chart();
    let bridge = CoordinateBridge::new(&*chart);
    assert_relative_eq!(bridge.time_to_pixel_x(50.0).expect("x"), 400.0);

    chart.set_time_visible_range(50.0, 150.0).expect("range");
    assert_relative_eq!(bridge.time_to_pixel_x(50.0).expect("x"), 0.0);
    assert!(bridge.time_to_pixel_x(25.0).is_none());
}

#[test]
fn bar_lookup_is_exact_time_key() {
    let chart = chart();
    chart
        .set_bars(vec![
            OhlcBar::new(20.0, 10.0, 12.0, 9.0, 11.0).expect("bar"),
            OhlcBar::new(10.0, 5.0, 8.0, 4.0, 6.0).expect("bar"),
        ])
        .expect("bars");
    let bridge = CoordinateBridge::new(&*chart);

    assert_eq!(bridge.bar_at(20.0).map(|bar| bar.high), Some(12.0));
    assert!(bridge.bar_at(20.5).is_none());
}

#[test]
fn duplicate_bar_times_are_rejected() {
    let chart = chart();
    let bar = OhlcBar::new(10.0, 5.0, 8.0, 4.0, 6.0).expect("bar");
    assert!(matches!(
        chart.set_bars(vec![bar, bar]),
        Err(OverlayError::InvalidData(_))
    ));
}

#[test]
fn resolved_turns_missing_values_into_frame_skips() {
    let err = resolved::<f64>(None, "test value").expect_err("missing");
    assert!(err.is_frame_skip());
    assert_eq!(resolved(Some(3.0), "test value").expect("present"), 3.0);
}

#[test]
fn decimal_inputs_build_anchors() {
    let time = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).single().expect("time");
    let anchor = Anchor::from_decimal_time(time, Decimal::new(12_345, 2)).expect("anchor");

    assert_relative_eq!(anchor.time, time.timestamp() as f64);
    assert_relative_eq!(anchor.price, 123.45);
}

#[test]
fn invalid_viewport_is_rejected() {
    let err = HeadlessChart::create_view(0, 400, HeadlessChartOptions::new((0.0, 1.0), (0.0, 1.0)))
        .expect_err("zero width");
    assert_eq!(err, OverlayError::InvalidViewport { width: 0, height: 400 });
}

#[test]
fn gesture_gate_disables_native_pan_while_suppressed() {
    let chart = chart();
    let gate = chart.gesture_gate();
    let holder = gate.register_holder();

    assert!(gate.suppress(holder));
    assert!(!gate.effective().handle_scroll);
    assert!(!chart.handle_native_input(chart_overlay::core::NativeInput::PointerDown {
        x: 100.0,
        y: 100.0
    }));

    assert!(gate.release(holder));
    assert!(!gate.release(holder));
    assert!(gate.effective().handle_scroll);
}
