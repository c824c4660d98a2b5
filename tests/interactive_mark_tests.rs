use std::rc::Rc;

use approx::assert_relative_eq;
use chart_overlay::api::InputDisposition;
use chart_overlay::core::{Anchor, ChartHost, HeadlessChart, HeadlessChartOptions, PixelPoint};
use chart_overlay::extensions::{ImageHandle, ImageState, PrimitiveId, tool_ids};
use chart_overlay::interaction::{
    DrawingState, InputEvent, InteractiveMark, InteractiveMarkConfig, MarkContent, MarkStyle,
    PointerButton,
};
use chart_overlay::render::{Color, NullRenderer, RenderFrame};
use chart_overlay::{OverlayConfig, OverlayEngine};

fn chart() -> Rc<HeadlessChart> {
    HeadlessChart::create_view(800, 400, HeadlessChartOptions::new((0.0, 100.0), (0.0, 100.0)))
        .expect("chart init")
}

fn engine(chart: &Rc<HeadlessChart>) -> OverlayEngine<NullRenderer> {
    let host: Rc<dyn ChartHost> = chart.clone();
    OverlayEngine::new(NullRenderer::default(), host, OverlayConfig::default()).expect("engine")
}

/// Glyph mark at anchor (50, 50), which sits at pixel (400, 200).
fn engine_with_mark(chart: &Rc<HeadlessChart>) -> (OverlayEngine<NullRenderer>, PrimitiveId) {
    let mut engine = engine(chart);
    let id = engine
        .add_interactive_mark(
            InteractiveMark::glyph(Anchor::new(50.0, 50.0), "🚀")
                .expect("mark")
                .with_caption("launch"),
        )
        .expect("attach");
    (engine, id)
}

fn mark(engine: &OverlayEngine<NullRenderer>, id: PrimitiveId) -> &InteractiveMark {
    engine
        .layer()
        .downcast_ref::<InteractiveMark>(id)
        .expect("interactive mark")
}

fn rendered(engine: &mut OverlayEngine<NullRenderer>) -> RenderFrame {
    engine.render().expect("render");
    engine.renderer().last_frame.clone().expect("frame")
}

#[test]
fn drag_moves_anchor_by_pointer_delta_and_restores_gestures() {
    let chart = chart();
    let (mut engine, id) = engine_with_mark(&chart);
    let gate_open = chart.gesture_gate().effective();

    assert_eq!(
        engine.pointer_down(405.0, 195.0, PointerButton::Primary),
        InputDisposition::Overlay
    );
    assert!(mark(&engine, id).is_dragging());
    assert!(!chart.gesture_gate().effective().handle_scroll);

    assert_eq!(engine.pointer_move(445.0, 175.0), InputDisposition::Overlay);
    let anchor = mark(&engine, id).anchor();
    assert_relative_eq!(anchor.time, 55.0, epsilon = 1e-9);
    assert_relative_eq!(anchor.price, 55.0, epsilon = 1e-9);

    assert_eq!(
        engine.pointer_up(445.0, 175.0, PointerButton::Primary),
        InputDisposition::Overlay
    );
    assert!(!mark(&engine, id).is_dragging());
    assert_eq!(chart.gesture_gate().effective(), gate_open);
}

#[test]
fn drag_continues_outside_the_chart_with_per_axis_fallback() {
    let chart = chart();
    let (mut engine, id) = engine_with_mark(&chart);

    engine.pointer_down(400.0, 200.0, PointerButton::Primary);
    assert_eq!(
        engine.pointer_move_outside(900.0, 160.0),
        InputDisposition::Overlay
    );
    let anchor = mark(&engine, id).anchor();
    assert_relative_eq!(anchor.time, 50.0, epsilon = 1e-9);
    assert_relative_eq!(anchor.price, 60.0, epsilon = 1e-9);

    assert_eq!(
        engine.pointer_up_outside(900.0, 160.0, PointerButton::Primary),
        InputDisposition::Overlay
    );
    assert!(chart.gesture_gate().effective().handle_scroll);
}

#[test]
fn mark_takes_the_press_before_an_active_drawing_tool() {
    let chart = chart();
    let (mut engine, id) = engine_with_mark(&chart);
    engine.enter_mode(tool_ids::LINE_SEGMENT).expect("enter mode");

    assert_eq!(
        engine.pointer_down(400.0, 200.0, PointerButton::Primary),
        InputDisposition::Overlay
    );
    assert!(mark(&engine, id).is_dragging());
    assert_eq!(engine.drawing_state(), DrawingState::AwaitingPoint(1));
    assert_eq!(engine.active_state().collected_points, 0);

    engine.pointer_up(400.0, 200.0, PointerButton::Primary);
    assert_eq!(
        engine.pointer_down(80.0, 200.0, PointerButton::Primary),
        InputDisposition::Drawing
    );
    assert_eq!(engine.drawing_state(), DrawingState::AwaitingPoint(2));
}

#[test]
fn pointer_down_off_mark_falls_through_to_native_pan() {
    let chart = chart();
    let (mut engine, id) = engine_with_mark(&chart);

    assert_eq!(
        engine.pointer_down(100.0, 100.0, PointerButton::Primary),
        InputDisposition::Native
    );
    assert!(!mark(&engine, id).is_dragging());
    assert_eq!(
        engine.pointer_up(100.0, 100.0, PointerButton::Primary),
        InputDisposition::Native
    );
}

#[test]
fn secondary_button_never_starts_a_drag() {
    let chart = chart();
    let (mut engine, id) = engine_with_mark(&chart);

    assert_eq!(
        engine.pointer_down(400.0, 200.0, PointerButton::Secondary),
        InputDisposition::Unhandled
    );
    assert!(!mark(&engine, id).is_dragging());
}

#[test]
fn pointer_up_without_down_is_harmless() {
    let chart = chart();
    let (mut engine, id) = engine_with_mark(&chart);

    assert_eq!(
        engine.pointer_up(10.0, 10.0, PointerButton::Primary),
        InputDisposition::Unhandled
    );
    assert_eq!(
        engine.pointer_up(10.0, 10.0, PointerButton::Primary),
        InputDisposition::Unhandled
    );
    assert!(chart.gesture_gate().effective().handle_scroll);
    assert!(!mark(&engine, id).is_dragging());
}

#[test]
fn wheel_over_mark_scales_within_bounds() {
    let chart = chart();
    let (mut engine, id) = engine_with_mark(&chart);

    for _ in 0..100 {
        assert_eq!(engine.wheel(400.0, 200.0, -1.0), InputDisposition::Overlay);
    }
    assert_relative_eq!(mark(&engine, id).scale(), 3.0);

    for _ in 0..100 {
        engine.wheel(400.0, 200.0, 1.0);
    }
    assert_relative_eq!(mark(&engine, id).scale(), 0.5);
}

#[test]
fn wheel_scales_by_fixed_factors() {
    let config = InteractiveMarkConfig::default();
    assert_relative_eq!(config.apply_wheel(1.0, -3.0), 1.1);
    assert_relative_eq!(config.apply_wheel(1.0, 3.0), 0.9);
    assert_relative_eq!(config.apply_wheel(2.9, -1.0), 3.0);
}

#[test]
fn wheel_off_mark_zooms_the_chart() {
    let chart = chart();
    let (mut engine, id) = engine_with_mark(&chart);

    assert_eq!(engine.wheel(100.0, 100.0, -1.0), InputDisposition::Native);
    assert_relative_eq!(mark(&engine, id).scale(), 1.0);
    assert_ne!(chart.time_visible_range(), (0.0, 100.0));
}

#[test]
fn context_menu_is_suppressed_only_on_hit() {
    let chart = chart();
    let (mut engine, _) = engine_with_mark(&chart);

    assert!(engine.context_menu(410.0, 205.0));
    assert!(!engine.context_menu(10.0, 10.0));
    assert_eq!(
        engine.handle_input(InputEvent::ContextMenu { x: 400.0, y: 200.0 }),
        InputDisposition::Overlay
    );
}

#[test]
fn glyph_draws_above_anchor_with_caption_and_hit_ring() {
    let chart = chart();
    let (mut engine, _) = engine_with_mark(&chart);

    let frame = rendered(&mut engine);
    assert_eq!(frame.texts.len(), 2);
    let glyph = &frame.texts[0];
    assert_eq!(glyph.text, "🚀");
    assert_relative_eq!(glyph.x, 400.0);
    assert_relative_eq!(glyph.y, 180.0);
    assert!(glyph.shadow.is_none());

    let caption = &frame.texts[1];
    assert_eq!(caption.text, "launch");
    assert_relative_eq!(caption.y, 214.0);

    assert_eq!(frame.circles.len(), 1);
    assert_relative_eq!(frame.circles[0].radius, 20.0);
}

#[test]
fn dragging_changes_feedback_styling() {
    let chart = chart();
    let (mut engine, _) = engine_with_mark(&chart);
    engine.pointer_down(400.0, 200.0, PointerButton::Primary);

    let frame = rendered(&mut engine);
    assert!(frame.texts[0].shadow.is_some());
    assert_relative_eq!(frame.texts[0].color.alpha, 0.7);
    assert_eq!(frame.texts[1].color, Color::rgba(1.0, 0.0, 0.0, 0.8));
    assert_eq!(frame.circles[0].stroke_color, Color::rgb(1.0, 0.0, 0.0));
}

#[test]
fn detaching_mid_drag_releases_the_gesture_gate() {
    let chart = chart();
    let (mut engine, id) = engine_with_mark(&chart);
    engine.pointer_down(400.0, 200.0, PointerButton::Primary);
    assert!(!chart.gesture_gate().effective().handle_scroll);

    engine.detach_primitive(id).expect("detach");
    assert!(chart.gesture_gate().effective().handle_scroll);
    assert_eq!(engine.events().listener_count(), 0);
}

#[test]
fn image_mark_shows_placeholder_until_loaded() {
    let chart = chart();
    let mut engine = engine(&chart);
    let (handle, loader) = ImageHandle::pending("logo.png");
    engine
        .add_interactive_mark(
            InteractiveMark::new(
                Anchor::new(50.0, 50.0),
                MarkContent::Image {
                    handle: handle.clone(),
                },
                MarkStyle::default(),
                InteractiveMarkConfig::default().with_hit_ring(false),
            )
            .expect("image mark"),
        )
        .expect("attach");

    let frame = rendered(&mut engine);
    assert_eq!(frame.rects.len(), 1);
    assert!(frame.images.is_empty());

    let before = chart.update_requests();
    loader.complete(64, 64);
    assert!(chart.update_requests() > before);

    let frame = rendered(&mut engine);
    assert!(frame.rects.is_empty());
    assert_eq!(frame.images.len(), 1);
    let image = &frame.images[0];
    assert_eq!(image.source_id, "logo.png");
    assert_relative_eq!(image.width, 24.0);
    assert_relative_eq!(image.x, 388.0);
    assert_relative_eq!(image.y, 168.0);
}

#[test]
fn failed_image_keeps_placeholder() {
    let chart = chart();
    let mut engine = engine(&chart);
    let (handle, loader) = ImageHandle::pending("missing.png");
    engine
        .add_interactive_mark(
            InteractiveMark::new(
                Anchor::new(50.0, 50.0),
                MarkContent::Image {
                    handle: handle.clone(),
                },
                MarkStyle::default(),
                InteractiveMarkConfig::default(),
            )
            .expect("image mark"),
        )
        .expect("attach");

    loader.fail("404");
    assert!(matches!(handle.state(), ImageState::Failed { .. }));

    let stats = engine.render().expect("render");
    assert_eq!(stats.failed, 0);
    let frame = engine.renderer().last_frame.as_ref().expect("frame");
    assert_eq!(frame.rects.len(), 1);
    assert!(frame.images.is_empty());
}

#[test]
fn empty_glyph_is_rejected() {
    assert!(InteractiveMark::glyph(Anchor::new(1.0, 1.0), "").is_err());
}

#[test]
fn engine_config_feeds_glyph_marks() {
    let chart = chart();
    let host: Rc<dyn ChartHost> = chart.clone();
    let config = OverlayConfig::default()
        .with_interactive_mark(InteractiveMarkConfig::default().with_hit_radius_px(5.0));
    let mut engine =
        OverlayEngine::new(NullRenderer::default(), host, config).expect("engine");
    let id = engine
        .add_glyph_mark(Anchor::new(50.0, 50.0), "x", MarkStyle::default())
        .expect("mark");

    assert!(mark(&engine, id).hit_test(PixelPoint::new(403.0, 200.0)).expect("hit test"));
    assert!(!mark(&engine, id).hit_test(PixelPoint::new(410.0, 200.0)).expect("hit test"));
}
