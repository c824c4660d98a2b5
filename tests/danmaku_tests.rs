use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_relative_eq;
use chart_overlay::core::{ChartHost, HeadlessChart, HeadlessChartOptions, Viewport};
use chart_overlay::extensions::danmaku::{
    DanmakuConfig, DanmakuEngine, DanmakuStyle, DanmakuSurface, FALLBACK_TEXT_WIDTH_PX,
    FrameRequestId, ManualFrameScheduler, RendererSurface,
};
use chart_overlay::render::{NullRenderer, RenderFrame, TextHAlign, TextMeasurer};
use chart_overlay::{OverlayConfig, OverlayEngine, OverlayResult};

/// Surface whose text is always 50px wide; keeps every presented frame.
#[derive(Clone)]
struct FixedSurface {
    viewport: Viewport,
    frames: Rc<RefCell<Vec<RenderFrame>>>,
}

impl FixedSurface {
    fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: Viewport::new(width, height),
            frames: Rc::default(),
        }
    }

    fn last_frame(&self) -> RenderFrame {
        self.frames.borrow().last().cloned().expect("presented frame")
    }
}

impl TextMeasurer for FixedSurface {
    fn measure_text(&self, _text: &str, _font_size_px: f64, _family: Option<&str>) -> f64 {
        50.0
    }
}

impl DanmakuSurface for FixedSurface {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn present(&mut self, frame: &RenderFrame) -> OverlayResult<()> {
        self.frames.borrow_mut().push(frame.clone());
        Ok(())
    }
}

fn engine(config: DanmakuConfig) -> (DanmakuEngine, ManualFrameScheduler) {
    let scheduler = ManualFrameScheduler::new();
    let engine = DanmakuEngine::new(config, Box::new(scheduler.clone())).expect("danmaku engine");
    (engine, scheduler)
}

fn next_frame(engine: &mut DanmakuEngine, scheduler: &ManualFrameScheduler, now_ms: f64) {
    let id = scheduler.take_pending().expect("pending frame");
    assert!(engine.on_frame(id, now_ms));
}

#[test]
fn item_scrolls_left_and_is_recycled_off_screen() {
    let (mut engine, scheduler) = engine(DanmakuConfig::default());
    let surface = FixedSurface::new(800, 400);
    engine.push("hello");
    engine.initialize(Box::new(surface.clone()), 0.0);

    assert!(engine.is_playing());
    assert_eq!(engine.active_count(), 1);
    let (slot, item) = engine.active_items().next().expect("spawned");
    assert_relative_eq!(item.x, 800.0);
    assert_relative_eq!(item.y, 200.0);
    assert_relative_eq!(item.width, 50.0);

    next_frame(&mut engine, &scheduler, 10_000.0);
    assert_relative_eq!(engine.item(slot).expect("item").x, 200.0);

    let text = &surface.last_frame().texts[0];
    assert_eq!(text.text, "hello");
    assert_eq!(text.h_align, TextHAlign::Left);
    assert_relative_eq!(text.x, 200.0);

    next_frame(&mut engine, &scheduler, 15_000.0);
    assert_eq!(engine.active_count(), 0);
    assert_eq!(engine.free_len(), 1);
    assert!(!engine.item(slot).expect("pooled item").visible);
    assert!(surface.last_frame().texts.is_empty());
}

#[test]
fn item_stays_active_until_its_right_edge_passes_zero() {
    let (mut engine, _scheduler) = engine(DanmakuConfig::default().with_auto_start(false));
    engine.initialize(Box::new(FixedSurface::new(800, 400)), 0.0);
    engine.push("hello");
    let slot = engine.tick(0.0).spawned.expect("spawn");

    for second in 1..=14 {
        let report = engine.tick(1_000.0);
        assert_eq!(report.recycled, 0, "t={second}s");
        assert_eq!(engine.active_count(), 1, "t={second}s");
        let x = engine.item(slot).expect("item").x;
        assert_relative_eq!(x, 800.0 - 60.0 * f64::from(second), epsilon = 1e-9);
    }
    assert_relative_eq!(engine.item(slot).expect("item").right_edge(), 10.0, epsilon = 1e-9);

    let report = engine.tick(1_000.0);
    assert_eq!(report.recycled, 1);
    assert_eq!(engine.active_count(), 0);

    engine.push("next");
    assert_eq!(engine.tick(1_000.0).spawned, Some(slot));
}

#[test]
fn at_most_one_spawn_per_tick_up_to_max_concurrent() {
    let config = DanmakuConfig::default()
        .with_max_concurrent(2)
        .with_auto_start(false);
    let (mut engine, _scheduler) = engine(config);
    engine.set_container_size(Viewport::new(800, 400));
    engine.set_queue(["a", "b", "c", "d", "e"]);

    assert!(engine.tick(16.0).spawned.is_some());
    assert_eq!(engine.active_count(), 1);
    engine.tick(16.0);
    assert_eq!(engine.active_count(), 2);
    assert!(engine.tick(16.0).spawned.is_none());
    assert_eq!(engine.active_count(), 2);
    assert_eq!(engine.pending_count(), 3);
}

#[test]
fn concurrency_cap_holds_while_the_queue_drains() {
    let config = DanmakuConfig::default()
        .with_max_concurrent(2)
        .with_auto_start(false)
        .with_default_style(DanmakuStyle::default().with_speed(500.0));
    let (mut engine, _scheduler) = engine(config);
    engine.set_container_size(Viewport::new(800, 400));
    engine.set_queue(["a", "b", "c", "d", "e"]);

    let mut pending = engine.pending_count();
    let mut recycled = 0;
    for _ in 0..40 {
        recycled += engine.tick(500.0).recycled;
        assert!(engine.active_count() <= 2);
        assert!(engine.pending_count() <= pending);
        pending = engine.pending_count();
        if pending == 0 && engine.active_count() == 0 {
            break;
        }
    }

    assert_eq!(engine.pending_count(), 0);
    assert_eq!(engine.active_count(), 0);
    assert_eq!(recycled, 5);
    assert_eq!(engine.pool_len(), 2);
}

#[test]
fn recycled_slot_is_reused_for_the_next_item() {
    let config = DanmakuConfig::default()
        .with_auto_start(false)
        .with_default_style(DanmakuStyle::default().with_speed(1000.0));
    let (mut engine, _scheduler) = engine(config);
    engine.set_container_size(Viewport::new(200, 100));
    engine.push("first");

    let first = engine.tick(0.0).spawned.expect("first spawn");
    engine.push("second");
    let report = engine.tick(1_000.0);
    assert_eq!(report.recycled, 1);
    assert_eq!(report.spawned, Some(first));
    assert_eq!(engine.pool_len(), 1);

    let item = engine.item(first).expect("reused item");
    assert_eq!(item.text, "second");
    assert_relative_eq!(item.x, 200.0);
}

#[test]
fn missing_surface_uses_fallback_width() {
    let (mut engine, _scheduler) = engine(DanmakuConfig::default().with_auto_start(false));
    engine.set_container_size(Viewport::new(800, 400));
    engine.push("unmeasured");

    let slot = engine.tick(0.0).spawned.expect("spawn");
    assert_relative_eq!(engine.item(slot).expect("item").width, FALLBACK_TEXT_WIDTH_PX);
}

#[test]
fn stop_cancels_the_pending_frame_and_ignores_stale_callbacks() {
    let (mut engine, scheduler) = engine(DanmakuConfig::default());
    engine.initialize(Box::new(FixedSurface::new(800, 400)), 0.0);
    assert_eq!(scheduler.pending_len(), 1);

    let stale = FrameRequestId::new(1);
    engine.stop();
    assert_eq!(scheduler.cancelled_count(), 1);
    assert_eq!(scheduler.pending_len(), 0);
    assert!(!engine.on_frame(stale, 100.0));
    assert!(!engine.is_playing());

    engine.start(200.0);
    assert!(engine.is_playing());
    assert_eq!(scheduler.pending_len(), 1);
    assert!(!engine.on_frame(stale, 300.0));
}

#[test]
fn start_twice_does_not_double_schedule() {
    let (mut engine, scheduler) = engine(DanmakuConfig::default().with_auto_start(false));
    engine.initialize(Box::new(FixedSurface::new(800, 400)), 0.0);
    assert_eq!(scheduler.requested_count(), 0);

    engine.start(0.0);
    engine.start(5.0);
    assert_eq!(scheduler.requested_count(), 1);
}

#[test]
fn clear_retires_items_and_destroy_drops_the_pool() {
    let (mut engine, scheduler) = engine(DanmakuConfig::default());
    let surface = FixedSurface::new(800, 400);
    engine.set_queue(["one", "two", "three"]);
    engine.initialize(Box::new(surface.clone()), 0.0);
    next_frame(&mut engine, &scheduler, 16.0);
    assert_eq!(engine.active_count(), 2);

    engine.clear();
    assert_eq!(engine.active_count(), 0);
    assert_eq!(engine.pending_count(), 0);
    assert_eq!(engine.free_len(), 2);
    assert!(surface.last_frame().texts.is_empty());

    engine.destroy();
    assert!(!engine.is_playing());
    assert_eq!(engine.pool_len(), 0);
    assert_eq!(scheduler.pending_len(), 0);
}

#[test]
fn dropping_the_engine_cancels_its_frame() {
    let (mut engine, scheduler) = engine(DanmakuConfig::default());
    engine.initialize(Box::new(FixedSurface::new(800, 400)), 0.0);
    drop(engine);
    assert_eq!(scheduler.pending_len(), 0);
    assert_eq!(scheduler.cancelled_count(), 1);
}

#[test]
fn seeded_random_styles_are_reproducible() {
    let config = DanmakuConfig::default()
        .with_auto_start(false)
        .with_random_style(Some(7));
    let styles: Vec<DanmakuStyle> = (0..2)
        .map(|_| {
            let (mut engine, _scheduler) = engine(config.clone());
            engine.set_container_size(Viewport::new(800, 400));
            engine.push("random");
            let slot = engine.tick(0.0).spawned.expect("spawn");
            engine.item(slot).expect("item").style
        })
        .collect();

    assert_eq!(styles[0], styles[1]);
    assert!([50.0, 60.0, 70.0, 80.0].contains(&styles[0].speed_px_per_sec));
    assert!((0.8..=1.0).contains(&styles[0].opacity));
    assert!(styles[0].validate().is_ok());
}

#[test]
fn renderer_surface_presents_through_a_renderer() {
    #[derive(Clone, Copy)]
    struct TenPx;
    impl TextMeasurer for TenPx {
        fn measure_text(&self, _text: &str, _font_size_px: f64, _family: Option<&str>) -> f64 {
            10.0
        }
    }

    let (mut engine, _scheduler) = engine(DanmakuConfig::default());
    engine.push("via renderer");
    engine.initialize(
        Box::new(RendererSurface::new(
            NullRenderer::default(),
            TenPx,
            Viewport::new(320, 240),
        )),
        0.0,
    );
    let (_, item) = engine.active_items().next().expect("spawned");
    assert_relative_eq!(item.width, 10.0);
    assert_relative_eq!(item.x, 320.0);
}

#[test]
fn invalid_config_is_rejected() {
    let scheduler = ManualFrameScheduler::new();
    assert!(
        DanmakuEngine::new(
            DanmakuConfig::default().with_max_concurrent(0),
            Box::new(scheduler)
        )
        .is_err()
    );
}

#[test]
fn overlay_engine_builds_danmaku_from_its_config() {
    let chart = HeadlessChart::create_view(
        800,
        400,
        HeadlessChartOptions::new((0.0, 100.0), (0.0, 100.0)),
    )
    .expect("chart init");
    let host: Rc<dyn ChartHost> = chart;
    let config =
        OverlayConfig::default().with_danmaku(DanmakuConfig::default().with_max_concurrent(3));
    let engine = OverlayEngine::new(NullRenderer::default(), host, config).expect("engine");

    let danmaku = engine
        .create_danmaku(Box::new(ManualFrameScheduler::new()))
        .expect("danmaku");
    assert_eq!(danmaku.config().max_concurrent, 3);
    assert!(!danmaku.is_playing());
}
