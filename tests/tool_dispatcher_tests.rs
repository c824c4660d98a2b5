use std::cell::RefCell;
use std::rc::Rc;

use chart_overlay::api::ToolStateSnapshot;
use chart_overlay::core::{ChartHost, HeadlessChart, HeadlessChartOptions};
use chart_overlay::extensions::{
    ModeExitReason, OverlayEvent, OverlayPlugin, PluginContext, tool_ids,
};
use chart_overlay::interaction::{DrawingState, PointerButton};
use chart_overlay::render::NullRenderer;
use chart_overlay::{OverlayConfig, OverlayEngine, OverlayError};

fn chart() -> Rc<HeadlessChart> {
    HeadlessChart::create_view(800, 400, HeadlessChartOptions::new((0.0, 100.0), (0.0, 100.0)))
        .expect("chart init")
}

fn engine(chart: &Rc<HeadlessChart>) -> OverlayEngine<NullRenderer> {
    let host: Rc<dyn ChartHost> = chart.clone();
    OverlayEngine::new(NullRenderer::default(), host, OverlayConfig::default()).expect("engine")
}

type Log = Rc<RefCell<Vec<(OverlayEvent, PluginContext)>>>;

struct Recorder {
    id: &'static str,
    log: Log,
}

impl OverlayPlugin for Recorder {
    fn id(&self) -> &str {
        self.id
    }

    fn on_event(&mut self, event: &OverlayEvent, context: PluginContext) {
        self.log.borrow_mut().push((event.clone(), context));
    }
}

fn recorded(engine: &mut OverlayEngine<NullRenderer>) -> Log {
    let log = Log::default();
    engine
        .register_plugin(Box::new(Recorder {
            id: "recorder",
            log: Rc::clone(&log),
        }))
        .expect("register plugin");
    log
}

fn events(log: &Log) -> Vec<OverlayEvent> {
    log.borrow().iter().map(|(event, _)| event.clone()).collect()
}

#[test]
fn snapshot_tracks_tool_progress() {
    let chart = chart();
    let mut engine = engine(&chart);
    assert_eq!(engine.active_state(), ToolStateSnapshot::default());

    engine.enter_mode(tool_ids::RECTANGLE).expect("enter mode");
    engine.pointer_down(100.0, 100.0, PointerButton::Primary);

    let snapshot = engine.active_state();
    assert_eq!(snapshot.active_tool.as_deref(), Some(tool_ids::RECTANGLE));
    assert_eq!(snapshot.state, DrawingState::AwaitingPoint(2));
    assert_eq!(snapshot.collected_points, 1);
    assert_eq!(snapshot.required_points, Some(2));
    assert!(snapshot.has_preview);
}

#[test]
fn unknown_tool_is_rejected_and_state_is_unchanged() {
    let chart = chart();
    let mut engine = engine(&chart);

    assert_eq!(
        engine.enter_mode("pitchfork"),
        Err(OverlayError::UnknownTool("pitchfork".to_owned()))
    );
    assert_eq!(engine.drawing_state(), DrawingState::Idle);
    assert!(chart.gesture_gate().effective().handle_scroll);
}

#[test]
fn selecting_another_tool_replaces_the_session() {
    let chart = chart();
    let mut engine = engine(&chart);
    let log = recorded(&mut engine);

    engine.enter_mode(tool_ids::LINE_SEGMENT).expect("enter line");
    engine.pointer_down(80.0, 200.0, PointerButton::Primary);
    engine.enter_mode(tool_ids::RECTANGLE).expect("enter rectangle");

    assert_eq!(engine.primitive_count(), 0);
    assert_eq!(engine.active_state().collected_points, 0);
    assert!(!chart.gesture_gate().effective().handle_scroll);

    let events = events(&log);
    let tail = &events[events.len() - 2..];
    assert_eq!(
        tail,
        [
            OverlayEvent::ModeExited {
                tool_id: tool_ids::LINE_SEGMENT.to_owned(),
                reason: ModeExitReason::Replaced,
            },
            OverlayEvent::ModeEntered {
                tool_id: tool_ids::RECTANGLE.to_owned(),
            },
        ]
    );
}

#[test]
fn commit_reports_annotation_then_mode_exit() {
    let chart = chart();
    let mut engine = engine(&chart);
    let log = recorded(&mut engine);

    engine.enter_mode(tool_ids::LINE_SEGMENT).expect("enter mode");
    engine.pointer_down(80.0, 200.0, PointerButton::Primary);
    engine.pointer_down(160.0, 160.0, PointerButton::Primary);

    let events = events(&log);
    let committed = events
        .iter()
        .position(|event| matches!(event, OverlayEvent::AnnotationCommitted(_)))
        .expect("committed event");
    assert_eq!(
        events.last(),
        Some(&OverlayEvent::ModeExited {
            tool_id: tool_ids::LINE_SEGMENT.to_owned(),
            reason: ModeExitReason::Committed,
        })
    );
    assert!(committed < events.len() - 1);

    let (_, context) = log.borrow().last().cloned().expect("context");
    assert_eq!(context.annotation_count, 1);
    assert_eq!(context.drawing_state, DrawingState::Idle);
    assert!(context.gestures.handle_scroll);
}

#[test]
fn cancel_mode_reports_cancellation() {
    let chart = chart();
    let mut engine = engine(&chart);
    let log = recorded(&mut engine);

    assert!(!engine.cancel_mode());
    engine.enter_mode(tool_ids::TRIANGLE).expect("enter mode");
    assert!(engine.cancel_mode());

    assert_eq!(
        events(&log).last(),
        Some(&OverlayEvent::ModeExited {
            tool_id: tool_ids::TRIANGLE.to_owned(),
            reason: ModeExitReason::Cancelled,
        })
    );
}

#[test]
fn remove_annotation_detaches_and_notifies() {
    let chart = chart();
    let mut engine = engine(&chart);
    engine.enter_mode(tool_ids::HORIZONTAL_LINE).expect("enter mode");
    engine.pointer_down(100.0, 100.0, PointerButton::Primary);
    let id = engine.annotations().next().expect("record").id;

    let log = recorded(&mut engine);
    let record = engine.remove_annotation(id).expect("removed");
    assert_eq!(record.tool_id, tool_ids::HORIZONTAL_LINE);
    assert_eq!(engine.annotation_count(), 0);
    assert_eq!(engine.primitive_count(), 0);
    assert!(engine.remove_annotation(id).is_none());

    assert_eq!(
        events(&log),
        [
            OverlayEvent::PrimitiveDetached { id },
            OverlayEvent::AnnotationRemoved { id },
        ]
    );
}

#[test]
fn detaching_a_drawing_directly_drops_its_record() {
    let chart = chart();
    let mut engine = engine(&chart);
    engine.enter_mode(tool_ids::VERTICAL_LINE).expect("enter mode");
    engine.pointer_down(100.0, 100.0, PointerButton::Primary);
    let id = engine.annotations().next().expect("record").id;

    engine.detach_primitive(id).expect("detached");
    assert_eq!(engine.annotation_count(), 0);
}

#[test]
fn unregistering_the_active_tool_cancels_its_session() {
    let chart = chart();
    let mut engine = engine(&chart);
    engine.enter_mode(tool_ids::ARROW_LINE).expect("enter mode");
    engine.pointer_down(80.0, 200.0, PointerButton::Primary);

    assert!(engine.unregister_tool(tool_ids::ARROW_LINE));
    assert_eq!(engine.drawing_state(), DrawingState::Idle);
    assert_eq!(engine.primitive_count(), 0);
    assert!(!engine.tool_ids().iter().any(|id| id == tool_ids::ARROW_LINE));
    assert!(!engine.unregister_tool(tool_ids::ARROW_LINE));
}

#[test]
fn builtin_tools_can_be_disabled() {
    let chart = chart();
    let host: Rc<dyn ChartHost> = chart.clone();
    let config = OverlayConfig::default().with_builtin_tools(false);
    let mut engine = OverlayEngine::new(NullRenderer::default(), host, config).expect("engine");

    assert!(engine.tool_ids().is_empty());
    assert!(matches!(
        engine.enter_mode(tool_ids::LINE_SEGMENT),
        Err(OverlayError::UnknownTool(_))
    ));
}

#[test]
fn plugin_ids_must_be_unique_and_non_empty() {
    let chart = chart();
    let mut engine = engine(&chart);
    let _log = recorded(&mut engine);

    let duplicate = Recorder {
        id: "recorder",
        log: Log::default(),
    };
    assert!(engine.register_plugin(Box::new(duplicate)).is_err());
    let unnamed = Recorder {
        id: "",
        log: Log::default(),
    };
    assert!(engine.register_plugin(Box::new(unnamed)).is_err());

    assert_eq!(engine.plugin_count(), 1);
    assert_eq!(engine.plugin_ids().collect::<Vec<_>>(), ["recorder"]);
    assert!(engine.unregister_plugin("recorder"));
    assert!(!engine.has_plugin("recorder"));
}

#[test]
fn render_is_reported_to_plugins() {
    let chart = chart();
    let mut engine = engine(&chart);
    let log = recorded(&mut engine);

    let stats = engine.render().expect("render");
    assert_eq!(events(&log), [OverlayEvent::Rendered { stats }]);
    assert_eq!(engine.last_render_stats(), stats);
}
