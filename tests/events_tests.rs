use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_relative_eq;
use chart_overlay::api::{ClickEvent, InputDisposition};
use chart_overlay::core::{ChartHost, HeadlessChart, HeadlessChartOptions};
use chart_overlay::interaction::{
    EventDispatcher, EventKind, EventScope, InputEvent, Phase, PointerButton, Propagation,
    Subscription,
};
use chart_overlay::render::NullRenderer;
use chart_overlay::{OverlayConfig, OverlayEngine};

type Trace = Rc<RefCell<Vec<&'static str>>>;

fn record(
    dispatcher: &EventDispatcher,
    trace: &Trace,
    label: &'static str,
    scope: EventScope,
    phase: Phase,
    verdict: Propagation,
) -> Subscription {
    let trace = Rc::clone(trace);
    dispatcher.subscribe(EventKind::PointerDown, scope, phase, move |_| {
        trace.borrow_mut().push(label);
        verdict
    })
}

fn down() -> InputEvent {
    InputEvent::PointerDown {
        x: 1.0,
        y: 1.0,
        button: PointerButton::Primary,
    }
}

#[test]
fn element_events_run_capture_then_bubble() {
    let dispatcher = EventDispatcher::new();
    let trace = Trace::default();
    let _subs = [
        record(&dispatcher, &trace, "doc-bubble", EventScope::Document, Phase::Bubble, Propagation::Continue),
        record(&dispatcher, &trace, "elem-bubble", EventScope::Element, Phase::Bubble, Propagation::Continue),
        record(&dispatcher, &trace, "elem-capture", EventScope::Element, Phase::Capture, Propagation::Continue),
        record(&dispatcher, &trace, "doc-capture", EventScope::Document, Phase::Capture, Propagation::Continue),
    ];

    let outcome = dispatcher.dispatch(&down(), EventScope::Element);
    assert_eq!(outcome.listeners_run, 4);
    assert!(!outcome.stopped);
    assert_eq!(
        *trace.borrow(),
        ["doc-capture", "elem-capture", "elem-bubble", "doc-bubble"]
    );
}

#[test]
fn document_events_skip_element_listeners() {
    let dispatcher = EventDispatcher::new();
    let trace = Trace::default();
    let _subs = [
        record(&dispatcher, &trace, "elem", EventScope::Element, Phase::Capture, Propagation::Continue),
        record(&dispatcher, &trace, "doc", EventScope::Document, Phase::Bubble, Propagation::Continue),
    ];

    dispatcher.dispatch(&down(), EventScope::Document);
    assert_eq!(*trace.borrow(), ["doc"]);
}

#[test]
fn stop_halts_later_listeners() {
    let dispatcher = EventDispatcher::new();
    let trace = Trace::default();
    let _subs = [
        record(&dispatcher, &trace, "capture", EventScope::Element, Phase::Capture, Propagation::Stop),
        record(&dispatcher, &trace, "bubble", EventScope::Element, Phase::Bubble, Propagation::Continue),
    ];

    let outcome = dispatcher.dispatch(&down(), EventScope::Element);
    assert!(outcome.stopped);
    assert_eq!(outcome.listeners_run, 1);
    assert_eq!(*trace.borrow(), ["capture"]);
}

#[test]
fn dropping_a_subscription_unsubscribes() {
    let dispatcher = EventDispatcher::new();
    let trace = Trace::default();
    let sub = record(&dispatcher, &trace, "once", EventScope::Element, Phase::Bubble, Propagation::Continue);
    assert!(sub.is_active());
    assert_eq!(dispatcher.listener_count(), 1);

    drop(sub);
    assert_eq!(dispatcher.listener_count(), 0);
    assert_eq!(dispatcher.dispatch(&down(), EventScope::Element).listeners_run, 0);
}

#[test]
fn listeners_only_see_their_event_kind() {
    let dispatcher = EventDispatcher::new();
    let trace = Trace::default();
    let _sub = record(&dispatcher, &trace, "down", EventScope::Element, Phase::Bubble, Propagation::Continue);

    dispatcher.dispatch(&InputEvent::PointerMove { x: 0.0, y: 0.0 }, EventScope::Element);
    assert!(trace.borrow().is_empty());
}

#[test]
fn listener_removed_mid_dispatch_is_skipped() {
    let dispatcher = EventDispatcher::new();
    let trace = Trace::default();
    let victim: Rc<RefCell<Option<Subscription>>> = Rc::default();

    let remover = {
        let victim = Rc::clone(&victim);
        dispatcher.subscribe(EventKind::PointerDown, EventScope::Element, Phase::Capture, move |_| {
            victim.borrow_mut().take();
            Propagation::Continue
        })
    };
    *victim.borrow_mut() = Some(record(
        &dispatcher,
        &trace,
        "victim",
        EventScope::Element,
        Phase::Bubble,
        Propagation::Continue,
    ));

    let outcome = dispatcher.dispatch(&down(), EventScope::Element);
    assert_eq!(outcome.listeners_run, 1);
    assert!(trace.borrow().is_empty());
    drop(remover);
}

#[test]
fn engine_click_subscription_receives_anchor() {
    let chart =
        HeadlessChart::create_view(800, 400, HeadlessChartOptions::new((0.0, 100.0), (0.0, 100.0)))
            .expect("chart init");
    let host: Rc<dyn ChartHost> = chart.clone();
    let mut engine =
        OverlayEngine::new(NullRenderer::default(), host, OverlayConfig::default()).expect("engine");

    let clicks: Rc<RefCell<Vec<ClickEvent>>> = Rc::default();
    let subscription = {
        let clicks = Rc::clone(&clicks);
        engine.subscribe_click(move |event| clicks.borrow_mut().push(event))
    };

    assert_eq!(engine.click(400.0, 200.0), InputDisposition::Overlay);
    let anchor = clicks.borrow()[0].anchor.expect("anchor");
    assert_relative_eq!(anchor.time, 50.0, epsilon = 1e-9);
    assert_relative_eq!(anchor.price, 50.0, epsilon = 1e-9);

    drop(subscription);
    assert_eq!(engine.click(400.0, 200.0), InputDisposition::Unhandled);
    assert_eq!(clicks.borrow().len(), 1);
}

#[test]
fn input_events_round_trip_through_json() {
    let event = InputEvent::Wheel {
        x: 3.0,
        y: 4.0,
        delta_y: -120.0,
    };
    let json = serde_json::to_string(&event).expect("serialize");
    let back: InputEvent = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, event);
    assert_eq!(back.kind(), EventKind::Wheel);
}
