use std::rc::Rc;

use approx::assert_relative_eq;
use chart_overlay::core::{ChartHost, HeadlessChart, HeadlessChartOptions, OhlcBar};
use chart_overlay::extensions::{
    MarkDirection, MultiArrowMark, MultiTextMark, StaticMarkConfig, StaticMarkRecord, TextTag,
};
use chart_overlay::render::{Color, NullRenderer, RenderFrame};
use chart_overlay::{OverlayConfig, OverlayEngine, OverlayError};

fn chart() -> Rc<HeadlessChart> {
    let chart =
        HeadlessChart::create_view(800, 400, HeadlessChartOptions::new((0.0, 100.0), (0.0, 100.0)))
            .expect("chart init");
    chart
        .set_bars(vec![
            OhlcBar::new(10.0, 30.0, 50.0, 20.0, 40.0).expect("bar"),
            OhlcBar::new(20.0, 40.0, 60.0, 35.0, 55.0).expect("bar"),
        ])
        .expect("bars");
    chart
}

fn engine(chart: &Rc<HeadlessChart>) -> OverlayEngine<NullRenderer> {
    let host: Rc<dyn ChartHost> = chart.clone();
    OverlayEngine::new(NullRenderer::default(), host, OverlayConfig::default()).expect("engine")
}

fn rendered(engine: &mut OverlayEngine<NullRenderer>) -> RenderFrame {
    engine.render().expect("render");
    engine
        .renderer()
        .last_frame
        .clone()
        .expect("frame")
}

#[test]
fn single_top_arrow_sits_above_bar_high() {
    let chart = chart();
    let mut engine = engine(&chart);
    engine
        .attach_primitive(Box::new(
            MultiArrowMark::single(10.0, MarkDirection::Top).expect("arrow"),
        ))
        .expect("attach");

    let frame = rendered(&mut engine);
    assert_eq!(frame.polygons.len(), 1);
    assert_eq!(frame.lines.len(), 1);
    assert!(frame.texts.is_empty());

    // high 50 -> y 200, lifted by the 20px base offset
    let points = &frame.polygons[0].points;
    assert_relative_eq!(points[0].0, 80.0);
    assert_relative_eq!(points[0].1, 192.0);
    assert_relative_eq!(points[1].0, 74.0);
    assert_relative_eq!(points[1].1, 180.0);
    assert_relative_eq!(points[2].0, 86.0);

    let stem = frame.lines[0];
    assert_relative_eq!(stem.y1, 180.0);
    assert_relative_eq!(stem.y2, 172.0);
    assert_relative_eq!(stem.stroke_width, 2.0);
}

#[test]
fn bottom_arrows_stack_downwards_from_bar_low() {
    let chart = chart();
    let mut engine = engine(&chart);
    engine
        .attach_primitive(Box::new(
            MultiArrowMark::new(10.0, 2, MarkDirection::Bottom, StaticMarkConfig::default())
                .expect("arrows"),
        ))
        .expect("attach");

    let frame = rendered(&mut engine);
    assert_eq!(frame.polygons.len(), 2);
    // low 20 -> y 320, pushed down to 340, next glyph 25px further
    assert_relative_eq!(frame.polygons[0].points[1].1, 340.0);
    assert_relative_eq!(frame.polygons[0].points[0].1, 328.0);
    assert_relative_eq!(frame.polygons[1].points[1].1, 365.0);
}

#[test]
fn arrow_colors_follow_count_tiers() {
    let config = StaticMarkConfig::default();
    let palette = config.top_palette.clone();

    let one = MultiArrowMark::new(10.0, 1, MarkDirection::Top, config.clone()).expect("one");
    assert_eq!(one.color_for(0), palette[0]);

    let two = MultiArrowMark::new(10.0, 2, MarkDirection::Top, config.clone()).expect("two");
    assert_eq!(two.color_for(0), palette[0]);
    assert_eq!(two.color_for(1), palette[1]);

    let many = MultiArrowMark::new(10.0, 6, MarkDirection::Top, config).expect("many");
    assert_eq!(many.color_for(2), palette[2]);
    assert_eq!(many.color_for(4), palette[0]);
    assert_eq!(many.color_for(5), palette[1]);
}

#[test]
fn three_or_more_arrows_get_index_labels() {
    let chart = chart();
    let mut engine = engine(&chart);
    engine
        .attach_primitive(Box::new(
            MultiArrowMark::new(10.0, 3, MarkDirection::Top, StaticMarkConfig::default())
                .expect("arrows"),
        ))
        .expect("attach");

    let frame = rendered(&mut engine);
    let labels: Vec<&str> = frame.texts.iter().map(|text| text.text.as_str()).collect();
    assert_eq!(labels, ["1", "2", "3"]);
    assert_relative_eq!(frame.texts[0].y, 160.0);
    assert_relative_eq!(frame.texts[1].y, 135.0);
}

#[test]
fn zero_count_is_rejected() {
    assert!(matches!(
        MultiArrowMark::new(10.0, 0, MarkDirection::Top, StaticMarkConfig::default()),
        Err(OverlayError::InvalidData(_))
    ));
}

#[test]
fn missing_bar_draws_nothing_without_error() {
    let chart = chart();
    let mut engine = engine(&chart);
    engine
        .attach_primitive(Box::new(
            MultiArrowMark::single(30.0, MarkDirection::Top).expect("arrow"),
        ))
        .expect("attach");

    let stats = engine.render().expect("render");
    assert_eq!(stats.failed, 0);
    let frame = engine.renderer().last_frame.as_ref().expect("frame");
    assert!(frame.polygons.is_empty());
    assert!(frame.lines.is_empty());
}

#[test]
fn text_tags_draw_pills_centered_on_bar() {
    let chart = chart();
    let mut engine = engine(&chart);
    let tags = vec![
        TextTag::new("AB"),
        TextTag::new("CD").with_circular(false),
        TextTag::new(""),
    ];
    engine
        .attach_primitive(Box::new(
            MultiTextMark::new(10.0, MarkDirection::Top, tags, StaticMarkConfig::default())
                .expect("text mark"),
        ))
        .expect("attach");

    let frame = rendered(&mut engine);
    assert_eq!(frame.texts.len(), 2);
    assert_eq!(frame.circles.len(), 1);
    assert_eq!(frame.rects.len(), 1);

    // "AB" at 11px with the 0.6 width estimate is 13.2px wide, plus 2px padding
    let circle = frame.circles[0];
    assert_relative_eq!(circle.x, 80.0);
    assert_relative_eq!(circle.y, 180.0);
    assert_relative_eq!(circle.radius, 8.6, epsilon = 1e-9);

    let rect = frame.rects[0];
    assert_relative_eq!(rect.width, 17.2, epsilon = 1e-9);
    assert_relative_eq!(rect.height, 15.0);
    assert_relative_eq!(rect.y + rect.height / 2.0, 140.0);
}

#[test]
fn text_mark_edits_in_place() {
    let chart = chart();
    let mut engine = engine(&chart);
    let id = engine
        .attach_primitive(Box::new(
            MultiTextMark::new(
                20.0,
                MarkDirection::Bottom,
                vec![TextTag::new("old")],
                StaticMarkConfig::default(),
            )
            .expect("text mark"),
        ))
        .expect("attach");

    let mark = engine
        .layer_mut()
        .downcast_mut::<MultiTextMark>(id)
        .expect("text mark");
    assert!(mark.update_text(0, "new"));
    assert!(!mark.update_text(3, "nope"));
    assert!(mark.update_colors(0, Color::BLACK, Color::WHITE));
    mark.add_tag(TextTag::new("second"));
    assert!(mark.remove_tag(9).is_none());
    assert_eq!(mark.tag_count(), 2);

    let frame = rendered(&mut engine);
    assert_eq!(frame.texts[0].text, "new");
    assert_eq!(frame.texts[0].color, Color::BLACK);
    assert_eq!(frame.circles[0].fill_color, Color::WHITE);
}

#[test]
fn builder_groups_records_by_time_kind_and_direction() {
    let chart = chart();
    let mut engine = engine(&chart);
    let records: Vec<StaticMarkRecord> = serde_json::from_str(
        r#"[
            {"time": 10, "kind": "Arrow", "items": [
                {"direction": "Top"}, {"direction": "Bottom"}, {"direction": "Top"}
            ]},
            {"time": 10, "kind": "Sparkle", "items": [{"direction": "Top"}]},
            {"time": 10, "kind": "Text", "items": [
                {"direction": "Top", "text": "B", "circular": false}
            ]},
            {"time": 10, "kind": "Arrow", "items": [{"direction": "Top"}]}
        ]"#,
    )
    .expect("records");

    let ids = engine.add_static_marks(&records).expect("static marks");
    assert_eq!(ids.len(), 3);

    let top_arrows = engine
        .layer()
        .downcast_ref::<MultiArrowMark>(ids[0])
        .expect("top arrows");
    assert_eq!(top_arrows.direction(), MarkDirection::Top);
    assert_eq!(top_arrows.count(), 3);

    let bottom_arrows = engine
        .layer()
        .downcast_ref::<MultiArrowMark>(ids[1])
        .expect("bottom arrows");
    assert_eq!(bottom_arrows.count(), 1);

    let text = engine
        .layer()
        .downcast_ref::<MultiTextMark>(ids[2])
        .expect("text mark");
    assert_eq!(text.tags()[0].circular, Some(false));

    let frame = rendered(&mut engine);
    assert_eq!(frame.polygons.len(), 4);
    assert_eq!(frame.rects.len(), 1);
}

#[test]
fn builder_rejects_non_finite_time() {
    let chart = chart();
    let mut engine = engine(&chart);
    let records: Vec<StaticMarkRecord> = serde_json::from_str(
        r#"[{"time": 10, "kind": "Arrow", "items": [{"direction": "Top"}]}]"#,
    )
    .expect("records");
    let mut broken = records.clone();
    broken[0].time = f64::NAN;

    assert!(engine.add_static_marks(&broken).is_err());
    assert_eq!(engine.primitive_count(), 0);
    assert_eq!(engine.add_static_marks(&records).expect("ok").len(), 1);
}

#[test]
fn empty_palette_fails_validation() {
    let config = StaticMarkConfig::default().with_top_palette(Vec::new());
    assert!(config.validate().is_err());
}
