/*!
 * Tests for padding layout and the filter graph built from it
 */

use std::path::PathBuf;

use capforge::errors::LayoutError;
use capforge::filter_graph::{OUTPUT_LABEL, SubtitleLayer, build_filter_graph};
use capforge::padding::{PaddingBackground, PaddingLayoutEngine, PaddingSpec, PatternKind, TitleEffect, TitleSpec};
use capforge::style::HorizontalAlign;

fn spec(json: &str) -> PaddingSpec {
    serde_json::from_str(json).unwrap()
}

#[test]
fn test_paddingSpec_fromJson_parsesEveryBackground() {
    let solid = spec(r#"{"top": 100}"#);
    assert_eq!(solid.background, PaddingBackground::default());

    let pattern = spec(r#"{"bottom": 50, "background": {"style": "pattern", "kind": "stripes", "size": 20, "color1": "white", "color2": "navy"}}"#);
    assert!(matches!(
        pattern.background,
        PaddingBackground::Pattern { kind: PatternKind::Stripes, size: 20, .. }
    ));

    let image = spec(r#"{"left": 10, "right": 10, "background": {"style": "image", "source": "https://cdn.example.com/bg.png"}}"#);
    assert!(matches!(image.background, PaddingBackground::Image { .. }));
}

#[test]
fn test_layout_thaiTitle_shouldStayInsideTopBand() {
    let engine = PaddingLayoutEngine::default();
    let title = TitleSpec {
        text: "สูตรแกงเขียวหวานไก่แบบง่ายๆ ทำได้ที่บ้าน".to_string(),
        effect: TitleEffect::Glow,
        ..TitleSpec::default()
    };
    let layout = engine
        .layout(&spec(r#"{"top": 300}"#), 1080, 1920, Some(&title))
        .unwrap();

    assert_eq!((layout.canvas_width, layout.canvas_height), (1080, 2220));
    assert_eq!(layout.video_y, 300);
    assert!(!layout.title.is_empty());
    for directive in &layout.title {
        assert!(directive.y >= 10 && directive.y < 300, "title line at y={}", directive.y);
        assert!(directive.box_color.is_some(), "glow draws a soft box");
        assert_eq!(directive.window, None);
    }
}

#[test]
fn test_layout_rightPlacedTitle_keepsSideInset() {
    let engine = PaddingLayoutEngine::default();
    let title = TitleSpec {
        text: "Menu".to_string(),
        placement: HorizontalAlign::Right,
        effect: TitleEffect::Simple,
        ..TitleSpec::default()
    };
    let layout = engine.layout(&spec(r#"{"top": 200}"#), 1000, 1000, Some(&title)).unwrap();
    let line = &layout.title[0];
    let width = (4.0_f64 * 50.0 * 0.55).round() as i64;
    assert_eq!(line.x, 1000 - width - 20);
}

#[test]
fn test_layout_emptyImageSource_shouldFail() {
    let engine = PaddingLayoutEngine::default();
    let err = engine
        .layout(&spec(r#"{"top": 10, "background": {"style": "image", "source": " "}}"#), 640, 360, None)
        .unwrap_err();
    assert!(matches!(err, LayoutError::InvalidParameter(_)));
}

#[test]
fn test_filterGraph_paddedTrack_chainsPadThenAssThenTitle() {
    let engine = PaddingLayoutEngine::default();
    let title = TitleSpec {
        text: "Green curry".to_string(),
        ..TitleSpec::default()
    };
    let layout = engine.layout(&spec(r#"{"top": 200}"#), 1080, 1920, Some(&title)).unwrap();
    let layer = SubtitleLayer::AssTrack {
        path: PathBuf::from("/tmp/job/captions.ass"),
        fonts_dir: None,
    };

    let graph = build_filter_graph(&layout, &layer);
    let pad = graph.filter_complex.find("pad=1080:2120").unwrap();
    let ass = graph.filter_complex.find("ass=").unwrap();
    let title = graph.filter_complex.find("drawtext=").unwrap();
    assert!(pad < ass && ass < title);
    assert!(graph.filter_complex.ends_with(&format!("[{}]", OUTPUT_LABEL)));
    assert!(graph.background_input.is_none());
}
