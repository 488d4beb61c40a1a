/*!
 * Tests for subtitle composition
 */

use capforge::app_config::{ComposerConfig, OutputMode};
use capforge::composer::{ComposeOptions, RenderDirective, Replacement, SubtitleComposer, VideoGeometry, anchor_point};
use capforge::errors::CaptionError;
use capforge::style::{Position, StyleOverrides, StyleResolver};
use capforge::{CancellationToken, Cue, TextShaper};

fn composer() -> SubtitleComposer {
    SubtitleComposer::new(TextShaper::default(), ComposerConfig::default())
}

fn padded_geometry() -> VideoGeometry {
    VideoGeometry {
        width: 1080,
        height: 1920,
        offset_x: 0,
        offset_y: 200,
        canvas_width: 1080,
        canvas_height: 2120,
    }
}

fn cues() -> Vec<Cue> {
    vec![
        Cue::raw(0.0, 1.5, "intro music"),
        Cue::raw(1.0, 4.0, "welcome to the colour kitchen"),
        Cue::raw(4.0, 6.0, "today we cook"),
    ]
}

#[test]
fn test_compose_trackMode_shouldProduceAssOnCanvas() {
    let style = StyleResolver::default().resolve("classic", &StyleOverrides::default()).unwrap();
    let options = ComposeOptions {
        mode: OutputMode::Track,
        min_start: 2.0,
        replacements: vec![Replacement {
            find: "colour".to_string(),
            replace: "color".to_string(),
        }],
    };
    let composition = composer()
        .compose(&cues(), &style, &padded_geometry(), &options, &CancellationToken::new())
        .unwrap();

    // first cue ends before min_start, second is clamped
    assert_eq!(composition.cues.len(), 2);
    assert_eq!(composition.cues[0].start, 2.0);
    assert!(composition.cues[0].text().contains("color kitchen"));

    let RenderDirective::SubtitleTrack { ass } = composition.directive else {
        panic!("expected a subtitle track");
    };
    assert!(ass.contains("PlayResX: 1080"));
    assert!(ass.contains("PlayResY: 2120"));
    assert_eq!(ass.matches("Dialogue:").count(), 2);
    // bottom row sits at 5h/6 of the video, shifted by the top padding
    assert!(ass.contains("\\pos(540,1800)"));
}

#[test]
fn test_compose_burnInMode_shouldEmitOneDirectivePerLine() {
    let style = StyleResolver::default().resolve("modern", &StyleOverrides::default()).unwrap();
    let options = ComposeOptions {
        mode: OutputMode::BurnIn,
        ..Default::default()
    };
    let composition = composer()
        .compose(&cues(), &style, &padded_geometry(), &options, &CancellationToken::new())
        .unwrap();

    let RenderDirective::BurnIn { filters } = composition.directive else {
        panic!("expected drawtext directives");
    };
    let lines: usize = composition.cues.iter().map(|c| c.lines.len()).sum();
    assert_eq!(filters.len(), lines);
    for directive in &filters {
        assert!(directive.y >= 200, "line drawn over the padding: {}", directive.y);
        assert!(directive.box_color.is_some());
        let filter = directive.to_filter();
        assert!(filter.starts_with("drawtext="));
        assert!(filter.contains("enable='between(t,"));
    }
}

#[test]
fn test_compose_overlaps_shouldBeTrimmedToNextStart() {
    let style = StyleResolver::default().resolve("classic", &StyleOverrides::default()).unwrap();
    let composition = composer()
        .compose(
            &cues(),
            &style,
            &VideoGeometry::unpadded(1920, 1080),
            &ComposeOptions::default(),
            &CancellationToken::new(),
        )
        .unwrap();

    for pair in composition.cues.windows(2) {
        assert!(pair[0].start <= pair[1].start);
        assert!(pair[0].end <= pair[1].start + 1e-9);
    }
}

#[test]
fn test_compose_clampedSliver_shouldBeDropped() {
    let style = StyleResolver::default().resolve("classic", &StyleOverrides::default()).unwrap();
    let options = ComposeOptions {
        min_start: 1.9,
        ..Default::default()
    };
    let cues = vec![Cue::raw(0.0, 2.0, "mostly skipped"), Cue::raw(2.5, 4.0, "kept")];
    let composition = composer()
        .compose(&cues, &style, &VideoGeometry::unpadded(1920, 1080), &options, &CancellationToken::new())
        .unwrap();

    assert_eq!(composition.cues.len(), 1);
    assert_eq!(composition.cues[0].text().to_lowercase(), "kept");
}

#[test]
fn test_compose_overlapTrimmedBelowMinimum_shouldFoldIntoNextCue() {
    let style = StyleResolver::default().resolve("classic", &StyleOverrides::default()).unwrap();
    let cues = vec![Cue::raw(1.0, 3.0, "hi"), Cue::raw(1.1, 3.5, "there")];
    let composition = composer()
        .compose(
            &cues,
            &style,
            &VideoGeometry::unpadded(1920, 1080),
            &ComposeOptions::default(),
            &CancellationToken::new(),
        )
        .unwrap();

    let min = ComposerConfig::default().min_cue_duration;
    assert_eq!(composition.cues.len(), 1);
    let cue = &composition.cues[0];
    assert_eq!((cue.start, cue.end), (1.0, 3.5));
    assert_eq!(cue.lines.concat().to_lowercase(), "hithere");
    assert!(composition.cues.iter().all(|c| c.end - c.start >= min));
}

#[test]
fn test_compose_cancelledToken_shouldStop() {
    let style = StyleResolver::default().resolve("classic", &StyleOverrides::default()).unwrap();
    let token = CancellationToken::new();
    token.cancel();
    let result = composer().compose(
        &cues(),
        &style,
        &VideoGeometry::unpadded(1920, 1080),
        &ComposeOptions::default(),
        &token,
    );
    assert!(matches!(result, Err(CaptionError::Cancelled(_))));
}

#[test]
fn test_anchorPoint_explicitCoordinates_areAbsolute() {
    let overrides = StyleOverrides {
        x: Some(100),
        y: Some(50),
        ..Default::default()
    };
    let style = StyleResolver::default().resolve("classic", &overrides).unwrap();
    assert_eq!(style.position, Position::Explicit { x: 100, y: 50 });
    assert_eq!(anchor_point(&style, &padded_geometry()), (100, 50));
}
