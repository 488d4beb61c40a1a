/*!
 * Tests for script alignment against transcripts
 */

use capforge::alignment::similarity::{dice, normalize, similarity};
use capforge::alignment::{ScriptAligner, split_script};
use capforge::app_config::AlignmentConfig;
use capforge::errors::AlignmentError;
use capforge::subtitle_processor::{TranscriptSegment, parse_srt_string};

use crate::common::sample_srt;

#[test]
fn test_alignDetailed_correctedScript_shouldKeepScriptTextAndTranscriptTiming() {
    let segments = parse_srt_string(sample_srt()).unwrap();
    let script = "Welcome to my channel!\nToday we cook a green curry.\nLet's get started.";

    let result = ScriptAligner::default().align_detailed(&segments, script, 0.0).unwrap();

    assert_eq!(result.cues.len(), 3);
    assert_eq!(result.cues[0].text(), "Welcome to my channel!");
    assert_eq!(result.cues[2].text(), "Let's get started.");
    assert_eq!(result.cues[0].start, 1.0);
    assert_eq!(result.cues[2].end, 12.0);
    assert!(result.score > 0.5);

    for pair in result.cues.windows(2) {
        assert!(pair[0].start <= pair[1].start);
        assert!(pair[0].end <= pair[1].start + 1e-9);
    }
}

#[test]
fn test_alignDetailed_groupsCoverEveryUnitOnce() {
    let segments = parse_srt_string(sample_srt()).unwrap();
    let script = "Welcome to the channel. Today we cook green curry. Let's get started.";
    let result = ScriptAligner::default().align_detailed(&segments, script, 0.0).unwrap();

    let mut next_unit = 0;
    let mut next_segment = 0;
    for group in &result.groups {
        assert_eq!(group.units.start, next_unit);
        assert_eq!(group.segments.start, next_segment);
        next_unit = group.units.end;
        next_segment = group.segments.end;
    }
    assert_eq!(next_unit, split_script(script).len());
    assert_eq!(next_segment, segments.len());
}

#[test]
fn test_align_strictThreshold_shouldRejectParaphrase() {
    let segments = parse_srt_string(sample_srt()).unwrap();
    let aligner = ScriptAligner::new(AlignmentConfig {
        min_similarity: 0.99,
        ..AlignmentConfig::default()
    });
    let err = aligner
        .align(&segments, "Hi everyone. We are making soup. Here we go.", 0.0)
        .unwrap_err();
    assert!(matches!(err, AlignmentError::LowSimilarity { threshold, .. } if threshold == 0.99));
}

#[test]
fn test_similarity_ignoresCaseAndPunctuation() {
    assert_eq!(normalize("Hello, World!"), normalize("hello world"));
    assert!((similarity("Hello, World!", "hello world") - 1.0).abs() < 1e-9);
    assert_eq!(dice("abc", "xyz"), 0.0);
    let partial = dice("green curry", "red curry");
    assert!(partial > 0.0 && partial < 1.0);
}

#[test]
fn test_alignDetailed_longScriptAgainstOneSegment_shouldFinishQuickly() {
    let sentences: Vec<String> = (0..400)
        .map(|i| format!("Step {} of the recipe adds item {} to the pot.", i, i * 7))
        .collect();
    let script = sentences.join(" ");
    let segments = vec![TranscriptSegment::new(0.0, 800.0, script.clone())];

    let started = std::time::Instant::now();
    let result = ScriptAligner::default().align_detailed(&segments, &script, 0.0).unwrap();

    assert!(started.elapsed() < std::time::Duration::from_secs(10));
    assert_eq!(result.groups.len(), 1);
    assert_eq!(result.cues.len(), 400);
    assert!(result.score > 0.99);
    assert_eq!(result.cues.last().map(|c| c.end), Some(800.0));
}
