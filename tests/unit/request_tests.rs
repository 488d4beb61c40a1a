/*!
 * Tests for compose request parsing and validation
 */

use capforge::app_config::OutputMode;
use capforge::errors::ConfigError;
use capforge::padding::TitleEffect;
use capforge::request::{CaptionSource, ComposeRequest};

use crate::common::{create_temp_dir, create_test_file};

#[test]
fn test_fromFile_legacyFieldNames_shouldBeAccepted() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(
        dir.path(),
        "request.json",
        r#"{
            "video_url": "https://cdn.example.com/clip.mp4",
            "settings": {"font_size": 36},
            "replace": [{"find": "teh", "replace": "the"}],
            "title": {"text": "Cooking 101", "effect": "3d"},
            "mode": "track"
        }"#,
    )
    .unwrap();

    let request = ComposeRequest::from_file(&path).unwrap();
    assert_eq!(request.video, "https://cdn.example.com/clip.mp4");
    assert_eq!(request.style.font_size, Some(36));
    assert_eq!(request.replacements[0].replace, "the");
    assert_eq!(request.title.as_ref().map(|t| t.effect), Some(TitleEffect::ThreeD));
    assert_eq!(request.mode, Some(OutputMode::Track));
    assert!(request.validate().is_ok());
}

#[test]
fn test_fromJson_unknownCaptionSource_shouldFail() {
    assert!(ComposeRequest::from_json(r#"{"video": "a.mp4", "captions": {"source": "telepathy"}}"#).is_err());
    assert!(ComposeRequest::from_json("not json").is_err());
}

#[test]
fn test_captionSource_needsTranscription() {
    assert!(CaptionSource::Transcribe.needs_transcription());
    assert!(CaptionSource::Script { text: "x".into(), srt: None }.needs_transcription());
    assert!(!CaptionSource::Script { text: "x".into(), srt: Some("1".into()) }.needs_transcription());
    assert!(!CaptionSource::Srt { content: "x".into() }.needs_transcription());
    assert!(!CaptionSource::None.needs_transcription());
}

#[test]
fn test_validate_emptyReplacement_shouldFail() {
    let request = ComposeRequest::from_json(r#"{"video": "a.mp4", "replacements": [{"find": "", "replace": "x"}]}"#).unwrap();
    assert!(matches!(request.validate(), Err(ConfigError::InvalidValue { field, .. }) if field == "replacements"));
}

#[test]
fn test_label_prefersId() {
    let mut request = ComposeRequest::new("clip.mp4");
    assert_eq!(request.label(), "clip.mp4");
    request.id = Some("job-42".into());
    assert_eq!(request.label(), "job-42");
}
