/*!
 * End-to-end composition through the controller with mocked collaborators
 */

use std::time::Duration;

use capforge::app_config::OutputMode;
use capforge::errors::{CaptionError, ErrorKind};
use capforge::padding::{PaddingSpec, TitleSpec};
use capforge::request::{CaptionSource, ComposeRequest};
use capforge::CancellationToken;

use crate::common::TestHarness;
use crate::common::mock_providers::MockRenderer;

#[tokio::test]
async fn test_compose_transcribedTrack_shouldRenderAndPublish() {
    let harness = TestHarness::new().unwrap();
    let request = ComposeRequest::new(harness.video_ref());

    let outcome = harness
        .controller
        .compose_captioned_video(request, CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.output_ref.starts_with("mem://"));
    assert!(outcome.output_ref.ends_with("clip.captioned.mp4"));
    assert_eq!(harness.transcriber.call_count(), 1);
    assert_eq!(harness.storage.upload_count(), 1);

    let diagnostics = &outcome.diagnostics;
    assert!(!diagnostics.cache_hit);
    assert_eq!(diagnostics.mode, OutputMode::Track);
    assert_eq!((diagnostics.canvas_width, diagnostics.canvas_height), (1080, 1920));
    assert_eq!(diagnostics.segment_count, 3);
    assert_eq!(diagnostics.cue_count, outcome.cues.len());
    assert_eq!(diagnostics.alignment_score, None);

    let job = harness.renderer.last_job().unwrap();
    assert!(job.filter_complex.starts_with("[0:v]ass="));
    assert!(job.filter_complex.ends_with("[vout]"));
    assert!(job.background.is_none());
}

#[tokio::test]
async fn test_compose_identicalRequest_shouldBeServedFromCache() {
    let harness = TestHarness::new().unwrap();
    let request = ComposeRequest::new(harness.video_ref());

    let first = harness
        .controller
        .compose_captioned_video(request.clone(), CancellationToken::new())
        .await
        .unwrap();
    let second = harness
        .controller
        .compose_captioned_video(request, CancellationToken::new())
        .await
        .unwrap();

    assert!(!first.diagnostics.cache_hit);
    assert!(second.diagnostics.cache_hit);
    assert_eq!(first.output_ref, second.output_ref);
    assert_eq!(first.diagnostics.fingerprint, second.diagnostics.fingerprint);
    assert_eq!(harness.renderer.render_count(), 1);
    assert_eq!(harness.controller.cache().stats().hits, 1);
}

#[tokio::test]
async fn test_compose_concurrentIdenticalRequests_shouldRenderOnce() {
    let harness = TestHarness::with_renderer(MockRenderer::new(1080, 1920).with_delay(Duration::from_millis(150))).unwrap();
    let request = ComposeRequest::new(harness.video_ref());

    let (a, b) = tokio::join!(
        harness.controller.compose_captioned_video(request.clone(), CancellationToken::new()),
        harness.controller.compose_captioned_video(request, CancellationToken::new()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(harness.renderer.render_count(), 1);
    assert_eq!(a.output_ref, b.output_ref);
    assert!(a.diagnostics.cache_hit != b.diagnostics.cache_hit);
}

#[tokio::test]
async fn test_compose_cancellingOneOfTwoIdenticalRequests_shouldNotFailTheOther() {
    let harness = TestHarness::with_renderer(MockRenderer::new(1080, 1920).with_delay(Duration::from_millis(300))).unwrap();
    let request = ComposeRequest::new(harness.video_ref());
    let first_token = CancellationToken::new();

    let (first, second, ()) = tokio::join!(
        harness.controller.compose_captioned_video(request.clone(), first_token.clone()),
        harness.controller.compose_captioned_video(request, CancellationToken::new()),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            first_token.cancel();
        },
    );

    assert!(matches!(first, Err(CaptionError::Cancelled(_))));
    let second = second.unwrap();
    assert!(second.output_ref.starts_with("mem://"));
    assert_eq!(harness.renderer.render_count(), 1);
    assert_eq!(harness.storage.upload_count(), 1);
}

#[tokio::test]
async fn test_compose_scriptWithPaddingAndTitle_shouldBurnIn() {
    let harness = TestHarness::new().unwrap();
    let mut request = ComposeRequest::new(harness.video_ref());
    request.captions = CaptionSource::Script {
        text: "Welcome to the channel.\nToday we cook green curry.\nLet's get started!".to_string(),
        srt: Some(crate::common::sample_srt().to_string()),
    };
    request.padding = Some(PaddingSpec {
        top: 200,
        ..Default::default()
    });
    request.title = Some(TitleSpec {
        text: "Green Curry:Home Style".to_string(),
        ..TitleSpec::default()
    });
    request.mode = Some(OutputMode::BurnIn);

    let outcome = harness
        .controller
        .compose_captioned_video(request, CancellationToken::new())
        .await
        .unwrap();

    // timings came from the supplied SRT
    assert_eq!(harness.transcriber.call_count(), 0);
    assert_eq!(outcome.diagnostics.canvas_height, 2120);
    assert_eq!(outcome.diagnostics.title_font_size, Some(50));
    assert!(outcome.diagnostics.alignment_score.is_some_and(|s| s > 0.9));
    assert_eq!(outcome.cues[2].text(), "Let's get started!");

    let job = harness.renderer.last_job().unwrap();
    assert!(job.filter_complex.starts_with("[0:v]pad=1080:2120:0:200"));
    assert!(job.filter_complex.contains("text='Green Curry'"));
    assert!(job.filter_complex.contains("text='Home Style'"));
    assert!(!job.filter_complex.contains("ass="));
}

#[tokio::test]
async fn test_compose_thaiScript_shouldSwitchToThaiStyle() {
    let harness = TestHarness::new().unwrap();
    let mut request = ComposeRequest::new(harness.video_ref());
    request.captions = CaptionSource::Srt {
        content: "1\n00:00:00,000 --> 00:00:03,000\nสวัสดีครับวันนี้เราจะทำแกงเขียวหวานกัน\n".to_string(),
    };

    let outcome = harness
        .controller
        .compose_captioned_video(request, CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.diagnostics.thai);
    assert_eq!(outcome.cues.len(), 1);
    assert_eq!(
        outcome.cues[0].lines.concat(),
        "สวัสดีครับวันนี้เราจะทำแกงเขียวหวานกัน"
    );
}

#[tokio::test]
async fn test_compose_assSource_shouldPassThroughUntouched() {
    let harness = TestHarness::new().unwrap();
    let mut request = ComposeRequest::new(harness.video_ref());
    request.captions = CaptionSource::Ass {
        content: "[Script Info]\nScriptType: v4.00+\n".to_string(),
    };

    let outcome = harness
        .controller
        .compose_captioned_video(request, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(harness.transcriber.call_count(), 0);
    assert!(outcome.cues.is_empty());
    assert!(harness.renderer.last_job().unwrap().filter_complex.contains("captions.ass"));
}

#[tokio::test]
async fn test_compose_cancelledToken_shouldPublishNothing() {
    let harness = TestHarness::new().unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let err = harness
        .controller
        .compose_captioned_video(ComposeRequest::new(harness.video_ref()), token)
        .await
        .unwrap_err();

    assert!(matches!(err, CaptionError::Cancelled(_)));
    assert_eq!(harness.storage.upload_count(), 0);
    assert_eq!(harness.renderer.render_count(), 0);
}

#[tokio::test]
async fn test_compose_renderFailure_shouldNotCacheAndAllowRetry() {
    let harness = TestHarness::with_renderer(MockRenderer::new(1080, 1920).failing_first(1)).unwrap();
    let request = ComposeRequest::new(harness.video_ref());

    let err = harness
        .controller
        .compose_captioned_video(request.clone(), CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Render);
    assert!(harness.controller.cache().is_empty());

    let outcome = harness
        .controller
        .compose_captioned_video(request, CancellationToken::new())
        .await
        .unwrap();
    assert!(!outcome.diagnostics.cache_hit);
    assert_eq!(harness.renderer.render_count(), 2);
}

#[tokio::test]
async fn test_compose_invalidRequest_shouldFailBeforeAnyWork() {
    let harness = TestHarness::new().unwrap();
    let mut request = ComposeRequest::new(harness.video_ref());
    request.min_start = -3.0;

    let err = harness
        .controller
        .compose_captioned_video(request, CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
    assert_eq!(harness.renderer.render_count(), 0);
}
