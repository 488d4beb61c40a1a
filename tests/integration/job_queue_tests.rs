/*!
 * Job queue driving the caption controller
 */

use std::time::Duration;

use capforge::app_config::QueueConfig;
use capforge::errors::{ErrorKind, QueueError};
use capforge::job_queue::{JobPriority, JobQueue, JobStatus};
use capforge::request::{CaptionSource, ComposeRequest};

use crate::common::TestHarness;
use crate::common::mock_providers::MockRenderer;

fn queue_config(max_retries: u32) -> QueueConfig {
    QueueConfig {
        workers: 2,
        max_queue_size: 10,
        max_retries,
        job_timeout_secs: 30,
    }
}

fn single_worker() -> QueueConfig {
    QueueConfig {
        workers: 1,
        max_queue_size: 10,
        max_retries: 0,
        job_timeout_secs: 30,
    }
}

fn srt_request(harness: &TestHarness, text: &str) -> ComposeRequest {
    let mut request = ComposeRequest::new(harness.video_ref());
    request.captions = CaptionSource::Srt {
        content: format!("1\n00:00:00,000 --> 00:00:02,000\n{}\n", text),
    };
    request
}

#[tokio::test]
async fn test_queue_distinctRequests_shouldAllComplete() {
    let harness = TestHarness::new().unwrap();
    let queue = JobQueue::start(harness.controller.clone(), queue_config(0));

    let ids: Vec<_> = ["first caption", "second caption", "third caption"]
        .iter()
        .map(|text| queue.submit(srt_request(&harness, text), JobPriority::Normal).unwrap())
        .collect();

    for id in ids {
        let info = queue.wait(id).await.unwrap();
        assert_eq!(info.status, JobStatus::Completed);
        assert!(info.output.is_some_and(|o| o.output_ref.starts_with("mem://")));
    }
    assert_eq!(harness.renderer.render_count(), 3);
    assert_eq!(queue.stats().completed, 3);
    queue.shutdown().await;
}

#[tokio::test]
async fn test_queue_transientRenderFailure_shouldRetry() {
    let harness = TestHarness::with_renderer(MockRenderer::new(1080, 1920).failing_first(1)).unwrap();
    let queue = JobQueue::start(harness.controller.clone(), queue_config(1));

    let id = queue.submit(srt_request(&harness, "retry me"), JobPriority::High).unwrap();
    let info = queue.wait(id).await.unwrap();

    assert_eq!(info.status, JobStatus::Completed);
    assert_eq!(info.attempts, 2);
    assert_eq!(queue.stats().retries, 1);
    queue.shutdown().await;
}

#[tokio::test]
async fn test_queue_configFailure_shouldNotRetry() {
    let harness = TestHarness::new().unwrap();
    let queue = JobQueue::start(harness.controller.clone(), queue_config(3));

    let mut request = srt_request(&harness, "bad preset");
    request.preset = "does-not-exist".to_string();
    let id = queue.submit(request, JobPriority::Normal).unwrap();
    let info = queue.wait(id).await.unwrap();

    assert_eq!(info.status, JobStatus::Failed);
    assert_eq!(info.attempts, 1);
    assert_eq!(info.error_kind, Some(ErrorKind::Config));
    queue.shutdown().await;
}

#[tokio::test]
async fn test_queue_unknownJob_shouldBeReported() {
    let harness = TestHarness::new().unwrap();
    let queue = JobQueue::start(harness.controller.clone(), queue_config(0));
    let unknown = uuid::Uuid::new_v4();

    assert!(matches!(queue.cancel(unknown), Err(QueueError::UnknownJob(_))));
    assert!(queue.status(unknown).is_none());
    queue.shutdown().await;
}

#[tokio::test]
async fn test_queue_highPriority_shouldOvertakeEarlierLowPriority() {
    let harness = TestHarness::with_renderer(MockRenderer::new(1080, 1920).with_delay(Duration::from_millis(200))).unwrap();
    let queue = JobQueue::start(harness.controller.clone(), single_worker());

    let blocker = queue.submit(srt_request(&harness, "keeps the worker busy"), JobPriority::Normal).unwrap();
    let low = queue.submit(srt_request(&harness, "submitted first"), JobPriority::Low).unwrap();
    let high = queue.submit(srt_request(&harness, "submitted second"), JobPriority::High).unwrap();

    let low = queue.wait(low).await.unwrap();
    let high = queue.wait(high).await.unwrap();
    queue.wait(blocker).await.unwrap();

    assert_eq!(low.status, JobStatus::Completed);
    assert_eq!(high.status, JobStatus::Completed);
    assert!(high.started_at < low.started_at);
    assert!(high.finished_at < low.finished_at);
    queue.shutdown().await;
}

#[tokio::test]
async fn test_queue_shutdown_shouldFinishRunningAndCancelQueued() {
    let harness = TestHarness::with_renderer(MockRenderer::new(1080, 1920).with_delay(Duration::from_millis(300))).unwrap();
    let queue = JobQueue::start(harness.controller.clone(), single_worker());

    let running = queue.submit(srt_request(&harness, "already running"), JobPriority::Normal).unwrap();
    let queued: Vec<_> = ["waiting one", "waiting two"]
        .iter()
        .map(|text| queue.submit(srt_request(&harness, text), JobPriority::Normal).unwrap())
        .collect();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(queue.status(running).map(|i| i.status), Some(JobStatus::Processing));

    queue.shutdown().await;

    assert_eq!(queue.status(running).map(|i| i.status), Some(JobStatus::Completed));
    for id in queued {
        let info = queue.status(id).unwrap();
        assert_eq!(info.status, JobStatus::Cancelled);
        assert_eq!(info.attempts, 0);
    }
    assert_eq!(harness.renderer.render_count(), 1);
    assert!(matches!(
        queue.submit(srt_request(&harness, "too late"), JobPriority::High),
        Err(QueueError::ShutDown)
    ));
}
