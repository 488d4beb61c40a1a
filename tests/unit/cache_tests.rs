/*!
 * Tests for the composition cache
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use capforge::CancellationToken;
use capforge::cache::{self, CompositionCache, Fingerprint};
use capforge::errors::{CaptionError, RenderError};
use capforge::padding::PaddingSpec;
use capforge::style::base_style;

use crate::common::{create_temp_dir, create_test_file};

fn fingerprint(text: &str) -> Fingerprint {
    Fingerprint::compute("media", text, &base_style(), None)
}

#[tokio::test]
async fn test_getOrCompute_concurrentCallers_shouldComputeOnce() {
    let cache: CompositionCache<String> = CompositionCache::new(Duration::from_secs(60), true);
    let computations = Arc::new(AtomicUsize::new(0));
    let fp = fingerprint("hello");

    let callers = (0..8).map(|_| {
        let cache = cache.clone();
        let computations = Arc::clone(&computations);
        let fp = fp.clone();
        tokio::spawn(async move {
            cache
                .get_or_compute(&fp, &CancellationToken::new(), move |_| async move {
                    computations.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, CaptionError>("artifact".to_string())
                })
                .await
        })
    });
    let results = futures::future::join_all(callers).await;

    assert_eq!(computations.load(Ordering::SeqCst), 1);
    for result in results {
        assert_eq!(result.unwrap().unwrap(), "artifact");
    }
    let stats = cache.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 7);
    assert_eq!(stats.entries, 1);
    assert_eq!(stats.in_flight, 0);
}

#[tokio::test]
async fn test_getOrCompute_sharedFailure_reachesEveryWaiterAndCachesNothing() {
    let cache: CompositionCache<String> = CompositionCache::new(Duration::from_secs(60), true);
    let fp = fingerprint("broken");

    let token = CancellationToken::new();
    let first = cache.get_or_compute(&fp, &token, |_| async {
        tokio::time::sleep(Duration::from_millis(30)).await;
        Err::<String, CaptionError>(RenderError::Timeout(Duration::from_secs(1)).into())
    });
    let second = cache.get_or_compute(&fp, &token, |_| async { Ok("unused".to_string()) });
    let (first, second) = tokio::join!(first, second);

    assert!(first.is_err());
    assert_eq!(first, second);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_getOrCompute_oneCallerCancelled_otherStillGetsResult() {
    let cache: CompositionCache<String> = CompositionCache::new(Duration::from_secs(60), true);
    let fp = fingerprint("shared");
    let first_token = CancellationToken::new();
    let second_token = CancellationToken::new();

    let first = cache.get_or_compute(&fp, &first_token, |work| async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        work.checkpoint()?;
        Ok::<_, CaptionError>("artifact".to_string())
    });
    let second = cache.get_or_compute(&fp, &second_token, |_| async { Ok("unused".to_string()) });
    let cancel_first = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        first_token.cancel();
    };
    let (first, second, ()) = tokio::join!(first, second, cancel_first);

    assert!(matches!(first, Err(CaptionError::Cancelled(_))));
    assert_eq!(second.unwrap(), "artifact");
    assert_eq!(cache.get(&fp).as_deref(), Some("artifact"));
}

#[tokio::test]
async fn test_getOrCompute_everyWaiterGone_shouldStopWorkAndRecompute() {
    let cache: CompositionCache<u32> = CompositionCache::new(Duration::from_secs(60), true);
    let fp = fingerprint("abandoned");
    let stopped = Arc::new(AtomicUsize::new(0));

    let stopped_flag = Arc::clone(&stopped);
    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        cache.get_or_compute(&fp, &CancellationToken::new(), move |work| async move {
            let err = work.cancelled().await;
            stopped_flag.fetch_add(1, Ordering::SeqCst);
            Err::<u32, _>(err)
        }),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(stopped.load(Ordering::SeqCst), 1);
    assert_eq!(cache.stats().in_flight, 0);

    let fresh = cache
        .get_or_compute(&fp, &CancellationToken::new(), |_| async { Ok(2) })
        .await
        .unwrap();
    assert_eq!(fresh, 2);
}

#[tokio::test]
async fn test_getOrCompute_disabledCache_shouldAlwaysCompute() {
    let cache: CompositionCache<u32> = CompositionCache::new(Duration::from_secs(60), false);
    let fp = fingerprint("x");
    let token = CancellationToken::new();
    assert_eq!(cache.get_or_compute(&fp, &token, |_| async { Ok(1) }).await.unwrap(), 1);
    assert_eq!(cache.get_or_compute(&fp, &token, |_| async { Ok(2) }).await.unwrap(), 2);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_spawnSweeper_shouldDropExpiredEntries() {
    let cache: CompositionCache<u32> = CompositionCache::new(Duration::from_millis(20), true);
    cache.insert(fingerprint("a"), 1);
    let sweeper = cache.spawn_sweeper(Duration::from_millis(10));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(cache.is_empty());
    sweeper.abort();
}

#[test]
fn test_fingerprint_paddingChangesKey() {
    let padding = PaddingSpec {
        top: 100,
        ..Default::default()
    };
    let plain = Fingerprint::compute("media", "text", &base_style(), None);
    let padded = Fingerprint::compute("media", "text", &base_style(), Some(&padding));
    assert_ne!(plain, padded);
    assert_eq!(plain, Fingerprint::compute("media", "text", &base_style(), None));
    assert_eq!(plain.as_str().len(), 64);
    assert_eq!(plain.to_string().len(), 12);
}

#[test]
fn test_hashFile_matchesHashText() {
    let dir = create_temp_dir().unwrap();
    let path = create_test_file(dir.path(), "clip.mp4", "frame data").unwrap();
    let digest = tokio_test::block_on(cache::hash_file(&path)).unwrap();
    assert_eq!(digest, cache::hash_text("frame data"));
}
