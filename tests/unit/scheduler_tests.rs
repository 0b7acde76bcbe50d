/*!
 * Tests for batch dispatch and durable progress
 */

use std::sync::{Arc, Mutex};
use std::time::Duration;

use yadtwai::errors::{AppError, ProviderError};
use yadtwai::providers::mock::MockProvider;
use yadtwai::session::StructureStore;
use yadtwai::translation::{ContextBuilder, DispatchMode, Scheduler, SchedulerOptions};

use crate::common;

fn options(enable_concurrency: bool, async_threshold: usize, max_concurrency: usize) -> SchedulerOptions {
    SchedulerOptions {
        batch_size: 2,
        async_threshold,
        enable_concurrency,
        max_concurrency,
        checkpoint_interval: 1,
        rate_limit_delay: Duration::ZERO,
    }
}

fn scheduler(provider: MockProvider, options: SchedulerOptions) -> Scheduler {
    Scheduler::new(common::orchestrator(provider, 0), options, ContextBuilder::default())
}

/// Working mock that fails with an authentication error when `should_fail` says so
fn failing_when<F>(should_fail: F) -> MockProvider
where
    F: Fn(&[(u64, String)], usize) -> bool + Send + Sync + 'static,
{
    let echo = MockProvider::working();
    MockProvider::working().with_responder(move |request, count| {
        let items = MockProvider::batch_items(&request.user);
        if should_fail(items.as_slice(), count) {
            Err(ProviderError::AuthenticationError("key revoked".to_string()))
        } else {
            Ok(echo.well_formed_reply(request, usize::MAX))
        }
    })
}

#[test]
fn test_selectMode_shouldFollowThresholdAndProviderOrdering() {
    let concurrent = scheduler(MockProvider::working(), options(true, 10, 4));
    assert_eq!(concurrent.select_mode(5), DispatchMode::Sequential);
    assert_eq!(concurrent.select_mode(10), DispatchMode::Concurrent(4));

    let disabled = scheduler(MockProvider::working(), options(false, 0, 4));
    assert_eq!(disabled.select_mode(100), DispatchMode::Sequential);

    let strict = scheduler(MockProvider::working().with_strict_ordering(), options(true, 0, 4));
    assert_eq!(strict.select_mode(100), DispatchMode::Sequential);

    let single = scheduler(MockProvider::working(), options(true, 0, 1));
    assert_eq!(single.select_mode(100), DispatchMode::Sequential);
}

#[tokio::test]
async fn test_runSequential_shouldTranslateEverythingAndReportProgress() {
    let dir = common::create_temp_dir().unwrap();
    let state = common::run_state(dir.path(), common::text_segments(5));
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recorded = calls.clone();

    let summary = scheduler(MockProvider::working(), options(false, 0, 1))
        .run(state.clone(), None, move |done, total| recorded.lock().unwrap().push((done, total)))
        .await
        .unwrap();

    assert_eq!(summary.batches, 3);
    assert_eq!(summary.completed, 5);
    assert_eq!(summary.failed, 0);
    assert_eq!(*calls.lock().unwrap(), vec![(1, 3), (2, 3), (3, 3)]);
    assert_eq!(common::completed_on_disk(dir.path()), vec![0, 1, 2, 3, 4]);

    let stored = StructureStore::new(dir.path(), "test-hash").load().unwrap();
    assert_eq!(stored.get(4).unwrap().translated_text, "TRANSLATED: Sentence number 4.");
}

#[tokio::test]
async fn test_runSequential_withCheckpointInterval_shouldOnlyPersistEveryNBatches() {
    let dir = common::create_temp_dir().unwrap();
    let state = common::run_state(dir.path(), common::text_segments(10));
    let mut opts = options(false, 0, 1);
    opts.checkpoint_interval = 3;

    // Fifth batch hits a revoked key
    let result = scheduler(failing_when(|_, count| count == 4), opts)
        .run(state.clone(), None, |_, _| {})
        .await;

    assert!(matches!(result, Err(AppError::Translation(_))));
    assert_eq!(common::completed_on_disk(dir.path()), vec![0, 1, 2, 3, 4, 5]);

    // The fourth batch is only in memory until the next flush
    let mut guard = state.lock().await;
    assert_eq!(guard.segments.translated_count(), 8);
    guard.flush().unwrap();
    drop(guard);
    assert_eq!(common::completed_on_disk(dir.path()).len(), 8);
}

#[tokio::test]
async fn test_runConcurrent_shouldPersistAllBatchesWithDocumentContexts() {
    let dir = common::create_temp_dir().unwrap();
    let state = common::run_state(dir.path(), common::text_segments(12));
    let provider = MockProvider::slow(20);

    let summary = scheduler(provider.clone(), options(true, 0, 3))
        .run(state.clone(), None, |_, _| {})
        .await
        .unwrap();

    assert_eq!(summary.batches, 6);
    assert_eq!(summary.completed, 12);
    assert_eq!(common::completed_on_disk(dir.path()), (0..12).collect::<Vec<u64>>());

    for request in provider.requests() {
        let first = MockProvider::batch_items(&request.user)[0].0;
        if first > 0 {
            let previous = format!("Sentence number {}.", first - 1);
            assert!(request.user.contains(&previous), "batch {} lacks its context", first);
        }
    }
}

#[tokio::test]
async fn test_runConcurrent_withFatalError_shouldLeaveConsistentStateOnDisk() {
    let dir = common::create_temp_dir().unwrap();
    let state = common::run_state(dir.path(), common::text_segments(12));
    let provider = failing_when(|items, _| items.iter().any(|(id, _)| *id == 6));

    let result = scheduler(provider, options(true, 0, 3)).run(state, None, |_, _| {}).await;
    assert!(result.is_err());

    let completed = common::completed_on_disk(dir.path());
    let stored = StructureStore::new(dir.path(), "test-hash").load().unwrap();
    assert!(!completed.contains(&6));
    assert!(!completed.contains(&7));
    for id in completed {
        assert!(stored.get(id).unwrap().is_translated(), "segment {} completed without text", id);
    }
}

#[tokio::test]
async fn test_run_withNothingPending_shouldNotContactBackend() {
    let dir = common::create_temp_dir().unwrap();
    let mut segments = common::text_segments(2);
    segments.set_translation(0, "zéro");
    segments.set_translation(1, "un");
    let state = common::run_state(dir.path(), segments);
    {
        let mut guard = state.lock().await;
        guard.checkpoint.mark_completed(0);
        guard.checkpoint.mark_completed(1);
    }
    let provider = MockProvider::working();

    let summary = scheduler(provider.clone(), options(false, 0, 1))
        .run(state, None, |_, _| {})
        .await
        .unwrap();

    assert_eq!(summary.batches, 0);
    assert_eq!(provider.request_count(), 0);
}
