/*!
 * Tests for retry orchestration of single batches
 */

use std::sync::Arc;
use std::time::{Duration, Instant};

use yadtwai::document::{is_failure_marker, ContentSegment};
use yadtwai::errors::ProviderError;
use yadtwai::providers::mock::MockProvider;
use yadtwai::session::{CheckpointStore, SegmentStatus};
use yadtwai::translation::{BatchOrchestrator, ClientSettings, RetryPolicy, TranslationClient};

use crate::common;

fn batch(ids: std::ops::Range<u64>) -> Vec<ContentSegment> {
    ids.map(|id| ContentSegment::text(id, format!("line {}", id))).collect()
}

#[tokio::test]
async fn test_runBatch_withIntermittentBackend_shouldSucceedOnRetry() {
    let provider = MockProvider::intermittent(2);
    let orchestrator = common::orchestrator(provider.clone(), 3);

    let first = orchestrator.run_batch(&batch(0..2), "", None).await.unwrap();
    let second = orchestrator.run_batch(&batch(2..4), "", None).await.unwrap();

    assert_eq!(first.attempts, 1);
    assert_eq!(second.attempts, 2);
    assert_eq!(second.completed_count(), 2);
    assert_eq!(provider.request_count(), 3);
}

#[tokio::test]
async fn test_runBatch_withRateLimitThenSuccess_shouldRetryOnce() {
    let provider = MockProvider::scripted(vec![Err(ProviderError::RateLimitExceeded("slow down".to_string()))]);
    let outcome = common::orchestrator(provider.clone(), 3)
        .run_batch(&batch(0..3), "", None)
        .await
        .unwrap();

    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.completed_count(), 3);
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn test_runBatch_withGarbageReplies_shouldKeepLastRawResponse() {
    let provider = MockProvider::garbage();
    let outcome = common::orchestrator(provider.clone(), 2)
        .run_batch(&batch(0..2), "", None)
        .await
        .unwrap();

    assert_eq!(provider.request_count(), 3);
    assert_eq!(outcome.failed_count(), 2);
    assert_eq!(
        outcome.last_raw_response.as_deref(),
        Some("I am sorry, I cannot help with that request.")
    );
    assert!(outcome.results.iter().all(|r| is_failure_marker(&r.text)));
}

#[tokio::test]
async fn test_runBatch_withBackoff_shouldWaitBetweenAttempts() {
    let provider = MockProvider::failing(ProviderError::ConnectionError("refused".to_string()));
    let client = TranslationClient::new(Arc::new(provider.clone()), ClientSettings::default());
    let policy = RetryPolicy {
        max_retries: 3,
        base_backoff: Duration::from_millis(10),
        multiplier: 2.0,
        max_backoff: Duration::from_millis(1000),
    };
    let orchestrator = BatchOrchestrator::new(Arc::new(client), policy);

    let started = Instant::now();
    let outcome = orchestrator.run_batch(&batch(0..1), "", None).await.unwrap();

    // 10 + 20 + 40 ms between four attempts
    assert!(started.elapsed() >= Duration::from_millis(70));
    assert_eq!(outcome.attempts, 4);
    assert_eq!(provider.request_count(), 4);
}

#[tokio::test]
async fn test_outcomeApply_shouldRecordFailuresInCheckpoint() {
    let dir = common::create_temp_dir().unwrap();
    let mut segments = common::text_segments(10);
    let (mut checkpoint, _) = CheckpointStore::open(dir.path(), "doc");

    let orchestrator = common::orchestrator(MockProvider::dropping(6), 0);
    let batch: Vec<ContentSegment> = segments.iter().cloned().collect();
    let outcome = orchestrator.run_batch(&batch, "", None).await.unwrap();
    outcome.apply(&mut segments, &mut checkpoint);

    assert_eq!(checkpoint.status(5), SegmentStatus::Completed);
    assert!(matches!(checkpoint.status(6), SegmentStatus::Failed(_)));
    assert_eq!(segments.translated_count(), 6);
    assert!(is_failure_marker(&segments.get(9).unwrap().translated_text));
}
