/*!
 * Batch translation with retries.
 *
 * The `BatchOrchestrator` wraps the translation client in a retry loop.
 * Every failure is classified through `ErrorKind`: recoverable kinds are
 * retried with exponential backoff, authentication failures abort the run,
 * and anything else (or an exhausted retry budget) turns the whole batch into
 * failure placeholders so the run can continue.
 */

use log::{debug, error, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::TranslationCommonConfig;
use crate::document::{failure_marker, is_failure_marker, ContentSegment, SegmentList};
use crate::errors::TranslationError;
use crate::session::{CheckpointStore, SegmentStatus};
use crate::translation::core::TranslationClient;
use crate::translation::glossary::Glossary;

/// Retry and backoff settings
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry
    pub base_backoff: Duration,

    /// Growth factor per attempt
    pub multiplier: f64,

    /// Upper bound for a single delay
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(common: &TranslationCommonConfig) -> Self {
        Self {
            max_retries: common.retry_count,
            base_backoff: Duration::from_millis(common.retry_backoff_ms),
            multiplier: common.backoff_multiplier,
            max_backoff: Duration::from_millis(common.max_backoff_ms),
        }
    }

    /// Policy without any delay, mostly for tests
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_backoff: Duration::ZERO,
            multiplier: 1.0,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay after the given zero-based failed attempt
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt as i32);
        let millis = (self.base_backoff.as_millis() as f64 * factor).min(self.max_backoff.as_millis() as f64);
        Duration::from_millis(millis.max(0.0) as u64)
    }

    /// Total number of attempts per batch
    pub fn attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&TranslationCommonConfig::default())
    }
}

/// Final text and status of one segment
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentResult {
    pub segment_id: u64,
    pub text: String,
    pub status: SegmentStatus,
}

/// What happened to one batch
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    /// One result per segment, in batch order
    pub results: Vec<SegmentResult>,

    /// Attempts spent on the batch
    pub attempts: u32,

    /// Error of the last failed attempt, when the batch gave up
    pub error: Option<String>,

    /// Raw reply behind the last failure, for diagnostics
    pub last_raw_response: Option<String>,

    /// Wall time spent including backoff
    pub duration: Duration,
}

impl BatchOutcome {
    fn translated(batch: &[ContentSegment], translations: Vec<String>, attempts: u32, duration: Duration) -> Self {
        let results = batch
            .iter()
            .zip(translations)
            .map(|(segment, text)| {
                let status = if is_failure_marker(&text) || text.trim().is_empty() {
                    SegmentStatus::Failed(text.clone())
                } else {
                    SegmentStatus::Completed
                };
                SegmentResult {
                    segment_id: segment.segment_id,
                    text,
                    status,
                }
            })
            .collect();

        Self {
            results,
            attempts,
            error: None,
            last_raw_response: None,
            duration,
        }
    }

    fn failed(batch: &[ContentSegment], reason: String, attempts: u32, raw: Option<String>, duration: Duration) -> Self {
        let marker = failure_marker(&reason);
        let results = batch
            .iter()
            .map(|segment| SegmentResult {
                segment_id: segment.segment_id,
                text: marker.clone(),
                status: SegmentStatus::Failed(reason.clone()),
            })
            .collect();

        Self {
            results,
            attempts,
            error: Some(reason),
            last_raw_response: raw,
            duration,
        }
    }

    pub fn completed_count(&self) -> usize {
        self.results.iter().filter(|r| r.status == SegmentStatus::Completed).count()
    }

    pub fn failed_count(&self) -> usize {
        self.results.len() - self.completed_count()
    }

    /// Write the results into the segment list and the checkpoint
    pub fn apply(&self, segments: &mut SegmentList, checkpoint: &mut CheckpointStore) {
        for result in &self.results {
            if !segments.set_translation(result.segment_id, result.text.clone()) {
                warn!("Result for unknown segment {} dropped", result.segment_id);
                continue;
            }
            match &result.status {
                SegmentStatus::Completed => checkpoint.mark_completed(result.segment_id),
                SegmentStatus::Failed(reason) => checkpoint.mark_failed(result.segment_id, reason.clone()),
                SegmentStatus::Pending => {}
            }
        }
    }
}

/// Retry wrapper around the translation client
pub struct BatchOrchestrator {
    client: Arc<TranslationClient>,
    policy: RetryPolicy,
}

impl BatchOrchestrator {
    pub fn new(client: Arc<TranslationClient>, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn client(&self) -> &TranslationClient {
        &self.client
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Translate a batch, retrying recoverable failures.
    ///
    /// Only a fatal failure is returned as `Err`; every other outcome,
    /// including exhausted retries, is an `Ok` carrying per-segment results.
    pub async fn run_batch(
        &self,
        batch: &[ContentSegment],
        context: &str,
        glossary: Option<&Glossary>,
    ) -> Result<BatchOutcome, TranslationError> {
        let started = Instant::now();
        let first_id = batch.first().map(|s| s.segment_id).unwrap_or_default();
        let mut last_error: Option<TranslationError> = None;
        let mut last_raw: Option<String> = None;
        let mut attempts = 0;

        for attempt in 0..self.policy.attempts() {
            attempts = attempt + 1;
            match self.client.translate_batch(batch, context, glossary).await {
                Ok(translation) => {
                    debug!(
                        "Batch at segment {} translated on attempt {} ({} missing)",
                        first_id,
                        attempts,
                        translation.missing.len()
                    );
                    return Ok(BatchOutcome::translated(
                        batch,
                        translation.translations,
                        attempts,
                        started.elapsed(),
                    ));
                }
                Err(e) => {
                    let kind = e.kind();
                    if let Some(raw) = e.raw_response() {
                        last_raw = Some(raw.to_string());
                    }

                    if kind.is_fatal() {
                        error!("Batch at segment {} hit a fatal error: {}", first_id, e);
                        return Err(e);
                    }

                    if !kind.is_recoverable() {
                        warn!("Batch at segment {} rejected ({:?}): {}", first_id, kind, e);
                        last_error = Some(e);
                        break;
                    }

                    warn!(
                        "Batch at segment {} attempt {}/{} failed ({:?}): {}",
                        first_id,
                        attempts,
                        self.policy.attempts(),
                        kind,
                        e
                    );
                    last_error = Some(e);

                    if attempt + 1 < self.policy.attempts() {
                        tokio::time::sleep(self.policy.backoff_for(attempt)).await;
                    }
                }
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "translation failed".to_string());
        error!("Batch at segment {} failed after {} attempts: {}", first_id, attempts, reason);
        if let Some(raw) = &last_raw {
            debug!("Last raw response for batch at segment {}: {}", first_id, raw);
        }

        Ok(BatchOutcome::failed(batch, reason, attempts, last_raw, started.elapsed()))
    }
}
