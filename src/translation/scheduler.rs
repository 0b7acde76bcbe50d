/*!
 * Batch dispatch across a document.
 *
 * The scheduler partitions pending segments into document-ordered batches and
 * runs them either one after another or concurrently behind a semaphore.
 * All mutation of the segment list and the checkpoint goes through a single
 * `tokio::sync::Mutex<RunState>`; in concurrent mode each batch applies its
 * results and flushes both stores while it still holds its permit.
 */

use futures::stream::{self, StreamExt};
use log::{debug, info};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};

use crate::app_config::Config;
use crate::document::{ContentSegment, ContentType, SegmentList};
use crate::errors::{AppError, CheckpointError};
use crate::file_utils::FileManager;
use crate::session::{CheckpointStore, StructureStore};
use crate::translation::batch::{BatchOrchestrator, BatchOutcome};
use crate::translation::concurrency::ProviderProfile;
use crate::translation::context::ContextBuilder;
use crate::translation::glossary::Glossary;

/// Segment list plus the stores that persist it
#[derive(Debug)]
pub struct RunState {
    pub segments: SegmentList,
    pub checkpoint: CheckpointStore,
    pub structure: StructureStore,
    generation: u64,
    written: Arc<parking_lot::Mutex<u64>>,
}

/// Run state shared between batch tasks
pub type SharedRunState = Arc<Mutex<RunState>>;

impl RunState {
    pub fn new(segments: SegmentList, checkpoint: CheckpointStore, structure: StructureStore) -> Self {
        Self {
            segments,
            checkpoint,
            structure,
            generation: 0,
            written: Arc::new(parking_lot::Mutex::new(0)),
        }
    }

    pub fn into_shared(self) -> SharedRunState {
        Arc::new(Mutex::new(self))
    }

    /// Record a batch outcome in memory
    pub fn apply(&mut self, outcome: &BatchOutcome) {
        outcome.apply(&mut self.segments, &mut self.checkpoint);
    }

    /// Segments still to translate, in document order
    pub fn pending(&mut self) -> Vec<ContentSegment> {
        self.checkpoint
            .get_pending(&self.segments)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Serialize the structure snapshot and the checkpoint for writing
    pub fn snapshot(&mut self) -> Result<Snapshot, CheckpointError> {
        let structure = self.structure.encode(&self.segments)?;
        let checkpoint = self.checkpoint.encode()?;
        self.generation += 1;
        Ok(Snapshot {
            generation: self.generation,
            written: self.written.clone(),
            files: vec![
                (self.structure.path().to_path_buf(), structure),
                (self.checkpoint.path().to_path_buf(), checkpoint),
            ],
        })
    }

    /// Write the structure snapshot and the checkpoint
    pub fn flush(&mut self) -> Result<(), CheckpointError> {
        self.snapshot()?.write()
    }

    /// Like [`RunState::flush`], with the file I/O on the blocking pool.
    ///
    /// A write that outlives its cancelled caller never replaces a newer
    /// snapshot.
    pub async fn flush_async(&mut self) -> Result<(), CheckpointError> {
        let snapshot = self.snapshot()?;
        tokio::task::spawn_blocking(move || snapshot.write()).await?
    }
}

/// Encoded stores waiting to be written, structure first
#[derive(Debug)]
pub struct Snapshot {
    generation: u64,
    written: Arc<parking_lot::Mutex<u64>>,
    files: Vec<(PathBuf, Vec<u8>)>,
}

impl Snapshot {
    /// Write every file atomically, in order.
    ///
    /// Skipped when a later snapshot of the same run is already on disk.
    pub fn write(&self) -> Result<(), CheckpointError> {
        let mut written = self.written.lock();
        if *written > self.generation {
            debug!("Snapshot {} superseded by {}, not written", self.generation, *written);
            return Ok(());
        }
        for (path, bytes) in &self.files {
            FileManager::write_atomic(path, bytes).map_err(|source| CheckpointError::Io {
                path: path.display().to_string(),
                source,
            })?;
        }
        *written = self.generation;
        Ok(())
    }
}

/// How batches are dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// One batch at a time, with a delay between batches
    Sequential,
    /// Up to the given number of batches in flight
    Concurrent(usize),
}

/// Scheduler settings
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Segments per text batch
    pub batch_size: usize,

    /// Pending count below which dispatch is sequential
    pub async_threshold: usize,

    /// Allow concurrent dispatch at all
    pub enable_concurrency: bool,

    /// Admission limit in concurrent mode
    pub max_concurrency: usize,

    /// Sequential mode flushes every this many batches
    pub checkpoint_interval: usize,

    /// Pause between sequential batches
    pub rate_limit_delay: Duration,
}

impl SchedulerOptions {
    pub fn from_config(config: &Config) -> Self {
        let profile = ProviderProfile::for_config(&config.translation);
        let configured_delay = Duration::from_millis(config.translation.common.rate_limit_delay_ms);
        Self {
            batch_size: config.processing.batch_size.max(1),
            async_threshold: config.processing.async_threshold,
            enable_concurrency: config.processing.enable_concurrency,
            max_concurrency: profile.effective_concurrent_requests(config.translation.get_concurrent_requests()),
            checkpoint_interval: config.processing.checkpoint_interval.max(1),
            rate_limit_delay: configured_delay.max(profile.min_request_interval()),
        }
    }
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Totals of one scheduler run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Batches dispatched
    pub batches: usize,
    /// Segments translated successfully
    pub completed: usize,
    /// Segments left with a failure placeholder
    pub failed: usize,
    /// Attempts beyond the first, summed over batches
    pub retries: u32,
    /// Wall time of the run
    pub duration: Duration,
}

impl RunSummary {
    fn record(&mut self, outcome: &BatchOutcome) {
        self.batches += 1;
        self.completed += outcome.completed_count();
        self.failed += outcome.failed_count();
        self.retries += outcome.attempts.saturating_sub(1);
    }
}

/// Split pending segments into batches.
///
/// Consecutive segments of the same content type are grouped, keeping
/// document order; text groups are cut every `batch_size` segments and every
/// image becomes a batch of its own.
pub fn partition_batches(pending: &[ContentSegment], batch_size: usize) -> Vec<Vec<ContentSegment>> {
    let batch_size = batch_size.max(1);
    let mut batches: Vec<Vec<ContentSegment>> = Vec::new();
    let mut current: Vec<ContentSegment> = Vec::new();

    for segment in pending {
        let limit = match segment.content_type {
            ContentType::Image => 1,
            ContentType::Text => batch_size,
        };
        let type_changed = current.first().is_some_and(|first| first.content_type != segment.content_type);
        if type_changed || current.len() >= limit {
            batches.push(std::mem::take(&mut current));
        }
        current.push(segment.clone());
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Dispatches batches through the orchestrator
pub struct Scheduler {
    orchestrator: Arc<BatchOrchestrator>,
    options: SchedulerOptions,
    contexts: ContextBuilder,
}

impl Scheduler {
    pub fn new(orchestrator: Arc<BatchOrchestrator>, options: SchedulerOptions, contexts: ContextBuilder) -> Self {
        Self {
            orchestrator,
            options,
            contexts,
        }
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    /// Pick the dispatch mode for the given number of pending segments
    pub fn select_mode(&self, pending_count: usize) -> DispatchMode {
        if !self.options.enable_concurrency
            || pending_count < self.options.async_threshold
            || self.orchestrator.client().requires_strict_ordering()
            || self.options.max_concurrency <= 1
        {
            DispatchMode::Sequential
        } else {
            DispatchMode::Concurrent(self.options.max_concurrency)
        }
    }

    /// Translate every pending segment.
    ///
    /// `progress` receives `(finished_batches, total_batches)`. A fatal
    /// translation error or a failed flush stops the run; results already
    /// applied stay in `state`.
    pub async fn run<F>(
        &self,
        state: SharedRunState,
        glossary: Option<Arc<Glossary>>,
        progress: F,
    ) -> Result<RunSummary, AppError>
    where
        F: Fn(usize, usize) + Clone + Send + Sync + 'static,
    {
        let started = Instant::now();
        let (batches, contexts, pending_count) = {
            let mut guard = state.lock().await;
            let pending = guard.pending();
            let batches = partition_batches(&pending, self.options.batch_size);
            let contexts = self.contexts.precompute(&guard.segments, &batches);
            (batches, contexts, pending.len())
        };

        if batches.is_empty() {
            info!("Nothing left to translate");
            return Ok(RunSummary::default());
        }

        let mode = self.select_mode(pending_count);
        info!(
            "Translating {} segments in {} batches ({:?})",
            pending_count,
            batches.len(),
            mode
        );

        let mut summary = match mode {
            DispatchMode::Sequential => self.run_sequential(state, batches, contexts, glossary, progress).await?,
            DispatchMode::Concurrent(limit) => {
                self.run_concurrent(state, batches, contexts, glossary, limit, progress)
                    .await?
            }
        };
        summary.duration = started.elapsed();
        Ok(summary)
    }

    async fn run_sequential<F>(
        &self,
        state: SharedRunState,
        batches: Vec<Vec<ContentSegment>>,
        contexts: Vec<String>,
        glossary: Option<Arc<Glossary>>,
        progress: F,
    ) -> Result<RunSummary, AppError>
    where
        F: Fn(usize, usize) + Clone + Send + Sync + 'static,
    {
        let total = batches.len();
        let mut summary = RunSummary::default();

        for (index, (batch, context)) in batches.iter().zip(contexts.iter()).enumerate() {
            let outcome = self.orchestrator.run_batch(batch, context, glossary.as_deref()).await?;
            summary.record(&outcome);

            {
                let mut guard = state.lock().await;
                guard.apply(&outcome);
                if (index + 1) % self.options.checkpoint_interval == 0 || index + 1 == total {
                    guard.flush_async().await?;
                }
            }
            progress(index + 1, total);

            if index + 1 < total && !self.options.rate_limit_delay.is_zero() {
                tokio::time::sleep(self.options.rate_limit_delay).await;
            }
        }
        Ok(summary)
    }

    async fn run_concurrent<F>(
        &self,
        state: SharedRunState,
        batches: Vec<Vec<ContentSegment>>,
        contexts: Vec<String>,
        glossary: Option<Arc<Glossary>>,
        limit: usize,
        progress: F,
    ) -> Result<RunSummary, AppError>
    where
        F: Fn(usize, usize) + Clone + Send + Sync + 'static,
    {
        let total = batches.len();
        let semaphore = Arc::new(Semaphore::new(limit));
        let finished = Arc::new(AtomicUsize::new(0));

        let mut results = stream::iter(batches.into_iter().zip(contexts))
            .map(|(batch, context)| {
                let semaphore = semaphore.clone();
                let orchestrator = self.orchestrator.clone();
                let state = state.clone();
                let glossary = glossary.clone();
                let finished = finished.clone();
                let progress = progress.clone();

                async move {
                    let _permit = semaphore
                        .acquire_owned()
                        .await
                        .map_err(|e| AppError::Unknown(format!("Admission gate closed: {}", e)))?;

                    let outcome = orchestrator.run_batch(&batch, &context, glossary.as_deref()).await?;
                    {
                        let mut guard = state.lock().await;
                        guard.apply(&outcome);
                        guard.flush_async().await?;
                    }

                    let current = finished.fetch_add(1, Ordering::SeqCst) + 1;
                    debug!("Batch {}/{} stored", current, total);
                    progress(current, total);
                    Ok::<BatchOutcome, AppError>(outcome)
                }
            })
            .buffer_unordered(limit);

        let mut summary = RunSummary::default();
        while let Some(result) = results.next().await {
            summary.record(&result?);
        }
        Ok(summary)
    }
}
