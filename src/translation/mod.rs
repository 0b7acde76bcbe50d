/*!
 * Resumable batch translation of document segments.
 *
 * This module contains the translation engine. It is split into several submodules:
 *
 * - `core`: the translation client (one backend exchange per batch)
 * - `response`: strict parsing, regex salvage and id alignment of replies
 * - `batch`: retry/backoff orchestration of single batches
 * - `scheduler`: sequential or bounded-concurrent dispatch with durable flushes
 * - `concurrency`: provider concurrency profiles
 * - `context`: previous-segment context for prompts
 * - `glossary`: term glossary with saturation-based extraction
 * - `titles`: chapter title pre-translation
 * - `prompts`: prompt templates
 */

// Re-export main types for easier usage
pub use self::batch::{BatchOrchestrator, BatchOutcome, RetryPolicy, SegmentResult};
pub use self::concurrency::ProviderProfile;
pub use self::context::ContextBuilder;
pub use self::core::{BatchTranslation, ClientSettings, RequestStats, TranslationClient};
pub use self::glossary::{Glossary, GlossaryExtractor, SaturationTracker};
pub use self::scheduler::{DispatchMode, RunState, RunSummary, Scheduler, SchedulerOptions, SharedRunState};

// Submodules
pub mod batch;
pub mod concurrency;
pub mod context;
pub mod core;
pub mod glossary;
pub mod prompts;
pub mod response;
pub mod scheduler;
pub mod titles;
