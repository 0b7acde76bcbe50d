/*!
 * Common test utilities for the yadtwai test suite
 */

use anyhow::Result;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

use yadtwai::app_config::Config;
use yadtwai::document::{ContentSegment, SegmentList};
use yadtwai::providers::mock::MockProvider;
use yadtwai::session::{CheckpointStore, StructureStore};
use yadtwai::translation::{BatchOrchestrator, ClientSettings, RetryPolicy, RunState, SharedRunState, TranslationClient};

/// Send library logs to the captured test output
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// Writes a JSON unit file with `pages` pages of `paragraphs` text units each
pub fn create_unit_file(dir: &Path, filename: &str, pages: usize, paragraphs: usize) -> Result<PathBuf> {
    let units: Vec<serde_json::Value> = (0..pages)
        .flat_map(|page| {
            (0..paragraphs).map(move |p| json!({ "key": page, "content": format!("Page {} paragraph {}.", page, p) }))
        })
        .collect();
    create_test_file(dir, filename, &serde_json::to_string_pretty(&units)?)
}

/// Configuration with no delays, no glossary and no title pass
pub fn test_config(output_dir: &Path) -> Config {
    let mut config = Config::default();
    config.output_dir = output_dir.to_path_buf();
    config.translation.common.rate_limit_delay_ms = 0;
    config.translation.common.retry_backoff_ms = 0;
    config.translation.common.max_backoff_ms = 0;
    config.translation.common.retry_count = 1;
    config.processing.batch_size = 2;
    config.processing.translate_titles = false;
    config.glossary.enabled = false;
    config
}

/// `n` text segments with ids `0..n`
pub fn text_segments(n: u64) -> SegmentList {
    let segments = (0..n)
        .map(|id| ContentSegment::text(id, format!("Sentence number {}.", id)).with_chapter("Chapter", 1, id == 0))
        .collect();
    SegmentList::new(segments).unwrap()
}

/// Orchestrator over a mock backend with immediate retries
pub fn orchestrator(provider: MockProvider, retries: u32) -> Arc<BatchOrchestrator> {
    let client = TranslationClient::new(Arc::new(provider), ClientSettings::default());
    Arc::new(BatchOrchestrator::new(Arc::new(client), RetryPolicy::immediate(retries)))
}

/// Run state persisted in `project_dir`
pub fn run_state(project_dir: &Path, segments: SegmentList) -> SharedRunState {
    let (mut checkpoint, _) = CheckpointStore::open(project_dir, "test-hash");
    checkpoint.register_total(segments.len());
    let structure = StructureStore::new(project_dir, "test-hash");
    RunState::new(segments, checkpoint, structure).into_shared()
}

/// Completed ids as currently written to disk
pub fn completed_on_disk(project_dir: &Path) -> Vec<u64> {
    let (checkpoint, _) = CheckpointStore::open(project_dir, "test-hash");
    checkpoint.state().completed_segments.iter().copied().collect()
}
