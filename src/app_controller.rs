/*!
 * Application controller for the document translation workflow.
 *
 * The controller ties the pieces together for one input document:
 * - identify the document and its project directory
 * - load the cached structure or segment the unit stream
 * - pre-translate chapter titles and build the glossary
 * - run the scheduler with a progress bar until every segment is done
 */

use anyhow::{anyhow, Context, Result};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::app_config::Config;
use crate::document::toc::{parse_outline_csv, parse_outline_json, synthetic_page_outline};
use crate::document::{
    segment_units, ContentUnit, JsonUnitSource, OutlineEntry, PlainTextSource, SegmentList, TocUnifier, UnitSource,
};
use crate::errors::AppError;
use crate::file_utils::FileManager;
use crate::providers::{self, Provider};
use crate::session::{CheckpointStore, ProgressStats, ResumeOutcome, StructureStore};
use crate::translation::titles::pretranslate_titles;
use crate::translation::{
    BatchOrchestrator, ClientSettings, ContextBuilder, Glossary, GlossaryExtractor, RetryPolicy, RunState, RunSummary,
    Scheduler, SchedulerOptions, SharedRunState, TranslationClient,
};

/// How the input file is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// JSON array of content units produced by an extractor
    Json,
    /// Plain text, paragraphs separated by blank lines
    Text,
}

impl InputFormat {
    /// Guess the format from the file extension, defaulting to plain text
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()) {
            Some(ext) if ext == "json" => Self::Json,
            _ => Self::Text,
        }
    }

    fn source(&self, path: &Path) -> Box<dyn UnitSource> {
        match self {
            Self::Json => Box::new(JsonUnitSource::new(path)),
            Self::Text => Box::new(PlainTextSource::new(path)),
        }
    }
}

/// Segment list of a document together with where it is stored
#[derive(Debug)]
pub struct LoadedDocument {
    pub document_hash: String,
    pub project_dir: PathBuf,
    pub segments: SegmentList,
    /// True when the structure was segmented in this run
    pub freshly_segmented: bool,
}

/// Outcome of a translation run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub document_hash: String,
    pub project_dir: PathBuf,
    pub progress: ProgressStats,
    pub batches: usize,
    pub failed_segments: usize,
    pub retries: u32,
    pub glossary_terms: usize,
    pub interrupted: bool,
}

/// Main application controller
pub struct Controller {
    config: Config,
}

impl Controller {
    /// Create a controller with the given configuration
    pub fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;
        Ok(Self { config })
    }

    /// Create a controller without validating the configuration
    pub fn new_unchecked(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Translate a document with the provider selected in the configuration
    pub async fn run(&self, input: &Path, outline: Option<&Path>, format: Option<InputFormat>) -> Result<RunReport> {
        let provider = providers::create_provider(&self.config.translation)?;
        info!(
            "🚀 YADTwAI: {} - {}",
            self.config.translation.provider.display_name(),
            self.config.translation.get_model()
        );
        self.run_with_provider(provider, input, outline, format).await
    }

    /// Translate a document through an already built provider
    pub async fn run_with_provider(
        &self,
        provider: Arc<dyn Provider>,
        input: &Path,
        outline: Option<&Path>,
        format: Option<InputFormat>,
    ) -> Result<RunReport> {
        let start_time = Instant::now();
        let document = self.load_or_segment(input, outline, format)?;
        let LoadedDocument {
            document_hash,
            project_dir,
            mut segments,
            freshly_segmented,
        } = document;

        let image_root = input.parent().unwrap_or(Path::new(".")).to_path_buf();
        let settings = ClientSettings::from_config(&self.config).with_image_root(image_root);
        let client = Arc::new(TranslationClient::new(provider, settings));

        let structure = StructureStore::new(&project_dir, &document_hash);
        if freshly_segmented && self.config.processing.translate_titles {
            if pretranslate_titles(&client, &mut segments, &self.config.target_language).await > 0 {
                structure.save(&segments)?;
            }
        }

        let (mut checkpoint, resume) = CheckpointStore::open(&project_dir, &document_hash);
        match &resume {
            ResumeOutcome::Resumed { completed, failed } => {
                info!("Resuming: {} segments done, {} failed last time", completed, failed)
            }
            ResumeOutcome::Fresh => debug!("Starting a new checkpoint"),
            other => warn!("Previous checkpoint discarded: {:?}", other),
        }
        checkpoint.register_total(segments.len());
        checkpoint.persist()?;

        let orchestrator = Arc::new(BatchOrchestrator::new(
            client.clone(),
            RetryPolicy::from_config(&self.config.translation.common),
        ));
        let state = RunState::new(segments, checkpoint, structure).into_shared();

        let glossary = self.prepare_glossary(&orchestrator, &state, &project_dir).await?;
        let glossary_terms = glossary.as_ref().map_or(0, |g| g.len());

        let scheduler = Scheduler::new(
            orchestrator,
            SchedulerOptions::from_config(&self.config),
            ContextBuilder::from_config(&self.config.processing),
        );

        let multi_progress = MultiProgress::new();
        let progress_bar = multi_progress.add(ProgressBar::new(0));
        let template_result = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} batches ({percent}%) {msg} {eta}")
            .or_else(|_| ProgressStyle::default_bar().template("{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} ({percent}%) {msg}"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        progress_bar.set_style(template_result.progress_chars("█▓▒░"));
        progress_bar.set_message("Translating");

        let pb = progress_bar.clone();
        let run = scheduler.run(state.clone(), glossary, move |done, total| {
            pb.set_length(total as u64);
            pb.set_position(done as u64);
        });

        let (result, interrupted) = tokio::select! {
            result = run => (result, false),
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted, saving progress");
                (Err(AppError::Interrupted("received Ctrl-C".to_string())), true)
            }
        };
        progress_bar.finish_and_clear();

        let progress = {
            let mut guard = state.lock().await;
            if let Err(e) = guard.flush_async().await {
                warn!("Final save failed: {}", e);
            }
            guard.checkpoint.progress_stats()
        };

        let summary = match result {
            Ok(summary) => summary,
            Err(AppError::Interrupted(_)) if interrupted => RunSummary::default(),
            Err(e) => return Err(anyhow!(e)).context("Translation run aborted"),
        };

        info!(
            "Translation {} in {}: {}/{} segments, {} failed, {} retries",
            if interrupted { "interrupted" } else { "finished" },
            format_duration(start_time.elapsed()),
            progress.completed,
            progress.total,
            progress.failed,
            summary.retries
        );
        info!("{}", client.stats().summary());

        Ok(RunReport {
            document_hash,
            project_dir,
            progress,
            batches: summary.batches,
            failed_segments: summary.failed,
            retries: summary.retries,
            glossary_terms,
            interrupted,
        })
    }

    /// Translate every document of a directory, one after another.
    ///
    /// Documents are picked by the extension of `format` (JSON unit files by
    /// default); files inside the output directory are skipped. A failing
    /// document is logged and the next one is processed.
    pub async fn run_folder(&self, input_dir: &Path, format: Option<InputFormat>) -> Result<Vec<RunReport>> {
        let format = format.unwrap_or(InputFormat::Json);
        let extension = match format {
            InputFormat::Json => "json",
            InputFormat::Text => "txt",
        };
        let output_dir = self.config.output_dir.canonicalize().ok();
        let files: Vec<PathBuf> = FileManager::find_files(input_dir, extension)?
            .into_iter()
            .filter(|f| match (&output_dir, f.canonicalize()) {
                (Some(out), Ok(file)) => !file.starts_with(out),
                _ => true,
            })
            .collect();
        info!("Found {} documents in {:?}", files.len(), input_dir);

        let mut reports = Vec::new();
        for file in &files {
            info!("Processing {:?}", file);
            match self.run(file, None, Some(format)).await {
                Ok(report) => {
                    let stop = report.interrupted;
                    reports.push(report);
                    if stop {
                        break;
                    }
                }
                Err(e) => error!("Error processing {:?}: {:#}", file, e),
            }
        }
        Ok(reports)
    }

    /// Load the cached structure of a document or segment it and cache the result
    pub fn load_or_segment(
        &self,
        input: &Path,
        outline: Option<&Path>,
        format: Option<InputFormat>,
    ) -> Result<LoadedDocument> {
        if !input.exists() {
            return Err(anyhow!("Input file does not exist: {:?}", input));
        }

        let document_hash = FileManager::hash_file(input)?;
        let project_dir = FileManager::project_dir(&self.config.output_dir, &document_hash);
        FileManager::ensure_dir(&project_dir)?;

        let structure = StructureStore::new(&project_dir, &document_hash);
        if let Some(segments) = structure.load() {
            info!("Loaded {} segments from {}", segments.len(), structure.path().display());
            return Ok(LoadedDocument {
                document_hash,
                project_dir,
                segments,
                freshly_segmented: false,
            });
        }

        let format = format.unwrap_or_else(|| InputFormat::from_path(input));
        let source = format.source(input);
        info!("Segmenting {}", source.describe());
        let units = source.read_units()?;

        let (entries, use_breadcrumb) = match outline {
            Some(path) => (read_outline(path)?, self.config.processing.use_breadcrumb),
            None => (synthetic_page_outline(page_count(&units)), false),
        };
        let chapters = TocUnifier::new(use_breadcrumb).unify(&entries);
        let segments = segment_units(units, &chapters, self.config.processing.max_chunk_size)?;
        if segments.is_empty() {
            return Err(anyhow!("No content found in {:?}", input));
        }
        structure.save(&segments)?;

        Ok(LoadedDocument {
            document_hash,
            project_dir,
            segments,
            freshly_segmented: true,
        })
    }

    /// Progress of a document as recorded by its checkpoint
    pub fn status(&self, input: &Path) -> Result<ProgressStats> {
        let (document_hash, project_dir) = self.locate(input)?;
        let (checkpoint, outcome) = CheckpointStore::open(&project_dir, &document_hash);
        if !outcome.is_resumed() {
            debug!("No checkpoint for {:?}", input);
        }
        Ok(checkpoint.progress_stats())
    }

    /// Forget all translation progress of a document
    pub fn reset(&self, input: &Path) -> Result<()> {
        let (document_hash, project_dir) = self.locate(input)?;
        let (mut checkpoint, _) = CheckpointStore::open(&project_dir, &document_hash);
        checkpoint.reset();
        checkpoint.persist()?;

        // Cached translations would otherwise count as done on the next run
        let structure = StructureStore::new(&project_dir, &document_hash);
        if let Some(segments) = structure.load() {
            let cleared: Vec<_> = segments
                .into_inner()
                .into_iter()
                .map(|mut s| {
                    s.translated_text.clear();
                    s
                })
                .collect();
            structure.save(&SegmentList::new(cleared)?)?;
        }
        info!("Progress cleared for {:?}", input);
        Ok(())
    }

    fn locate(&self, input: &Path) -> Result<(String, PathBuf)> {
        if !input.exists() {
            return Err(anyhow!("Input file does not exist: {:?}", input));
        }
        let document_hash = FileManager::hash_file(input)?;
        let project_dir = FileManager::project_dir(&self.config.output_dir, &document_hash);
        Ok((document_hash, project_dir))
    }

    async fn prepare_glossary(
        &self,
        orchestrator: &BatchOrchestrator,
        state: &SharedRunState,
        project_dir: &Path,
    ) -> Result<Option<Arc<Glossary>>> {
        if !self.config.glossary.enabled {
            return Ok(None);
        }
        if let Some(glossary) = Glossary::load(project_dir) {
            info!("Loaded glossary with {} terms", glossary.len());
            return Ok(non_empty(glossary));
        }

        let extractor = GlossaryExtractor::new(
            self.config.glossary.clone(),
            self.config.processing.batch_size,
            ContextBuilder::from_config(&self.config.processing),
        );
        match extractor.build(orchestrator, state).await {
            Ok(glossary) => {
                glossary.save(project_dir)?;
                info!("Glossary built with {} terms", glossary.len());
                Ok(non_empty(glossary))
            }
            Err(AppError::Translation(e)) if e.kind().is_fatal() => {
                Err(anyhow!(e)).context("Glossary extraction aborted")
            }
            Err(e) => {
                warn!("Glossary extraction failed, continuing without glossary: {}", e);
                Ok(None)
            }
        }
    }
}

fn non_empty(glossary: Glossary) -> Option<Arc<Glossary>> {
    if glossary.is_empty() { None } else { Some(Arc::new(glossary)) }
}

fn read_outline(path: &Path) -> Result<Vec<OutlineEntry>> {
    let content = FileManager::read_to_string(path)?;
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    let entries = if is_csv {
        parse_outline_csv(&content)
    } else {
        parse_outline_json(&content)
    }
    .with_context(|| format!("Failed to parse outline {:?}", path))?;
    Ok(entries)
}

/// Number of pages spanned by page-keyed units
fn page_count(units: &[ContentUnit]) -> usize {
    units.iter().filter_map(|u| u.key.page()).max().map_or(0, |p| p + 1)
}

/// Format a duration in a human-readable way
pub fn format_duration(duration: std::time::Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}.{:03}s", seconds, duration.subsec_millis())
    }
}
