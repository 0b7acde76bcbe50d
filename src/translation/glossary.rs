/*!
 * Glossary building with a saturation stop rule.
 *
 * The extractor translates the lead segments of the document batch by batch
 * and, after each batch, asks the backend for the terms it used. Terms are
 * merged last-write-wins. Extraction stops at the configured maximum size, or
 * once the glossary is large enough and new terms have dried up.
 */

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::app_config::GlossaryConfig;
use crate::document::ContentSegment;
use crate::errors::{AppError, CheckpointError};
use crate::file_utils::FileManager;
use crate::translation::batch::BatchOrchestrator;
use crate::translation::context::ContextBuilder;
use crate::translation::scheduler::SharedRunState;

/// File name of the glossary inside a project directory
pub const GLOSSARY_FILE: &str = "glossary.json";

/// Source term to target term map
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Glossary {
    terms: BTreeMap<String, String>,
}

impl Glossary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a term; returns true when the key is new
    pub fn insert(&mut self, source: impl Into<String>, target: impl Into<String>) -> bool {
        self.terms.insert(source.into(), target.into()).is_none()
    }

    /// Merge extracted terms, later values winning; returns the number of new keys
    pub fn merge(&mut self, terms: BTreeMap<String, String>) -> usize {
        terms
            .into_iter()
            .filter(|(source, target)| !source.trim().is_empty() && !target.trim().is_empty())
            .map(|(source, target)| self.insert(source, target))
            .filter(|added| *added)
            .count()
    }

    pub fn get(&self, source: &str) -> Option<&str> {
        self.terms.get(source).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.terms.iter()
    }

    /// Load `glossary.json` from a project directory
    pub fn load(project_dir: &Path) -> Option<Self> {
        let path = project_dir.join(GLOSSARY_FILE);
        let content = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str::<Self>(&content) {
            Ok(glossary) => Some(glossary),
            Err(e) => {
                warn!("Ignoring unreadable glossary {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Write `glossary.json` atomically
    pub fn save(&self, project_dir: &Path) -> Result<(), CheckpointError> {
        let path = project_dir.join(GLOSSARY_FILE);
        let json = serde_json::to_vec_pretty(self)?;
        FileManager::write_atomic(&path, &json).map_err(|source| CheckpointError::Io {
            path: path.display().to_string(),
            source,
        })
    }
}

/// Tracks new-key counts and decides when extraction should stop
#[derive(Debug, Clone)]
pub struct SaturationTracker {
    min_terms: usize,
    max_terms: usize,
    ratio: f64,
    window: usize,
    patience: usize,
    history: Vec<usize>,
    stagnant_checks: usize,
}

impl SaturationTracker {
    pub fn new(config: &GlossaryConfig) -> Self {
        Self {
            min_terms: config.min_terms,
            max_terms: config.max_terms,
            ratio: config.saturation_ratio,
            window: config.saturation_window.max(1),
            patience: config.saturation_patience.max(1),
            history: Vec::new(),
            stagnant_checks: 0,
        }
    }

    /// New-key counts recorded so far
    pub fn history(&self) -> &[usize] {
        &self.history
    }

    /// Record one batch; returns true when extraction should stop.
    ///
    /// A check is stagnant when the average of the last `window` counts is
    /// below `ratio` times the average of the counts before that window.
    pub fn record(&mut self, new_keys: usize, glossary_len: usize) -> bool {
        self.history.push(new_keys);

        if glossary_len >= self.max_terms {
            return true;
        }
        if glossary_len < self.min_terms || self.history.len() <= self.window {
            self.stagnant_checks = 0;
            return false;
        }

        let split = self.history.len() - self.window;
        let trailing = average(&self.history[split..]);
        let historical = average(&self.history[..split]);
        let stagnant = trailing < self.ratio * historical || (historical == 0.0 && trailing == 0.0);

        if stagnant {
            self.stagnant_checks += 1;
        } else {
            self.stagnant_checks = 0;
        }
        debug!(
            "Glossary growth: trailing {:.2}, historical {:.2}, stagnant checks {}",
            trailing, historical, self.stagnant_checks
        );
        self.stagnant_checks >= self.patience
    }
}

fn average(values: &[usize]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<usize>() as f64 / values.len() as f64
    }
}

/// Builds the glossary from the lead segments
pub struct GlossaryExtractor {
    config: GlossaryConfig,
    batch_size: usize,
    contexts: ContextBuilder,
}

impl GlossaryExtractor {
    pub fn new(config: GlossaryConfig, batch_size: usize, contexts: ContextBuilder) -> Self {
        Self {
            config,
            batch_size: batch_size.max(1),
            contexts,
        }
    }

    /// Number of leading segments used for extraction
    pub fn lead_count(&self, total_segments: usize) -> usize {
        if total_segments == 0 {
            return 0;
        }
        ((total_segments as f64 * self.config.lead_fraction).floor() as usize).clamp(1, total_segments)
    }

    /// Translate the lead segments and collect terms from them.
    ///
    /// Lead translations are stored in `state` like any other result, so the
    /// scheduler will not send them again. Only a fatal backend error or a
    /// failed flush is returned as an error; a failed extraction counts as a
    /// batch without new terms.
    pub async fn build(&self, orchestrator: &BatchOrchestrator, state: &SharedRunState) -> Result<Glossary, AppError> {
        let lead: Vec<ContentSegment> = {
            let guard = state.lock().await;
            let count = self.lead_count(guard.segments.len());
            guard
                .segments
                .iter()
                .take(count)
                .filter(|s| !s.is_image())
                .cloned()
                .collect()
        };

        let mut glossary = Glossary::new();
        let mut tracker = SaturationTracker::new(&self.config);
        let batches: Vec<&[ContentSegment]> = lead.chunks(self.batch_size).collect();
        info!("Building glossary from {} lead segments ({} batches)", lead.len(), batches.len());

        for (index, batch) in batches.iter().enumerate() {
            let pending: Vec<ContentSegment> = batch.iter().filter(|s| !s.is_translated()).cloned().collect();
            if !pending.is_empty() {
                let context = {
                    let guard = state.lock().await;
                    self.contexts.context_for(&guard.segments, pending[0].segment_id)
                };
                let outcome = orchestrator.run_batch(&pending, &context, None).await?;
                let mut guard = state.lock().await;
                guard.apply(&outcome);
                guard.flush_async().await?;
            }

            let pairs: Vec<(String, String)> = {
                let guard = state.lock().await;
                batch
                    .iter()
                    .filter_map(|s| guard.segments.get(s.segment_id))
                    .filter(|s| s.is_translated())
                    .map(|s| (s.original_text.clone(), s.translated_text.clone()))
                    .collect()
            };

            let new_keys = match orchestrator.client().extract_terms(&pairs).await {
                Ok(terms) => glossary.merge(terms),
                Err(e) if e.kind().is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!("Term extraction for lead batch {} failed: {}", index + 1, e);
                    0
                }
            };
            debug!("Lead batch {}: {} new terms, {} total", index + 1, new_keys, glossary.len());

            if tracker.record(new_keys, glossary.len()) {
                info!(
                    "Glossary saturated after {} of {} lead batches ({} terms)",
                    index + 1,
                    batches.len(),
                    glossary.len()
                );
                break;
            }
        }

        Ok(glossary)
    }
}
