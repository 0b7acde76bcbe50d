/*!
 * Core translation client implementation.
 *
 * This module contains the `TranslationClient`, which performs exactly one
 * backend exchange per batch (one per image for image batches) and turns the
 * reply into translations aligned with the batch order. Retrying is left to
 * the batch orchestrator.
 */

use base64::Engine;
use log::{debug, warn};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::app_config::Config;
use crate::document::{failure_marker, ContentSegment, EMPTY_RESPONSE_MARKER};
use crate::errors::{ProviderError, TranslationError};
use crate::language_utils;
use crate::providers::{media_type_for, CompletionRequest, ImageAttachment, Provider};
use crate::translation::glossary::Glossary;
use crate::translation::prompts::{self, PromptTemplate};
use crate::translation::response::{self, AlignedBatch, Recovery};

/// Request statistics for one run
#[derive(Debug, Clone, Default)]
pub struct RequestStats {
    /// Number of backend requests issued
    pub requests: u64,

    /// Number of requests that returned an error
    pub failed_requests: u64,

    /// Replies that needed regex salvage
    pub salvaged_replies: u64,

    /// Total time spent waiting on the backend
    pub api_duration: Duration,
}

impl RequestStats {
    /// Average latency per request
    pub fn average_latency(&self) -> Duration {
        if self.requests == 0 {
            Duration::ZERO
        } else {
            self.api_duration / self.requests as u32
        }
    }

    /// Generate a summary of request usage
    pub fn summary(&self) -> String {
        format!(
            "Requests: {} ({} failed, {} salvaged), API time: {:.1}s, average latency: {:.2}s",
            self.requests,
            self.failed_requests,
            self.salvaged_replies,
            self.api_duration.as_secs_f64(),
            self.average_latency().as_secs_f64()
        )
    }
}

/// Settings the client needs from the configuration
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Rendered system prompt
    pub system_prompt: String,

    /// Style instruction included in every prompt
    pub style: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Share of missing ids above which a batch reply is rejected
    pub missing_ratio_threshold: f64,

    /// Extra round trips asking the model to repair unusable JSON
    pub json_repair_retries: u32,

    /// Directory relative image paths are resolved against
    pub image_root: PathBuf,
}

impl ClientSettings {
    pub fn from_config(config: &Config) -> Self {
        let source = language_utils::display_name(&config.source_language);
        let target = language_utils::display_name(&config.target_language);
        let common = &config.translation.common;
        Self {
            system_prompt: PromptTemplate::new(&common.system_prompt).render(&source, &target),
            style: common.style.clone(),
            temperature: common.temperature,
            missing_ratio_threshold: config.processing.missing_ratio_threshold,
            json_repair_retries: common.json_repair_retries,
            image_root: PathBuf::from("."),
        }
    }

    pub fn with_image_root(mut self, image_root: impl Into<PathBuf>) -> Self {
        self.image_root = image_root.into();
        self
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Result of one batch exchange
#[derive(Debug, Clone, PartialEq)]
pub struct BatchTranslation {
    /// One entry per batch segment, in batch order
    pub translations: Vec<String>,

    /// Ids filled with the missing placeholder
    pub missing: Vec<u64>,

    /// Raw backend reply (last one for image batches)
    pub raw_response: String,
}

/// Client translating batches through a provider
pub struct TranslationClient {
    provider: Arc<dyn Provider>,
    settings: ClientSettings,
    stats: Mutex<RequestStats>,
}

impl TranslationClient {
    pub fn new(provider: Arc<dyn Provider>, settings: ClientSettings) -> Self {
        Self {
            provider,
            settings,
            stats: Mutex::new(RequestStats::default()),
        }
    }

    pub fn settings(&self) -> &ClientSettings {
        &self.settings
    }

    /// Whether the backend needs batches dispatched one at a time
    pub fn requires_strict_ordering(&self) -> bool {
        self.provider.requires_strict_ordering()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Snapshot of the request statistics
    pub fn stats(&self) -> RequestStats {
        self.stats.lock().clone()
    }

    async fn send(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        let started = Instant::now();
        let result = self.provider.complete(request).await;

        let mut stats = self.stats.lock();
        stats.requests += 1;
        stats.api_duration += started.elapsed();
        if result.is_err() {
            stats.failed_requests += 1;
        }
        result
    }

    fn request(&self, user: String) -> CompletionRequest {
        CompletionRequest::new(self.settings.system_prompt.clone(), user).temperature(self.settings.temperature)
    }

    /// Translate one batch of segments sharing a content type
    pub async fn translate_batch(
        &self,
        batch: &[ContentSegment],
        context: &str,
        glossary: Option<&Glossary>,
    ) -> Result<BatchTranslation, TranslationError> {
        match batch.first() {
            None => Ok(BatchTranslation {
                translations: Vec::new(),
                missing: Vec::new(),
                raw_response: String::new(),
            }),
            Some(first) if first.is_image() => self.translate_images(batch, context).await,
            Some(_) => self.translate_texts(batch, context, glossary).await,
        }
    }

    async fn translate_texts(
        &self,
        batch: &[ContentSegment],
        context: &str,
        glossary: Option<&Glossary>,
    ) -> Result<BatchTranslation, TranslationError> {
        let ids: Vec<u64> = batch.iter().map(|s| s.segment_id).collect();
        let items: Vec<(u64, &str)> = batch.iter().map(|s| (s.segment_id, s.original_text.as_str())).collect();
        debug!(
            "Sending batch {}..={} ({} segments) to {}",
            ids[0],
            ids[ids.len() - 1],
            ids.len(),
            self.provider.name()
        );

        let prompt = prompts::batch_prompt(&items, &self.settings.style, context, glossary);
        let mut raw = self.send(self.request(prompt)).await?;
        let mut recovered = response::recover(&raw, &ids);

        let mut repairs = 0;
        while recovered.recovery == Recovery::Nothing && repairs < self.settings.json_repair_retries {
            repairs += 1;
            warn!("Reply for batch starting at {} unusable, asking for a repair ({})", ids[0], repairs);
            let repaired = self.send(self.request(prompts::repair_prompt(&raw, &ids))).await?;
            let candidate = response::recover(&repaired, &ids);
            if candidate.recovery != Recovery::Nothing {
                raw = repaired;
                recovered = candidate;
            }
        }

        if recovered.recovery == Recovery::Salvaged {
            self.stats.lock().salvaged_replies += 1;
        }

        let AlignedBatch { translations, missing } =
            response::align(&raw, &ids, recovered, self.settings.missing_ratio_threshold)?;
        Ok(BatchTranslation {
            translations,
            missing,
            raw_response: raw,
        })
    }

    fn resolve_image(&self, image_path: &str) -> PathBuf {
        let path = Path::new(image_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.settings.image_root.join(path)
        }
    }

    async fn load_image(&self, image_path: &str) -> Result<ImageAttachment, String> {
        let path = self.resolve_image(image_path);
        let media_type = media_type_for(&path).map_err(|e| e.to_string())?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| format!("Unreadable image {}: {}", path.display(), e))?;
        Ok(ImageAttachment {
            media_type: media_type.to_string(),
            data_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
        })
    }

    async fn translate_images(&self, batch: &[ContentSegment], context: &str) -> Result<BatchTranslation, TranslationError> {
        let mut translations = Vec::with_capacity(batch.len());
        let mut raw_response = String::new();

        for segment in batch {
            let image_path = segment.image_path.as_deref().unwrap_or_default();
            let attachment = match self.load_image(image_path).await {
                Ok(attachment) => attachment,
                Err(reason) => {
                    warn!("Segment {}: {}", segment.segment_id, reason);
                    translations.push(failure_marker(&reason));
                    continue;
                }
            };

            let request = self
                .request(prompts::image_prompt(&self.settings.style, context))
                .with_image(attachment);
            raw_response = self.send(request).await?;
            let text = response::parse_image_reply(&raw_response);
            if text.trim().is_empty() {
                translations.push(EMPTY_RESPONSE_MARKER.to_string());
            } else {
                translations.push(text);
            }
        }

        Ok(BatchTranslation {
            translations,
            missing: Vec::new(),
            raw_response,
        })
    }

    /// Translate chapter titles in one request
    pub async fn translate_titles(&self, titles: &[String]) -> Result<HashMap<String, String>, TranslationError> {
        if titles.is_empty() {
            return Ok(HashMap::new());
        }
        let raw = self
            .send(self.request(prompts::title_prompt(titles, &self.settings.style)))
            .await?;
        let map = response::parse_string_map(&raw).ok_or_else(|| TranslationError::MalformedResponse {
            message: "title reply is not a JSON object".to_string(),
            raw: raw.clone(),
        })?;
        Ok(map.into_iter().collect())
    }

    /// Ask the backend for the terms used in already translated pairs
    pub async fn extract_terms(&self, pairs: &[(String, String)]) -> Result<BTreeMap<String, String>, TranslationError> {
        if pairs.is_empty() {
            return Ok(BTreeMap::new());
        }
        let raw = self.send(self.request(prompts::glossary_prompt(pairs))).await?;
        response::parse_string_map(&raw).ok_or_else(|| TranslationError::MalformedResponse {
            message: "glossary reply is not a JSON object".to_string(),
            raw,
        })
    }
}
