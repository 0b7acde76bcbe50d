/*!
 * Provider implementations for different translation backends.
 *
 * This module contains client implementations for the supported LLM backends:
 * - OpenAI-compatible chat completions (OpenAI, Ollama, LM Studio)
 * - Anthropic messages API
 * - A scriptable mock used by tests
 */

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{TranslationConfig, TranslationProvider};
use crate::errors::ProviderError;
use crate::translation::concurrency::ProviderProfile;

pub mod anthropic;
pub mod mock;
pub mod openai;

/// Image sent along with a prompt
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAttachment {
    /// MIME type, e.g. `image/png`
    pub media_type: String,
    /// Base64 encoded file content
    pub data_base64: String,
}

/// A single prompt/response exchange
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System instruction
    pub system: String,
    /// User message
    pub user: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
    /// Optional image for vision-capable models
    pub image: Option<ImageAttachment>,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            temperature: 0.2,
            max_tokens: 4096,
            image: None,
        }
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.image = Some(image);
        self
    }
}

/// Common trait for all LLM providers
///
/// Implementations perform exactly one HTTP exchange per call and map every
/// failure onto a [`ProviderError`]; retries are decided by the caller.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Send the request and return the generated text
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError>;

    /// Test the connection to the provider
    async fn test_connection(&self) -> Result<(), ProviderError> {
        self.complete(CompletionRequest::new("", "Hello").max_tokens(10)).await?;
        Ok(())
    }

    /// Short name for logs
    fn name(&self) -> &str;

    /// Whether batches must be sent one after another
    fn requires_strict_ordering(&self) -> bool {
        false
    }
}

/// Build the provider selected in the configuration
pub fn create_provider(config: &TranslationConfig) -> Result<Arc<dyn Provider>> {
    let timeout = Duration::from_secs(config.get_timeout_secs());
    let model = config.get_model();
    let endpoint = config.get_endpoint();

    let provider: Arc<dyn Provider> = match config.provider {
        TranslationProvider::Anthropic => {
            Arc::new(anthropic::Anthropic::new(config.get_api_key(), endpoint, model, timeout)?)
        }
        TranslationProvider::OpenAI | TranslationProvider::Ollama | TranslationProvider::LMStudio => {
            let strict_ordering = ProviderProfile::for_provider(config.provider).strict_ordering;
            Arc::new(
                openai::OpenAiCompatible::new(
                    config.provider.display_name(),
                    config.get_api_key(),
                    endpoint,
                    model,
                    timeout,
                )?
                .with_strict_ordering(strict_ordering),
            )
        }
    };
    Ok(provider)
}

/// Guess an image MIME type from its file extension
pub fn media_type_for(path: &std::path::Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Ok("image/png"),
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "gif" => Ok("image/gif"),
        "webp" => Ok("image/webp"),
        other => Err(anyhow!("Unsupported image type: '{}'", other)),
    }
}
