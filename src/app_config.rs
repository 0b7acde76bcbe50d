use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Application configuration module
/// This module handles loading, validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO)
    pub source_language: String,

    /// Target language code (ISO)
    pub target_language: String,

    /// Translation config
    pub translation: TranslationConfig,

    /// Segmentation and scheduling settings
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Glossary extraction settings
    #[serde(default)]
    pub glossary: GlossaryConfig,

    /// Base directory for per-document project folders
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Ollama (OpenAI-compatible endpoint)
    #[default]
    Ollama,
    // @provider: OpenAI
    OpenAI,
    // @provider: Anthropic
    Anthropic,
    // @provider: LM Studio (OpenAI-compatible local server)
    LMStudio,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::LMStudio => "LM Studio",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Ollama => "ollama".to_string(),
            Self::OpenAI => "openai".to_string(),
            Self::Anthropic => "anthropic".to_string(),
            Self::LMStudio => "lmstudio".to_string(),
        }
    }

    /// Whether the hosted API needs a key
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAI | Self::Anthropic)
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "lmstudio" => Ok(Self::LMStudio),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Max concurrent requests (0 = provider profile default)
    #[serde(default)]
    pub concurrent_requests: usize,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Rate limit (requests per minute)
    #[serde(default)]
    pub rate_limit: Option<u32>,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        Self {
            provider_type: provider_type.to_lowercase_string(),
            model: default_model(provider_type),
            api_key: String::new(),
            endpoint: default_endpoint(provider_type),
            concurrent_requests: 0,
            timeout_secs: default_timeout_secs(),
            rate_limit: default_rate_limit(provider_type),
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Common translation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// System prompt template for translation
    /// Placeholders: {source_language}, {target_language}
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// Style guidance added to every batch prompt
    #[serde(default = "default_style")]
    pub style: String,

    /// Delay in milliseconds between consecutive sequential requests
    #[serde(default = "default_rate_limit_delay_ms")]
    pub rate_limit_delay_ms: u64,

    /// Retry count for failed batches (a batch gets retry_count + 1 attempts)
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff delay in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Multiplier applied to the backoff delay on every attempt
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Upper bound for a single backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Extra round trips asking the model to repair unparseable JSON
    #[serde(default)]
    pub json_repair_retries: u32,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            style: default_style(),
            rate_limit_delay_ms: default_rate_limit_delay_ms(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            backoff_multiplier: default_backoff_multiplier(),
            max_backoff_ms: default_max_backoff_ms(),
            temperature: default_temperature(),
            json_repair_retries: 0,
        }
    }
}

/// Segmentation and scheduling settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProcessingConfig {
    /// Segments per backend request
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Buffered characters that force a segment flush
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: usize,

    /// Hard cap on the context string sent with a batch
    #[serde(default = "default_max_context_length")]
    pub max_context_length: usize,

    /// Pending segment count from which concurrent dispatch is used
    #[serde(default = "default_async_threshold")]
    pub async_threshold: usize,

    /// Allow bounded-concurrent dispatch at all
    #[serde(default = "default_true")]
    pub enable_concurrency: bool,

    /// Sequential mode persists state every N batches
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,

    /// Fold outline titles into "Part > Chapter" breadcrumbs
    #[serde(default = "default_true")]
    pub use_breadcrumb: bool,

    /// Fraction of a batch that may be missing before the batch is retried
    #[serde(default = "default_missing_ratio_threshold")]
    pub missing_ratio_threshold: f64,

    /// Translate chapter titles before the body
    #[serde(default = "default_true")]
    pub translate_titles: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_chunk_size: default_max_chunk_size(),
            max_context_length: default_max_context_length(),
            async_threshold: default_async_threshold(),
            enable_concurrency: true,
            checkpoint_interval: default_checkpoint_interval(),
            use_breadcrumb: true,
            missing_ratio_threshold: default_missing_ratio_threshold(),
            translate_titles: true,
        }
    }
}

/// Glossary extraction settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GlossaryConfig {
    /// Run extraction before the main translation
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Fraction of the document scanned for terms
    #[serde(default = "default_lead_fraction")]
    pub lead_fraction: f64,

    /// Saturation checks only start once this many terms are known
    #[serde(default = "default_min_terms")]
    pub min_terms: usize,

    /// Extraction stops as soon as this many terms are known
    #[serde(default = "default_max_terms")]
    pub max_terms: usize,

    /// Growth below this fraction of the historical average counts as stagnation
    #[serde(default = "default_saturation_ratio")]
    pub saturation_ratio: f64,

    /// Number of trailing batches averaged for a saturation check
    #[serde(default = "default_saturation_window")]
    pub saturation_window: usize,

    /// Consecutive stagnant checks needed to stop
    #[serde(default = "default_saturation_patience")]
    pub saturation_patience: usize,
}

impl Default for GlossaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lead_fraction: default_lead_fraction(),
            min_terms: default_min_terms(),
            max_terms: default_max_terms(),
            saturation_ratio: default_saturation_ratio(),
            saturation_window: default_saturation_window(),
            saturation_patience: default_saturation_patience(),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_rate_limit_delay_ms() -> u64 {
    1000
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000 // 1 second base backoff time
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_temperature() -> f32 {
    0.2
}

fn default_true() -> bool {
    true
}

fn default_batch_size() -> usize {
    5
}

fn default_max_chunk_size() -> usize {
    2000
}

fn default_max_context_length() -> usize {
    4096
}

fn default_async_threshold() -> usize {
    10
}

fn default_checkpoint_interval() -> usize {
    1
}

fn default_missing_ratio_threshold() -> f64 {
    0.5
}

fn default_lead_fraction() -> f64 {
    0.1
}

fn default_min_terms() -> usize {
    20
}

fn default_max_terms() -> usize {
    200
}

fn default_saturation_ratio() -> f64 {
    0.2
}

fn default_saturation_window() -> usize {
    3
}

fn default_saturation_patience() -> usize {
    2
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_endpoint(provider: TranslationProvider) -> String {
    match provider {
        TranslationProvider::Ollama => "http://localhost:11434/v1".to_string(),
        TranslationProvider::OpenAI => "https://api.openai.com/v1".to_string(),
        TranslationProvider::Anthropic => "https://api.anthropic.com".to_string(),
        TranslationProvider::LMStudio => "http://localhost:1234/v1".to_string(),
    }
}

fn default_model(provider: TranslationProvider) -> String {
    match provider {
        TranslationProvider::Ollama => "qwen2.5:7b".to_string(),
        TranslationProvider::OpenAI => "gpt-4o-mini".to_string(),
        TranslationProvider::Anthropic => "claude-3-5-haiku-latest".to_string(),
        // Placeholder; users should set the model loaded in LM Studio
        TranslationProvider::LMStudio => "local-model".to_string(),
    }
}

fn default_rate_limit(provider: TranslationProvider) -> Option<u32> {
    match provider {
        TranslationProvider::OpenAI => Some(60),
        TranslationProvider::Anthropic => Some(45),
        // Local servers are not rate limited
        TranslationProvider::Ollama | TranslationProvider::LMStudio => None,
    }
}

fn default_system_prompt() -> String {
    "You are a professional literary translator. Translate the text from {source_language} to {target_language}. \
     Keep paragraph breaks, names and formatting intact, and never add commentary."
        .to_string()
}

fn default_style() -> String {
    "Faithful to the source, fluent and natural in the target language".to_string()
}

fn check_fraction(name: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(anyhow!("{} must be between 0.0 and 1.0, got {}", name, value));
    }
    Ok(())
}

impl Config {
    /// Load a configuration file, writing a default one when it does not exist yet
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let file = File::open(path)
                .with_context(|| format!("Failed to open config file: {}", path.display()))?;
            let reader = BufReader::new(file);
            let config: Config = serde_json::from_reader(reader)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            return Ok(config);
        }

        log::warn!("Config file not found at '{}', creating default config.", path.display());
        let config = Config::default();
        let config_json = serde_json::to_string_pretty(&config)
            .context("Failed to serialize default config to JSON")?;
        crate::file_utils::FileManager::write_to_file(path, &config_json)?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        let _source_name = crate::language_utils::get_language_name(&self.source_language)?;
        let _target_name = crate::language_utils::get_language_name(&self.target_language)?;

        let provider = self.translation.provider;
        if provider.requires_api_key() && self.translation.get_api_key().is_empty() {
            return Err(anyhow!(
                "Translation API key is required for {} provider",
                provider.display_name()
            ));
        }

        let processing = &self.processing;
        if !(1..=20).contains(&processing.batch_size) {
            return Err(anyhow!("batch_size must be between 1 and 20, got {}", processing.batch_size));
        }
        if processing.max_chunk_size == 0 {
            return Err(anyhow!("max_chunk_size must be greater than zero"));
        }
        if processing.checkpoint_interval == 0 {
            return Err(anyhow!("checkpoint_interval must be greater than zero"));
        }
        check_fraction("missing_ratio_threshold", processing.missing_ratio_threshold)?;

        let glossary = &self.glossary;
        check_fraction("glossary.lead_fraction", glossary.lead_fraction)?;
        check_fraction("glossary.saturation_ratio", glossary.saturation_ratio)?;
        if glossary.min_terms > glossary.max_terms {
            return Err(anyhow!(
                "glossary.min_terms ({}) cannot exceed glossary.max_terms ({})",
                glossary.min_terms,
                glossary.max_terms
            ));
        }
        if glossary.saturation_window == 0 || glossary.saturation_patience == 0 {
            return Err(anyhow!("glossary saturation window and patience must be positive"));
        }

        let common = &self.translation.common;
        if common.backoff_multiplier < 1.0 {
            return Err(anyhow!("backoff_multiplier must be at least 1.0"));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: "en".to_string(),
            target_language: "fr".to_string(),
            translation: TranslationConfig::default(),
            processing: ProcessingConfig::default(),
            glossary: GlossaryConfig::default(),
            output_dir: default_output_dir(),
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        let provider_str = self.provider.to_lowercase_string();
        self.available_providers.iter().find(|p| p.provider_type == provider_str)
    }

    /// Mutable access to the active provider configuration, created on demand
    pub fn active_provider_config_mut(&mut self) -> &mut ProviderConfig {
        let provider_str = self.provider.to_lowercase_string();
        let position = self.available_providers.iter().position(|p| p.provider_type == provider_str);
        match position {
            Some(index) => &mut self.available_providers[index],
            None => {
                self.available_providers.push(ProviderConfig::new(self.provider));
                let last = self.available_providers.len() - 1;
                &mut self.available_providers[last]
            }
        }
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.model.clone())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| default_model(self.provider))
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.api_key.clone())
            .unwrap_or_default()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.endpoint.clone())
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| default_endpoint(self.provider))
    }

    /// Get the request timeout for the active provider
    pub fn get_timeout_secs(&self) -> u64 {
        self.get_active_provider_config()
            .map(|p| p.timeout_secs)
            .filter(|t| *t > 0)
            .unwrap_or_else(default_timeout_secs)
    }

    /// Configured concurrency override for the active provider, if any
    pub fn get_concurrent_requests(&self) -> Option<usize> {
        self.get_active_provider_config()
            .map(|p| p.concurrent_requests)
            .filter(|c| *c > 0)
    }

    /// Get the rate limit for the active provider
    pub fn get_rate_limit(&self) -> Option<u32> {
        match self.get_active_provider_config() {
            Some(provider_config) => provider_config.rate_limit,
            None => default_rate_limit(self.provider),
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::Ollama),
                ProviderConfig::new(TranslationProvider::OpenAI),
                ProviderConfig::new(TranslationProvider::Anthropic),
                ProviderConfig::new(TranslationProvider::LMStudio),
            ],
            common: TranslationCommonConfig::default(),
        }
    }
}
