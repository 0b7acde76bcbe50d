/*!
 * Provider-specific concurrency tuning.
 *
 * Hosted APIs and local servers tolerate very different request patterns.
 * The profile gives the default admission limit of the scheduler, the
 * spacing between sequential requests and whether batches must go out one
 * at a time.
 */

use std::time::Duration;

use crate::app_config::{TranslationConfig, TranslationProvider};

/// Provider-specific concurrency profile with tuned defaults
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderProfile {
    /// Maximum concurrent requests
    pub max_concurrent_requests: usize,
    /// Target requests per minute, when the backend is rate limited
    pub target_rpm: Option<u32>,
    /// Whether batches must be dispatched sequentially
    pub strict_ordering: bool,
}

impl ProviderProfile {
    /// Get the profile for a given provider
    pub fn for_provider(provider: TranslationProvider) -> Self {
        match provider {
            TranslationProvider::Ollama => Self {
                // Local server, the GPU is the bottleneck
                max_concurrent_requests: 4,
                target_rpm: None,
                strict_ordering: false,
            },
            TranslationProvider::OpenAI => Self {
                max_concurrent_requests: 8,
                target_rpm: Some(60),
                strict_ordering: false,
            },
            TranslationProvider::Anthropic => Self {
                max_concurrent_requests: 4,
                target_rpm: Some(45),
                strict_ordering: false,
            },
            TranslationProvider::LMStudio => Self {
                // LM Studio serves one generation at a time
                max_concurrent_requests: 1,
                target_rpm: None,
                strict_ordering: true,
            },
        }
    }

    /// Profile of the provider selected in the configuration
    pub fn for_config(config: &TranslationConfig) -> Self {
        let mut profile = Self::for_provider(config.provider);
        if let Some(rpm) = config.get_rate_limit() {
            profile.target_rpm = Some(rpm);
        }
        profile
    }

    /// Get effective concurrent requests, respecting any user override
    pub fn effective_concurrent_requests(&self, user_override: Option<usize>) -> usize {
        user_override.unwrap_or(self.max_concurrent_requests).max(1)
    }

    /// Smallest spacing between two sequential requests allowed by the rate limit
    pub fn min_request_interval(&self) -> Duration {
        match self.target_rpm {
            Some(rpm) if rpm > 0 => Duration::from_millis(60_000 / rpm as u64),
            _ => Duration::ZERO,
        }
    }
}
