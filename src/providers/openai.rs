use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::ProviderError;
use crate::providers::{CompletionRequest, Provider};

/// Client for OpenAI-compatible chat completion endpoints
///
/// Used for OpenAI itself and for local servers exposing the same API
/// (Ollama under `/v1`, LM Studio).
#[derive(Debug)]
pub struct OpenAiCompatible {
    /// HTTP client for API requests
    client: Client,
    /// Display name of the backend
    name: String,
    /// API key (may be empty for local servers)
    api_key: String,
    /// Full URL of the chat completions endpoint
    url: Url,
    /// Model identifier
    model: String,
    /// Whether the server can only serve one request at a time
    strict_ordering: bool,
}

/// Chat completion request body
#[derive(Debug, Serialize)]
pub struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

/// One chat message
#[derive(Debug, Serialize)]
pub struct ChatMessage {
    role: String,
    content: MessageContent,
}

/// Plain text or multi-part content
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// Part of a multi-part message
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
pub struct ImageUrl {
    url: String,
}

/// Chat completion response body
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiCompatible {
    /// Create a new client; `endpoint` is the API base such as `https://api.openai.com/v1`
    pub fn new(
        name: impl Into<String>,
        api_key: impl Into<String>,
        endpoint: impl AsRef<str>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let base = format!("{}/", endpoint.as_ref().trim_end_matches('/'));
        let url = Url::parse(&base)
            .and_then(|u| u.join("chat/completions"))
            .map_err(|e| ProviderError::RequestFailed(format!("Invalid endpoint '{}': {}", endpoint.as_ref(), e)))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            name: name.into(),
            api_key: api_key.into(),
            url,
            model: model.into(),
            strict_ordering: false,
        })
    }

    /// Ask the scheduler to dispatch batches one at a time
    pub fn with_strict_ordering(mut self, strict_ordering: bool) -> Self {
        self.strict_ordering = strict_ordering;
        self
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Build the request body for a completion request
    pub fn build_body(&self, request: &CompletionRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if !request.system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: MessageContent::Text(request.system.clone()),
            });
        }

        let user_content = match &request.image {
            None => MessageContent::Text(request.user.clone()),
            Some(image) => MessageContent::Parts(vec![
                ContentPart::Text { text: request.user.clone() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:{};base64,{}", image.media_type, image.data_base64),
                    },
                },
            ]),
        };
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: user_content,
        });

        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        }
    }
}

#[async_trait]
impl Provider for OpenAiCompatible {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        let body = self.build_body(&request);
        debug!("{} request to {} ({} chars)", self.name, self.url, request.user.len());

        let mut builder = self.client.post(self.url.clone()).json(&body);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("{} API error ({}): {}", self.name, status, error_text);
            return Err(ProviderError::from_status(status.as_u16(), error_text));
        }

        let parsed = response
            .json::<ChatResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::ParseError("Response contained no choices".to_string()))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn requires_strict_ordering(&self) -> bool {
        self.strict_ordering
    }
}
