/*!
 * Mock provider implementations for testing.
 *
 * The mock understands the prompts built by the translation client and
 * answers them in the expected JSON shape:
 * - `MockProvider::working()` - Always succeeds, echoing `TRANSLATED: <text>`
 * - `MockProvider::dropping(n)` - Answers only the first `n` items of a batch
 * - `MockProvider::failing(err)` - Always fails with the given error
 * - `MockProvider::scripted(..)` - Replays a fixed sequence of replies
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::ProviderError;
use crate::providers::{CompletionRequest, Provider};
use crate::translation::prompts::{BROKEN_OUTPUT_HEADER, IMAGE_TASK_HEADER, INPUT_DATA_HEADER, PAIRS_HEADER, TITLES_HEADER};

/// Prefix the working mock puts in front of every translation
pub const MOCK_PREFIX: &str = "TRANSLATED: ";

/// Behavior mode for the mock provider
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Always succeeds with a proper translation
    Working,
    /// Answers only the first `keep` items of each batch
    Dropping { keep: usize },
    /// Fails intermittently (every Nth request) with a 503
    Intermittent { fail_every: usize },
    /// Always fails with the given error
    Failing(ProviderError),
    /// Returns prose that contains no translation at all
    Garbage,
    /// Returns the working reply cut in half
    Truncated,
    /// Simulates slow response
    Slow { delay_ms: u64 },
}

type Responder = Arc<dyn Fn(&CompletionRequest, usize) -> Result<String, ProviderError> + Send + Sync>;

/// Mock provider for testing translation behavior
#[derive(Clone)]
pub struct MockProvider {
    /// Behavior mode
    behavior: MockBehavior,
    /// Request counter, shared between clones
    request_count: Arc<AtomicUsize>,
    /// Every request received, in arrival order
    requests: Arc<Mutex<Vec<CompletionRequest>>>,
    /// Replies consumed before the behavior applies
    script: Arc<Mutex<VecDeque<Result<String, ProviderError>>>>,
    /// Custom reply generator, overrides the behavior
    responder: Option<Responder>,
    /// Value reported by `requires_strict_ordering`
    strict_ordering: bool,
    /// Terms returned for glossary extraction prompts
    glossary_terms: BTreeMap<String, String>,
}

impl fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockProvider")
            .field("behavior", &self.behavior)
            .field("request_count", &self.request_count())
            .field("strict_ordering", &self.strict_ordering)
            .finish()
    }
}

#[derive(Deserialize)]
struct PromptItem {
    id: u64,
    text: String,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            script: Arc::new(Mutex::new(VecDeque::new())),
            responder: None,
            strict_ordering: false,
            glossary_terms: BTreeMap::new(),
        }
    }

    /// Create a working mock provider that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a mock that drops every batch item after the first `keep`
    pub fn dropping(keep: usize) -> Self {
        Self::new(MockBehavior::Dropping { keep })
    }

    /// Create an intermittently failing mock provider
    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent {
            fail_every: fail_every.max(1),
        })
    }

    /// Create a failing mock provider that always returns `error`
    pub fn failing(error: ProviderError) -> Self {
        Self::new(MockBehavior::Failing(error))
    }

    /// Create a mock that answers with unusable prose
    pub fn garbage() -> Self {
        Self::new(MockBehavior::Garbage)
    }

    /// Create a mock whose replies are cut off mid-way
    pub fn truncated() -> Self {
        Self::new(MockBehavior::Truncated)
    }

    /// Create a working mock that waits before each reply
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Create a mock replaying `replies` in order, then behaving as `working`
    pub fn scripted(replies: Vec<Result<String, ProviderError>>) -> Self {
        let provider = Self::working();
        provider.script.lock().extend(replies);
        provider
    }

    /// Set a custom reply generator; it receives the request and its zero-based index
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&CompletionRequest, usize) -> Result<String, ProviderError> + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// Make the mock ask for sequential scheduling
    pub fn with_strict_ordering(mut self) -> Self {
        self.strict_ordering = true;
        self
    }

    /// Terms to return when asked to extract a glossary
    pub fn with_glossary_terms(mut self, terms: &[(&str, &str)]) -> Self {
        self.glossary_terms = terms.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        self
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Copy of every request received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    /// Extract the `(id, text)` items from a batch prompt
    pub fn batch_items(prompt: &str) -> Vec<(u64, String)> {
        prompt
            .split(INPUT_DATA_HEADER)
            .nth(1)
            .and_then(|payload| serde_json::from_str::<Vec<PromptItem>>(payload.trim()).ok())
            .map(|items| items.into_iter().map(|item| (item.id, item.text)).collect())
            .unwrap_or_default()
    }

    /// The reply a well-behaved model would give, keeping at most `keep` batch items
    pub fn well_formed_reply(&self, request: &CompletionRequest, keep: usize) -> String {
        let prompt = request.user.as_str();

        if prompt.starts_with(IMAGE_TASK_HEADER) {
            return json!({ "translation": format!("{}image", MOCK_PREFIX) }).to_string();
        }

        if let Some(titles) = prompt.split(TITLES_HEADER).nth(1) {
            let titles: Vec<String> = serde_json::from_str(titles.trim()).unwrap_or_default();
            let map: BTreeMap<String, String> = titles
                .into_iter()
                .map(|title| {
                    let translated = format!("{}{}", MOCK_PREFIX, title);
                    (title, translated)
                })
                .collect();
            return serde_json::to_string(&map).unwrap_or_default();
        }

        if prompt.contains(PAIRS_HEADER) {
            return serde_json::to_string(&self.glossary_terms).unwrap_or_default();
        }

        if let Some(broken) = prompt.split(BROKEN_OUTPUT_HEADER).nth(1) {
            return broken.trim().to_string();
        }

        let items: Vec<_> = Self::batch_items(prompt)
            .into_iter()
            .take(keep)
            .map(|(id, text)| json!({ "id": id, "translation": format!("{}{}", MOCK_PREFIX, text) }))
            .collect();
        serde_json::Value::Array(items).to_string()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(&self, request: CompletionRequest) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());

        if let Some(reply) = self.script.lock().pop_front() {
            return reply;
        }
        if let Some(responder) = &self.responder {
            return responder(&request, count);
        }

        match &self.behavior {
            MockBehavior::Working => Ok(self.well_formed_reply(&request, usize::MAX)),

            MockBehavior::Dropping { keep } => Ok(self.well_formed_reply(&request, *keep)),

            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Ok(self.well_formed_reply(&request, usize::MAX))
                }
            }

            MockBehavior::Failing(error) => Err(error.clone()),

            MockBehavior::Garbage => Ok("I am sorry, I cannot help with that request.".to_string()),

            MockBehavior::Truncated => {
                let full = self.well_formed_reply(&request, usize::MAX);
                Ok(full.chars().take(full.chars().count() / 2).collect())
            }

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(*delay_ms)).await;
                Ok(self.well_formed_reply(&request, usize::MAX))
            }
        }
    }

    fn name(&self) -> &str {
        "Mock"
    }

    fn requires_strict_ordering(&self) -> bool {
        self.strict_ordering
    }
}
