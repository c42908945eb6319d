/*!
 * Mock provider implementations for testing and offline runs.
 *
 * The mock recognizes the two prompt kinds built by `vocabulary::prompts`:
 * - word extraction: answers with a comma-separated word list
 * - meaning lookup: answers one `word, meaning, examples` line per input word
 *
 * Behaviors:
 * - `MockProvider::working()` - Always succeeds
 * - `MockProvider::intermittent(n)` - Fails every nth request
 * - `MockProvider::failing()` - Always fails with an error
 * - `MockProvider::empty()` - Succeeds with an empty answer
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::ProviderError;
use crate::providers::Provider;
use crate::vocabulary::prompts::{TEXT_MARKER, WORDS_MARKER};

/// One recorded call
#[derive(Debug, Clone, PartialEq)]
pub struct MockCall {
    /// Credential the caller passed
    pub api_key: String,
    /// Full prompt text
    pub prompt: String,
}

/// Behavior mode for the mock provider
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds
    Working,
    /// Fails intermittently (every Nth request)
    Intermittent { fail_every: usize },
    /// Always fails with a server error
    Failing,
    /// Always fails with an authentication error
    Unauthorized,
    /// Returns an empty response
    Empty,
    /// Simulates slow responses (for timeout and cancellation testing)
    Slow { delay_ms: u64 },
}

/// Mock provider for exercising the extraction pipeline
#[derive(Debug, Clone)]
pub struct MockProvider {
    behavior: MockBehavior,
    /// Request counter, shared between clones
    request_count: Arc<AtomicUsize>,
    calls: Arc<Mutex<Vec<MockCall>>>,
    /// Words returned for extraction prompts; `None` echoes the text's words
    extracted_words: Option<Vec<String>>,
    /// Words the meaning answer leaves out
    unknown_words: Vec<String>,
    custom_response: Option<fn(&str) -> String>,
}

impl MockProvider {
    /// Create a new mock provider with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            request_count: Arc::new(AtomicUsize::new(0)),
            calls: Arc::new(Mutex::new(Vec::new())),
            extracted_words: None,
            unknown_words: Vec::new(),
            custom_response: None,
        }
    }

    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    pub fn intermittent(fail_every: usize) -> Self {
        Self::new(MockBehavior::Intermittent { fail_every: fail_every.max(1) })
    }

    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    pub fn unauthorized() -> Self {
        Self::new(MockBehavior::Unauthorized)
    }

    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Fix the word list returned for extraction prompts
    pub fn with_extracted_words<S: AsRef<str>>(mut self, words: &[S]) -> Self {
        self.extracted_words = Some(words.iter().map(|w| w.as_ref().to_string()).collect());
        self
    }

    /// Leave these words out of meaning answers
    pub fn with_unknown_words<S: AsRef<str>>(mut self, words: &[S]) -> Self {
        self.unknown_words = words.iter().map(|w| w.as_ref().to_lowercase()).collect();
        self
    }

    /// Set a custom response generator
    pub fn with_custom_response(mut self, generator: fn(&str) -> String) -> Self {
        self.custom_response = Some(generator);
        self
    }

    /// Number of requests received so far
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::SeqCst)
    }

    /// Calls received so far, in arrival order
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Credentials used so far, in arrival order
    pub fn api_keys_used(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.api_key.clone()).collect()
    }

    /// The `word, meaning, examples` line the mock answers for `word`
    pub fn meaning_line(word: &str) -> String {
        format!("{}, meaning of {}, I use {} daily - {} again", word, word, word, word)
    }

    fn answer(&self, prompt: &str) -> String {
        if let Some(generator) = self.custom_response {
            return generator(prompt);
        }

        if let Some((_, words)) = prompt.split_once(WORDS_MARKER) {
            return words
                .lines()
                .map(str::trim)
                .filter(|w| !w.is_empty())
                .filter(|w| !self.unknown_words.contains(&w.to_lowercase()))
                .map(Self::meaning_line)
                .collect::<Vec<_>>()
                .join("\n");
        }

        let text = prompt.split_once(TEXT_MARKER).map(|(_, text)| text).unwrap_or(prompt);
        match &self.extracted_words {
            Some(words) => words.join(", "),
            None => text
                .split(|c: char| !c.is_alphabetic())
                .filter(|w| w.chars().count() > 3)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn generate(&self, api_key: &str, prompt: &str) -> Result<String, ProviderError> {
        let count = self.request_count.fetch_add(1, Ordering::SeqCst);
        self.calls.lock().push(MockCall {
            api_key: api_key.to_string(),
            prompt: prompt.to_string(),
        });

        match self.behavior {
            MockBehavior::Working => Ok(self.answer(prompt)),

            MockBehavior::Intermittent { fail_every } => {
                if count % fail_every == fail_every - 1 {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated intermittent failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Ok(self.answer(prompt))
                }
            }

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),

            MockBehavior::Unauthorized => Err(ProviderError::AuthenticationError(
                "API key not valid".to_string(),
            )),

            MockBehavior::Empty => Ok(String::new()),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                Ok(self.answer(prompt))
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
