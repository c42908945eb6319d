/*!
 * Provider implementations for text-generation services.
 *
 * This module contains client implementations for the supported LLM backends:
 * - Gemini: Google Generative Language API (default)
 * - Anthropic: Anthropic Messages API
 * - Mock: scripted in-process provider for tests and offline runs
 *
 * Every call receives the API key to use, so the caller decides how keys are
 * rotated across requests.
 */

use async_trait::async_trait;
use log::warn;
use std::fmt::Debug;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::app_config::{ProviderKind, Settings};
use crate::errors::ProviderError;

/// Common trait for all text-generation providers
///
/// This trait defines the interface that all provider implementations must follow,
/// allowing them to be used interchangeably by the extraction client.
#[async_trait]
pub trait Provider: Send + Sync + Debug {
    /// Send one prompt and return the generated text
    ///
    /// # Arguments
    /// * `api_key` - Credential for this request
    /// * `prompt` - Full prompt text
    async fn generate(&self, api_key: &str, prompt: &str) -> Result<String, ProviderError>;

    /// Short provider name for logs
    fn name(&self) -> &str;
}

/// Retry behaviour shared by the HTTP providers
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Base backoff time in milliseconds for exponential backoff
    pub backoff_base_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base_ms: u64) -> Self {
        Self { max_retries, backoff_base_ms }
    }

    /// Run `attempt` until it succeeds, fails permanently, or retries run out
    pub async fn run<F, Fut, T>(&self, provider: &str, mut attempt: F) -> Result<T, ProviderError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut tries = 0;
        loop {
            match attempt().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && tries < self.max_retries => {
                    tries += 1;
                    let backoff_ms = self.backoff_base_ms * (1u64 << (tries - 1));
                    warn!(
                        "{} request failed: {} - retrying in {}ms (attempt {}/{})",
                        provider, e, backoff_ms, tries + 1, self.max_retries + 1
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Build an HTTP client with the configured request timeout
pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .unwrap_or_default()
}

/// Map a transport-level reqwest failure
pub(crate) fn map_send_error(error: reqwest::Error, timeout_secs: u64) -> ProviderError {
    if error.is_timeout() {
        ProviderError::Timeout(timeout_secs)
    } else if error.is_connect() {
        ProviderError::ConnectionError(error.to_string())
    } else {
        ProviderError::RequestFailed(error.to_string())
    }
}

/// Map a non-success HTTP status and its body
pub(crate) fn map_status_error(status_code: u16, body: String) -> ProviderError {
    match status_code {
        401 | 403 => ProviderError::AuthenticationError(body),
        429 => ProviderError::RateLimitExceeded(body),
        // Gemini reports a bad key as 400 INVALID_ARGUMENT
        400 if body.contains("API_KEY_INVALID") => ProviderError::AuthenticationError(body),
        _ => ProviderError::ApiError { status_code, message: body },
    }
}

/// Create the provider selected in the settings
pub fn create_provider(settings: &Settings) -> Arc<dyn Provider> {
    let retry = RetryPolicy::new(settings.retry_count, settings.retry_backoff_ms);
    match settings.provider {
        ProviderKind::Gemini => Arc::new(gemini::Gemini::new(
            settings.get_endpoint(),
            settings.get_model(),
            settings.timeout_secs,
            retry,
        )),
        ProviderKind::Anthropic => Arc::new(anthropic::Anthropic::new(
            settings.get_endpoint(),
            settings.get_model(),
            settings.timeout_secs,
            retry,
        )),
    }
}

pub mod anthropic;
pub mod gemini;
pub mod mock;
