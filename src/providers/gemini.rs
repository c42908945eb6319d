use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Provider, RetryPolicy, http_client, map_send_error, map_status_error};
use crate::errors::ProviderError;

/// Gemini client for the Google Generative Language API
#[derive(Debug)]
pub struct Gemini {
    /// HTTP client for API requests
    client: Client,
    /// API base URL
    endpoint: String,
    /// Model name, e.g. gemini-2.5-flash
    model: String,
    /// Request timeout, reported in timeout errors
    timeout_secs: u64,
    retry: RetryPolicy,
}

/// generateContent request body
#[derive(Debug, Serialize)]
pub struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

/// One conversation turn
#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

/// Text part of a turn
#[derive(Debug, Serialize, Deserialize)]
pub struct GeminiPart {
    #[serde(default)]
    pub text: String,
}

/// generateContent response body
#[derive(Debug, Deserialize)]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

/// A generated candidate
#[derive(Debug, Deserialize)]
pub struct GeminiCandidate {
    pub content: Option<GeminiContent>,
    #[serde(rename = "finishReason")]
    pub finish_reason: Option<String>,
}

impl GeminiRequest {
    /// Single user turn carrying the prompt
    pub fn from_prompt(prompt: impl Into<String>) -> Self {
        Self {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart { text: prompt.into() }],
            }],
        }
    }
}

impl Gemini {
    /// Create a new Gemini client
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, timeout_secs: u64, retry: RetryPolicy) -> Self {
        Self {
            client: http_client(timeout_secs),
            endpoint: endpoint.into(),
            model: model.into(),
            timeout_secs,
            retry,
        }
    }

    fn api_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }

    /// Concatenate the text parts of the first candidate
    pub fn extract_text_from_response(response: &GeminiResponse) -> Option<String> {
        let content = response.candidates.first()?.content.as_ref()?;
        let text: String = content.parts.iter().map(|p| p.text.as_str()).collect();
        Some(text)
    }

    async fn send_once(&self, api_key: &str, request: &GeminiRequest) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(self.api_url())
            .header("Content-Type", "application/json")
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("Gemini API error ({}): {}", status, error_text);
            return Err(map_status_error(status.as_u16(), error_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| map_send_error(e, self.timeout_secs))?;
        let parsed: GeminiResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::ParseError(format!("Invalid Gemini response: {}", e)))?;

        if let Some(reason) = parsed.candidates.first().and_then(|c| c.finish_reason.as_deref()) {
            debug!("Gemini finish reason: {}", reason);
        }

        Self::extract_text_from_response(&parsed)
            .ok_or_else(|| ProviderError::ParseError("Gemini response contained no candidates".to_string()))
    }
}

#[async_trait]
impl Provider for Gemini {
    async fn generate(&self, api_key: &str, prompt: &str) -> Result<String, ProviderError> {
        let request = GeminiRequest::from_prompt(prompt);
        self.retry
            .run("Gemini", || self.send_once(api_key, &request))
            .await
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
