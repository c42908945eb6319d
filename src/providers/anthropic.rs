use async_trait::async_trait;
use log::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Provider, RetryPolicy, http_client, map_send_error, map_status_error};
use crate::errors::ProviderError;

/// Anthropic client for the Messages API
#[derive(Debug)]
pub struct Anthropic {
    /// HTTP client for API requests
    client: Client,
    /// API endpoint URL
    endpoint: String,
    /// Model name
    model: String,
    timeout_secs: u64,
    retry: RetryPolicy,
}

/// Anthropic message request
#[derive(Debug, Serialize)]
pub struct AnthropicRequest {
    /// The model to use
    model: String,

    /// The messages for the conversation
    messages: Vec<AnthropicMessage>,

    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,

    /// Maximum number of tokens to generate
    max_tokens: u32,
}

/// Anthropic message format
#[derive(Debug, Serialize, Deserialize)]
pub struct AnthropicMessage {
    /// Role of the message sender (user, assistant)
    pub role: String,

    /// Content of the message
    pub content: String,
}

/// Anthropic response
#[derive(Debug, Deserialize)]
pub struct AnthropicResponse {
    /// The content of the response
    pub content: Vec<AnthropicContent>,
}

/// Individual content block in an Anthropic response
#[derive(Debug, Deserialize)]
pub struct AnthropicContent {
    /// The type of content
    #[serde(rename = "type")]
    pub content_type: String,

    /// The actual text content
    #[serde(default)]
    pub text: String,
}

impl AnthropicRequest {
    /// Create a new Anthropic request
    pub fn new(model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: Some(0.2),
            max_tokens,
        }
    }

    /// Add a message to the request
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(AnthropicMessage {
            role: role.into(),
            content: content.into(),
        });
        self
    }
}

impl Anthropic {
    /// Create a new Anthropic client
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
        if self.endpoint.is_empty() {
            "https://api.anthropic.com/v1/messages".to_string()
        } else {
            format!("{}/v1/messages", self.endpoint.trim_end_matches('/'))
        }
    }

    /// Extract text from Anthropic response
    pub fn extract_text_from_response(response: &AnthropicResponse) -> String {
        response
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text.as_str())
            .collect()
    }

    async fn send_once(&self, api_key: &str, request: &AnthropicRequest) -> Result<String, ProviderError> {
        let response = self
            .client
            .post(self.api_url())
            .header("Content-Type", "application/json")
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
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
            error!("Anthropic API error ({}): {}", status, error_text);
            return Err(map_status_error(status.as_u16(), error_text));
        }

        let body = response
            .text()
            .await
            .map_err(|e| map_send_error(e, self.timeout_secs))?;
        let parsed: AnthropicResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::ParseError(format!("Invalid Anthropic response: {}", e)))?;

        Ok(Self::extract_text_from_response(&parsed))
    }
}

#[async_trait]
impl Provider for Anthropic {
    async fn generate(&self, api_key: &str, prompt: &str) -> Result<String, ProviderError> {
        let request = AnthropicRequest::new(&self.model, 4096).add_message("user", prompt);
        self.retry
            .run("Anthropic", || self.send_once(api_key, &request))
            .await
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
