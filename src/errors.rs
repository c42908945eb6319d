/*!
 * Error types for the srtvocab application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use thiserror::Error;

/// Errors that can occur when working with provider APIs
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error related to rate limiting
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The request did not complete within the configured timeout
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),
}

impl ProviderError {
    /// Whether another attempt with the same request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ConnectionError(_) | Self::Timeout(_) | Self::RateLimitExceeded(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            Self::RequestFailed(_) | Self::ParseError(_) | Self::AuthenticationError(_) => false,
        }
    }
}

/// Errors produced while persisting settings
#[derive(Error, Debug)]
pub enum SettingsError {
    /// The settings document could not be written
    #[error("Failed to save settings to {path}: {message}")]
    Persistence {
        /// Settings file path
        path: String,
        /// Underlying failure
        message: String,
    },

    /// A value was rejected before any mutation happened
    #[error("Invalid setting value: {0}")]
    InvalidValue(String),
}

/// Failures of a subtitle-to-vocabulary run
#[derive(Error, Debug)]
pub enum VocabError {
    /// The subtitle file could not be read
    #[error("Could not read subtitle file {path}: {message}")]
    FileRead {
        /// File that failed
        path: String,
        /// Underlying failure
        message: String,
    },

    /// Cleaning left no dialogue lines
    #[error("No text found in subtitle file {0}")]
    EmptySubtitle(String),

    /// No API key is configured
    #[error("No API key configured. Add one with `srtvocab keys add <KEY>` and try again")]
    NoCredential,

    /// The language model call failed
    #[error("Word extraction failed: {0}")]
    Extraction(#[from] ProviderError),

    /// The language model answered but no usable word came back
    #[error("No words extracted from text; try a different subtitle file")]
    NoWordsExtracted,

    /// A storage write or read failed
    #[error("Database error: {0}")]
    Persistence(String),

    /// The run was cancelled before it finished
    #[error("Processing cancelled")]
    Cancelled,

    /// Settings could not be saved
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl VocabError {
    /// Wrap a storage-layer failure
    pub fn persistence(error: impl std::fmt::Display) -> Self {
        Self::Persistence(error.to_string())
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from the vocabulary pipeline
    #[error("{0}")]
    Vocab(#[from] VocabError),

    /// Error from the settings layer
    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
