use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::file_utils::FileManager;

/// Application configuration module
/// This module handles the persisted settings document: loading with
/// fallbacks, validating and saving.

/// Default settings file name
pub const DEFAULT_SETTINGS_FILENAME: &str = "settings.json";

/// Represents the persisted settings document
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// API keys, in rotation order
    #[serde(default)]
    pub api_keys: Vec<String>,

    /// UI theme
    #[serde(default)]
    pub theme: Theme,

    /// UI locale
    #[serde(default = "default_language")]
    pub language: String,

    /// Language of the subtitle files
    #[serde(default = "default_srt_language")]
    pub srt_language: String,

    /// Language meanings are requested in
    #[serde(default = "default_translate_language")]
    pub translate_language: String,

    /// Text-generation backend
    #[serde(default)]
    pub provider: ProviderKind,

    /// Model name; empty means the provider default
    #[serde(default = "String::new")]
    pub model: String,

    /// Service URL; empty means the provider default
    #[serde(default = "String::new")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retry count for failed requests
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff in milliseconds, doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Words per meaning request
    #[serde(default = "default_meaning_batch_size")]
    pub meaning_batch_size: usize,

    /// Database file; the user data directory is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_path: Option<PathBuf>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// UI theme
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl std::fmt::Display for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Light => write!(f, "Light"),
            Self::Dark => write!(f, "Dark"),
        }
    }
}

impl std::str::FromStr for Theme {
    type Err = anyhow::Error;

    // Only the two canonical spellings are accepted
    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Light" => Ok(Self::Light),
            "Dark" => Ok(Self::Dark),
            _ => Err(anyhow!("Invalid theme: {} (expected Light or Dark)", s)),
        }
    }
}

/// Text-generation backend
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    // @provider: Google Gemini
    #[default]
    Gemini,
    // @provider: Anthropic
    Anthropic,
}

impl ProviderKind {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Gemini => "Gemini",
            Self::Anthropic => "Anthropic",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.5-flash",
            Self::Anthropic => "claude-3-5-haiku-latest",
        }
    }

    pub fn default_endpoint(&self) -> &'static str {
        match self {
            Self::Gemini => "https://generativelanguage.googleapis.com",
            Self::Anthropic => "https://api.anthropic.com",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::Anthropic => write!(f, "anthropic"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "anthropic" => Ok(Self::Anthropic),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_srt_language() -> String {
    "English".to_string()
}

fn default_translate_language() -> String {
    "Persian".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_retry_count() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    1000 // 1 second base backoff time, doubled on each retry
}

fn default_meaning_batch_size() -> usize {
    crate::vocabulary::DEFAULT_MEANING_BATCH_SIZE
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_keys: Vec::new(),
            theme: Theme::default(),
            language: default_language(),
            srt_language: default_srt_language(),
            translate_language: default_translate_language(),
            provider: ProviderKind::default(),
            model: String::new(),
            endpoint: String::new(),
            timeout_secs: default_timeout_secs(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            meaning_batch_size: default_meaning_batch_size(),
            database_path: None,
            log_level: LogLevel::default(),
        }
    }
}

impl Settings {
    /// Load the settings document at `path`.
    ///
    /// A missing file is created with defaults. A file that cannot be read or
    /// is not a JSON object yields defaults in memory. In a JSON object with
    /// bad fields only those fields fall back to defaults. The file is left
    /// untouched until the next successful save overwrites it.
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            warn!("Settings file not found at {:?}, creating default settings.", path);
            let settings = Self::default();
            settings.save(path)?;
            return Ok(settings);
        }

        let content = match FileManager::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                warn!("{:#}. Falling back to default settings.", e);
                return Ok(Self::default());
            }
        };

        match serde_json::from_str::<Settings>(&content) {
            Ok(settings) => Ok(settings),
            Err(e) => {
                warn!("Failed to parse settings file {:?}: {}", path, e);
                Ok(Self::recover_fields(&content))
            }
        }
    }

    /// Rebuild settings from a document that failed to parse as a whole.
    ///
    /// Each field that deserializes on its own is kept; the rest use defaults.
    /// Text that is not a JSON object yields plain defaults.
    fn recover_fields(content: &str) -> Self {
        let fields = match serde_json::from_str::<Value>(content) {
            Ok(Value::Object(fields)) => fields,
            _ => {
                warn!("Settings file is not a JSON object. Falling back to default settings.");
                return Self::default();
            }
        };

        let mut document = match serde_json::to_value(Self::default()) {
            Ok(Value::Object(document)) => document,
            _ => return Self::default(),
        };

        for (key, value) in fields {
            let previous = document.insert(key.clone(), value);
            if serde_json::from_value::<Settings>(Value::Object(document.clone())).is_err() {
                warn!("Ignoring invalid settings field '{}', using its default", key);
                match previous {
                    Some(previous) => document.insert(key, previous),
                    None => document.remove(&key),
                };
            }
        }

        serde_json::from_value(Value::Object(document)).unwrap_or_default()
    }

    /// Write the whole document as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize settings to JSON")?;
        FileManager::write_to_file(path, &json)
    }

    /// Validate the settings for consistency
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(anyhow!("timeout_secs must be greater than zero"));
        }
        if self.meaning_batch_size == 0 {
            return Err(anyhow!("meaning_batch_size must be greater than zero"));
        }
        if !self.endpoint.is_empty() {
            url::Url::parse(&self.endpoint)
                .with_context(|| format!("Invalid endpoint URL: {}", self.endpoint))?;
        }
        Ok(())
    }

    /// Get the model for the configured provider
    pub fn get_model(&self) -> String {
        if self.model.is_empty() {
            self.provider.default_model().to_string()
        } else {
            self.model.clone()
        }
    }

    /// Get the endpoint for the configured provider
    pub fn get_endpoint(&self) -> String {
        if self.endpoint.is_empty() {
            self.provider.default_endpoint().to_string()
        } else {
            self.endpoint.clone()
        }
    }

    /// Default location of the settings file
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .map(|dir| dir.join("srtvocab").join(DEFAULT_SETTINGS_FILENAME))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILENAME))
    }
}
