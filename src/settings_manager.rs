/*!
 * Settings manager with API key rotation.
 *
 * Owns the in-memory settings document together with the rotation cursor.
 * Every mutation writes the full document back to disk immediately. One lock
 * covers the key list and the cursor so concurrent pipeline runs serialize
 * their `next_api_key` calls.
 */

use log::{debug, error, info};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

use crate::app_config::{Settings, Theme};
use crate::errors::{SettingsError, VocabError};

struct State {
    settings: Settings,
    cursor: usize,
}

/// Thread-safe settings store and round-robin credential rotator
pub struct SettingsManager {
    path: PathBuf,
    state: Mutex<State>,
}

impl SettingsManager {
    /// Load (or create) the settings file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let settings = Settings::load_or_create(&path)?;
        Ok(Self::with_settings(path, settings))
    }

    /// Wrap already-loaded settings; nothing is written until the first mutation
    pub fn with_settings<P: AsRef<Path>>(path: P, settings: Settings) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: Mutex::new(State { settings, cursor: 0 }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Snapshot of the current settings
    pub fn settings(&self) -> Settings {
        self.state.lock().settings.clone()
    }

    // =========================================================================
    // API keys
    // =========================================================================

    /// Append a key.
    ///
    /// Returns `Ok(false)` without mutating anything when the trimmed key is
    /// empty or already present (exact match).
    pub fn add_api_key(&self, api_key: &str) -> Result<bool, SettingsError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Ok(false);
        }

        let mut state = self.state.lock();
        if state.settings.api_keys.iter().any(|k| k == api_key) {
            debug!("API key already configured, not adding it again");
            return Ok(false);
        }

        state.settings.api_keys.push(api_key.to_string());
        info!("Added API key #{}", state.settings.api_keys.len());
        self.persist(&state.settings)?;
        Ok(true)
    }

    /// Remove a key. Returns `Ok(false)` if it was not configured.
    pub fn remove_api_key(&self, api_key: &str) -> Result<bool, SettingsError> {
        let mut state = self.state.lock();
        let Some(position) = state.settings.api_keys.iter().position(|k| k == api_key) else {
            return Ok(false);
        };

        state.settings.api_keys.remove(position);
        if state.cursor >= state.settings.api_keys.len() {
            state.cursor = 0;
        }
        info!("Removed API key, {} remaining", state.settings.api_keys.len());
        self.persist(&state.settings)?;
        Ok(true)
    }

    /// Hand out the key under the cursor and advance the cursor
    pub fn next_api_key(&self) -> Result<String, VocabError> {
        let mut state = self.state.lock();
        let len = state.settings.api_keys.len();
        if len == 0 {
            return Err(VocabError::NoCredential);
        }

        let index = state.cursor;
        let key = state.settings.api_keys[index].clone();
        state.cursor = (index + 1) % len;
        debug!("Using API key #{} of {}", index + 1, len);
        Ok(key)
    }

    pub fn api_key_count(&self) -> usize {
        self.state.lock().settings.api_keys.len()
    }

    pub fn has_api_keys(&self) -> bool {
        self.api_key_count() > 0
    }

    /// Keys in rotation order
    pub fn api_keys(&self) -> Vec<String> {
        self.state.lock().settings.api_keys.clone()
    }

    /// Keys in rotation order, masked for display
    pub fn masked_api_keys(&self) -> Vec<String> {
        self.api_keys().iter().map(|k| mask_api_key(k)).collect()
    }

    /// Current rotation cursor
    pub fn cursor(&self) -> usize {
        self.state.lock().cursor
    }

    // =========================================================================
    // Preferences
    // =========================================================================

    pub fn theme(&self) -> Theme {
        self.state.lock().settings.theme
    }

    pub fn set_theme(&self, theme: Theme) -> Result<(), SettingsError> {
        self.update(|settings| settings.theme = theme)
    }

    pub fn language(&self) -> String {
        self.state.lock().settings.language.clone()
    }

    pub fn set_language(&self, language: &str) -> Result<(), SettingsError> {
        let language = Self::non_empty(language, "language")?;
        self.update(|settings| settings.language = language)
    }

    pub fn srt_language(&self) -> String {
        self.state.lock().settings.srt_language.clone()
    }

    pub fn set_srt_language(&self, language: &str) -> Result<(), SettingsError> {
        let language = Self::non_empty(language, "srt_language")?;
        self.update(|settings| settings.srt_language = language)
    }

    pub fn translate_language(&self) -> String {
        self.state.lock().settings.translate_language.clone()
    }

    pub fn set_translate_language(&self, language: &str) -> Result<(), SettingsError> {
        let language = Self::non_empty(language, "translate_language")?;
        self.update(|settings| settings.translate_language = language)
    }

    fn non_empty(value: &str, field: &str) -> Result<String, SettingsError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(SettingsError::InvalidValue(format!("{} cannot be empty", field)));
        }
        Ok(value.to_string())
    }

    fn update(&self, mutate: impl FnOnce(&mut Settings)) -> Result<(), SettingsError> {
        let mut state = self.state.lock();
        mutate(&mut state.settings);
        self.persist(&state.settings)
    }

    // Called with the lock held so writes land in mutation order
    fn persist(&self, settings: &Settings) -> Result<(), SettingsError> {
        settings.save(&self.path).map_err(|e| {
            error!("Error saving settings: {:#}", e);
            SettingsError::Persistence {
                path: self.path.display().to_string(),
                message: format!("{:#}", e),
            }
        })
    }
}

impl std::fmt::Debug for SettingsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsManager")
            .field("path", &self.path)
            .field("api_keys", &self.api_key_count())
            .finish()
    }
}

/// Mask a key for display: first 4 and last 4 characters visible
pub fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 8), tail)
}
