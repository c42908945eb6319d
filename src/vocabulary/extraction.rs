/*!
 * Extraction client: word extraction and meaning lookup over a provider.
 *
 * Every request takes its credential from the shared rotator, so meaning
 * chunks are spread across all configured keys. Cancellation is checked
 * before each request and races every in-flight request.
 */

use log::{debug, info};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::prompts::{self, WordMeaning};
use crate::errors::VocabError;
use crate::providers::Provider;
use crate::settings_manager::SettingsManager;

/// Words per meaning request when nothing else is configured
pub const DEFAULT_MEANING_BATCH_SIZE: usize = 50;

/// Client for the two vocabulary request kinds
#[derive(Debug, Clone)]
pub struct ExtractionClient {
    provider: Arc<dyn Provider>,
    settings: Arc<SettingsManager>,
    cancel: CancellationToken,
}

impl ExtractionClient {
    pub fn new(provider: Arc<dyn Provider>, settings: Arc<SettingsManager>) -> Self {
        Self {
            provider,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort in-flight and future requests when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Ask the model for learner-relevant words in `text`.
    ///
    /// An empty result is not an error; the caller decides what no words means.
    pub async fn extract_important_words(&self, text: &str) -> Result<Vec<String>, VocabError> {
        let prompt = prompts::extraction_prompt(text, &self.settings.srt_language());
        debug!("Extraction prompt built for {} characters of text", text.chars().count());

        let response = self.send(&prompt).await?;
        let words = prompts::parse_word_list(&response);
        info!("Extracted {} unique words", words.len());
        Ok(words)
    }

    /// Look up meanings for a single chunk of words
    pub async fn get_word_meanings<S: AsRef<str>>(
        &self,
        words: &[S],
    ) -> Result<HashMap<String, WordMeaning>, VocabError> {
        if words.is_empty() {
            return Ok(HashMap::new());
        }

        let prompt = prompts::meanings_prompt(
            words,
            &self.settings.srt_language(),
            &self.settings.translate_language(),
        );
        let response = self.send(&prompt).await?;
        let meanings = prompts::parse_meanings_response(&response);
        debug!("Parsed {} meanings for {} requested words", meanings.len(), words.len());
        Ok(meanings)
    }

    /// Look up meanings in chunks of `batch_size`, issued in list order.
    ///
    /// The first failing chunk aborts the whole lookup.
    pub async fn get_word_meanings_batch<S: AsRef<str>>(
        &self,
        words: &[S],
        batch_size: usize,
    ) -> Result<HashMap<String, WordMeaning>, VocabError> {
        let batch_size = batch_size.max(1);
        let total_chunks = words.len().div_ceil(batch_size);
        let mut all_meanings = HashMap::new();

        for (index, chunk) in words.chunks(batch_size).enumerate() {
            debug!("Requesting meanings for chunk {}/{} ({} words)", index + 1, total_chunks, chunk.len());
            all_meanings.extend(self.get_word_meanings(chunk).await?);
        }

        Ok(all_meanings)
    }

    async fn send(&self, prompt: &str) -> Result<String, VocabError> {
        if self.cancel.is_cancelled() {
            return Err(VocabError::Cancelled);
        }

        let api_key = self.settings.next_api_key()?;
        tokio::select! {
            _ = self.cancel.cancelled() => Err(VocabError::Cancelled),
            response = self.provider.generate(&api_key, prompt) => Ok(response?),
        }
    }
}
