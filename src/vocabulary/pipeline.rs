/*!
 * One subtitle-to-vocabulary run.
 *
 * A run has two halves split by the user's review:
 * 1. `prepare_review`: clean the file, extract words, drop known words
 * 2. `finish`: record newly known words, fetch meanings, store file and words
 *
 * The cancellation token is checked between phases and raced against every
 * provider request. Nothing is written to the store until the final
 * transaction, so a failed or cancelled run leaves no rows behind.
 */

use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::extraction::ExtractionClient;
use super::reconciler::{build_word_rows, encode_meaning, filter_against_known, find_meaning};
use crate::database::Repository;
use crate::errors::VocabError;
use crate::file_utils::FileManager;
use crate::providers::Provider;
use crate::settings_manager::SettingsManager;
use crate::subtitle_processor::SubtitleCleaner;

/// Words awaiting the user's review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewBatch {
    /// Subtitle file the words came from
    pub path: PathBuf,
    /// Name the file is stored under
    pub file_name: String,
    /// Unique dialogue lines after cleaning
    pub line_count: usize,
    /// Extracted words that are not known yet, in extraction order
    pub words: Vec<String>,
}

/// Outcome of a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub file_name: String,
    /// New subtitle file ID; `None` when every word was marked known
    pub subtitle_id: Option<i64>,
    pub words_stored: usize,
    /// Stored words the model returned no meaning for
    pub meanings_missing: usize,
    pub marked_known: usize,
}

/// Result of re-fetching missing meanings for one subtitle file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefetchSummary {
    pub requested: usize,
    pub updated: usize,
}

/// Runs the cleaning, extraction, review and persistence sequence
#[derive(Debug, Clone)]
pub struct VocabularyPipeline {
    client: ExtractionClient,
    repository: Repository,
    batch_size: usize,
    cancel: CancellationToken,
}

impl VocabularyPipeline {
    pub fn new(provider: Arc<dyn Provider>, settings: Arc<SettingsManager>, repository: Repository) -> Self {
        let batch_size = settings.settings().meaning_batch_size;
        Self {
            client: ExtractionClient::new(provider, settings),
            repository,
            batch_size,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.client = self.client.with_cancellation(cancel.clone());
        self.cancel = cancel;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    fn checkpoint(&self) -> Result<(), VocabError> {
        if self.cancel.is_cancelled() {
            return Err(VocabError::Cancelled);
        }
        Ok(())
    }

    /// Clean a subtitle file and extract the words to review.
    ///
    /// Fails with `NoWordsExtracted` if the model returned nothing or every
    /// word is already known.
    pub async fn prepare_review(&self, path: &Path) -> Result<ReviewBatch, VocabError> {
        self.checkpoint()?;

        let owned_path = path.to_path_buf();
        let lines = tokio::task::spawn_blocking(move || SubtitleCleaner::clean_file(&owned_path))
            .await
            .map_err(|e| VocabError::FileRead {
                path: path.display().to_string(),
                message: e.to_string(),
            })??;

        self.checkpoint()?;
        let text = SubtitleCleaner::join_lines(&lines);
        let extracted = self.client.extract_important_words(&text).await?;
        if extracted.is_empty() {
            return Err(VocabError::NoWordsExtracted);
        }

        let known = self
            .repository
            .list_known_words()
            .await
            .map_err(VocabError::persistence)?;
        let words = filter_against_known(&extracted, &known);
        debug!(
            "{} of {} extracted words are already known",
            extracted.len() - words.len(),
            extracted.len()
        );
        if words.is_empty() {
            return Err(VocabError::NoWordsExtracted);
        }

        Ok(ReviewBatch {
            path: path.to_path_buf(),
            file_name: FileManager::display_name(path),
            line_count: lines.len(),
            words,
        })
    }

    /// Finish a reviewed batch.
    ///
    /// `mark_known` words are added to the known set and left out. Meanings are
    /// fetched for the rest, then the file and its words are stored together.
    pub async fn finish(&self, batch: ReviewBatch, mark_known: &[String]) -> Result<RunSummary, VocabError> {
        self.checkpoint()?;

        let marked_known = if mark_known.is_empty() {
            0
        } else {
            self.repository
                .add_known_words(mark_known.to_vec())
                .await
                .map_err(VocabError::persistence)?
        };

        let words = filter_against_known(&batch.words, mark_known);
        if words.is_empty() {
            info!("Every word in {} was marked known, nothing to store", batch.file_name);
            return Ok(RunSummary {
                file_name: batch.file_name,
                subtitle_id: None,
                words_stored: 0,
                meanings_missing: 0,
                marked_known,
            });
        }

        let meanings = self.client.get_word_meanings_batch(&words, self.batch_size).await?;
        let meanings_missing = words.iter().filter(|w| find_meaning(w, &meanings).is_none()).count();
        if meanings_missing > 0 {
            warn!("No meaning returned for {} of {} words", meanings_missing, words.len());
        }

        // Last point where cancelling leaves the store untouched
        self.checkpoint()?;
        let (subtitle_id, words_stored) = self
            .repository
            .insert_subtitle_with_words(&batch.file_name, move |id| build_word_rows(&words, &meanings, id))
            .await
            .map_err(VocabError::persistence)?;

        info!("Stored {} words for {} (id {})", words_stored, batch.file_name, subtitle_id);
        Ok(RunSummary {
            file_name: batch.file_name,
            subtitle_id: Some(subtitle_id),
            words_stored,
            meanings_missing,
            marked_known,
        })
    }

    /// Both halves without a review step
    pub async fn run(&self, path: &Path) -> Result<RunSummary, VocabError> {
        let batch = self.prepare_review(path).await?;
        self.finish(batch, &[]).await
    }

    /// Look up meanings again for words stored blank or as not found
    pub async fn refetch_missing(&self, subtitle_id: i64) -> Result<RefetchSummary, VocabError> {
        self.checkpoint()?;

        let pending = self
            .repository
            .words_needing_meaning(subtitle_id)
            .await
            .map_err(VocabError::persistence)?;
        if pending.is_empty() {
            return Ok(RefetchSummary::default());
        }

        let words: Vec<&str> = pending.iter().map(|w| w.word.as_str()).collect();
        let meanings = self.client.get_word_meanings_batch(&words, self.batch_size).await?;

        self.checkpoint()?;
        let mut updated = 0;
        for record in &pending {
            if let Some(meaning) = find_meaning(&record.word, &meanings) {
                if self
                    .repository
                    .update_word_meaning(record.id, &encode_meaning(meaning))
                    .await
                    .map_err(VocabError::persistence)?
                {
                    updated += 1;
                }
            }
        }

        info!("Updated {} of {} missing meanings", updated, pending.len());
        Ok(RefetchSummary {
            requested: pending.len(),
            updated,
        })
    }
}
