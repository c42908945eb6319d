/*!
 * # srtvocab - vocabulary lists from subtitle files
 *
 * Turns `.srt` subtitle files into a personal vocabulary list with the help
 * of a text-generation service.
 *
 * ## Features
 *
 * - Clean subtitle files down to their unique dialogue lines
 * - Ask a language model for the words worth learning
 * - Skip words the learner already knows
 * - Fetch meanings and example sentences in batches
 * - Rotate through several API keys, one per request
 * - Keep everything in a local SQLite library
 *
 * ## Architecture
 *
 * - `app_config`: Persisted settings document
 * - `settings_manager`: Settings store and API key rotation
 * - `subtitle_processor`: Subtitle decoding and cleaning
 * - `vocabulary`: Extraction, reconciliation and the per-file pipeline
 * - `worker`: Background runs reporting through an event channel
 * - `database`: SQLite storage for files, words and known words
 * - `providers`: Clients for the text-generation services
 * - `export`: Tab-separated export of stored words
 * - `file_utils`: File system operations
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod database;
pub mod errors;
pub mod export;
pub mod file_utils;
pub mod language_utils;
pub mod providers;
pub mod settings_manager;
pub mod subtitle_processor;
pub mod vocabulary;
pub mod worker;

// Re-export main types for easier usage
pub use app_config::Settings;
pub use database::Repository;
pub use errors::{AppError, ProviderError, SettingsError, VocabError};
pub use settings_manager::SettingsManager;
pub use subtitle_processor::SubtitleCleaner;
pub use vocabulary::{ExtractionClient, VocabularyPipeline};
pub use worker::{PipelineEvent, PipelineWorker, ReviewDecision};
