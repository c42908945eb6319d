/*!
 * Database module for persistent vocabulary storage.
 *
 * This module provides SQLite-based persistence for:
 * - Subtitle files processed by the pipeline
 * - Words with their encoded meanings, owned by a subtitle file
 * - The known-words set excluded from future review batches
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;

// Re-export main types
pub use connection::DatabaseConnection;
pub use models::{NewWord, SubtitleFileRecord, WordRecord};
pub use repository::Repository;
