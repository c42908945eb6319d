/*!
 * Repository layer for database operations.
 *
 * This module provides a high-level API for all database operations,
 * abstracting away the SQL details and providing type-safe access.
 */

use anyhow::Result;
use log::debug;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

use super::connection::{DatabaseConnection, DatabaseStats};
use super::models::{NewWord, SubtitleFileRecord, WordRecord};
use crate::vocabulary::MEANING_NOT_FOUND;

const WORD_COLUMNS: &str = "id, word, meaning, srtfile";

/// Repository for database operations
#[derive(Clone, Debug)]
pub struct Repository {
    /// Database connection
    db: DatabaseConnection,
}

impl Repository {
    /// Create a new repository with the given database connection
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a repository with the default database location
    pub fn new_default() -> Result<Self> {
        let db = DatabaseConnection::new_default()?;
        Ok(Self::new(db))
    }

    /// Open (or create) the database file at `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(DatabaseConnection::new(path)?))
    }

    /// Create a repository with an in-memory database (for testing)
    pub fn new_in_memory() -> Result<Self> {
        let db = DatabaseConnection::new_in_memory()?;
        Ok(Self::new(db))
    }

    /// Repository over its own connection to the same database, for one run
    pub fn isolated(&self) -> Result<Self> {
        Ok(Self::new(self.db.isolated()?))
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    pub fn stats(&self) -> Result<DatabaseStats> {
        self.db.stats()
    }

    // =========================================================================
    // Subtitle File Operations
    // =========================================================================

    /// Insert a subtitle file and return its new ID
    pub async fn add_subtitle_file(&self, name: &str) -> Result<i64> {
        let name = name.to_string();

        self.db
            .execute_async(move |conn| {
                conn.execute("INSERT INTO srtfiles (srtfile) VALUES (?1)", [&name])?;
                Ok(conn.last_insert_rowid())
            })
            .await
    }

    /// All subtitle files, most recent first
    pub async fn list_subtitle_files(&self) -> Result<Vec<SubtitleFileRecord>> {
        self.db
            .execute_async(|conn| {
                let mut stmt = conn.prepare("SELECT id, srtfile FROM srtfiles ORDER BY id DESC")?;
                let files = stmt
                    .query_map([], |row| {
                        Ok(SubtitleFileRecord {
                            id: row.get(0)?,
                            name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(files)
            })
            .await
    }

    /// Get a subtitle file by ID
    pub async fn get_subtitle_file(&self, id: i64) -> Result<Option<SubtitleFileRecord>> {
        self.db
            .execute_async(move |conn| {
                let file = conn
                    .query_row("SELECT id, srtfile FROM srtfiles WHERE id = ?1", [id], |row| {
                        Ok(SubtitleFileRecord {
                            id: row.get(0)?,
                            name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        })
                    })
                    .optional()?;
                Ok(file)
            })
            .await
    }

    /// Delete a subtitle file together with its words.
    ///
    /// Words are deleted explicitly as well, so databases created without the
    /// cascading foreign key behave the same. Returns false if no file had that ID.
    pub async fn delete_subtitle_file(&self, id: i64) -> Result<bool> {
        self.db
            .transaction_async(move |tx| {
                let words = tx.execute("DELETE FROM words WHERE srtfile = ?1", [id])?;
                let files = tx.execute("DELETE FROM srtfiles WHERE id = ?1", [id])?;
                debug!("Deleted subtitle file {} with {} words", id, words);
                Ok(files > 0)
            })
            .await
    }

    /// Insert a subtitle file and its words in one transaction.
    ///
    /// `build_rows` receives the new file ID. Nothing is stored if any insert fails.
    pub async fn insert_subtitle_with_words<F>(&self, name: &str, build_rows: F) -> Result<(i64, usize)>
    where
        F: FnOnce(i64) -> Vec<NewWord> + Send + 'static,
    {
        let name = name.to_string();

        self.db
            .transaction_async(move |tx| {
                tx.execute("INSERT INTO srtfiles (srtfile) VALUES (?1)", [&name])?;
                let id = tx.last_insert_rowid();
                let rows = build_rows(id);
                let inserted = Self::insert_words_sync(tx, &rows)?;
                Ok((id, inserted))
            })
            .await
    }

    // =========================================================================
    // Word Operations
    // =========================================================================

    /// Insert one word and return its new ID
    pub async fn add_word(&self, word: &NewWord) -> Result<i64> {
        let word = word.clone();

        self.db
            .execute_async(move |conn| {
                conn.execute(
                    "INSERT INTO words (word, meaning, srtfile) VALUES (?1, ?2, ?3)",
                    params![word.word, word.meaning, word.srtfile_id],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
    }

    /// Insert words in a single transaction
    pub async fn add_words_batch(&self, words: Vec<NewWord>) -> Result<usize> {
        if words.is_empty() {
            return Ok(0);
        }

        self.db
            .transaction_async(move |tx| Self::insert_words_sync(tx, &words))
            .await
    }

    fn insert_words_sync(conn: &Connection, words: &[NewWord]) -> Result<usize> {
        let mut stmt = conn.prepare("INSERT INTO words (word, meaning, srtfile) VALUES (?1, ?2, ?3)")?;
        for word in words {
            stmt.execute(params![word.word, word.meaning, word.srtfile_id])?;
        }
        Ok(words.len())
    }

    /// Words of one subtitle file, alphabetical
    pub async fn words_by_subtitle(&self, srtfile_id: i64) -> Result<Vec<WordRecord>> {
        self.query_words(
            format!("SELECT {} FROM words WHERE srtfile = ?1 ORDER BY word", WORD_COLUMNS),
            vec![srtfile_id.into()],
        )
        .await
    }

    /// Every stored word, alphabetical
    pub async fn all_words(&self) -> Result<Vec<WordRecord>> {
        self.query_words(format!("SELECT {} FROM words ORDER BY word", WORD_COLUMNS), vec![])
            .await
    }

    /// Words containing `query`
    pub async fn search_words(&self, query: &str) -> Result<Vec<WordRecord>> {
        let pattern = format!("%{}%", query.trim());
        self.query_words(
            format!("SELECT {} FROM words WHERE word LIKE ?1 ORDER BY word", WORD_COLUMNS),
            vec![pattern.into()],
        )
        .await
    }

    /// Words of a subtitle file whose meaning is blank or the not-found marker
    pub async fn words_needing_meaning(&self, srtfile_id: i64) -> Result<Vec<WordRecord>> {
        self.query_words(
            format!(
                "SELECT {} FROM words WHERE srtfile = ?1 \
                 AND (meaning IS NULL OR TRIM(meaning) = '' OR LOWER(TRIM(meaning)) = LOWER(?2)) \
                 ORDER BY word",
                WORD_COLUMNS
            ),
            vec![srtfile_id.into(), MEANING_NOT_FOUND.to_string().into()],
        )
        .await
    }

    async fn query_words(&self, sql: String, values: Vec<rusqlite::types::Value>) -> Result<Vec<WordRecord>> {
        self.db
            .execute_async(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let words = stmt
                    .query_map(rusqlite::params_from_iter(values.iter()), |row| {
                        Ok(WordRecord {
                            id: row.get(0)?,
                            word: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                            meaning: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                            srtfile_id: row.get(3)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(words)
            })
            .await
    }

    /// Replace a word's stored meaning; false if the word does not exist
    pub async fn update_word_meaning(&self, word_id: i64, meaning: &str) -> Result<bool> {
        let meaning = meaning.to_string();

        self.db
            .execute_async(move |conn| {
                let changed = conn.execute(
                    "UPDATE words SET meaning = ?1 WHERE id = ?2",
                    params![meaning, word_id],
                )?;
                Ok(changed > 0)
            })
            .await
    }

    /// Number of words stored for a subtitle file
    pub async fn count_words(&self, srtfile_id: i64) -> Result<i64> {
        self.db
            .execute_async(move |conn| {
                Ok(conn.query_row(
                    "SELECT COUNT(*) FROM words WHERE srtfile = ?1",
                    [srtfile_id],
                    |row| row.get(0),
                )?)
            })
            .await
    }

    // =========================================================================
    // Known Word Operations
    // =========================================================================

    /// Mark a word as known. Returns false if it already was (or is blank).
    pub async fn add_known_word(&self, word: &str) -> Result<bool> {
        let word = word.trim().to_lowercase();
        if word.is_empty() {
            return Ok(false);
        }

        self.db
            .execute_async(move |conn| {
                let inserted = conn.execute("INSERT OR IGNORE INTO known_words (word) VALUES (?1)", [&word])?;
                Ok(inserted > 0)
            })
            .await
    }

    /// Mark several words as known in one transaction; returns how many were new
    pub async fn add_known_words(&self, words: Vec<String>) -> Result<usize> {
        self.db
            .transaction_async(move |tx| {
                let mut stmt = tx.prepare("INSERT OR IGNORE INTO known_words (word) VALUES (?1)")?;
                let mut added = 0;
                for word in words.iter().map(|w| w.trim().to_lowercase()).filter(|w| !w.is_empty()) {
                    added += stmt.execute([&word])?;
                }
                Ok(added)
            })
            .await
    }

    /// Unmark a known word. Returns false if it was not known.
    pub async fn remove_known_word(&self, word: &str) -> Result<bool> {
        let word = word.trim().to_lowercase();

        self.db
            .execute_async(move |conn| {
                let removed = conn.execute("DELETE FROM known_words WHERE word = ?1", [&word])?;
                Ok(removed > 0)
            })
            .await
    }

    /// All known words, alphabetical
    pub async fn list_known_words(&self) -> Result<Vec<String>> {
        self.db
            .execute_async(|conn| {
                let mut stmt = conn.prepare("SELECT word FROM known_words ORDER BY word")?;
                let words = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(words)
            })
            .await
    }

    /// Known words containing `query` (case-insensitive)
    pub async fn filter_known_words(&self, query: &str) -> Result<Vec<String>> {
        let query = query.trim().to_lowercase();
        let words = self.list_known_words().await?;
        Ok(words.into_iter().filter(|w| w.contains(&query)).collect())
    }

    /// Case-insensitive membership check
    pub async fn is_word_known(&self, word: &str) -> Result<bool> {
        let word = word.trim().to_lowercase();

        self.db
            .execute_async(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM known_words WHERE word = ?1",
                    [&word],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await
    }
}
