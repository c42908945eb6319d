/*!
 * Database entity models.
 *
 * These structures map directly to database tables and provide
 * type-safe access to persisted data.
 */

use serde::{Deserialize, Serialize};

use crate::vocabulary::WordMeaning;
use crate::vocabulary::reconciler::{decode_meaning, needs_meaning_refetch};

/// Subtitle file record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleFileRecord {
    /// Database ID
    pub id: i64,
    /// Display name
    pub name: String,
}

/// Word record as stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordRecord {
    /// Database ID
    pub id: i64,
    /// Word as extracted, not case-normalized
    pub word: String,
    /// Encoded meaning and examples
    pub meaning: String,
    /// Owning subtitle file, if any
    pub srtfile_id: Option<i64>,
}

impl WordRecord {
    /// Meaning split into its parts
    pub fn decoded(&self) -> WordMeaning {
        decode_meaning(&self.meaning)
    }

    /// Whether the meaning is missing and should be looked up again
    pub fn needs_refetch(&self) -> bool {
        needs_meaning_refetch(&self.meaning)
    }
}

/// Word row to insert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWord {
    pub word: String,
    pub meaning: String,
    pub srtfile_id: i64,
}
