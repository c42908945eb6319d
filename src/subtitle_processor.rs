use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

use crate::errors::VocabError;
use crate::file_utils::FileManager;

// @module: Subtitle text cleaning

// @const: SRT cue timing at line start; anything may follow
static TIMESTAMP_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{2}:\d{2}:\d{2},\d{3}").expect("valid timestamp regex")
});

// @const: Markup tag such as <i>, </font> or <font color="red">
static TAG_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid tag regex"));

/// Turns raw subtitle files into unique dialogue lines
pub struct SubtitleCleaner;

impl SubtitleCleaner {
    /// Decode subtitle bytes as UTF-8, falling back to Latin-1.
    ///
    /// Latin-1 maps every byte to a character, so this never fails. A leading
    /// byte-order mark is dropped.
    pub fn decode(bytes: &[u8]) -> String {
        let text = match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(e) => {
                warn!("Subtitle is not valid UTF-8 ({}), decoding as Latin-1", e);
                bytes.iter().map(|&b| b as char).collect()
            }
        };
        match text.strip_prefix('\u{feff}') {
            Some(stripped) => stripped.to_string(),
            None => text,
        }
    }

    /// Read and clean a subtitle file.
    ///
    /// Fails with `FileRead` if the file cannot be read and with
    /// `EmptySubtitle` if no dialogue survives cleaning.
    pub fn clean_file<P: AsRef<Path>>(path: P) -> Result<Vec<String>, VocabError> {
        let path = path.as_ref();
        let bytes = FileManager::read_bytes(path).map_err(|e| VocabError::FileRead {
            path: path.display().to_string(),
            message: format!("{:#}", e),
        })?;

        let lines = Self::clean_text(&Self::decode(&bytes));
        debug!("Cleaned {:?}: {} unique dialogue lines", path, lines.len());

        if lines.is_empty() {
            return Err(VocabError::EmptySubtitle(FileManager::display_name(path)));
        }
        Ok(lines)
    }

    /// Clean already-decoded subtitle text.
    ///
    /// `\r\n`, bare `\r` and `\n` all end a line.
    pub fn clean_text(content: &str) -> Vec<String> {
        Self::clean_lines(content.split(['\r', '\n']))
    }

    /// Clean a sequence of physical lines, keeping the first occurrence of each
    pub fn clean_lines<I, S>(lines: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut cleaned = Vec::new();

        for line in lines {
            let line = line.as_ref().trim();
            if Self::is_noise(line) {
                continue;
            }

            let stripped = TAG_REGEX.replace_all(line, "");
            let stripped = stripped.trim();
            // Markup-only lines or tags wrapped around a counter
            if Self::is_noise(stripped) {
                continue;
            }

            if seen.insert(stripped.to_string()) {
                cleaned.push(stripped.to_string());
            }
        }

        cleaned
    }

    /// Join cleaned lines into the single blob sent for extraction
    pub fn join_lines(lines: &[String]) -> String {
        lines.join(" ")
    }

    fn is_noise(line: &str) -> bool {
        line.is_empty() || TIMESTAMP_REGEX.is_match(line) || Self::is_sequence_number(line)
    }

    fn is_sequence_number(line: &str) -> bool {
        line.chars().all(|c| c.is_ascii_digit())
    }
}
