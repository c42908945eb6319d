/*!
 * Prompt templates and response parsers for vocabulary extraction.
 *
 * The parsers assume the answer layout the prompts ask for, so both live
 * here and change together. Parsing is best effort: a malformed line is
 * skipped, never turned into an error.
 */

use log::debug;
use std::collections::{HashMap, HashSet};

use crate::language_utils::prompt_language_name;

/// Marker that precedes the subtitle text in an extraction prompt
pub const TEXT_MARKER: &str = "Text:\n\n";

/// Marker that precedes the word lines in a meaning prompt
pub const WORDS_MARKER: &str = "Words:\n\n";

/// Meaning and example sentences for one word
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WordMeaning {
    /// One or more senses, separated by semicolons
    pub meaning: String,
    /// Example sentences separated by hyphens; may be empty
    pub examples: String,
}

impl WordMeaning {
    pub fn new(meaning: impl Into<String>, examples: impl Into<String>) -> Self {
        Self {
            meaning: meaning.into(),
            examples: examples.into(),
        }
    }
}

/// Prompt template for one request kind
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Asks for a comma-separated list of learner-relevant words
    pub const EXTRACT_WORDS: &'static str = "Identify words in the following {source_language} text that are likely \
useful or important for an intermediate language learner. List the words separated by commas. \
Do not include any explanations, only the words. Text:\n\n";

    /// Asks for `word, meaning(s), examples` per input line
    pub const WORD_MEANINGS: &'static str = "Each line in the following input contains one {source_language} word. \
For each word, return its {target_language} meaning(s) and one or more example sentences \
demonstrating its usage in {source_language}. If the word has multiple meanings, list all common \
meanings clearly. Separate the word, its {target_language} meaning(s), and the examples with commas. \
Separate different meanings with a semicolon (;). Separate multiple example sentences with a hyphen (-). \
Do not add any extra explanation. Words:\n\n";

    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    pub fn extract_words() -> Self {
        Self::new(Self::EXTRACT_WORDS)
    }

    pub fn word_meanings() -> Self {
        Self::new(Self::WORD_MEANINGS)
    }

    /// Fill in the language placeholders
    pub fn render(&self, source_language: &str, target_language: &str) -> String {
        self.template
            .replace("{source_language}", &prompt_language_name(source_language))
            .replace("{target_language}", &prompt_language_name(target_language))
    }
}

/// Full extraction prompt for a cleaned text blob
pub fn extraction_prompt(text: &str, source_language: &str) -> String {
    format!("{}{}", PromptTemplate::extract_words().render(source_language, ""), text)
}

/// Full meaning prompt for one chunk of words
pub fn meanings_prompt<S: AsRef<str>>(words: &[S], source_language: &str, target_language: &str) -> String {
    let lines: Vec<&str> = words.iter().map(|w| w.as_ref()).collect();
    format!(
        "{}{}",
        PromptTemplate::word_meanings().render(source_language, target_language),
        lines.join("\n")
    )
}

/// Parse a comma-separated word list.
///
/// Tokens are trimmed and empty ones dropped. Duplicates are removed
/// case-insensitively, keeping the first spelling seen.
pub fn parse_word_list(response: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    response
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter(|token| seen.insert(token.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Parse a single `word, meaning[, examples]` line
pub fn parse_meaning_line(line: &str) -> Option<(String, WordMeaning)> {
    let mut parts = line.splitn(3, ',').map(str::trim);
    let word = parts.next()?;
    let meaning = parts.next()?;
    if word.is_empty() {
        return None;
    }
    let examples = parts.next().unwrap_or_default();
    Some((word.to_string(), WordMeaning::new(meaning, examples)))
}

/// Parse a whole meaning answer, keyed by the word the model echoed
pub fn parse_meanings_response(response: &str) -> HashMap<String, WordMeaning> {
    let mut meanings = HashMap::new();
    for line in response.lines().filter(|l| !l.trim().is_empty()) {
        match parse_meaning_line(line) {
            Some((word, meaning)) => {
                meanings.insert(word, meaning);
            }
            None => debug!("Skipping unparseable meaning line: {:?}", line),
        }
    }
    meanings
}
