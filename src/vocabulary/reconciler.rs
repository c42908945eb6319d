use std::collections::{HashMap, HashSet};

use super::prompts::WordMeaning;
use crate::database::models::NewWord;

/// Stored in place of a meaning the model did not return
pub const MEANING_NOT_FOUND: &str = "Meaning not found";

const EXAMPLES_SEPARATOR: &str = " | Examples: ";

/// Words not in `known`, compared case-insensitively.
///
/// Order and casing of `words` are preserved. `known` may hold any casing.
pub fn filter_against_known<S, K>(words: &[S], known: &[K]) -> Vec<String>
where
    S: AsRef<str>,
    K: AsRef<str>,
{
    let known: HashSet<String> = known.iter().map(|k| k.as_ref().to_lowercase()).collect();
    words
        .iter()
        .map(|w| w.as_ref())
        .filter(|w| !known.contains(&w.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Encode a meaning and its examples into the stored text
pub fn encode_meaning(meaning: &WordMeaning) -> String {
    format!("{}{}{}", meaning.meaning, EXAMPLES_SEPARATOR, meaning.examples)
}

/// Split stored text back into meaning and examples
pub fn decode_meaning(encoded: &str) -> WordMeaning {
    match encoded.split_once('|') {
        Some((meaning, rest)) => {
            let rest = rest.trim();
            let examples = rest.strip_prefix("Examples:").unwrap_or(rest);
            WordMeaning::new(meaning.trim(), examples.trim())
        }
        None => WordMeaning::new(encoded.trim(), ""),
    }
}

/// Whether a stored meaning should be looked up again
pub fn needs_meaning_refetch(meaning: &str) -> bool {
    let meaning = meaning.trim();
    meaning.is_empty() || meaning.eq_ignore_ascii_case(MEANING_NOT_FOUND)
}

/// Look up a word's meaning, falling back to a case-insensitive match on the echoed key
pub fn find_meaning<'a>(word: &str, meanings: &'a HashMap<String, WordMeaning>) -> Option<&'a WordMeaning> {
    meanings.get(word).or_else(|| {
        let folded = word.to_lowercase();
        meanings
            .iter()
            .find(|(echoed, _)| echoed.to_lowercase() == folded)
            .map(|(_, meaning)| meaning)
    })
}

/// Rows to persist for `words`, in input order
pub fn build_word_rows<S: AsRef<str>>(
    words: &[S],
    meanings: &HashMap<String, WordMeaning>,
    subtitle_id: i64,
) -> Vec<NewWord> {
    words
        .iter()
        .map(|word| {
            let word = word.as_ref();
            let meaning = find_meaning(word, meanings)
                .map(encode_meaning)
                .unwrap_or_else(|| MEANING_NOT_FOUND.to_string());
            NewWord {
                word: word.to_string(),
                meaning,
                srtfile_id: subtitle_id,
            }
        })
        .collect()
}
