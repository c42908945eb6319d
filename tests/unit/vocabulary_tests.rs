/*!
 * Tests for prompt building, answer parsing and known-word reconciliation
 */

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, HashSet};

use srtvocab::vocabulary::prompts::{
    TEXT_MARKER, WORDS_MARKER, WordMeaning, extraction_prompt, meanings_prompt, parse_meanings_response,
    parse_word_list,
};
use srtvocab::vocabulary::reconciler::encode_meaning;
use srtvocab::vocabulary::{MEANING_NOT_FOUND, build_word_rows, decode_meaning, filter_against_known, needs_meaning_refetch};

/// The extraction prompt names the language and ends with the text
#[test]
fn test_extractionPrompt_shouldEmbedLanguageAndText() {
    let prompt = extraction_prompt("The brave knight", "en");

    assert!(prompt.contains("following English text"));
    assert!(prompt.ends_with(&format!("{}The brave knight", TEXT_MARKER)));
}

/// Free-form language hints are passed through unchanged
#[test]
fn test_meaningsPrompt_shouldListOneWordPerLine() {
    let prompt = meanings_prompt(&["brave", "knight"], "English", "Persian");

    assert!(prompt.contains("its Persian meaning(s)"));
    assert!(prompt.ends_with(&format!("{}brave\nknight", WORDS_MARKER)));
}

/// Word lists are trimmed, blanks dropped and duplicates folded by case
#[test]
fn test_parseWordList_shouldNormalizeTokens() {
    let words = parse_word_list(" brave,knight , ,Brave,dragon,\n");

    assert_eq!(words, vec!["brave", "knight", "dragon"]);
}

/// Meaning answers split on the first two commas only
#[test]
fn test_parseMeaningsResponse_shouldKeepCommasInExamples() {
    let response = "run, to move fast; to operate, He runs daily - Run, Forrest, run!\n\nlonely\n, orphan meaning\nbrave, courageous";

    let meanings = parse_meanings_response(response);

    assert_eq!(meanings.len(), 2);
    assert_eq!(
        meanings["run"],
        WordMeaning::new("to move fast; to operate", "He runs daily - Run, Forrest, run!")
    );
    assert_eq!(meanings["brave"], WordMeaning::new("courageous", ""));
}

/// Known words are removed regardless of case; order and casing survive
#[test]
fn test_filterAgainstKnown_shouldCompareCaseInsensitively() {
    let words = vec!["Brave", "knight", "DRAGON", "castle"];
    let known = vec!["brave".to_string(), "Dragon".to_string()];

    let filtered = filter_against_known(&words, &known);

    assert_eq!(filtered, vec!["knight", "castle"]);
    for word in &filtered {
        assert!(!known.iter().any(|k| k.eq_ignore_ascii_case(word)));
    }
}

/// Random word and known lists: the result is exactly the unknown words, in order
#[test]
fn test_filterAgainstKnown_withRandomLists_shouldKeepExactlyUnknownWords() {
    let mut rng = StdRng::seed_from_u64(0xf11e);
    let pool = ["brave", "Brave", "KNIGHT", "knight", "été", "Été", "dragon", "castle", "Sword"];
    let pick = |rng: &mut StdRng, max: usize| -> Vec<String> {
        (0..rng.random_range(0..max))
            .map(|_| pool[rng.random_range(0..pool.len())].to_string())
            .collect()
    };

    for _ in 0..200 {
        let words = pick(&mut rng, 12);
        let known = pick(&mut rng, 6);
        let folded: HashSet<String> = known.iter().map(|k| k.to_lowercase()).collect();

        let filtered = filter_against_known(&words, &known);

        let expected: Vec<String> = words
            .iter()
            .filter(|w| !folded.contains(&w.to_lowercase()))
            .cloned()
            .collect();
        assert_eq!(filtered, expected, "words {:?}, known {:?}", words, known);
    }
}

/// Every word gets a row; words without a meaning get the sentinel
#[test]
fn test_buildWordRows_shouldCoverEveryWordInOrder() {
    let words = vec!["brave", "Knight", "dragon"];
    let mut meanings = HashMap::new();
    meanings.insert("brave".to_string(), WordMeaning::new("courageous", "A brave act"));
    // Echoed key differs only in case
    meanings.insert("knight".to_string(), WordMeaning::new("a mounted soldier", ""));

    let rows = build_word_rows(&words, &meanings, 7);

    assert_eq!(rows.len(), 3);
    assert_eq!(rows.iter().map(|r| r.word.as_str()).collect::<Vec<_>>(), words);
    assert!(rows.iter().all(|r| r.srtfile_id == 7));
    assert_eq!(rows[0].meaning, "courageous | Examples: A brave act");
    assert_eq!(rows[1].meaning, "a mounted soldier | Examples: ");
    assert_eq!(rows[2].meaning, MEANING_NOT_FOUND);
}

/// Stored meanings decode back into their parts
#[test]
fn test_decodeMeaning_shouldInvertEncoding() {
    let meaning = WordMeaning::new("to move fast; to operate", "He runs - They ran");

    assert_eq!(decode_meaning(&encode_meaning(&meaning)), meaning);
    assert_eq!(decode_meaning(MEANING_NOT_FOUND), WordMeaning::new(MEANING_NOT_FOUND, ""));
}

/// Blank and sentinel meanings are the ones worth looking up again
#[test]
fn test_needsMeaningRefetch_shouldFlagBlankAndSentinel() {
    assert!(needs_meaning_refetch(""));
    assert!(needs_meaning_refetch("  "));
    assert!(needs_meaning_refetch(MEANING_NOT_FOUND));
    assert!(!needs_meaning_refetch("courageous | Examples: A brave act"));
}
