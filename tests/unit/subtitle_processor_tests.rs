/*!
 * Tests for subtitle cleaning
 */

use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use srtvocab::errors::VocabError;
use srtvocab::subtitle_processor::SubtitleCleaner;
use crate::common;

/// The sample file reduces to its two unique dialogue lines
#[test]
fn test_cleanFile_withSampleSubtitle_shouldKeepUniqueDialogue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_subtitle(temp_dir.path(), "sample.srt")?;

    let lines = SubtitleCleaner::clean_file(&path)?;

    assert_eq!(lines, vec!["The brave knight rode north.", "A dragon guarded the treasure."]);
    Ok(())
}

/// Windows line endings and a byte-order mark do not leak into the lines
#[test]
fn test_cleanFile_withCrlfAndBom_shouldStripBoth() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let content = "\u{feff}1\r\n00:00:01,000 --> 00:00:02,000\r\nHello there\r\n\r\n";
    let path = common::create_test_file(temp_dir.path(), "crlf.srt", content)?;

    let lines = SubtitleCleaner::clean_file(&path)?;

    assert_eq!(lines, vec!["Hello there"]);
    Ok(())
}

/// Bytes that are not UTF-8 are read as Latin-1
#[test]
fn test_cleanFile_withLatin1Bytes_shouldDecode() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("latin1.srt");
    let mut bytes = b"1\n00:00:01,000 --> 00:00:02,000\nCaf".to_vec();
    bytes.push(0xE9);
    bytes.extend_from_slice(b" au lait\n");
    std::fs::write(&path, bytes)?;

    let lines = SubtitleCleaner::clean_file(&path)?;

    assert_eq!(lines, vec!["Café au lait"]);
    Ok(())
}

/// A file with only counters and timings has nothing to extract from
#[test]
fn test_cleanFile_withOnlyStructure_shouldFailEmpty() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let content = "1\n00:00:01,000 --> 00:00:02,000\n<i></i>\n\n2\n00:00:03,000 --> 00:00:04,000\n\n";
    let path = common::create_test_file(temp_dir.path(), "blank.srt", content)?;

    let result = SubtitleCleaner::clean_file(&path);

    assert!(matches!(result, Err(VocabError::EmptySubtitle(name)) if name == "blank.srt"));
    Ok(())
}

/// A missing file is reported with its path
#[test]
fn test_cleanFile_withMissingFile_shouldFailFileRead() {
    let result = SubtitleCleaner::clean_file("/definitely/not/here.srt");

    match result {
        Err(VocabError::FileRead { path, .. }) => assert!(path.ends_with("here.srt")),
        other => panic!("expected FileRead, got {:?}", other),
    }
}

/// Cleaned lines contain no tags, timings or bare counters
#[test]
fn test_cleanText_shouldNeverEmitNoise() {
    let content = "12\n01:02:03,456 --> 01:02:04,000\n<font color=\"red\">Run!</font>\n<b>42</b>\nRun!\n";

    let lines = SubtitleCleaner::clean_text(content);

    assert_eq!(lines, vec!["Run!"]);
    for line in &lines {
        assert!(!line.is_empty());
        assert!(!line.contains('<'));
        assert!(!line.chars().all(|c| c.is_ascii_digit()));
    }
}

/// Lines are joined with single spaces for the extraction prompt
#[test]
fn test_joinLines_shouldUseSpaces() {
    let lines = vec!["One line.".to_string(), "Another.".to_string()];
    assert_eq!(SubtitleCleaner::join_lines(&lines), "One line. Another.");
}

/// Cleaning already-cleaned lines changes nothing
#[test]
fn test_cleanLines_shouldBeIdempotent() {
    let raw = ["1", "00:00:01,000 --> 00:00:02,000", "Hello <i>world</i>", "Hello <i>world</i>", "", "Bye"];

    let once = SubtitleCleaner::clean_lines(raw);
    let twice = SubtitleCleaner::clean_lines(&once);

    assert_eq!(once, vec!["Hello world", "Bye"]);
    assert_eq!(twice, once);
}

/// Old Mac files end lines with a bare carriage return
#[test]
fn test_cleanText_withCarriageReturnLineEndings_shouldSplitLines() {
    let content = "1\r00:00:01,000 --> 00:00:02,000\rHello world\r\r2\r00:00:03,000 --> 00:00:04,000\rBye\r";

    assert_eq!(SubtitleCleaner::clean_text(content), vec!["Hello world", "Bye"]);
}

/// Only ASCII digit runs count as cue numbers
#[test]
fn test_cleanLines_withNonAsciiNumerals_shouldKeepThem() {
    let lines = SubtitleCleaner::clean_lines(["7", "½", "Ⅷ", "٣"]);

    assert_eq!(lines, vec!["½", "Ⅷ", "٣"]);
}

/// Cleaning random cue soup twice gives the same lines as cleaning once
#[test]
fn test_cleanLines_withRandomInput_shouldBeIdempotent() {
    let mut rng = StdRng::seed_from_u64(0xc1ea);
    let pieces = [
        "1", "42", "", "   ", "00:00:01,000 --> 00:00:02,000", "<i>", "</i>", "<b>7</b>", "Hello", "hello",
        " world ", "½", "Run!", "<font color=\"red\">Stop</font>", "Stop",
    ];

    for _ in 0..200 {
        let raw: Vec<String> = (0..rng.random_range(0..30))
            .map(|_| {
                (0..rng.random_range(1..4))
                    .map(|_| pieces[rng.random_range(0..pieces.len())])
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect();

        let once = SubtitleCleaner::clean_lines(&raw);
        let twice = SubtitleCleaner::clean_lines(&once);

        assert_eq!(twice, once, "input: {:?}", raw);
        for line in &once {
            assert!(!line.is_empty());
            assert!(!line.contains('<'));
            assert!(!line.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
