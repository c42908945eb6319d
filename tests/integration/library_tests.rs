/*!
 * Integration tests for library maintenance: known words, export and deletion
 */

use anyhow::Result;
use std::sync::Arc;

use srtvocab::database::Repository;
use srtvocab::export::export_words;
use srtvocab::providers::mock::MockProvider;
use srtvocab::vocabulary::VocabularyPipeline;
use crate::common;

/// Known words are stored lowercase and matched in any case
#[tokio::test]
async fn test_knownWords_shouldManageCaseInsensitively() -> Result<()> {
    let repository = Repository::new_in_memory()?;

    let added = repository
        .add_known_words(vec!["Hello".into(), "HELLO".into(), " world ".into(), "".into()])
        .await?;
    assert_eq!(added, 2);
    assert!(!repository.add_known_word("hello").await?);

    assert_eq!(repository.list_known_words().await?, vec!["hello", "world"]);
    assert_eq!(repository.filter_known_words("WOR").await?, vec!["world"]);
    assert!(repository.is_word_known("World").await?);

    assert!(repository.remove_known_word("HELLO").await?);
    assert!(!repository.remove_known_word("hello").await?);
    assert_eq!(repository.list_known_words().await?, vec!["world"]);
    Ok(())
}

/// A processed file can be exported, searched and deleted with its words
#[tokio::test]
async fn test_processedFile_shouldExportSearchAndDelete() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_subtitle(temp_dir.path(), "Show: Pilot.srt")?;
    let settings = common::settings_with_keys(temp_dir.path(), &["k1"]);
    let repository = common::file_repository(temp_dir.path())?;
    let provider = MockProvider::working().with_extracted_words(&["dragon", "knight"]);

    let summary = VocabularyPipeline::new(Arc::new(provider), settings, repository.clone())
        .run(&path)
        .await?;
    let id = summary.subtitle_id.expect("subtitle row");

    let words = repository.words_by_subtitle(id).await?;
    let export_dir = temp_dir.path().join("export");
    let exported = export_words(&export_dir, "Show: Pilot.srt", &words)?;
    assert!(exported.ends_with("Show_ Pilot.tsv"));
    assert_eq!(
        std::fs::read_to_string(&exported)?,
        "dragon\tmeaning of dragon | Examples: I use dragon daily - dragon again\n\
         knight\tmeaning of knight | Examples: I use knight daily - knight again\n"
    );

    let found = repository.search_words("nig").await?;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].srtfile_id, Some(id));

    assert!(repository.delete_subtitle_file(id).await?);
    assert!(!repository.delete_subtitle_file(id).await?);
    assert!(repository.get_subtitle_file(id).await?.is_none());
    assert_eq!(repository.count_words(id).await?, 0);
    assert_eq!(repository.stats()?.words, 0);
    Ok(())
}

/// Files are listed newest first
#[test]
fn test_listSubtitleFiles_shouldListNewestFirst() -> Result<()> {
    let repository = Repository::new_in_memory()?;

    let names: Vec<String> = tokio_test::block_on(async {
        repository.add_subtitle_file("old.srt").await?;
        repository.add_subtitle_file("new.srt").await?;
        let files = repository.list_subtitle_files().await?;
        anyhow::Ok(files.into_iter().map(|f| f.name).collect())
    })?;

    assert_eq!(names, vec!["new.srt", "old.srt"]);
    Ok(())
}
