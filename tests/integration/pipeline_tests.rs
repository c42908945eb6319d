/*!
 * Integration tests for subtitle-to-library runs against the mock provider
 */

use anyhow::Result;
use std::sync::Arc;

use srtvocab::database::Repository;
use srtvocab::errors::{ProviderError, VocabError};
use srtvocab::providers::mock::MockProvider;
use srtvocab::vocabulary::VocabularyPipeline;
use srtvocab::vocabulary::prompts::WORDS_MARKER;
use crate::common;

// Words the mock extracts from the sample subtitle, in text order
const SAMPLE_WORDS: [&str; 7] = ["brave", "knight", "rode", "north", "dragon", "guarded", "treasure"];

fn stored_words(records: &[srtvocab::database::WordRecord]) -> Vec<&str> {
    records.iter().map(|r| r.word.as_str()).collect()
}

/// A full run stores every unknown word with its meaning
#[tokio::test]
async fn test_run_withSampleSubtitle_shouldStoreUnknownWords() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_subtitle(temp_dir.path(), "Knights S01E01.srt")?;
    let settings = common::settings_with_keys(temp_dir.path(), &["k1", "k2"]);
    let repository = common::file_repository(temp_dir.path())?;
    repository.add_known_word("North").await?;
    let provider = MockProvider::working();

    let pipeline = VocabularyPipeline::new(Arc::new(provider.clone()), settings, repository.clone());
    let summary = pipeline.run(&path).await?;

    assert_eq!(summary.file_name, "Knights S01E01.srt");
    assert_eq!(summary.words_stored, SAMPLE_WORDS.len() - 1);
    assert_eq!(summary.meanings_missing, 0);

    let id = summary.subtitle_id.expect("subtitle row");
    let words = repository.words_by_subtitle(id).await?;
    let mut expected: Vec<&str> = SAMPLE_WORDS.iter().copied().filter(|w| *w != "north").collect();
    expected.sort();
    assert_eq!(stored_words(&words), expected);

    let brave = words.iter().find(|w| w.word == "brave").expect("brave stored");
    let decoded = brave.decoded();
    assert_eq!(decoded.meaning, "meaning of brave");
    assert_eq!(decoded.examples, "I use brave daily - brave again");

    // One extraction request, one meaning request, keys alternate
    assert_eq!(provider.api_keys_used(), vec!["k1", "k2"]);
    Ok(())
}

/// Meanings are requested in fixed-size chunks, in word order
#[tokio::test]
async fn test_run_withSmallBatchSize_shouldChunkMeaningRequests() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_subtitle(temp_dir.path(), "sample.srt")?;
    let settings = common::settings_with_keys(temp_dir.path(), &["k1", "k2", "k3"]);
    let provider = MockProvider::working();

    let pipeline = VocabularyPipeline::new(Arc::new(provider.clone()), settings, Repository::new_in_memory()?)
        .with_batch_size(3);
    let summary = pipeline.run(&path).await?;

    assert_eq!(summary.words_stored, SAMPLE_WORDS.len());
    let calls = provider.calls();
    assert_eq!(calls.len(), 1 + 3);

    let chunks: Vec<Vec<String>> = calls[1..]
        .iter()
        .map(|call| {
            let (_, words) = call.prompt.split_once(WORDS_MARKER).expect("meaning prompt");
            words.lines().map(str::to_string).collect()
        })
        .collect();
    assert_eq!(chunks.iter().map(Vec::len).collect::<Vec<_>>(), vec![3, 3, 1]);
    assert_eq!(chunks.concat(), SAMPLE_WORDS.to_vec());

    assert_eq!(provider.api_keys_used(), vec!["k1", "k2", "k3", "k1"]);
    Ok(())
}

/// Words the model leaves out are stored with the not-found marker
#[tokio::test]
async fn test_run_withMissingMeanings_shouldStoreSentinel() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_subtitle(temp_dir.path(), "sample.srt")?;
    let settings = common::settings_with_keys(temp_dir.path(), &["k1"]);
    let provider = MockProvider::working().with_unknown_words(&["guarded", "treasure"]);
    let repository = Repository::new_in_memory()?;

    let pipeline = VocabularyPipeline::new(Arc::new(provider), settings, repository.clone());
    let summary = pipeline.run(&path).await?;

    assert_eq!(summary.meanings_missing, 2);
    let id = summary.subtitle_id.expect("subtitle row");
    let pending = repository.words_needing_meaning(id).await?;
    assert_eq!(stored_words(&pending), vec!["guarded", "treasure"]);
    Ok(())
}

/// Missing meanings can be fetched again later
#[tokio::test]
async fn test_refetchMissing_afterPartialRun_shouldFillMeanings() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_subtitle(temp_dir.path(), "sample.srt")?;
    let settings = common::settings_with_keys(temp_dir.path(), &["k1"]);
    let repository = Repository::new_in_memory()?;

    let partial = MockProvider::working().with_unknown_words(&["dragon"]);
    let summary = VocabularyPipeline::new(Arc::new(partial), settings.clone(), repository.clone())
        .run(&path)
        .await?;
    let id = summary.subtitle_id.expect("subtitle row");

    let complete = MockProvider::working();
    let refetch = VocabularyPipeline::new(Arc::new(complete.clone()), settings, repository.clone())
        .refetch_missing(id)
        .await?;

    assert_eq!(refetch.requested, 1);
    assert_eq!(refetch.updated, 1);
    assert!(repository.words_needing_meaning(id).await?.is_empty());
    assert!(complete.calls()[0].prompt.ends_with(&format!("{}dragon", WORDS_MARKER)));
    Ok(())
}

/// An empty extraction answer stops the run before anything is stored
#[tokio::test]
async fn test_run_withEmptyExtraction_shouldFailWithoutStoring() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_subtitle(temp_dir.path(), "sample.srt")?;
    let settings = common::settings_with_keys(temp_dir.path(), &["k1"]);
    let repository = Repository::new_in_memory()?;

    let pipeline = VocabularyPipeline::new(Arc::new(MockProvider::empty()), settings, repository.clone());
    let result = pipeline.run(&path).await;

    assert!(matches!(result, Err(VocabError::NoWordsExtracted)));
    assert!(repository.list_subtitle_files().await?.is_empty());
    Ok(())
}

/// Without a key no request is sent
#[tokio::test]
async fn test_run_withoutApiKeys_shouldFailNoCredential() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_subtitle(temp_dir.path(), "sample.srt")?;
    let settings = common::settings_with_keys(temp_dir.path(), &[]);
    let provider = MockProvider::working();

    let pipeline = VocabularyPipeline::new(Arc::new(provider.clone()), settings, Repository::new_in_memory()?);
    let result = pipeline.run(&path).await;

    assert!(matches!(result, Err(VocabError::NoCredential)));
    assert_eq!(provider.request_count(), 0);
    Ok(())
}

/// A rejected key surfaces as an authentication failure
#[tokio::test]
async fn test_run_withRejectedKey_shouldReportAuthentication() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_subtitle(temp_dir.path(), "sample.srt")?;
    let settings = common::settings_with_keys(temp_dir.path(), &["revoked"]);

    let pipeline = VocabularyPipeline::new(Arc::new(MockProvider::unauthorized()), settings, Repository::new_in_memory()?);
    let result = pipeline.run(&path).await;

    assert!(matches!(
        result,
        Err(VocabError::Extraction(ProviderError::AuthenticationError(_)))
    ));
    Ok(())
}

/// Concurrent runs on one database file share the rotation and both persist
#[tokio::test]
async fn test_run_concurrentlyOnFileDatabase_shouldStoreBoth() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let first = common::create_test_subtitle(temp_dir.path(), "first.srt")?;
    let second = common::create_test_subtitle(temp_dir.path(), "second.srt")?;
    let settings = common::settings_with_keys(temp_dir.path(), &["k1", "k2"]);
    let repository = common::file_repository(temp_dir.path())?;
    let provider = Arc::new(MockProvider::working());

    let one = VocabularyPipeline::new(provider.clone(), settings.clone(), repository.isolated()?);
    let two = VocabularyPipeline::new(provider.clone(), settings.clone(), repository.isolated()?);
    let (a, b) = tokio::join!(one.run(&first), two.run(&second));
    let (a, b) = (a?, b?);

    assert_ne!(a.subtitle_id, b.subtitle_id);
    assert_eq!(repository.list_subtitle_files().await?.len(), 2);

    let keys = provider.api_keys_used();
    assert_eq!(keys.len(), 4);
    assert_eq!(keys.iter().filter(|k| *k == "k1").count(), 2);

    // Rows survive reopening the file
    let reopened = common::file_repository(temp_dir.path())?;
    assert_eq!(reopened.stats()?.words, 2 * SAMPLE_WORDS.len() as i64);
    Ok(())
}
