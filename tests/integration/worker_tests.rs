/*!
 * Integration tests for background runs, review round trips and cancellation
 */

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

use srtvocab::database::Repository;
use srtvocab::errors::VocabError;
use srtvocab::providers::mock::MockProvider;
use srtvocab::worker::{JobId, PipelineEvent, PipelineWorker, ReviewDecision};
use crate::common;

/// Short labels for asserting event order
fn label(event: &PipelineEvent) -> &'static str {
    match event {
        PipelineEvent::Started { .. } => "started",
        PipelineEvent::ReviewReady { .. } => "review",
        PipelineEvent::FetchingMeanings { .. } => "fetching",
        PipelineEvent::Completed { .. } => "completed",
        PipelineEvent::Skipped { .. } => "skipped",
        PipelineEvent::Failed { .. } => "failed",
    }
}

/// Drain events until `runs` terminal events arrived, answering reviews with `decide`
async fn drive<F>(
    events: &mut UnboundedReceiver<PipelineEvent>,
    runs: usize,
    mut decide: F,
) -> HashMap<JobId, Vec<PipelineEvent>>
where
    F: FnMut(&[String]) -> ReviewDecision,
{
    let mut by_job: HashMap<JobId, Vec<PipelineEvent>> = HashMap::new();
    let mut finished = 0;

    while finished < runs {
        let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("event within timeout")
            .expect("channel open");

        let event = match event {
            PipelineEvent::ReviewReady { job, batch, reply } => {
                reply.send(decide(&batch.words)).expect("run waiting for review");
                PipelineEvent::ReviewReady {
                    job,
                    batch,
                    reply: tokio::sync::oneshot::channel().0,
                }
            }
            other => other,
        };

        if event.is_terminal() {
            finished += 1;
        }
        by_job.entry(event.job()).or_default().push(event);
    }

    by_job
}

/// Each run reports its phases in order and stores its words
#[tokio::test]
async fn test_spawn_twoFiles_shouldCompleteBothInOrder() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let first = common::create_test_subtitle(temp_dir.path(), "first.srt")?;
    let second = common::create_test_subtitle(temp_dir.path(), "second.srt")?;
    let settings = common::settings_with_keys(temp_dir.path(), &["k1", "k2"]);
    let repository = common::file_repository(temp_dir.path())?;

    let (worker, mut events) = PipelineWorker::new(Arc::new(MockProvider::working()), settings, repository.clone());
    let (job_a, handle_a) = worker.spawn(first);
    let (job_b, handle_b) = worker.spawn(second);

    let by_job = drive(&mut events, 2, |words| ReviewDecision::Continue {
        mark_known: words.iter().filter(|w| *w == "dragon").cloned().collect(),
    })
    .await;
    handle_a.await?;
    handle_b.await?;

    for job in [job_a, job_b] {
        let labels: Vec<_> = by_job[&job].iter().map(label).collect();
        assert_eq!(labels, vec!["started", "review", "fetching", "completed"]);
    }

    assert_eq!(repository.list_subtitle_files().await?.len(), 2);
    assert!(repository.is_word_known("dragon").await?);
    assert!(repository.search_words("dragon").await?.is_empty());
    Ok(())
}

/// Skipping a review stores nothing
#[tokio::test]
async fn test_review_withSkip_shouldStoreNothing() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_subtitle(temp_dir.path(), "sample.srt")?;
    let settings = common::settings_with_keys(temp_dir.path(), &["k1"]);
    let repository = Repository::new_in_memory()?;
    let provider = MockProvider::working();

    let (worker, mut events) = PipelineWorker::new(Arc::new(provider.clone()), settings, repository.clone());
    let (job, handle) = worker.spawn(path);

    let by_job = drive(&mut events, 1, |_| ReviewDecision::Skip).await;
    handle.await?;

    assert!(matches!(by_job[&job].last(), Some(PipelineEvent::Skipped { file, .. }) if file == "sample.srt"));
    assert!(repository.list_subtitle_files().await?.is_empty());
    // Only the extraction request was sent
    assert_eq!(provider.request_count(), 1);
    Ok(())
}

/// Cancelling interrupts an in-flight provider request
#[tokio::test]
async fn test_cancel_duringSlowRequest_shouldFailCancelled() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_subtitle(temp_dir.path(), "sample.srt")?;
    let settings = common::settings_with_keys(temp_dir.path(), &["k1"]);
    let repository = Repository::new_in_memory()?;

    let (worker, mut events) = PipelineWorker::new(Arc::new(MockProvider::slow(30_000)), settings, repository.clone());
    let (_, handle) = worker.spawn(path);

    assert!(matches!(events.recv().await, Some(PipelineEvent::Started { .. })));
    worker.cancel();

    let terminal = tokio::time::timeout(Duration::from_secs(5), events.recv()).await?;
    assert!(matches!(terminal, Some(PipelineEvent::Failed { error: VocabError::Cancelled, .. })));
    handle.await?;
    assert!(repository.list_subtitle_files().await?.is_empty());
    Ok(())
}

/// Cancelling while a review is pending ends the run without storing
#[tokio::test]
async fn test_cancel_whileAwaitingReview_shouldFailCancelled() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_subtitle(temp_dir.path(), "sample.srt")?;
    let settings = common::settings_with_keys(temp_dir.path(), &["k1"]);
    let repository = Repository::new_in_memory()?;

    let (worker, mut events) = PipelineWorker::new(Arc::new(MockProvider::working()), settings, repository.clone());
    let token = worker.cancellation_token();
    let (_, handle) = worker.spawn(path);

    let mut pending_reply = None;
    while pending_reply.is_none() {
        if let Some(PipelineEvent::ReviewReady { reply, .. }) = events.recv().await {
            pending_reply = Some(reply);
        }
    }
    token.cancel();

    let terminal = tokio::time::timeout(Duration::from_secs(5), events.recv()).await?;
    assert!(matches!(terminal, Some(PipelineEvent::Failed { error: VocabError::Cancelled, .. })));
    handle.await?;

    // The run is gone, so answering now has no effect
    let reply = pending_reply.expect("review requested");
    assert!(reply.send(ReviewDecision::Continue { mark_known: vec![] }).is_err());
    assert!(repository.list_subtitle_files().await?.is_empty());
    Ok(())
}

/// Runs spawned after cancellation fail straight away
#[tokio::test]
async fn test_spawn_afterCancel_shouldNotCallProvider() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_subtitle(temp_dir.path(), "sample.srt")?;
    let settings = common::settings_with_keys(temp_dir.path(), &["k1"]);
    let provider = MockProvider::working();

    let (worker, mut events) = PipelineWorker::new(Arc::new(provider.clone()), settings, Repository::new_in_memory()?);
    worker.cancel();
    let (_, handle) = worker.spawn(path);
    handle.await?;

    assert!(matches!(events.recv().await, Some(PipelineEvent::Started { .. })));
    assert!(matches!(events.recv().await, Some(PipelineEvent::Failed { error: VocabError::Cancelled, .. })));
    assert_eq!(provider.request_count(), 0);
    Ok(())
}
