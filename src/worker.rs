/*!
 * Background execution of pipeline runs.
 *
 * Each subtitle file runs in its own tokio task with its own store
 * connection. Tasks report to the caller only through an ordered channel of
 * `PipelineEvent`s; the review step is a request/response pair carried on
 * that channel. One cancellation token stops every run of the worker.
 */

use log::{debug, error, info};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::database::Repository;
use crate::errors::VocabError;
use crate::file_utils::FileManager;
use crate::providers::Provider;
use crate::settings_manager::SettingsManager;
use crate::vocabulary::{ReviewBatch, RunSummary, VocabularyPipeline};

/// Identifies one run
pub type JobId = Uuid;

/// The caller's answer to a review request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewDecision {
    /// Fetch meanings for the batch, minus the words marked known
    Continue { mark_known: Vec<String> },
    /// Stop here without storing anything
    Skip,
}

/// Messages sent from runs to the caller, in the order they happen
#[derive(Debug)]
pub enum PipelineEvent {
    Started {
        job: JobId,
        file: String,
    },
    /// The run waits until `reply` is answered or dropped
    ReviewReady {
        job: JobId,
        batch: ReviewBatch,
        reply: oneshot::Sender<ReviewDecision>,
    },
    FetchingMeanings {
        job: JobId,
        words: usize,
    },
    Completed {
        job: JobId,
        summary: RunSummary,
    },
    Skipped {
        job: JobId,
        file: String,
    },
    Failed {
        job: JobId,
        file: String,
        error: VocabError,
    },
}

impl PipelineEvent {
    pub fn job(&self) -> JobId {
        match self {
            Self::Started { job, .. }
            | Self::ReviewReady { job, .. }
            | Self::FetchingMeanings { job, .. }
            | Self::Completed { job, .. }
            | Self::Skipped { job, .. }
            | Self::Failed { job, .. } => *job,
        }
    }

    /// Whether this is the last event of its run
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed { .. } | Self::Skipped { .. } | Self::Failed { .. })
    }
}

/// Spawns pipeline runs and owns their shared resources
#[derive(Debug, Clone)]
pub struct PipelineWorker {
    provider: Arc<dyn Provider>,
    settings: Arc<SettingsManager>,
    repository: Repository,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<PipelineEvent>,
}

impl PipelineWorker {
    /// Create a worker and the receiving end of its event channel
    pub fn new(
        provider: Arc<dyn Provider>,
        settings: Arc<SettingsManager>,
        repository: Repository,
    ) -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let worker = Self {
            provider,
            settings,
            repository,
            cancel: CancellationToken::new(),
            events,
        };
        (worker, receiver)
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel every run, including ones not started yet
    pub fn cancel(&self) {
        info!("Cancelling all pipeline runs");
        self.cancel.cancel();
    }

    /// Start a run for `path` in the background
    pub fn spawn(&self, path: PathBuf) -> (JobId, JoinHandle<()>) {
        let job = Uuid::new_v4();
        let worker = self.clone();
        let handle = tokio::spawn(async move { worker.run(job, path).await });
        (job, handle)
    }

    async fn run(self, job: JobId, path: PathBuf) {
        let file = FileManager::display_name(&path);
        debug!("Job {} started for {:?}", job, path);
        self.emit(PipelineEvent::Started { job, file: file.clone() });

        let event = match self.execute(job, &path).await {
            Ok(Some(summary)) => PipelineEvent::Completed { job, summary },
            Ok(None) => PipelineEvent::Skipped { job, file },
            Err(error) => {
                error!("Processing {} failed: {}", file, error);
                PipelineEvent::Failed { job, file, error }
            }
        };
        self.emit(event);
    }

    async fn execute(&self, job: JobId, path: &std::path::Path) -> Result<Option<RunSummary>, VocabError> {
        let repository = self.repository.isolated().map_err(VocabError::persistence)?;
        let pipeline = VocabularyPipeline::new(self.provider.clone(), self.settings.clone(), repository)
            .with_cancellation(self.cancel.clone());

        let batch = pipeline.prepare_review(path).await?;

        let (reply, decision) = oneshot::channel();
        self.emit(PipelineEvent::ReviewReady {
            job,
            batch: batch.clone(),
            reply,
        });

        let decision = tokio::select! {
            _ = self.cancel.cancelled() => return Err(VocabError::Cancelled),
            decision = decision => decision.map_err(|_| VocabError::Cancelled)?,
        };

        match decision {
            ReviewDecision::Skip => Ok(None),
            ReviewDecision::Continue { mark_known } => {
                self.emit(PipelineEvent::FetchingMeanings {
                    job,
                    words: batch.words.len().saturating_sub(mark_known.len()),
                });
                pipeline.finish(batch, &mark_known).await.map(Some)
            }
        }
    }

    fn emit(&self, event: PipelineEvent) {
        // The receiver is gone only when the caller stopped listening
        if self.events.send(event).is_err() {
            debug!("Pipeline event dropped, receiver closed");
        }
    }
}
