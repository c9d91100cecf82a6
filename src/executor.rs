use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, instrument, warn};

use crate::client::ImageEditModel;
use crate::error::{OrchestratorError, QueueError};
use crate::events::{BatchFinishedEvent, BatchStartedEvent, ItemStatusEvent, NoopSink, ProgressSink};
use crate::queue::BatchQueue;
use crate::session::{SessionState, PERMISSION_NOTICE};
use crate::translator::Translator;
use crate::types::{BatchItem, BatchItemStatus, BatchSummary, TargetLanguage};

/// Item error recorded when the credential is rejected.
pub const PERMISSION_ITEM_ERROR: &str = "Permission Denied";

enum ItemOutcome {
    Continue,
    HaltBatch,
}

struct RunProgress {
    total: usize,
    finished: usize,
    summary: BatchSummary,
}

/// Drives batch runs: walks the pending items of a [`BatchQueue`] in
/// insertion order, one model call at a time, recording each outcome.
///
/// A credential rejection on any item halts the run and marks the session as
/// needing a reconnect. Every other failure is recorded on that item alone.
pub struct BatchOrchestrator<M> {
    translator: Translator<M>,
    queue: Arc<BatchQueue>,
    session: Arc<SessionState>,
    sink: Arc<dyn ProgressSink>,
}

impl<M: ImageEditModel> BatchOrchestrator<M> {
    pub fn new(translator: Translator<M>, queue: Arc<BatchQueue>, session: Arc<SessionState>) -> Self {
        Self {
            translator,
            queue,
            session,
            sink: Arc::new(NoopSink),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn queue(&self) -> &Arc<BatchQueue> {
        &self.queue
    }

    pub fn session(&self) -> &Arc<SessionState> {
        &self.session
    }

    pub fn translator(&self) -> &Translator<M> {
        &self.translator
    }

    /// Stop the running batch before its next item. In-flight calls finish.
    pub fn request_cancel(&self) {
        self.session.request_cancel();
    }

    /// Translate every Idle or Error item into the session's target language.
    ///
    /// The working set and language are captured when the run starts. Items
    /// added later wait for the next run; items removed mid-run are skipped.
    #[instrument(skip_all)]
    pub async fn run_batch(&self) -> Result<BatchSummary, OrchestratorError> {
        if !self.session.has_credential() {
            return Err(OrchestratorError::CredentialUnavailable);
        }

        let working_set = self.queue.pending();
        let language = self.session.target_language();

        if working_set.is_empty() {
            debug!("no pending items, nothing to run");
            return Ok(BatchSummary {
                target_language: language,
                ..BatchSummary::default()
            });
        }

        if !self.session.try_begin_batch() {
            return Err(OrchestratorError::AlreadyRunning);
        }

        self.session.clear_global_error();
        // A cancel issued while idle must not stop this run.
        self.session.take_cancel_request();

        let result = self.run_working_set(working_set, language).await;
        self.session.end_batch();

        let summary = result?;
        self.sink.batch_finished(&BatchFinishedEvent {
            summary: summary.clone(),
        });
        Ok(summary)
    }

    async fn run_working_set(
        &self,
        working_set: Vec<BatchItem>,
        language: TargetLanguage,
    ) -> Result<BatchSummary, OrchestratorError> {
        let start = Instant::now();
        let mut progress = RunProgress {
            total: working_set.len(),
            finished: 0,
            summary: BatchSummary {
                target_language: language,
                started_at: Some(chrono::Utc::now().to_rfc3339()),
                ..BatchSummary::default()
            },
        };

        info!(items = progress.total, language = %language, "batch started");
        self.sink.batch_started(&BatchStartedEvent {
            total_items: progress.total,
            target_language: language,
        });

        for item in &working_set {
            if self.session.take_cancel_request() {
                info!(remaining = progress.total - progress.finished, "batch cancelled");
                progress.summary.cancelled = true;
                break;
            }

            match self.process_item(item, language, &mut progress).await? {
                ItemOutcome::Continue => {}
                ItemOutcome::HaltBatch => {
                    progress.summary.halted = true;
                    break;
                }
            }
        }

        let mut summary = progress.summary;
        summary.total_duration_ms = start.elapsed().as_millis() as u64;
        summary.completed_at = Some(chrono::Utc::now().to_rfc3339());

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            halted = summary.halted,
            cancelled = summary.cancelled,
            duration_ms = summary.total_duration_ms,
            "batch finished"
        );
        Ok(summary)
    }

    async fn process_item(
        &self,
        item: &BatchItem,
        language: TargetLanguage,
        progress: &mut RunProgress,
    ) -> Result<ItemOutcome, OrchestratorError> {
        match self
            .queue
            .update_status(&item.id, BatchItemStatus::Processing, None, None)
        {
            Ok(()) => {}
            Err(QueueError::NotFound(_)) | Err(QueueError::InvalidTransition { .. }) => {
                warn!(item = %item.id, file = %item.file_name(), "item no longer pending, skipping");
                progress.summary.skipped += 1;
                progress.finished += 1;
                return Ok(ItemOutcome::Continue);
            }
            Err(e) => return Err(e.into()),
        }
        progress.summary.attempted += 1;
        self.emit_item(item, BatchItemStatus::Processing, None, progress);

        match self.translator.translate(&item.source, language).await {
            Ok(image) => {
                progress.finished += 1;
                match self
                    .queue
                    .update_status(&item.id, BatchItemStatus::Completed, Some(image), None)
                {
                    Ok(()) => {
                        progress.summary.succeeded += 1;
                        self.emit_item(item, BatchItemStatus::Completed, None, progress);
                    }
                    Err(QueueError::NotFound(_)) => {
                        warn!(item = %item.id, "item removed during translation, result discarded");
                        progress.summary.skipped += 1;
                    }
                    Err(e) => return Err(e.into()),
                }
                Ok(ItemOutcome::Continue)
            }
            Err(err) if err.is_permission_denied() => {
                error!(item = %item.id, file = %item.file_name(), "credential rejected, halting batch");
                self.session.invalidate_credential();
                self.session.set_global_error(PERMISSION_NOTICE);
                progress.finished += 1;
                progress.summary.failed += 1;
                self.record_error(item, PERMISSION_ITEM_ERROR.to_string(), progress)?;
                Ok(ItemOutcome::HaltBatch)
            }
            Err(err) => {
                warn!(item = %item.id, file = %item.file_name(), error = %err, "item failed");
                progress.finished += 1;
                progress.summary.failed += 1;
                self.record_error(item, err.to_string(), progress)?;
                Ok(ItemOutcome::Continue)
            }
        }
    }

    fn record_error(&self, item: &BatchItem, message: String, progress: &RunProgress) -> Result<(), OrchestratorError> {
        match self
            .queue
            .update_status(&item.id, BatchItemStatus::Error, None, Some(message.clone()))
        {
            Ok(()) => {
                self.emit_item(item, BatchItemStatus::Error, Some(message), progress);
                Ok(())
            }
            Err(QueueError::NotFound(_)) => {
                warn!(item = %item.id, "item removed during translation, error discarded");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn emit_item(&self, item: &BatchItem, status: BatchItemStatus, error: Option<String>, progress: &RunProgress) {
        self.sink.item_status(&ItemStatusEvent {
            item_id: item.id.clone(),
            file_name: item.file_name().to_string(),
            status,
            error,
            finished: progress.finished,
            total: progress.total,
        });
    }
}
