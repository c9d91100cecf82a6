use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

use crate::types::{BatchItemStatus, BatchSummary, TargetLanguage};

pub const BATCH_STARTED_EVENT: &str = "image_translate:batch_started";
pub const ITEM_STATUS_EVENT: &str = "image_translate:item_status";
pub const BATCH_FINISHED_EVENT: &str = "image_translate:batch_finished";

/// Emitted once when a run begins processing its working set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStartedEvent {
    pub total_items: usize,
    pub target_language: TargetLanguage,
}

/// Emitted on every item status transition made by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStatusEvent {
    pub item_id: String,
    pub file_name: String,
    pub status: BatchItemStatus,
    pub error: Option<String>,
    /// Items of the working set that reached a final status so far.
    pub finished: usize,
    pub total: usize,
}

/// Emitted when a run ends, including halted and cancelled runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchFinishedEvent {
    pub summary: BatchSummary,
}

/// Any progress event, tagged for consumers that receive them on one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ProgressEvent {
    BatchStarted(BatchStartedEvent),
    ItemStatus(ItemStatusEvent),
    BatchFinished(BatchFinishedEvent),
}

/// Receives orchestrator progress. All methods default to doing nothing.
pub trait ProgressSink: Send + Sync {
    fn batch_started(&self, _event: &BatchStartedEvent) {}

    fn item_status(&self, _event: &ItemStatusEvent) {}

    fn batch_finished(&self, _event: &BatchFinishedEvent) {}
}

/// Discards every event.
pub struct NoopSink;

impl ProgressSink for NoopSink {}

/// Forwards events into a tokio channel.
pub struct ChannelSink {
    tx: UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<ProgressEvent>) -> Self {
        Self { tx }
    }

    fn send(&self, event: ProgressEvent) {
        // A dropped receiver just means nobody is watching.
        let _ = self.tx.send(event);
    }
}

impl ProgressSink for ChannelSink {
    fn batch_started(&self, event: &BatchStartedEvent) {
        self.send(ProgressEvent::BatchStarted(event.clone()));
    }

    fn item_status(&self, event: &ItemStatusEvent) {
        self.send(ProgressEvent::ItemStatus(event.clone()));
    }

    fn batch_finished(&self, event: &BatchFinishedEvent) {
        self.send(ProgressEvent::BatchFinished(event.clone()));
    }
}

#[cfg(feature = "tauri")]
mod tauri_sink {
    use super::*;
    use tauri::{AppHandle, Emitter, Runtime};
    use tracing::warn;

    fn emit<R: Runtime, S: Serialize + Clone>(app: &AppHandle<R>, name: &str, payload: S) {
        if let Err(e) = app.emit(name, payload) {
            warn!(event = name, error = %e, "failed to emit progress event");
        }
    }

    impl<R: Runtime> ProgressSink for AppHandle<R> {
        fn batch_started(&self, event: &BatchStartedEvent) {
            emit(self, BATCH_STARTED_EVENT, event.clone());
        }

        fn item_status(&self, event: &ItemStatusEvent) {
            emit(self, ITEM_STATUS_EVENT, event.clone());
        }

        fn batch_finished(&self, event: &BatchFinishedEvent) {
            emit(self, BATCH_FINISHED_EVENT, event.clone());
        }
    }
}
