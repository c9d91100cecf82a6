use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::error::QueueError;
use crate::types::*;

const UNKNOWN_ERROR: &str = "Unknown error";

#[derive(Default)]
struct QueueInner {
    items: Vec<BatchItem>,
    selected: Option<String>,
}

/// In-memory ordered store of batch items and the active selection.
///
/// Insertion order is processing order. The store is the only writer of
/// item status, result and error; callers receive cloned snapshots.
#[derive(Default)]
pub struct BatchQueue {
    inner: Mutex<QueueInner>,
}

impl BatchQueue {
    /// Create a new empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, QueueInner>, QueueError> {
        self.inner.lock().map_err(|e| QueueError::Lock(e.to_string()))
    }

    /// Guard for read-only snapshots. Every write leaves the items consistent,
    /// so a poisoned lock still holds a valid queue to read.
    fn read(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append images in input order, silently skipping anything that is not an image.
    ///
    /// When the queue was empty, the first added item becomes the selection.
    /// Returns the ids of the items that were added.
    pub fn add<I>(&self, files: I) -> Result<Vec<String>, QueueError>
    where
        I: IntoIterator<Item = SourceImage>,
    {
        let new_items: Vec<BatchItem> = files
            .into_iter()
            .filter(|file| {
                let keep = file.is_image();
                if !keep {
                    debug!(file = %file.file_name, media_type = %file.media_type, "skipping non-image file");
                }
                keep
            })
            .map(BatchItem::new)
            .collect();

        let ids: Vec<String> = new_items.iter().map(|i| i.id.clone()).collect();

        let mut inner = self.lock()?;
        if inner.items.is_empty() {
            if let Some(first) = ids.first() {
                inner.selected = Some(first.clone());
            }
        }
        inner.items.extend(new_items);
        Ok(ids)
    }

    /// Remove an item. If it was selected, the selection moves to the new last item.
    pub fn remove(&self, id: &str) -> Result<BatchItem, QueueError> {
        let mut inner = self.lock()?;
        let pos = inner
            .items
            .iter()
            .position(|i| i.id == id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;
        let removed = inner.items.remove(pos);

        if inner.selected.as_deref() == Some(id) {
            inner.selected = inner.items.last().map(|i| i.id.clone());
        }
        Ok(removed)
    }

    /// Empty the queue and clear the selection. Returns how many items were dropped.
    ///
    /// Asking the user for confirmation is the caller's job.
    pub fn clear(&self) -> Result<usize, QueueError> {
        let mut inner = self.lock()?;
        let count = inner.items.len();
        inner.items.clear();
        inner.selected = None;
        Ok(count)
    }

    /// Move an item to `status`, replacing its result and error.
    ///
    /// `result` is kept only for `Completed` (and required there); `error` only
    /// for `Error`, defaulting to "Unknown error". Other items are untouched.
    pub fn update_status(
        &self,
        id: &str,
        status: BatchItemStatus,
        result: Option<TranslatedImage>,
        error: Option<String>,
    ) -> Result<(), QueueError> {
        let mut inner = self.lock()?;
        let item = inner
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| QueueError::NotFound(id.to_string()))?;

        if !item.status.can_transition_to(status) {
            return Err(QueueError::InvalidTransition {
                id: id.to_string(),
                from: item.status,
                to: status,
            });
        }

        let result = match status {
            BatchItemStatus::Completed => Some(Arc::new(
                result.ok_or_else(|| QueueError::MissingResult(id.to_string()))?,
            )),
            _ => None,
        };
        let error = match status {
            BatchItemStatus::Error => Some(error.unwrap_or_else(|| UNKNOWN_ERROR.to_string())),
            _ => None,
        };

        item.status = status;
        item.result = result;
        item.error = error;
        Ok(())
    }

    /// Make `id` the active selection.
    pub fn select(&self, id: &str) -> Result<(), QueueError> {
        let mut inner = self.lock()?;
        if !inner.items.iter().any(|i| i.id == id) {
            return Err(QueueError::NotFound(id.to_string()));
        }
        inner.selected = Some(id.to_string());
        Ok(())
    }

    pub fn selected_id(&self) -> Option<String> {
        self.read().selected.clone()
    }

    /// Snapshot of the selected item.
    pub fn selected(&self) -> Option<BatchItem> {
        let inner = self.read();
        let id = inner.selected.as_deref()?;
        inner.items.iter().find(|i| i.id == id).cloned()
    }

    /// Get a specific item by id.
    pub fn get(&self, id: &str) -> Option<BatchItem> {
        self.read().items.iter().find(|i| i.id == id).cloned()
    }

    /// Get all items in insertion order (cloned snapshot).
    pub fn items(&self) -> Vec<BatchItem> {
        self.read().items.clone()
    }

    /// Items a batch run would pick up (`Idle` or `Error`), in insertion order.
    pub fn pending(&self) -> Vec<BatchItem> {
        self.filtered(|i| i.status.is_pending())
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.pending().into_iter().map(|i| i.id).collect()
    }

    pub fn completed(&self) -> Vec<BatchItem> {
        self.filtered(|i| i.status == BatchItemStatus::Completed && i.result.is_some())
    }

    fn filtered<F>(&self, keep: F) -> Vec<BatchItem>
    where
        F: Fn(&BatchItem) -> bool,
    {
        self.read().items.iter().filter(|i| keep(*i)).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Count items per status.
    pub fn counts(&self) -> QueueCounts {
        let mut counts = QueueCounts::default();
        for item in &self.read().items {
            match item.status {
                BatchItemStatus::Idle => counts.idle += 1,
                BatchItemStatus::Processing => counts.processing += 1,
                BatchItemStatus::Completed => counts.completed += 1,
                BatchItemStatus::Error => counts.error += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(name: &str) -> SourceImage {
        SourceImage::new(name, "image/png", name.as_bytes().to_vec())
    }

    fn ids(queue: &BatchQueue) -> Vec<String> {
        queue.items().into_iter().map(|i| i.id).collect()
    }

    #[test]
    fn test_add_preserves_order_and_selects_first() {
        let queue = BatchQueue::new();
        let added = queue.add(vec![png("a.png"), png("b.png"), png("c.png")]).unwrap();

        assert_eq!(added.len(), 3);
        assert_eq!(ids(&queue), added);
        assert_eq!(queue.selected_id(), Some(added[0].clone()));
        assert!(queue.items().iter().all(|i| i.status == BatchItemStatus::Idle));
    }

    #[test]
    fn test_add_to_non_empty_queue_keeps_selection() {
        let queue = BatchQueue::new();
        let first = queue.add(vec![png("a.png")]).unwrap();
        queue.add(vec![png("b.png")]).unwrap();
        assert_eq!(queue.selected_id(), Some(first[0].clone()));
    }

    #[test]
    fn test_add_skips_non_images() {
        let queue = BatchQueue::new();
        let added = queue
            .add(vec![
                SourceImage::new("notes.txt", "text/plain", vec![1]),
                png("a.png"),
                SourceImage::new("doc.pdf", "application/pdf", vec![2]),
            ])
            .unwrap();
        assert_eq!(added.len(), 1);
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.get(&added[0]).unwrap().file_name(), "a.png");
    }

    #[test]
    fn test_only_non_images_leaves_selection_empty() {
        let queue = BatchQueue::new();
        queue
            .add(vec![SourceImage::new("notes.txt", "text/plain", vec![1])])
            .unwrap();
        assert!(queue.is_empty());
        assert!(queue.selected_id().is_none());
    }

    #[test]
    fn test_remove_selected_falls_back_to_last() {
        let queue = BatchQueue::new();
        let added = queue.add(vec![png("a.png"), png("b.png"), png("c.png")]).unwrap();

        queue.remove(&added[0]).unwrap();
        assert_eq!(queue.selected_id(), Some(added[2].clone()));
        assert_eq!(ids(&queue), vec![added[1].clone(), added[2].clone()]);
    }

    #[test]
    fn test_remove_unselected_keeps_selection() {
        let queue = BatchQueue::new();
        let added = queue.add(vec![png("a.png"), png("b.png")]).unwrap();
        queue.remove(&added[1]).unwrap();
        assert_eq!(queue.selected_id(), Some(added[0].clone()));
    }

    #[test]
    fn test_remove_last_item_clears_selection() {
        let queue = BatchQueue::new();
        let added = queue.add(vec![png("a.png")]).unwrap();
        queue.remove(&added[0]).unwrap();
        assert!(queue.selected_id().is_none());
        assert!(matches!(queue.remove(&added[0]), Err(QueueError::NotFound(_))));
    }

    #[test]
    fn test_clear() {
        let queue = BatchQueue::new();
        queue.add(vec![png("a.png"), png("b.png")]).unwrap();
        assert_eq!(queue.clear().unwrap(), 2);
        assert!(queue.is_empty());
        assert!(queue.selected().is_none());
    }

    #[test]
    fn test_update_status_lifecycle() {
        let queue = BatchQueue::new();
        let added = queue.add(vec![png("a.png"), png("b.png")]).unwrap();
        let id = &added[0];

        queue
            .update_status(id, BatchItemStatus::Processing, None, None)
            .unwrap();
        queue
            .update_status(
                id,
                BatchItemStatus::Completed,
                Some(TranslatedImage::new("image/png", vec![7])),
                Some("ignored".into()),
            )
            .unwrap();

        let item = queue.get(id).unwrap();
        assert_eq!(item.status, BatchItemStatus::Completed);
        assert_eq!(item.result.unwrap().bytes, vec![7]);
        assert!(item.error.is_none());

        let other = queue.get(&added[1]).unwrap();
        assert_eq!(other.status, BatchItemStatus::Idle);
    }

    #[test]
    fn test_error_then_retry_clears_error() {
        let queue = BatchQueue::new();
        let id = queue.add(vec![png("a.png")]).unwrap().remove(0);

        queue.update_status(&id, BatchItemStatus::Processing, None, None).unwrap();
        queue.update_status(&id, BatchItemStatus::Error, None, None).unwrap();
        assert_eq!(queue.get(&id).unwrap().error.as_deref(), Some("Unknown error"));

        queue.update_status(&id, BatchItemStatus::Processing, None, None).unwrap();
        let item = queue.get(&id).unwrap();
        assert!(item.error.is_none());
        assert!(item.result.is_none());
    }

    #[test]
    fn test_completed_is_terminal() {
        let queue = BatchQueue::new();
        let id = queue.add(vec![png("a.png")]).unwrap().remove(0);
        queue.update_status(&id, BatchItemStatus::Processing, None, None).unwrap();
        queue
            .update_status(
                &id,
                BatchItemStatus::Completed,
                Some(TranslatedImage::new("image/png", vec![1])),
                None,
            )
            .unwrap();

        let err = queue
            .update_status(&id, BatchItemStatus::Processing, None, None)
            .unwrap_err();
        assert!(matches!(err, QueueError::InvalidTransition { .. }));
    }

    #[test]
    fn test_completed_requires_result() {
        let queue = BatchQueue::new();
        let id = queue.add(vec![png("a.png")]).unwrap().remove(0);
        queue.update_status(&id, BatchItemStatus::Processing, None, None).unwrap();
        assert_eq!(
            queue.update_status(&id, BatchItemStatus::Completed, None, None),
            Err(QueueError::MissingResult(id.clone()))
        );
        assert_eq!(queue.get(&id).unwrap().status, BatchItemStatus::Processing);
    }

    #[test]
    fn test_pending_and_counts() {
        let queue = BatchQueue::new();
        let added = queue.add(vec![png("a.png"), png("b.png"), png("c.png")]).unwrap();
        queue.update_status(&added[0], BatchItemStatus::Processing, None, None).unwrap();
        queue.update_status(&added[1], BatchItemStatus::Processing, None, None).unwrap();
        queue
            .update_status(&added[1], BatchItemStatus::Error, None, Some("boom".into()))
            .unwrap();

        assert_eq!(queue.pending_ids(), vec![added[1].clone(), added[2].clone()]);

        let counts = queue.counts();
        assert_eq!(counts.processing, 1);
        assert_eq!(counts.error, 1);
        assert_eq!(counts.idle, 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_poisoned_lock_keeps_snapshots_and_rejects_writes() {
        let queue = BatchQueue::new();
        let added = queue.add(vec![png("a.png"), png("b.png")]).unwrap();

        let poisoned = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = queue.inner.lock().unwrap();
            panic!("writer crashed");
        }));
        assert!(poisoned.is_err());
        assert!(queue.inner.is_poisoned());

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pending_ids(), added);
        assert_eq!(queue.counts().idle, 2);
        assert_eq!(queue.selected_id(), Some(added[0].clone()));
        assert!(queue.get(&added[1]).is_some());

        assert!(matches!(
            queue.update_status(&added[0], BatchItemStatus::Processing, None, None),
            Err(QueueError::Lock(_))
        ));
    }

    #[test]
    fn test_select_unknown_id() {
        let queue = BatchQueue::new();
        let added = queue.add(vec![png("a.png"), png("b.png")]).unwrap();
        queue.select(&added[1]).unwrap();
        assert_eq!(queue.selected().unwrap().id, added[1]);
        assert!(queue.select("missing").is_err());
    }
}
