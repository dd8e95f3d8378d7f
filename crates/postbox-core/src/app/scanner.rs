//! BatchScanner - bounded read of `Queued` rows.

use std::sync::Arc;

use crate::domain::QueuedMessage;
use crate::ports::MessageStore;

/// One-shot, finite sequence of candidates for a single cycle.
///
/// Consuming it yields the projections in the order the store returned them.
#[derive(Debug)]
pub struct ScanBatch {
    inner: std::vec::IntoIter<QueuedMessage>,
}

impl ScanBatch {
    pub fn empty() -> Self {
        Self::from(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.len() == 0
    }
}

impl From<Vec<QueuedMessage>> for ScanBatch {
    fn from(messages: Vec<QueuedMessage>) -> Self {
        Self {
            inner: messages.into_iter(),
        }
    }
}

impl Iterator for ScanBatch {
    type Item = QueuedMessage;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for ScanBatch {}

/// Reads up to `batch_limit` queued rows per call.
///
/// Read-only. A store error is logged and turned into an empty batch so the
/// cycle simply finds no work.
pub struct BatchScanner {
    store: Arc<dyn MessageStore>,
    batch_limit: usize,
}

impl BatchScanner {
    pub fn new(store: Arc<dyn MessageStore>, batch_limit: usize) -> Self {
        Self { store, batch_limit }
    }

    pub fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    pub async fn scan(&self) -> ScanBatch {
        match self.store.scan_queued(self.batch_limit).await {
            Ok(messages) => ScanBatch::from(messages),
            Err(err) => {
                tracing::warn!(error = %err, "scan failed, cycle finds no work");
                ScanBatch::empty()
            }
        }
    }
}
