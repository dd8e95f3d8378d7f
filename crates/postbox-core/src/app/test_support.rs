//! Fakes shared by the app-layer tests.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{DeliveryStatus, MessageId, MessageRecord, NewMessage, QueuedMessage};
use crate::error::{StoreError, TransportError};
use crate::impls::InMemoryStore;
use crate::ports::{MailTemplate, MailTransport, MessageStore, OutgoingMail};

/// Store with `n` queued rows: ids 1..=n, `user{i}@example.com`.
pub async fn seeded_store(n: usize) -> InMemoryStore {
    let store = InMemoryStore::new();
    for i in 0..n {
        store
            .insert(NewMessage::new(format!("user{i}"), format!("user{i}@example.com")))
            .await
            .unwrap();
    }
    store
}

pub fn template() -> MailTemplate {
    MailTemplate {
        from: "noreply@example.com".to_string(),
        subject: "Hello {name}".to_string(),
        body: "Hi {name}".to_string(),
    }
}

/// Wraps an `InMemoryStore`, fails on demand, and records scans and claims.
#[derive(Clone)]
pub struct FlakyStore {
    inner: InMemoryStore,
    fail_scans: Arc<AtomicBool>,
    fail_transitions: Arc<AtomicBool>,
    scans: Arc<AtomicUsize>,
    claims: Arc<Mutex<Vec<MessageId>>>,
}

impl FlakyStore {
    pub fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            fail_scans: Arc::new(AtomicBool::new(false)),
            fail_transitions: Arc::new(AtomicBool::new(false)),
            scans: Arc::new(AtomicUsize::new(0)),
            claims: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Number of `scan_queued` calls so far, failed ones included.
    pub fn scan_count(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }

    /// Ids that moved `Queued -> InFlight`, in the order the writes landed.
    pub async fn claimed_ids(&self) -> Vec<MessageId> {
        self.claims.lock().await.clone()
    }

    pub fn fail_scans(&self, fail: bool) {
        self.fail_scans.store(fail, Ordering::SeqCst);
    }

    pub fn fail_transitions(&self, fail: bool) {
        self.fail_transitions.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessageStore for FlakyStore {
    async fn scan_queued(&self, limit: usize) -> Result<Vec<QueuedMessage>, StoreError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        if self.fail_scans.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("scan refused".to_string()));
        }
        self.inner.scan_queued(limit).await
    }

    async fn transition(
        &self,
        id: MessageId,
        from: DeliveryStatus,
        to: DeliveryStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        if self.fail_transitions.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("write refused".to_string()));
        }
        let moved = self.inner.transition(id, from, to, at).await?;
        if moved && to == DeliveryStatus::InFlight {
            self.claims.lock().await.push(id);
        }
        Ok(moved)
    }

    async fn requeue_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<MessageId>, StoreError> {
        if self.fail_transitions.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("write refused".to_string()));
        }
        self.inner.requeue_stale(cutoff).await
    }

    async fn insert(&self, message: NewMessage) -> Result<MessageId, StoreError> {
        self.inner.insert(message).await
    }

    async fn list_all(&self) -> Result<Vec<MessageRecord>, StoreError> {
        self.inner.list_all().await
    }
}

/// Transport that remembers what it sent and tracks peak concurrency.
#[derive(Clone, Default)]
pub struct RecordingTransport {
    sent: Arc<Mutex<Vec<OutgoingMail>>>,
    failing: Arc<Mutex<HashSet<String>>>,
    delay: Option<Duration>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send sleeps for `delay` before completing.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn fail_for(&self, address: &str) {
        self.failing.lock().await.insert(address.to_string());
    }

    pub async fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().await.clone()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailTransport for RecordingTransport {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now_active, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = if self.failing.lock().await.contains(&mail.to_address) {
            Err(TransportError::Unreachable(format!(
                "no route to {}",
                mail.to_address
            )))
        } else {
            self.sent.lock().await.push(mail.clone());
            Ok(())
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
