//! SqliteStore - the `queued_emails` table.
//!
//! One `rusqlite::Connection` behind a `std::sync::Mutex`; every call hops
//! onto the blocking pool with `spawn_blocking` so the async driver never
//! blocks on disk I/O.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};

use crate::domain::{DeliveryStatus, MessageId, MessageRecord, NewMessage, QueuedMessage};
use crate::error::StoreError;
use crate::ports::MessageStore;
use crate::ports::store::check_transition;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS queued_emails (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        status INTEGER NOT NULL DEFAULT 0,
        claimed_at INTEGER              -- unix millis of the last claim
    );
    CREATE INDEX IF NOT EXISTS idx_queued_emails_status ON queued_emails (status, id);
";

const SCAN_SQL: &str =
    "SELECT id, name, email FROM queued_emails WHERE status = ?1 ORDER BY id LIMIT ?2";

const TRANSITION_SQL: &str = "UPDATE queued_emails
     SET status = ?1, claimed_at = COALESCE(?2, claimed_at)
     WHERE id = ?3 AND status = ?4";

const REQUEUE_SQL: &str = "UPDATE queued_emails
     SET status = ?1, claimed_at = NULL
     WHERE status = ?2 AND claimed_at < ?3
     RETURNING id";

const INSERT_SQL: &str = "INSERT INTO queued_emails (name, email, status) VALUES (?1, ?2, ?3)";

const LIST_SQL: &str = "SELECT id, name, email, status, claimed_at FROM queued_emails ORDER BY id";

/// `MessageStore` on a SQLite database file.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable(format!("open {}: {e}", path.display())))?;
        Self::from_connection(conn)
    }

    /// Private in-memory database (tests, dry runs).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Unavailable(format!("open in-memory: {e}")))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        // A producer may write while the dispatcher holds the file.
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("connection mutex poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("blocking task failed: {e}")))?
    }
}

fn to_row_id(id: MessageId) -> i64 {
    id.get() as i64
}

fn from_row_id(id: i64) -> MessageId {
    MessageId::new(id as u64)
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn scan_queued(&self, limit: usize) -> Result<Vec<QueuedMessage>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(SCAN_SQL)?;
            let rows = stmt.query_map(params![DeliveryStatus::Queued.code(), limit], |row| {
                Ok(QueuedMessage {
                    id: from_row_id(row.get(0)?),
                    recipient_name: row.get(1)?,
                    recipient_address: row.get(2)?,
                })
            })?;
            let batch = rows.collect::<Result<Vec<_>, _>>()?;
            Ok(batch)
        })
        .await
    }

    async fn transition(
        &self,
        id: MessageId,
        from: DeliveryStatus,
        to: DeliveryStatus,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        check_transition(id, from, to)?;

        let claimed_at = (to == DeliveryStatus::InFlight).then(|| at.timestamp_millis());
        self.with_conn(move |conn| {
            let affected = conn.execute(
                TRANSITION_SQL,
                params![to.code(), claimed_at, to_row_id(id), from.code()],
            )?;
            Ok(affected > 0)
        })
        .await
    }

    async fn requeue_stale(&self, cutoff: DateTime<Utc>) -> Result<Vec<MessageId>, StoreError> {
        let cutoff_ms = cutoff.timestamp_millis();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare_cached(REQUEUE_SQL)?;
            let rows = stmt.query_map(
                params![
                    DeliveryStatus::Queued.code(),
                    DeliveryStatus::InFlight.code(),
                    cutoff_ms
                ],
                |row| row.get::<_, i64>(0),
            )?;
            let mut ids = rows
                .map(|r| r.map(from_row_id))
                .collect::<Result<Vec<_>, _>>()?;
            ids.sort();
            Ok(ids)
        })
        .await
    }

    async fn insert(&self, message: NewMessage) -> Result<MessageId, StoreError> {
        self.with_conn(move |conn| {
            conn.execute(
                INSERT_SQL,
                params![
                    message.recipient_name,
                    message.recipient_address,
                    DeliveryStatus::Queued.code()
                ],
            )?;
            Ok(from_row_id(conn.last_insert_rowid()))
        })
        .await
    }

    async fn list_all(&self) -> Result<Vec<MessageRecord>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(LIST_SQL)?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, Option<i64>>(4)?,
                ))
            })?;

            let mut records = Vec::new();
            for row in rows {
                let (id, name, email, code, claimed_at) = row?;
                let status =
                    DeliveryStatus::from_code(code).ok_or(StoreError::UnknownStatusCode(code))?;
                records.push(MessageRecord {
                    id: from_row_id(id),
                    recipient_name: name,
                    recipient_address: email,
                    status,
                    claimed_at: claimed_at.and_then(DateTime::<Utc>::from_timestamp_millis),
                });
            }
            Ok(records)
        })
        .await
    }
}
