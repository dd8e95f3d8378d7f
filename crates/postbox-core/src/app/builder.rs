//! PostboxBuilder - wires config and adapters into a runnable dispatcher.
//!
//! # Fail-fast
//! `build()` validates the config and opens the store before anything is
//! spawned, so a bad config or an unreachable database is a startup error
//! and never a runtime one.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::claim::ClaimStep;
use super::delivery::DeliveryWorker;
use super::poll_loop::{CycleReport, PollDriver, PollSettings};
use super::reaper_loop::ReaperLoop;
use super::recorder::OutcomeRecorder;
use super::scanner::BatchScanner;
use crate::config::PostboxConfig;
use crate::error::PostboxError;
use crate::impls::{LogTransport, SqliteStore};
use crate::ports::{Clock, MailTransport, MessageStore, SystemClock, UlidGenerator};

/// Unset adapters fall back to `SqliteStore` at `store.path`, `LogTransport`
/// and `SystemClock`.
///
/// ```ignore
/// let postbox = PostboxBuilder::new(config)
///     .store(Arc::new(InMemoryStore::new()))
///     .build()?;
/// let handle = postbox.spawn();
/// ```
pub struct PostboxBuilder {
    config: PostboxConfig,
    store: Option<Arc<dyn MessageStore>>,
    transport: Option<Arc<dyn MailTransport>>,
    clock: Option<Arc<dyn Clock>>,
}

impl PostboxBuilder {
    pub fn new(config: PostboxConfig) -> Self {
        Self {
            config,
            store: None,
            transport: None,
            clock: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn MessageStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn MailTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<Postbox, PostboxError> {
        let config = self.config;
        config.validate()?;

        let store: Arc<dyn MessageStore> = match self.store {
            Some(store) => store,
            None => Arc::new(SqliteStore::open(&config.store.path)?),
        };
        let transport: Arc<dyn MailTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(LogTransport::new()),
        };
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(SystemClock),
        };

        let recorder = Arc::new(OutcomeRecorder::new(Arc::clone(&store), Arc::clone(&clock)));
        let driver = PollDriver::new(
            BatchScanner::new(Arc::clone(&store), config.poll.batch_limit),
            ClaimStep::new(Arc::clone(&store), Arc::clone(&clock)),
            DeliveryWorker::new(transport, config.mail.template(), recorder),
            Arc::new(UlidGenerator::new(Arc::clone(&clock))),
            PollSettings::from(&config.poll),
        );

        let reaper = config.reaper.visibility_timeout().map(|timeout| {
            ReaperLoop::new(
                Arc::clone(&store),
                Arc::clone(&clock),
                timeout,
                config.reaper.interval(),
            )
        });

        Ok(Postbox {
            store,
            driver,
            reaper,
        })
    }
}

/// A built dispatcher, not yet running.
pub struct Postbox {
    store: Arc<dyn MessageStore>,
    driver: PollDriver,
    reaper: Option<ReaperLoop>,
}

impl Postbox {
    pub fn store(&self) -> Arc<dyn MessageStore> {
        Arc::clone(&self.store)
    }

    pub fn reaper_enabled(&self) -> bool {
        self.reaper.is_some()
    }

    /// Drive one cycle in the foreground.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.driver.run_cycle().await
    }

    /// Start the poll loop (and the reaper, if configured) on the runtime.
    pub fn spawn(self) -> PostboxHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut joins = Vec::with_capacity(2);
        joins.push(tokio::spawn(self.driver.run(shutdown_rx.clone())));
        if let Some(reaper) = self.reaper {
            joins.push(tokio::spawn(reaper.run(shutdown_rx)));
        }

        PostboxHandle { shutdown_tx, joins }
    }
}

/// Running dispatcher.
/// - dropping `shutdown_tx` also stops every loop
/// - `shutdown_and_join()` waits for in-flight deliveries (up to the grace)
pub struct PostboxHandle {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl PostboxHandle {
    /// Stop claiming new work. In-flight sends keep running.
    pub fn request_shutdown(&self) {
        // receivers may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for join in self.joins {
            if let Err(err) = join.await {
                tracing::error!(error = %err, "dispatcher task ended abnormally");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::status::status_counts;
    use crate::app::test_support::{RecordingTransport, seeded_store};
    use crate::error::ConfigError;
    use crate::impls::InMemoryStore;
    use std::time::Duration;

    fn fast_config() -> PostboxConfig {
        let mut config = PostboxConfig::default();
        config.poll.idle_delay_ms = 10;
        config
    }

    #[test]
    fn invalid_config_fails_build() {
        let mut config = PostboxConfig::default();
        config.poll.batch_limit = 0;

        let result = PostboxBuilder::new(config)
            .store(Arc::new(InMemoryStore::new()))
            .build();
        assert!(matches!(
            result,
            Err(PostboxError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[test]
    fn reaper_follows_visibility_timeout() {
        let disabled = PostboxBuilder::new(PostboxConfig::default())
            .store(Arc::new(InMemoryStore::new()))
            .build()
            .unwrap();
        assert!(!disabled.reaper_enabled());

        let mut config = PostboxConfig::default();
        config.reaper.visibility_timeout_secs = Some(600);
        let enabled = PostboxBuilder::new(config)
            .store(Arc::new(InMemoryStore::new()))
            .build()
            .unwrap();
        assert!(enabled.reaper_enabled());
    }

    #[tokio::test]
    async fn default_store_is_sqlite_at_configured_path() {
        let path = std::env::temp_dir().join(format!("postbox-{}.db", ulid::Ulid::new()));
        let mut config = PostboxConfig::default();
        config.store.path = path.clone();

        let postbox = PostboxBuilder::new(config).build().unwrap();
        let counts = status_counts(postbox.store().as_ref()).await.unwrap();
        assert_eq!(counts.total(), 0);
        assert!(path.exists());

        drop(postbox);
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn foreground_cycle_uses_configured_template() {
        let store = seeded_store(2).await;
        let transport = RecordingTransport::new();
        let mut config = fast_config();
        config.mail.subject = "Welcome, {name}".to_string();

        let mut postbox = PostboxBuilder::new(config)
            .store(Arc::new(store))
            .transport(Arc::new(transport.clone()))
            .build()
            .unwrap();

        assert_eq!(postbox.run_cycle().await.claimed, 2);
        postbox.driver.drain().await;

        let mut subjects: Vec<String> = transport
            .sent()
            .await
            .into_iter()
            .map(|m| m.subject)
            .collect();
        subjects.sort();
        assert_eq!(subjects, vec!["Welcome, user0", "Welcome, user1"]);
    }

    #[tokio::test]
    async fn spawned_dispatcher_drains_queue_and_stops() {
        let store = seeded_store(5).await;
        let transport = RecordingTransport::new();
        let handle = PostboxBuilder::new(fast_config())
            .store(Arc::new(store.clone()))
            .transport(Arc::new(transport.clone()))
            .build()
            .unwrap()
            .spawn();

        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if status_counts(&store).await.unwrap().delivered == 5 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("queue was not drained");

        tokio::time::timeout(Duration::from_secs(5), handle.shutdown_and_join())
            .await
            .expect("dispatcher did not stop");
        assert_eq!(transport.sent().await.len(), 5);
    }
}
