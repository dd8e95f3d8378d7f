//! Dispatcher configuration (TOML).
//!
//! Every field has a default, so an empty file is a valid config:
//!
//! ```toml
//! [poll]
//! idle_delay_ms = 2000
//! batch_limit = 500
//! max_concurrent_deliveries = 32
//! shutdown_grace_ms = 10000
//!
//! [reaper]
//! # visibility_timeout_secs = 600   # unset = never requeue
//! interval_secs = 30
//!
//! [store]
//! path = "postbox.db"
//!
//! [mail]
//! from = "noreply@localhost"
//! subject = "Hello {name}"
//! body = "..."
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ports::MailTemplate;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostboxConfig {
    #[serde(default)]
    pub poll: PollConfig,
    #[serde(default)]
    pub reaper: ReaperConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub mail: MailConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Pause between cycles, whether or not work was found.
    #[serde(default = "default_idle_delay_ms")]
    pub idle_delay_ms: u64,

    /// Maximum rows fetched per cycle.
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,

    /// Upper bound on simultaneous delivery workers.
    #[serde(default = "default_max_concurrent_deliveries")]
    pub max_concurrent_deliveries: usize,

    /// How long shutdown waits for in-flight workers before aborting them.
    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaperConfig {
    /// Age after which an InFlight row is requeued. `None` disables the sweep.
    #[serde(default)]
    pub visibility_timeout_secs: Option<u64>,

    #[serde(default = "default_reaper_interval_secs")]
    pub interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default = "default_from")]
    pub from: String,
    #[serde(default = "default_subject")]
    pub subject: String,
    #[serde(default = "default_body")]
    pub body: String,
}

fn default_idle_delay_ms() -> u64 {
    2_000
}

fn default_batch_limit() -> usize {
    500
}

fn default_max_concurrent_deliveries() -> usize {
    32
}

fn default_shutdown_grace_ms() -> u64 {
    10_000
}

fn default_reaper_interval_secs() -> u64 {
    30
}

fn default_store_path() -> PathBuf {
    PathBuf::from("postbox.db")
}

fn default_from() -> String {
    "noreply@localhost".into()
}

fn default_subject() -> String {
    "Hello {name}".into()
}

fn default_body() -> String {
    "Hi {name},\r\n\r\nThis is a message from postbox.\r\n".into()
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            idle_delay_ms: default_idle_delay_ms(),
            batch_limit: default_batch_limit(),
            max_concurrent_deliveries: default_max_concurrent_deliveries(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
        }
    }
}

impl PollConfig {
    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            visibility_timeout_secs: None,
            interval_secs: default_reaper_interval_secs(),
        }
    }
}

impl ReaperConfig {
    pub fn visibility_timeout(&self) -> Option<Duration> {
        self.visibility_timeout_secs.map(Duration::from_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: default_from(),
            subject: default_subject(),
            body: default_body(),
        }
    }
}

impl MailConfig {
    pub fn template(&self) -> MailTemplate {
        MailTemplate {
            from: self.from.clone(),
            subject: self.subject.clone(),
            body: self.body.clone(),
        }
    }
}

impl PostboxConfig {
    /// Read, parse and validate a TOML file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll.batch_limit == 0 {
            return Err(ConfigError::Invalid("poll.batch_limit must be > 0".into()));
        }
        if self.poll.max_concurrent_deliveries == 0 {
            return Err(ConfigError::Invalid(
                "poll.max_concurrent_deliveries must be > 0".into(),
            ));
        }
        if self.reaper.visibility_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "reaper.visibility_timeout_secs must be > 0 when set".into(),
            ));
        }
        if self.reaper.interval_secs == 0 {
            return Err(ConfigError::Invalid("reaper.interval_secs must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = PostboxConfig::from_toml_str("").unwrap();
        assert_eq!(config, PostboxConfig::default());
        assert_eq!(config.poll.idle_delay(), Duration::from_secs(2));
        assert_eq!(config.poll.batch_limit, 500);
        assert!(config.reaper.visibility_timeout().is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = PostboxConfig::from_toml_str(
            r#"
            [poll]
            batch_limit = 2

            [reaper]
            visibility_timeout_secs = 600
            "#,
        )
        .unwrap();

        assert_eq!(config.poll.batch_limit, 2);
        assert_eq!(config.poll.idle_delay_ms, 2_000);
        assert_eq!(
            config.reaper.visibility_timeout(),
            Some(Duration::from_secs(600))
        );
        assert_eq!(config.reaper.interval_secs, 30);
    }

    #[test]
    fn zero_batch_limit_is_invalid() {
        let err = PostboxConfig::from_toml_str("[poll]\nbatch_limit = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_concurrency_is_invalid() {
        let err =
            PostboxConfig::from_toml_str("[poll]\nmax_concurrent_deliveries = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_concurrent_deliveries"));
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let err = PostboxConfig::from_toml_str("[poll\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = PostboxConfig::load_from(Path::new("/nonexistent/postbox.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn mail_template_comes_from_config() {
        let config = PostboxConfig::from_toml_str(
            "[mail]\nfrom = \"ops@example.com\"\nsubject = \"Hi {name}\"\n",
        )
        .unwrap();
        let template = config.mail.template();
        assert_eq!(template.from, "ops@example.com");
        assert_eq!(template.subject, "Hi {name}");
    }
}
