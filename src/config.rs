//! Configuration types for sedas-dl
//!
//! Every struct deserializes with serde and falls back to documented defaults for
//! missing fields, so an empty JSON object is a valid configuration. Durations are
//! expressed in whole seconds.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for the bulk downloader
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Output directory, parallelism and file naming
    #[serde(default)]
    pub download: DownloadConfig,

    /// Retry behavior for transient failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Long-term-archive polling
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Progress reporting and shutdown
    #[serde(default)]
    pub monitor: MonitorConfig,
}

impl Config {
    /// Output directory
    pub fn output_dir(&self) -> &PathBuf {
        &self.download.output_dir
    }

    /// Check that every setting is usable
    ///
    /// Called by [`BulkDownloader::new`](crate::BulkDownloader::new); invalid settings
    /// are reported synchronously as [`Error::Config`] naming the offending key.
    pub fn validate(&self) -> Result<()> {
        if self.download.parallelism == 0 {
            return Err(Error::config(
                "download.parallelism",
                "parallelism must be at least 1",
            ));
        }
        if self.download.file_extension.trim().is_empty() {
            return Err(Error::config(
                "download.file_extension",
                "file extension must not be empty",
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::config(
                "retry.max_attempts",
                "max_attempts must be at least 1",
            ));
        }
        if !(self.retry.backoff_multiplier.is_finite() && self.retry.backoff_multiplier > 0.0) {
            return Err(Error::config(
                "retry.backoff_multiplier",
                format!(
                    "backoff multiplier must be positive, got {}",
                    self.retry.backoff_multiplier
                ),
            ));
        }
        if self.retry.initial_delay > self.retry.max_delay {
            return Err(Error::config(
                "retry.initial_delay",
                "initial delay must not exceed max_delay",
            ));
        }
        if self.archive.poll_interval.is_zero() {
            return Err(Error::config(
                "archive.poll_interval",
                "poll interval must be greater than zero",
            ));
        }
        if self.archive.max_polls == Some(0) {
            return Err(Error::config(
                "archive.max_polls",
                "max_polls must be at least 1 when set",
            ));
        }
        if matches!(self.monitor.progress_interval, Some(d) if d.is_zero()) {
            return Err(Error::config(
                "monitor.progress_interval",
                "progress interval must be greater than zero when set",
            ));
        }
        Ok(())
    }
}

/// Download behavior configuration (directories, concurrency, naming)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Directory products are written to (default: "./downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Number of parallel workers (default: 2)
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Extension appended to the product identifier to form the file name (default: "zip")
    #[serde(default = "default_file_extension")]
    pub file_extension: String,

    /// Create the output directory if it does not exist (default: true)
    #[serde(default = "default_true")]
    pub create_output_dir: bool,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            parallelism: default_parallelism(),
            file_extension: default_file_extension(),
            create_output_dir: true,
        }
    }
}

/// Retry configuration for transient failures
///
/// `max_attempts` bounds the number of retrieval attempts per product. After a
/// transient failure the product is requeued and waits an exponentially growing
/// delay before its next transfer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per product, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Long-term-archive request polling
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Wait between readiness polls (default: 30 seconds)
    ///
    /// Too short wastes API quota, too long delays completion.
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Give up on an archive request after this many polls (default: None = wait indefinitely)
    #[serde(default)]
    pub max_polls: Option<u32>,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            max_polls: None,
        }
    }
}

/// Progress reporting and shutdown behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Log queue statistics at this interval (default: None = disabled)
    #[serde(default, with = "optional_duration_serde")]
    pub progress_interval: Option<Duration>,

    /// How long `shutdown()` waits for in-flight work before aborting workers (default: 300 seconds)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            progress_interval: None,
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// SeDAS API client configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API root, must end with a slash (default: "https://geobrowser.satapps.org/api/")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Account username
    #[serde(default)]
    pub username: String,

    /// Account password
    #[serde(default)]
    pub password: String,

    /// Per-request timeout for API calls (default: 60 seconds)
    ///
    /// Product transfers are not bounded by this timeout.
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Log in again this long before the token expires (default: 300 seconds)
    #[serde(default = "default_token_refresh_margin", with = "duration_serde")]
    pub token_refresh_margin: Duration,

    /// Retry policy for search calls (default: 3 attempts)
    #[serde(default)]
    pub retry: RetryConfig,
}

impl ClientConfig {
    /// Configuration for the public SeDAS endpoint with the given credentials
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            ..Default::default()
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            username: String::new(),
            password: String::new(),
            timeout: default_request_timeout(),
            token_refresh_margin: default_token_refresh_margin(),
            retry: RetryConfig::default(),
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout", &self.timeout)
            .field("token_refresh_margin", &self.token_refresh_margin)
            .field("retry", &self.retry)
            .finish()
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_parallelism() -> usize {
    2
}

fn default_file_extension() -> String {
    "zip".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_base_url() -> String {
    "https://geobrowser.satapps.org/api/".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_token_refresh_margin() -> Duration {
    Duration::from_secs(300)
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
