//! Test configuration helpers for loading .env credentials and creating test downloaders

use std::sync::Arc;
use std::time::Duration;

use sedas_dl::{BulkDownloader, ClientConfig, Config, RetryConfig, SedasClient};
use tempfile::TempDir;

/// Error type for test configuration
#[derive(Debug)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Config error: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Retry policy with millisecond delays
pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(5),
        max_delay: Duration::from_millis(20),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

/// Client configuration pointing at a mock SeDAS API rooted at `base_url`
pub fn mock_client_config(base_url: &str) -> ClientConfig {
    ClientConfig {
        base_url: base_url.to_string(),
        retry: fast_retry(),
        ..ClientConfig::new("tester", "secret")
    }
}

/// Downloader configuration writing into `dir` with millisecond poll and retry delays
pub fn fast_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.download.output_dir = dir.path().join("products");
    config.download.parallelism = 2;
    config.retry = fast_retry();
    config.archive.poll_interval = Duration::from_millis(10);
    config.monitor.progress_interval = Some(Duration::from_millis(50));
    config.monitor.shutdown_timeout = Duration::from_secs(5);
    config
}

/// Build a client and downloader against a mock SeDAS API
pub async fn create_mock_downloader(
    base_url: &str,
) -> (Arc<SedasClient>, BulkDownloader, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let client = Arc::new(SedasClient::new(mock_client_config(base_url)).unwrap());
    let downloader = BulkDownloader::new(client.clone(), fast_config(&temp_dir))
        .await
        .unwrap();
    (client, downloader, temp_dir)
}

/// Load SeDAS credentials from environment variables
///
/// Required environment variables:
/// - `SEDAS_USERNAME` - Account username
/// - `SEDAS_PASSWORD` - Account password
///
/// Optional environment variables:
/// - `SEDAS_BASE_URL` - API root (default: the public endpoint)
pub fn load_client_config() -> Result<ClientConfig, ConfigError> {
    dotenvy::dotenv().ok();

    let username = std::env::var("SEDAS_USERNAME")
        .map_err(|_| ConfigError("SEDAS_USERNAME not set in environment".to_string()))?;
    let password = std::env::var("SEDAS_PASSWORD")
        .map_err(|_| ConfigError("SEDAS_PASSWORD not set in environment".to_string()))?;

    let mut config = ClientConfig::new(username, password);
    if let Ok(base_url) = std::env::var("SEDAS_BASE_URL") {
        config.base_url = base_url;
    }
    Ok(config)
}

/// Check if live SeDAS credentials are available
pub fn has_live_credentials() -> bool {
    load_client_config().is_ok()
}
