//! Search and bulk download example
//!
//! This example demonstrates the core functionality of sedas-dl:
//! - Searching SeDAS for SAR products over an area of interest
//! - Creating a bulk downloader over the search results
//! - Subscribing to events
//! - Waiting for every product (including long-term archive ones) to finish
//!
//! Credentials come from `SEDAS_USERNAME` / `SEDAS_PASSWORD` (a `.env` file works too):
//!
//! ```bash
//! SEDAS_USERNAME=me SEDAS_PASSWORD=secret cargo run --example search_and_download
//! ```

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use sedas_dl::config::{Config, DownloadConfig, MonitorConfig};
use sedas_dl::{BulkDownloader, ClientConfig, Event, SearchQuery, SedasClient, run_with_shutdown};

const AOI_WKT: &str = "POLYGON ((-78.0294047453918 7.54828534191209,-75.5410318208992 4.9335544228762,-73.5283895711597 6.84893487157956,-76.0167624956523 9.46366579061545,-78.0294047453918 7.54828534191209))";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sedas_dl=info".into()),
        )
        .init();

    dotenvy::dotenv().ok();
    let username = std::env::var("SEDAS_USERNAME")?;
    let password = std::env::var("SEDAS_PASSWORD")?;
    let client = Arc::new(SedasClient::new(ClientConfig::new(username, password))?);

    // Search
    let query = SearchQuery::new(
        AOI_WKT,
        Utc.with_ymd_and_hms(2019, 4, 30, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2019, 5, 30, 23, 59, 59).unwrap(),
    );
    let results = client.search_sar(query).await?;
    println!("Found {} products", results.products.len());

    // Build configuration
    let config = Config {
        download: DownloadConfig {
            output_dir: "sedas-products".into(),
            parallelism: 3,
            ..Default::default()
        },
        monitor: MonitorConfig {
            progress_interval: Some(Duration::from_secs(30)),
            ..Default::default()
        },
        ..Default::default()
    };

    // Create downloader instance
    let downloader = BulkDownloader::new(client, config).await?;

    // Subscribe to events
    let mut events = downloader.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::ArchiveRequested { id, request } => {
                    println!("{id}: requested from archive ({request})");
                }
                Event::AwaitingArchive { id, polls } => {
                    println!("{id}: still restoring (check {polls})");
                }
                Event::Downloading { id, attempt } => {
                    println!("{id}: downloading (attempt {attempt})");
                }
                Event::Retrying { id, error, delay_ms, .. } => {
                    println!("{id}: {error}, retrying in {delay_ms} ms");
                }
                Event::Complete { id, path } => println!("{id}: saved to {}", path.display()),
                Event::Failed { id, error } => println!("{id}: FAILED ({error})"),
                Event::Queued { .. } | Event::Shutdown => {}
            }
        }
    });

    downloader.add(results.products).await?;

    // Ctrl+C stops early; in-flight transfers still finish
    let outcomes = run_with_shutdown(downloader, Duration::from_secs(5)).await?;

    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    println!("{} of {} products downloaded", succeeded, outcomes.len());
    for failed in outcomes.iter().filter(|o| !o.is_success()) {
        println!(
            "  {}: {}",
            failed.product_id,
            failed.error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(())
}
