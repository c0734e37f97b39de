//! Streaming product transfer.

use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::error::Result;

use super::SedasClient;

impl SedasClient {
    /// Download `url` into `destination`, returning the number of bytes written
    ///
    /// The body is streamed chunk by chunk; the file is flushed and synced before
    /// returning. `destination` is created or truncated.
    pub async fn download_to(&self, url: &str, destination: &Path) -> Result<u64> {
        let url = url::Url::parse(url)?;
        let mut response = self
            .send_authorized(|http| http.get(url.clone()))
            .await?;

        let mut file = tokio::fs::File::create(destination).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;

        tracing::debug!(
            url = %url,
            path = %destination.display(),
            bytes = written,
            "SeDAS transfer complete"
        );
        Ok(written)
    }
}
