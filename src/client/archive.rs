//! Long-term archive requests.

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::types::{ProductDescriptor, RequestHandle};

use super::SedasClient;

#[derive(Debug, Deserialize)]
struct ArchiveRequestResponse {
    #[serde(rename = "requestId")]
    request_id: String,
}

#[derive(Debug, Deserialize)]
struct RequestStatus {
    #[serde(rename = "downloadUrl", default)]
    download_url: Option<String>,
}

impl SedasClient {
    /// Ask the long-term archive to restore `product`
    ///
    /// Returns the request identifier to poll with [`is_request_ready`](Self::is_request_ready).
    pub async fn request(&self, product: &ProductDescriptor) -> Result<RequestHandle> {
        let supplier_id = product.id.as_str();
        if supplier_id.is_empty() {
            return Err(Error::InvalidDescriptor(
                "archive request needs a supplier id".to_string(),
            ));
        }

        let url = self.endpoint(&format!("request/{}", urlencoding::encode(supplier_id)))?;
        let timeout = self.config.timeout;
        let response = self
            .send_authorized(|http| http.post(url.clone()).timeout(timeout))
            .await?;
        let body: ArchiveRequestResponse = response.json().await?;

        tracing::debug!(
            product_id = supplier_id,
            request_id = %body.request_id,
            "SeDAS archive request accepted"
        );
        Ok(RequestHandle(body.request_id))
    }

    /// Check an archive request, returning the download URL once it is complete
    pub async fn is_request_ready(&self, request: &RequestHandle) -> Result<Option<String>> {
        let mut url = self.endpoint("request")?;
        url.query_pairs_mut().append_pair("ids", &request.0);
        let timeout = self.config.timeout;

        let response = self
            .send_authorized(|http| http.get(url.clone()).timeout(timeout))
            .await?;
        let statuses: Vec<RequestStatus> = response.json().await?;

        Ok(statuses
            .into_iter()
            .next()
            .and_then(|status| status.download_url)
            .filter(|url| !url.is_empty()))
    }
}
