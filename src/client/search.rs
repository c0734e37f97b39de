//! Product search.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::types::ProductDescriptor;

use super::SedasClient;

/// Timestamp format the search endpoint expects
const SEARCH_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Kind of sensor to search for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Sensor {
    /// Every sensor type
    #[default]
    All,
    /// Synthetic aperture radar
    #[serde(rename = "SAR")]
    Sar,
    /// Optical imagery
    Optical,
}

/// Search parameters
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use sedas_dl::client::{SearchQuery, Sensor};
///
/// let query = SearchQuery::new(
///     "POLYGON ((-78.03 7.55, -75.54 4.93, -73.53 6.85, -76.02 9.46, -78.03 7.55))",
///     Utc.with_ymd_and_hms(2019, 4, 30, 0, 0, 0).unwrap(),
///     Utc.with_ymd_and_hms(2019, 5, 30, 23, 59, 59).unwrap(),
/// )
/// .sensor(Sensor::Sar)
/// .satellite_name("Sentinel-1A")
/// .filter("polarisation", "VV");
///
/// assert_eq!(query.sensor, Sensor::Sar);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Area of interest as WKT
    pub aoi_wkt: String,
    /// Start of the acquisition window
    pub start: DateTime<Utc>,
    /// End of the acquisition window
    pub stop: DateTime<Utc>,
    /// Sensor type (default: all)
    pub sensor: Sensor,
    /// Restrict to one satellite
    pub satellite_name: Option<String>,
    /// Restrict to one source group
    pub source_group: Option<String>,
    /// Additional product filters, passed through as-is
    pub filters: serde_json::Map<String, serde_json::Value>,
}

impl SearchQuery {
    /// Search every sensor over `aoi_wkt` between `start` and `stop`
    pub fn new(aoi_wkt: impl Into<String>, start: DateTime<Utc>, stop: DateTime<Utc>) -> Self {
        Self {
            aoi_wkt: aoi_wkt.into(),
            start,
            stop,
            sensor: Sensor::All,
            satellite_name: None,
            source_group: None,
            filters: serde_json::Map::new(),
        }
    }

    /// Restrict to a sensor type
    pub fn sensor(mut self, sensor: Sensor) -> Self {
        self.sensor = sensor;
        self
    }

    /// Restrict to a satellite
    pub fn satellite_name(mut self, name: impl Into<String>) -> Self {
        self.satellite_name = Some(name.into());
        self
    }

    /// Restrict to a source group
    pub fn source_group(mut self, group: impl Into<String>) -> Self {
        self.source_group = Some(group.into());
        self
    }

    /// Add a product filter
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    fn to_request(&self) -> SearchRequest<'_> {
        SearchRequest {
            sensor_filters: SensorFilters { kind: self.sensor },
            filters: &self.filters,
            aoi_wkt: &self.aoi_wkt,
            start: self.start.format(SEARCH_TIME_FORMAT).to_string(),
            stop: self.stop.format(SEARCH_TIME_FORMAT).to_string(),
            satellite_name: self.satellite_name.as_deref(),
            source_group: self.source_group.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    sensor_filters: SensorFilters,
    filters: &'a serde_json::Map<String, serde_json::Value>,
    #[serde(rename = "aoiWKT")]
    aoi_wkt: &'a str,
    start: String,
    stop: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    satellite_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_group: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct SensorFilters {
    #[serde(rename = "type")]
    kind: Sensor,
}

/// Search results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Matching products, ready to pass to [`BulkDownloader::add`](crate::BulkDownloader::add)
    #[serde(default)]
    pub products: Vec<ProductDescriptor>,
}

impl SedasClient {
    /// Search for products
    ///
    /// Transient failures are retried according to the client's retry policy.
    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResponse> {
        let url = &self.endpoint("search")?;
        let body = &query.to_request();
        let timeout = self.config.timeout;

        let response: SearchResponse = with_retry(&self.config.retry, || async move {
            let response = self
                .send_authorized(|http| http.post(url.clone()).timeout(timeout).json(body))
                .await?;
            Ok::<_, Error>(response.json::<SearchResponse>().await?)
        })
        .await?;

        tracing::info!(
            sensor = ?query.sensor,
            results = response.products.len(),
            "SeDAS search complete"
        );
        Ok(response)
    }

    /// Search for SAR products only
    pub async fn search_sar(&self, query: SearchQuery) -> Result<SearchResponse> {
        self.search(&query.sensor(Sensor::Sar)).await
    }

    /// Search for optical products only
    pub async fn search_optical(&self, query: SearchQuery) -> Result<SearchResponse> {
        self.search(&query.sensor(Sensor::Optical)).await
    }

    /// Look up a known product by its supplier identifier
    pub async fn search_product(&self, product_id: &str) -> Result<SearchResponse> {
        let mut url = self.endpoint("search/products")?;
        url.query_pairs_mut().append_pair("ids", product_id);
        let url = &url;
        let timeout = self.config.timeout;

        with_retry(&self.config.retry, || async move {
            let response = self
                .send_authorized(|http| http.get(url.clone()).timeout(timeout))
                .await?;
            Ok(response.json::<SearchResponse>().await?)
        })
        .await
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_search_request_wire_format() {
        let query = SearchQuery::new(
            "POINT (0 0)",
            Utc.with_ymd_and_hms(2019, 4, 30, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2019, 5, 30, 23, 59, 59).unwrap(),
        )
        .sensor(Sensor::Sar)
        .source_group("sentinel")
        .filter("polarisation", "VV");

        let json = serde_json::to_value(query.to_request()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "sensorFilters": {"type": "SAR"},
                "filters": {"polarisation": "VV"},
                "aoiWKT": "POINT (0 0)",
                "start": "2019-04-30T00:00:00Z",
                "stop": "2019-05-30T23:59:59Z",
                "sourceGroup": "sentinel"
            })
        );
    }

    #[test]
    fn test_default_query_searches_all_sensors() {
        let now = Utc::now();
        let json = serde_json::to_value(SearchQuery::new("POINT (0 0)", now, now).to_request())
            .unwrap();
        assert_eq!(json["sensorFilters"]["type"], "All");
        assert!(json.get("satelliteName").is_none());
        assert!(json.get("sourceGroup").is_none());
    }

    #[test]
    fn test_response_without_products_is_empty() {
        let response: SearchResponse = serde_json::from_str("{}").unwrap();
        assert!(response.products.is_empty());
    }
}
