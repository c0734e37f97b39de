//! Mock SeDAS API fixtures

use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Area of interest used by the sample searches
pub const SAMPLE_AOI: &str = "POLYGON ((-78.0294047453918 7.54828534191209,-75.5410318208992 4.9335544228762,-73.5283895711597 6.84893487157956,-76.0167624956523 9.46366579061545,-78.0294047453918 7.54828534191209))";

/// Start a mock SeDAS server; returns the server and the API root URL
pub async fn start_sedas() -> (MockServer, String) {
    let server = MockServer::start().await;
    let base_url = format!("{}/api/", server.uri());

    Mock::given(method("POST"))
        .and(path("/api/authentication"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "integration-token",
            "validUntil": (chrono::Utc::now() + chrono::Duration::hours(1))
                .format("%Y-%m-%dT%H:%M:%SZ")
                .to_string(),
        })))
        .mount(&server)
        .await;

    (server, base_url)
}

/// Search results for `direct` (downloadable) and `archived` product ids
pub fn search_results(server: &MockServer, direct: &[&str], archived: &[&str]) -> serde_json::Value {
    let mut products: Vec<serde_json::Value> = direct
        .iter()
        .map(|id| {
            json!({
                "supplierId": id,
                "downloadUrl": product_url(server, id),
                "satelliteName": "Sentinel-1A",
            })
        })
        .collect();
    products.extend(archived.iter().map(|id| {
        json!({
            "supplierId": id,
            "satelliteName": "Sentinel-1A",
        })
    }));
    json!({ "products": products })
}

/// Mount a search endpoint answering with `body`
pub async fn mount_search(server: &MockServer, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/api/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Download URL the mock serves `id` from
pub fn product_url(server: &MockServer, id: &str) -> String {
    format!("{}/files/{}.zip", server.uri(), id)
}

/// Payload served for `id`
pub fn product_bytes(id: &str) -> Vec<u8> {
    format!("SAFE archive contents of {id}").into_bytes()
}

/// Serve `id` as a downloadable file
pub async fn mount_product(server: &MockServer, id: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/files/{id}.zip")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(product_bytes(id)))
        .mount(server)
        .await;
}

/// Accept an archive request for `id` and report it ready after `pending_polls` polls
pub async fn mount_archive(server: &MockServer, id: &str, pending_polls: u64) {
    let request_id = format!("req-{id}");

    Mock::given(method("POST"))
        .and(path(format!("/api/request/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "requestId": request_id })))
        .expect(1)
        .mount(server)
        .await;

    if pending_polls > 0 {
        Mock::given(method("GET"))
            .and(path("/api/request"))
            .and(query_param("ids", request_id.as_str()))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{ "requestId": request_id, "status": "processing" }])),
            )
            .up_to_n_times(pending_polls)
            .mount(server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/api/request"))
        .and(query_param("ids", request_id.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "requestId": request_id,
            "downloadUrl": product_url(server, id),
        }])))
        .mount(server)
        .await;

    mount_product(server, id).await;
}
