//! Builders for a mock Companies House registry.

use std::sync::Arc;
use std::time::Duration;

use dumpany_core::{Endpoints, HttpClient, RateGovernor, RegistryClient, RetryPolicy};
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_KEY: &str = "test-key";

/// `Basic base64("test-key:")`.
pub const EXPECTED_AUTH: &str = "Basic dGVzdC1rZXk6";

/// A filing-history item in the current shape.
pub fn filing(transaction_id: &str, date: Option<&str>, description: &str, doc: Option<&str>) -> Value {
    let mut item = json!({
        "transaction_id": transaction_id,
        "date": date,
        "category": "accounts",
        "description": description,
        "type": "AA",
    });
    if let Some(doc) = doc {
        item["links"] = json!({ "document_metadata": format!("/document/{doc}") });
    }
    item
}

/// A filing-history item in the legacy shape.
pub fn legacy_filing(transaction_id: &str, date: &str, label: &str, doc: &str) -> Value {
    json!({
        "transaction_id": transaction_id,
        "date": date,
        "category": "miscellaneous",
        "description": "legacy",
        "description_values": { "description": label },
        "type": "363a",
        "links": { "document_metadata": format!("/document/{doc}") },
    })
}

pub async fn mount_profile(server: &MockServer, company: &str, name: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/company/{company}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "company_name": name })))
        .mount(server)
        .await;
}

/// Mounts one filing-history page, expected to be requested `times` times.
pub async fn mount_filing_page(
    server: &MockServer,
    company: &str,
    start_index: u64,
    items: Vec<Value>,
    times: u64,
) {
    Mock::given(method("GET"))
        .and(path(format!("/company/{company}/filing-history")))
        .and(query_param("start_index", start_index.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": items })))
        .expect(times)
        .mount(server)
        .await;
}

/// Mounts the metadata document pointing at `/document/{doc}/content`.
pub async fn mount_metadata(server: &MockServer, doc: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/document/{doc}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "links": { "document": format!("/document/{doc}/content") }
        })))
        .mount(server)
        .await;
}

/// Mounts metadata plus a content body, with the content fetched `times` times.
pub async fn mount_document(server: &MockServer, doc: &str, body: &[u8], times: u64) {
    mount_metadata(server, doc).await;
    Mock::given(method("GET"))
        .and(path(format!("/document/{doc}/content")))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/pdf")
                .set_body_bytes(body.to_vec()),
        )
        .expect(times)
        .mount(server)
        .await;
}

/// A registry client against `server` with fast, jitter-free retries.
pub fn registry_client(server: &MockServer, max_attempts: u32) -> Arc<RegistryClient> {
    registry_client_with_governor(
        server,
        max_attempts,
        Arc::new(RateGovernor::new(1_000, Duration::from_secs(60))),
    )
}

/// As [`registry_client`], drawing from `governor`.
pub fn registry_client_with_governor(
    server: &MockServer,
    max_attempts: u32,
    governor: Arc<RateGovernor>,
) -> Arc<RegistryClient> {
    Arc::new(RegistryClient::new(
        HttpClient::new(API_KEY).expect("client builds"),
        governor,
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(5),
            Duration::from_millis(20),
            2.0,
        )
        .with_max_jitter(Duration::ZERO),
        Endpoints::single(server.uri()),
    ))
}
