//! Tests for CommerceClient against a simulated store

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared::StoreCredential;

use super::common::RecordingSleeper;
use crate::core::rate_governor::{ApiUsage, RateGovernor};
use crate::error::{ErrorKind, MigrationError};
use crate::services::commerce_client::{CommerceClient, retry_after_from};
use crate::traits::StoreApi;

const TOKEN: &str = "shpat_test_token";

async fn client_for(server: &MockServer) -> (CommerceClient, Arc<RecordingSleeper>) {
    let sleeper = Arc::new(RecordingSleeper::default());
    let credential = StoreCredential::new(format!("{}/admin/api/2024-07", server.uri()), TOKEN).unwrap();
    let client = CommerceClient::new(credential, RateGovernor::default(), sleeper.clone())
        .unwrap()
        .with_label("test-store");
    (client, sleeper)
}

#[tokio::test]
async fn test_get_authenticates_and_tracks_usage() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/api/2024-07/orders.json"))
        .and(query_param("limit", "5"))
        .and(header("X-Shopify-Access-Token", TOKEN))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Shopify-Shop-Api-Call-Limit", "12/40")
                .set_body_json(json!({"orders": [{"id": 1}]})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (mut client, sleeper) = client_for(&server).await;
    let response = client.get("/orders.json?limit=5").await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body["orders"][0]["id"], 1);
    assert_eq!(client.rate_state().usage, Some(ApiUsage { current: 12, total: 40 }));
    assert!(!client.rate_state().throttled);
    assert_eq!(sleeper.calls(), vec![Duration::from_millis(150)]);
    assert_eq!(client.store_label(), "test-store");
}

#[tokio::test]
async fn test_throttled_state_delays_next_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Shopify-Shop-Api-Call-Limit", "39/40")
                .set_body_json(json!({"products": []})),
        )
        .mount(&server)
        .await;

    let (mut client, sleeper) = client_for(&server).await;
    client.get("/products.json").await.unwrap();
    assert!(client.rate_state().throttled);

    client.get("/products.json").await.unwrap();
    assert_eq!(
        sleeper.calls(),
        vec![
            Duration::from_millis(150),
            Duration::from_secs(10),
            Duration::from_millis(150)
        ]
    );
}

#[tokio::test]
async fn test_missing_usage_header_resets_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/admin/api/2024-07/first.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Shopify-Shop-Api-Call-Limit", "79/80")
                .set_body_json(json!({})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/api/2024-07/second.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&server)
        .await;

    let (mut client, _) = client_for(&server).await;
    client.get("/first.json").await.unwrap();
    assert!(client.rate_state().throttled);
    client.get("/second.json").await.unwrap();
    assert_eq!(client.rate_state().usage, None);
    assert!(!client.rate_state().throttled);
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/admin/api/2024-07/orders.json"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "2.0")
                .set_body_json(json!({"errors": "Exceeded 2 calls per second for api client. Reduce request rates to resume uninterrupted service."})),
        )
        .mount(&server)
        .await;

    let (mut client, sleeper) = client_for(&server).await;
    let err = client.post("/orders.json", &json!({"order": {}})).await.unwrap_err();

    assert!(err.is_rate_limited());
    assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
    match err {
        MigrationError::Api { body, .. } => assert!(body.as_str().unwrap().starts_with("Exceeded")),
        other => panic!("unexpected error {other:?}"),
    }
    // No pacing after a rejection
    assert!(sleeper.calls().is_empty());
}

#[tokio::test]
async fn test_validation_rejection_keeps_error_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/admin/api/2024-07/orders.json"))
        .and(body_json(json!({"order": {"line_items": []}})))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({"errors": {"line_items": ["must have at least one line item"]}})))
        .expect(1)
        .mount(&server)
        .await;

    let (mut client, _) = client_for(&server).await;
    let err = client
        .post("/orders.json", &json!({"order": {"line_items": []}}))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ValidationRejected);
    assert_eq!(err.retry_after(), None);
    assert_eq!(err.ledger_detail()["errors"]["line_items"][0], "must have at least one line item");
}

#[tokio::test]
async fn test_server_error_with_plain_body() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    let (mut client, _) = client_for(&server).await;
    let err = client.delete("/orders/1.json").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ServerError);
    assert!(err.is_transient());
    match err {
        MigrationError::Api { status, body, .. } => {
            assert_eq!(status, 503);
            assert_eq!(body, json!("upstream unavailable"));
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[tokio::test]
async fn test_put_and_empty_success_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/admin/api/2024-07/orders/7.json"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (mut client, _) = client_for(&server).await;
    let response = client.put("/orders/7.json", &json!({"order": {"note": "x"}})).await.unwrap();
    assert!(response.body.is_null());
}

#[tokio::test]
async fn test_created_with_non_json_body_is_still_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/admin/api/2024-07/orders.json"))
        .respond_with(ResponseTemplate::new(201).set_body_string("<html>created</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let (mut client, sleeper) = client_for(&server).await;
    let response = client.post("/orders.json", &json!({"order": {}})).await.unwrap();

    assert_eq!(response.status, 201);
    assert_eq!(response.body, json!("<html>created</html>"));
    assert_eq!(sleeper.calls(), vec![Duration::from_millis(150)]);
}

#[tokio::test]
async fn test_unreachable_store_is_transport_failure() {
    let credential = StoreCredential::new("http://127.0.0.1:1/admin/api/2024-07", TOKEN).unwrap();
    let mut client = CommerceClient::new(credential, RateGovernor::default(), Arc::new(RecordingSleeper::default())).unwrap();

    let err = client.get("/orders.json").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransportFailure);
}

#[test]
fn test_retry_after_parsing() {
    let parse = |value: &str| {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_str(value).unwrap());
        retry_after_from(&headers)
    };

    assert_eq!(parse("2"), Some(Duration::from_secs(2)));
    assert_eq!(parse("1.5"), Some(Duration::from_millis(1500)));
    assert_eq!(parse("-3"), None);
    assert_eq!(parse("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    assert_eq!(retry_after_from(&HeaderMap::new()), None);
}
