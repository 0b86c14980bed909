#![allow(clippy::unwrap_used)]
// Integration tests for `DeviceClient` using wiremock.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use webio_api::{DeviceClient, Error, RawValue};

const TIMEOUT: Duration = Duration::from_secs(2);

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, DeviceClient) {
    let server = MockServer::start().await;
    let base_url = Url::parse(&server.uri()).unwrap();
    let client = DeviceClient::with_client(reqwest::Client::new(), &base_url).unwrap();
    (server, client)
}

fn state_body() -> serde_json::Value {
    json!({
        "vin": "23.6",
        "redLamp": "1",
        "amberLamp": "0",
        "utcTime": "1559533814",
        "serialNumber": "00:0C:C8:04:24:B2"
    })
}

// ── Reads ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_fetch_state() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/customState.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(state_body()))
        .expect(1)
        .mount(&server)
        .await;

    let doc = client.fetch_state(TIMEOUT).await.unwrap();

    assert_eq!(doc.len(), 5);
    assert_eq!(doc["redLamp"], RawValue::Text("1".into()));
    assert_eq!(doc["vin"].as_str(), Some("23.6"));
}

#[tokio::test]
async fn test_fetch_state_rejects_non_object() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/customState.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
        .mount(&server)
        .await;

    let result = client.fetch_state(TIMEOUT).await;

    assert!(
        matches!(result, Err(Error::Deserialization { ref body, .. }) if body.contains("login")),
        "expected Deserialization error, got: {result:?}"
    );
}

// ── Writes ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_send_values_as_query_params() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/customState.json"))
        .and(query_param("redLamp", "0"))
        .and(query_param("greenLamp", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(state_body()))
        .expect(1)
        .mount(&server)
        .await;

    let mut values = BTreeMap::new();
    values.insert("redLamp".to_owned(), "0".to_owned());
    values.insert("greenLamp".to_owned(), "1".to_owned());

    let doc = client.send_values(&values, TIMEOUT).await.unwrap();
    assert!(doc.contains_key("serialNumber"));
}

// ── Failure modes ───────────────────────────────────────────────────

#[tokio::test]
async fn test_http_error_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/customState.json"))
        .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
        .mount(&server)
        .await;

    let err = client.fetch_state(TIMEOUT).await.unwrap_err();

    assert!(
        matches!(err, Error::Status { status: 503, .. }),
        "expected Status error, got: {err:?}"
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_per_call_timeout() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/customState.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(state_body())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let err = client
        .fetch_state(Duration::from_millis(100))
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::Timeout { .. }),
        "expected Timeout error, got: {err:?}"
    );
}

#[tokio::test]
async fn test_connection_refused() {
    // Reserve a port, then release it so nothing is listening.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let base_url = Url::parse(&format!("http://{addr}")).unwrap();
    let client = DeviceClient::with_client(reqwest::Client::new(), &base_url).unwrap();

    let err = client.fetch_state(TIMEOUT).await.unwrap_err();

    assert!(err.is_connection_error(), "got: {err:?}");
    assert!(err.is_transient());
}
