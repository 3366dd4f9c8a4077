//! Integration tests for the instrumented HTTP client with wiremock.
//!
//! Requests go through a real `reqwest` client against a mock server and are
//! recorded by the real collectors.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use panel_monitoring::config::MonitoringConfig;
use panel_monitoring::error_log::ErrorSource;
use panel_monitoring::monitoring::Monitoring;
use panel_monitoring::performance::EntryBus;
use panel_monitoring::storage::MemoryStore;
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_monitoring() -> Monitoring {
    let config = MonitoringConfig {
        enabled: false,
        ..MonitoringConfig::default()
    };
    Monitoring::new(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(EntryBus::new()),
    )
}

#[tokio::test]
async fn test_successful_request_recorded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/partners"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"items": []}))
                .set_delay(Duration::from_millis(20)),
        )
        .mount(&server)
        .await;

    let monitoring = create_monitoring();
    let client = monitoring.client(reqwest::Client::new());
    let response = client
        .send(client.get(&format!("{}/api/partners", server.uri())))
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["items"], serde_json::json!([]));

    let metrics = monitoring.api_metrics().all_metrics();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].method, "GET");
    assert_eq!(metrics[0].status, Some(200));
    assert!(metrics[0].success);
    assert!(metrics[0].duration >= 20.0);

    let summary = monitoring.api_metrics().summary(None);
    assert_eq!(summary.requests_by_endpoint.get("api/partners"), Some(&1));
    assert!(monitoring.errors().is_empty());
}

#[tokio::test]
async fn test_error_status_recorded_as_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/transactions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let monitoring = create_monitoring();
    let client = monitoring.client(reqwest::Client::new());
    let url = format!("{}/api/transactions", server.uri());
    let response = client
        .send(client.request(reqwest::Method::POST, &url).body("{}"))
        .await
        .unwrap();

    // The response is handed back unchanged.
    assert_eq!(response.status().as_u16(), 500);
    assert_eq!(response.text().await.unwrap(), "boom");

    let metrics = monitoring.api_metrics().all_metrics();
    assert_eq!(metrics.len(), 1);
    assert!(!metrics[0].success);
    assert_eq!(metrics[0].status, Some(500));
    assert_eq!(
        metrics[0].error.as_deref(),
        Some("Request failed with status code 500")
    );

    let errors = monitoring.errors().all_errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].source, ErrorSource::Api);
    assert_eq!(errors[0].message, format!("API Error: 500 {url}"));
    assert_eq!(monitoring.errors().summary(None).critical_errors.len(), 1);
}

#[tokio::test]
async fn test_not_found_counted_by_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let monitoring = create_monitoring();
    let client = monitoring.client(reqwest::Client::new());
    for id in 1..=3 {
        client
            .send(client.get(&format!("{}/api/users/{id}", server.uri())))
            .await
            .unwrap();
    }

    let summary = monitoring.api_metrics().summary(None);
    assert_eq!(summary.total_requests, 3);
    assert_eq!(summary.failed_requests, 3);
    assert_eq!(summary.requests_by_status.get(&404), Some(&3));
    assert_eq!(summary.recent_errors.len(), 3);

    let errors = monitoring.errors().summary(None);
    assert_eq!(errors.errors_by_type.get("API Error"), Some(&3));
    assert!(errors.critical_errors.is_empty());
}

#[tokio::test]
async fn test_transport_error_recorded_without_status() {
    // Nothing listens on a port that was just released.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}/api/settings", listener.local_addr().unwrap());
    drop(listener);

    let monitoring = create_monitoring();
    let client = monitoring.client(reqwest::Client::new());
    let result = client.send(client.get(&url)).await;
    assert!(result.is_err());

    let metrics = monitoring.api_metrics().all_metrics();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].status, None);
    assert!(!metrics[0].success);
    assert!(metrics[0].error.is_some());

    let summary = monitoring.api_metrics().summary(None);
    assert_eq!(summary.requests_by_status.get(&0), Some(&1));

    let errors = monitoring.errors().all_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].message.starts_with("API Error: Network Error"));
    assert!(errors[0].additional_data.as_ref().unwrap()["status"].is_null());
}

#[tokio::test]
async fn test_export_after_traffic() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let monitoring = create_monitoring();
    let client = monitoring.client(reqwest::Client::new());
    client
        .send(client.get(&format!("{}/api/health", server.uri())))
        .await
        .unwrap();

    let exported: serde_json::Value =
        serde_json::from_str(&monitoring.export_data().unwrap()).unwrap();
    assert_eq!(exported["apiMetrics"].as_array().unwrap().len(), 1);
    assert_eq!(exported["summary"]["apiMetrics"]["successfulRequests"], 1);
    assert_eq!(exported["performance"]["url"], "app://panel-monitor");
}
