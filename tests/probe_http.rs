//! HTTP probe behaviour against mock applications.

use std::sync::{Arc, Mutex};

use app_health_agent::config::{ProbeConfig, ProbeProtocol};
use app_health_agent::health::probe::USER_AGENT;
use app_health_agent::health::{CustomMetrics, HealthState, Probe, ProbeError};

mod common;
use common::MockResponse;

fn http_probe(port: u16, path: &str) -> Probe {
    let config = ProbeConfig {
        protocol: Some(ProbeProtocol::Http),
        host: "127.0.0.1".to_string(),
        port: Some(port),
        request_path: path.to_string(),
        ..ProbeConfig::default()
    };
    Probe::from_config(&config).unwrap()
}

#[tokio::test]
async fn test_healthy_response_with_custom_metrics() {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let seen = requests.clone();
    let addr = common::start_programmable_backend(move |request| {
        seen.lock().unwrap().push(request);
        async {
            MockResponse::new(
                200,
                r#"{"applicationHealthState":"Healthy","customMetrics":"{\"rollingUpgradePolicy\":{\"phase\":\"2\"}}"}"#,
            )
        }
    })
    .await;

    let sample = http_probe(addr.port(), "/health").evaluate().await;

    assert_eq!(sample.state, HealthState::Healthy);
    assert!(sample.error.is_none());
    assert!(matches!(sample.custom_metrics, CustomMetrics::Valid(_)));

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].starts_with("GET /health HTTP/1.1"));
    assert!(requests[0]
        .to_ascii_lowercase()
        .contains(&format!("user-agent: {}", USER_AGENT.to_ascii_lowercase())));
}

#[tokio::test]
async fn test_unhealthy_response() {
    let addr = common::start_mock_backend(MockResponse::health("Unhealthy")).await;
    let sample = http_probe(addr.port(), "health").evaluate().await;
    assert_eq!(sample.state, HealthState::Unhealthy);
}

#[tokio::test]
async fn test_state_is_case_insensitive() {
    let addr = common::start_mock_backend(MockResponse::health("HEALTHY")).await;
    let sample = http_probe(addr.port(), "/").evaluate().await;
    assert_eq!(sample.state, HealthState::Healthy);
}

#[tokio::test]
async fn test_invalid_state_is_unknown() {
    let addr = common::start_mock_backend(MockResponse::health("Degraded")).await;
    let sample = http_probe(addr.port(), "/").evaluate().await;
    assert_eq!(sample.state, HealthState::Unknown);
    assert_eq!(
        sample.error,
        Some(ProbeError::InvalidState(Some("Degraded".to_string())))
    );
}

#[tokio::test]
async fn test_server_error_is_unknown() {
    let addr = common::start_mock_backend(MockResponse::new(500, "oops")).await;
    let sample = http_probe(addr.port(), "/").evaluate().await;
    assert_eq!(sample.state, HealthState::Unknown);
    assert_eq!(sample.error, Some(ProbeError::Status(500)));
}

#[tokio::test]
async fn test_redirect_is_not_followed() {
    let target = common::start_mock_backend(MockResponse::health("Healthy")).await;
    let addr = common::start_mock_backend(MockResponse::redirect(&format!(
        "http://127.0.0.1:{}/",
        target.port()
    )))
    .await;

    let sample = http_probe(addr.port(), "/").evaluate().await;
    assert_eq!(sample.state, HealthState::Unknown);
    assert!(matches!(
        sample.error,
        Some(ProbeError::Redirect { status: 302, location: Some(_) })
    ));
}

#[tokio::test]
async fn test_malformed_body_is_unknown() {
    let addr = common::start_mock_backend(MockResponse::new(200, "<html>ok</html>")).await;
    let sample = http_probe(addr.port(), "/").evaluate().await;
    assert_eq!(sample.state, HealthState::Unknown);
    assert!(matches!(sample.error, Some(ProbeError::Body(_))));
}

#[tokio::test]
async fn test_invalid_custom_metrics_keep_state() {
    let addr = common::start_mock_backend(MockResponse::new(
        200,
        r#"{"applicationHealthState":"Healthy","customMetrics":"[1,2]"}"#,
    ))
    .await;
    let sample = http_probe(addr.port(), "/").evaluate().await;
    assert_eq!(sample.state, HealthState::Healthy);
    assert!(matches!(sample.custom_metrics, CustomMetrics::Invalid { .. }));
}

#[tokio::test]
async fn test_connection_refused_is_unknown() {
    let sample = http_probe(common::closed_port(), "/").evaluate().await;
    assert_eq!(sample.state, HealthState::Unknown);
    assert!(matches!(sample.error, Some(ProbeError::Request { .. })));
}
