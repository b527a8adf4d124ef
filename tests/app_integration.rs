use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use fxgate::core::cache::ManualClock;
use fxgate::core::config::AppConfig;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use tracing::info;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod test_utils {
    use super::*;

    pub const LATEST_USD: &str = r#"{
        "success": true,
        "base": "USD",
        "date": "2024-05-01",
        "timestamp": 1714521600,
        "rates": {"EUR": 0.9, "GBP": 0.8}
    }"#;

    pub async fn mount_latest(server: &MockServer, body: &str, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path("/latest"))
            .and(query_param("base", "USD"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    pub fn build_router(server: &MockServer, clock: Arc<ManualClock>) -> Router {
        let mut config = AppConfig::default();
        config
            .apply_env(|key| match key {
                "PROVIDER_BASE_URL" => Some(server.uri()),
                "ACCESS_KEY" => Some("test-key".to_string()),
                "CACHE_TIMEOUT" => Some("300".to_string()),
                _ => None,
            })
            .expect("Failed to apply env");
        let state = fxgate::build_state(&config, clock).expect("Failed to build state");
        fxgate::api::create_router(state)
    }

    pub async fn get(router: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        info!(%uri, %status, %json, "Response");
        (status, json)
    }
}

use test_utils::*;

#[test_log::test(tokio::test)]
async fn test_rates_are_served_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/latest"))
        .and(query_param("base", "USD"))
        .and(query_param("symbols", "EUR,GBP"))
        .and(query_param("access_key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LATEST_USD))
        .expect(1)
        .mount(&server)
        .await;
    let router = build_router(&server, Arc::new(ManualClock::new()));

    let (status, body) = get(&router, "/rates?base=usd&symbols=GBP,EUR").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["base"], "USD");
    assert_eq!(body["rates"]["EUR"], 0.9);
    assert_eq!(body["date"], "2024-05-01");

    // Same parameters in a different order hit the cache
    let (status, cached) = get(&router, "/rates?symbols=eur,gbp").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cached, body);
}

#[test_log::test(tokio::test)]
async fn test_convert_scenarios() {
    let server = MockServer::start().await;
    mount_latest(&server, LATEST_USD, 1).await;
    let router = build_router(&server, Arc::new(ManualClock::new()));

    let (status, body) = get(&router, "/convert?from=USD&to=EUR&amount=10").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["query"]["from"], "USD");
    assert_eq!(body["query"]["to"], "EUR");
    assert_eq!(body["info"]["rate"], 0.9);
    assert_eq!(body["info"]["timestamp"], 1714521600);
    assert!((body["result"].as_f64().unwrap() - 9.0).abs() < 1e-9);

    // Served from the cache: the mock only allows one upstream call
    let (_, again) = get(&router, "/convert?from=usd&to=eur&amount=10").await;
    assert_eq!(again, body);
}

#[test_log::test(tokio::test)]
async fn test_convert_to_base() {
    let server = MockServer::start().await;
    mount_latest(&server, LATEST_USD, 1).await;
    let router = build_router(&server, Arc::new(ManualClock::new()));

    let (status, body) = get(&router, "/convert?from=EUR&to=USD&amount=9").await;
    assert_eq!(status, StatusCode::OK);
    assert!((body["result"].as_f64().unwrap() - 10.0).abs() < 1e-9);
    assert_eq!(body["info"]["rate"].as_f64().unwrap(), 1.0 / 0.9);
}

#[test_log::test(tokio::test)]
async fn test_convert_validation() {
    let server = MockServer::start().await;
    mount_latest(&server, LATEST_USD, 0).await;
    let router = build_router(&server, Arc::new(ManualClock::new()));

    let (status, body) = get(&router, "/convert?from=USD").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Parameters 'from' and 'to' are required");

    let (status, body) = get(&router, "/convert?from=USD&to=EUR&amount=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Amount must be a number");

    let (status, body) = get(&router, "/convert?from=USD&to=EUR&amount=").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Amount must be a number");
}

#[test_log::test(tokio::test)]
async fn test_malformed_query_is_json_error() {
    let server = MockServer::start().await;
    mount_latest(&server, LATEST_USD, 0).await;
    let router = build_router(&server, Arc::new(ManualClock::new()));

    let (status, body) = get(&router, "/convert?from=USD&to=EUR&to=GBP&amount=1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("duplicate field"));

    let (status, body) = get(&router, "/rates?symbols=EUR&symbols=GBP").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[test_log::test(tokio::test)]
async fn test_unknown_currency_is_gateway_error() {
    let server = MockServer::start().await;
    // Errors are never cached, so both requests reach upstream
    mount_latest(&server, LATEST_USD, 2).await;
    let router = build_router(&server, Arc::new(ManualClock::new()));

    for _ in 0..2 {
        let (status, body) = get(&router, "/convert?from=USD&to=XYZ&amount=1").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Currency XYZ not found in rates");
    }
}

#[test_log::test(tokio::test)]
async fn test_upstream_failure_is_gateway_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/latest"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;
    let router = build_router(&server, Arc::new(ManualClock::new()));

    for _ in 0..2 {
        let (status, body) = get(&router, "/rates").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].as_str().unwrap().contains("503"));
    }
}

#[test_log::test(tokio::test)]
async fn test_history() {
    let server = MockServer::start().await;
    let body = r#"{"base": "EUR", "date": "2020-01-02", "rates": {"USD": 1.12, "GBP": 0.85}}"#;
    Mock::given(method("GET"))
        .and(path("/2020-01-02"))
        .and(query_param("base", "EUR"))
        .and(query_param("symbols", "USD"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;
    let router = build_router(&server, Arc::new(ManualClock::new()));

    let (status, json) = get(&router, "/history?date=2020-01-02&base=eur&symbols=usd").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["base"], "EUR");
    assert_eq!(json["date"], "2020-01-02");
    assert_eq!(json["rates"]["USD"], 1.12);

    let (status, json) = get(&router, "/history?base=EUR").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Parameter 'date' is required");

    let (status, _) = get(&router, "/history?date=yesterday").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[test_log::test(tokio::test)]
async fn test_historical_conversion() {
    let server = MockServer::start().await;
    let body = r#"{"base": "USD", "date": "2020-01-02", "rates": {"EUR": 0.5, "GBP": 0.25}}"#;
    Mock::given(method("GET"))
        .and(path("/2020-01-02"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;
    let router = build_router(&server, Arc::new(ManualClock::new()));

    let (status, json) = get(&router, "/convert?from=EUR&to=GBP&amount=4&date=2020-01-02").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["historical"], true);
    assert_eq!(json["date"], "2020-01-02");
    assert_eq!(json["info"]["rate"], 0.5);
    assert_eq!(json["result"], 2.0);
}

#[test_log::test(tokio::test)]
async fn test_cache_expires_after_timeout() {
    let server = MockServer::start().await;
    mount_latest(&server, LATEST_USD, 2).await;
    let clock = Arc::new(ManualClock::new());
    let router = build_router(&server, clock.clone());

    get(&router, "/rates").await;
    clock.advance(Duration::from_secs(120));
    get(&router, "/rates").await;

    clock.advance(Duration::from_secs(180));
    let (status, _) = get(&router, "/rates").await;
    assert_eq!(status, StatusCode::OK);
}

#[test_log::test(tokio::test)]
async fn test_health() {
    let server = MockServer::start().await;
    let router = build_router(&server, Arc::new(ManualClock::new()));

    let (status, json) = get(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}
