//! Integration tests for hotel-scanner
//!
//! These tests boot the HTTP API on an ephemeral port and talk to it over
//! real HTTP. Upstream providers are simulated with wiremock.

use hotel_scanner::config::{Config, ProxyProviderConfig};
use hotel_scanner::server::router;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Helper function to serve the API for `config` and return its base URL
async fn spawn_api(config: Config) -> String {
    let app = router(&config).expect("router should build");
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn get_json(url: &str) -> (u16, reqwest::header::HeaderMap, Value) {
    let response = reqwest::get(url).await.unwrap();
    let status = response.status().as_u16();
    let headers = response.headers().clone();
    let body = response.json::<Value>().await.unwrap();
    (status, headers, body)
}

async fn post_body(url: &str, body: &'static str) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(url)
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    (status, response.json::<Value>().await.unwrap())
}

#[tokio::test]
async fn test_health() {
    let base = spawn_api(Config::default()).await;
    let (status, headers, body) = get_json(&format!("{}/health", base)).await;

    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(headers["cache-control"], "no-store");
}

#[tokio::test]
async fn test_search_requires_parameters() {
    let base = spawn_api(Config::default()).await;
    let (status, headers, body) = get_json(&format!("{}/api/search?destination=Tokyo&checkIn=2025-06-01", base)).await;

    assert_eq!(status, 400);
    assert_eq!(body, json!({"error": "destination/checkIn/checkOut are required"}));
    assert_eq!(headers["cache-control"], "no-store");
}

#[tokio::test]
async fn test_search_rejects_bad_dates() {
    let base = spawn_api(Config::default()).await;
    let (status, _, body) = get_json(&format!(
        "{}/api/search?destination=Tokyo&checkIn=June%201&checkOut=2025-06-03",
        base
    ))
    .await;

    assert_eq!(status, 400);
    assert_eq!(body["error"], "checkIn/checkOut must be YYYY-MM-DD dates");
}

#[tokio::test]
async fn test_search_without_credentials_reports_no_offers() {
    let base = spawn_api(Config::default()).await;
    let (status, headers, body) = get_json(&format!(
        "{}/api/search?destination=Tokyo&checkIn=2025-06-01&checkOut=2025-06-03&guests=2",
        base
    ))
    .await;

    assert_eq!(status, 404);
    assert_eq!(headers["cache-control"], "no-store");
    assert_eq!(
        body,
        json!({
            "error": "no_live_offers",
            "message": "No live hotel offers from configured providers",
            "providers": [{"provider": "amadeus", "reason": "missing_credentials", "count": 0}]
        })
    );
}

#[tokio::test]
async fn test_search_merges_primary_and_secondary_offers() {
    let upstream = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/security/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "tok"})))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/reference-data/locations/hotels/by-city"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [{"hotelId": "HLTYO1"}]})))
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/v3/shopping/hotel-offers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{
                "hotel": {
                    "hotelId": "HLTYO1",
                    "name": "Hotel Gracery",
                    "rating": "4",
                    "address": {"cityName": "Tokyo", "lines": ["1-19-1 Kabukicho"]}
                },
                "offers": [{
                    "price": {"total": "360.00", "taxes": [{"amount": "36"}]},
                    "room": {"description": {"text": "Double room with breakfast"}},
                    "policies": {"paymentType": "HOTEL_GUARANTEE"}
                }]
            }]
        })))
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/partners/agoda"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "hotels": [
                {
                    "name": "HOTEL GRACERY",
                    "area": "tokyo · 1-19-1 kabukicho",
                    "reviews": 2100,
                    "channels": [{"source": "Agoda", "nightly": 170, "refundable": true, "link": "https://agoda.example/1"}]
                },
                {"name": "Park Hotel", "city": "Shiodome", "channels": [{"nightly": 0}]}
            ]
        })))
        .mount(&upstream)
        .await;
    Mock::given(method("POST"))
        .and(path("/partners/booking"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&upstream)
        .await;

    let mut config = Config::default();
    config.amadeus.client_id = Some("id".to_string());
    config.amadeus.client_secret = Some("secret".to_string());
    config.amadeus.base_url = upstream.uri();
    config.providers = vec![
        ProxyProviderConfig {
            name: "agoda".to_string(),
            endpoint: Some(format!("{}/partners/agoda", upstream.uri())),
            api_key: None,
        },
        ProxyProviderConfig {
            name: "booking".to_string(),
            endpoint: Some(format!("{}/partners/booking", upstream.uri())),
            api_key: Some("key".to_string()),
        },
        ProxyProviderConfig {
            name: "expedia".to_string(),
            endpoint: None,
            api_key: None,
        },
    ];

    let base = spawn_api(config).await;
    let (status, _, body) = get_json(&format!(
        "{}/api/search?destination=%EB%8F%84%EC%BF%84&checkIn=2025-06-01&checkOut=2025-06-03&guests=2",
        base
    ))
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["meta"]["provider"], "multi-live");
    assert_eq!(body["meta"]["fallback"], false);

    let hotels = body["hotels"].as_array().unwrap();
    assert_eq!(hotels.len(), 1);
    let hotel = &hotels[0];
    assert_eq!(hotel["id"], "HLTYO1");
    assert_eq!(hotel["area"], "Tokyo · 1-19-1 Kabukicho");
    assert_eq!(hotel["rating"], 4.0);
    assert_eq!(hotel["reviewCount"], 2100);

    let channels = hotel["channels"].as_array().unwrap();
    assert_eq!(channels.len(), 2);
    assert_eq!(channels[0]["source"], "Amadeus Live");
    assert_eq!(channels[0]["nightlyPrice"], 180.0);
    assert_eq!(channels[0]["taxRate"], 0.1);
    assert_eq!(channels[0]["breakfastIncluded"], true);
    assert_eq!(channels[0]["payAtProperty"], true);
    assert_eq!(channels[1]["source"], "Agoda");
    assert_eq!(channels[1]["deepLink"], "https://agoda.example/1");

    let providers = body["meta"]["providers"].as_array().unwrap();
    let summary: Vec<(String, String)> = providers
        .iter()
        .map(|p| (p["provider"].as_str().unwrap().to_string(), p["reason"].as_str().unwrap().to_string()))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("amadeus".to_string(), "ok".to_string()),
            ("agoda".to_string(), "ok".to_string()),
            ("booking".to_string(), "http_502".to_string()),
            ("expedia".to_string(), "not_configured".to_string()),
        ]
    );
    assert_eq!(providers[0]["cityCode"], "TYO");
}

#[tokio::test]
async fn test_suggest_fallback() {
    let base = spawn_api(Config::default()).await;

    let (status, _, body) = get_json(&format!("{}/api/suggest?q=se", base)).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"suggestions": ["Seoul"], "meta": {"provider": "fallback"}}));

    let (_, _, body) = get_json(&format!("{}/api/suggest", base)).await;
    assert_eq!(body, json!({"suggestions": []}));
}

#[tokio::test]
async fn test_events() {
    let base = spawn_api(Config::default()).await;
    let url = format!("{}/api/events", base);

    let (status, body) = post_body(&url, r#"{"name": "search_submitted", "properties": {"destination": "Tokyo"}}"#).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({"ok": true}));

    let (status, body) = post_body(&url, "{not json").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "invalid_json");
    assert!(body["message"].is_string());

    let (status, body) = post_body(&url, r#"{"properties": {}}"#).await;
    assert_eq!(status, 400);
    assert_eq!(body, json!({"error": "name is required"}));
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let base = spawn_api(Config::default()).await;
    let response = reqwest::Client::new()
        .get(format!("{}/health", base))
        .header("origin", "https://frontend.example.com")
        .send()
        .await
        .unwrap();

    assert_eq!(response.headers()["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn test_router_rejects_zero_batch_size() {
    let mut config = Config::default();
    config.pipeline.limits.batch_size = 0;
    assert!(router(&config).is_err());
}
