//! Secondary "proxy" providers: one JSON POST per search.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::ProxyProviderConfig;
use crate::normalize::normalize_proxy_body;
use crate::provider::HotelProvider;
use crate::{ProviderReason, ProviderResult, ScannerError, SearchQuery};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProxyRequest<'a> {
    destination: &'a str,
    check_in_date: String,
    check_out_date: String,
    adults: u32,
}

/// A partner proxy answering `{hotels: RawHotel[]}`.
#[derive(Debug, Clone)]
pub struct ProxyProvider {
    http: Client,
    name: String,
    endpoint: Option<String>,
    api_key: Option<String>,
}

impl ProxyProvider {
    pub fn new(http: Client, config: &ProxyProviderConfig) -> Self {
        let clean = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
        Self {
            http,
            name: config.name.trim().to_string(),
            endpoint: clean(&config.endpoint),
            api_key: clean(&config.api_key),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.endpoint.is_some()
    }
}

#[async_trait]
impl HotelProvider for ProxyProvider {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(level = "debug", skip(self, query), fields(provider = %self.name))]
    async fn search(&self, query: &SearchQuery) -> Result<ProviderResult, ScannerError> {
        let Some(endpoint) = self.endpoint.as_deref() else {
            return Ok(ProviderResult::skipped(&self.name, ProviderReason::NotConfigured));
        };

        let payload = ProxyRequest {
            destination: &query.destination,
            check_in_date: query.check_in_str(),
            check_out_date: query.check_out_str(),
            adults: query.guests,
        };

        let mut request = self.http.post(endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Proxy provider rejected request");
            return Ok(ProviderResult::skipped(&self.name, ProviderReason::Http(status.as_u16())));
        }

        let body: Value = response.json().await?;
        let hotels = normalize_proxy_body(&body, &self.name);
        debug!(count = hotels.len(), "Proxy response normalized");
        Ok(ProviderResult::completed(&self.name, hotels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn query() -> SearchQuery {
        SearchQuery::new(
            "Tokyo",
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
            3,
        )
    }

    fn proxy(endpoint: Option<String>, api_key: Option<&str>) -> ProxyProvider {
        ProxyProvider::new(
            Client::new(),
            &ProxyProviderConfig {
                name: "booking".to_string(),
                endpoint,
                api_key: api_key.map(str::to_string),
            },
        )
    }

    #[tokio::test]
    async fn test_unconfigured_is_skipped() {
        let provider = proxy(Some("  ".to_string()), Some("key"));
        assert!(!provider.is_configured());

        let result = provider.search(&query()).await.unwrap();
        assert_eq!(result.reason, ProviderReason::NotConfigured);
        assert_eq!(result.provider, "booking");
    }

    #[tokio::test]
    async fn test_posts_payload_with_bearer_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("authorization", "Bearer key"))
            .and(body_json(json!({
                "destination": "Tokyo",
                "checkInDate": "2025-06-01",
                "checkOutDate": "2025-06-03",
                "adults": 3
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hotels": [
                    {"name": "Gracery", "area": "Shinjuku", "channels": [{"nightly": 120, "link": "https://b.example/1"}]},
                    {"name": "", "area": "Ginza", "channels": [{"nightly": 90}]}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let result = proxy(Some(format!("{}/search", server.uri())), Some("key"))
            .search(&query())
            .await
            .unwrap();
        assert_eq!(result.reason, ProviderReason::Ok);
        assert_eq!(result.hotels.len(), 1);
        assert_eq!(result.hotels[0].channels[0].source, "booking");
        assert_eq!(result.hotels[0].channels[0].deep_link, "https://b.example/1");
    }

    #[tokio::test]
    async fn test_no_authorization_without_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"hotels": []})))
            .mount(&server)
            .await;

        let result = proxy(Some(server.uri()), None).search(&query()).await.unwrap();
        assert_eq!(result.reason, ProviderReason::Empty);

        let requests: Vec<Request> = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn test_http_failure_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = proxy(Some(server.uri()), None).search(&query()).await.unwrap();
        assert_eq!(result.reason, ProviderReason::Http(500));
        assert_eq!(result.reason.to_string(), "http_500");
    }

    #[tokio::test]
    async fn test_unparsable_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        assert!(proxy(Some(server.uri()), None).search(&query()).await.is_err());
    }
}
