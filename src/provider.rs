//! Provider abstraction and fan-out helpers.

use async_trait::async_trait;
use futures::future::join_all;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::HttpConfig;
use crate::{ProviderReason, ProviderResult, ScannerError, SearchQuery};

/// An external hotel inventory source.
///
/// Implementations report expected degradations (missing configuration,
/// upstream non-2xx) inside the returned [`ProviderResult`]; an `Err` means
/// the call itself broke and is contained by the fan-out helpers below.
#[async_trait]
pub trait HotelProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn search(&self, query: &SearchQuery) -> Result<ProviderResult, ScannerError>;
}

/// Shared HTTP client for every upstream call.
pub fn build_http_client(config: &HttpConfig) -> Result<Client, ScannerError> {
    let client = Client::builder()
        .user_agent(&config.user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?;
    Ok(client)
}

/// Run one provider and contain its failure as `on_error`.
pub async fn settle(provider: &dyn HotelProvider, query: &SearchQuery, on_error: ProviderReason) -> ProviderResult {
    let start_time = Instant::now();
    let result = match provider.search(query).await {
        Ok(result) => result,
        Err(e) => {
            warn!(provider = provider.name(), error = %e, "Provider call failed");
            ProviderResult::failed(provider.name(), on_error, &e)
        }
    };

    info!(
        provider = %result.provider,
        reason = %result.reason,
        count = result.hotels.len(),
        duration_ms = start_time.elapsed().as_millis(),
        "Provider settled"
    );
    result
}

/// Run the primary provider; a broken call becomes `upstream_error`.
pub async fn settle_primary(provider: &dyn HotelProvider, query: &SearchQuery) -> ProviderResult {
    settle(provider, query, ProviderReason::UpstreamError).await
}

/// Run every secondary provider concurrently and collect all outcomes in
/// input order; a broken call becomes `request_failed`.
pub async fn settle_all(providers: &[Box<dyn HotelProvider>], query: &SearchQuery) -> Vec<ProviderResult> {
    join_all(
        providers
            .iter()
            .map(|provider| settle(provider.as_ref(), query, ProviderReason::RequestFailed)),
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    struct Fixed(&'static str, bool);

    #[async_trait]
    impl HotelProvider for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        async fn search(&self, _query: &SearchQuery) -> Result<ProviderResult, ScannerError> {
            if self.1 {
                Ok(ProviderResult::completed(self.0, Vec::new()))
            } else {
                Err(ScannerError::ConfigError("boom".to_string()))
            }
        }
    }

    fn query() -> SearchQuery {
        let day = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        SearchQuery::new("Tokyo", day, day, 2)
    }

    #[tokio::test]
    async fn test_settle_all_contains_failures() {
        let providers: Vec<Box<dyn HotelProvider>> = vec![Box::new(Fixed("a", false)), Box::new(Fixed("b", true))];
        let results = settle_all(&providers, &query()).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].provider, "a");
        assert_eq!(results[0].reason, ProviderReason::RequestFailed);
        assert_eq!(results[0].message.as_deref(), Some("Configuration error: boom"));
        assert_eq!(results[1].reason, ProviderReason::Empty);
    }

    #[tokio::test]
    async fn test_primary_failure_is_upstream_error() {
        let result = settle_primary(&Fixed("amadeus", false), &query()).await;
        assert_eq!(result.reason, ProviderReason::UpstreamError);
        assert_eq!(result.provider, "amadeus");
    }

    #[test]
    fn test_build_http_client() {
        assert!(build_http_client(&HttpConfig::default()).is_ok());
    }
}
