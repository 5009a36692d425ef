//! Destination autocomplete.
//!
//! Proxies the Naver local-search API when credentials are configured and
//! falls back to a fixed list of popular destinations otherwise.

use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::config::SuggestConfig;
use crate::ScannerError;

pub const NAVER_PROVIDER: &str = "naver";
pub const FALLBACK_PROVIDER: &str = "fallback";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestMeta {
    pub provider: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestResponse {
    pub suggestions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<SuggestMeta>,
}

impl SuggestResponse {
    fn empty() -> Self {
        Self {
            suggestions: Vec::new(),
            meta: None,
        }
    }

    fn with_provider(provider: &str, suggestions: Vec<String>) -> Self {
        Self {
            suggestions,
            meta: Some(SuggestMeta {
                provider: provider.to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LocalSearchResponse {
    #[serde(default)]
    items: Vec<LocalSearchItem>,
}

#[derive(Debug, Deserialize)]
struct LocalSearchItem {
    #[serde(default)]
    title: Option<String>,
}

pub struct SuggestClient {
    http: Client,
    endpoint: String,
    credentials: Option<(String, String)>,
    fallback: Vec<String>,
    limit: usize,
    tag_pattern: Regex,
}

impl SuggestClient {
    pub fn new(http: Client, config: &SuggestConfig) -> Result<Self, ScannerError> {
        let tag_pattern = Regex::new(r"<[^>]*>").map_err(|e| ScannerError::ConfigError(e.to_string()))?;
        let credentials = match (config.client_id.as_deref(), config.client_secret.as_deref()) {
            (Some(id), Some(secret)) if !id.trim().is_empty() && !secret.trim().is_empty() => {
                Some((id.trim().to_string(), secret.trim().to_string()))
            }
            _ => None,
        };

        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            credentials,
            fallback: config.fallback.clone(),
            limit: config.max_suggestions,
            tag_pattern,
        })
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn suggest(&self, q: &str) -> SuggestResponse {
        let q = q.trim();
        if q.is_empty() {
            return SuggestResponse::empty();
        }

        if self.credentials.is_some() {
            match self.remote(q).await {
                Ok(suggestions) if !suggestions.is_empty() => {
                    return SuggestResponse::with_provider(NAVER_PROVIDER, suggestions);
                }
                Ok(_) => debug!("Remote suggestions empty, using fallback list"),
                Err(e) => warn!(error = %e, "Remote suggestions failed, using fallback list"),
            }
        }

        SuggestResponse::with_provider(FALLBACK_PROVIDER, self.fallback_matches(q))
    }

    /// Case-insensitive substring filter over the fallback list.
    pub fn fallback_matches(&self, q: &str) -> Vec<String> {
        let needle = q.to_lowercase();
        self.fallback
            .iter()
            .filter(|city| city.to_lowercase().contains(&needle))
            .take(self.limit)
            .cloned()
            .collect()
    }

    async fn remote(&self, q: &str) -> Result<Vec<String>, ScannerError> {
        let Some((client_id, client_secret)) = &self.credentials else {
            return Ok(Vec::new());
        };

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("query", q), ("display", "5"), ("sort", "random")])
            .header("X-Naver-Client-Id", client_id)
            .header("X-Naver-Client-Secret", client_secret)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScannerError::UpstreamStatus {
                service: NAVER_PROVIDER.to_string(),
                status: status.as_u16(),
            });
        }

        let body: LocalSearchResponse = response.json().await?;
        Ok(body
            .items
            .iter()
            .filter_map(|item| item.title.as_deref())
            .map(|title| self.tag_pattern.replace_all(title, "").trim().to_string())
            .filter(|title| !title.is_empty())
            .take(self.limit)
            .collect())
    }
}
