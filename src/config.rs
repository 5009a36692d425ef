//! Runtime configuration.
//!
//! Loaded once at startup from an optional TOML file, then overlaid with the
//! environment variables the deployment already uses (`AMADEUS_CLIENT_ID`,
//! `AGODA_SEARCH_ENDPOINT`, ...). The resulting [`Config`] is immutable and
//! shared by every request.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::resolver::DestinationEntry;

/// Secondary providers that can be configured from the environment alone.
pub const ENV_PROXY_PROVIDERS: [&str; 3] = ["agoda", "booking", "expedia"];

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub http: HttpConfig,
    pub pipeline: PipelineConfig,
    pub amadeus: AmadeusConfig,
    pub providers: Vec<ProxyProviderConfig>,
    pub affiliate: AffiliateConfig,
    pub destinations: Vec<DestinationEntry>,
    pub suggest: SuggestConfig,
    pub analytics: AnalyticsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            http: HttpConfig::default(),
            pipeline: PipelineConfig::default(),
            amadeus: AmadeusConfig::default(),
            providers: Vec::new(),
            affiliate: AffiliateConfig::default(),
            destinations: DestinationEntry::default_table(),
            suggest: SuggestConfig::default(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8788".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for daily-rolling JSON log files; stdout only when unset.
    pub directory: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("hotel-scanner/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 20,
        }
    }
}

/// Which providers a search fans out to.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PipelineMode {
    /// Primary provider only; secondary providers are not invoked.
    PrimaryOnly,
    /// Primary provider plus every configured secondary provider.
    #[default]
    MultiProvider,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub mode: PipelineMode,
    pub limits: PipelineLimits,
}

/// Upper bounds on the primary provider's upstream traffic and output size.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PipelineLimits {
    pub max_hotel_ids: usize,
    pub batch_size: usize,
    pub max_batches: usize,
    pub max_offer_entries: usize,
    pub max_offers_per_hotel: usize,
    pub search_radius_km: u32,
}

impl Default for PipelineLimits {
    fn default() -> Self {
        Self {
            max_hotel_ids: 120,
            batch_size: 20,
            max_batches: 6,
            max_offer_entries: 150,
            max_offers_per_hotel: 4,
            search_radius_km: 20,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AmadeusConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub base_url: String,
}

impl Default for AmadeusConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            base_url: "https://test.api.amadeus.com".to_string(),
        }
    }
}

/// A partner proxy: POST JSON in, `{hotels: [...]}` out.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ProxyProviderConfig {
    pub name: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// Deep-link target for primary-provider offers.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AffiliateConfig {
    pub search_url: String,
    pub site_id: Option<String>,
    pub tag: Option<String>,
    pub ds: Option<String>,
}

impl Default for AffiliateConfig {
    fn default() -> Self {
        Self {
            search_url: "https://www.agoda.com/ko-kr/search".to_string(),
            site_id: Some("1922887".to_string()),
            tag: Some("f7739694-dbb7-41bd-aa27-be7c942ce354".to_string()),
            ds: Some("Un6s5oZyUN46s9FV".to_string()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SuggestConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub endpoint: String,
    pub fallback: Vec<String>,
    pub max_suggestions: usize,
}

impl Default for SuggestConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            endpoint: "https://openapi.naver.com/v1/search/local.json".to_string(),
            fallback: ["Tokyo", "Seoul", "Busan", "Osaka", "Jeju", "Bangkok", "Singapore"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            max_suggestions: 5,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub host: Option<String>,
    pub api_key: Option<String>,
}

impl Config {
    /// Load from an optional TOML file, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => load_config(path)?,
            None => Config::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay values from `lookup`; blank values are treated as unset.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("HOTEL_SCANNER_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = get("AMADEUS_CLIENT_ID") {
            self.amadeus.client_id = Some(v);
        }
        if let Some(v) = get("AMADEUS_CLIENT_SECRET") {
            self.amadeus.client_secret = Some(v);
        }
        if let Some(v) = get("AMADEUS_BASE_URL") {
            self.amadeus.base_url = v;
        }

        for name in ENV_PROXY_PROVIDERS {
            let prefix = name.to_uppercase();
            let endpoint = get(&format!("{}_SEARCH_ENDPOINT", prefix));
            let api_key = get(&format!("{}_API_KEY", prefix));
            if endpoint.is_none() && api_key.is_none() {
                continue;
            }
            match self.providers.iter_mut().find(|p| p.name == name) {
                Some(existing) => {
                    if endpoint.is_some() {
                        existing.endpoint = endpoint;
                    }
                    if api_key.is_some() {
                        existing.api_key = api_key;
                    }
                }
                None => self.providers.push(ProxyProviderConfig {
                    name: name.to_string(),
                    endpoint,
                    api_key,
                }),
            }
        }

        if let Some(v) = get("AGODA_SITE_ID") {
            self.affiliate.site_id = Some(v);
        }
        if let Some(v) = get("AGODA_TAG") {
            self.affiliate.tag = Some(v);
        }
        if let Some(v) = get("AGODA_DS") {
            self.affiliate.ds = Some(v);
        }
        if let Some(v) = get("NAVER_CLIENT_ID") {
            self.suggest.client_id = Some(v);
        }
        if let Some(v) = get("NAVER_CLIENT_SECRET") {
            self.suggest.client_secret = Some(v);
        }
        if let Some(v) = get("POSTHOG_KEY") {
            self.analytics.api_key = Some(v);
        }
        if let Some(v) = get("POSTHOG_HOST") {
            self.analytics.host = Some(v);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let limits = &self.pipeline.limits;
        if limits.batch_size == 0 {
            anyhow::bail!("pipeline.limits.batch_size must be > 0");
        }
        if limits.max_offers_per_hotel == 0 {
            anyhow::bail!("pipeline.limits.max_offers_per_hotel must be > 0");
        }
        if self.http.timeout_secs == 0 {
            anyhow::bail!("http.timeout_secs must be > 0");
        }
        for entry in &self.destinations {
            if entry.code.trim().is_empty() {
                anyhow::bail!("destinations entries need a non-empty code");
            }
        }
        for provider in &self.providers {
            if provider.name.trim().is_empty() {
                anyhow::bail!("providers entries need a non-empty name");
            }
        }
        Ok(())
    }
}

/// Read and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    Ok(config)
}
