//! # Hotel Scanner Library
//!
//! Multi-provider hotel price comparison. A search request is fanned out to a
//! primary GDS-style inventory source (Amadeus) and any number of partner
//! proxy providers; every response is normalized into one hotel/channel shape,
//! duplicate properties are merged, and the result is packaged together with a
//! per-provider status report.

pub mod amadeus;
pub mod auth;
pub mod config;
pub mod events;
pub mod normalize;
pub mod pipeline;
pub mod provider;
pub mod proxy;
pub mod resolver;
pub mod response;
pub mod server;
pub mod suggest;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

// Re-export main types for convenience
pub use config::Config;
pub use pipeline::SearchPipeline;
pub use response::{NoOffersResponse, SearchMeta, SearchOutcome, SearchResponse};

/// Date format used on the wire and towards every upstream provider.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Guest count used when the request does not carry a usable value.
pub const DEFAULT_GUESTS: u32 = 2;

/// Error types for the hotel scanner library
#[derive(Error, Debug)]
pub enum ScannerError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("destination/checkIn/checkOut are required")]
    MissingParameters,

    #[error("checkIn/checkOut must be YYYY-MM-DD dates")]
    DateParseError(String),

    #[error("Upstream {service} returned HTTP {status}")]
    UpstreamStatus { service: String, status: u16 },

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// One hotel search, built once per request from the caller's parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub destination: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: u32,
}

impl SearchQuery {
    /// Create a query, flooring the guest count at one.
    pub fn new(destination: impl Into<String>, check_in: NaiveDate, check_out: NaiveDate, guests: u32) -> Self {
        Self {
            destination: destination.into(),
            check_in,
            check_out,
            guests: guests.max(1),
        }
    }

    /// Build a query from raw request parameters.
    ///
    /// `destination`, `check_in` and `check_out` are required and must be
    /// non-blank; dates use `YYYY-MM-DD`. `guests` defaults to
    /// [`DEFAULT_GUESTS`] when absent or unparsable, is truncated to an
    /// integer and floored at 1.
    pub fn from_params(
        destination: Option<&str>,
        check_in: Option<&str>,
        check_out: Option<&str>,
        guests: Option<&str>,
    ) -> Result<Self, ScannerError> {
        let destination = destination.map(str::trim).unwrap_or_default();
        let check_in = check_in.map(str::trim).unwrap_or_default();
        let check_out = check_out.map(str::trim).unwrap_or_default();

        if destination.is_empty() || check_in.is_empty() || check_out.is_empty() {
            return Err(ScannerError::MissingParameters);
        }

        let check_in = parse_date(check_in)?;
        let check_out = parse_date(check_out)?;

        Ok(Self::new(destination, check_in, check_out, parse_guests(guests)))
    }

    /// Number of nights between check-in and check-out, never less than one.
    pub fn nights(&self) -> i64 {
        (self.check_out - self.check_in).num_days().max(1)
    }

    pub fn check_in_str(&self) -> String {
        self.check_in.format(DATE_FORMAT).to_string()
    }

    pub fn check_out_str(&self) -> String {
        self.check_out.format(DATE_FORMAT).to_string()
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, ScannerError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| ScannerError::DateParseError(format!("{}: {}", value, e)))
}

fn parse_guests(value: Option<&str>) -> u32 {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => DEFAULT_GUESTS,
        Some(raw) => match raw.parse::<f64>() {
            Ok(n) if n.is_finite() => (n.trunc().max(1.0)).min(u32::MAX as f64) as u32,
            _ => DEFAULT_GUESTS,
        },
    }
}

/// A property offered by one or more distribution channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotel {
    pub id: String,
    pub name: String,
    pub area: String,
    pub rating: f64,
    pub review_count: u64,
    pub channels: Vec<Channel>,
}

/// One priced offer for a hotel from one distribution source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub source: String,
    pub nightly_price: f64,
    pub tax_rate: f64,
    pub fixed_fee: f64,
    pub refundable: bool,
    pub breakfast_included: bool,
    pub pay_at_property: bool,
    pub deep_link: String,
}

/// Outcome of querying a single provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderReason {
    Ok,
    Empty,
    NotConfigured,
    Http(u16),
    UpstreamError,
    MissingCredentials,
    CityCodeNotFound,
    RequestFailed,
}

impl ProviderReason {
    /// `Ok` when hotels were produced, `Empty` otherwise.
    pub fn from_count(count: usize) -> Self {
        if count > 0 {
            ProviderReason::Ok
        } else {
            ProviderReason::Empty
        }
    }
}

impl fmt::Display for ProviderReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderReason::Ok => write!(f, "ok"),
            ProviderReason::Empty => write!(f, "empty"),
            ProviderReason::NotConfigured => write!(f, "not_configured"),
            ProviderReason::Http(status) => write!(f, "http_{}", status),
            ProviderReason::UpstreamError => write!(f, "upstream_error"),
            ProviderReason::MissingCredentials => write!(f, "missing_credentials"),
            ProviderReason::CityCodeNotFound => write!(f, "city_code_not_found"),
            ProviderReason::RequestFailed => write!(f, "request_failed"),
        }
    }
}

impl Serialize for ProviderReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Hotels and status produced by one provider for one request.
///
/// Providers never fail past their own boundary; every failure ends up here
/// as a [`ProviderReason`] with an optional message.
#[derive(Debug, Clone)]
pub struct ProviderResult {
    pub provider: String,
    pub hotels: Vec<Hotel>,
    pub reason: ProviderReason,
    pub message: Option<String>,
    pub city_code: Option<String>,
}

impl ProviderResult {
    /// A completed lookup; the reason is derived from the hotel count.
    pub fn completed(provider: impl Into<String>, hotels: Vec<Hotel>) -> Self {
        let reason = ProviderReason::from_count(hotels.len());
        Self {
            provider: provider.into(),
            hotels,
            reason,
            message: None,
            city_code: None,
        }
    }

    /// A provider that produced nothing, for the given reason.
    pub fn skipped(provider: impl Into<String>, reason: ProviderReason) -> Self {
        Self {
            provider: provider.into(),
            hotels: Vec::new(),
            reason,
            message: None,
            city_code: None,
        }
    }

    /// A provider whose call failed with an error.
    pub fn failed(provider: impl Into<String>, reason: ProviderReason, error: &ScannerError) -> Self {
        Self {
            message: Some(error.to_string()),
            ..Self::skipped(provider, reason)
        }
    }

    pub fn with_city_code(mut self, city_code: impl Into<String>) -> Self {
        self.city_code = Some(city_code.into());
        self
    }

    /// The status entry reported to the caller.
    pub fn status(&self) -> ProviderStatus {
        ProviderStatus {
            provider: self.provider.clone(),
            reason: self.reason,
            count: self.hotels.len(),
            message: self.message.clone(),
            city_code: self.city_code.clone(),
        }
    }
}

/// Per-provider entry in the response's `providers` array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    pub provider: String,
    pub reason: ProviderReason,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city_code: Option<String>,
}

/// Run one search with a pipeline built from `config`.
pub async fn search_hotels(config: &Config, query: &SearchQuery) -> Result<SearchOutcome, ScannerError> {
    let pipeline = SearchPipeline::from_config(config)?;
    Ok(pipeline.search(query).await)
}
