//! Analytics event intake and best-effort forwarding.

use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::config::AnalyticsConfig;
use crate::normalize::coerce_string;
use crate::ScannerError;

pub const EVENT_LOG_TYPE: &str = "hotel-scanner-event";
const ANONYMOUS_ID: &str = "anonymous";

/// A validated analytics event.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsEvent {
    pub name: String,
    pub properties: Map<String, Value>,
    pub distinct_id: String,
}

#[derive(Debug, PartialEq)]
pub enum EventRejection {
    InvalidJson(String),
    MissingName,
}

impl AnalyticsEvent {
    /// Parse a raw request body. Scalar `name` and `distinctId` values are
    /// read as strings; `properties` that are not an object become empty and a
    /// missing `distinctId` becomes `"anonymous"`.
    pub fn parse(body: &[u8]) -> Result<Self, EventRejection> {
        let value: Value = serde_json::from_slice(body).map_err(|e| EventRejection::InvalidJson(e.to_string()))?;

        let name = coerce_string(&value["name"]);
        let name = name.trim();
        if name.is_empty() {
            return Err(EventRejection::MissingName);
        }

        let properties = match &value["properties"] {
            Value::Object(map) => map.clone(),
            _ => Map::new(),
        };
        let distinct_id = coerce_string(&value["distinctId"]);
        let distinct_id = Some(distinct_id.trim()).filter(|id| !id.is_empty()).unwrap_or(ANONYMOUS_ID);

        Ok(Self {
            name: name.to_string(),
            properties,
            distinct_id: distinct_id.to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
struct CapturePayload<'a> {
    api_key: &'a str,
    event: &'a str,
    distinct_id: &'a str,
    properties: &'a Map<String, Value>,
}

/// Logs every event and forwards it to the collector when one is configured.
pub struct EventForwarder {
    http: Client,
    collector: Option<(String, String)>,
}

impl EventForwarder {
    pub fn new(http: Client, config: &AnalyticsConfig) -> Self {
        let host = config.host.as_deref().map(str::trim).filter(|h| !h.is_empty());
        let key = config.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty());
        let collector = match (host, key) {
            (Some(host), Some(key)) => Some((format!("{}/capture/", host.trim_end_matches('/')), key.to_string())),
            _ => None,
        };
        Self { http, collector }
    }

    pub fn is_forwarding(&self) -> bool {
        self.collector.is_some()
    }

    /// Record `event`. Forwarding failures are logged, never returned.
    pub async fn record(&self, event: &AnalyticsEvent) {
        let properties = Value::Object(event.properties.clone());
        info!(
            event_type = EVENT_LOG_TYPE,
            event_name = %event.name,
            distinct_id = %event.distinct_id,
            properties = %properties,
            "Analytics event"
        );

        if let Err(e) = self.forward(event).await {
            warn!(error = %e, event_name = %event.name, "Analytics forwarding failed");
        }
    }

    async fn forward(&self, event: &AnalyticsEvent) -> Result<(), ScannerError> {
        let Some((url, key)) = &self.collector else {
            return Ok(());
        };

        let payload = CapturePayload {
            api_key: key,
            event: &event.name,
            distinct_id: &event.distinct_id,
            properties: &event.properties,
        };
        let response = self.http.post(url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScannerError::UpstreamStatus {
                service: "analytics".to_string(),
                status: status.as_u16(),
            });
        }
        debug!(event_name = %event.name, "Analytics event forwarded");
        Ok(())
    }
}
