//! Primary inventory provider (Amadeus self-service APIs).
//!
//! The provider is a strictly sequential chain: token, destination
//! resolution, hotel-id enumeration, batched offer requests, then
//! normalization. Only the transport layer can fail it outright; upstream
//! non-2xx answers degrade to empty results or an `http_<status>` reason.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::auth::{Credentials, TokenProvider, TokenUnavailable};
use crate::config::{AmadeusConfig, PipelineLimits};
use crate::normalize::{coerce_string, normalize_offer_entries, DeepLinkBuilder};
use crate::provider::HotelProvider;
use crate::resolver::{DestinationResolver, DestinationTable, LocationLookup};
use crate::{ProviderReason, ProviderResult, ScannerError, SearchQuery};

/// Provider name reported in status entries.
pub const PROVIDER_NAME: &str = "amadeus";

const SERVICE: &str = "amadeus";

/// Read a nested field, falling back to its default when it is `null` or has
/// an unexpected shape, so one odd field never discards the whole entry.
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

/// Scalars read as strings; blanks and non-scalars become `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(Some(coerce_string(&value)).filter(|s| !s.trim().is_empty()))
}

fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_array()
        .map(|items| items.iter().map(coerce_string).filter(|s| !s.trim().is_empty()).collect())
        .unwrap_or_default())
}

#[derive(Debug, Default, Deserialize)]
struct DataEnvelope {
    #[serde(default, deserialize_with = "lenient")]
    data: Vec<Value>,
}

/// One `data[]` entry of the hotel-offers response.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HotelOffers {
    #[serde(deserialize_with = "lenient")]
    pub hotel: OfferHotel,
    #[serde(deserialize_with = "lenient")]
    pub offers: Vec<Offer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OfferHotel {
    #[serde(deserialize_with = "lenient_string")]
    pub hotel_id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    pub name: Option<String>,
    /// Usually a numeric string such as `"4"`.
    pub rating: Value,
    #[serde(deserialize_with = "lenient_string")]
    pub city_code: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub address: OfferAddress,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OfferAddress {
    #[serde(deserialize_with = "lenient_string")]
    pub city_name: Option<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Offer {
    #[serde(deserialize_with = "lenient")]
    pub price: OfferPrice,
    #[serde(deserialize_with = "lenient")]
    pub room: OfferRoom,
    #[serde(deserialize_with = "lenient")]
    pub policies: OfferPolicies,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OfferPrice {
    pub total: Value,
    #[serde(deserialize_with = "lenient")]
    pub taxes: Vec<OfferTax>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct OfferTax {
    pub amount: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OfferRoom {
    #[serde(deserialize_with = "lenient")]
    pub description: RoomDescription,
    #[serde(deserialize_with = "lenient")]
    pub type_estimated: RoomTypeEstimated,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RoomDescription {
    #[serde(deserialize_with = "lenient_string")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RoomTypeEstimated {
    #[serde(deserialize_with = "lenient_string")]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OfferPolicies {
    #[serde(deserialize_with = "lenient_string")]
    pub payment_type: Option<String>,
    #[serde(deserialize_with = "lenient")]
    pub cancellations: Vec<Cancellation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Cancellation {
    #[serde(rename = "type", deserialize_with = "lenient_string")]
    pub kind: Option<String>,
}

/// What an offer request is keyed on.
#[derive(Debug, Clone, Copy)]
pub enum OfferScope<'a> {
    HotelIds(&'a [String]),
    CityCode(&'a str),
}

/// Thin client for the reference-data and shopping endpoints.
#[derive(Debug, Clone)]
pub struct AmadeusClient {
    http: Client,
    base_url: String,
}

impl AmadeusClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// GET `path` and return its `data` array. Non-2xx becomes
    /// [`ScannerError::UpstreamStatus`]; malformed bodies are transport errors.
    async fn fetch_data(&self, token: &str, path: &str, params: &[(&str, String)]) -> Result<Vec<Value>, ScannerError> {
        let url = format!("{}{}", self.base_url, path);
        let start_time = Instant::now();
        let response = self.http.get(&url).bearer_auth(token).query(params).send().await?;
        let status = response.status();

        debug!(
            path,
            status = status.as_u16(),
            duration_ms = start_time.elapsed().as_millis(),
            "Amadeus request completed"
        );

        if !status.is_success() {
            return Err(ScannerError::UpstreamStatus {
                service: SERVICE.to_string(),
                status: status.as_u16(),
            });
        }

        let envelope: DataEnvelope = response.json().await?;
        Ok(envelope.data)
    }

    /// Top-1 city code for a keyword. A non-2xx answer counts as "no match".
    pub async fn city_code(&self, token: &str, keyword: &str) -> Result<Option<String>, ScannerError> {
        let params = [("keyword", keyword.to_string()), ("max", "1".to_string())];
        let data = match self.fetch_data(token, "/v1/reference-data/locations/cities", &params).await {
            Ok(data) => data,
            Err(ScannerError::UpstreamStatus { status, .. }) => {
                warn!(status, keyword, "City lookup rejected");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        Ok(data
            .first()
            .and_then(|city| city["iataCode"].as_str())
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::to_string))
    }

    /// Hotel ids around a city, at most `max` of them. A non-2xx answer
    /// yields no ids.
    pub async fn hotel_ids_by_city(
        &self,
        token: &str,
        city_code: &str,
        radius_km: u32,
        max: usize,
    ) -> Result<Vec<String>, ScannerError> {
        let params = [
            ("cityCode", city_code.to_string()),
            ("radius", radius_km.to_string()),
            ("radiusUnit", "KM".to_string()),
            ("hotelSource", "ALL".to_string()),
        ];
        let data = match self.fetch_data(token, "/v1/reference-data/locations/hotels/by-city", &params).await {
            Ok(data) => data,
            Err(ScannerError::UpstreamStatus { status, .. }) => {
                warn!(status, city_code, "Hotel enumeration rejected");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        Ok(data
            .iter()
            .map(|hotel| coerce_string(&hotel["hotelId"]))
            .filter(|id| !id.is_empty())
            .take(max)
            .collect())
    }

    /// Priced offers for a set of hotels or a whole city. Entries that do not
    /// match the expected shape are skipped.
    pub async fn hotel_offers(
        &self,
        token: &str,
        scope: OfferScope<'_>,
        query: &SearchQuery,
    ) -> Result<Vec<HotelOffers>, ScannerError> {
        let mut params = match scope {
            OfferScope::HotelIds(ids) => vec![("hotelIds", ids.join(","))],
            OfferScope::CityCode(code) => vec![("cityCode", code.to_string())],
        };
        params.extend([
            ("checkInDate", query.check_in_str()),
            ("checkOutDate", query.check_out_str()),
            ("adults", query.guests.to_string()),
            ("roomQuantity", "1".to_string()),
            ("bestRateOnly", "false".to_string()),
            ("view", "FULL".to_string()),
        ]);

        let data = self.fetch_data(token, "/v3/shopping/hotel-offers", &params).await?;
        let total = data.len();
        let entries: Vec<HotelOffers> = data
            .into_iter()
            .filter_map(|entry| serde_json::from_value(entry).ok())
            .collect();
        if entries.len() < total {
            debug!(skipped = total - entries.len(), "Skipped malformed offer entries");
        }
        Ok(entries)
    }
}

/// City lookup bound to one request's token.
struct AuthorizedLookup<'a> {
    client: &'a AmadeusClient,
    token: &'a str,
}

#[async_trait]
impl LocationLookup for AuthorizedLookup<'_> {
    async fn city_code(&self, keyword: &str) -> Result<Option<String>, ScannerError> {
        self.client.city_code(self.token, keyword).await
    }
}

/// Offer entries gathered for one city, plus the status of the last
/// rejected offer request, if any.
struct CollectedOffers {
    entries: Vec<HotelOffers>,
    last_rejection: Option<u16>,
}

pub struct AmadeusProvider {
    client: AmadeusClient,
    tokens: TokenProvider,
    resolver: DestinationResolver,
    links: DeepLinkBuilder,
    limits: PipelineLimits,
}

impl AmadeusProvider {
    pub fn new(
        http: Client,
        config: &AmadeusConfig,
        destinations: Arc<DestinationTable>,
        links: DeepLinkBuilder,
        limits: PipelineLimits,
    ) -> Self {
        let credentials = Credentials::from_parts(config.client_id.as_deref(), config.client_secret.as_deref());
        Self {
            client: AmadeusClient::new(http.clone(), &config.base_url),
            tokens: TokenProvider::new(http, &config.base_url, credentials),
            resolver: DestinationResolver::new(destinations),
            links,
            limits,
        }
    }

    async fn collect_offers(
        &self,
        token: &str,
        city_code: &str,
        query: &SearchQuery,
    ) -> Result<CollectedOffers, ScannerError> {
        let ids = self
            .client
            .hotel_ids_by_city(token, city_code, self.limits.search_radius_km, self.limits.max_hotel_ids)
            .await?;
        debug!(city_code, hotel_ids = ids.len(), "Enumerated candidate hotels");

        let mut collected = CollectedOffers {
            entries: Vec::new(),
            last_rejection: None,
        };

        for batch in ids.chunks(self.limits.batch_size.max(1)).take(self.limits.max_batches) {
            self.request_offers(token, OfferScope::HotelIds(batch), query, &mut collected).await?;
        }

        if collected.entries.is_empty() {
            debug!(city_code, "No offers from hotel batches, querying by city code");
            self.request_offers(token, OfferScope::CityCode(city_code), query, &mut collected)
                .await?;
        }

        Ok(collected)
    }

    async fn request_offers(
        &self,
        token: &str,
        scope: OfferScope<'_>,
        query: &SearchQuery,
        collected: &mut CollectedOffers,
    ) -> Result<(), ScannerError> {
        match self.client.hotel_offers(token, scope, query).await {
            Ok(mut entries) => {
                collected.entries.append(&mut entries);
                Ok(())
            }
            Err(ScannerError::UpstreamStatus { status, .. }) => {
                warn!(status, "Offer request rejected");
                collected.last_rejection = Some(status);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl HotelProvider for AmadeusProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    #[instrument(level = "info", skip(self, query), fields(destination = %query.destination))]
    async fn search(&self, query: &SearchQuery) -> Result<ProviderResult, ScannerError> {
        let token = match self.tokens.fetch_token().await {
            Ok(token) => token,
            Err(TokenUnavailable::NoCredentials) => {
                info!("No primary credentials configured, skipping");
                return Ok(ProviderResult::skipped(PROVIDER_NAME, ProviderReason::MissingCredentials));
            }
            Err(e) => {
                warn!(error = %e, "Primary token unavailable");
                return Ok(ProviderResult {
                    message: Some(e.to_string()),
                    ..ProviderResult::skipped(PROVIDER_NAME, e.reason())
                });
            }
        };

        let lookup = AuthorizedLookup {
            client: &self.client,
            token: &token,
        };
        let Some(city_code) = self.resolver.resolve(&query.destination, &lookup).await? else {
            info!("Destination could not be resolved to a city code");
            return Ok(ProviderResult::skipped(PROVIDER_NAME, ProviderReason::CityCodeNotFound));
        };

        let collected = match self.collect_offers(&token, &city_code, query).await {
            Ok(collected) => collected,
            Err(e) => {
                warn!(error = %e, city_code = %city_code, "Primary offer collection failed");
                return Ok(ProviderResult::failed(PROVIDER_NAME, ProviderReason::UpstreamError, &e).with_city_code(city_code));
            }
        };

        if collected.entries.is_empty() {
            if let Some(status) = collected.last_rejection {
                return Ok(ProviderResult::skipped(PROVIDER_NAME, ProviderReason::Http(status)).with_city_code(city_code));
            }
        }

        let hotels = normalize_offer_entries(&collected.entries, query, &self.links, &self.limits);
        info!(
            city_code = %city_code,
            entries = collected.entries.len(),
            count = hotels.len(),
            "Primary provider completed"
        );
        Ok(ProviderResult::completed(PROVIDER_NAME, hotels).with_city_code(city_code))
    }
}
