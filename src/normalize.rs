//! Normalization and merge engine.
//!
//! Every provider payload is converted into the canonical [`Hotel`] /
//! [`Channel`] shape here. Field coercion is lenient: numbers that cannot be
//! read become `0`, strings default to empty, booleans follow JSON
//! truthiness. Hotels without a name or area and channels without a positive
//! nightly price are dropped.

use reqwest::Url;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use crate::amadeus::{HotelOffers, Offer, OfferHotel};
use crate::config::{AffiliateConfig, PipelineLimits};
use crate::{Channel, Hotel, SearchQuery};

/// Channel source label for primary-provider offers.
pub const PRIMARY_CHANNEL_SOURCE: &str = "Amadeus Live";

/// Numeric coercion; anything unreadable or non-finite becomes `0.0`.
pub fn coerce_number(value: &Value) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>().unwrap_or(0.0)
            }
        }
        Value::Bool(true) => 1.0,
        _ => 0.0,
    };
    if n.is_finite() {
        n
    } else {
        0.0
    }
}

/// String coercion; null, arrays and objects become empty.
pub fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// JSON truthiness: null, false, 0, NaN and "" are false.
pub fn coerce_bool(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// First candidate that is non-empty after trimming.
fn first_text(candidates: &[&Value]) -> String {
    candidates
        .iter()
        .map(|v| coerce_string(v).trim().to_string())
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}

fn non_negative(n: f64) -> f64 {
    if n > 0.0 {
        n
    } else {
        0.0
    }
}

fn generated_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Normalize one partner-proxy channel; `None` when the nightly price is not positive.
pub fn normalize_raw_channel(raw: &Value, provider: &str) -> Option<Channel> {
    let nightly_price = coerce_number(&raw["nightly"]);
    if nightly_price <= 0.0 {
        return None;
    }

    let source = coerce_string(&raw["source"]);
    let link = coerce_string(&raw["link"]);

    Some(Channel {
        source: if source.trim().is_empty() { provider.to_string() } else { source },
        nightly_price,
        tax_rate: non_negative(coerce_number(&raw["taxRate"])),
        fixed_fee: non_negative(coerce_number(&raw["fee"])),
        refundable: coerce_bool(&raw["refundable"]),
        breakfast_included: coerce_bool(&raw["breakfast"]),
        pay_at_property: coerce_bool(&raw["payAtHotel"]),
        deep_link: if link.is_empty() { "#".to_string() } else { link },
    })
}

/// Normalize one partner-proxy hotel.
///
/// Returns `None` when the name or area is empty, or when no channel survives.
pub fn normalize_raw_hotel(raw: &Value, provider: &str) -> Option<Hotel> {
    let name = coerce_string(&raw["name"]).trim().to_string();
    let area = first_text(&[&raw["area"], &raw["city"], &raw["district"]]);
    if name.is_empty() || area.is_empty() {
        return None;
    }

    let channels: Vec<Channel> = raw["channels"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|c| normalize_raw_channel(c, provider))
                .collect()
        })
        .unwrap_or_default();
    if channels.is_empty() {
        return None;
    }

    let id = coerce_string(&raw["id"]).trim().to_string();
    let reviews = if raw["reviews"].is_null() { &raw["reviewCount"] } else { &raw["reviews"] };

    Some(Hotel {
        id: if id.is_empty() { generated_id() } else { id },
        name,
        area,
        rating: non_negative(coerce_number(&raw["rating"])),
        review_count: non_negative(coerce_number(reviews)).floor() as u64,
        channels,
    })
}

/// Normalize a partner-proxy response body (`{hotels: [...]}`).
pub fn normalize_proxy_body(body: &Value, provider: &str) -> Vec<Hotel> {
    body["hotels"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|h| normalize_raw_hotel(h, provider))
                .collect()
        })
        .unwrap_or_default()
}

/// Deduplication key: same lowercase name and area means same property.
pub fn merge_key(name: &str, area: &str) -> String {
    format!("{}|{}", name.to_lowercase(), area.to_lowercase())
}

/// Merge hotels sharing a [`merge_key`].
///
/// The first occurrence keeps its id, name and area; channel lists are
/// concatenated in input order; rating and review count take the maximum.
/// Hotels left without channels are dropped.
pub fn merge_hotels<I>(hotels: I) -> Vec<Hotel>
where
    I: IntoIterator<Item = Hotel>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<Hotel> = Vec::new();

    for hotel in hotels {
        let key = merge_key(&hotel.name, &hotel.area);
        match index.get(&key) {
            Some(&i) => {
                let current = &mut merged[i];
                current.channels.extend(hotel.channels);
                current.rating = current.rating.max(hotel.rating);
                current.review_count = current.review_count.max(hotel.review_count);
            }
            None => {
                index.insert(key, merged.len());
                merged.push(hotel);
            }
        }
    }

    merged.retain(|h| !h.channels.is_empty());
    merged
}

/// Builds consumer-facing search links, since primary offers carry no
/// stable booking URL.
#[derive(Debug, Clone)]
pub struct DeepLinkBuilder {
    search_url: String,
    affiliate: Vec<(&'static str, String)>,
}

impl DeepLinkBuilder {
    pub fn from_config(config: &AffiliateConfig) -> Self {
        let affiliate = [("site_id", &config.site_id), ("tag", &config.tag), ("ds", &config.ds)]
            .into_iter()
            .filter_map(|(key, value)| value.clone().map(|v| (key, v)))
            .collect();
        Self {
            search_url: config.search_url.clone(),
            affiliate,
        }
    }

    pub fn build(&self, hotel_name: &str, query: &SearchQuery) -> String {
        let mut params: Vec<(&str, String)> = self
            .affiliate
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        params.push(("textToSearch", format!("{} {}", hotel_name, query.destination)));
        params.push(("checkIn", query.check_in_str()));
        params.push(("checkOut", query.check_out_str()));
        params.push(("adults", query.guests.to_string()));
        params.push(("rooms", "1".to_string()));

        match Url::parse_with_params(&self.search_url, &params) {
            Ok(url) => url.to_string(),
            Err(e) => {
                debug!(error = %e, search_url = %self.search_url, "Invalid deep-link base URL");
                "#".to_string()
            }
        }
    }
}

impl Default for DeepLinkBuilder {
    fn default() -> Self {
        Self::from_config(&AffiliateConfig::default())
    }
}

/// Share of the total price that is itemized tax; `0` for a zero total.
pub fn tax_rate(total: f64, tax_amount: f64) -> f64 {
    if total > 0.0 {
        non_negative(tax_amount / total)
    } else {
        0.0
    }
}

/// Convert one primary-provider offer into a channel.
pub fn offer_channel(offer: &Offer, nights: i64, deep_link: String) -> Channel {
    let total = coerce_number(&offer.price.total);
    let tax_amount: f64 = offer.price.taxes.iter().map(|t| coerce_number(&t.amount)).sum();

    let room_text = format!(
        "{} {}",
        offer.room.description.text.as_deref().unwrap_or_default(),
        offer.room.type_estimated.category.as_deref().unwrap_or_default()
    )
    .to_lowercase();
    let payment_type = offer.policies.payment_type.as_deref().unwrap_or_default().to_uppercase();
    let cancellation_type = offer
        .policies
        .cancellations
        .first()
        .and_then(|c| c.kind.as_deref())
        .unwrap_or_default()
        .to_uppercase();

    Channel {
        source: PRIMARY_CHANNEL_SOURCE.to_string(),
        nightly_price: if nights > 0 { total / nights as f64 } else { total },
        tax_rate: tax_rate(total, tax_amount),
        fixed_fee: 0.0,
        refundable: !cancellation_type.contains("NON_REFUNDABLE"),
        breakfast_included: room_text.contains("breakfast"),
        pay_at_property: payment_type.contains("HOTEL"),
        deep_link,
    }
}

/// `"<city> · <first address line>"`, falling back to the city code and
/// then `"Unknown"`.
pub fn area_from_hotel(hotel: &OfferHotel) -> String {
    let city = hotel
        .address
        .city_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| hotel.city_code.as_deref().map(str::trim).filter(|s| !s.is_empty()))
        .unwrap_or("Unknown");

    match hotel.address.lines.first().map(|l| l.trim()).filter(|l| !l.is_empty()) {
        Some(line) => format!("{} · {}", city, line),
        None => city.to_string(),
    }
}

/// Normalize primary-provider offer entries into merged hotels, examining at
/// most `max_offer_entries` entries and `max_offers_per_hotel` offers each.
pub fn normalize_offer_entries(
    entries: &[HotelOffers],
    query: &SearchQuery,
    links: &DeepLinkBuilder,
    limits: &PipelineLimits,
) -> Vec<Hotel> {
    let nights = query.nights();
    let mut hotels = Vec::new();

    for entry in entries.iter().take(limits.max_offer_entries) {
        let info = &entry.hotel;
        let name = info
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("Unnamed Hotel")
            .to_string();
        let area = area_from_hotel(info);
        let link = links.build(&name, query);

        for offer in entry.offers.iter().take(limits.max_offers_per_hotel) {
            let channel = offer_channel(offer, nights, link.clone());
            if channel.nightly_price <= 0.0 {
                continue;
            }

            hotels.push(Hotel {
                id: info
                    .hotel_id
                    .clone()
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(generated_id),
                name: name.clone(),
                area: area.clone(),
                rating: non_negative(coerce_number(&info.rating)),
                review_count: 0,
                channels: vec![channel],
            });
        }
    }

    merge_hotels(hotels)
}
