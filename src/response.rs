//! Response assembly.

use serde::Serialize;

use crate::normalize::merge_hotels;
use crate::{Hotel, ProviderResult, ProviderStatus};

pub const NO_OFFERS_ERROR: &str = "no_live_offers";
pub const NO_OFFERS_MESSAGE: &str = "No live hotel offers from configured providers";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchMeta {
    pub provider: String,
    pub fallback: bool,
    pub providers: Vec<ProviderStatus>,
}

/// Successful search body: merged hotels plus per-provider status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    pub hotels: Vec<Hotel>,
    pub meta: SearchMeta,
}

/// Body returned when no provider produced a usable hotel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoOffersResponse {
    pub error: String,
    pub message: String,
    pub providers: Vec<ProviderStatus>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Offers(SearchResponse),
    NoOffers(NoOffersResponse),
}

impl SearchOutcome {
    pub fn is_empty(&self) -> bool {
        matches!(self, SearchOutcome::NoOffers(_))
    }

    pub fn providers(&self) -> &[ProviderStatus] {
        match self {
            SearchOutcome::Offers(response) => &response.meta.providers,
            SearchOutcome::NoOffers(response) => &response.providers,
        }
    }
}

/// Merge every provider's hotels (in provider order) and package the result.
pub fn assemble(results: Vec<ProviderResult>, label: &str) -> SearchOutcome {
    let providers: Vec<ProviderStatus> = results.iter().map(ProviderResult::status).collect();
    let hotels = merge_hotels(results.into_iter().flat_map(|r| r.hotels));

    if hotels.is_empty() {
        return SearchOutcome::NoOffers(NoOffersResponse {
            error: NO_OFFERS_ERROR.to_string(),
            message: NO_OFFERS_MESSAGE.to_string(),
            providers,
        });
    }

    SearchOutcome::Offers(SearchResponse {
        hotels,
        meta: SearchMeta {
            provider: label.to_string(),
            fallback: false,
            providers,
        },
    })
}
