//! Per-request search orchestration.

use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument};

use crate::amadeus::AmadeusProvider;
use crate::config::{Config, PipelineMode};
use crate::normalize::DeepLinkBuilder;
use crate::provider::{build_http_client, settle_all, settle_primary, HotelProvider};
use crate::proxy::ProxyProvider;
use crate::resolver::DestinationTable;
use crate::response::{assemble, SearchOutcome};
use crate::{ScannerError, SearchQuery};

/// Meta label for searches that fan out to every provider.
pub const MULTI_PROVIDER_LABEL: &str = "multi-live";
/// Meta label for searches that only consult the primary provider.
pub const PRIMARY_ONLY_LABEL: &str = "single-live";

/// The configured providers, shared by all requests.
pub struct SearchPipeline {
    mode: PipelineMode,
    primary: Box<dyn HotelProvider>,
    secondaries: Vec<Box<dyn HotelProvider>>,
}

impl SearchPipeline {
    pub fn new(mode: PipelineMode, primary: Box<dyn HotelProvider>, secondaries: Vec<Box<dyn HotelProvider>>) -> Self {
        Self {
            mode,
            primary,
            secondaries,
        }
    }

    /// Build every provider from `config`, rejecting limits that cannot be honoured.
    pub fn from_config(config: &Config) -> Result<Self, ScannerError> {
        config
            .validate()
            .map_err(|e| ScannerError::ConfigError(e.to_string()))?;
        let http = build_http_client(&config.http)?;
        let destinations = Arc::new(DestinationTable::new(config.destinations.clone()));

        info!(destinations = destinations.len(), "Destination table loaded");

        let primary = AmadeusProvider::new(
            http.clone(),
            &config.amadeus,
            destinations,
            DeepLinkBuilder::from_config(&config.affiliate),
            config.pipeline.limits.clone(),
        );
        let proxies: Vec<ProxyProvider> = config
            .providers
            .iter()
            .map(|p| ProxyProvider::new(http.clone(), p))
            .collect();
        let configured = proxies.iter().filter(|p| p.is_configured()).count();
        let secondaries: Vec<Box<dyn HotelProvider>> = proxies
            .into_iter()
            .map(|p| Box::new(p) as Box<dyn HotelProvider>)
            .collect();

        info!(
            mode = ?config.pipeline.mode,
            secondaries = secondaries.len(),
            configured,
            "Search pipeline configured"
        );
        Ok(Self::new(config.pipeline.mode, Box::new(primary), secondaries))
    }

    pub fn mode(&self) -> PipelineMode {
        self.mode
    }

    fn label(&self) -> &'static str {
        match self.mode {
            PipelineMode::PrimaryOnly => PRIMARY_ONLY_LABEL,
            PipelineMode::MultiProvider => MULTI_PROVIDER_LABEL,
        }
    }

    /// Query every provider and assemble the outcome. The primary chain and
    /// the secondary batch progress independently.
    #[instrument(level = "info", skip(self, query), fields(destination = %query.destination, guests = query.guests))]
    pub async fn search(&self, query: &SearchQuery) -> SearchOutcome {
        let start_time = Instant::now();

        let (primary, secondaries) = match self.mode {
            PipelineMode::PrimaryOnly => (settle_primary(self.primary.as_ref(), query).await, Vec::new()),
            PipelineMode::MultiProvider => {
                tokio::join!(
                    settle_primary(self.primary.as_ref(), query),
                    settle_all(&self.secondaries, query)
                )
            }
        };

        let mut results = Vec::with_capacity(1 + secondaries.len());
        results.push(primary);
        results.extend(secondaries);

        let outcome = assemble(results, self.label());
        info!(
            duration_ms = start_time.elapsed().as_millis(),
            no_offers = outcome.is_empty(),
            "Search completed"
        );
        outcome
    }
}
