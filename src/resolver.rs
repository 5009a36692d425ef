//! Destination resolution.
//!
//! Free-text destinations are mapped to a canonical city code in two tiers:
//! a static table of popular destinations (names in several languages), then
//! a remote keyword lookup against the primary provider.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::ScannerError;

/// One row of the static destination table.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DestinationEntry {
    pub code: String,
    /// Lowercase name fragments matched as substrings of the query.
    pub aliases: Vec<String>,
}

impl DestinationEntry {
    pub fn new(code: &str, aliases: &[&str]) -> Self {
        Self {
            code: code.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Built-in table. Order matters: the first matching row wins.
    pub fn default_table() -> Vec<Self> {
        vec![
            Self::new("SEL", &["seoul", "서울"]),
            Self::new("TYO", &["tokyo", "도쿄"]),
            Self::new("PUS", &["busan", "부산"]),
            Self::new("OSA", &["osaka", "오사카"]),
            Self::new("UKY", &["kyoto", "교토"]),
            Self::new("FUK", &["fukuoka", "후쿠오카"]),
            Self::new("CJU", &["jeju", "제주"]),
        ]
    }
}

/// Immutable, ordered destination table shared across requests.
#[derive(Debug, Clone)]
pub struct DestinationTable {
    entries: Vec<DestinationEntry>,
}

impl DestinationTable {
    pub fn new(entries: Vec<DestinationEntry>) -> Self {
        let entries = entries
            .into_iter()
            .map(|entry| DestinationEntry {
                code: entry.code.trim().to_string(),
                aliases: entry
                    .aliases
                    .iter()
                    .map(|a| a.trim().to_lowercase())
                    .filter(|a| !a.is_empty())
                    .collect(),
            })
            .collect();
        Self { entries }
    }

    /// Static lookup: lowercase + trim the input, first row with an alias
    /// contained in it wins.
    pub fn lookup(&self, destination: &str) -> Option<&str> {
        let query = destination.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|entry| entry.aliases.iter().any(|alias| query.contains(alias.as_str())))
            .map(|entry| entry.code.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for DestinationTable {
    fn default() -> Self {
        Self::new(DestinationEntry::default_table())
    }
}

/// Remote keyword search returning the top city code, if any.
#[async_trait]
pub trait LocationLookup: Send + Sync {
    async fn city_code(&self, keyword: &str) -> Result<Option<String>, ScannerError>;
}

/// Two-tier destination resolver.
#[derive(Debug, Clone)]
pub struct DestinationResolver {
    table: Arc<DestinationTable>,
}

impl DestinationResolver {
    pub fn new(table: Arc<DestinationTable>) -> Self {
        Self { table }
    }

    /// Resolve `destination` to a city code, consulting `remote` only when
    /// the static table has no match. `Ok(None)` means unresolved.
    #[instrument(level = "debug", skip(self, remote))]
    pub async fn resolve(
        &self,
        destination: &str,
        remote: &dyn LocationLookup,
    ) -> Result<Option<String>, ScannerError> {
        if let Some(code) = self.table.lookup(destination) {
            debug!(code, "Destination resolved from static table");
            return Ok(Some(code.to_string()));
        }

        let keyword = destination.trim();
        if keyword.is_empty() {
            return Ok(None);
        }

        let code = remote.city_code(keyword).await?;
        info!(keyword, code = code.as_deref(), "Remote destination lookup completed");
        Ok(code)
    }
}
