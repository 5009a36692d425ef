//! OAuth2 client-credentials exchange for the primary provider.

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::ProviderReason;

/// Client identifier and secret for the token endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    /// Both values must be present and non-blank.
    pub fn from_parts(client_id: Option<&str>, client_secret: Option<&str>) -> Option<Self> {
        let client_id = client_id.map(str::trim).filter(|v| !v.is_empty())?;
        let client_secret = client_secret.map(str::trim).filter(|v| !v.is_empty())?;
        Some(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }
}

/// Why no bearer token is available. None of these are fatal: the primary
/// provider is skipped and reports the matching reason.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TokenUnavailable {
    #[error("client credentials are not configured")]
    NoCredentials,

    #[error("token endpoint returned HTTP {0}")]
    Rejected(u16),

    #[error("token response carried no access_token")]
    MissingToken,

    #[error("token request failed: {0}")]
    Transport(String),
}

impl TokenUnavailable {
    pub fn reason(&self) -> ProviderReason {
        match self {
            TokenUnavailable::NoCredentials => ProviderReason::MissingCredentials,
            TokenUnavailable::Rejected(_) => ProviderReason::MissingCredentials,
            TokenUnavailable::MissingToken => ProviderReason::MissingCredentials,
            TokenUnavailable::Transport(_) => ProviderReason::UpstreamError,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
}

/// Exchanges client credentials for a short-lived bearer token. No retries.
#[derive(Debug, Clone)]
pub struct TokenProvider {
    http: Client,
    token_url: String,
    credentials: Option<Credentials>,
}

impl TokenProvider {
    pub fn new(http: Client, base_url: &str, credentials: Option<Credentials>) -> Self {
        Self {
            http,
            token_url: format!("{}/v1/security/oauth2/token", base_url.trim_end_matches('/')),
            credentials,
        }
    }

    pub async fn fetch_token(&self) -> Result<String, TokenUnavailable> {
        let credentials = self.credentials.as_ref().ok_or(TokenUnavailable::NoCredentials)?;

        debug!(url = %self.token_url, "Requesting access token");
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ];
        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| TokenUnavailable::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Token exchange rejected");
            return Err(TokenUnavailable::Rejected(status.as_u16()));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| TokenUnavailable::Transport(e.to_string()))?;

        match body.access_token.filter(|t| !t.is_empty()) {
            Some(token) => {
                info!("Access token acquired");
                Ok(token)
            }
            None => Err(TokenUnavailable::MissingToken),
        }
    }
}
