use jsonwebtoken::jwk::JwkSet;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The subset of OpenID Provider Metadata this gateway relies on.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ProviderMetadata {
    pub issuer: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks_uri: String,
    /// Advertised only by providers supporting RP-Initiated Logout.
    #[serde(default)]
    pub end_session_endpoint: Option<String>,
    #[serde(default)]
    pub userinfo_endpoint: Option<String>,
    #[serde(default)]
    pub id_token_signing_alg_values_supported: Vec<String>,
}

impl ProviderMetadata {
    #[must_use]
    pub fn new(
        issuer: impl Into<String>,
        authorization_endpoint: impl Into<String>,
        token_endpoint: impl Into<String>,
        jwks_uri: impl Into<String>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            authorization_endpoint: authorization_endpoint.into(),
            token_endpoint: token_endpoint.into(),
            jwks_uri: jwks_uri.into(),
            end_session_endpoint: None,
            userinfo_endpoint: None,
            id_token_signing_alg_values_supported: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_end_session_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.end_session_endpoint = Some(endpoint.into());
        self
    }

    /// Checks mandatory fields and that the document belongs to `expected_issuer`.
    pub(crate) fn validate(&self, expected_issuer: &str) -> Result<(), Error> {
        let mandatory = [
            ("issuer", &self.issuer),
            ("authorization_endpoint", &self.authorization_endpoint),
            ("token_endpoint", &self.token_endpoint),
            ("jwks_uri", &self.jwks_uri),
        ];
        if let Some((field, _)) = mandatory.iter().find(|(_, v)| v.trim().is_empty()) {
            return Err(Error::ProviderUnreachable(format!(
                "discovery document has empty {field}"
            )));
        }

        if self.issuer.trim_end_matches('/') != expected_issuer.trim_end_matches('/') {
            return Err(Error::ProviderUnreachable(format!(
                "issuer mismatch: expected '{expected_issuer}', got '{}'",
                self.issuer
            )));
        }
        Ok(())
    }
}

/// Fetches and validates the provider's discovery document.
pub(crate) async fn fetch_metadata(
    http: &reqwest::Client,
    discovery_url: &str,
    expected_issuer: &str,
) -> Result<ProviderMetadata, Error> {
    let metadata: ProviderMetadata = get_json(http, discovery_url, "discovery").await?;
    metadata.validate(expected_issuer)?;
    Ok(metadata)
}

/// Fetches the provider's signing keys.
pub(crate) async fn fetch_jwks(http: &reqwest::Client, jwks_uri: &str) -> Result<JwkSet, Error> {
    let jwks: JwkSet = get_json(http, jwks_uri, "jwks").await?;
    if jwks.keys.is_empty() {
        return Err(Error::ProviderUnreachable("jwks contains no keys".into()));
    }
    Ok(jwks)
}

async fn get_json<T: serde::de::DeserializeOwned>(
    http: &reqwest::Client,
    url: &str,
    what: &'static str,
) -> Result<T, Error> {
    let unreachable = |e: reqwest::Error| Error::ProviderUnreachable(format!("{what}: {e}"));

    http.get(url)
        .send()
        .await
        .map_err(unreachable)?
        .error_for_status()
        .map_err(unreachable)?
        .json::<T>()
        .await
        .map_err(unreachable)
}
