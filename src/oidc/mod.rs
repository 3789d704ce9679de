//! Identity provider adapter: discovery, authorization URLs, token endpoint
//! calls, ID-token verification and RP-Initiated Logout URLs.
//!
//! [`OidcClient::discover`] performs all network setup once. The resulting
//! client is immutable and shared across requests.

use std::sync::Arc;

use serde::{Deserialize, Deserializer};
use time::OffsetDateTime;
use url::Url;

use crate::error::Error;
use crate::types::{StateId, TokenBundle};

mod config;
mod discovery;
mod id_token;

pub use config::OidcConfig;
pub use discovery::ProviderMetadata;
pub use id_token::{Audience, IdTokenClaims};
pub use jsonwebtoken::jwk::JwkSet;

use id_token::IdTokenVerifier;

/// OpenID Connect relying-party client.
///
/// Cheap to clone; all clones share the same provider metadata and keys.
#[derive(Clone)]
pub struct OidcClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: OidcConfig,
    metadata: ProviderMetadata,
    authorization_endpoint: Url,
    end_session_endpoint: Option<Url>,
    verifier: IdTokenVerifier,
    http: reqwest::Client,
}

/// Token endpoint response (RFC 6749 §5.1 plus `id_token`).
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default, deserialize_with = "lenient_seconds")]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    id_token: Option<String>,
}

/// `expires_in` as a JSON number or a numeric string; some providers quote it.
fn lenient_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(i64),
        Text(String),
    }

    match Option::<Seconds>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Seconds::Number(secs)) => Ok(Some(secs)),
        Some(Seconds::Text(raw)) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("expires_in '{raw}': {e}"))),
    }
}

/// A non-success answer from the token endpoint, or no answer at all.
struct TokenEndpointError {
    status: Option<u16>,
    detail: String,
}

impl OidcClient {
    /// Fetch the provider's discovery document and signing keys.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProviderUnreachable`] if discovery or key retrieval
    /// fails, or the document does not belong to the configured issuer.
    pub async fn discover(config: OidcConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| Error::Config(format!("http client: {e}")))?;

        let metadata =
            discovery::fetch_metadata(&http, &config.discovery_url(), config.issuer_url.as_str())
                .await?;
        let jwks = discovery::fetch_jwks(&http, &metadata.jwks_uri).await?;

        tracing::info!(
            issuer = %metadata.issuer,
            keys = jwks.keys.len(),
            end_session = metadata.end_session_endpoint.is_some(),
            "OIDC provider discovered"
        );

        Self::from_metadata(config, metadata, jwks, http)
    }

    /// Build a client from metadata and keys obtained elsewhere.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProviderUnreachable`] if the authorization endpoint is not a URL.
    pub fn from_metadata(
        config: OidcConfig,
        metadata: ProviderMetadata,
        jwks: JwkSet,
        http: reqwest::Client,
    ) -> Result<Self, Error> {
        let authorization_endpoint: Url = metadata.authorization_endpoint.parse().map_err(|e| {
            Error::ProviderUnreachable(format!("authorization_endpoint: {e}"))
        })?;

        let end_session_endpoint = metadata
            .end_session_endpoint
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .and_then(|s| match s.parse::<Url>() {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!(error = %e, "Ignoring malformed end_session_endpoint");
                    None
                }
            });

        let verifier = IdTokenVerifier::new(jwks, metadata.issuer.clone(), config.client_id.clone());

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                metadata,
                authorization_endpoint,
                end_session_endpoint,
                verifier,
                http,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &OidcConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn metadata(&self) -> &ProviderMetadata {
        &self.inner.metadata
    }

    /// Authorization Code request URL carrying `state`. No I/O.
    #[must_use]
    pub fn authorization_url(&self, state: &StateId) -> Url {
        let config = &self.inner.config;
        let scope = config.scopes.join(" ");

        let mut url = self.inner.authorization_endpoint.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &config.client_id)
            .append_pair("redirect_uri", config.redirect_url.as_str())
            .append_pair("scope", &scope)
            .append_pair("state", state.as_str());
        url
    }

    /// Exchange an authorization code and verify the returned ID token.
    ///
    /// A bundle is only returned once the ID token has verified.
    ///
    /// # Errors
    ///
    /// [`Error::CodeExchangeFailed`] if the provider refuses or cannot be reached,
    /// [`Error::MissingIdToken`] if no ID token came back,
    /// [`Error::IdTokenVerificationFailed`] if it does not verify.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenBundle, Error> {
        let config = &self.inner.config;
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", config.redirect_url.as_str()),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
        ];

        let issued_at = OffsetDateTime::now_utc();
        let response = self
            .post_token(&params)
            .await
            .map_err(|e| Error::CodeExchangeFailed {
                status: e.status,
                detail: e.detail,
            })?;

        let id_token = response
            .id_token
            .clone()
            .filter(|t| !t.is_empty())
            .ok_or(Error::MissingIdToken)?;
        let claims = self.inner.verifier.verify(&id_token)?;

        let expires_at = expiry(issued_at, response.expires_in)
            .or_else(|| OffsetDateTime::from_unix_timestamp(claims.exp).ok());

        Ok(bundle(response, expires_at))
    }

    /// Exchange a refresh token for fresh tokens.
    ///
    /// The result's refresh token is `None` when the provider did not rotate.
    ///
    /// # Errors
    ///
    /// [`Error::RefreshFailed`] if the provider refuses (revoked, expired) or
    /// cannot be reached.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenBundle, Error> {
        let config = &self.inner.config;
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
        ];

        let issued_at = OffsetDateTime::now_utc();
        let response = self
            .post_token(&params)
            .await
            .map_err(|e| Error::RefreshFailed {
                status: e.status,
                detail: e.detail,
            })?;

        let expires_at = expiry(issued_at, response.expires_in);
        Ok(bundle(response, expires_at))
    }

    /// Verify an ID token's signature and standard claims.
    ///
    /// # Errors
    ///
    /// [`Error::IdTokenVerificationFailed`] on any failed check.
    pub fn verify_id_token(&self, raw_token: &str) -> Result<IdTokenClaims, Error> {
        self.inner.verifier.verify(raw_token)
    }

    /// RP-Initiated Logout URL, or `None` if the provider has no end-session endpoint.
    ///
    /// Empty arguments are left out of the query rather than sent blank.
    #[must_use]
    pub fn end_session_url(&self, id_token_hint: &str, post_logout_redirect: &str) -> Option<Url> {
        let mut url = self.inner.end_session_endpoint.clone()?;
        {
            let mut query = url.query_pairs_mut();
            if !id_token_hint.is_empty() {
                query.append_pair("id_token_hint", id_token_hint);
            }
            if !post_logout_redirect.is_empty() {
                query.append_pair("post_logout_redirect_uri", post_logout_redirect);
            }
        }
        Some(url)
    }

    async fn post_token(&self, params: &[(&str, &str)]) -> Result<TokenResponse, TokenEndpointError> {
        let no_response = |e: reqwest::Error| TokenEndpointError {
            status: None,
            detail: e.to_string(),
        };

        let response = self
            .inner
            .http
            .post(&self.inner.metadata.token_endpoint)
            .form(params)
            .send()
            .await
            .map_err(no_response)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TokenEndpointError {
                status: Some(status.as_u16()),
                detail: body,
            });
        }

        response.json::<TokenResponse>().await.map_err(|e| TokenEndpointError {
            status: Some(status.as_u16()),
            detail: format!("malformed token response: {e}"),
        })
    }
}

/// `None` for a missing, non-positive or out-of-range lifetime.
fn expiry(issued_at: OffsetDateTime, expires_in: Option<i64>) -> Option<OffsetDateTime> {
    expires_in
        .filter(|secs| *secs > 0)
        .and_then(|secs| issued_at.checked_add(time::Duration::seconds(secs)))
}

fn bundle(response: TokenResponse, expires_at: Option<OffsetDateTime>) -> TokenBundle {
    TokenBundle {
        access_token: response.access_token,
        id_token: response.id_token.filter(|t| !t.is_empty()),
        refresh_token: response.refresh_token.filter(|t| !t.is_empty()),
        expires_at,
    }
}
