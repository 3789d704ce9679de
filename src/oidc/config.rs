use std::time::Duration;

use url::Url;

/// Relying-party registration at the OpenID provider.
///
/// Required fields are constructor parameters; optional ones use defaults
/// and `with_*` overrides.
///
/// ```rust,ignore
/// let config = OidcConfig::new(
///     "https://id.example.com/realms/main".parse()?,
///     "gateway",
///     "s3cr3t",
///     "https://app.example.com/auth/callback".parse()?,
/// )
/// .with_scopes(vec!["openid".into(), "email".into()]);
/// ```
#[derive(Clone)]
#[non_exhaustive]
pub struct OidcConfig {
    pub(crate) issuer_url: Url,
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
    pub(crate) redirect_url: Url,
    pub(crate) scopes: Vec<String>,
    pub(crate) http_timeout: Duration,
}

impl OidcConfig {
    #[must_use]
    pub fn new(
        issuer_url: Url,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_url: Url,
    ) -> Self {
        Self {
            issuer_url,
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_url,
            scopes: vec!["openid".into(), "profile".into(), "email".into()],
            http_timeout: Duration::from_secs(5),
        }
    }

    /// Override the requested scopes (default: `openid profile email`).
    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Bound on every request to the provider (default: 5 s).
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    #[must_use]
    pub fn issuer_url(&self) -> &Url {
        &self.issuer_url
    }

    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    #[must_use]
    pub fn redirect_url(&self) -> &Url {
        &self.redirect_url
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    #[must_use]
    pub fn http_timeout(&self) -> Duration {
        self.http_timeout
    }

    /// `{issuer}/.well-known/openid-configuration`, respecting a path component in the issuer.
    #[must_use]
    pub fn discovery_url(&self) -> String {
        format!(
            "{}/.well-known/openid-configuration",
            self.issuer_url.as_str().trim_end_matches('/')
        )
    }
}

impl std::fmt::Debug for OidcConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcConfig")
            .field("issuer_url", &self.issuer_url.as_str())
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_url", &self.redirect_url.as_str())
            .field("scopes", &self.scopes)
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}
