use std::time::Duration;

use axum_extra::extract::cookie::SameSite;
use url::Url;

use crate::store::DEFAULT_SESSION_TTL;

/// Attributes applied uniformly to the `access_token`, `id_token` and
/// `session_id` cookies. `Path` is always `/`.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct CookiePolicy {
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: SameSite,
}

impl Default for CookiePolicy {
    fn default() -> Self {
        Self {
            domain: None,
            secure: true,
            http_only: true,
            same_site: SameSite::Lax,
        }
    }
}

impl CookiePolicy {
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    #[must_use]
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    #[must_use]
    pub fn with_same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = same_site;
        self
    }
}

/// Parse a `SameSite` attribute name, case-insensitively.
#[must_use]
pub fn parse_same_site(value: &str) -> Option<SameSite> {
    match value.trim().to_ascii_lowercase().as_str() {
        "lax" => Some(SameSite::Lax),
        "strict" => Some(SameSite::Strict),
        "none" => Some(SameSite::None),
        _ => None,
    }
}

/// Gateway behaviour settings.
///
/// `frontend_url` is required; everything else has a default.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct GatewaySettings {
    /// Where the browser lands after login and local logout.
    pub frontend_url: Url,
    /// Lifetime of the `session_id` cookie. Should match the store's session TTL.
    pub session_ttl: Duration,
    /// Deadline for a whole login, callback, refresh or logout operation.
    pub request_timeout: Duration,
    pub cookies: CookiePolicy,
}

impl GatewaySettings {
    #[must_use]
    pub fn new(frontend_url: Url) -> Self {
        Self {
            frontend_url,
            session_ttl: DEFAULT_SESSION_TTL,
            request_timeout: Duration::from_secs(10),
            cookies: CookiePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_cookies(mut self, cookies: CookiePolicy) -> Self {
        self.cookies = cookies;
        self
    }
}
