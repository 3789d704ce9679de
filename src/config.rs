//! Process configuration, read once at startup.
//!
//! [`Config::from_env`] reads the process environment (after loading `.env`
//! if present). [`Config::from_lookup`] does the same over any lookup
//! function, which is what the tests use.

use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::Error;
use crate::gateway::{CookiePolicy, GatewaySettings, parse_same_site};
use crate::oidc::OidcConfig;
#[cfg(feature = "redis")]
use crate::store::RedisConfig;

/// Listening address settings.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ServerConfig {
    pub port: u16,
}

/// Everything the binary needs, validated.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    pub server: ServerConfig,
    pub gateway: GatewaySettings,
    pub oidc: OidcConfig,
    #[cfg(feature = "redis")]
    pub redis: RedisConfig,
}

impl Config {
    /// Load from the process environment.
    ///
    /// # Required env vars
    /// - `FRONTEND_URL`
    /// - `OIDC_PROVIDER_URL`, `OIDC_CLIENT_ID`, `OIDC_CLIENT_SECRET`, `OIDC_REDIRECT_URL`
    ///
    /// # Optional env vars
    /// - `PORT` (8080), `SESSION_MAX_AGE` seconds (3600), `REQUEST_TIMEOUT_SECS` (10)
    /// - `COOKIE_DOMAIN`, `COOKIE_SECURE` (true), `COOKIE_HTTP_ONLY` (true), `COOKIE_SAME_SITE` (Lax)
    /// - `OIDC_SCOPES` comma-separated (`openid,profile,email`), `OIDC_HTTP_TIMEOUT_SECS` (5)
    /// - `REDIS_ADDR` (`localhost:6379`), `REDIS_PASSWORD`, `REDIS_DB` (0),
    ///   `REDIS_KEY_PREFIX`, `REDIS_COMMAND_TIMEOUT_MS` (2000)
    ///
    /// # Errors
    ///
    /// [`Error::Config`] naming the first missing or unparseable variable.
    pub fn from_env() -> Result<Self, Error> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                return Err(Error::Config(format!(".env: {e}")));
            }
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] naming the first missing or unparseable variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let env = Env(&lookup);

        let server = ServerConfig {
            port: env.parsed("PORT")?.unwrap_or(8080),
        };

        let mut cookies = CookiePolicy::default();
        if let Some(domain) = env.optional("COOKIE_DOMAIN") {
            cookies = cookies.with_domain(domain);
        }
        if let Some(secure) = env.flag("COOKIE_SECURE")? {
            cookies = cookies.with_secure(secure);
        }
        if let Some(http_only) = env.flag("COOKIE_HTTP_ONLY")? {
            cookies = cookies.with_http_only(http_only);
        }
        if let Some(same_site) = env.optional("COOKIE_SAME_SITE") {
            let parsed = parse_same_site(&same_site).ok_or_else(|| {
                Error::Config(format!(
                    "COOKIE_SAME_SITE: expected Lax, Strict or None, got '{same_site}'"
                ))
            })?;
            cookies = cookies.with_same_site(parsed);
        }

        let session_ttl = Duration::from_secs(env.parsed("SESSION_MAX_AGE")?.unwrap_or(3600));
        if session_ttl.is_zero() {
            return Err(Error::Config("SESSION_MAX_AGE must be positive".into()));
        }

        let gateway = GatewaySettings::new(env.url("FRONTEND_URL")?)
            .with_session_ttl(session_ttl)
            .with_request_timeout(Duration::from_secs(
                env.parsed("REQUEST_TIMEOUT_SECS")?.unwrap_or(10),
            ))
            .with_cookies(cookies);

        let mut oidc = OidcConfig::new(
            env.url("OIDC_PROVIDER_URL")?,
            env.required("OIDC_CLIENT_ID")?,
            env.required("OIDC_CLIENT_SECRET")?,
            env.url("OIDC_REDIRECT_URL")?,
        )
        .with_http_timeout(Duration::from_secs(
            env.parsed("OIDC_HTTP_TIMEOUT_SECS")?.unwrap_or(5),
        ));
        if let Some(scopes) = env.optional("OIDC_SCOPES") {
            let scopes: Vec<String> = scopes
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
            if !scopes.iter().any(|s| s == "openid") {
                return Err(Error::Config("OIDC_SCOPES must include 'openid'".into()));
            }
            oidc = oidc.with_scopes(scopes);
        }

        Ok(Self {
            server,
            gateway,
            oidc,
            #[cfg(feature = "redis")]
            redis: redis_config(&env)?,
        })
    }
}

#[cfg(feature = "redis")]
fn redis_config(env: &Env<'_>) -> Result<RedisConfig, Error> {
    let mut redis = RedisConfig::new(
        env.optional("REDIS_ADDR")
            .unwrap_or_else(|| "localhost:6379".into()),
    )
    .with_database(env.parsed("REDIS_DB")?.unwrap_or(0))
    .with_command_timeout(Duration::from_millis(
        env.parsed("REDIS_COMMAND_TIMEOUT_MS")?.unwrap_or(2000),
    ));
    if let Some(password) = env.optional("REDIS_PASSWORD") {
        redis = redis.with_password(password);
    }
    if let Some(prefix) = env.optional("REDIS_KEY_PREFIX") {
        redis = redis.with_key_prefix(prefix);
    }
    Ok(redis)
}

/// Typed access to a variable lookup. Empty values count as unset.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    fn optional(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, name: &str) -> Result<String, Error> {
        self.optional(name)
            .ok_or_else(|| Error::Config(format!("{name} is required")))
    }

    fn url(&self, name: &str) -> Result<Url, Error> {
        self.required(name)?
            .parse()
            .map_err(|e| Error::Config(format!("{name}: {e}")))
    }

    fn parsed<T>(&self, name: &str) -> Result<Option<T>, Error>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(name)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|e| Error::Config(format!("{name}: invalid value '{raw}': {e}")))
            })
            .transpose()
    }

    fn flag(&self, name: &str) -> Result<Option<bool>, Error> {
        self.optional(name)
            .map(|raw| match raw.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Ok(true),
                "0" | "false" | "no" => Ok(false),
                _ => Err(Error::Config(format!(
                    "{name}: expected a boolean, got '{raw}'"
                ))),
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum_extra::extract::cookie::SameSite;

    use super::*;

    fn required() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("FRONTEND_URL", "https://app.example.com"),
            ("OIDC_PROVIDER_URL", "https://id.example.com/realms/main"),
            ("OIDC_CLIENT_ID", "gateway"),
            ("OIDC_CLIENT_SECRET", "secret"),
            ("OIDC_REDIRECT_URL", "https://app.example.com/auth/callback"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Config, Error> {
        Config::from_lookup(|name| vars.get(name).map(|v| (*v).to_string()))
    }

    #[test]
    fn defaults_apply() {
        let config = load(&required()).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.gateway.session_ttl, Duration::from_secs(3600));
        assert_eq!(config.gateway.request_timeout, Duration::from_secs(10));
        assert!(config.gateway.cookies.secure);
        assert!(config.gateway.cookies.http_only);
        assert_eq!(config.gateway.cookies.same_site, SameSite::Lax);
        assert_eq!(config.oidc.scopes(), &["openid", "profile", "email"]);
        assert_eq!(config.oidc.http_timeout(), Duration::from_secs(5));
    }

    #[cfg(feature = "redis")]
    #[test]
    fn redis_defaults_and_overrides() {
        let config = load(&required()).unwrap();
        assert_eq!(config.redis.addr, "localhost:6379");
        assert_eq!(config.redis.database, 0);
        assert!(config.redis.password.is_none());

        let mut vars = required();
        vars.insert("REDIS_ADDR", "redis:6379");
        vars.insert("REDIS_DB", "3");
        vars.insert("REDIS_PASSWORD", "pw");
        vars.insert("REDIS_KEY_PREFIX", "authgate");
        vars.insert("REDIS_COMMAND_TIMEOUT_MS", "500");
        let config = load(&vars).unwrap();
        assert_eq!(config.redis.addr, "redis:6379");
        assert_eq!(config.redis.database, 3);
        assert_eq!(config.redis.password.as_deref(), Some("pw"));
        assert_eq!(config.redis.key_prefix, "authgate");
        assert_eq!(config.redis.command_timeout, Duration::from_millis(500));
    }

    #[test]
    fn overrides_apply() {
        let mut vars = required();
        vars.insert("PORT", "9000");
        vars.insert("SESSION_MAX_AGE", "86400");
        vars.insert("COOKIE_DOMAIN", "example.com");
        vars.insert("COOKIE_SECURE", "false");
        vars.insert("COOKIE_SAME_SITE", "strict");
        vars.insert("OIDC_SCOPES", "openid, email ,offline_access");

        let config = load(&vars).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.gateway.session_ttl, Duration::from_secs(86400));
        assert_eq!(config.gateway.cookies.domain.as_deref(), Some("example.com"));
        assert!(!config.gateway.cookies.secure);
        assert_eq!(config.gateway.cookies.same_site, SameSite::Strict);
        assert_eq!(config.oidc.scopes(), &["openid", "email", "offline_access"]);
    }

    #[test]
    fn missing_required_variable_is_named() {
        for name in [
            "FRONTEND_URL",
            "OIDC_PROVIDER_URL",
            "OIDC_CLIENT_ID",
            "OIDC_CLIENT_SECRET",
            "OIDC_REDIRECT_URL",
        ] {
            let mut vars = required();
            vars.remove(name);
            let err = load(&vars).unwrap_err();
            assert!(err.to_string().contains(name), "{name}: {err}");
        }
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let mut vars = required();
        vars.insert("OIDC_CLIENT_ID", "  ");
        assert!(load(&vars).unwrap_err().to_string().contains("OIDC_CLIENT_ID"));
    }

    #[test]
    fn unparseable_values_are_rejected() {
        for (name, value) in [
            ("PORT", "eighty"),
            ("SESSION_MAX_AGE", "-5"),
            ("COOKIE_SECURE", "maybe"),
            ("COOKIE_SAME_SITE", "sometimes"),
            ("FRONTEND_URL", "not a url"),
        ] {
            let mut vars = required();
            vars.insert(name, value);
            let err = load(&vars).unwrap_err();
            assert!(err.to_string().contains(name), "{name}: {err}");
        }
    }

    #[test]
    fn scopes_must_include_openid() {
        let mut vars = required();
        vars.insert("OIDC_SCOPES", "profile,email");
        assert!(load(&vars).is_err());
    }

    #[test]
    fn zero_session_lifetime_is_rejected() {
        let mut vars = required();
        vars.insert("SESSION_MAX_AGE", "0");
        assert!(load(&vars).is_err());
    }
}
