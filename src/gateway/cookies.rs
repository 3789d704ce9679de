use std::time::Duration as StdDuration;

use axum_extra::extract::cookie::Cookie;
use time::{Duration, OffsetDateTime};

use super::config::CookiePolicy;

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const ID_TOKEN_COOKIE: &str = "id_token";
pub const SESSION_COOKIE: &str = "session_id";

/// Every cookie the gateway issues, in the order they are cleared.
pub(super) const ALL_COOKIES: [&str; 3] = [ACCESS_TOKEN_COOKIE, ID_TOKEN_COOKIE, SESSION_COOKIE];

fn build(name: &'static str, value: String, policy: &CookiePolicy) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, value))
        .path("/")
        .http_only(policy.http_only)
        .secure(policy.secure)
        .same_site(policy.same_site)
        .build();
    if let Some(domain) = &policy.domain {
        cookie.set_domain(domain.clone());
    }
    cookie
}

/// Cookie carrying a provider token, living until the token expires.
///
/// Without a known expiry the cookie is a browser-session cookie.
pub(super) fn token_cookie(
    name: &'static str,
    token: &str,
    expires_at: Option<OffsetDateTime>,
    policy: &CookiePolicy,
) -> Cookie<'static> {
    let mut cookie = build(name, token.to_string(), policy);
    if let Some(expires_at) = expires_at {
        let remaining = (expires_at - OffsetDateTime::now_utc()).max(Duration::ZERO);
        cookie.set_max_age(remaining);
    }
    cookie
}

/// `session_id` cookie living for the configured session lifetime.
pub(super) fn session_cookie(
    session_id: &str,
    ttl: StdDuration,
    policy: &CookiePolicy,
) -> Cookie<'static> {
    let mut cookie = build(SESSION_COOKIE, session_id.to_string(), policy);
    cookie.set_max_age(Duration::try_from(ttl).unwrap_or(Duration::MAX));
    cookie
}

/// Empty cookie with a negative max-age, so browsers drop it immediately.
pub(super) fn clear_cookie(name: &'static str, policy: &CookiePolicy) -> Cookie<'static> {
    let mut cookie = build(name, String::new(), policy);
    cookie.set_max_age(Duration::seconds(-1));
    cookie
}
