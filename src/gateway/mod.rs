//! HTTP side of the gateway: the session flow orchestrator and the axum
//! router that exposes it.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use authgate::gateway::{GatewaySettings, SessionFlow, router};
//! use authgate::oidc::OidcClient;
//! use authgate::store::MemoryStore;
//!
//! let oidc = OidcClient::discover(oidc_config).await?;
//! let settings = GatewaySettings::new("https://app.example.com".parse()?);
//! let flow = SessionFlow::new(Arc::new(MemoryStore::default()), oidc, settings);
//!
//! let app = router(flow);
//! ```

mod config;
mod cookies;
mod error;
mod flow;
mod routes;

pub use config::{CookiePolicy, GatewaySettings, parse_same_site};
pub use cookies::{ACCESS_TOKEN_COOKIE, ID_TOKEN_COOKIE, SESSION_COOKIE};
pub use error::AuthError;
pub use flow::{Authenticated, CallbackParams, SessionFlow};
pub use routes::{auth_routes, router};

/// Re-export for building a [`CookiePolicy`].
pub use axum_extra::extract::cookie::SameSite;
