#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod gateway;
pub mod oidc;
pub mod random;
pub mod store;
pub mod types;

// Re-exports for convenient access
pub use config::{Config, ServerConfig};
pub use error::Error;
pub use gateway::{AuthError, GatewaySettings, SessionFlow, router};
pub use oidc::{IdTokenClaims, OidcClient, OidcConfig};
pub use store::{MemoryStore, TokenStore};
#[cfg(feature = "redis")]
pub use store::{RedisConfig, RedisStore};
pub use types::{SessionId, StateId, TokenBundle};
