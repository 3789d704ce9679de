//! Durable bookkeeping for CSRF state markers and session bindings.
//!
//! Two independent keyspaces, each with native TTL expiry:
//!
//! | Key | Value | TTL |
//! |---|---|---|
//! | `state:<id>` | `"valid"` | [`STATE_TTL`] |
//! | `session:<id>` | refresh token | configured session lifetime |
//!
//! Engines: [`MemoryStore`] (tests, single process) and, with the `redis`
//! feature, [`RedisStore`].

use std::future::Future;
use std::time::Duration;

use crate::error::Error;
use crate::types::{SessionId, StateId};

mod memory;
#[cfg(feature = "redis")]
mod redis;

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis::{RedisConfig, RedisStore};

/// Lifetime of an issued, unconsumed state value.
pub const STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// Default session lifetime when none is configured.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);

pub(crate) const STATE_PREFIX: &str = "state:";
pub(crate) const SESSION_PREFIX: &str = "session:";
pub(crate) const STATE_MARKER: &str = "valid";

pub(crate) fn state_key(state: &StateId) -> String {
    format!("{STATE_PREFIX}{state}")
}

pub(crate) fn session_key(session_id: &SessionId) -> String {
    format!("{SESSION_PREFIX}{session_id}")
}

/// State and session persistence used by the login flow.
///
/// Expiry is the engine's job; there is no application-level sweep. Only two
/// operations need real atomicity: [`validate_state`](Self::validate_state)
/// (check-and-delete) and [`update_session`](Self::update_session)
/// (update-only-if-present).
pub trait TokenStore: Send + Sync + 'static {
    /// Issue a fresh state value valid for [`STATE_TTL`].
    ///
    /// # Errors
    ///
    /// [`Error::StorageUnavailable`] if the marker cannot be written.
    fn create_state(&self) -> impl Future<Output = Result<StateId, Error>> + Send;

    /// Consume a state value.
    ///
    /// Succeeds at most once per issued value: of two concurrent calls with the
    /// same value, exactly one wins and the other sees it absent.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidOrExpiredState`] if the value is unknown, consumed, or
    /// expired; [`Error::StorageUnavailable`] on backend failure.
    fn validate_state(&self, state: &StateId)
    -> impl Future<Output = Result<(), Error>> + Send;

    /// Bind a refresh token to a new session id with the configured session TTL.
    ///
    /// # Errors
    ///
    /// [`Error::StorageUnavailable`] if the binding cannot be written.
    fn create_session(
        &self,
        refresh_token: &str,
    ) -> impl Future<Output = Result<SessionId, Error>> + Send;

    /// Look up the refresh token bound to a session.
    ///
    /// # Errors
    ///
    /// [`Error::SessionNotFound`] if absent or expired;
    /// [`Error::StorageUnavailable`] on backend failure.
    fn get_refresh_token(
        &self,
        session_id: &SessionId,
    ) -> impl Future<Output = Result<String, Error>> + Send;

    /// Replace the bound refresh token and reset the TTL to the full session lifetime.
    ///
    /// Never creates a session: rotating a deleted or expired session fails.
    ///
    /// # Errors
    ///
    /// [`Error::SessionNotFound`] if the session does not currently exist;
    /// [`Error::StorageUnavailable`] on backend failure.
    fn update_session(
        &self,
        session_id: &SessionId,
        refresh_token: &str,
    ) -> impl Future<Output = Result<(), Error>> + Send;

    /// Remove a session. Deleting an unknown session is not an error.
    ///
    /// # Errors
    ///
    /// [`Error::StorageUnavailable`] on backend failure.
    fn delete_session(&self, session_id: &SessionId)
    -> impl Future<Output = Result<(), Error>> + Send;
}
