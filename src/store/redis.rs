use std::time::Duration;

use fred::prelude::*;

use super::{STATE_MARKER, STATE_TTL, TokenStore, session_key, state_key};
use crate::error::Error;
use crate::random::generate_identifier;
use crate::types::{SessionId, StateId};

/// Redis connection settings.
#[derive(Clone)]
#[non_exhaustive]
pub struct RedisConfig {
    /// `host:port` of the Redis server.
    pub addr: String,
    pub password: Option<String>,
    pub database: u8,
    /// Prepended as `<prefix>:` to every key. Empty keeps the bare layout.
    pub key_prefix: String,
    pub connect_timeout: Duration,
    /// Upper bound on any single store command.
    pub command_timeout: Duration,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            addr: "localhost:6379".into(),
            password: None,
            database: 0,
            key_prefix: String::new(),
            connect_timeout: Duration::from_secs(5),
            command_timeout: Duration::from_millis(2000),
        }
    }
}

impl std::fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConfig")
            .field("addr", &self.addr)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("key_prefix", &self.key_prefix)
            .field("connect_timeout", &self.connect_timeout)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

impl RedisConfig {
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub fn with_database(mut self, database: u8) -> Self {
        self.database = database;
        self
    }

    #[must_use]
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Connection URL understood by the client, password percent-encoded.
    #[must_use]
    pub fn connection_url(&self) -> String {
        let auth = self
            .password
            .as_deref()
            .map(|p| format!(":{}@", urlencoding::encode(p)))
            .unwrap_or_default();
        format!("redis://{auth}{}/{}", self.addr, self.database)
    }

    fn prefixed(&self, key: String) -> String {
        if self.key_prefix.is_empty() {
            key
        } else {
            format!("{}:{key}", self.key_prefix)
        }
    }
}

/// [`TokenStore`] on Redis, relying on native key expiry.
///
/// State consumption is a single `GETDEL`; rotation is `SET .. XX EX`, so
/// neither can race with a concurrent consumer or logout.
#[derive(Clone)]
pub struct RedisStore {
    client: Client,
    config: RedisConfig,
    session_ttl: Duration,
}

impl RedisStore {
    /// Connect and wait for the first connection to be established.
    ///
    /// # Errors
    ///
    /// [`Error::Config`] for an unusable URL; [`Error::StorageUnavailable`] if
    /// the server cannot be reached.
    pub async fn connect(config: RedisConfig, session_ttl: Duration) -> Result<Self, Error> {
        let redis_config = Config::from_url(&config.connection_url())
            .map_err(|e| Error::Config(format!("redis: {e}")))?;

        let performance = PerformanceConfig {
            default_command_timeout: config.command_timeout,
            ..PerformanceConfig::default()
        };
        let connection = ConnectionConfig {
            connection_timeout: config.connect_timeout,
            ..ConnectionConfig::default()
        };

        let client = Client::new(
            redis_config,
            Some(performance),
            Some(connection),
            Some(ReconnectPolicy::new_exponential(0, 100, 30_000, 2)),
        );
        client.init().await.map_err(storage_error)?;

        tracing::info!(addr = %config.addr, db = config.database, "Connected to Redis");

        Ok(Self {
            client,
            config,
            session_ttl,
        })
    }

    /// Wrap an already-initialised client.
    #[must_use]
    pub fn from_client(client: Client, config: RedisConfig, session_ttl: Duration) -> Self {
        Self {
            client,
            config,
            session_ttl,
        }
    }

    /// Close the connection.
    pub async fn quit(&self) {
        if let Err(e) = self.client.quit().await {
            tracing::warn!(error = %e, "Redis quit failed");
        }
    }

    fn state_key(&self, state: &StateId) -> String {
        self.config.prefixed(state_key(state))
    }

    fn session_key(&self, session_id: &SessionId) -> String {
        self.config.prefixed(session_key(session_id))
    }

    fn session_expiry(&self) -> Expiration {
        Expiration::EX(ttl_seconds(self.session_ttl))
    }
}

impl TokenStore for RedisStore {
    async fn create_state(&self) -> Result<StateId, Error> {
        let state = StateId(generate_identifier());
        self.client
            .set::<(), _, _>(
                self.state_key(&state),
                STATE_MARKER,
                Some(Expiration::EX(ttl_seconds(STATE_TTL))),
                None,
                false,
            )
            .await
            .map_err(storage_error)?;
        Ok(state)
    }

    async fn validate_state(&self, state: &StateId) -> Result<(), Error> {
        let consumed: Option<String> = self
            .client
            .getdel(self.state_key(state))
            .await
            .map_err(storage_error)?;

        match consumed {
            Some(_) => Ok(()),
            None => Err(Error::InvalidOrExpiredState),
        }
    }

    async fn create_session(&self, refresh_token: &str) -> Result<SessionId, Error> {
        let session_id = SessionId(generate_identifier());
        self.client
            .set::<(), _, _>(
                self.session_key(&session_id),
                refresh_token,
                Some(self.session_expiry()),
                None,
                false,
            )
            .await
            .map_err(storage_error)?;
        Ok(session_id)
    }

    async fn get_refresh_token(&self, session_id: &SessionId) -> Result<String, Error> {
        let value: Option<String> = self
            .client
            .get(self.session_key(session_id))
            .await
            .map_err(storage_error)?;
        value.ok_or(Error::SessionNotFound)
    }

    async fn update_session(&self, session_id: &SessionId, refresh_token: &str) -> Result<(), Error> {
        // XX: only overwrite an existing key. Redis answers nil when nothing was set.
        let result: Option<String> = self
            .client
            .set(
                self.session_key(session_id),
                refresh_token,
                Some(self.session_expiry()),
                Some(SetOptions::XX),
                false,
            )
            .await
            .map_err(storage_error)?;

        match result {
            Some(_) => Ok(()),
            None => Err(Error::SessionNotFound),
        }
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<(), Error> {
        self.client
            .del::<i64, _>(self.session_key(session_id))
            .await
            .map_err(storage_error)?;
        Ok(())
    }
}

/// Whole seconds for `EX`, at least one and saturating at `i64::MAX`.
fn ttl_seconds(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs().max(1)).unwrap_or(i64::MAX)
}

#[allow(clippy::needless_pass_by_value)]
fn storage_error(err: fred::error::Error) -> Error {
    Error::StorageUnavailable(err.to_string())
}
