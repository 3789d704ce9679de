use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One-time CSRF state value sent as the `state` authorization parameter.
///
/// Opaque to everything but the token store. Valid for ten minutes or until
/// consumed by the first successful callback, whichever comes first.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct StateId(pub String);

impl StateId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StateId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Opaque session identifier handed to the browser in the `session_id` cookie.
///
/// A bearer credential: whoever holds it can refresh tokens until the session
/// expires or is logged out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl SessionId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Tokens returned by a code exchange or refresh.
///
/// Never persisted as a whole: the access and ID tokens go to cookies, the
/// refresh token into the session record.
#[derive(Clone)]
#[non_exhaustive]
pub struct TokenBundle {
    pub access_token: String,
    /// Always present after a code exchange; optional on refresh.
    pub id_token: Option<String>,
    /// `None` when the provider did not issue (or did not rotate) a refresh token.
    pub refresh_token: Option<String>,
    /// Instant the access token stops being valid, when known.
    pub expires_at: Option<OffsetDateTime>,
}

impl TokenBundle {
    #[must_use]
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            id_token: None,
            refresh_token: None,
            expires_at: None,
        }
    }

    #[must_use]
    pub fn with_id_token(mut self, id_token: impl Into<String>) -> Self {
        self.id_token = Some(id_token.into());
        self
    }

    #[must_use]
    pub fn with_refresh_token(mut self, refresh_token: impl Into<String>) -> Self {
        self.refresh_token = Some(refresh_token.into());
        self
    }

    #[must_use]
    pub fn with_expires_at(mut self, expires_at: OffsetDateTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// The refresh token that must replace `current`, if the provider rotated it.
    ///
    /// An absent, empty, or identical token means no rotation happened.
    #[must_use]
    pub fn rotated_refresh_token(&self, current: &str) -> Option<&str> {
        self.refresh_token
            .as_deref()
            .filter(|t| !t.is_empty() && *t != current)
    }
}

// Tokens are credentials; keep them out of debug output.
impl std::fmt::Debug for TokenBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBundle")
            .field("access_token", &"<redacted>")
            .field("id_token", &self.id_token.as_ref().map(|_| "<redacted>"))
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
