/// Failures of the token store and the identity provider adapter.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The backing store could not be read or written.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// The CSRF state was never issued, already consumed, or expired.
    #[error("Invalid or expired state")]
    InvalidOrExpiredState,

    /// No session exists for the identifier (never created, deleted, or expired).
    #[error("Session not found")]
    SessionNotFound,

    /// Provider discovery or key retrieval failed.
    #[error("Provider unreachable: {0}")]
    ProviderUnreachable(String),

    /// The token endpoint rejected the authorization code, or could not be reached.
    ///
    /// `status` is `None` when no HTTP response was received.
    #[error("Code exchange failed ({}): {detail}", status_label(.status))]
    CodeExchangeFailed { status: Option<u16>, detail: String },

    /// The token response carried no `id_token`.
    #[error("Token response has no id_token")]
    MissingIdToken,

    /// ID token signature or standard claims did not verify.
    #[error("ID token verification failed: {0}")]
    IdTokenVerificationFailed(String),

    /// The token endpoint rejected the refresh token, or could not be reached.
    #[error("Refresh failed ({}): {detail}", status_label(.status))]
    RefreshFailed { status: Option<u16>, detail: String },

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// `true` when the provider answered with a 4xx, i.e. it understood and refused our request.
    ///
    /// Used only to pick the log message; callers see the same failure either way.
    #[must_use]
    pub fn is_provider_rejection(&self) -> bool {
        match self {
            Self::CodeExchangeFailed { status, .. } | Self::RefreshFailed { status, .. } => {
                matches!(status, Some(400..=499))
            }
            _ => false,
        }
    }
}

fn status_label(status: &Option<u16>) -> String {
    status.map_or_else(|| "no response".to_string(), |s| format!("HTTP {s}"))
}
