//! The four login-flow operations, independent of HTTP.
//!
//! Each operation composes the [`TokenStore`] and the [`OidcClient`] in a
//! fixed order and returns a structured outcome; the router turns outcomes
//! into redirects and cookies.

use std::future::Future;
use std::sync::Arc;

use serde::Deserialize;
use url::Url;

use super::config::GatewaySettings;
use super::error::AuthError;
use crate::error::Error;
use crate::oidc::{IdTokenClaims, OidcClient};
use crate::store::TokenStore;
use crate::types::{SessionId, StateId, TokenBundle};

/// Query parameters of the provider's redirect back to `/auth/callback`.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// A completed login: the new session and the tokens to hand to the browser.
#[derive(Debug)]
pub struct Authenticated {
    pub session_id: SessionId,
    pub tokens: TokenBundle,
}

/// Session flow orchestrator.
pub struct SessionFlow<S> {
    store: Arc<S>,
    oidc: OidcClient,
    settings: GatewaySettings,
}

// Manual Clone: derive would require `S: Clone`.
impl<S> Clone for SessionFlow<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            oidc: self.oidc.clone(),
            settings: self.settings.clone(),
        }
    }
}

impl<S: TokenStore> SessionFlow<S> {
    #[must_use]
    pub fn new(store: Arc<S>, oidc: OidcClient, settings: GatewaySettings) -> Self {
        Self {
            store,
            oidc,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[must_use]
    pub fn oidc(&self) -> &OidcClient {
        &self.oidc
    }

    /// Issue a state value and build the provider authorization URL.
    ///
    /// # Errors
    ///
    /// [`AuthError::Storage`] if the state cannot be persisted.
    pub async fn login(&self) -> Result<Url, AuthError> {
        self.within("login", async {
            let state = self.store.create_state().await.map_err(|source| AuthError::Storage {
                message: "failed to create state",
                source,
            })?;
            Ok(self.oidc.authorization_url(&state))
        })
        .await
    }

    /// Complete the authorization: consume the state, exchange the code,
    /// then open a session bound to the refresh token.
    ///
    /// Nothing is exchanged unless the state was valid, and no session is
    /// created unless the exchange (including ID-token verification) succeeded.
    ///
    /// # Errors
    ///
    /// Client errors for a provider error redirect, missing parameters or an
    /// unknown state; [`AuthError::Upstream`] / [`AuthError::Storage`] otherwise.
    pub async fn callback(&self, params: CallbackParams) -> Result<Authenticated, AuthError> {
        if let Some(error) = params.error.filter(|e| !e.is_empty()) {
            tracing::warn!(
                error = %error,
                description = params.error_description.as_deref().unwrap_or_default(),
                "Provider returned an authorization error"
            );
            return Err(AuthError::AuthorizationDenied {
                error,
                description: params.error_description,
            });
        }

        let (Some(code), Some(state)) = (
            params.code.filter(|c| !c.is_empty()),
            params.state.filter(|s| !s.is_empty()),
        ) else {
            return Err(AuthError::MissingParameters);
        };
        let state = StateId(state);

        self.within("callback", async {
            self.store.validate_state(&state).await.map_err(|e| match e {
                Error::InvalidOrExpiredState => {
                    tracing::warn!("Callback with unknown, replayed or expired state");
                    AuthError::InvalidState
                }
                source => AuthError::Storage {
                    message: "failed to validate state",
                    source,
                },
            })?;

            let tokens = self.oidc.exchange_code(&code).await.map_err(|source| {
                log_provider_failure("code exchange", &source);
                AuthError::Upstream {
                    message: "failed to exchange code",
                    source,
                }
            })?;

            let refresh_token = tokens.refresh_token.as_deref().unwrap_or_default();
            if refresh_token.is_empty() {
                tracing::warn!("Provider issued no refresh token; session cannot be refreshed");
            }

            let session_id =
                self.store
                    .create_session(refresh_token)
                    .await
                    .map_err(|source| AuthError::Storage {
                        message: "failed to create session",
                        source,
                    })?;

            tracing::info!("Login completed");
            Ok(Authenticated { session_id, tokens })
        })
        .await
    }

    /// Exchange the session's refresh token for fresh tokens, rotating the
    /// stored refresh token when the provider issued a new one.
    ///
    /// # Errors
    ///
    /// [`AuthError::MissingSession`] / [`AuthError::InvalidSession`] for a
    /// missing or unknown session; server errors when the provider refuses,
    /// the store fails, or the session vanished before rotation.
    pub async fn refresh(&self, session_id: Option<SessionId>) -> Result<TokenBundle, AuthError> {
        let session_id = session_id
            .filter(|id| !id.as_str().is_empty())
            .ok_or(AuthError::MissingSession)?;

        self.within("refresh", async {
            let current = self
                .store
                .get_refresh_token(&session_id)
                .await
                .map_err(|e| match e {
                    Error::SessionNotFound => AuthError::InvalidSession,
                    source => AuthError::Storage {
                        message: "failed to load session",
                        source,
                    },
                })?;

            if current.is_empty() {
                tracing::debug!("Session has no refresh token bound");
                return Err(AuthError::InvalidSession);
            }

            let tokens = self.oidc.refresh(&current).await.map_err(|source| {
                log_provider_failure("refresh", &source);
                AuthError::Upstream {
                    message: "failed to refresh token",
                    source,
                }
            })?;

            if let Some(rotated) = tokens.rotated_refresh_token(&current) {
                self.store
                    .update_session(&session_id, rotated)
                    .await
                    .map_err(|source| AuthError::Storage {
                        message: "failed to update session",
                        source,
                    })?;
                tracing::debug!("Refresh token rotated");
            }

            Ok(tokens)
        })
        .await
    }

    /// Forget the session and pick where the browser goes next.
    ///
    /// Never fails: a store error is logged and the logout proceeds. Returns
    /// the provider's end-session URL when an ID token is available and the
    /// provider supports RP-Initiated Logout, the frontend URL otherwise.
    pub async fn logout(&self, session_id: Option<SessionId>, id_token: Option<&str>) -> Url {
        if let Some(session_id) = session_id.filter(|id| !id.as_str().is_empty()) {
            let deleted =
                tokio::time::timeout(self.settings.request_timeout, self.store.delete_session(&session_id))
                    .await;
            match deleted {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Session deletion failed during logout"),
                Err(_) => tracing::warn!("Session deletion timed out during logout"),
            }
        }

        let frontend = &self.settings.frontend_url;
        if let Some(id_token) = id_token.filter(|t| !t.is_empty()) {
            match self.oidc.end_session_url(id_token, frontend.as_str()) {
                Some(url) => return url,
                None => tracing::debug!("Provider has no end-session endpoint; local logout only"),
            }
        }
        frontend.clone()
    }

    /// Verify the `id_token` cookie and return its claims.
    ///
    /// # Errors
    ///
    /// [`AuthError::Unauthenticated`] if the token is absent or does not verify.
    pub fn current_user(&self, id_token: Option<&str>) -> Result<IdTokenClaims, AuthError> {
        let id_token = id_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Unauthenticated)?;

        self.oidc.verify_id_token(id_token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected id_token cookie");
            AuthError::Unauthenticated
        })
    }

    async fn within<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, AuthError>>,
    ) -> Result<T, AuthError> {
        tokio::time::timeout(self.settings.request_timeout, fut)
            .await
            .map_err(|_| {
                tracing::warn!(operation, "Request deadline exceeded");
                AuthError::Timeout(operation)
            })?
    }
}

/// Provider refusals are our problem (bad code, revoked token); anything else
/// points at the provider or the network.
fn log_provider_failure(operation: &'static str, err: &Error) {
    if err.is_provider_rejection() {
        tracing::warn!(operation, error = %err, "Provider rejected request");
    } else {
        match err {
            Error::CodeExchangeFailed { .. } | Error::RefreshFailed { .. } => {
                tracing::error!(operation, error = %err, "Provider unavailable");
            }
            _ => tracing::error!(operation, error = %err, "Provider returned unusable tokens"),
        }
    }
}
