use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::Error;

/// Request-level outcome of a failed gateway operation.
///
/// Client kinds answer 4xx with a fixed message. Storage and upstream kinds
/// answer 500 with a fixed message; the underlying [`Error`] is logged only.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AuthError {
    #[error("missing code or state")]
    MissingParameters,

    /// The provider redirected back with `error=...` instead of a code.
    #[error("authorization denied: {error}")]
    AuthorizationDenied {
        error: String,
        description: Option<String>,
    },

    #[error("invalid state")]
    InvalidState,

    #[error("missing session")]
    MissingSession,

    #[error("invalid session")]
    InvalidSession,

    #[error("not authenticated")]
    Unauthenticated,

    #[error("{message}: {source}")]
    Storage {
        message: &'static str,
        #[source]
        source: Error,
    },

    #[error("{message}: {source}")]
    Upstream {
        message: &'static str,
        #[source]
        source: Error,
    },

    #[error("request timed out during {0}")]
    Timeout(&'static str),
}

impl AuthError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingParameters | Self::AuthorizationDenied { .. } | Self::InvalidState => {
                StatusCode::BAD_REQUEST
            }
            Self::MissingSession | Self::InvalidSession | Self::Unauthenticated => {
                StatusCode::UNAUTHORIZED
            }
            Self::Storage { .. } | Self::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Message safe to return to the browser.
    fn public_message(&self) -> String {
        match self {
            Self::Storage { message, .. } | Self::Upstream { message, .. } => (*message).to_string(),
            Self::AuthorizationDenied { .. } => "authorization denied".to_string(),
            Self::Timeout(_) => "request timed out".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "Auth request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Auth request rejected");
        }

        (status, Json(json!({ "error": self.public_message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: AuthError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn client_errors_keep_their_message() {
        let (status, body) = body_json(AuthError::MissingParameters).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "missing code or state");

        let (status, body) = body_json(AuthError::InvalidSession).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid session");
    }

    #[tokio::test]
    async fn server_errors_hide_detail() {
        let err = AuthError::Storage {
            message: "failed to create state",
            source: Error::StorageUnavailable("connection refused 10.0.0.7:6379".into()),
        };
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "failed to create state");
        assert!(!body.to_string().contains("10.0.0.7"));
    }

    #[tokio::test]
    async fn provider_error_description_is_not_echoed() {
        let err = AuthError::AuthorizationDenied {
            error: "access_denied".into(),
            description: Some("<script>".into()),
        };
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "authorization denied");
    }

    #[test]
    fn timeout_maps_to_gateway_timeout() {
        assert_eq!(AuthError::Timeout("refresh").status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
