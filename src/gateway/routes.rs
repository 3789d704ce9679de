use axum::extract::{Query, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use axum_extra::extract::CookieJar;
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use url::Url;

use super::cookies::{self, ACCESS_TOKEN_COOKIE, ALL_COOKIES, ID_TOKEN_COOKIE, SESSION_COOKIE};
use super::error::AuthError;
use super::flow::{CallbackParams, SessionFlow};
use crate::oidc::IdTokenClaims;
use crate::store::TokenStore;
use crate::types::{SessionId, TokenBundle};

/// The `/auth/*` routes without middleware.
pub fn auth_routes<S: TokenStore>(flow: SessionFlow<S>) -> Router {
    Router::new()
        .route("/auth/login", get(login::<S>))
        .route("/auth/callback", get(callback::<S>))
        .route("/auth/refresh", post(refresh::<S>))
        .route("/auth/logout", post(logout::<S>))
        .route("/auth/me", get(me::<S>))
        .with_state(flow)
}

/// The complete gateway: auth routes, `/health`, request tracing, panic
/// recovery and CORS for the frontend origin.
pub fn router<S: TokenStore>(flow: SessionFlow<S>) -> Router {
    let cors = cors_for(&flow.settings().frontend_url);

    let app = Router::new()
        .route("/health", get(health))
        .merge(auth_routes(flow))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http());

    match cors {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

fn cors_for(frontend_url: &Url) -> Option<CorsLayer> {
    let origin = frontend_url.origin().ascii_serialization();
    match HeaderValue::from_str(&origin) {
        Ok(origin) => Some(
            CorsLayer::new()
                .allow_origin(origin)
                .allow_credentials(true)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE]),
        ),
        Err(e) => {
            tracing::warn!(error = %e, origin, "Frontend origin unusable for CORS; CORS disabled");
            None
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

// ── Login ──────────────────────────────────────────────────────────

async fn login<S: TokenStore>(State(flow): State<SessionFlow<S>>) -> Result<Response, AuthError> {
    let authorization_url = flow.login().await?;
    Ok(found(&authorization_url))
}

// ── Callback ───────────────────────────────────────────────────────

async fn callback<S: TokenStore>(
    State(flow): State<SessionFlow<S>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Response), AuthError> {
    let authenticated = flow.callback(params).await?;
    let settings = flow.settings();

    let jar = with_token_cookies(jar, &authenticated.tokens, &flow).add(cookies::session_cookie(
        authenticated.session_id.as_str(),
        settings.session_ttl,
        &settings.cookies,
    ));

    Ok((jar, found(&settings.frontend_url)))
}

// ── Refresh ────────────────────────────────────────────────────────

async fn refresh<S: TokenStore>(
    State(flow): State<SessionFlow<S>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<serde_json::Value>), AuthError> {
    let session_id = jar
        .get(SESSION_COOKIE)
        .map(|c| SessionId(c.value().to_string()));

    let tokens = flow.refresh(session_id).await?;
    let jar = with_token_cookies(jar, &tokens, &flow);

    Ok((jar, Json(json!({ "message": "token refreshed" }))))
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout<S: TokenStore>(
    State(flow): State<SessionFlow<S>>,
    jar: CookieJar,
) -> (CookieJar, Response) {
    let session_id = jar
        .get(SESSION_COOKIE)
        .map(|c| SessionId(c.value().to_string()));
    let id_token = jar.get(ID_TOKEN_COOKIE).map(|c| c.value().to_string());

    // Cleared before the redirect is chosen; applies whatever happens next.
    let policy = &flow.settings().cookies;
    let jar = ALL_COOKIES
        .into_iter()
        .fold(jar, |jar, name| jar.add(cookies::clear_cookie(name, policy)));

    let target = flow.logout(session_id, id_token.as_deref()).await;
    (jar, found(&target))
}

// ── Current user ───────────────────────────────────────────────────

async fn me<S: TokenStore>(
    State(flow): State<SessionFlow<S>>,
    jar: CookieJar,
) -> Result<Json<IdTokenClaims>, AuthError> {
    let id_token = jar.get(ID_TOKEN_COOKIE).map(|c| c.value().to_string());
    flow.current_user(id_token.as_deref()).map(Json)
}

// ── Helpers ────────────────────────────────────────────────────────

/// `access_token` always; `id_token` only when the provider sent one, so a
/// refresh without a new ID token leaves the existing cookie alone.
fn with_token_cookies<S>(jar: CookieJar, tokens: &TokenBundle, flow: &SessionFlow<S>) -> CookieJar
where
    S: TokenStore,
{
    let policy = &flow.settings().cookies;
    let jar = jar.add(cookies::token_cookie(
        ACCESS_TOKEN_COOKIE,
        &tokens.access_token,
        tokens.expires_at,
        policy,
    ));

    match tokens.id_token.as_deref() {
        Some(id_token) => jar.add(cookies::token_cookie(
            ID_TOKEN_COOKIE,
            id_token,
            tokens.expires_at,
            policy,
        )),
        None => jar,
    }
}

/// 302 Found, the status browsers and the frontend expect from this gateway.
fn found(target: &Url) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, target.to_string())]).into_response()
}
