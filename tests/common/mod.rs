#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use authgate::error::Error;
use authgate::gateway::{GatewaySettings, SessionFlow, router};
use authgate::{MemoryStore, OidcClient, OidcConfig, SessionId, StateId, TokenStore};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, header};
use axum_extra::extract::cookie::Cookie;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CLIENT_ID: &str = "gateway";
pub const CLIENT_SECRET: &str = "gateway-secret";
pub const FRONTEND: &str = "https://app.example.com/";
pub const KID: &str = "test-key-id";

const SIGNING_KEY: &str = include_str!("../fixtures/idp_rsa.pem");
const JWKS: &str = include_str!("../fixtures/jwks.json");

/// A mock identity provider serving discovery and keys.
pub struct Provider {
    pub server: MockServer,
}

impl Provider {
    pub async fn start(end_session: bool) -> Self {
        let server = MockServer::start().await;
        let uri = server.uri();

        let mut discovery = json!({
            "issuer": uri,
            "authorization_endpoint": format!("{uri}/authorize"),
            "token_endpoint": format!("{uri}/token"),
            "jwks_uri": format!("{uri}/jwks"),
            "response_types_supported": ["code"],
            "id_token_signing_alg_values_supported": ["RS256"]
        });
        if end_session {
            discovery["end_session_endpoint"] = json!(format!("{uri}/logout"));
        }

        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(discovery))
            .mount(&server)
            .await;

        let jwks: Value = serde_json::from_str(JWKS).unwrap();
        Mock::given(method("GET"))
            .and(path("/jwks"))
            .respond_with(ResponseTemplate::new(200).set_body_json(jwks))
            .mount(&server)
            .await;

        Self { server }
    }

    pub fn issuer(&self) -> String {
        self.server.uri()
    }

    pub fn config(&self) -> OidcConfig {
        OidcConfig::new(
            self.issuer().parse().unwrap(),
            CLIENT_ID,
            CLIENT_SECRET,
            "https://app.example.com/auth/callback".parse().unwrap(),
        )
        .with_http_timeout(Duration::from_secs(2))
    }

    pub async fn client(&self) -> OidcClient {
        OidcClient::discover(self.config()).await.unwrap()
    }

    /// ID token for `sub`, signed with the published key.
    pub fn id_token(&self, sub: &str) -> String {
        self.id_token_with(json!({ "sub": sub }))
    }

    /// ID token with `overrides` merged over valid default claims.
    pub fn id_token_with(&self, overrides: Value) -> String {
        let now = time::OffsetDateTime::now_utc().unix_timestamp();
        let mut claims = json!({
            "iss": self.issuer(),
            "sub": "user-1",
            "aud": CLIENT_ID,
            "exp": now + 300,
            "iat": now,
            "email": "user@example.com"
        });
        if let (Some(base), Some(extra)) = (claims.as_object_mut(), overrides.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(KID.to_string());
        let key = EncodingKey::from_rsa_pem(SIGNING_KEY.as_bytes()).unwrap();
        encode(&header, &claims, &key).unwrap()
    }

    pub fn token_response(&self, refresh_token: Option<&str>, id_token: Option<String>) -> Value {
        let mut body = json!({
            "access_token": "access-token-1",
            "token_type": "Bearer",
            "expires_in": 300
        });
        if let Some(rt) = refresh_token {
            body["refresh_token"] = json!(rt);
        }
        if let Some(it) = id_token {
            body["id_token"] = json!(it);
        }
        body
    }
}

/// [`MemoryStore`] that counts every call made to it.
#[derive(Default)]
pub struct CountingStore {
    pub inner: MemoryStore,
    calls: AtomicUsize,
}

impl CountingStore {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl TokenStore for CountingStore {
    async fn create_state(&self) -> Result<StateId, Error> {
        self.hit();
        self.inner.create_state().await
    }

    async fn validate_state(&self, state: &StateId) -> Result<(), Error> {
        self.hit();
        self.inner.validate_state(state).await
    }

    async fn create_session(&self, refresh_token: &str) -> Result<SessionId, Error> {
        self.hit();
        self.inner.create_session(refresh_token).await
    }

    async fn get_refresh_token(&self, session_id: &SessionId) -> Result<String, Error> {
        self.hit();
        self.inner.get_refresh_token(session_id).await
    }

    async fn update_session(&self, session_id: &SessionId, refresh_token: &str) -> Result<(), Error> {
        self.hit();
        self.inner.update_session(session_id, refresh_token).await
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<(), Error> {
        self.hit();
        self.inner.delete_session(session_id).await
    }
}

pub struct Gateway {
    pub app: Router,
    pub store: Arc<CountingStore>,
}

pub async fn gateway(provider: &Provider) -> Gateway {
    let store = Arc::new(CountingStore::default());
    let settings = GatewaySettings::new(FRONTEND.parse().unwrap())
        .with_request_timeout(Duration::from_secs(5));
    let flow = SessionFlow::new(store.clone(), provider.client().await, settings);
    Gateway {
        app: router(flow),
        store,
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_with_cookies(uri: &str, cookies: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri(uri);
    if !cookies.is_empty() {
        let header_value = cookies
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        builder = builder.header(header::COOKIE, header_value);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("Location header")
        .to_str()
        .unwrap()
        .to_string()
}

pub fn set_cookies(response: &Response<Body>) -> Vec<Cookie<'static>> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| Cookie::parse(v.to_str().unwrap().to_string()).unwrap())
        .collect()
}

pub fn cookie<'a>(cookies: &'a [Cookie<'static>], name: &str) -> Option<&'a Cookie<'static>> {
    cookies.iter().find(|c| c.name() == name)
}

pub fn query_param(url: &str, name: &str) -> Option<String> {
    url::Url::parse(url)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
