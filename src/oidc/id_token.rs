use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::Error;

/// Clock skew tolerated on `exp`/`nbf`, in seconds.
const LEEWAY_SECS: u64 = 60;

/// Claims of a verified ID token.
///
/// Standard claims are typed; everything else the provider sent is kept in
/// `extra` (e.g. `email`, `name`, `preferred_username`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[non_exhaustive]
pub struct IdTokenClaims {
    pub iss: String,
    pub sub: String,
    pub aud: Audience,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, JsonValue>,
}

impl IdTokenClaims {
    /// Gets a non-standard claim by name.
    #[must_use]
    pub fn get_claim(&self, key: &str) -> Option<&JsonValue> {
        self.extra.get(key)
    }
}

/// `aud` is either a single string or an array of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    #[must_use]
    pub fn contains(&self, client_id: &str) -> bool {
        match self {
            Self::Single(aud) => aud == client_id,
            Self::Multiple(auds) => auds.iter().any(|a| a == client_id),
        }
    }
}

/// Verifies ID tokens against the provider's published keys.
///
/// Holds no mutable state; the key set is the one fetched at discovery.
#[derive(Clone)]
pub(crate) struct IdTokenVerifier {
    jwks: JwkSet,
    issuer: String,
    client_id: String,
}

impl IdTokenVerifier {
    pub(crate) fn new(jwks: JwkSet, issuer: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            jwks,
            issuer: issuer.into(),
            client_id: client_id.into(),
        }
    }

    /// Verifies signature, `iss`, `aud`, `exp` and presence of `sub`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IdTokenVerificationFailed`] describing the first check that failed.
    pub(crate) fn verify(&self, raw_token: &str) -> Result<IdTokenClaims, Error> {
        let header = decode_header(raw_token).map_err(invalid)?;
        if !is_asymmetric(header.alg) {
            return Err(Error::IdTokenVerificationFailed(format!(
                "unsupported algorithm {:?}",
                header.alg
            )));
        }

        let key = self.decoding_key(header.kid.as_deref())?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = LEEWAY_SECS;
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.client_id.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        let data = decode::<IdTokenClaims>(raw_token, &key, &validation).map_err(invalid)?;
        if data.claims.sub.is_empty() {
            return Err(Error::IdTokenVerificationFailed("empty sub claim".into()));
        }
        Ok(data.claims)
    }

    /// Picks the key named by `kid`; a token without `kid` is accepted only
    /// when the provider publishes exactly one key.
    fn decoding_key(&self, kid: Option<&str>) -> Result<DecodingKey, Error> {
        let jwk = match kid {
            Some(kid) => self.jwks.find(kid),
            None if self.jwks.keys.len() == 1 => self.jwks.keys.first(),
            None => None,
        }
        .ok_or_else(|| {
            Error::IdTokenVerificationFailed(format!(
                "no signing key for kid {}",
                kid.unwrap_or("<none>")
            ))
        })?;

        DecodingKey::from_jwk(jwk).map_err(invalid)
    }
}

fn is_asymmetric(alg: Algorithm) -> bool {
    matches!(
        alg,
        Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512
            | Algorithm::ES256
            | Algorithm::ES384
            | Algorithm::EdDSA
    )
}

#[allow(clippy::needless_pass_by_value)]
fn invalid(err: jsonwebtoken::errors::Error) -> Error {
    Error::IdTokenVerificationFailed(err.to_string())
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    use super::*;

    const ISSUER: &str = "https://id.example.com";
    const CLIENT_ID: &str = "gateway";
    const SIGNING_KEY: &str = include_str!("../../tests/fixtures/idp_rsa.pem");
    const JWKS: &str = include_str!("../../tests/fixtures/jwks.json");

    fn verifier() -> IdTokenVerifier {
        let jwks: JwkSet = serde_json::from_str(JWKS).unwrap();
        IdTokenVerifier::new(jwks, ISSUER, CLIENT_ID)
    }

    fn now() -> i64 {
        time::OffsetDateTime::now_utc().unix_timestamp()
    }

    fn sign(claims: &JsonValue, kid: Option<&str>) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = kid.map(str::to_string);
        let key = EncodingKey::from_rsa_pem(SIGNING_KEY.as_bytes()).unwrap();
        encode(&header, claims, &key).unwrap()
    }

    fn valid_claims() -> JsonValue {
        json!({
            "iss": ISSUER,
            "sub": "user-1",
            "aud": CLIENT_ID,
            "exp": now() + 300,
            "iat": now(),
            "email": "user@example.com"
        })
    }

    #[test]
    fn accepts_well_formed_token() {
        let token = sign(&valid_claims(), Some("test-key-id"));
        let claims = verifier().verify(&token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert!(claims.aud.contains(CLIENT_ID));
        assert_eq!(claims.get_claim("email"), Some(&json!("user@example.com")));
    }

    #[test]
    fn accepts_audience_array() {
        let mut claims = valid_claims();
        claims["aud"] = json!(["other", CLIENT_ID]);
        let token = sign(&claims, Some("test-key-id"));
        assert!(verifier().verify(&token).is_ok());
    }

    #[test]
    fn single_key_set_accepts_missing_kid() {
        let token = sign(&valid_claims(), None);
        assert!(verifier().verify(&token).is_ok());
    }

    #[test]
    fn rejects_unknown_kid() {
        let token = sign(&valid_claims(), Some("rotated-away"));
        let err = verifier().verify(&token).unwrap_err();
        assert!(err.to_string().contains("no signing key"));
    }

    #[test]
    fn rejects_wrong_issuer() {
        let mut claims = valid_claims();
        claims["iss"] = json!("https://evil.example.com");
        let token = sign(&claims, Some("test-key-id"));
        assert!(matches!(
            verifier().verify(&token),
            Err(Error::IdTokenVerificationFailed(_))
        ));
    }

    #[test]
    fn rejects_wrong_audience() {
        let mut claims = valid_claims();
        claims["aud"] = json!("someone-else");
        let token = sign(&claims, Some("test-key-id"));
        assert!(verifier().verify(&token).is_err());
    }

    #[test]
    fn rejects_expired_token() {
        let mut claims = valid_claims();
        claims["exp"] = json!(now() - 3600);
        let token = sign(&claims, Some("test-key-id"));
        assert!(verifier().verify(&token).is_err());
    }

    #[test]
    fn rejects_symmetric_algorithm() {
        let header = Header::new(Algorithm::HS256);
        let token = encode(
            &header,
            &valid_claims(),
            &EncodingKey::from_secret(b"shared-secret"),
        )
        .unwrap();

        let err = verifier().verify(&token).unwrap_err();
        assert!(err.to_string().contains("unsupported algorithm"));
    }

    #[test]
    fn rejects_tampered_payload() {
        let token = sign(&valid_claims(), Some("test-key-id"));
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = sign(
            &json!({ "iss": ISSUER, "sub": "admin", "aud": CLIENT_ID, "exp": now() + 300 }),
            Some("test-key-id"),
        );
        let forged_payload = forged.split('.').nth(1).unwrap();
        parts[1] = forged_payload;

        assert!(verifier().verify(&parts.join(".")).is_err());
    }

    #[test]
    fn rejects_garbage() {
        assert!(verifier().verify("not-a-jwt").is_err());
    }
}
