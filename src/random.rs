use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng;

/// Generates a cryptographically random opaque identifier.
///
/// 16 random bytes (128 bits) from the thread-local CSPRNG, encoded as a
/// 22-character URL-safe string. Used for both state values and session ids.
#[must_use]
pub fn generate_identifier() -> String {
    let random_bytes: [u8; 16] = rand::rng().random();
    URL_SAFE_NO_PAD.encode(random_bytes)
}
