// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CASINO INTEGRATION - CRYPTO MODULE
//
// Shared-secret message authentication between Casino and Game Provider.
// HMAC-SHA256 over the exact request body bytes, hex-encoded lowercase.
// Also owns the CSPRNG entropy for opaque session tokens.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Session tokens carry 256 bits of OS entropy.
pub const SESSION_TOKEN_BYTES: usize = 32;

/// Sign a request body under a shared secret.
///
/// The signature is computed over the exact byte sequence the caller sends
/// on the wire — both sides must agree on those bytes, so callers sign the
/// serialized body, not a re-serialization of it.
pub fn sign_body(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a hex-encoded signature against a request body.
///
/// Comparison is constant-time (`Mac::verify_slice`). Any malformed input
/// (non-hex, wrong length) fails verification rather than erroring.
pub fn verify_body(secret: &[u8], body: &[u8], signature_hex: &str) -> bool {
    let sig_bytes = match hex::decode(signature_hex) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(body);
    mac.verify_slice(&sig_bytes).is_ok()
}

/// Generate an opaque session token: 32 random bytes, hex-encoded (64 chars).
/// Uses the OS CSPRNG. Uniqueness is enforced by the session store's token
/// index, not by this function.
pub fn generate_session_token() -> String {
    let mut buf = [0u8; SESSION_TOKEN_BYTES];
    rand::rngs::OsRng.fill_bytes(&mut buf);
    hex::encode(buf)
}
