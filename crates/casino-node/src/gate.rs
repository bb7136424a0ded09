// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CASINO INTEGRATION - SIGNATURE GATE
//
// Every Provider → Casino callback passes here before its body is even
// parsed. The signature is over the exact received bytes. A missing
// server-side secret is a configuration failure (500), not a client one.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use casino_core::CasinoError;

/// Shared secrets, loaded once at boot and passed in explicitly — request
/// handling never reads the environment.
#[derive(Clone)]
pub struct Secrets {
    pub casino_secret: Option<Vec<u8>>,
    pub provider_secret: Option<Vec<u8>>,
}

impl Secrets {
    pub fn new(casino_secret: Option<Vec<u8>>, provider_secret: Option<Vec<u8>>) -> Self {
        Secrets {
            casino_secret,
            provider_secret,
        }
    }

    /// Read CASINO_SECRET / PROVIDER_SECRET. Empty values count as unset.
    pub fn from_env() -> Self {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .filter(|v| !v.is_empty())
                .map(|v| v.into_bytes())
        };
        Secrets {
            casino_secret: read("CASINO_SECRET"),
            provider_secret: read("PROVIDER_SECRET"),
        }
    }
}

/// Verify the `x-provider-signature` header against the raw body under
/// PROVIDER_SECRET. Missing header, bad hex, wrong length, and mismatch
/// all fail identically as SIGNATURE_INVALID.
pub fn verify_provider_request(
    secrets: &Secrets,
    signature: Option<&str>,
    body: &[u8],
) -> Result<(), CasinoError> {
    let secret = secrets
        .provider_secret
        .as_deref()
        .ok_or(CasinoError::SecretNotConfigured)?;
    let signature = signature.ok_or(CasinoError::SignatureInvalid)?;
    if casino_crypto::verify_body(secret, body, signature) {
        Ok(())
    } else {
        Err(CasinoError::SignatureInvalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secrets() -> Secrets {
        Secrets::new(Some(b"casino-secret".to_vec()), Some(b"provider-secret".to_vec()))
    }

    #[test]
    fn test_valid_signature_passes() {
        let body = br#"{"sessionToken":"tok"}"#;
        let sig = casino_crypto::sign_body(b"provider-secret", body);
        assert!(verify_provider_request(&secrets(), Some(&sig), body).is_ok());
    }

    #[test]
    fn test_missing_header_rejected() {
        let result = verify_provider_request(&secrets(), None, b"{}");
        assert!(matches!(result, Err(CasinoError::SignatureInvalid)));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let body = b"{}";
        let sig = casino_crypto::sign_body(b"casino-secret", body);
        let result = verify_provider_request(&secrets(), Some(&sig), body);
        assert!(matches!(result, Err(CasinoError::SignatureInvalid)));
    }

    #[test]
    fn test_missing_secret_is_config_error() {
        let unconfigured = Secrets::new(None, None);
        let result = verify_provider_request(&unconfigured, Some("deadbeef"), b"{}");
        assert!(matches!(result, Err(CasinoError::SecretNotConfigured)));
    }
}
