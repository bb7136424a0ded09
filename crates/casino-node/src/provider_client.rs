// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CASINO INTEGRATION - PROVIDER CLIENT
//
// Outbound Casino → Provider calls. The launch body is signed under
// CASINO_SECRET over the exact bytes sent; the call has a bounded
// timeout and its failure never invalidates the session.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use casino_core::api::{ProviderLaunchAck, ProviderLaunchRequest};
use casino_core::{CasinoError, CASINO_SIGNATURE_HEADER, PROVIDER_CALL_TIMEOUT_SECS};
use std::time::Duration;

pub struct ProviderClient {
    http: reqwest::Client,
    casino_secret: Option<Vec<u8>>,
}

impl ProviderClient {
    pub fn new(casino_secret: Option<Vec<u8>>) -> Result<Self, CasinoError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(PROVIDER_CALL_TIMEOUT_SECS))
            .build()
            .map_err(|e| CasinoError::Internal(format!("failed to build http client: {}", e)))?;
        Ok(ProviderClient { http, casino_secret })
    }

    /// Ask the Provider to open its side of the session. Timeouts and
    /// non-2xx answers surface as CASINO_API_ERROR; the caller decides
    /// whether that is fatal (for launch it is not).
    pub async fn launch(
        &self,
        launch_url: &str,
        request: &ProviderLaunchRequest,
    ) -> Result<ProviderLaunchAck, CasinoError> {
        let secret = self
            .casino_secret
            .as_deref()
            .ok_or(CasinoError::SecretNotConfigured)?;
        let body = serde_json::to_vec(request)
            .map_err(|e| CasinoError::Internal(format!("serialize launch body: {}", e)))?;
        let signature = casino_crypto::sign_body(secret, &body);

        let response = self
            .http
            .post(launch_url)
            .header(CASINO_SIGNATURE_HEADER, signature)
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| CasinoError::ProviderApi(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CasinoError::ProviderApi(format!(
                "provider launch returned {}",
                status
            )));
        }
        response
            .json::<ProviderLaunchAck>()
            .await
            .map_err(|e| CasinoError::ProviderApi(format!("malformed launch ack: {}", e)))
    }
}
