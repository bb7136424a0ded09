// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CASINO INTEGRATION - ERROR MODULE
//
// Every error surfaced to a caller maps to a stable string code and an
// HTTP status. Policy errors go out verbatim so the Provider can decide
// whether to retry; everything unexpected collapses to INTERNAL_ERROR.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CasinoError {
    /// Signature header missing, malformed, or not matching the body.
    #[error("invalid request signature")]
    SignatureInvalid,

    /// Session token unknown, or the session has been ended.
    #[error("session token is unknown or the session has ended")]
    InvalidSession,

    /// Request body failed structural validation before delegation.
    #[error("{0}")]
    InvalidRequest(String),

    /// Amount violates the endpoint's rules (debit ≤ 0, credit < 0, overflow).
    #[error("{0}")]
    InvalidAmount(String),

    /// Debit would drive playable_balance negative.
    #[error("insufficient playable balance")]
    InsufficientFunds,

    /// Rollback policy: payouts are never reversed.
    #[error("payouts cannot be rolled back")]
    CannotRollbackPayout,

    #[error("user not found")]
    UserNotFound,

    #[error("game not found or inactive")]
    GameNotFound,

    #[error("game provider not found or disabled")]
    ProviderNotFound,

    /// Outbound call to the Provider failed or timed out.
    #[error("provider call failed: {0}")]
    ProviderApi(String),

    /// Server-side shared secret missing from configuration.
    #[error("signing secret is not configured")]
    SecretNotConfigured,

    #[error("storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Internal(String),
}

impl CasinoError {
    /// Stable machine-readable code included in every error response body.
    pub fn code(&self) -> &'static str {
        match self {
            CasinoError::SignatureInvalid => "SIGNATURE_INVALID",
            CasinoError::InvalidSession => "INVALID_SESSION",
            CasinoError::InvalidRequest(_) => "INVALID_REQUEST",
            CasinoError::InvalidAmount(_) => "INVALID_AMOUNT",
            CasinoError::InsufficientFunds => "INSUFFICIENT_FUNDS",
            CasinoError::CannotRollbackPayout => "CANNOT_ROLLBACK_PAYOUT",
            CasinoError::UserNotFound => "USER_NOT_FOUND",
            CasinoError::GameNotFound => "GAME_NOT_FOUND",
            CasinoError::ProviderNotFound => "PROVIDER_NOT_FOUND",
            CasinoError::ProviderApi(_) => "CASINO_API_ERROR",
            CasinoError::SecretNotConfigured
            | CasinoError::Storage(_)
            | CasinoError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status the handler replies with for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            CasinoError::SignatureInvalid | CasinoError::InvalidSession => 401,
            CasinoError::InvalidRequest(_)
            | CasinoError::InvalidAmount(_)
            | CasinoError::InsufficientFunds
            | CasinoError::CannotRollbackPayout => 400,
            CasinoError::UserNotFound
            | CasinoError::GameNotFound
            | CasinoError::ProviderNotFound => 404,
            CasinoError::ProviderApi(_) => 502,
            CasinoError::SecretNotConfigured
            | CasinoError::Storage(_)
            | CasinoError::Internal(_) => 500,
        }
    }
}
