// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CASINO INTEGRATION - WIRE TYPES
//
// Per-endpoint request and response structs. Everything on the wire is
// camelCase JSON; money amounts are integers in the currency's minor unit.
// Idempotent endpoints are replayed from the stored response_cache, so the
// ledger engines hand handlers a serde_json::Value built from these
// structs — the same Value on first write and on every replay.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Serialize};

use crate::error::CasinoError;

// ── Provider → Casino callback requests ─────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceRequest {
    pub session_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DebitRequest {
    pub session_token: String,
    pub transaction_id: String,
    pub round_id: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditRequest {
    pub session_token: String,
    pub transaction_id: String,
    pub round_id: String,
    pub amount: i64,
    /// The bet this payout settles, when the Provider links them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_transaction_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackRequest {
    pub session_token: String,
    /// The rollback's own idempotency id.
    pub transaction_id: String,
    /// The debit being reversed.
    pub original_transaction_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionRequest {
    pub session_token: String,
}

// ── Casino front-end requests ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchRequest {
    pub user_id: u64,
    pub game_id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

// ── Responses ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub success: bool,
    pub balance: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub success: bool,
    pub transaction_id: String,
    pub balance: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollbackResponse {
    pub success: bool,
    pub transaction_id: String,
    pub rolled_back: bool,
    pub balance: i64,
    pub currency: String,
    pub message: String,
    /// Set when the referenced original was unknown to the ledger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tombstone: Option<bool>,
    /// Set when the referenced original was reversed by an earlier rollback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub already_rolled_back: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LaunchResponse {
    pub success: bool,
    pub session_id: u64,
    pub session_token: String,
    pub balance: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionResponse {
    pub success: bool,
}

/// Uniform error body: `{success: false, error, code}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: String,
}

impl From<&CasinoError> for ErrorResponse {
    fn from(err: &CasinoError) -> Self {
        ErrorResponse {
            success: false,
            error: err.to_string(),
            code: err.code().to_string(),
        }
    }
}

// ── Casino → Provider launch call ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderLaunchRequest {
    pub session_token: String,
    pub user_id: u64,
    /// The provider's own id for the game, not the casino row id.
    pub game_id: String,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderLaunchAck {
    pub success: bool,
    #[serde(default)]
    pub provider_session_id: Option<String>,
}
