// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CASINO INTEGRATION - CORE MODULE
//
// Ledger primitives: users, wallets, sessions, and the append-only
// transaction entry. All financial arithmetic uses i64 minor units
// (e.g. cents) — no floating-point anywhere in the money path.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Serialize};

pub mod api;
pub mod error;

pub use error::CasinoError;

/// Currency used when a launch request doesn't name one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Provider → Casino signature header, over `PROVIDER_SECRET`.
pub const PROVIDER_SIGNATURE_HEADER: &str = "x-provider-signature";

/// Casino → Provider signature header, over `CASINO_SECRET`.
pub const CASINO_SIGNATURE_HEADER: &str = "x-casino-signature";

/// Timeout for outbound Casino → Provider calls.
pub const PROVIDER_CALL_TIMEOUT_SECS: u64 = 10;

/// Unix timestamp in seconds.
pub fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    pub email: String,
    pub created_at: i64,
}

/// The money-bearing record, unique per (user, currency).
///
/// `playable_balance` is the only balance the ledger moves; the
/// `redeemable_balance` sub-balance is carried but never settled against.
/// `entry_count` is the wallet's monotone ledger sequence — it orders the
/// per-wallet transaction log and advances inside the same store
/// transaction as every balance change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wallet {
    pub id: u64,
    pub user_id: u64,
    pub currency: String,
    pub playable_balance: i64,
    pub redeemable_balance: i64,
    pub entry_count: u64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameProvider {
    pub id: u64,
    pub name: String,
    /// Endpoint the casino calls at launch, signed under CASINO_SECRET.
    pub launch_url: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: u64,
    pub provider_id: u64,
    /// The provider's own id for this game (sent on launch).
    pub external_game_id: String,
    pub name: String,
    pub active: bool,
}

/// One launch = one session. Every money-moving callback carries the
/// session's token and may only touch the wallet this session binds to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSession {
    pub id: u64,
    pub user_id: u64,
    pub wallet_id: u64,
    pub game_id: u64,
    /// 32 bytes of CSPRNG entropy, hex-encoded. Opaque to the Provider.
    pub token: String,
    /// Filled after the Provider's launch-ack; the session works without it.
    pub provider_session_id: Option<String>,
    pub active: bool,
    pub created_at: i64,
    pub ended_at: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Debit,
    Credit,
    Rollback,
}

/// Append-only record of one money movement attempt.
///
/// `external_transaction_id` is globally unique — that uniqueness is the
/// sole idempotency key; a second submit with the same id replays
/// `response_cache` verbatim. `is_rollback` is set on rollback entries AND
/// flipped on a debit once it has been reversed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub external_transaction_id: String,
    pub kind: EntryKind,
    /// Non-negative minor units. Zero for tombstones and idempotency
    /// markers; the original debit amount for a successful reversal.
    pub amount: i64,
    pub wallet_id: u64,
    pub session_id: u64,
    pub round_id: Option<String>,
    pub related_external_transaction_id: Option<String>,
    /// Wallet balance the moment this entry committed.
    pub balance_after: i64,
    /// Exact response body returned on first success, replayed on duplicates.
    pub response_cache: serde_json::Value,
    pub is_rollback: bool,
    pub created_at: i64,
}

impl LedgerEntry {
    /// Effect of this entry on its wallet's balance: debit negative,
    /// credit positive, rollback of a debit positive, markers zero.
    pub fn signed_amount(&self) -> i64 {
        match self.kind {
            EntryKind::Debit => -self.amount,
            EntryKind::Credit | EntryKind::Rollback => self.amount,
        }
    }
}

/// Debit amounts must be strictly positive.
pub fn validate_debit_amount(amount: i64) -> Result<(), CasinoError> {
    if amount <= 0 {
        return Err(CasinoError::InvalidAmount(format!(
            "debit amount must be positive, got {}",
            amount
        )));
    }
    Ok(())
}

/// Credit amounts may be zero (a lost round's nominal payout) but not negative.
pub fn validate_credit_amount(amount: i64) -> Result<(), CasinoError> {
    if amount < 0 {
        return Err(CasinoError::InvalidAmount(format!(
            "credit amount must not be negative, got {}",
            amount
        )));
    }
    Ok(())
}
