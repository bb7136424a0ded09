// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CASINO INTEGRATION - LEDGER MODULE
//
// Idempotent debit/credit engine. Every money movement is one store
// transaction: re-check the external id, read the wallet, move the
// balance, append the ledger entry and its per-wallet log key, commit.
// The duplicate pre-check outside the transaction is an optimization
// only — the in-transaction check is the unique index, and the loser of
// an id race replays the winner's cached response.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use casino_core::api::{BalanceRequest, BalanceResponse, CreditRequest, DebitRequest, TransactionResponse};
use casino_core::{
    unix_now, validate_credit_amount, validate_debit_amount, CasinoError, EntryKind, GameSession,
    LedgerEntry, Wallet,
};
use serde_json::Value;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use std::sync::Arc;

use crate::db::{abort, cr_key, dec, enc, log_key, CasinoDatabase, TxAbort};

/// Outcome of an idempotent operation: the response body to send, and
/// whether it was replayed from an earlier commit.
pub type IdempotentReply = (Value, bool);

pub struct WalletLedger {
    db: Arc<CasinoDatabase>,
}

impl WalletLedger {
    pub fn new(db: Arc<CasinoDatabase>) -> Self {
        WalletLedger { db }
    }

    /// Token → active session, INVALID_SESSION otherwise.
    pub(crate) fn resolve_active_session(&self, token: &str) -> Result<GameSession, CasinoError> {
        self.db
            .get_session_by_token(token)?
            .filter(|s| s.active)
            .ok_or(CasinoError::InvalidSession)
    }

    /// Read the wallet bound to the session's token. No lock, no mutation,
    /// and no idempotency record — balance reads are not transactions.
    pub fn balance(&self, req: &BalanceRequest) -> Result<BalanceResponse, CasinoError> {
        let session = self.resolve_active_session(&req.session_token)?;
        let wallet = self
            .db
            .get_wallet(session.wallet_id)?
            .ok_or_else(|| CasinoError::Storage("session references missing wallet".into()))?;
        Ok(BalanceResponse {
            success: true,
            balance: wallet.playable_balance,
            currency: wallet.currency,
        })
    }

    pub fn debit(&self, req: &DebitRequest) -> Result<IdempotentReply, CasinoError> {
        // Duplicate fast path: no wallet read, no lock, any kind.
        if let Some(prior) = self.db.get_entry(&req.transaction_id)? {
            return Ok((prior.response_cache, true));
        }
        let session = self.resolve_active_session(&req.session_token)?;
        validate_debit_amount(req.amount)?;

        let wallets = self.db.wallets_tree()?;
        let transactions = self.db.transactions_tree()?;
        let tx_index = self.db.tx_index_tree()?;
        let created_at = unix_now();

        let result = (&wallets, &transactions, &tx_index).transaction(|(w, t, x)| {
            if t.get(req.transaction_id.as_bytes())?.is_some() {
                return abort(TxAbort::Duplicate);
            }
            let raw = w.get(&session.wallet_id.to_be_bytes()[..])?.ok_or_else(|| {
                ConflictableTransactionError::Abort(TxAbort::Corrupt(
                    "session references missing wallet".into(),
                ))
            })?;
            let mut wallet: Wallet = dec(&raw)?;
            if wallet.playable_balance < req.amount {
                return abort(TxAbort::InsufficientFunds);
            }
            wallet.playable_balance -= req.amount;
            let seq = wallet.entry_count;
            wallet.entry_count += 1;

            let response = TransactionResponse {
                success: true,
                transaction_id: req.transaction_id.clone(),
                balance: wallet.playable_balance,
                currency: wallet.currency.clone(),
            };
            let cache = serde_json::to_value(&response).map_err(|e| {
                ConflictableTransactionError::Abort(TxAbort::Corrupt(format!("serialize: {}", e)))
            })?;
            let entry = LedgerEntry {
                external_transaction_id: req.transaction_id.clone(),
                kind: EntryKind::Debit,
                amount: req.amount,
                wallet_id: wallet.id,
                session_id: session.id,
                round_id: Some(req.round_id.clone()),
                related_external_transaction_id: None,
                balance_after: wallet.playable_balance,
                response_cache: cache.clone(),
                is_rollback: false,
                created_at,
            };
            t.insert(req.transaction_id.as_bytes(), enc(&entry)?)?;
            x.insert(log_key(wallet.id, seq), req.transaction_id.as_bytes())?;
            w.insert(wallet.id.to_be_bytes().to_vec(), enc(&wallet)?)?;
            Ok(cache)
        });

        match result {
            Ok(cache) => {
                self.db.flush()?;
                Ok((cache, false))
            }
            Err(TransactionError::Abort(TxAbort::Duplicate)) => {
                replay_entry(&self.db, &req.transaction_id)
            }
            Err(TransactionError::Abort(TxAbort::InsufficientFunds)) => {
                Err(CasinoError::InsufficientFunds)
            }
            Err(TransactionError::Abort(other)) => Err(abort_to_error(other)),
            Err(TransactionError::Storage(e)) => Err(CasinoError::Storage(e.to_string())),
        }
    }

    pub fn credit(&self, req: &CreditRequest) -> Result<IdempotentReply, CasinoError> {
        if let Some(prior) = self.db.get_entry(&req.transaction_id)? {
            return Ok((prior.response_cache, true));
        }
        let session = self.resolve_active_session(&req.session_token)?;
        // amount == 0 is a real entry: a lost round's nominal payout.
        validate_credit_amount(req.amount)?;

        let wallets = self.db.wallets_tree()?;
        let transactions = self.db.transactions_tree()?;
        let tx_index = self.db.tx_index_tree()?;
        let created_at = unix_now();

        let result = (&wallets, &transactions, &tx_index).transaction(|(w, t, x)| {
            if t.get(req.transaction_id.as_bytes())?.is_some() {
                return abort(TxAbort::Duplicate);
            }
            let raw = w.get(&session.wallet_id.to_be_bytes()[..])?.ok_or_else(|| {
                ConflictableTransactionError::Abort(TxAbort::Corrupt(
                    "session references missing wallet".into(),
                ))
            })?;
            let mut wallet: Wallet = dec(&raw)?;
            wallet.playable_balance = match wallet.playable_balance.checked_add(req.amount) {
                Some(balance) => balance,
                None => return abort(TxAbort::Overflow),
            };
            let seq = wallet.entry_count;
            wallet.entry_count += 1;

            let response = TransactionResponse {
                success: true,
                transaction_id: req.transaction_id.clone(),
                balance: wallet.playable_balance,
                currency: wallet.currency.clone(),
            };
            let cache = serde_json::to_value(&response).map_err(|e| {
                ConflictableTransactionError::Abort(TxAbort::Corrupt(format!("serialize: {}", e)))
            })?;
            let entry = LedgerEntry {
                external_transaction_id: req.transaction_id.clone(),
                kind: EntryKind::Credit,
                amount: req.amount,
                wallet_id: wallet.id,
                session_id: session.id,
                round_id: Some(req.round_id.clone()),
                related_external_transaction_id: req.related_transaction_id.clone(),
                balance_after: wallet.playable_balance,
                response_cache: cache.clone(),
                is_rollback: false,
                created_at,
            };
            t.insert(req.transaction_id.as_bytes(), enc(&entry)?)?;
            x.insert(log_key(wallet.id, seq), req.transaction_id.as_bytes())?;
            // Payout reverse link: once a bet has a credit against it, the
            // rollback engine refuses to reverse that bet.
            if let Some(related) = &req.related_transaction_id {
                x.insert(cr_key(related), req.transaction_id.as_bytes())?;
            }
            w.insert(wallet.id.to_be_bytes().to_vec(), enc(&wallet)?)?;
            Ok(cache)
        });

        match result {
            Ok(cache) => {
                self.db.flush()?;
                Ok((cache, false))
            }
            Err(TransactionError::Abort(TxAbort::Duplicate)) => {
                replay_entry(&self.db, &req.transaction_id)
            }
            Err(TransactionError::Abort(TxAbort::Overflow)) => Err(CasinoError::InvalidAmount(
                "credit would overflow the wallet balance".into(),
            )),
            Err(TransactionError::Abort(other)) => Err(abort_to_error(other)),
            Err(TransactionError::Storage(e)) => Err(CasinoError::Storage(e.to_string())),
        }
    }
}

/// Lost the unique-id race: re-read the winning entry and return its
/// cached response as a normal duplicate.
pub(crate) fn replay_entry(
    db: &CasinoDatabase,
    external_id: &str,
) -> Result<IdempotentReply, CasinoError> {
    let winner = db.get_entry(external_id)?.ok_or_else(|| {
        CasinoError::Internal(format!(
            "duplicate abort for {} but no winning entry found",
            external_id
        ))
    })?;
    Ok((winner.response_cache, true))
}

pub(crate) fn abort_to_error(reason: TxAbort) -> CasinoError {
    match reason {
        TxAbort::Corrupt(msg) => CasinoError::Storage(msg),
        other => CasinoError::Internal(format!("unexpected abort: {:?}", other)),
    }
}
