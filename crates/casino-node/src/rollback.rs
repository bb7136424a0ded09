// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CASINO INTEGRATION - ROLLBACK MODULE
//
// Rollback policy: only bets, never payouts, never twice. Unknown
// originals are recorded as zero-amount tombstones. A successful
// reversal credits the wallet, flags the original debit, and writes the
// reverse link — all in the same store transaction.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use casino_core::api::{RollbackRequest, RollbackResponse};
use casino_core::{unix_now, CasinoError, EntryKind, LedgerEntry, Wallet};
use serde_json::Value;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;
use std::sync::Arc;

use crate::db::{abort, cr_key, dec, enc, log_key, rb_key, CasinoDatabase, TxAbort};
use crate::ledger::{abort_to_error, replay_entry, IdempotentReply, WalletLedger};

pub struct RollbackEngine {
    db: Arc<CasinoDatabase>,
}

fn corrupt(msg: &str) -> ConflictableTransactionError<TxAbort> {
    ConflictableTransactionError::Abort(TxAbort::Corrupt(msg.into()))
}

fn cache_value(resp: &RollbackResponse) -> Result<Value, ConflictableTransactionError<TxAbort>> {
    serde_json::to_value(resp)
        .map_err(|e| ConflictableTransactionError::Abort(TxAbort::Corrupt(format!("serialize: {}", e))))
}

impl RollbackEngine {
    pub fn new(db: Arc<CasinoDatabase>) -> Self {
        RollbackEngine { db }
    }

    pub fn rollback(&self, req: &RollbackRequest) -> Result<IdempotentReply, CasinoError> {
        // Self-idempotency: this rollback already committed once.
        if let Some(prior) = self.db.get_entry(&req.transaction_id)? {
            return Ok((prior.response_cache, true));
        }
        let ledger = WalletLedger::new(self.db.clone());
        let session = ledger.resolve_active_session(&req.session_token)?;

        let wallets = self.db.wallets_tree()?;
        let transactions = self.db.transactions_tree()?;
        let tx_index = self.db.tx_index_tree()?;
        let created_at = unix_now();

        let result = (&wallets, &transactions, &tx_index).transaction(|(w, t, x)| {
            if t.get(req.transaction_id.as_bytes())?.is_some() {
                return abort(TxAbort::Duplicate);
            }
            let raw = w
                .get(&session.wallet_id.to_be_bytes()[..])?
                .ok_or_else(|| corrupt("session references missing wallet"))?;
            let mut wallet: Wallet = dec(&raw)?;

            let original = match t.get(req.original_transaction_id.as_bytes())? {
                Some(bytes) => Some(dec::<LedgerEntry>(&bytes)?),
                None => None,
            };

            let original = match original {
                None => {
                    // Tombstone: record receipt of a rollback for a bet the
                    // ledger has never seen. No lock path, no balance change.
                    // The reverse link claims the unknown id, so a later
                    // rollback of it answers "already rolled back" even if
                    // the actual debit eventually lands.
                    let resp = RollbackResponse {
                        success: true,
                        transaction_id: req.transaction_id.clone(),
                        rolled_back: true,
                        balance: wallet.playable_balance,
                        currency: wallet.currency.clone(),
                        message: "tombstone".into(),
                        tombstone: Some(true),
                        already_rolled_back: None,
                    };
                    let cache = cache_value(&resp)?;
                    let entry = LedgerEntry {
                        external_transaction_id: req.transaction_id.clone(),
                        kind: EntryKind::Rollback,
                        amount: 0,
                        wallet_id: wallet.id,
                        session_id: session.id,
                        round_id: None,
                        related_external_transaction_id: Some(
                            req.original_transaction_id.clone(),
                        ),
                        balance_after: wallet.playable_balance,
                        response_cache: cache.clone(),
                        is_rollback: true,
                        created_at,
                    };
                    let seq = wallet.entry_count;
                    wallet.entry_count += 1;
                    t.insert(req.transaction_id.as_bytes(), enc(&entry)?)?;
                    x.insert(log_key(wallet.id, seq), req.transaction_id.as_bytes())?;
                    x.insert(
                        rb_key(&req.original_transaction_id),
                        req.transaction_id.as_bytes(),
                    )?;
                    w.insert(wallet.id.to_be_bytes().to_vec(), enc(&wallet)?)?;
                    return Ok(cache);
                }
                Some(entry) => entry,
            };

            if original.kind == EntryKind::Rollback {
                // Nothing recorded: repeating this call recomputes the
                // same answer, so it stays idempotent without an entry.
                let resp = RollbackResponse {
                    success: true,
                    transaction_id: req.transaction_id.clone(),
                    rolled_back: false,
                    balance: wallet.playable_balance,
                    currency: wallet.currency.clone(),
                    message: "cannot rollback a rollback".into(),
                    tombstone: None,
                    already_rolled_back: None,
                };
                return Ok(cache_value(&resp)?);
            }

            if original.kind == EntryKind::Credit {
                return abort(TxAbort::PayoutRollback);
            }

            // Original is a debit from here on.
            if x.get(rb_key(&original.external_transaction_id))?.is_some() {
                // Already reversed: record an idempotency marker so THIS
                // rollback id replays consistently, but move no money.
                let resp = RollbackResponse {
                    success: true,
                    transaction_id: req.transaction_id.clone(),
                    rolled_back: true,
                    balance: wallet.playable_balance,
                    currency: wallet.currency.clone(),
                    message: "already rolled back".into(),
                    tombstone: None,
                    already_rolled_back: Some(true),
                };
                let cache = cache_value(&resp)?;
                let entry = LedgerEntry {
                    external_transaction_id: req.transaction_id.clone(),
                    kind: EntryKind::Rollback,
                    amount: 0,
                    wallet_id: wallet.id,
                    session_id: session.id,
                    round_id: None,
                    related_external_transaction_id: Some(
                        original.external_transaction_id.clone(),
                    ),
                    balance_after: wallet.playable_balance,
                    response_cache: cache.clone(),
                    is_rollback: true,
                    created_at,
                };
                let seq = wallet.entry_count;
                wallet.entry_count += 1;
                t.insert(req.transaction_id.as_bytes(), enc(&entry)?)?;
                x.insert(log_key(wallet.id, seq), req.transaction_id.as_bytes())?;
                w.insert(wallet.id.to_be_bytes().to_vec(), enc(&wallet)?)?;
                return Ok(cache);
            }

            if x.get(cr_key(&original.external_transaction_id))?.is_some() {
                // A payout has been recorded against this bet. The round
                // is settled, so the bet is no longer reversible.
                return abort(TxAbort::PayoutRollback);
            }

            // Nominal reversal: credit the bet back, flag the original,
            // append the rollback entry and the reverse link. One commit.
            let new_balance = match wallet.playable_balance.checked_add(original.amount) {
                Some(balance) => balance,
                None => return abort(TxAbort::Overflow),
            };
            wallet.playable_balance = new_balance;
            let seq = wallet.entry_count;
            wallet.entry_count += 1;

            let mut reversed = original.clone();
            reversed.is_rollback = true;
            t.insert(reversed.external_transaction_id.as_bytes(), enc(&reversed)?)?;

            let resp = RollbackResponse {
                success: true,
                transaction_id: req.transaction_id.clone(),
                rolled_back: true,
                balance: new_balance,
                currency: wallet.currency.clone(),
                message: "rolled back".into(),
                tombstone: None,
                already_rolled_back: None,
            };
            let cache = cache_value(&resp)?;
            let entry = LedgerEntry {
                external_transaction_id: req.transaction_id.clone(),
                kind: EntryKind::Rollback,
                amount: original.amount,
                wallet_id: wallet.id,
                session_id: session.id,
                round_id: original.round_id.clone(),
                related_external_transaction_id: Some(original.external_transaction_id.clone()),
                balance_after: new_balance,
                response_cache: cache.clone(),
                is_rollback: true,
                created_at,
            };
            t.insert(req.transaction_id.as_bytes(), enc(&entry)?)?;
            x.insert(log_key(wallet.id, seq), req.transaction_id.as_bytes())?;
            x.insert(
                rb_key(&original.external_transaction_id),
                req.transaction_id.as_bytes(),
            )?;
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
            Err(TransactionError::Abort(TxAbort::PayoutRollback)) => {
                Err(CasinoError::CannotRollbackPayout)
            }
            Err(TransactionError::Abort(TxAbort::Overflow)) => Err(CasinoError::Internal(
                "rollback would overflow the wallet balance".into(),
            )),
            Err(TransactionError::Abort(other)) => Err(abort_to_error(other)),
            Err(TransactionError::Storage(e)) => Err(CasinoError::Storage(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::funded_setup;
    use casino_core::api::{CreditRequest, DebitRequest};

    fn debit(ledger: &WalletLedger, token: &str, id: &str, amount: i64) {
        ledger
            .debit(&DebitRequest {
                session_token: token.into(),
                transaction_id: id.into(),
                round_id: "r1".into(),
                amount,
            })
            .unwrap();
    }

    fn rollback_req(token: &str, own: &str, original: &str) -> RollbackRequest {
        RollbackRequest {
            session_token: token.into(),
            transaction_id: own.into(),
            original_transaction_id: original.into(),
            reason: None,
        }
    }

    #[test]
    fn test_rollback_cancels_debit() {
        let (_dir, db, session) = funded_setup(10_000);
        let ledger = WalletLedger::new(db.clone());
        let engine = RollbackEngine::new(db.clone());
        debit(&ledger, &session.token, "t1", 2_000);

        let (body, duplicate) = engine
            .rollback(&rollback_req(&session.token, "r1", "t1"))
            .unwrap();
        assert!(!duplicate);
        assert_eq!(body["rolledBack"], true);
        assert_eq!(body["balance"], 10_000);

        let wallet = db.get_wallet(session.wallet_id).unwrap().unwrap();
        assert_eq!(wallet.playable_balance, 10_000);

        let original = db.get_entry("t1").unwrap().unwrap();
        assert!(original.is_rollback);
        assert_eq!(db.rollback_of("t1").unwrap().as_deref(), Some("r1"));

        let entry = db.get_entry("r1").unwrap().unwrap();
        assert_eq!(entry.kind, EntryKind::Rollback);
        assert_eq!(entry.amount, 2_000);
        assert_eq!(entry.related_external_transaction_id.as_deref(), Some("t1"));
    }

    #[test]
    fn test_rollback_self_idempotent() {
        let (_dir, db, session) = funded_setup(10_000);
        let ledger = WalletLedger::new(db.clone());
        let engine = RollbackEngine::new(db.clone());
        debit(&ledger, &session.token, "t1", 2_000);

        let req = rollback_req(&session.token, "r1", "t1");
        let (first, dup1) = engine.rollback(&req).unwrap();
        let (second, dup2) = engine.rollback(&req).unwrap();
        assert!(!dup1);
        assert!(dup2);
        assert_eq!(
            serde_json::to_vec(&first).unwrap(),
            serde_json::to_vec(&second).unwrap()
        );
        // One balance change, two entries (debit + rollback)
        let wallet = db.get_wallet(session.wallet_id).unwrap().unwrap();
        assert_eq!(wallet.playable_balance, 10_000);
        assert_eq!(db.wallet_entries(wallet.id).unwrap().len(), 2);
    }

    #[test]
    fn test_second_rollback_records_marker() {
        let (_dir, db, session) = funded_setup(10_000);
        let ledger = WalletLedger::new(db.clone());
        let engine = RollbackEngine::new(db.clone());
        debit(&ledger, &session.token, "t1", 2_000);

        engine
            .rollback(&rollback_req(&session.token, "r1", "t1"))
            .unwrap();
        let (body, duplicate) = engine
            .rollback(&rollback_req(&session.token, "r2", "t1"))
            .unwrap();
        assert!(!duplicate);
        assert_eq!(body["rolledBack"], true);
        assert_eq!(body["message"], "already rolled back");
        assert_eq!(body["alreadyRolledBack"], true);
        assert_eq!(body["balance"], 10_000);

        let marker = db.get_entry("r2").unwrap().unwrap();
        assert_eq!(marker.amount, 0);
        assert!(marker.is_rollback);
        // The reverse link still names the one true reversal
        assert_eq!(db.rollback_of("t1").unwrap().as_deref(), Some("r1"));
    }

    #[test]
    fn test_tombstone_for_unknown_original() {
        let (_dir, db, session) = funded_setup(10_000);
        let engine = RollbackEngine::new(db.clone());

        let (body, duplicate) = engine
            .rollback(&rollback_req(&session.token, "r9", "ghost"))
            .unwrap();
        assert!(!duplicate);
        assert_eq!(body["rolledBack"], true);
        assert_eq!(body["message"], "tombstone");
        assert_eq!(body["tombstone"], true);
        assert_eq!(body["balance"], 10_000);

        let entry = db.get_entry("r9").unwrap().unwrap();
        assert_eq!(entry.amount, 0);
        assert!(entry.is_rollback);
        assert_eq!(entry.balance_after, 10_000);
        assert_eq!(entry.response_cache["tombstone"], true);
        assert_eq!(
            entry.related_external_transaction_id.as_deref(),
            Some("ghost")
        );
        let wallet = db.get_wallet(session.wallet_id).unwrap().unwrap();
        assert_eq!(wallet.playable_balance, 10_000);
        assert_eq!(db.wallet_entries(wallet.id).unwrap().len(), 1);
    }

    #[test]
    fn test_tombstone_claims_the_unknown_id() {
        // A rollback of an id that was tombstoned earlier answers
        // "already rolled back" — even once the actual debit lands later,
        // its reversal stays claimed and no money moves.
        let (_dir, db, session) = funded_setup(10_000);
        let ledger = WalletLedger::new(db.clone());
        let engine = RollbackEngine::new(db.clone());

        engine
            .rollback(&rollback_req(&session.token, "r9", "ghost"))
            .unwrap();
        debit(&ledger, &session.token, "ghost", 1_000);
        let (body, _) = engine
            .rollback(&rollback_req(&session.token, "r10", "ghost"))
            .unwrap();
        assert_eq!(body["message"], "already rolled back");
        let wallet = db.get_wallet(session.wallet_id).unwrap().unwrap();
        assert_eq!(wallet.playable_balance, 9_000);
    }

    #[test]
    fn test_cannot_rollback_a_rollback() {
        let (_dir, db, session) = funded_setup(10_000);
        let ledger = WalletLedger::new(db.clone());
        let engine = RollbackEngine::new(db.clone());
        debit(&ledger, &session.token, "t1", 2_000);
        engine
            .rollback(&rollback_req(&session.token, "r1", "t1"))
            .unwrap();

        let before = db.wallet_entries(session.wallet_id).unwrap().len();
        let (body, duplicate) = engine
            .rollback(&rollback_req(&session.token, "r2", "r1"))
            .unwrap();
        assert!(!duplicate);
        assert_eq!(body["rolledBack"], false);
        assert_eq!(body["message"], "cannot rollback a rollback");
        // Nothing recorded
        assert!(db.get_entry("r2").unwrap().is_none());
        assert_eq!(db.wallet_entries(session.wallet_id).unwrap().len(), before);
    }

    #[test]
    fn test_payout_rollback_rejected() {
        let (_dir, db, session) = funded_setup(10_000);
        let ledger = WalletLedger::new(db.clone());
        let engine = RollbackEngine::new(db.clone());
        debit(&ledger, &session.token, "t1", 1_000);
        ledger
            .credit(&CreditRequest {
                session_token: session.token.clone(),
                transaction_id: "c1".into(),
                round_id: "r1".into(),
                amount: 2_500,
                related_transaction_id: Some("t1".into()),
            })
            .unwrap();

        let result = engine.rollback(&rollback_req(&session.token, "r1", "c1"));
        assert!(matches!(result, Err(CasinoError::CannotRollbackPayout)));
        assert!(db.get_entry("r1").unwrap().is_none());
        let wallet = db.get_wallet(session.wallet_id).unwrap().unwrap();
        assert_eq!(wallet.playable_balance, 11_500);
    }

    #[test]
    fn test_paid_out_bet_not_reversible() {
        // Strict reading: once a credit references the bet, the round is
        // settled and the bet itself can no longer be rolled back.
        let (_dir, db, session) = funded_setup(10_000);
        let ledger = WalletLedger::new(db.clone());
        let engine = RollbackEngine::new(db.clone());
        debit(&ledger, &session.token, "t1", 1_000);
        ledger
            .credit(&CreditRequest {
                session_token: session.token.clone(),
                transaction_id: "c1".into(),
                round_id: "r1".into(),
                amount: 1_500,
                related_transaction_id: Some("t1".into()),
            })
            .unwrap();

        let result = engine.rollback(&rollback_req(&session.token, "rb1", "t1"));
        assert!(matches!(result, Err(CasinoError::CannotRollbackPayout)));
        assert!(!db.get_entry("t1").unwrap().unwrap().is_rollback);
        let wallet = db.get_wallet(session.wallet_id).unwrap().unwrap();
        assert_eq!(wallet.playable_balance, 10_500);
    }

    #[test]
    fn test_balance_after_chain_consistent() {
        // Scenario: two bets, one payout on the second, rollback the first.
        let (_dir, db, session) = funded_setup(10_000);
        let ledger = WalletLedger::new(db.clone());
        let engine = RollbackEngine::new(db.clone());
        debit(&ledger, &session.token, "t1", 2_000);
        debit(&ledger, &session.token, "t2", 1_000);
        ledger
            .credit(&CreditRequest {
                session_token: session.token.clone(),
                transaction_id: "c1".into(),
                round_id: "r1".into(),
                amount: 3_000,
                related_transaction_id: Some("t2".into()),
            })
            .unwrap();
        engine
            .rollback(&rollback_req(&session.token, "rb1", "t1"))
            .unwrap();

        let entries = db.wallet_entries(session.wallet_id).unwrap();
        assert_eq!(entries.len(), 4);
        let mut balance = 10_000;
        for entry in &entries {
            balance += entry.signed_amount();
            assert_eq!(entry.balance_after, balance);
        }
        assert_eq!(balance, 12_000);
    }
}
