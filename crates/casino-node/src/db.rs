// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CASINO INTEGRATION - DATABASE MODULE
//
// sled embedded database for the wallet ledger. Cross-tree transactions
// carry the row-lock + unique-index contract: the transaction closure
// re-runs on write conflict, so balance mutations on one wallet are
// linearized, and an insert-if-absent check inside the closure IS the
// unique constraint on external_transaction_id.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use casino_core::{unix_now, CasinoError, Game, GameProvider, GameSession, LedgerEntry, User, Wallet};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, IVec, Transactional, Tree};
use std::path::Path;

const DB_PATH: &str = "casino_database";
const TREE_USERS: &str = "users";
const TREE_USER_INDEX: &str = "user_index";
const TREE_WALLETS: &str = "wallets";
const TREE_WALLET_INDEX: &str = "wallet_index";
const TREE_PROVIDERS: &str = "providers";
const TREE_GAMES: &str = "games";
const TREE_SESSIONS: &str = "sessions";
const TREE_SESSION_TOKENS: &str = "session_tokens";
const TREE_TRANSACTIONS: &str = "transactions";
const TREE_TX_INDEX: &str = "tx_index";

/// Abort reasons raised inside store transactions. The engines translate
/// these into caller-facing errors or into the duplicate-replay path.
#[derive(Debug)]
pub(crate) enum TxAbort {
    /// external_transaction_id already present — unique-index violation.
    Duplicate,
    InsufficientFunds,
    /// Balance arithmetic would leave the i64 range.
    Overflow,
    /// Rollback policy: the original is a payout, or has one recorded.
    PayoutRollback,
    /// Freshly generated session token collided with an existing one.
    TokenTaken,
    /// Unique user index (username/email) already occupied.
    IndexTaken(String),
    /// A stored record failed to (de)serialize.
    Corrupt(String),
}

pub(crate) fn abort<T>(reason: TxAbort) -> Result<T, ConflictableTransactionError<TxAbort>> {
    Err(ConflictableTransactionError::Abort(reason))
}

pub(crate) fn enc<T: Serialize>(value: &T) -> Result<Vec<u8>, ConflictableTransactionError<TxAbort>> {
    serde_json::to_vec(value)
        .map_err(|e| ConflictableTransactionError::Abort(TxAbort::Corrupt(format!("serialize: {}", e))))
}

pub(crate) fn dec<T: DeserializeOwned>(bytes: &IVec) -> Result<T, ConflictableTransactionError<TxAbort>> {
    serde_json::from_slice(bytes)
        .map_err(|e| ConflictableTransactionError::Abort(TxAbort::Corrupt(format!("corrupt record: {}", e))))
}

pub(crate) fn tx_u64(bytes: &IVec) -> Result<u64, ConflictableTransactionError<TxAbort>> {
    let raw: [u8; 8] = bytes
        .as_ref()
        .try_into()
        .map_err(|_| ConflictableTransactionError::Abort(TxAbort::Corrupt("malformed id bytes".into())))?;
    Ok(u64::from_be_bytes(raw))
}

/// Per-wallet insertion-order log key: `log:{wallet_id}{seq}`, both
/// big-endian so lexicographic scan order is ledger-insert order.
pub(crate) fn log_key(wallet_id: u64, seq: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + 8 + 8);
    key.extend_from_slice(b"log:");
    key.extend_from_slice(&wallet_id.to_be_bytes());
    key.extend_from_slice(&seq.to_be_bytes());
    key
}

pub(crate) fn log_prefix(wallet_id: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + 8);
    key.extend_from_slice(b"log:");
    key.extend_from_slice(&wallet_id.to_be_bytes());
    key
}

/// Reverse link: original debit id → the rollback entry that reversed it.
pub(crate) fn rb_key(original_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(3 + original_id.len());
    key.extend_from_slice(b"rb:");
    key.extend_from_slice(original_id.as_bytes());
    key
}

/// Reverse link: original debit id → a credit that paid out against it.
pub(crate) fn cr_key(original_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(3 + original_id.len());
    key.extend_from_slice(b"cr:");
    key.extend_from_slice(original_id.as_bytes());
    key
}

fn wallet_index_key(user_id: u64, currency: &str) -> String {
    format!("{}:{}", user_id, currency)
}

fn storage_err(context: &str, e: impl std::fmt::Display) -> CasinoError {
    CasinoError::Storage(format!("{}: {}", context, e))
}

fn decode<T: DeserializeOwned>(bytes: &IVec) -> Result<T, CasinoError> {
    serde_json::from_slice(bytes).map_err(|e| storage_err("corrupt record", e))
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CasinoError> {
    serde_json::to_vec(value).map_err(|e| storage_err("serialize", e))
}

fn ivec_u64(bytes: &IVec) -> Result<u64, CasinoError> {
    let raw: [u8; 8] = bytes
        .as_ref()
        .try_into()
        .map_err(|_| CasinoError::Storage("malformed id bytes".into()))?;
    Ok(u64::from_be_bytes(raw))
}

/// Database wrapper. The sole writer of wallet balances — the ledger and
/// rollback engines go through its trees inside store transactions.
pub struct CasinoDatabase {
    db: Db,
}

#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub users_count: usize,
    pub wallets_count: usize,
    pub sessions_count: usize,
    pub transactions_count: usize,
    pub size_on_disk: u64,
}

impl CasinoDatabase {
    /// Open or create the database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CasinoError> {
        let db = sled::open(path.as_ref())
            .map_err(|e| storage_err("failed to open database", e))?;
        Ok(CasinoDatabase { db })
    }

    /// Open with default path
    pub fn open_default() -> Result<Self, CasinoError> {
        Self::open(DB_PATH)
    }

    /// Flush all pending writes to disk.
    pub fn flush(&self) -> Result<(), CasinoError> {
        self.db
            .flush()
            .map_err(|e| storage_err("failed to flush database", e))?;
        Ok(())
    }

    /// Monotonic id source for users, wallets, providers, games, sessions.
    pub fn next_id(&self) -> Result<u64, CasinoError> {
        self.db
            .generate_id()
            .map_err(|e| storage_err("failed to generate id", e))
    }

    /// Check if database is empty (first run — seeding target)
    pub fn is_empty(&self) -> bool {
        self.users_tree().ok().map(|t| t.is_empty()).unwrap_or(true)
    }

    pub fn stats(&self) -> DatabaseStats {
        let count = |name: &str| self.tree(name).ok().map(|t| t.len()).unwrap_or(0);
        DatabaseStats {
            users_count: count(TREE_USERS),
            wallets_count: count(TREE_WALLETS),
            sessions_count: count(TREE_SESSIONS),
            transactions_count: count(TREE_TRANSACTIONS),
            size_on_disk: self.db.size_on_disk().unwrap_or(0),
        }
    }

    fn tree(&self, name: &str) -> Result<Tree, CasinoError> {
        self.db
            .open_tree(name)
            .map_err(|e| storage_err(&format!("failed to open {} tree", name), e))
    }

    fn users_tree(&self) -> Result<Tree, CasinoError> {
        self.tree(TREE_USERS)
    }

    fn user_index_tree(&self) -> Result<Tree, CasinoError> {
        self.tree(TREE_USER_INDEX)
    }

    pub(crate) fn wallets_tree(&self) -> Result<Tree, CasinoError> {
        self.tree(TREE_WALLETS)
    }

    fn wallet_index_tree(&self) -> Result<Tree, CasinoError> {
        self.tree(TREE_WALLET_INDEX)
    }

    fn providers_tree(&self) -> Result<Tree, CasinoError> {
        self.tree(TREE_PROVIDERS)
    }

    fn games_tree(&self) -> Result<Tree, CasinoError> {
        self.tree(TREE_GAMES)
    }

    fn sessions_tree(&self) -> Result<Tree, CasinoError> {
        self.tree(TREE_SESSIONS)
    }

    fn session_tokens_tree(&self) -> Result<Tree, CasinoError> {
        self.tree(TREE_SESSION_TOKENS)
    }

    pub(crate) fn transactions_tree(&self) -> Result<Tree, CasinoError> {
        self.tree(TREE_TRANSACTIONS)
    }

    pub(crate) fn tx_index_tree(&self) -> Result<Tree, CasinoError> {
        self.tree(TREE_TX_INDEX)
    }

    // ── Users ───────────────────────────────────────────────────────────

    /// Insert a user, enforcing username and email uniqueness.
    pub fn insert_user(&self, username: &str, email: &str) -> Result<User, CasinoError> {
        let user = User {
            id: self.next_id()?,
            username: username.to_string(),
            email: email.to_string(),
            created_at: unix_now(),
        };
        let users = self.users_tree()?;
        let index = self.user_index_tree()?;
        let result = (&users, &index).transaction(|(u, ix)| {
            let name_key = format!("name:{}", user.username);
            let email_key = format!("email:{}", user.email);
            if ix.get(name_key.as_bytes())?.is_some() {
                return abort(TxAbort::IndexTaken(format!(
                    "username '{}' already exists",
                    user.username
                )));
            }
            if ix.get(email_key.as_bytes())?.is_some() {
                return abort(TxAbort::IndexTaken(format!(
                    "email '{}' already exists",
                    user.email
                )));
            }
            ix.insert(name_key.as_bytes(), user.id.to_be_bytes().to_vec())?;
            ix.insert(email_key.as_bytes(), user.id.to_be_bytes().to_vec())?;
            u.insert(user.id.to_be_bytes().to_vec(), enc(&user)?)?;
            Ok(())
        });
        match result {
            Ok(()) => Ok(user),
            Err(TransactionError::Abort(TxAbort::IndexTaken(msg))) => {
                Err(CasinoError::InvalidRequest(msg))
            }
            Err(TransactionError::Abort(other)) => {
                Err(CasinoError::Internal(format!("unexpected abort: {:?}", other)))
            }
            Err(TransactionError::Storage(e)) => Err(storage_err("user insert", e)),
        }
    }

    pub fn get_user(&self, id: u64) -> Result<Option<User>, CasinoError> {
        let tree = self.users_tree()?;
        match tree
            .get(id.to_be_bytes())
            .map_err(|e| storage_err("user read", e))?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    // ── Providers and games ─────────────────────────────────────────────

    pub fn insert_provider(
        &self,
        name: &str,
        launch_url: &str,
        enabled: bool,
    ) -> Result<GameProvider, CasinoError> {
        let provider = GameProvider {
            id: self.next_id()?,
            name: name.to_string(),
            launch_url: launch_url.to_string(),
            enabled,
        };
        let tree = self.providers_tree()?;
        tree.insert(provider.id.to_be_bytes(), encode(&provider)?)
            .map_err(|e| storage_err("provider insert", e))?;
        Ok(provider)
    }

    pub fn get_provider(&self, id: u64) -> Result<Option<GameProvider>, CasinoError> {
        let tree = self.providers_tree()?;
        match tree
            .get(id.to_be_bytes())
            .map_err(|e| storage_err("provider read", e))?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn insert_game(
        &self,
        provider_id: u64,
        external_game_id: &str,
        name: &str,
        active: bool,
    ) -> Result<Game, CasinoError> {
        let game = Game {
            id: self.next_id()?,
            provider_id,
            external_game_id: external_game_id.to_string(),
            name: name.to_string(),
            active,
        };
        let tree = self.games_tree()?;
        tree.insert(game.id.to_be_bytes(), encode(&game)?)
            .map_err(|e| storage_err("game insert", e))?;
        Ok(game)
    }

    pub fn get_game(&self, id: u64) -> Result<Option<Game>, CasinoError> {
        let tree = self.games_tree()?;
        match tree
            .get(id.to_be_bytes())
            .map_err(|e| storage_err("game read", e))?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    // ── Wallets ─────────────────────────────────────────────────────────

    pub fn get_wallet(&self, id: u64) -> Result<Option<Wallet>, CasinoError> {
        let tree = self.wallets_tree()?;
        match tree
            .get(id.to_be_bytes())
            .map_err(|e| storage_err("wallet read", e))?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn find_wallet(&self, user_id: u64, currency: &str) -> Result<Option<Wallet>, CasinoError> {
        let index = self.wallet_index_tree()?;
        let key = wallet_index_key(user_id, currency);
        match index
            .get(key.as_bytes())
            .map_err(|e| storage_err("wallet index read", e))?
        {
            Some(id_bytes) => self.get_wallet(ivec_u64(&id_bytes)?),
            None => Ok(None),
        }
    }

    /// Get-or-create the wallet for (user, currency) with zero balances.
    /// Concurrent launches converge on one wallet: the index insert runs in
    /// a transaction, and the loser adopts the winner's row.
    pub fn get_or_create_wallet(&self, user_id: u64, currency: &str) -> Result<Wallet, CasinoError> {
        if let Some(wallet) = self.find_wallet(user_id, currency)? {
            return Ok(wallet);
        }
        let candidate = Wallet {
            id: self.next_id()?,
            user_id,
            currency: currency.to_string(),
            playable_balance: 0,
            redeemable_balance: 0,
            entry_count: 0,
            created_at: unix_now(),
        };
        let wallets = self.wallets_tree()?;
        let index = self.wallet_index_tree()?;
        let result = (&wallets, &index).transaction(|(w, ix)| {
            let key = wallet_index_key(user_id, currency);
            if let Some(existing) = ix.get(key.as_bytes())? {
                let id = tx_u64(&existing)?;
                let found = w.get(&id.to_be_bytes()[..])?.ok_or_else(|| {
                    ConflictableTransactionError::Abort(TxAbort::Corrupt(
                        "wallet index points at a missing wallet".into(),
                    ))
                })?;
                return Ok(dec::<Wallet>(&found)?);
            }
            ix.insert(key.as_bytes(), candidate.id.to_be_bytes().to_vec())?;
            w.insert(candidate.id.to_be_bytes().to_vec(), enc(&candidate)?)?;
            Ok(candidate.clone())
        });
        match result {
            Ok(wallet) => Ok(wallet),
            Err(TransactionError::Abort(TxAbort::Corrupt(msg))) => Err(CasinoError::Storage(msg)),
            Err(TransactionError::Abort(other)) => {
                Err(CasinoError::Internal(format!("unexpected abort: {:?}", other)))
            }
            Err(TransactionError::Storage(e)) => Err(storage_err("wallet create", e)),
        }
    }

    /// Seed/test path: create the wallet and set its starting balances.
    /// Never used by the callback engines — they only move balances inside
    /// ledger transactions.
    pub fn create_funded_wallet(
        &self,
        user_id: u64,
        currency: &str,
        playable_balance: i64,
        redeemable_balance: i64,
    ) -> Result<Wallet, CasinoError> {
        let mut wallet = self.get_or_create_wallet(user_id, currency)?;
        wallet.playable_balance = playable_balance;
        wallet.redeemable_balance = redeemable_balance;
        let tree = self.wallets_tree()?;
        tree.insert(wallet.id.to_be_bytes(), encode(&wallet)?)
            .map_err(|e| storage_err("wallet write", e))?;
        Ok(wallet)
    }

    // ── Sessions ────────────────────────────────────────────────────────

    /// Insert a session and claim its token. Returns false if the token is
    /// already taken (the caller regenerates and retries).
    pub fn insert_session(&self, session: &GameSession) -> Result<bool, CasinoError> {
        let sessions = self.sessions_tree()?;
        let tokens = self.session_tokens_tree()?;
        let result = (&sessions, &tokens).transaction(|(s, t)| {
            if t.get(session.token.as_bytes())?.is_some() {
                return abort(TxAbort::TokenTaken);
            }
            t.insert(session.token.as_bytes(), session.id.to_be_bytes().to_vec())?;
            s.insert(session.id.to_be_bytes().to_vec(), enc(session)?)?;
            Ok(())
        });
        match result {
            Ok(()) => Ok(true),
            Err(TransactionError::Abort(TxAbort::TokenTaken)) => Ok(false),
            Err(TransactionError::Abort(other)) => {
                Err(CasinoError::Internal(format!("unexpected abort: {:?}", other)))
            }
            Err(TransactionError::Storage(e)) => Err(storage_err("session insert", e)),
        }
    }

    pub fn get_session(&self, id: u64) -> Result<Option<GameSession>, CasinoError> {
        let tree = self.sessions_tree()?;
        match tree
            .get(id.to_be_bytes())
            .map_err(|e| storage_err("session read", e))?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn get_session_by_token(&self, token: &str) -> Result<Option<GameSession>, CasinoError> {
        let tokens = self.session_tokens_tree()?;
        match tokens
            .get(token.as_bytes())
            .map_err(|e| storage_err("token read", e))?
        {
            Some(id_bytes) => self.get_session(ivec_u64(&id_bytes)?),
            None => Ok(None),
        }
    }

    pub fn update_session(&self, session: &GameSession) -> Result<(), CasinoError> {
        let tree = self.sessions_tree()?;
        tree.insert(session.id.to_be_bytes(), encode(session)?)
            .map_err(|e| storage_err("session write", e))?;
        Ok(())
    }

    // ── Ledger entries ──────────────────────────────────────────────────

    pub fn get_entry(&self, external_id: &str) -> Result<Option<LedgerEntry>, CasinoError> {
        let tree = self.transactions_tree()?;
        match tree
            .get(external_id.as_bytes())
            .map_err(|e| storage_err("entry read", e))?
        {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The rollback entry that reversed this original, if any.
    pub fn rollback_of(&self, original_id: &str) -> Result<Option<String>, CasinoError> {
        let index = self.tx_index_tree()?;
        match index
            .get(rb_key(original_id))
            .map_err(|e| storage_err("rollback link read", e))?
        {
            Some(bytes) => Ok(Some(
                String::from_utf8(bytes.to_vec())
                    .map_err(|e| storage_err("rollback link", e))?,
            )),
            None => Ok(None),
        }
    }

    /// A credit that paid out against this original, if any.
    pub fn payout_of(&self, original_id: &str) -> Result<Option<String>, CasinoError> {
        let index = self.tx_index_tree()?;
        match index
            .get(cr_key(original_id))
            .map_err(|e| storage_err("payout link read", e))?
        {
            Some(bytes) => Ok(Some(
                String::from_utf8(bytes.to_vec())
                    .map_err(|e| storage_err("payout link", e))?,
            )),
            None => Ok(None),
        }
    }

    /// All entries for a wallet in ledger-insert order.
    pub fn wallet_entries(&self, wallet_id: u64) -> Result<Vec<LedgerEntry>, CasinoError> {
        let index = self.tx_index_tree()?;
        let mut entries = Vec::new();
        for item in index.scan_prefix(log_prefix(wallet_id)) {
            let (_key, value) = item.map_err(|e| storage_err("log scan", e))?;
            let external_id = String::from_utf8(value.to_vec())
                .map_err(|e| storage_err("log value", e))?;
            let entry = self.get_entry(&external_id)?.ok_or_else(|| {
                CasinoError::Storage(format!("log references missing entry {}", external_id))
            })?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, CasinoDatabase) {
        let dir = tempfile::tempdir().unwrap();
        let db = CasinoDatabase::open(dir.path()).unwrap();
        (dir, db)
    }

    #[test]
    fn test_database_open() {
        let (_dir, db) = open_temp();
        assert!(db.is_empty());
        assert_eq!(db.stats().users_count, 0);
    }

    #[test]
    fn test_user_uniqueness() {
        let (_dir, db) = open_temp();
        let alice = db.insert_user("alice", "alice@example.com").unwrap();
        assert_eq!(db.get_user(alice.id).unwrap().unwrap().username, "alice");

        let dup_name = db.insert_user("alice", "other@example.com");
        assert!(matches!(dup_name, Err(CasinoError::InvalidRequest(_))));
        let dup_email = db.insert_user("bob", "alice@example.com");
        assert!(matches!(dup_email, Err(CasinoError::InvalidRequest(_))));
    }

    #[test]
    fn test_wallet_get_or_create_converges() {
        let (_dir, db) = open_temp();
        let user = db.insert_user("carol", "carol@example.com").unwrap();
        let first = db.get_or_create_wallet(user.id, "USD").unwrap();
        assert_eq!(first.playable_balance, 0);
        assert_eq!(first.entry_count, 0);

        let second = db.get_or_create_wallet(user.id, "USD").unwrap();
        assert_eq!(first.id, second.id);

        // Different currency gets its own wallet
        let eur = db.get_or_create_wallet(user.id, "EUR").unwrap();
        assert_ne!(eur.id, first.id);
    }

    #[test]
    fn test_funded_wallet() {
        let (_dir, db) = open_temp();
        let user = db.insert_user("dave", "dave@example.com").unwrap();
        let wallet = db.create_funded_wallet(user.id, "USD", 10_000, 500).unwrap();
        assert_eq!(wallet.playable_balance, 10_000);
        assert_eq!(wallet.redeemable_balance, 500);
        let reread = db.get_wallet(wallet.id).unwrap().unwrap();
        assert_eq!(reread.playable_balance, 10_000);
    }

    #[test]
    fn test_session_token_index() {
        let (_dir, db) = open_temp();
        let user = db.insert_user("erin", "erin@example.com").unwrap();
        let wallet = db.get_or_create_wallet(user.id, "USD").unwrap();
        let session = GameSession {
            id: db.next_id().unwrap(),
            user_id: user.id,
            wallet_id: wallet.id,
            game_id: 1,
            token: casino_crypto::generate_session_token(),
            provider_session_id: None,
            active: true,
            created_at: unix_now(),
            ended_at: None,
        };
        assert!(db.insert_session(&session).unwrap());

        let found = db.get_session_by_token(&session.token).unwrap().unwrap();
        assert_eq!(found.id, session.id);
        assert!(db.get_session_by_token("unknown").unwrap().is_none());

        // Same token again is reported as taken, not overwritten
        let mut clash = session.clone();
        clash.id = db.next_id().unwrap();
        assert!(!db.insert_session(&clash).unwrap());
    }
}
