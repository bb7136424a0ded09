// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CASINO INTEGRATION - SESSION MODULE
//
// Session registry: launch produces the token every callback consumes.
// Launch resolves user → game → provider, lazily creates the wallet,
// and inserts the session under a fresh 256-bit token.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use casino_core::{unix_now, CasinoError, Game, GameProvider, GameSession, Wallet, DEFAULT_CURRENCY};
use std::sync::Arc;

use crate::db::CasinoDatabase;

pub struct SessionRegistry {
    db: Arc<CasinoDatabase>,
}

/// Everything a launch resolves, returned together so the handler can
/// answer the front-end and call the provider without re-reading.
pub struct LaunchOutcome {
    pub session: GameSession,
    pub wallet: Wallet,
    pub game: Game,
    pub provider: GameProvider,
}

impl SessionRegistry {
    pub fn new(db: Arc<CasinoDatabase>) -> Self {
        SessionRegistry { db }
    }

    pub fn launch(
        &self,
        user_id: u64,
        game_id: u64,
        currency: Option<&str>,
    ) -> Result<LaunchOutcome, CasinoError> {
        let user = self.db.get_user(user_id)?.ok_or(CasinoError::UserNotFound)?;
        let game = self
            .db
            .get_game(game_id)?
            .filter(|g| g.active)
            .ok_or(CasinoError::GameNotFound)?;
        let provider = self
            .db
            .get_provider(game.provider_id)?
            .filter(|p| p.enabled)
            .ok_or(CasinoError::ProviderNotFound)?;

        let currency = currency.unwrap_or(DEFAULT_CURRENCY);
        let wallet = self.db.get_or_create_wallet(user.id, currency)?;

        // A 256-bit collision is not expected in the lifetime of the
        // service; the retry loop exists so a collision is still not an
        // outage.
        for _ in 0..3 {
            let session = GameSession {
                id: self.db.next_id()?,
                user_id: user.id,
                wallet_id: wallet.id,
                game_id: game.id,
                token: casino_crypto::generate_session_token(),
                provider_session_id: None,
                active: true,
                created_at: unix_now(),
                ended_at: None,
            };
            if self.db.insert_session(&session)? {
                return Ok(LaunchOutcome {
                    session,
                    wallet,
                    game,
                    provider,
                });
            }
        }
        Err(CasinoError::Internal(
            "could not allocate a unique session token".into(),
        ))
    }

    /// Token → session, only while active. Every callback's first check.
    pub fn resolve(&self, token: &str) -> Result<Option<GameSession>, CasinoError> {
        Ok(self.db.get_session_by_token(token)?.filter(|s| s.active))
    }

    /// Bookkeeping after the Provider's launch-ack. The session is fully
    /// usable without it, so callers treat failure as non-fatal.
    pub fn attach_provider_session(
        &self,
        session_id: u64,
        provider_session_id: &str,
    ) -> Result<(), CasinoError> {
        let mut session = self
            .db
            .get_session(session_id)?
            .ok_or(CasinoError::InvalidSession)?;
        session.provider_session_id = Some(provider_session_id.to_string());
        self.db.update_session(&session)
    }

    pub fn end(&self, token: &str) -> Result<GameSession, CasinoError> {
        let mut session = self
            .resolve(token)?
            .ok_or(CasinoError::InvalidSession)?;
        session.active = false;
        session.ended_at = Some(unix_now());
        self.db.update_session(&session)?;
        Ok(session)
    }
}
