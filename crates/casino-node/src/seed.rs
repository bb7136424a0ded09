// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CASINO INTEGRATION - SEED MODULE
//
// First-run initialization from casino_seed.json: users, providers,
// games, and optionally pre-funded wallets. A missing seed file is not
// an error — the node just starts empty.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use casino_core::{CasinoError, DEFAULT_CURRENCY};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::db::CasinoDatabase;

fn default_true() -> bool {
    true
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedUser {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedProvider {
    pub name: String,
    pub launch_url: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedGame {
    /// Provider referenced by name, resolved during apply.
    pub provider: String,
    pub external_game_id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedWallet {
    pub username: String,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub playable_balance: i64,
    #[serde(default)]
    pub redeemable_balance: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub providers: Vec<SeedProvider>,
    #[serde(default)]
    pub games: Vec<SeedGame>,
    #[serde(default)]
    pub wallets: Vec<SeedWallet>,
}

#[derive(Debug, Clone)]
pub struct SeedSummary {
    pub users: usize,
    pub providers: usize,
    pub games: usize,
    pub wallets: usize,
}

/// Seed the store from a JSON file. Returns None if the file is absent.
pub fn seed_from_file(
    db: &CasinoDatabase,
    path: &str,
) -> Result<Option<SeedSummary>, CasinoError> {
    if !Path::new(path).exists() {
        return Ok(None);
    }
    let data = std::fs::read_to_string(path)
        .map_err(|e| CasinoError::Internal(format!("failed to read seed file {}: {}", path, e)))?;
    let config: SeedConfig = serde_json::from_str(&data)
        .map_err(|e| CasinoError::Internal(format!("failed to parse seed JSON: {}", e)))?;
    apply(db, &config).map(Some)
}

pub fn apply(db: &CasinoDatabase, config: &SeedConfig) -> Result<SeedSummary, CasinoError> {
    let mut user_ids: HashMap<String, u64> = HashMap::new();
    for user in &config.users {
        let inserted = db.insert_user(&user.username, &user.email)?;
        user_ids.insert(user.username.clone(), inserted.id);
    }

    let mut provider_ids: HashMap<String, u64> = HashMap::new();
    for provider in &config.providers {
        let inserted = db.insert_provider(&provider.name, &provider.launch_url, provider.enabled)?;
        provider_ids.insert(provider.name.clone(), inserted.id);
    }

    for game in &config.games {
        let provider_id = provider_ids.get(&game.provider).copied().ok_or_else(|| {
            CasinoError::Internal(format!(
                "seed game '{}' references unknown provider '{}'",
                game.name, game.provider
            ))
        })?;
        db.insert_game(provider_id, &game.external_game_id, &game.name, game.active)?;
    }

    for wallet in &config.wallets {
        let user_id = user_ids.get(&wallet.username).copied().ok_or_else(|| {
            CasinoError::Internal(format!(
                "seed wallet references unknown user '{}'",
                wallet.username
            ))
        })?;
        db.create_funded_wallet(
            user_id,
            &wallet.currency,
            wallet.playable_balance,
            wallet.redeemable_balance,
        )?;
    }

    db.flush()?;
    Ok(SeedSummary {
        users: config.users.len(),
        providers: config.providers.len(),
        games: config.games.len(),
        wallets: config.wallets.len(),
    })
}
