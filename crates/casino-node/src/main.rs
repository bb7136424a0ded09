// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CASINO INTEGRATION - NODE ENTRY POINT
//
// Reads configuration from the environment once, opens the store, seeds
// it on first run, and serves the callback API.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::sync::Arc;

use casino_node::db::CasinoDatabase;
use casino_node::gate::Secrets;
use casino_node::metrics::CasinoMetrics;
use casino_node::provider_client::ProviderClient;
use casino_node::seed;
use casino_node::server::{start_api_server, NodeState};

const DEFAULT_API_PORT: u16 = 3050;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🎰 Casino wallet node v{}", env!("CARGO_PKG_VERSION"));

    let db_path =
        std::env::var("CASINO_DB_PATH").unwrap_or_else(|_| "casino_database".to_string());
    let db = Arc::new(CasinoDatabase::open(&db_path)?);
    println!("💾 Database open at {}", db_path);

    if db.is_empty() {
        let seed_path =
            std::env::var("CASINO_SEED_FILE").unwrap_or_else(|_| "casino_seed.json".to_string());
        match seed::seed_from_file(&db, &seed_path) {
            Ok(Some(summary)) => println!(
                "🌱 Seeded {} users, {} providers, {} games, {} wallets from {}",
                summary.users, summary.providers, summary.games, summary.wallets, seed_path
            ),
            Ok(None) => println!("🌱 No seed file at {} — starting empty", seed_path),
            Err(e) => eprintln!("⚠️  Seeding failed: {}", e),
        }
    }

    let secrets = Secrets::from_env();
    if secrets.provider_secret.is_none() {
        eprintln!("⚠️  PROVIDER_SECRET not set — provider callbacks will answer HTTP 500");
    }
    if secrets.casino_secret.is_none() {
        eprintln!("⚠️  CASINO_SECRET not set — outbound launch calls will be skipped");
    }

    let metrics = CasinoMetrics::new()?;
    let provider_client = ProviderClient::new(secrets.casino_secret.clone())?;
    let state = NodeState::new(db, secrets, metrics, provider_client);

    let port = std::env::var("CASINO_API_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_API_PORT);
    start_api_server(state, port).await;
    Ok(())
}
