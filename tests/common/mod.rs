// Shared fixtures for the end-to-end suites: an in-memory node with real
// secrets, and signed request builders that exercise the full route tree.
#![allow(dead_code)]

use casino_node::db::CasinoDatabase;
use casino_node::gate::Secrets;
use casino_node::metrics::CasinoMetrics;
use casino_node::provider_client::ProviderClient;
use casino_node::server::NodeState;
use std::sync::Arc;

pub const PROVIDER_SECRET: &[u8] = b"provider-secret";
pub const CASINO_SECRET: &[u8] = b"casino-secret";

pub struct TestNode {
    pub _dir: tempfile::TempDir,
    pub db: Arc<CasinoDatabase>,
    pub state: NodeState,
}

pub fn test_node() -> TestNode {
    test_node_with_secrets(Secrets::new(
        Some(CASINO_SECRET.to_vec()),
        Some(PROVIDER_SECRET.to_vec()),
    ))
}

pub fn test_node_with_secrets(secrets: Secrets) -> TestNode {
    let dir = tempfile::tempdir().unwrap();
    let db = Arc::new(CasinoDatabase::open(dir.path()).unwrap());
    let metrics = CasinoMetrics::new().unwrap();
    let provider_client = ProviderClient::new(secrets.casino_secret.clone()).unwrap();
    let state = NodeState::new(db.clone(), secrets, metrics, provider_client);
    TestNode {
        _dir: dir,
        db,
        state,
    }
}

/// One player, one provider, one game; the player's USD wallet starts at
/// `balance`. The provider's launch URL refuses connections immediately,
/// which the launch flow must tolerate.
pub fn seed_player(node: &TestNode, balance: i64) -> (u64, u64) {
    let user = node.db.insert_user("player", "player@example.com").unwrap();
    let provider = node
        .db
        .insert_provider("acme-games", "http://127.0.0.1:9/launch", true)
        .unwrap();
    let game = node
        .db
        .insert_game(provider.id, "acme-slots-7", "Lucky Sevens", true)
        .unwrap();
    node.db
        .create_funded_wallet(user.id, "USD", balance, 0)
        .unwrap();
    (user.id, game.id)
}

/// POST with a valid provider signature over the exact body bytes.
pub fn signed_request(path: &str, body: &str) -> warp::test::RequestBuilder {
    warp::test::request()
        .method("POST")
        .path(path)
        .header(
            "x-provider-signature",
            casino_crypto::sign_body(PROVIDER_SECRET, body.as_bytes()),
        )
        .body(body)
}

/// POST with no signature header at all.
pub fn unsigned_request(path: &str, body: &str) -> warp::test::RequestBuilder {
    warp::test::request().method("POST").path(path).body(body)
}

pub fn balance_body(token: &str) -> String {
    serde_json::json!({ "sessionToken": token }).to_string()
}

pub fn debit_body(token: &str, id: &str, round: &str, amount: i64) -> String {
    serde_json::json!({
        "sessionToken": token,
        "transactionId": id,
        "roundId": round,
        "amount": amount,
    })
    .to_string()
}

pub fn credit_body(token: &str, id: &str, round: &str, amount: i64, related: Option<&str>) -> String {
    let mut body = serde_json::json!({
        "sessionToken": token,
        "transactionId": id,
        "roundId": round,
        "amount": amount,
    });
    if let Some(related) = related {
        body["relatedTransactionId"] = serde_json::json!(related);
    }
    body.to_string()
}

pub fn rollback_body(token: &str, id: &str, original: &str) -> String {
    serde_json::json!({
        "sessionToken": token,
        "transactionId": id,
        "originalTransactionId": original,
    })
    .to_string()
}

pub fn launch_body(user_id: u64, game_id: u64) -> String {
    serde_json::json!({ "userId": user_id, "gameId": game_id }).to_string()
}

pub fn parse(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).unwrap()
}
