// ========================================
// INTEGRATION TESTS — CALLBACK SURFACE
// ========================================
//
// Test Scenarios:
// 1. Launch + balance read over the full route tree
// 2. Signature gate rejections (bad, missing, unconfigured)
// 3. Input validation before delegation
// 4. Session lifecycle (endSession closes the money path)
// 5. Health and metrics surfaces
//
// Usage:
//   cargo test --test integration_test
//
// ========================================

mod common;

use casino_node::gate::Secrets;
use casino_node::server::casino_routes;
use common::*;

#[tokio::test]
async fn test_launch_then_balance_read() {
    let node = test_node();
    let (user_id, game_id) = seed_player(&node, 10_000);
    let api = casino_routes(node.state.clone());

    // Launch: the provider endpoint is unreachable, the session must
    // still come back valid.
    let resp = unsigned_request("/casino/launchGame", &launch_body(user_id, game_id))
        .reply(&api)
        .await;
    assert_eq!(resp.status().as_u16(), 200);
    let launch = parse(resp.body());
    assert_eq!(launch["success"], true);
    assert_eq!(launch["balance"], 10_000);
    assert_eq!(launch["currency"], "USD");
    let token = launch["sessionToken"].as_str().unwrap().to_string();
    assert_eq!(token.len(), 64);

    // Session exists without a provider session id (ack never arrived)
    let session = node.db.get_session_by_token(&token).unwrap().unwrap();
    assert!(session.active);
    assert!(session.provider_session_id.is_none());

    // Signed balance read
    let body = balance_body(&token);
    let resp = signed_request("/casino/getBalance", &body).reply(&api).await;
    assert_eq!(resp.status().as_u16(), 200);
    let balance = parse(resp.body());
    assert_eq!(balance["success"], true);
    assert_eq!(balance["balance"], 10_000);
    assert_eq!(balance["currency"], "USD");
}

#[tokio::test]
async fn test_launch_lookup_failures() {
    let node = test_node();
    let (user_id, _game_id) = seed_player(&node, 0);
    let api = casino_routes(node.state.clone());

    let resp = unsigned_request("/casino/launchGame", &launch_body(9_999_999, 1))
        .reply(&api)
        .await;
    assert_eq!(resp.status().as_u16(), 404);
    assert_eq!(parse(resp.body())["code"], "USER_NOT_FOUND");

    let resp = unsigned_request("/casino/launchGame", &launch_body(user_id, 9_999_999))
        .reply(&api)
        .await;
    assert_eq!(resp.status().as_u16(), 404);
    assert_eq!(parse(resp.body())["code"], "GAME_NOT_FOUND");
}

#[tokio::test]
async fn test_bad_signature_rejected_and_ledger_untouched() {
    let node = test_node();
    let (user_id, game_id) = seed_player(&node, 10_000);
    let api = casino_routes(node.state.clone());

    let resp = unsigned_request("/casino/launchGame", &launch_body(user_id, game_id))
        .reply(&api)
        .await;
    let token = parse(resp.body())["sessionToken"].as_str().unwrap().to_string();

    let body = debit_body(&token, "t1", "r1", 1_000);
    let mut signature = casino_crypto::sign_body(PROVIDER_SECRET, body.as_bytes());
    // Flip one nibble of an otherwise valid signature
    let flipped = if signature.ends_with('0') { '1' } else { '0' };
    signature.pop();
    signature.push(flipped);

    let resp = warp::test::request()
        .method("POST")
        .path("/casino/debit")
        .header("x-provider-signature", signature)
        .body(&body)
        .reply(&api)
        .await;
    assert_eq!(resp.status().as_u16(), 401);
    assert_eq!(parse(resp.body())["code"], "SIGNATURE_INVALID");

    // No entry, no balance change
    assert!(node.db.get_entry("t1").unwrap().is_none());
    let session = node.db.get_session_by_token(&token).unwrap().unwrap();
    let wallet = node.db.get_wallet(session.wallet_id).unwrap().unwrap();
    assert_eq!(wallet.playable_balance, 10_000);
}

#[tokio::test]
async fn test_missing_signature_header_rejected() {
    let node = test_node();
    let api = casino_routes(node.state.clone());
    let resp = unsigned_request("/casino/debit", &debit_body("tok", "t1", "r1", 100))
        .reply(&api)
        .await;
    assert_eq!(resp.status().as_u16(), 401);
    assert_eq!(parse(resp.body())["code"], "SIGNATURE_INVALID");
}

#[tokio::test]
async fn test_missing_secret_is_server_error() {
    let node = test_node_with_secrets(Secrets::new(None, None));
    let api = casino_routes(node.state.clone());
    let body = debit_body("tok", "t1", "r1", 100);
    let resp = signed_request("/casino/debit", &body).reply(&api).await;
    assert_eq!(resp.status().as_u16(), 500);
    assert_eq!(parse(resp.body())["code"], "INTERNAL_ERROR");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let node = test_node();
    let api = casino_routes(node.state.clone());
    let body = r#"{"sessionToken": "tok", "amount": "#;
    let resp = signed_request("/casino/debit", body).reply(&api).await;
    assert_eq!(resp.status().as_u16(), 400);
    assert_eq!(parse(resp.body())["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_empty_session_token_is_bad_request() {
    let node = test_node();
    let api = casino_routes(node.state.clone());
    let body = debit_body("", "t1", "r1", 100);
    let resp = signed_request("/casino/debit", &body).reply(&api).await;
    assert_eq!(resp.status().as_u16(), 400);
    assert_eq!(parse(resp.body())["code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn test_unknown_session_token_rejected() {
    let node = test_node();
    let api = casino_routes(node.state.clone());
    let body = debit_body("feedface", "t1", "r1", 100);
    let resp = signed_request("/casino/debit", &body).reply(&api).await;
    assert_eq!(resp.status().as_u16(), 401);
    assert_eq!(parse(resp.body())["code"], "INVALID_SESSION");
}

#[tokio::test]
async fn test_end_session_closes_money_path() {
    let node = test_node();
    let (user_id, game_id) = seed_player(&node, 10_000);
    let api = casino_routes(node.state.clone());

    let resp = unsigned_request("/casino/launchGame", &launch_body(user_id, game_id))
        .reply(&api)
        .await;
    let token = parse(resp.body())["sessionToken"].as_str().unwrap().to_string();

    let body = serde_json::json!({ "sessionToken": token }).to_string();
    let resp = signed_request("/casino/endSession", &body).reply(&api).await;
    assert_eq!(resp.status().as_u16(), 200);
    assert_eq!(parse(resp.body())["success"], true);

    // The ended session can no longer move money
    let body = debit_body(&token, "t1", "r1", 100);
    let resp = signed_request("/casino/debit", &body).reply(&api).await;
    assert_eq!(resp.status().as_u16(), 401);
    assert_eq!(parse(resp.body())["code"], "INVALID_SESSION");
}

#[tokio::test]
async fn test_health_and_metrics_surfaces() {
    let node = test_node();
    seed_player(&node, 10_000);
    let api = casino_routes(node.state.clone());

    let resp = warp::test::request().path("/health").reply(&api).await;
    assert_eq!(resp.status().as_u16(), 200);
    let health = parse(resp.body());
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["database"]["users_count"], 1);

    let resp = warp::test::request().path("/metrics").reply(&api).await;
    assert_eq!(resp.status().as_u16(), 200);
    let text = String::from_utf8(resp.body().to_vec()).unwrap();
    assert!(text.contains("casino_api_requests_total"));
    assert!(text.contains("casino_wallets_total 1"));
}
