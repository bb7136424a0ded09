// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CASINO INTEGRATION - API SERVER
//
// The callback surface: four signature-gated Provider endpoints, the
// front-end launch endpoint, health, and metrics. Handlers read the raw
// body bytes so the gate verifies exactly what arrived, then parse into
// typed requests and delegate to the engines.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use casino_core::api::{
    BalanceRequest, CreditRequest, DebitRequest, EndSessionRequest, EndSessionResponse,
    ErrorResponse, LaunchRequest, LaunchResponse, ProviderLaunchRequest, RollbackRequest,
};
use casino_core::{unix_now, CasinoError, PROVIDER_SIGNATURE_HEADER};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use warp::Filter;

use crate::db::CasinoDatabase;
use crate::gate::{verify_provider_request, Secrets};
use crate::ledger::WalletLedger;
use crate::metrics::CasinoMetrics;
use crate::provider_client::ProviderClient;
use crate::rollback::RollbackEngine;
use crate::sessions::SessionRegistry;

/// Bundles all dependencies of the API server. Everything is behind an
/// Arc, so cloning into per-route closures is cheap.
#[derive(Clone)]
pub struct NodeState {
    pub db: Arc<CasinoDatabase>,
    pub secrets: Arc<Secrets>,
    pub metrics: Arc<CasinoMetrics>,
    pub provider_client: Arc<ProviderClient>,
    pub ledger: Arc<WalletLedger>,
    pub rollbacks: Arc<RollbackEngine>,
    pub sessions: Arc<SessionRegistry>,
}

impl NodeState {
    pub fn new(
        db: Arc<CasinoDatabase>,
        secrets: Secrets,
        metrics: Arc<CasinoMetrics>,
        provider_client: ProviderClient,
    ) -> Self {
        NodeState {
            ledger: Arc::new(WalletLedger::new(db.clone())),
            rollbacks: Arc::new(RollbackEngine::new(db.clone())),
            sessions: Arc::new(SessionRegistry::new(db.clone())),
            secrets: Arc::new(secrets),
            metrics,
            provider_client: Arc::new(provider_client),
            db,
        }
    }
}

// Helper to inject state into route handlers
fn with_state<T: Clone + Send>(
    state: T,
) -> impl Filter<Extract = (T,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn ok_json<T: Serialize>(body: &T) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(body), warp::http::StatusCode::OK)
}

fn error_json(err: &CasinoError) -> warp::reply::WithStatus<warp::reply::Json> {
    let status = warp::http::StatusCode::from_u16(err.http_status())
        .unwrap_or(warp::http::StatusCode::INTERNAL_SERVER_ERROR);
    warp::reply::with_status(warp::reply::json(&ErrorResponse::from(err)), status)
}

fn count_error(state: &NodeState, err: &CasinoError) -> warp::reply::WithStatus<warp::reply::Json> {
    state.metrics.api_errors_total.inc();
    match err {
        CasinoError::SignatureInvalid => state.metrics.signature_failures_total.inc(),
        CasinoError::InsufficientFunds => state.metrics.insufficient_funds_total.inc(),
        _ => {}
    }
    error_json(err)
}

/// Gate first, parse second: the signature covers the raw bytes, and a
/// body that fails to parse still gets a proper 400 instead of a 500.
fn gated_parse<T: DeserializeOwned>(
    state: &NodeState,
    signature: Option<&str>,
    body: &[u8],
) -> Result<T, CasinoError> {
    verify_provider_request(&state.secrets, signature, body)?;
    serde_json::from_slice(body)
        .map_err(|e| CasinoError::InvalidRequest(format!("invalid request body: {}", e)))
}

fn require_token(token: &str) -> Result<(), CasinoError> {
    if token.is_empty() {
        return Err(CasinoError::InvalidRequest(
            "sessionToken must not be empty".into(),
        ));
    }
    Ok(())
}

fn require_transaction_id(id: &str) -> Result<(), CasinoError> {
    if id.is_empty() {
        return Err(CasinoError::InvalidRequest(
            "transactionId must not be empty".into(),
        ));
    }
    Ok(())
}

async fn handle_balance(
    state: NodeState,
    signature: Option<String>,
    body: bytes::Bytes,
) -> warp::reply::WithStatus<warp::reply::Json> {
    state.metrics.api_requests_total.inc();
    let _timer = state.metrics.api_request_duration_seconds.start_timer();
    let req: BalanceRequest = match gated_parse(&state, signature.as_deref(), &body) {
        Ok(req) => req,
        Err(e) => return count_error(&state, &e),
    };
    if let Err(e) = require_token(&req.session_token) {
        return count_error(&state, &e);
    }
    match state.ledger.balance(&req) {
        Ok(resp) => ok_json(&resp),
        Err(e) => count_error(&state, &e),
    }
}

async fn handle_debit(
    state: NodeState,
    signature: Option<String>,
    body: bytes::Bytes,
) -> warp::reply::WithStatus<warp::reply::Json> {
    state.metrics.api_requests_total.inc();
    let _timer = state.metrics.api_request_duration_seconds.start_timer();
    let req: DebitRequest = match gated_parse(&state, signature.as_deref(), &body) {
        Ok(req) => req,
        Err(e) => return count_error(&state, &e),
    };
    if let Err(e) = require_token(&req.session_token)
        .and_then(|_| require_transaction_id(&req.transaction_id))
    {
        return count_error(&state, &e);
    }
    match state.ledger.debit(&req) {
        Ok((resp, duplicate)) => {
            if duplicate {
                state.metrics.duplicate_replays_total.inc();
            } else {
                state.metrics.debits_total.inc();
            }
            ok_json(&resp)
        }
        Err(e) => count_error(&state, &e),
    }
}

async fn handle_credit(
    state: NodeState,
    signature: Option<String>,
    body: bytes::Bytes,
) -> warp::reply::WithStatus<warp::reply::Json> {
    state.metrics.api_requests_total.inc();
    let _timer = state.metrics.api_request_duration_seconds.start_timer();
    let req: CreditRequest = match gated_parse(&state, signature.as_deref(), &body) {
        Ok(req) => req,
        Err(e) => return count_error(&state, &e),
    };
    if let Err(e) = require_token(&req.session_token)
        .and_then(|_| require_transaction_id(&req.transaction_id))
    {
        return count_error(&state, &e);
    }
    match state.ledger.credit(&req) {
        Ok((resp, duplicate)) => {
            if duplicate {
                state.metrics.duplicate_replays_total.inc();
            } else {
                state.metrics.credits_total.inc();
            }
            ok_json(&resp)
        }
        Err(e) => count_error(&state, &e),
    }
}

async fn handle_rollback(
    state: NodeState,
    signature: Option<String>,
    body: bytes::Bytes,
) -> warp::reply::WithStatus<warp::reply::Json> {
    state.metrics.api_requests_total.inc();
    let _timer = state.metrics.api_request_duration_seconds.start_timer();
    let req: RollbackRequest = match gated_parse(&state, signature.as_deref(), &body) {
        Ok(req) => req,
        Err(e) => return count_error(&state, &e),
    };
    if let Err(e) = require_token(&req.session_token)
        .and_then(|_| require_transaction_id(&req.transaction_id))
    {
        return count_error(&state, &e);
    }
    match state.rollbacks.rollback(&req) {
        Ok((resp, duplicate)) => {
            if duplicate {
                state.metrics.duplicate_replays_total.inc();
            } else {
                state.metrics.rollbacks_total.inc();
                if resp.get("tombstone").and_then(|v| v.as_bool()) == Some(true) {
                    state.metrics.tombstones_total.inc();
                }
            }
            ok_json(&resp)
        }
        Err(e) => count_error(&state, &e),
    }
}

async fn handle_end_session(
    state: NodeState,
    signature: Option<String>,
    body: bytes::Bytes,
) -> warp::reply::WithStatus<warp::reply::Json> {
    state.metrics.api_requests_total.inc();
    let _timer = state.metrics.api_request_duration_seconds.start_timer();
    let req: EndSessionRequest = match gated_parse(&state, signature.as_deref(), &body) {
        Ok(req) => req,
        Err(e) => return count_error(&state, &e),
    };
    if let Err(e) = require_token(&req.session_token) {
        return count_error(&state, &e);
    }
    match state.sessions.end(&req.session_token) {
        Ok(_) => {
            state.metrics.sessions_ended_total.inc();
            ok_json(&EndSessionResponse { success: true })
        }
        Err(e) => count_error(&state, &e),
    }
}

/// Casino-initiated launch. Not provider-signature-gated — front-end auth
/// sits in front of this surface. The outbound provider call is best
/// effort: its failure leaves the session valid without a provider id.
async fn handle_launch(
    state: NodeState,
    body: bytes::Bytes,
) -> warp::reply::WithStatus<warp::reply::Json> {
    state.metrics.api_requests_total.inc();
    let _timer = state.metrics.api_request_duration_seconds.start_timer();
    let req: LaunchRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            return count_error(
                &state,
                &CasinoError::InvalidRequest(format!("invalid request body: {}", e)),
            )
        }
    };
    let outcome = match state
        .sessions
        .launch(req.user_id, req.game_id, req.currency.as_deref())
    {
        Ok(outcome) => outcome,
        Err(e) => return count_error(&state, &e),
    };
    state.metrics.sessions_launched_total.inc();

    let provider_req = ProviderLaunchRequest {
        session_token: outcome.session.token.clone(),
        user_id: outcome.session.user_id,
        game_id: outcome.game.external_game_id.clone(),
        currency: outcome.wallet.currency.clone(),
    };
    match state
        .provider_client
        .launch(&outcome.provider.launch_url, &provider_req)
        .await
    {
        Ok(ack) => {
            if let Some(provider_session_id) = ack.provider_session_id {
                if let Err(e) = state
                    .sessions
                    .attach_provider_session(outcome.session.id, &provider_session_id)
                {
                    eprintln!("⚠️  Failed to attach provider session id: {}", e);
                }
            }
        }
        Err(e) => {
            eprintln!("⚠️  Provider launch call failed (session stays valid): {}", e);
        }
    }

    ok_json(&LaunchResponse {
        success: true,
        session_id: outcome.session.id,
        session_token: outcome.session.token,
        balance: outcome.wallet.playable_balance,
        currency: outcome.wallet.currency,
    })
}

pub fn casino_routes(
    state: NodeState,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let start_time = std::time::Instant::now();

    let balance_route = warp::path!("casino" / "getBalance")
        .and(warp::post())
        .and(warp::header::optional::<String>(PROVIDER_SIGNATURE_HEADER))
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .then(|signature: Option<String>, body: bytes::Bytes, state: NodeState| {
            handle_balance(state, signature, body)
        });

    let debit_route = warp::path!("casino" / "debit")
        .and(warp::post())
        .and(warp::header::optional::<String>(PROVIDER_SIGNATURE_HEADER))
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .then(|signature: Option<String>, body: bytes::Bytes, state: NodeState| {
            handle_debit(state, signature, body)
        });

    let credit_route = warp::path!("casino" / "credit")
        .and(warp::post())
        .and(warp::header::optional::<String>(PROVIDER_SIGNATURE_HEADER))
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .then(|signature: Option<String>, body: bytes::Bytes, state: NodeState| {
            handle_credit(state, signature, body)
        });

    let rollback_route = warp::path!("casino" / "rollback")
        .and(warp::post())
        .and(warp::header::optional::<String>(PROVIDER_SIGNATURE_HEADER))
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .then(|signature: Option<String>, body: bytes::Bytes, state: NodeState| {
            handle_rollback(state, signature, body)
        });

    let end_session_route = warp::path!("casino" / "endSession")
        .and(warp::post())
        .and(warp::header::optional::<String>(PROVIDER_SIGNATURE_HEADER))
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .then(|signature: Option<String>, body: bytes::Bytes, state: NodeState| {
            handle_end_session(state, signature, body)
        });

    let launch_route = warp::path!("casino" / "launchGame")
        .and(warp::post())
        .and(warp::body::bytes())
        .and(with_state(state.clone()))
        .then(|body: bytes::Bytes, state: NodeState| handle_launch(state, body));

    let health_route = warp::path("health")
        .and(warp::get())
        .and(with_state(state.clone()))
        .map(move |state: NodeState| {
            let stats = state.db.stats();
            ok_json(&serde_json::json!({
                "status": "healthy",
                "uptime_seconds": start_time.elapsed().as_secs(),
                "database": {
                    "users_count": stats.users_count,
                    "wallets_count": stats.wallets_count,
                    "sessions_count": stats.sessions_count,
                    "transactions_count": stats.transactions_count,
                    "size_on_disk": stats.size_on_disk,
                },
                "version": env!("CARGO_PKG_VERSION"),
                "timestamp": unix_now(),
            }))
        });

    let metrics_route = warp::path("metrics")
        .and(warp::get())
        .and(with_state(state))
        .map(|state: NodeState| {
            state.metrics.refresh_storage(&state.db.stats());
            match state.metrics.export() {
                Ok(output) => warp::reply::with_header(
                    output,
                    "content-type",
                    "text/plain; version=0.0.4",
                ),
                Err(e) => warp::reply::with_header(
                    format!("metrics export failed: {}", e),
                    "content-type",
                    "text/plain",
                ),
            }
        });

    balance_route
        .or(debit_route)
        .or(credit_route)
        .or(rollback_route)
        .or(end_session_route)
        .or(launch_route)
        .or(health_route)
        .or(metrics_route)
}

/// Bind and serve. CASINO_BIND_ALL=1 exposes the API beyond loopback.
pub async fn start_api_server(state: NodeState, port: u16) {
    let bind_addr: [u8; 4] = if std::env::var("CASINO_BIND_ALL").unwrap_or_default() == "1" {
        [0, 0, 0, 0]
    } else {
        [127, 0, 0, 1]
    };
    println!(
        "🎰 Casino wallet API listening on {}:{}",
        std::net::Ipv4Addr::from(bind_addr),
        port
    );
    let routes = casino_routes(state);
    warp::serve(routes).run((bind_addr, port)).await;
}
