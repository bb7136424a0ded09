// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CASINO INTEGRATION - NODE CRATE
//
// Casino-side wallet service: sled-backed ledger store, idempotent
// debit/credit engine, rollback engine, session registry, and the warp
// callback surface the Game Provider talks to.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub mod db;
pub mod gate;
pub mod ledger;
pub mod metrics;
pub mod provider_client;
pub mod rollback;
pub mod seed;
pub mod server;
pub mod sessions;
