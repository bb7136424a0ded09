// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CASINO INTEGRATION - METRICS MODULE
//
// Prometheus-compatible metrics for production monitoring.
// Exposes counters, gauges, and a latency histogram via /metrics.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use prometheus::{
    Encoder, Gauge, Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use crate::db::DatabaseStats;

pub struct CasinoMetrics {
    registry: Registry,

    // API metrics
    pub api_requests_total: IntCounter,
    pub api_errors_total: IntCounter,
    pub api_request_duration_seconds: Histogram,

    // Ledger metrics
    pub debits_total: IntCounter,
    pub credits_total: IntCounter,
    pub rollbacks_total: IntCounter,
    pub tombstones_total: IntCounter,
    pub duplicate_replays_total: IntCounter,
    pub insufficient_funds_total: IntCounter,

    // Gate metrics
    pub signature_failures_total: IntCounter,

    // Session metrics
    pub sessions_launched_total: IntCounter,
    pub sessions_ended_total: IntCounter,

    // Storage metrics
    pub wallets_total: IntGauge,
    pub transactions_total: IntGauge,
    pub db_size_bytes: Gauge,
}

impl CasinoMetrics {
    pub fn new() -> Result<Arc<Self>, Box<dyn std::error::Error>> {
        let registry = Registry::new();

        let api_requests_total = IntCounter::with_opts(Opts::new(
            "casino_api_requests_total",
            "Total callback and launch requests received",
        ))?;
        registry.register(Box::new(api_requests_total.clone()))?;

        let api_errors_total = IntCounter::with_opts(Opts::new(
            "casino_api_errors_total",
            "Total requests answered with an error body",
        ))?;
        registry.register(Box::new(api_errors_total.clone()))?;

        let api_request_duration_seconds = Histogram::with_opts(HistogramOpts::new(
            "casino_api_request_duration_seconds",
            "Request handling latency",
        ))?;
        registry.register(Box::new(api_request_duration_seconds.clone()))?;

        let debits_total = IntCounter::with_opts(Opts::new(
            "casino_debits_total",
            "Committed debit entries",
        ))?;
        registry.register(Box::new(debits_total.clone()))?;

        let credits_total = IntCounter::with_opts(Opts::new(
            "casino_credits_total",
            "Committed credit entries",
        ))?;
        registry.register(Box::new(credits_total.clone()))?;

        let rollbacks_total = IntCounter::with_opts(Opts::new(
            "casino_rollbacks_total",
            "Committed rollback entries, markers and tombstones included",
        ))?;
        registry.register(Box::new(rollbacks_total.clone()))?;

        let tombstones_total = IntCounter::with_opts(Opts::new(
            "casino_tombstones_total",
            "Rollback tombstones recorded for unknown originals",
        ))?;
        registry.register(Box::new(tombstones_total.clone()))?;

        let duplicate_replays_total = IntCounter::with_opts(Opts::new(
            "casino_duplicate_replays_total",
            "Requests answered from response_cache",
        ))?;
        registry.register(Box::new(duplicate_replays_total.clone()))?;

        let insufficient_funds_total = IntCounter::with_opts(Opts::new(
            "casino_insufficient_funds_total",
            "Debits rejected for insufficient playable balance",
        ))?;
        registry.register(Box::new(insufficient_funds_total.clone()))?;

        let signature_failures_total = IntCounter::with_opts(Opts::new(
            "casino_signature_failures_total",
            "Callbacks rejected by the signature gate",
        ))?;
        registry.register(Box::new(signature_failures_total.clone()))?;

        let sessions_launched_total = IntCounter::with_opts(Opts::new(
            "casino_sessions_launched_total",
            "Game sessions created",
        ))?;
        registry.register(Box::new(sessions_launched_total.clone()))?;

        let sessions_ended_total = IntCounter::with_opts(Opts::new(
            "casino_sessions_ended_total",
            "Game sessions explicitly ended",
        ))?;
        registry.register(Box::new(sessions_ended_total.clone()))?;

        let wallets_total = IntGauge::with_opts(Opts::new(
            "casino_wallets_total",
            "Wallet rows in the store",
        ))?;
        registry.register(Box::new(wallets_total.clone()))?;

        let transactions_total = IntGauge::with_opts(Opts::new(
            "casino_transactions_total",
            "Ledger entries in the store",
        ))?;
        registry.register(Box::new(transactions_total.clone()))?;

        let db_size_bytes = Gauge::with_opts(Opts::new(
            "casino_db_size_bytes",
            "Database size on disk",
        ))?;
        registry.register(Box::new(db_size_bytes.clone()))?;

        Ok(Arc::new(CasinoMetrics {
            registry,
            api_requests_total,
            api_errors_total,
            api_request_duration_seconds,
            debits_total,
            credits_total,
            rollbacks_total,
            tombstones_total,
            duplicate_replays_total,
            insufficient_funds_total,
            signature_failures_total,
            sessions_launched_total,
            sessions_ended_total,
            wallets_total,
            transactions_total,
            db_size_bytes,
        }))
    }

    /// Refresh storage gauges from the store's current counts.
    pub fn refresh_storage(&self, stats: &DatabaseStats) {
        self.wallets_total.set(stats.wallets_count as i64);
        self.transactions_total.set(stats.transactions_count as i64);
        self.db_size_bytes.set(stats.size_on_disk as f64);
    }

    /// Render the registry in the Prometheus text format.
    pub fn export(&self) -> Result<String, Box<dyn std::error::Error>> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
