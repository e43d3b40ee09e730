//! Prometheus metrics for the indexer subsystems.
//!
//! All metrics follow the naming convention: `ix_<subsystem>_<metric>_<unit>`
//!
//! ## Metric Types
//!
//! - **Counter**: Monotonically increasing value (e.g., blocks_indexed_total)
//! - **Gauge**: Value that can go up or down (e.g., sync_cursor_height)
//! - **Histogram**: Distribution of values (e.g., rpc_duration_seconds)

use lazy_static::lazy_static;
use prometheus::{
    exponential_buckets, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    Opts, Registry, TextEncoder,
};

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // NODE CLIENT METRICS (Subsystem 1)
    // =========================================================================

    /// Failed node RPC calls by method
    pub static ref NODE_RPC_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("ix_node_rpc_errors_total", "Failed JSON-RPC calls to the node"),
        &["method"]
    ).expect("metric creation failed");

    /// Node RPC latency by method
    pub static ref NODE_RPC_DURATION: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "ix_node_rpc_duration_seconds",
            "Time spent waiting on node JSON-RPC calls"
        ).buckets(exponential_buckets(0.0005, 2.0, 16).expect("valid buckets")),
        &["method"]
    ).expect("metric creation failed");

    // =========================================================================
    // CHAIN STORE METRICS (Subsystem 2)
    // =========================================================================

    /// Rows rejected inside otherwise successful batches, by table
    pub static ref ROWS_SKIPPED: IntCounterVec = IntCounterVec::new(
        Opts::new("ix_store_rows_skipped_total", "Rows skipped during batch upserts"),
        &["table"]
    ).expect("metric creation failed");

    /// Producer decrements refused because the aggregate could not absorb them
    pub static ref GUARDED_DECREMENTS: IntCounter = IntCounter::new(
        "ix_store_guarded_decrements_total",
        "Producer aggregate decrements skipped to keep counts non-negative"
    ).expect("metric creation failed");

    // =========================================================================
    // SYNC METRICS (Subsystem 3)
    // =========================================================================

    /// Blocks newly written or replaced
    pub static ref BLOCKS_INDEXED: IntCounter = IntCounter::new(
        "ix_sync_blocks_indexed_total",
        "Blocks written to the chain store"
    ).expect("metric creation failed");

    /// Transactions written
    pub static ref TRANSACTIONS_INDEXED: IntCounter = IntCounter::new(
        "ix_sync_transactions_indexed_total",
        "Transactions written to the chain store"
    ).expect("metric creation failed");

    /// Blocks removed by reorg repair
    pub static ref BLOCKS_REORGED: IntCounter = IntCounter::new(
        "ix_sync_blocks_reorged_total",
        "Stale blocks deleted by reorg repair"
    ).expect("metric creation failed");

    /// Producer aggregate flushes
    pub static ref PRODUCER_FLUSHES: IntCounter = IntCounter::new(
        "ix_sync_producer_flushes_total",
        "Producer aggregate rows flushed to the chain store"
    ).expect("metric creation failed");

    /// Current sync cursor
    pub static ref SYNC_CURSOR_HEIGHT: IntGauge = IntGauge::new(
        "ix_sync_cursor_height",
        "Highest height fully and canonically committed"
    ).expect("metric creation failed");

    /// Balances refreshed by the rich-list job
    pub static ref RICH_LIST_UPDATES: IntCounter = IntCounter::new(
        "ix_sync_rich_list_updates_total",
        "Balance rows refreshed by the rich-list job"
    ).expect("metric creation failed");

    /// Name entries re-pointed by the ENS sync job
    pub static ref ENS_UPDATES: IntCounter = IntCounter::new(
        "ix_sync_ens_updates_total",
        "Registered names whose resolved address changed"
    ).expect("metric creation failed");

    // =========================================================================
    // DENSITY METRICS (Subsystem 4)
    // =========================================================================

    /// Density queries by outcome
    pub static ref DENSITY_QUERIES: IntCounterVec = IntCounterVec::new(
        Opts::new("ix_density_queries_total", "Delegate density queries"),
        &["outcome"]  // found / not_in_rotation / no_blocks / error
    ).expect("metric creation failed");
}

/// Register all metrics with the global registry.
///
/// Safe to call more than once: already-registered collectors are ignored.
pub fn register_metrics() -> Result<(), TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        // Node client
        Box::new(NODE_RPC_ERRORS.clone()),
        Box::new(NODE_RPC_DURATION.clone()),
        // Store
        Box::new(ROWS_SKIPPED.clone()),
        Box::new(GUARDED_DECREMENTS.clone()),
        // Sync
        Box::new(BLOCKS_INDEXED.clone()),
        Box::new(TRANSACTIONS_INDEXED.clone()),
        Box::new(BLOCKS_REORGED.clone()),
        Box::new(PRODUCER_FLUSHES.clone()),
        Box::new(SYNC_CURSOR_HEIGHT.clone()),
        Box::new(RICH_LIST_UPDATES.clone()),
        Box::new(ENS_UPDATES.clone()),
        // Density
        Box::new(DENSITY_QUERIES.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(())
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}
