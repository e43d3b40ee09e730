//! # IX Telemetry
//!
//! Logging and metrics shared by every indexer crate.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ix_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() {
//!     init_telemetry(&TelemetryConfig::from_env()).expect("Failed to init telemetry");
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `IX_LOG_LEVEL` | `info` | Log level filter (`RUST_LOG` also honored) |
//! | `IX_JSON_LOGS` | `false` (`true` in containers) | JSON formatted logs |
//! | `IX_CONSOLE_OUTPUT` | `true` | Emit logs to stderr |
//! | `IX_SERVICE_NAME` | `chain-indexer` | Service name in log fields |

mod config;
mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use logging::init_logging;
pub use metrics::{
    encode_metrics, register_metrics, BLOCKS_INDEXED, BLOCKS_REORGED, DENSITY_QUERIES,
    ENS_UPDATES, GUARDED_DECREMENTS, NODE_RPC_DURATION, NODE_RPC_ERRORS, PRODUCER_FLUSHES, RICH_LIST_UPDATES,
    ROWS_SKIPPED, SYNC_CURSOR_HEIGHT, TRANSACTIONS_INDEXED,
};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    Init(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Register metrics and install the tracing subscriber.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    register_metrics()?;
    init_logging(config)
}
