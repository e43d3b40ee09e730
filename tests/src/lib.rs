//! # Chain Indexer Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/      # Flows that cross subsystem boundaries
//!     ├── sync_flows.rs      # node → pipeline → store
//!     ├── density_flows.rs   # store + node → density engine
//!     └── rich_list_flows.rs # store + node → balances
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p ix-tests
//!
//! # Benchmarks
//! cargo bench -p ix-tests
//! ```

pub mod integration;
