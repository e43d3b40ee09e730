//! Domain layer: errors, run reports, the cursor rule and the producer tally.

pub mod errors;
pub mod report;
pub mod tally;

pub use errors::SyncError;
pub use report::{next_cursor, EnsSyncReport, RepairOutcome, RichListReport, SyncReport};
pub use tally::{Credit, ProducerTally};
