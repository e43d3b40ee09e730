//! Round-robin producer schedule.
//!
//! ```text
//! slot = t / period
//! turn = (slot / turn_block_count) % delegate_count
//! ```
//!
//! A delegate keeps its seat for `turn_block_count` consecutive slots.

use shared_types::{Address, Timestamp};

use crate::config::DposConfig;

/// Delegate scheduled to produce the block at `timestamp`.
///
/// `None` when the rotation is undefined (a zero parameter) or the turn
/// points past the end of `delegates`.
pub fn scheduled_producer(
    delegates: &[Address],
    timestamp: Timestamp,
    dpos: &DposConfig,
) -> Option<Address> {
    if !dpos.is_defined() {
        return None;
    }
    let slot = timestamp / dpos.period;
    let turn = (slot / dpos.turn_block_count) % dpos.delegate_count;
    usize::try_from(turn)
        .ok()
        .and_then(|turn| delegates.get(turn))
        .copied()
}
