//! Windowed density over the producer schedule.
//!
//! The walk runs backward one second at a time from the latest block's
//! timestamp for the longest window. Counters are never reset: each time the
//! walk reaches a window boundary the running totals are snapshotted, so a
//! longer window's record always covers the shorter ones.

use std::collections::HashMap;

use serde::Serialize;
use shared_types::{Address, Timestamp};

use super::rotation::scheduled_producer;
use crate::config::DposConfig;

/// One delegate over one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DelegateStat {
    pub address: Address,
    pub seconds_examined: u64,
    pub missed_blocks: u64,
    pub total_blocks: u64,
    /// `1 - missed / total`, or 0 when nothing was scheduled.
    pub density: f64,
    /// Live stake at the latest block; 0 when the node does not report one.
    pub stake: u64,
}

/// Density of every delegate in the rotation (or of one, when filtered).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DensityReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// The longest requested window, even when the chain is younger.
    pub total_seconds_examined: u64,
    pub total_missed_blocks: u64,
    /// One entry per delegate in rotation order, one record per window.
    pub delegates: Vec<Vec<DelegateStat>>,
}

impl DensityReport {
    /// Records of `address`, ascending by window.
    pub fn stats_for(&self, address: &Address) -> Option<&[DelegateStat]> {
        self.delegates
            .iter()
            .find(|records| records.first().map(|r| &r.address) == Some(address))
            .map(Vec::as_slice)
    }
}

/// Result of a density query.
#[derive(Debug, Clone, PartialEq)]
pub enum DensityLookup {
    Found(DensityReport),
    /// The requested address is not in the latest block's rotation.
    NotInRotation(Address),
    /// The store holds no blocks yet.
    NoBlocks,
}

/// Everything the walk reads. Blocks are keyed by timestamp.
#[derive(Debug, Clone, Copy)]
pub struct DensityInput<'a> {
    /// Rotation in effect at the latest block.
    pub delegates: &'a [Address],
    pub produced: &'a HashMap<Timestamp, Address>,
    pub latest_timestamp: Timestamp,
    pub stakes: &'a HashMap<Address, u64>,
    pub filter: Option<Address>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    missed: u64,
    total: u64,
}

impl Tally {
    fn density(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            1.0 - self.missed as f64 / self.total as f64
        }
    }
}

/// Walk the schedule backward and bucket per-delegate statistics at each
/// boundary of `windows`.
///
/// `windows` must be non-empty, ascending and free of zeros (see
/// [`normalize_windows`](crate::config::normalize_windows)). Seconds with
/// no scheduled producer are not counted for anyone.
pub fn compute_density(
    input: &DensityInput<'_>,
    windows: &[u64],
    dpos: &DposConfig,
) -> DensityReport {
    let longest = windows.last().copied().unwrap_or(0);

    let mut order: Vec<Address> = Vec::with_capacity(input.delegates.len());
    for delegate in input.delegates {
        let wanted = input.filter.map_or(true, |f| f == *delegate);
        if wanted && !order.contains(delegate) {
            order.push(*delegate);
        }
    }
    let slots: HashMap<Address, usize> = order.iter().enumerate().map(|(i, a)| (*a, i)).collect();
    let mut tallies = vec![Tally::default(); order.len()];
    let mut records: Vec<Vec<DelegateStat>> = vec![Vec::with_capacity(windows.len()); order.len()];

    let snapshot = |tallies: &[Tally], records: &mut [Vec<DelegateStat>], examined: u64| {
        for ((address, tally), out) in order.iter().zip(tallies).zip(records.iter_mut()) {
            out.push(DelegateStat {
                address: *address,
                seconds_examined: examined,
                missed_blocks: tally.missed,
                total_blocks: tally.total,
                density: tally.density(),
                stake: input.stakes.get(address).copied().unwrap_or(0),
            });
        }
    };

    let mut boundaries = windows.iter().copied().peekable();
    let mut examined = 0u64;
    let mut total_missed = 0u64;

    for offset in 0..longest {
        let Some(t) = input.latest_timestamp.checked_sub(offset) else {
            break;
        };
        examined = offset + 1;

        if let Some(slot) = scheduled_producer(input.delegates, t, dpos).and_then(|p| slots.get(&p)) {
            let tally = &mut tallies[*slot];
            tally.total += 1;
            if input.produced.get(&t) != Some(&order[*slot]) {
                tally.missed += 1;
                total_missed += 1;
            }
        }

        while boundaries.peek() == Some(&examined) {
            snapshot(&tallies, &mut records, examined);
            boundaries.next();
        }
    }
    // Chain younger than the longest window: remaining windows see it all.
    for _ in boundaries {
        snapshot(&tallies, &mut records, examined);
    }

    DensityReport {
        address: input.filter,
        total_seconds_examined: longest,
        total_missed_blocks: total_missed,
        delegates: records,
    }
}
