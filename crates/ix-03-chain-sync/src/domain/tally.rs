//! In-memory producer accumulator owned by the aggregation stage.

use std::collections::HashMap;

use shared_types::{Address, BlockHeight, Hash, U256};

/// Blocks and rewards credited to one producer since the last flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credit {
    /// Credited blocks as (height, hash).
    pub blocks: Vec<(BlockHeight, Hash)>,
    pub rewards: U256,
}

/// Producer -> pending credit.
///
/// Flushed with additive upserts, so a partially flushed tally composes
/// with whatever previous runs already wrote.
#[derive(Debug)]
pub struct ProducerTally {
    reward_unit: U256,
    pending: HashMap<Address, Credit>,
}

impl ProducerTally {
    pub fn new(reward_unit: U256) -> Self {
        Self {
            reward_unit,
            pending: HashMap::new(),
        }
    }

    /// Credit the block at `height` to `producer`.
    pub fn record(&mut self, producer: Address, height: BlockHeight, hash: Hash) {
        let credit = self.pending.entry(producer).or_default();
        credit.blocks.push((height, hash));
        credit.rewards = credit.rewards.saturating_add(self.reward_unit);
    }

    /// Distinct producers waiting to be flushed.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Blocks waiting to be flushed, over every producer.
    pub fn pending_blocks(&self) -> usize {
        self.pending.values().map(|c| c.blocks.len()).sum()
    }

    /// Take every pending credit, leaving the tally empty.
    pub fn drain(&mut self) -> Vec<(Address, Credit)> {
        self.pending.drain().collect()
    }

    /// Put back a credit whose flush failed.
    pub fn restore(&mut self, producer: Address, credit: Credit) {
        let entry = self.pending.entry(producer).or_default();
        entry.blocks.extend(credit.blocks);
        entry.rewards = entry.rewards.saturating_add(credit.rewards);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(n: u64) -> Hash {
        Hash::from_low_u64_be(n)
    }

    #[test]
    fn test_record_accumulates_per_producer() {
        let mut tally = ProducerTally::new(U256::from(5));
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        tally.record(a, 1, hash(1));
        tally.record(a, 3, hash(3));
        tally.record(b, 2, hash(2));
        assert_eq!(tally.len(), 2);
        assert_eq!(tally.pending_blocks(), 3);

        let mut drained = tally.drain();
        drained.sort_by_key(|(address, _)| *address);
        assert_eq!(
            drained,
            vec![
                (
                    a,
                    Credit {
                        blocks: vec![(1, hash(1)), (3, hash(3))],
                        rewards: U256::from(10)
                    }
                ),
                (
                    b,
                    Credit {
                        blocks: vec![(2, hash(2))],
                        rewards: U256::from(5)
                    }
                ),
            ]
        );
        assert!(tally.is_empty());
    }

    #[test]
    fn test_restore_merges_with_new_credit() {
        let mut tally = ProducerTally::new(U256::from(5));
        let a = Address::repeat_byte(1);
        tally.record(a, 9, hash(9));
        tally.restore(
            a,
            Credit {
                blocks: vec![(4, hash(4)), (5, hash(5)), (6, hash(6))],
                rewards: U256::from(15),
            },
        );

        let drained = tally.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].1.blocks.len(), 4);
        assert_eq!(drained[0].1.rewards, U256::from(20));
    }
}
