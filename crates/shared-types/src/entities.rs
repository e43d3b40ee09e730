//! # Core Domain Entities
//!
//! Chain entities as the indexer sees them once they leave the node client.
//!
//! ## Clusters
//!
//! - **Chain**: `Block`, `Transaction`, `Receipt`, `TransactionRecord`
//! - **Bookkeeping**: `ProducerAggregate`, `BalanceEntry`
//! - **Delegation**: `DelegateVote`
//! - **Naming**: `EnsEntry`

use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

pub use primitive_types::{H160, H256, U256};

use crate::encoding::hex_bytes;

/// A 20-byte account address.
pub type Address = H160;

/// A 32-byte block or transaction hash.
pub type Hash = H256;

/// Block height.
pub type BlockHeight = u64;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Per-block producer reward: 3171 * 10^14 wei.
pub const DEFAULT_BLOCK_REWARD_WEI: U256 = U256([317_100_000_000_000_000, 0, 0, 0]);

/// Wei per unit of the 4-decimal fixed point used for balances and stake.
pub const WEI_PER_BALANCE_UNIT: u64 = 100_000_000_000_000;

// =============================================================================
// CLUSTER A: THE CHAIN
// =============================================================================

/// An immutable block snapshot as returned by the node.
///
/// `hash` is a pure function of the remaining fields. Two stored blocks are
/// chain-connected when the child's `parent_hash` equals the parent's `hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Height in the chain.
    pub number: BlockHeight,
    /// Block timestamp (seconds).
    pub timestamp: Timestamp,
    /// Content hash.
    pub hash: Hash,
    /// Hash of the block at `number - 1`.
    pub parent_hash: Hash,
    /// Producer signature blob.
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
    pub transactions_root: Hash,
    pub receipts_root: Hash,
    /// Encoded size in bytes.
    pub size: u64,
    pub transaction_count: u64,
    pub gas_used: u64,
    pub gas_limit: u64,
    /// Ordered transaction hashes.
    pub transactions: Vec<Hash>,
    /// Validator rotation in effect at this height.
    pub delegates: Vec<Address>,
    /// Validator that actually signed the block.
    pub producer: Address,
}

impl Block {
    /// Keccak-256 over every field except `hash`.
    pub fn compute_hash(&self) -> Hash {
        let mut hasher = Keccak256::new();
        hasher.update(self.number.to_be_bytes());
        hasher.update(self.timestamp.to_be_bytes());
        hasher.update(self.parent_hash.as_bytes());
        hasher.update(&self.signature);
        hasher.update(self.transactions_root.as_bytes());
        hasher.update(self.receipts_root.as_bytes());
        hasher.update(self.size.to_be_bytes());
        hasher.update(self.transaction_count.to_be_bytes());
        hasher.update(self.gas_used.to_be_bytes());
        hasher.update(self.gas_limit.to_be_bytes());
        for tx in &self.transactions {
            hasher.update(tx.as_bytes());
        }
        for delegate in &self.delegates {
            hasher.update(delegate.as_bytes());
        }
        hasher.update(self.producer.as_bytes());
        H256::from_slice(&hasher.finalize())
    }

    /// Recompute and store the content hash.
    pub fn seal(mut self) -> Self {
        self.hash = self.compute_hash();
        self
    }

    /// Whether `self` directly extends `parent`.
    pub fn is_child_of(&self, parent: &Block) -> bool {
        self.number == parent.number + 1 && self.parent_hash == parent.hash
    }
}

/// A transaction as stored by the indexer.
///
/// `timestamp` is inherited from the containing block; the node's own
/// transaction object does not carry it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub hash: Hash,
    pub nonce: u64,
    pub block_hash: Hash,
    pub block_number: BlockHeight,
    pub transaction_index: u64,
    pub from: Address,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub value: U256,
    pub gas: u64,
    pub gas_price: u64,
    /// Proof-of-work nonce attached by the sender.
    pub work_nonce: u64,
    #[serde(with = "hex_bytes")]
    pub input: Vec<u8>,
    pub timestamp: Timestamp,
}

/// Execution receipt for a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// 1 on success, 0 on failure.
    pub status: u64,
    pub gas_used: u64,
    pub cumulative_gas_used: u64,
    pub contract_address: Option<Address>,
}

/// Transaction together with its receipt. The unit the sync pipeline persists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TransactionRecord {
    pub tx: Transaction,
    pub receipt: Receipt,
}

impl TransactionRecord {
    pub fn hash(&self) -> Hash {
        self.tx.hash
    }

    /// Addresses touched by the transaction (sender, then recipient if any).
    pub fn parties(&self) -> impl Iterator<Item = Address> + '_ {
        std::iter::once(self.tx.from).chain(self.tx.to)
    }
}

// =============================================================================
// CLUSTER B: BOOKKEEPING
// =============================================================================

/// Cumulative production statistics for one validator.
///
/// Never negative: decrements that would underflow are refused by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProducerAggregate {
    pub address: Address,
    pub produced_blocks: u64,
    pub block_rewards: U256,
}

impl ProducerAggregate {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            ..Default::default()
        }
    }

    /// Whether one block worth `reward_unit` can be removed without underflow.
    pub fn can_absorb(&self, reward_unit: U256) -> bool {
        self.produced_blocks >= 1 && self.block_rewards >= reward_unit
    }
}

/// Rich-list row: balances in 4-decimal fixed point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BalanceEntry {
    pub address: Address,
    pub liquid: u64,
    pub staked: u64,
    /// Last block in which the address was seen.
    pub block_number: BlockHeight,
}

impl BalanceEntry {
    pub fn total(&self) -> u64 {
        self.liquid.saturating_add(self.staked)
    }
}

// =============================================================================
// CLUSTER C: DELEGATION
// =============================================================================

/// Live stake snapshot for one delegate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct DelegateVote {
    pub address: Address,
    pub stake: u64,
}

// =============================================================================
// CLUSTER D: NAMING
// =============================================================================

/// A registered name and the address it last resolved to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct EnsEntry {
    pub name: String,
    /// `namehash(name)`.
    pub hash: Hash,
    pub address: Address,
}

impl EnsEntry {
    pub fn new(name: impl Into<String>, address: Address) -> Self {
        let name = name.into();
        Self {
            hash: namehash(&name),
            name,
            address,
        }
    }
}

/// Recursive Keccak-256 name hash: labels are folded right to left into a
/// zero root. The empty name hashes to zero.
pub fn namehash(name: &str) -> Hash {
    let mut node = [0u8; 32];
    for label in name.rsplit('.').filter(|label| !label.is_empty()) {
        let label_hash = Keccak256::digest(label.as_bytes());
        let mut hasher = Keccak256::new();
        hasher.update(node);
        hasher.update(label_hash);
        node.copy_from_slice(&hasher.finalize());
    }
    Hash::from(node)
}

/// Which side of a timestamp a block lookup should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampCondition {
    /// `timestamp < t`, newest first.
    Before(Timestamp),
    /// `timestamp >= t`, oldest first.
    AtOrAfter(Timestamp),
    /// `from <= timestamp <= to`, oldest first.
    Between { from: Timestamp, to: Timestamp },
}

impl TimestampCondition {
    pub fn matches(&self, ts: Timestamp) -> bool {
        match *self {
            TimestampCondition::Before(t) => ts < t,
            TimestampCondition::AtOrAfter(t) => ts >= t,
            TimestampCondition::Between { from, to } => from <= ts && ts <= to,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Block {
        Block {
            number: 7,
            timestamp: 1_600_000_007,
            parent_hash: H256::repeat_byte(0x06),
            producer: H160::repeat_byte(0xAA),
            delegates: vec![H160::repeat_byte(0xAA), H160::repeat_byte(0xBB)],
            ..Default::default()
        }
        .seal()
    }

    #[test]
    fn test_hash_is_pure_function_of_fields() {
        let a = sample_block();
        let b = sample_block();
        assert_eq!(a.hash, b.hash);
        assert_ne!(a.hash, H256::zero());

        let mut c = sample_block();
        c.producer = H160::repeat_byte(0xBB);
        assert_ne!(c.compute_hash(), a.hash);
    }

    #[test]
    fn test_is_child_of() {
        let parent = sample_block();
        let child = Block {
            number: 8,
            parent_hash: parent.hash,
            ..Default::default()
        }
        .seal();
        assert!(child.is_child_of(&parent));
        assert!(!parent.is_child_of(&child));
    }

    #[test]
    fn test_reward_constants() {
        let precision = U256::from(WEI_PER_BALANCE_UNIT);
        assert_eq!(precision, U256::from(10u64).pow(U256::from(14u64)));
        assert_eq!(DEFAULT_BLOCK_REWARD_WEI, U256::from(3171u64) * precision);
    }

    #[test]
    fn test_aggregate_can_absorb() {
        let unit = U256::from(10);
        let mut agg = ProducerAggregate::new(H160::repeat_byte(1));
        assert!(!agg.can_absorb(unit));

        agg.produced_blocks = 1;
        agg.block_rewards = U256::from(9);
        assert!(!agg.can_absorb(unit));

        agg.block_rewards = unit;
        assert!(agg.can_absorb(unit));
    }

    #[test]
    fn test_timestamp_condition() {
        assert!(TimestampCondition::Before(10).matches(9));
        assert!(!TimestampCondition::Before(10).matches(10));
        assert!(TimestampCondition::AtOrAfter(10).matches(10));
        let between = TimestampCondition::Between { from: 5, to: 6 };
        assert!(between.matches(5) && between.matches(6));
        assert!(!between.matches(7));
    }

    #[test]
    fn test_transaction_parties() {
        let record = TransactionRecord {
            tx: Transaction {
                from: H160::repeat_byte(1),
                to: Some(H160::repeat_byte(2)),
                ..Default::default()
            },
            receipt: Receipt::default(),
        };
        let parties: Vec<_> = record.parties().collect();
        assert_eq!(parties, vec![H160::repeat_byte(1), H160::repeat_byte(2)]);
    }

    #[test]
    fn test_block_survives_bincode() {
        let block = sample_block();
        let bytes = bincode::serialize(&block).unwrap();
        let decoded: Block = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, block);
    }

    #[test]
    fn test_block_json_uses_camel_case_and_hex() {
        let mut block = sample_block();
        block.signature = vec![0xde, 0xad];
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["signature"], "0xdead");
        assert!(json.get("parentHash").is_some());
    }

    #[test]
    fn test_namehash_known_values() {
        assert_eq!(namehash(""), Hash::zero());
        assert_eq!(
            format!("{:?}", namehash("eth")),
            "0x93cdeb708b7545dc668eb9280176169d1c33cfd8ed6f04690a0bcc88a93fc4ae"
        );
        assert_eq!(
            format!("{:?}", namehash("foo.eth")),
            "0xde9b09fd7c5f901e23a3f19fecc54828e9c848539801e86591bd9801b019f84f"
        );
    }

    #[test]
    fn test_ens_entry_hashes_its_name() {
        let entry = EnsEntry::new("alice.ebakus", H160::repeat_byte(1));
        assert_eq!(entry.hash, namehash("alice.ebakus"));
        assert_ne!(entry.hash, namehash("bob.ebakus"));
    }
}
