//! Scriptable in-memory node for tests.
//!
//! Generates a chain of sealed, parent-linked blocks with round-robin
//! producers and a configurable number of transactions per block. Supports
//! forking from a height, a name resolver, and per-height/per-hash failure
//! injection.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{
    Address, Block, BlockHeight, DelegateVote, Hash, Receipt, Transaction, TransactionRecord, U256,
};

use crate::domain::{BlockTag, NodeError};
use crate::ports::NodeClient;

#[derive(Default)]
struct MockState {
    blocks: BTreeMap<BlockHeight, Block>,
    txs: HashMap<Hash, TransactionRecord>,
    delegates: Vec<DelegateVote>,
    balances: HashMap<Address, U256>,
    stakes: HashMap<Address, u64>,
    names: HashMap<Hash, Address>,
    failing_heights: HashSet<BlockHeight>,
    failing_txs: HashSet<Hash>,
    failing_accounts: HashSet<Address>,
    failing_names: HashSet<Hash>,
    tip_unavailable: bool,
}

/// In-memory `NodeClient`.
pub struct MockNodeClient {
    state: RwLock<MockState>,
    genesis_timestamp: u64,
    txs_per_block: u64,
    block_calls: AtomicU64,
    tx_calls: AtomicU64,
}

impl MockNodeClient {
    /// Chain of `len` blocks (heights `0..len`), one second apart, produced
    /// round-robin by `delegates`.
    pub fn with_chain(len: u64, delegates: Vec<Address>, txs_per_block: u64) -> Self {
        let client = Self {
            state: RwLock::new(MockState {
                delegates: delegates
                    .iter()
                    .enumerate()
                    .map(|(i, address)| DelegateVote {
                        address: *address,
                        stake: (i as u64 + 1) * 1_000,
                    })
                    .collect(),
                ..Default::default()
            }),
            genesis_timestamp: 1_600_000_000,
            txs_per_block,
            block_calls: AtomicU64::new(0),
            tx_calls: AtomicU64::new(0),
        };
        client.extend(len, 0);
        client
    }

    /// Append `count` blocks on top of the current tip.
    pub fn extend(&self, count: u64, salt: u8) {
        let mut state = self.state.write();
        for _ in 0..count {
            let height = state.blocks.keys().next_back().map(|h| h + 1).unwrap_or(0);
            let parent = height
                .checked_sub(1)
                .and_then(|h| state.blocks.get(&h))
                .map(|b| b.hash)
                .unwrap_or_default();
            self.insert_generated(&mut state, height, parent, salt);
        }
    }

    /// Replace every block from `height` to the tip with a sibling branch.
    ///
    /// The new branch keeps the same heights and timestamps but has
    /// different signatures, hashes and transactions.
    pub fn fork_at(&self, height: BlockHeight, salt: u8) {
        let mut state = self.state.write();
        let tip = match state.blocks.keys().next_back() {
            Some(tip) => *tip,
            None => return,
        };
        let mut parent = height
            .checked_sub(1)
            .and_then(|h| state.blocks.get(&h))
            .map(|b| b.hash)
            .unwrap_or_default();
        for h in height..=tip {
            if let Some(old) = state.blocks.remove(&h) {
                for tx in &old.transactions {
                    state.txs.remove(tx);
                }
            }
            parent = self.insert_generated(&mut state, h, parent, salt);
        }
    }

    /// Drop every block above `height`.
    pub fn truncate(&self, height: BlockHeight) {
        let mut state = self.state.write();
        let removed: Vec<Block> = state
            .blocks
            .split_off(&(height + 1))
            .into_values()
            .collect();
        for block in removed {
            for tx in &block.transactions {
                state.txs.remove(tx);
            }
        }
    }

    fn insert_generated(
        &self,
        state: &mut MockState,
        height: BlockHeight,
        parent_hash: Hash,
        salt: u8,
    ) -> Hash {
        let producer = if state.delegates.is_empty() {
            Address::zero()
        } else {
            state.delegates[(height as usize) % state.delegates.len()].address
        };
        let tx_hashes: Vec<Hash> = (0..self.txs_per_block)
            .map(|i| generated_tx_hash(height, i, salt))
            .collect();
        let block = Block {
            number: height,
            timestamp: self.genesis_timestamp + height,
            parent_hash,
            signature: vec![salt, 0x5a],
            size: 512 + 128 * self.txs_per_block,
            transaction_count: self.txs_per_block,
            gas_used: 21_000 * self.txs_per_block,
            gas_limit: 10_000_000,
            transactions: tx_hashes.clone(),
            delegates: state.delegates.iter().map(|d| d.address).collect(),
            producer,
            ..Default::default()
        }
        .seal();

        for (i, hash) in tx_hashes.into_iter().enumerate() {
            let from = Address::from_low_u64_be(0x1000 + (height % 7));
            let record = TransactionRecord {
                tx: Transaction {
                    hash,
                    nonce: height,
                    block_hash: block.hash,
                    block_number: height,
                    transaction_index: i as u64,
                    from,
                    to: Some(Address::from_low_u64_be(0x2000 + i as u64)),
                    value: U256::from(1_000 + i as u64),
                    gas: 21_000,
                    ..Default::default()
                },
                receipt: Receipt {
                    status: 1,
                    gas_used: 21_000,
                    cumulative_gas_used: 21_000 * (i as u64 + 1),
                    contract_address: None,
                },
            };
            state.txs.insert(hash, record);
        }

        let hash = block.hash;
        state.blocks.insert(height, block);
        hash
    }

    pub fn block(&self, height: BlockHeight) -> Option<Block> {
        self.state.read().blocks.get(&height).cloned()
    }

    pub fn set_balance(&self, address: Address, wei: U256, stake: u64) {
        let mut state = self.state.write();
        state.balances.insert(address, wei);
        state.stakes.insert(address, stake);
    }

    /// Point `name_hash` at `address` in the resolver.
    pub fn set_ens_address(&self, name_hash: Hash, address: Address) {
        self.state.write().names.insert(name_hash, address);
    }

    pub fn fail_ens_name(&self, name_hash: Hash) {
        self.state.write().failing_names.insert(name_hash);
    }

    pub fn fail_block(&self, height: BlockHeight) {
        self.state.write().failing_heights.insert(height);
    }

    pub fn fail_transaction(&self, hash: Hash) {
        self.state.write().failing_txs.insert(hash);
    }

    pub fn fail_account(&self, address: Address) {
        self.state.write().failing_accounts.insert(address);
    }

    pub fn set_tip_unavailable(&self, unavailable: bool) {
        self.state.write().tip_unavailable = unavailable;
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.write();
        state.failing_heights.clear();
        state.failing_txs.clear();
        state.failing_accounts.clear();
        state.failing_names.clear();
        state.tip_unavailable = false;
    }

    pub fn block_calls(&self) -> u64 {
        self.block_calls.load(Ordering::Relaxed)
    }

    pub fn transaction_calls(&self) -> u64 {
        self.tx_calls.load(Ordering::Relaxed)
    }
}

/// Deterministic transaction hash for a generated block.
pub fn generated_tx_hash(height: BlockHeight, index: u64, salt: u8) -> Hash {
    let mut bytes = [0u8; 32];
    bytes[0] = 0x7a;
    bytes[1] = salt;
    bytes[8..16].copy_from_slice(&height.to_be_bytes());
    bytes[16..24].copy_from_slice(&index.to_be_bytes());
    Hash::from(bytes)
}

fn unavailable(what: String) -> NodeError {
    NodeError::Connection(format!("mock node refused {}", what))
}

#[async_trait]
impl NodeClient for MockNodeClient {
    async fn tip_height(&self) -> Result<BlockHeight, NodeError> {
        let state = self.state.read();
        if state.tip_unavailable {
            return Err(unavailable("eth_blockNumber".to_string()));
        }
        state
            .blocks
            .keys()
            .next_back()
            .copied()
            .ok_or_else(|| NodeError::NotFound("head block".to_string()))
    }

    async fn get_block(&self, height: BlockHeight) -> Result<Block, NodeError> {
        self.block_calls.fetch_add(1, Ordering::Relaxed);
        let state = self.state.read();
        if state.failing_heights.contains(&height) {
            return Err(unavailable(format!("block {}", height)));
        }
        state
            .blocks
            .get(&height)
            .cloned()
            .ok_or_else(|| NodeError::NotFound(format!("block {}", height)))
    }

    async fn get_transaction(&self, hash: Hash) -> Result<Transaction, NodeError> {
        self.tx_calls.fetch_add(1, Ordering::Relaxed);
        let state = self.state.read();
        if state.failing_txs.contains(&hash) {
            return Err(unavailable(format!("transaction {:?}", hash)));
        }
        state
            .txs
            .get(&hash)
            .map(|record| {
                let mut tx = record.tx.clone();
                tx.timestamp = 0;
                tx
            })
            .ok_or_else(|| NodeError::NotFound(format!("transaction {:?}", hash)))
    }

    async fn get_receipt(&self, hash: Hash) -> Result<Receipt, NodeError> {
        let state = self.state.read();
        if state.failing_txs.contains(&hash) {
            return Err(unavailable(format!("receipt {:?}", hash)));
        }
        state
            .txs
            .get(&hash)
            .map(|record| record.receipt.clone())
            .ok_or_else(|| NodeError::NotFound(format!("receipt {:?}", hash)))
    }

    async fn get_delegate_votes(&self, _at: BlockTag) -> Result<Vec<DelegateVote>, NodeError> {
        Ok(self.state.read().delegates.clone())
    }

    async fn get_balance(&self, address: Address) -> Result<U256, NodeError> {
        let state = self.state.read();
        if state.failing_accounts.contains(&address) {
            return Err(unavailable(format!("balance of {:?}", address)));
        }
        Ok(state.balances.get(&address).copied().unwrap_or_default())
    }

    async fn get_stake(&self, address: Address) -> Result<u64, NodeError> {
        let state = self.state.read();
        if state.failing_accounts.contains(&address) {
            return Err(unavailable(format!("stake of {:?}", address)));
        }
        Ok(state.stakes.get(&address).copied().unwrap_or_default())
    }

    async fn ens_address(&self, _contract: Address, name_hash: Hash) -> Result<Address, NodeError> {
        let state = self.state.read();
        if state.failing_names.contains(&name_hash) {
            return Err(unavailable(format!("resolver entry {:?}", name_hash)));
        }
        Ok(state.names.get(&name_hash).copied().unwrap_or_default())
    }
}
