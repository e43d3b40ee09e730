//! # Chain Store Service - Helper Methods
//!
//! Encoding, decoding and batch planning shared by the `ChainStore` methods.

use std::collections::HashMap;
use std::fmt::Write as _;

use serde::de::DeserializeOwned;
use serde::Serialize;
use shared_types::{Address, Block, BlockHeight, Hash, ProducerAggregate, TransactionRecord, U256};
use tracing::warn;

use super::KvChainStore;
use crate::domain::{keys, StoreError};
use crate::ports::outbound::{BatchOperation, KeyValueStore};

/// Render a key for error messages: the ASCII prefix, then hex.
pub(crate) fn display_key(key: &[u8]) -> String {
    let split = key.len().min(2);
    let mut out = String::from_utf8_lossy(&key[..split]).into_owned();
    for byte in &key[split..] {
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

pub(crate) fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

pub(crate) fn decode<T: DeserializeOwned>(key: &[u8], bytes: &[u8]) -> Result<T, StoreError> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Corrupted {
        key: display_key(key),
        message: e.to_string(),
    })
}

pub(crate) fn encode_height(height: BlockHeight) -> Vec<u8> {
    height.to_be_bytes().to_vec()
}

pub(crate) fn decode_height(key: &[u8], bytes: &[u8]) -> Result<BlockHeight, StoreError> {
    keys::read_u64(bytes, 0)
        .filter(|_| bytes.len() == 8)
        .ok_or_else(|| StoreError::Corrupted {
            key: display_key(key),
            message: format!("expected 8-byte height, found {} bytes", bytes.len()),
        })
}

pub(crate) fn decode_hash(key: &[u8], bytes: &[u8]) -> Result<Hash, StoreError> {
    if bytes.len() != 32 {
        return Err(StoreError::Corrupted {
            key: display_key(key),
            message: format!("expected 32-byte hash, found {} bytes", bytes.len()),
        });
    }
    Ok(Hash::from_slice(bytes))
}

/// Read and decode one value.
pub(crate) fn read<KV: KeyValueStore, T: DeserializeOwned>(
    kv: &KV,
    key: &[u8],
) -> Result<Option<T>, StoreError> {
    match kv.get(key)? {
        Some(bytes) => decode(key, &bytes).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn read_block<KV: KeyValueStore>(
    kv: &KV,
    height: BlockHeight,
) -> Result<Option<Block>, StoreError> {
    read(kv, &keys::block(height))
}

/// `block` has been credited to its producer.
pub(crate) fn is_credited<KV: KeyValueStore>(kv: &KV, block: &Block) -> Result<bool, StoreError> {
    Ok(kv
        .get(&keys::credited(block.number))?
        .is_some_and(|hash| hash == block.hash.as_bytes()))
}

/// Producer aggregates touched by the batch being planned.
pub(crate) type PendingAggregates = HashMap<Address, ProducerAggregate>;

impl<KV: KeyValueStore> KvChainStore<KV> {
    /// Plan removal of `block` with its indices and transactions, and the
    /// guarded decrement of its producer's aggregate.
    ///
    /// The decrement goes into `pending`; the caller writes `pending` out
    /// once the whole batch is planned.
    pub(crate) fn plan_block_removal(
        &self,
        kv: &KV,
        block: &Block,
        ops: &mut Vec<BatchOperation>,
        pending: &mut PendingAggregates,
    ) -> Result<(), StoreError> {
        ops.push(BatchOperation::delete(keys::block(block.number)));
        ops.push(BatchOperation::delete(keys::block_hash(&block.hash)));
        ops.push(BatchOperation::delete(keys::timestamp(
            block.timestamp,
            block.number,
        )));
        ops.push(BatchOperation::delete(keys::credited(block.number)));

        for (index_key, value) in kv.prefix_scan(&keys::block_tx_prefix(&block.hash))? {
            let tx_hash = decode_hash(&index_key, &value)?;
            let tx_key = keys::transaction(&tx_hash);
            // Only drop the record if it still belongs to this block.
            if let Some(record) = read::<KV, TransactionRecord>(kv, &tx_key)? {
                if record.tx.block_hash == block.hash {
                    ops.push(BatchOperation::delete(tx_key));
                }
            }
            ops.push(BatchOperation::delete(index_key));
        }

        let current = match pending.get(&block.producer) {
            Some(aggregate) => Some(aggregate.clone()),
            None => read::<KV, ProducerAggregate>(kv, &keys::producer(&block.producer))?,
        };
        match current {
            Some(mut aggregate) if aggregate.can_absorb(self.reward_unit) => {
                aggregate.produced_blocks -= 1;
                aggregate.block_rewards -= self.reward_unit;
                pending.insert(block.producer, aggregate);
            }
            current => {
                warn!(
                    height = block.number,
                    producer = ?block.producer,
                    produced_blocks = current.as_ref().map(|a| a.produced_blocks).unwrap_or(0),
                    "[ix-02] ⚠️ Producer aggregate cannot absorb a decrement; leaving it unchanged"
                );
                ix_telemetry::GUARDED_DECREMENTS.inc();
            }
        }

        Ok(())
    }

    /// Append the writes for every pending aggregate.
    pub(crate) fn plan_aggregate_writes(
        pending: PendingAggregates,
        ops: &mut Vec<BatchOperation>,
    ) -> Result<(), StoreError> {
        for (address, aggregate) in pending {
            ops.push(BatchOperation::put(keys::producer(&address), encode(&aggregate)?));
        }
        Ok(())
    }
}

/// Add deltas to an aggregate without overflowing.
pub(crate) fn add_to_aggregate(
    mut aggregate: ProducerAggregate,
    block_delta: u64,
    reward_delta: U256,
) -> ProducerAggregate {
    aggregate.produced_blocks = aggregate.produced_blocks.saturating_add(block_delta);
    aggregate.block_rewards = aggregate.block_rewards.saturating_add(reward_delta);
    aggregate
}
