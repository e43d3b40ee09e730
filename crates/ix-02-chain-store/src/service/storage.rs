//! # ChainStore Implementation

use std::collections::HashMap;

use shared_types::{
    Address, BalanceEntry, Block, BlockHeight, EnsEntry, Hash, ProducerAggregate,
    TimestampCondition, TransactionRecord, U256,
};
use tracing::{debug, info, warn};

use super::helpers::{
    add_to_aggregate, decode, decode_hash, decode_height, encode, encode_height, is_credited,
    read, read_block, PendingAggregates,
};
use super::KvChainStore;
use crate::domain::{
    keys, BlockUpsertOutcome, CommittedBlock, SkipReason, StoreError, TxUpsertOutcome,
};
use crate::ports::inbound::ChainStore;
use crate::ports::outbound::{BatchOperation, KeyValueStore};

impl<KV: KeyValueStore> KvChainStore<KV> {
    /// Load the blocks referenced by `t/` index entries, in the given order.
    fn blocks_from_timestamp_index(
        kv: &KV,
        entries: impl Iterator<Item = Vec<u8>>,
        producer: Option<Address>,
        limit: Option<usize>,
    ) -> Result<Vec<Block>, StoreError> {
        let limit = limit.unwrap_or(usize::MAX);
        let mut blocks = Vec::new();
        for key in entries {
            if blocks.len() >= limit {
                break;
            }
            let Some(height) = keys::height_from_timestamp_key(&key) else {
                continue;
            };
            if let Some(block) = read_block(kv, height)? {
                if producer.map_or(true, |p| block.producer == p) {
                    blocks.push(block);
                }
            }
        }
        Ok(blocks)
    }

    fn all_balances(kv: &KV) -> Result<Vec<BalanceEntry>, StoreError> {
        kv.prefix_scan(keys::BALANCE)?
            .into_iter()
            .map(|(key, value)| decode(&key, &value))
            .collect()
    }
}

/// Exclusive end of the `t/` range covering timestamps `<= ts`.
fn timestamp_ceiling(ts: u64) -> Vec<u8> {
    match ts.checked_add(1) {
        Some(next) => keys::timestamp_floor(next),
        None => keys::prefix_end(keys::TIMESTAMP).unwrap_or_default(),
    }
}

impl<KV: KeyValueStore> ChainStore for KvChainStore<KV> {
    fn get_cursor(&self, name: &str) -> Result<Option<BlockHeight>, StoreError> {
        let key = keys::cursor(name);
        match self.kv_store.read().get(&key)? {
            Some(bytes) => decode_height(&key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    fn set_cursor(&self, name: &str, height: BlockHeight) -> Result<(), StoreError> {
        self.kv_store
            .write()
            .put(&keys::cursor(name), &encode_height(height))?;
        debug!("[ix-02] Cursor {} set to {}", name, height);
        Ok(())
    }

    fn clear_cursor(&self, name: &str) -> Result<(), StoreError> {
        self.kv_store.write().delete(&keys::cursor(name))?;
        debug!("[ix-02] Cursor {} cleared", name);
        Ok(())
    }

    fn latest_height(&self) -> Result<Option<BlockHeight>, StoreError> {
        let last = self.kv_store.read().last_with_prefix(keys::BLOCK)?;
        Ok(last.and_then(|(key, _)| keys::height_from_block_key(&key)))
    }

    fn upsert_blocks(&self, blocks: &[Block]) -> Result<BlockUpsertOutcome, StoreError> {
        let mut kv = self.kv_store.write();
        let mut outcome = BlockUpsertOutcome::default();
        let mut ops = Vec::new();
        let mut pending = PendingAggregates::new();

        let mut last_row: HashMap<BlockHeight, usize> = HashMap::new();
        for (row, block) in blocks.iter().enumerate() {
            last_row.insert(block.number, row);
        }

        for (row, block) in blocks.iter().enumerate() {
            if last_row.get(&block.number) != Some(&row) {
                outcome
                    .skipped
                    .push((block.number, SkipReason::SupersededInBatch));
                continue;
            }
            if block.hash.is_zero() {
                warn!(height = block.number, "[ix-02] Skipping block with zero hash");
                outcome.skipped.push((block.number, SkipReason::ZeroHash));
                continue;
            }

            let replaced = match read_block(&*kv, block.number)? {
                Some(existing) if existing.hash == block.hash => {
                    outcome.unchanged += 1;
                    if !is_credited(&*kv, block)? {
                        outcome.uncredited.push(CommittedBlock {
                            height: block.number,
                            hash: block.hash,
                            producer: block.producer,
                            replaced: false,
                        });
                    }
                    continue;
                }
                Some(existing) => {
                    info!(
                        height = block.number,
                        old = ?existing.hash,
                        new = ?block.hash,
                        "[ix-02] 🔁 Replacing block"
                    );
                    self.plan_block_removal(&*kv, &existing, &mut ops, &mut pending)?;
                    true
                }
                None => false,
            };

            ops.push(BatchOperation::put(keys::block(block.number), encode(block)?));
            ops.push(BatchOperation::put(
                keys::block_hash(&block.hash),
                encode_height(block.number),
            ));
            ops.push(BatchOperation::put(
                keys::timestamp(block.timestamp, block.number),
                Vec::new(),
            ));
            outcome.committed.push(CommittedBlock {
                height: block.number,
                hash: block.hash,
                producer: block.producer,
                replaced,
            });
        }

        Self::plan_aggregate_writes(pending, &mut ops)?;
        if !ops.is_empty() {
            kv.atomic_batch_write(ops)?;
        }

        if !outcome.skipped.is_empty() {
            ix_telemetry::ROWS_SKIPPED
                .with_label_values(&["blocks"])
                .inc_by(outcome.skipped.len() as u64);
        }
        debug!(
            inserted = outcome.inserted(),
            replaced = outcome.replaced(),
            unchanged = outcome.unchanged,
            uncredited = outcome.uncredited.len(),
            skipped = outcome.skipped.len(),
            "[ix-02] Block batch committed"
        );
        Ok(outcome)
    }

    fn get_block_by_height(&self, height: BlockHeight) -> Result<Option<Block>, StoreError> {
        read_block(&*self.kv_store.read(), height)
    }

    fn get_block_by_hash(&self, hash: &Hash) -> Result<Option<Block>, StoreError> {
        let kv = self.kv_store.read();
        let key = keys::block_hash(hash);
        let Some(bytes) = kv.get(&key)? else {
            return Ok(None);
        };
        read_block(&*kv, decode_height(&key, &bytes)?)
    }

    fn get_blocks_in_range(
        &self,
        from: BlockHeight,
        to: BlockHeight,
        producer: Option<Address>,
    ) -> Result<Vec<Block>, StoreError> {
        if from > to {
            return Ok(Vec::new());
        }
        let end = match to.checked_add(1) {
            Some(next) => keys::block(next),
            None => keys::prefix_end(keys::BLOCK).unwrap_or_default(),
        };
        let kv = self.kv_store.read();
        let mut blocks = Vec::new();
        for (key, value) in kv.range_scan(&keys::block(from), &end)? {
            let block: Block = decode(&key, &value)?;
            if producer.map_or(true, |p| block.producer == p) {
                blocks.push(block);
            }
        }
        Ok(blocks)
    }

    fn get_blocks_by_timestamp(
        &self,
        condition: TimestampCondition,
        producer: Option<Address>,
        limit: Option<usize>,
    ) -> Result<Vec<Block>, StoreError> {
        let kv = self.kv_store.read();
        let index_end = keys::prefix_end(keys::TIMESTAMP).unwrap_or_default();
        match condition {
            TimestampCondition::Before(ts) => {
                let entries = kv.range_scan(keys::TIMESTAMP, &keys::timestamp_floor(ts))?;
                Self::blocks_from_timestamp_index(
                    &*kv,
                    entries.into_iter().rev().map(|(k, _)| k),
                    producer,
                    limit,
                )
            }
            TimestampCondition::AtOrAfter(ts) => {
                let entries = kv.range_scan(&keys::timestamp_floor(ts), &index_end)?;
                Self::blocks_from_timestamp_index(
                    &*kv,
                    entries.into_iter().map(|(k, _)| k),
                    producer,
                    limit,
                )
            }
            TimestampCondition::Between { from, to } => {
                if from > to {
                    return Ok(Vec::new());
                }
                let entries =
                    kv.range_scan(&keys::timestamp_floor(from), &timestamp_ceiling(to))?;
                Self::blocks_from_timestamp_index(
                    &*kv,
                    entries.into_iter().map(|(k, _)| k),
                    producer,
                    limit,
                )
            }
        }
    }

    fn delete_block_and_transactions(
        &self,
        height: BlockHeight,
    ) -> Result<Option<Block>, StoreError> {
        let mut kv = self.kv_store.write();
        let Some(block) = read_block(&*kv, height)? else {
            return Ok(None);
        };

        let mut ops = Vec::new();
        let mut pending = PendingAggregates::new();
        self.plan_block_removal(&*kv, &block, &mut ops, &mut pending)?;
        Self::plan_aggregate_writes(pending, &mut ops)?;
        kv.atomic_batch_write(ops)?;

        info!(
            height,
            hash = ?block.hash,
            producer = ?block.producer,
            "[ix-02] 🗑️ Deleted block and its transactions"
        );
        Ok(Some(block))
    }

    fn upsert_transactions(
        &self,
        records: &[TransactionRecord],
    ) -> Result<TxUpsertOutcome, StoreError> {
        let mut kv = self.kv_store.write();
        let mut outcome = TxUpsertOutcome::default();
        let mut ops = Vec::new();
        let mut canonical: HashMap<BlockHeight, Option<Hash>> = HashMap::new();

        let mut last_row: HashMap<Hash, usize> = HashMap::new();
        for (row, record) in records.iter().enumerate() {
            last_row.insert(record.hash(), row);
        }

        for (row, record) in records.iter().enumerate() {
            let tx = &record.tx;
            let reason = if last_row.get(&tx.hash) != Some(&row) {
                Some(SkipReason::SupersededInBatch)
            } else if tx.hash.is_zero() {
                Some(SkipReason::ZeroHash)
            } else if tx.block_hash.is_zero() {
                Some(SkipReason::PendingTransaction)
            } else {
                let stored = match canonical.get(&tx.block_number) {
                    Some(hash) => *hash,
                    None => {
                        let hash = read_block(&*kv, tx.block_number)?.map(|b| b.hash);
                        canonical.insert(tx.block_number, hash);
                        hash
                    }
                };
                match stored {
                    None => Some(SkipReason::MissingBlock),
                    Some(hash) if hash != tx.block_hash => Some(SkipReason::StaleBlock),
                    Some(_) => None,
                }
            };
            if let Some(reason) = reason {
                debug!(hash = ?tx.hash, %reason, "[ix-02] Skipping transaction");
                outcome.skipped.push((tx.hash, reason));
                continue;
            }

            let key = keys::transaction(&tx.hash);
            if let Some(existing) = read::<KV, TransactionRecord>(&*kv, &key)? {
                if existing == *record {
                    outcome.unchanged += 1;
                    continue;
                }
                if existing.tx.block_hash != tx.block_hash
                    || existing.tx.transaction_index != tx.transaction_index
                {
                    ops.push(BatchOperation::delete(keys::block_tx(
                        &existing.tx.block_hash,
                        existing.tx.transaction_index,
                    )));
                }
            }

            ops.push(BatchOperation::put(key, encode(record)?));
            ops.push(BatchOperation::put(
                keys::block_tx(&tx.block_hash, tx.transaction_index),
                tx.hash.as_bytes().to_vec(),
            ));
            outcome.written += 1;
        }

        if !ops.is_empty() {
            kv.atomic_batch_write(ops)?;
        }
        if !outcome.skipped.is_empty() {
            ix_telemetry::ROWS_SKIPPED
                .with_label_values(&["transactions"])
                .inc_by(outcome.skipped.len() as u64);
        }
        Ok(outcome)
    }

    fn get_transaction(&self, hash: &Hash) -> Result<Option<TransactionRecord>, StoreError> {
        read(&*self.kv_store.read(), &keys::transaction(hash))
    }

    fn get_transactions_by_block(
        &self,
        block_hash: &Hash,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let kv = self.kv_store.read();
        let mut records = Vec::new();
        for (index_key, value) in kv.prefix_scan(&keys::block_tx_prefix(block_hash))? {
            let tx_hash = decode_hash(&index_key, &value)?;
            if let Some(record) = read(&*kv, &keys::transaction(&tx_hash))? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn upsert_producer_aggregate(
        &self,
        producer: Address,
        block_delta: u64,
        reward_delta: U256,
    ) -> Result<ProducerAggregate, StoreError> {
        let mut kv = self.kv_store.write();
        let key = keys::producer(&producer);
        let current = read::<KV, ProducerAggregate>(&*kv, &key)?
            .unwrap_or_else(|| ProducerAggregate::new(producer));
        let updated = add_to_aggregate(current, block_delta, reward_delta);
        kv.put(&key, &encode(&updated)?)?;
        Ok(updated)
    }

    fn credit_producer(
        &self,
        producer: Address,
        blocks: &[(BlockHeight, Hash)],
        reward_delta: U256,
    ) -> Result<ProducerAggregate, StoreError> {
        let mut kv = self.kv_store.write();
        let key = keys::producer(&producer);
        let current = read::<KV, ProducerAggregate>(&*kv, &key)?
            .unwrap_or_else(|| ProducerAggregate::new(producer));
        let updated = add_to_aggregate(current, blocks.len() as u64, reward_delta);

        let mut ops = Vec::with_capacity(blocks.len() + 1);
        ops.push(BatchOperation::put(key, encode(&updated)?));
        for (height, hash) in blocks {
            ops.push(BatchOperation::put(
                keys::credited(*height),
                hash.as_bytes().to_vec(),
            ));
        }
        kv.atomic_batch_write(ops)?;
        Ok(updated)
    }

    fn get_producer_aggregate(
        &self,
        producer: &Address,
    ) -> Result<Option<ProducerAggregate>, StoreError> {
        read(&*self.kv_store.read(), &keys::producer(producer))
    }

    fn upsert_balance(&self, entry: &BalanceEntry) -> Result<(), StoreError> {
        self.kv_store
            .write()
            .put(&keys::balance(&entry.address), &encode(entry)?)?;
        Ok(())
    }

    fn get_balance(&self, address: &Address) -> Result<Option<BalanceEntry>, StoreError> {
        read(&*self.kv_store.read(), &keys::balance(address))
    }

    fn top_balances(&self, limit: usize) -> Result<Vec<BalanceEntry>, StoreError> {
        let mut entries = Self::all_balances(&*self.kv_store.read())?;
        entries.sort_by(|a, b| b.total().cmp(&a.total()).then(a.address.cmp(&b.address)));
        entries.truncate(limit);
        Ok(entries)
    }

    fn balance_count(&self) -> Result<usize, StoreError> {
        Ok(self.kv_store.read().prefix_scan(keys::BALANCE)?.len())
    }

    fn purge_balances_below(&self, threshold: u64) -> Result<usize, StoreError> {
        let mut kv = self.kv_store.write();
        let ops: Vec<_> = Self::all_balances(&*kv)?
            .into_iter()
            .filter(|entry| entry.total() < threshold)
            .map(|entry| BatchOperation::delete(keys::balance(&entry.address)))
            .collect();
        let removed = ops.len();
        if removed > 0 {
            kv.atomic_batch_write(ops)?;
            info!("[ix-02] 🧹 Purged {} balances below {}", removed, threshold);
        }
        Ok(removed)
    }

    fn upsert_ens_entry(&self, entry: &EnsEntry) -> Result<(), StoreError> {
        self.kv_store
            .write()
            .put(&keys::ens(&entry.hash), &encode(entry)?)?;
        Ok(())
    }

    fn get_ens_entry(&self, name_hash: &Hash) -> Result<Option<EnsEntry>, StoreError> {
        read(&*self.kv_store.read(), &keys::ens(name_hash))
    }

    fn ens_count(&self) -> Result<usize, StoreError> {
        Ok(self.kv_store.read().prefix_scan(keys::ENS)?.len())
    }

    fn ens_entries_after(
        &self,
        after: Option<&Hash>,
        limit: usize,
    ) -> Result<Vec<EnsEntry>, StoreError> {
        let start = match after {
            Some(hash) => {
                let mut key = keys::ens(hash);
                key.push(0);
                key
            }
            None => keys::ENS.to_vec(),
        };
        let end = keys::prefix_end(keys::ENS).unwrap_or_default();
        self.kv_store
            .read()
            .range_scan(&start, &end)?
            .into_iter()
            .take(limit)
            .map(|(key, value)| decode(&key, &value))
            .collect()
    }
}
