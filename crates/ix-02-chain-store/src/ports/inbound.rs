//! # Inbound Ports (Driving Ports)
//!
//! The API the sync pipeline, the rich-list job and the density engine use
//! to read and write indexed chain data.

use shared_types::{
    Address, BalanceEntry, Block, BlockHeight, EnsEntry, Hash, ProducerAggregate,
    TimestampCondition, TransactionRecord, U256,
};

use crate::domain::{BlockUpsertOutcome, StoreError, TxUpsertOutcome};

/// Persistent store of blocks, transactions, producer aggregates, balances,
/// registered names and named cursors.
///
/// Every multi-row write is applied atomically: on `Err` nothing changed.
pub trait ChainStore: Send + Sync {
    // === Cursors ===

    /// Stored value of the named cursor.
    fn get_cursor(&self, name: &str) -> Result<Option<BlockHeight>, StoreError>;

    fn set_cursor(&self, name: &str, height: BlockHeight) -> Result<(), StoreError>;

    /// Forget the named cursor, so the next run starts from genesis.
    fn clear_cursor(&self, name: &str) -> Result<(), StoreError>;

    // === Blocks ===

    /// Height of the highest stored block.
    fn latest_height(&self) -> Result<Option<BlockHeight>, StoreError>;

    /// Insert or replace blocks keyed by height.
    ///
    /// Identical rows are left alone; those whose producer credit never
    /// landed are reported in `uncredited`. Rows with a zero hash are skipped
    /// individually. A row whose hash differs from the stored one replaces
    /// it, along with the old block's transactions, and the old producer's
    /// aggregate is decremented.
    fn upsert_blocks(&self, blocks: &[Block]) -> Result<BlockUpsertOutcome, StoreError>;

    fn get_block_by_height(&self, height: BlockHeight) -> Result<Option<Block>, StoreError>;

    fn get_block_by_hash(&self, hash: &Hash) -> Result<Option<Block>, StoreError>;

    /// Blocks with `from <= height <= to`, ascending, optionally only those
    /// produced by `producer`.
    fn get_blocks_in_range(
        &self,
        from: BlockHeight,
        to: BlockHeight,
        producer: Option<Address>,
    ) -> Result<Vec<Block>, StoreError>;

    /// Blocks matching a timestamp condition.
    ///
    /// `Before` yields newest first; the other conditions oldest first.
    fn get_blocks_by_timestamp(
        &self,
        condition: TimestampCondition,
        producer: Option<Address>,
        limit: Option<usize>,
    ) -> Result<Vec<Block>, StoreError>;

    /// Remove a block, its transactions and its contribution to the
    /// producer aggregate in one atomic write.
    ///
    /// Returns the removed block, or `None` if the height was empty.
    fn delete_block_and_transactions(
        &self,
        height: BlockHeight,
    ) -> Result<Option<Block>, StoreError>;

    // === Transactions ===

    /// Insert or overwrite transactions keyed by hash.
    ///
    /// Rows whose containing block is no longer the stored block at that
    /// height are skipped.
    fn upsert_transactions(
        &self,
        records: &[TransactionRecord],
    ) -> Result<TxUpsertOutcome, StoreError>;

    fn get_transaction(&self, hash: &Hash) -> Result<Option<TransactionRecord>, StoreError>;

    /// Transactions of a block, in index order.
    fn get_transactions_by_block(
        &self,
        block_hash: &Hash,
    ) -> Result<Vec<TransactionRecord>, StoreError>;

    // === Producer aggregates ===

    /// Add `block_delta` blocks and `reward_delta` wei to an aggregate,
    /// creating it if absent. Returns the updated row.
    fn upsert_producer_aggregate(
        &self,
        producer: Address,
        block_delta: u64,
        reward_delta: U256,
    ) -> Result<ProducerAggregate, StoreError>;

    /// Credit `blocks` (height, hash) and `reward_delta` wei to `producer`
    /// and mark each block credited, in one atomic write.
    fn credit_producer(
        &self,
        producer: Address,
        blocks: &[(BlockHeight, Hash)],
        reward_delta: U256,
    ) -> Result<ProducerAggregate, StoreError>;

    fn get_producer_aggregate(
        &self,
        producer: &Address,
    ) -> Result<Option<ProducerAggregate>, StoreError>;

    // === Balances ===

    fn upsert_balance(&self, entry: &BalanceEntry) -> Result<(), StoreError>;

    fn get_balance(&self, address: &Address) -> Result<Option<BalanceEntry>, StoreError>;

    /// The `limit` largest balances by `liquid + staked`, largest first.
    fn top_balances(&self, limit: usize) -> Result<Vec<BalanceEntry>, StoreError>;

    fn balance_count(&self) -> Result<usize, StoreError>;

    /// Delete every balance whose total is below `threshold`. Returns how
    /// many rows were removed.
    fn purge_balances_below(&self, threshold: u64) -> Result<usize, StoreError>;

    // === Names ===

    /// Insert or overwrite a name keyed by its hash.
    fn upsert_ens_entry(&self, entry: &EnsEntry) -> Result<(), StoreError>;

    fn get_ens_entry(&self, name_hash: &Hash) -> Result<Option<EnsEntry>, StoreError>;

    fn ens_count(&self) -> Result<usize, StoreError>;

    /// Up to `limit` names ordered by hash, starting after `after`.
    fn ens_entries_after(
        &self,
        after: Option<&Hash>,
        limit: usize,
    ) -> Result<Vec<EnsEntry>, StoreError>;
}
