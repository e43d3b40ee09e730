//! # Inbound Ports (Driving Ports)
//!
//! The call contract the sync pipeline and the density engine consume.

use async_trait::async_trait;
use shared_types::{
    Address, Block, BlockHeight, DelegateVote, Hash, Receipt, Timestamp, Transaction,
    TransactionRecord, U256,
};

use crate::domain::{BlockTag, NodeError};

/// Read-only access to the remote ledger node.
///
/// Production: `RpcNodeClient` (HTTP or IPC transport)
/// Testing: `MockNodeClient`
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Height of the node's current head.
    async fn tip_height(&self) -> Result<BlockHeight, NodeError>;

    /// Fully populated block at `height`, including transaction hashes and
    /// the validator rotation in effect.
    async fn get_block(&self, height: BlockHeight) -> Result<Block, NodeError>;

    async fn get_transaction(&self, hash: Hash) -> Result<Transaction, NodeError>;

    async fn get_receipt(&self, hash: Hash) -> Result<Receipt, NodeError>;

    /// Delegates with their live stake.
    async fn get_delegate_votes(&self, at: BlockTag) -> Result<Vec<DelegateVote>, NodeError>;

    /// Liquid balance in wei.
    async fn get_balance(&self, address: Address) -> Result<U256, NodeError>;

    /// Staked amount in 4-decimal fixed point.
    async fn get_stake(&self, address: Address) -> Result<u64, NodeError>;

    /// Address the name resolver at `contract` holds for `name_hash`.
    /// Unregistered names resolve to the zero address.
    async fn ens_address(&self, contract: Address, name_hash: Hash) -> Result<Address, NodeError>;

    /// Ordered validator addresses.
    async fn get_validator_set(&self, at: BlockTag) -> Result<Vec<Address>, NodeError> {
        Ok(self
            .get_delegate_votes(at)
            .await?
            .into_iter()
            .map(|vote| vote.address)
            .collect())
    }

    /// Transaction plus receipt, stamped with the containing block's timestamp.
    async fn get_transaction_record(
        &self,
        hash: Hash,
        block_timestamp: Timestamp,
    ) -> Result<TransactionRecord, NodeError> {
        let mut tx = self.get_transaction(hash).await?;
        let receipt = self.get_receipt(hash).await?;
        tx.timestamp = block_timestamp;
        Ok(TransactionRecord { tx, receipt })
    }
}
