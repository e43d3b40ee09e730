//! # Key Layout
//!
//! | Prefix | Key | Value |
//! |--------|-----|-------|
//! | `b/` | height | `Block` |
//! | `h/` | block hash | height |
//! | `t/` | timestamp, height | empty |
//! | `x/` | tx hash | `TransactionRecord` |
//! | `i/` | block hash, tx index | tx hash |
//! | `p/` | producer address | `ProducerAggregate` |
//! | `k/` | height | hash of the block credited to its producer |
//! | `c/` | cursor name | height |
//! | `a/` | account address | `BalanceEntry` |
//! | `n/` | name hash | `EnsEntry` |
//!
//! Integers are big-endian so byte order equals numeric order.

use shared_types::{Address, BlockHeight, Hash, Timestamp};

pub const BLOCK: &[u8] = b"b/";
pub const BLOCK_HASH: &[u8] = b"h/";
pub const TIMESTAMP: &[u8] = b"t/";
pub const TRANSACTION: &[u8] = b"x/";
pub const BLOCK_TX: &[u8] = b"i/";
pub const PRODUCER: &[u8] = b"p/";
pub const CREDITED: &[u8] = b"k/";
pub const CURSOR: &[u8] = b"c/";
pub const BALANCE: &[u8] = b"a/";
pub const ENS: &[u8] = b"n/";

fn join(prefix: &[u8], parts: &[&[u8]]) -> Vec<u8> {
    let len = prefix.len() + parts.iter().map(|p| p.len()).sum::<usize>();
    let mut key = Vec::with_capacity(len);
    key.extend_from_slice(prefix);
    for part in parts {
        key.extend_from_slice(part);
    }
    key
}

pub fn block(height: BlockHeight) -> Vec<u8> {
    join(BLOCK, &[&height.to_be_bytes()])
}

pub fn block_hash(hash: &Hash) -> Vec<u8> {
    join(BLOCK_HASH, &[hash.as_bytes()])
}

pub fn timestamp(ts: Timestamp, height: BlockHeight) -> Vec<u8> {
    join(TIMESTAMP, &[&ts.to_be_bytes(), &height.to_be_bytes()])
}

/// First key of the timestamp index at or after `ts`.
pub fn timestamp_floor(ts: Timestamp) -> Vec<u8> {
    join(TIMESTAMP, &[&ts.to_be_bytes()])
}

pub fn transaction(hash: &Hash) -> Vec<u8> {
    join(TRANSACTION, &[hash.as_bytes()])
}

pub fn block_tx(block_hash: &Hash, index: u64) -> Vec<u8> {
    join(BLOCK_TX, &[block_hash.as_bytes(), &index.to_be_bytes()])
}

pub fn block_tx_prefix(block_hash: &Hash) -> Vec<u8> {
    join(BLOCK_TX, &[block_hash.as_bytes()])
}

pub fn producer(address: &Address) -> Vec<u8> {
    join(PRODUCER, &[address.as_bytes()])
}

pub fn credited(height: BlockHeight) -> Vec<u8> {
    join(CREDITED, &[&height.to_be_bytes()])
}

pub fn cursor(name: &str) -> Vec<u8> {
    join(CURSOR, &[name.as_bytes()])
}

pub fn balance(address: &Address) -> Vec<u8> {
    join(BALANCE, &[address.as_bytes()])
}

pub fn ens(name_hash: &Hash) -> Vec<u8> {
    join(ENS, &[name_hash.as_bytes()])
}

/// Exclusive upper bound of every key starting with `prefix`.
///
/// Returns `None` when no such bound exists (prefix of all `0xff`).
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < 0xff {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// Decode a big-endian `u64` starting at `offset`.
pub fn read_u64(key: &[u8], offset: usize) -> Option<u64> {
    key.get(offset..offset + 8)
        .and_then(|bytes| bytes.try_into().ok())
        .map(u64::from_be_bytes)
}

/// Height encoded in a `t/` key.
pub fn height_from_timestamp_key(key: &[u8]) -> Option<BlockHeight> {
    read_u64(key, TIMESTAMP.len() + 8)
}

/// Height encoded in a `b/` key.
pub fn height_from_block_key(key: &[u8]) -> Option<BlockHeight> {
    read_u64(key, BLOCK.len())
}
