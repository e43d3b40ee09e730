//! # Chain Indexer Benchmarks
//!
//! | Area | Measured |
//! |------|----------|
//! | ix-03 Chain Sync | full pass over a scripted node into an in-memory store |
//! | ix-02 Chain Store | bulk block upsert, timestamp range read |
//! | ix-04 Delegate Density | backward walk over the longest window |

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ix_01_node_client::MockNodeClient;
use ix_02_chain_store::{ChainStore, KvChainStore};
use ix_03_chain_sync::{SyncConfig, SyncPipeline};
use ix_04_delegate_density::{compute_density, DensityInput, DposConfig};
use shared_types::{Address, Block, Timestamp, TimestampCondition, H160};

const DELEGATES: [Address; 3] = [H160([0xa1; 20]), H160([0xb2; 20]), H160([0xc3; 20])];
const BASE: Timestamp = 1_600_000_000;

fn chain(len: u64) -> Vec<Block> {
    (0..len)
        .map(|h| {
            Block {
                number: h,
                timestamp: BASE + h,
                producer: DELEGATES[(h % 3) as usize],
                delegates: DELEGATES.to_vec(),
                ..Default::default()
            }
            .seal()
        })
        .collect()
}

fn bench_sync_pass(c: &mut Criterion) {
    let mut group = c.benchmark_group("ix-03-chain-sync");
    group.measurement_time(Duration::from_secs(10));
    let runtime = tokio::runtime::Runtime::new().unwrap();

    for len in [100u64, 1_000] {
        group.throughput(Throughput::Elements(len));
        group.bench_with_input(BenchmarkId::new("full_pass", len), &len, |b, &len| {
            let node = Arc::new(MockNodeClient::with_chain(len, DELEGATES.to_vec(), 2));
            b.iter(|| {
                let store = Arc::new(KvChainStore::in_memory());
                let report = runtime
                    .block_on(SyncPipeline::new(node.clone(), store, SyncConfig::default()).run())
                    .unwrap();
                black_box(report.cursor)
            })
        });
    }
    group.finish();
}

fn bench_store(c: &mut Criterion) {
    let mut group = c.benchmark_group("ix-02-chain-store");
    let blocks = chain(400);

    group.throughput(Throughput::Elements(blocks.len() as u64));
    group.bench_function("upsert_400_blocks", |b| {
        b.iter(|| {
            let store = KvChainStore::in_memory();
            black_box(store.upsert_blocks(&blocks).unwrap())
        })
    });

    let store = KvChainStore::in_memory();
    store.upsert_blocks(&blocks).unwrap();
    group.bench_function("blocks_by_timestamp_300s", |b| {
        b.iter(|| {
            black_box(
                store
                    .get_blocks_by_timestamp(TimestampCondition::AtOrAfter(BASE + 100), None, None)
                    .unwrap(),
            )
        })
    });
    group.finish();
}

fn bench_density(c: &mut Criterion) {
    let mut group = c.benchmark_group("ix-04-delegate-density");
    let dpos = DposConfig {
        period: 1,
        turn_block_count: 6,
        delegate_count: 3,
    };
    let stakes: HashMap<Address, u64> = DELEGATES.iter().map(|d| (*d, 1_000)).collect();

    for window in [300u64, 3_600, 86_400] {
        let produced: HashMap<Timestamp, Address> = chain(window)
            .into_iter()
            .filter(|b| b.number % 11 != 0)
            .map(|b| (b.timestamp, b.producer))
            .collect();
        let input = DensityInput {
            delegates: &DELEGATES,
            produced: &produced,
            latest_timestamp: BASE + window - 1,
            stakes: &stakes,
            filter: None,
        };

        group.throughput(Throughput::Elements(window));
        group.bench_with_input(BenchmarkId::new("walk", window), &window, |b, &window| {
            b.iter(|| black_box(compute_density(&input, &[60, window], &dpos)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_sync_pass, bench_store, bench_density);
criterion_main!(benches);
