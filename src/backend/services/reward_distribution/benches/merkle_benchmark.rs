use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use distribution_models::{EpochRange, LedgerWorkerId, NetworkParams, WorkerId, WorkerMetrics};
use reward_distribution::{
    config::RewardConfig,
    services::{batch_service::RewardTree, reward_service::RewardEngine},
};
use std::time::Duration;

fn generate_metrics(count: u64) -> Vec<WorkerMetrics> {
    (1..=count)
        .map(|i| WorkerMetrics {
            worker_id: LedgerWorkerId(i),
            peer_id: WorkerId::new(format!("12D3KooW{i:06}")),
            bytes_sent: 1_000_000 + i * 7_919 % 100_000,
            chunks_read: 1_000 + i * 104_729 % 1_000,
            total_requests: 500,
            valid_requests: 490,
            stake: (i as u128 % 5) * 10u128.pow(21),
            total_delegated_stake: (i as u128 % 5) * 10u128.pow(21),
            liveness_factor: 0.9 + (i % 10) as f64 / 100.0,
            tenure_factor: 1.0,
        })
        .collect()
}

fn params() -> NetworkParams {
    NetworkParams {
        bond_amount: 100_000 * 10u128.pow(18),
        epoch_seconds: 20 * 60,
        target_apr: 0.2,
    }
}

fn benchmark_reward_tree(c: &mut Criterion) {
    let engine = RewardEngine::new(RewardConfig::default());
    let range = EpochRange::new(0, 100).unwrap();

    let mut group = c.benchmark_group("reward_tree");
    group.measurement_time(Duration::from_secs(10));

    for count in [100u64, 1_000, 10_000].iter() {
        let metrics = generate_metrics(*count);

        group.bench_with_input(BenchmarkId::new("calculate", count), count, |b, _| {
            b.iter(|| engine.calculate(black_box(&metrics), &params()))
        });

        let payable = engine.calculate(&metrics, &params()).payable();
        group.bench_with_input(BenchmarkId::new("build_tree", count), count, |b, _| {
            b.iter(|| RewardTree::build(range, black_box(&payable), 50).unwrap())
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = benchmark_reward_tree
}
criterion_main!(benches);
