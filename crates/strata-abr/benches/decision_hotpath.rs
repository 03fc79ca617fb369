use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use strata_abr::config::{PandaConfig, RetentionPolicy, ThresholdConfig};
use strata_abr::manifest::{Manifest, QualityLevels};
use strata_abr::panda::PandaEstimator;
use strata_abr::player::{PlayerBuffer, PlayerState};
use strata_abr::threshold::ThresholdSelector;
use strata_abr::throughput::ThroughputTracker;

fn ladder() -> QualityLevels {
    QualityLevels::new(vec![
        235_000, 375_000, 560_000, 750_000, 1_050_000, 1_750_000, 2_350_000, 3_000_000, 4_300_000,
        5_800_000,
    ])
    .unwrap()
}

/// Deterministic sawtooth link between 1 and 5 Mbps.
fn link(n: usize) -> f64 {
    1_000_000.0 + (n % 40) as f64 * 100_000.0
}

/// Benchmark one threshold decision over histories of growing length.
fn bench_threshold_select(c: &mut Criterion) {
    let levels = ladder();

    let mut group = c.benchmark_group("threshold");
    group.throughput(Throughput::Elements(1));

    for len in [8usize, 128, 1024] {
        let mut history = ThroughputTracker::new();
        for n in 0..len {
            history.record(link(n) as u64, 1.0).unwrap();
        }
        let selector = ThresholdSelector::new(&ThresholdConfig {
            retention: RetentionPolicy::KeepAll,
        });
        group.bench_with_input(BenchmarkId::new("select_keep_all", len), &len, |b, _| {
            b.iter(|| selector.select(black_box(&mut history), &levels));
        });
    }

    group.bench_function("select_keep_last_one", |b| {
        let selector = ThresholdSelector::new(&ThresholdConfig {
            retention: RetentionPolicy::KeepLastOne,
        });
        let mut history = ThroughputTracker::new();
        let mut n = 0;
        b.iter(|| {
            history.record(link(n) as u64, 1.0).unwrap();
            n += 1;
            selector.select(black_box(&mut history), &levels)
        });
    });

    group.finish();
}

/// Benchmark the PANDA segment cycle: round-trip update + decision.
fn bench_panda_cycle(c: &mut Criterion) {
    let levels = ladder();
    let lowest = levels.lowest() as f64;
    let manifest = Manifest::new(levels.clone(), 4, 1).unwrap();

    let mut group = c.benchmark_group("panda");
    group.throughput(Throughput::Elements(1));

    group.bench_function("segment_cycle", |b| {
        let mut player = PlayerBuffer::new(10.0);
        let mut panda =
            PandaEstimator::new(&PandaConfig::default(), player.max_buffer_size()).unwrap();
        panda.on_manifest(&manifest, &mut player).unwrap();
        panda.on_manifest_round_trip(0.1, 2_000_000.0, lowest);
        let mut n = 0;
        b.iter(|| {
            let decision = panda.decide(black_box(&levels));
            panda.on_segment_round_trip(2.0, link(n), lowest);
            n += 1;
            decision
        });
    });

    group.bench_function("session_1000_segments", |b| {
        b.iter(|| {
            let mut player = PlayerBuffer::new(10.0);
            let mut panda =
                PandaEstimator::new(&PandaConfig::default(), player.max_buffer_size()).unwrap();
            panda.on_manifest(&manifest, &mut player).unwrap();
            panda.on_manifest_round_trip(0.1, 2_000_000.0, lowest);
            for n in 0..1000 {
                panda.decide(&levels);
                panda.on_segment_round_trip(2.0, black_box(link(n)), lowest);
            }
            panda.chosen().len()
        });
    });

    group.finish();
}

criterion_group!(benches, bench_threshold_select, bench_panda_cycle);
criterion_main!(benches);
