//! Criterion benchmarks for the tick pipeline.
//!
//! Run with:
//!   cargo bench
//!
//! Results are saved to target/criterion/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;

use neurogenesis::engine::{EngineConfig, Mode, SimulationEngine};
use neurogenesis::network::{NeuralNetwork, NetworkConfig};
use neurogenesis::neuron::NeuronId;
use neurogenesis::observer::NetworkAdapter;
use neurogenesis::rng::seeded;

/// Seeded network padded to `size` neurons with ~3 random edges each.
/// Growth is off so every iteration sees the same population.
fn make_network(size: usize, seed: u64) -> NeuralNetwork {
    let cfg = NetworkConfig::default()
        .with_seed(seed)
        .with_max_neurons(size)
        .without_growth();
    let mut net = NeuralNetwork::new(cfg).unwrap();
    net.seed();
    while net.neuron_count() < size {
        net.add_neuron();
    }

    let mut rng = seeded(Some(seed ^ 0xA5A5));
    for _ in 0..size * 3 {
        let a = NeuronId(rng.gen_range(0..size as u32));
        let b = NeuronId(rng.gen_range(0..size as u32));
        net.connect(a, b, rng.gen_range(0.1..1.0));
    }
    net
}

fn bench_tick_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_size");

    for size in [16usize, 64, 256, 1024].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let mut net = make_network(size, 42);
            b.iter(|| black_box(net.tick().fired));
        });
    }

    group.finish();
}

fn bench_engine_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_step");

    for mode in [Mode::BiologicalOnly, Mode::DecisionDemo] {
        group.bench_function(mode.to_string(), |b| {
            let net = make_network(64, 7);
            let engine = SimulationEngine::new(
                net.into_shared(),
                EngineConfig::default().with_seed(7).with_mode(mode),
            )
            .unwrap();
            b.iter(|| black_box(engine.step_once().len()));
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut net = make_network(256, 3);
    for _ in 0..20 {
        net.tick();
    }
    c.bench_function("snapshot_256", |b| {
        b.iter(|| black_box(NetworkAdapter::new(&net).snapshot().fired_count()));
    });
}

criterion_group!(benches, bench_tick_sizes, bench_engine_step, bench_snapshot);
criterion_main!(benches);
