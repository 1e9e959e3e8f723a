use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use tokio::runtime::Runtime;

use star_conquest::combat::{resolve_combat, CombatInput};
use star_conquest::core::types::Timestamp;
use star_conquest::scenario::{seed_session, ScenarioSpec};
use star_conquest::world::Terrain;
use star_conquest::{Engine, EngineConfig, InMemoryStore, ManualClock};

fn bench_combat(c: &mut Criterion) {
    let config = EngineConfig::default();
    let input = CombatInput {
        terrain: Terrain::Nebula,
        flanking: true,
        ..CombatInput::plain(240, 90)
    };
    c.bench_function("resolve_combat", |b| {
        b.iter(|| resolve_combat(black_box(&input), black_box(&config.combat)))
    });
}

fn bench_tick(c: &mut Criterion) {
    let rt = match Runtime::new() {
        Ok(rt) => rt,
        Err(e) => panic!("tokio runtime: {e}"),
    };
    let mut group = c.benchmark_group("advance_tick");

    for nodes in [20usize, 80, 200] {
        group.bench_with_input(BenchmarkId::new("nodes", nodes), &nodes, |b, &nodes| {
            b.iter_batched(
                || {
                    rt.block_on(async {
                        let store = Arc::new(InMemoryStore::new());
                        let config = EngineConfig::default();
                        let spec = ScenarioSpec {
                            node_count: nodes,
                            ..Default::default()
                        };
                        let seeded = seed_session(store.as_ref(), &config, &spec)
                            .await
                            .unwrap();
                        let engine =
                            Engine::new(store, ManualClock::new(Timestamp(1_000)), config);
                        (engine, seeded.session)
                    })
                },
                |(engine, session)| {
                    // tick 10 runs every phase including expansion
                    rt.block_on(async {
                        for _ in 0..10 {
                            engine.clock().advance(1_000);
                            black_box(engine.advance_tick(session).await.unwrap());
                        }
                    })
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, bench_combat, bench_tick);
criterion_main!(benches);
