use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use reserva_collections::{ArenaVec, OwnedArenaVec};
use reserva_core::Arena;

fn bench_push_growth(c: &mut Criterion) {
    let mut group = c.benchmark_group("vector_push");

    for count in [1_000usize, 100_000].iter() {
        group.bench_with_input(BenchmarkId::new("owned", count), count, |b, &count| {
            b.iter(|| {
                let mut v = OwnedArenaVec::with_capacity(8).unwrap();
                for i in 0..count {
                    v.push(black_box(i as u64)).unwrap();
                }
                black_box(v.len())
            });
        });

        group.bench_with_input(
            BenchmarkId::new("preallocated", count),
            count,
            |b, &count| {
                b.iter_batched(
                    || Arena::new().unwrap(),
                    |arena| {
                        let mut v = ArenaVec::with_capacity_in(&arena, count).unwrap();
                        for i in 0..count {
                            v.push(black_box(i as u64)).unwrap();
                        }
                        black_box(v.len());
                        drop(v);
                        arena
                    },
                    criterion::BatchSize::LargeInput,
                );
            },
        );
    }
    group.finish();
}

fn bench_iterate(c: &mut Criterion) {
    let mut v = OwnedArenaVec::with_capacity(8).unwrap();
    for i in 0..100_000u64 {
        v.push(i).unwrap();
    }
    c.bench_function("vector_iterate_100k", |b| {
        b.iter(|| black_box(v.iter().copied().sum::<u64>()));
    });
}

criterion_group!(benches, bench_push_growth, bench_iterate);
criterion_main!(benches);
