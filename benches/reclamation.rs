use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use versioned_epoch::{EpochEngine, HashMap, RwSpinLock, VersionEngine};

// Benchmark 1: Single-threaded pin/unpin overhead
fn bench_single_thread_pin_unpin(c: &mut Criterion) {
    c.bench_function("versioned_epoch_single_thread_pin_unpin", |b| {
        let engine = EpochEngine::new(4);
        let participant = engine.begin().unwrap();

        b.iter(|| {
            let _guard = participant.pin();
            black_box(());
        });
    });

    c.bench_function("crossbeam_epoch_single_thread_pin_unpin", |b| {
        b.iter(|| {
            let _guard = crossbeam_epoch::pin();
            black_box(());
        });
    });
}

// Benchmark 2: Retiring boxed values
fn bench_retire(c: &mut Criterion) {
    let mut group = c.benchmark_group("retire");

    group.bench_function("versioned_epoch", |b| {
        let engine = EpochEngine::new(4);
        let participant = engine.begin().unwrap();

        b.iter(|| {
            let _guard = participant.pin();
            participant.retire(Box::new(black_box(42u64)));
        });
    });

    group.bench_function("crossbeam_epoch", |b| {
        b.iter(|| {
            let guard = crossbeam_epoch::pin();
            let value = crossbeam_epoch::Owned::new(black_box(42u64)).into_shared(&guard);
            // SAFETY: never published, so no other thread can hold it.
            unsafe { guard.defer_destroy(value) };
        });
    });

    group.finish();
}

// Benchmark 3: Version pool allocate/retire cycle
fn bench_version_allocate_retire(c: &mut Criterion) {
    c.bench_function("version_allocate_retire", |b| {
        let engine = VersionEngine::new(|| AtomicU64::new(0));
        let pool = engine.begin();

        b.iter(|| {
            let node = pool.allocate();
            if let Some(payload) = engine.resolve(node) {
                payload.store(black_box(1), Ordering::Relaxed);
            }
            pool.retire(node);
        });
    });
}

// Benchmark 4: Map insert and lookup
fn bench_map(c: &mut Criterion) {
    let mut group = c.benchmark_group("map");

    group.bench_function("insert_overwrite", |b| {
        let map: HashMap<u64, u64> = HashMap::with_buckets(1024);
        let mut i = 0u64;

        b.iter(|| {
            i = i.wrapping_add(1);
            let _ = map.insert(black_box(i % 1024), i);
        });
    });

    group.bench_function("get_hit", |b| {
        let map: HashMap<u64, u64> = HashMap::with_buckets(1024);
        for key in 0..1024 {
            let _ = map.insert(key, key);
        }
        let mut i = 0u64;

        b.iter(|| {
            i = i.wrapping_add(1);
            black_box(map.get(&(i % 1024)));
        });
    });

    for num_readers in [1u64, 2, 4].iter() {
        group.bench_with_input(
            BenchmarkId::new("concurrent_get", num_readers),
            num_readers,
            |b, &num_readers| {
                let map: HashMap<u64, u64> = HashMap::with_buckets(1024);
                for key in 0..1024 {
                    let _ = map.insert(key, key);
                }

                b.iter(|| {
                    thread::scope(|s| {
                        for t in 0..num_readers {
                            let map = &map;
                            s.spawn(move || {
                                for key in 0..1024u64 {
                                    black_box(map.get(&(key ^ t)));
                                }
                            });
                        }
                    });
                });
            },
        );
    }

    group.finish();
}

// Benchmark 5: Uncontended spin lock read hold
fn bench_spin_lock_read(c: &mut Criterion) {
    c.bench_function("spin_lock_read", |b| {
        let lock = RwSpinLock::new();

        b.iter(|| {
            let _r = lock.read();
            black_box(());
        });
    });
}

criterion_group!(
    benches,
    bench_single_thread_pin_unpin,
    bench_retire,
    bench_version_allocate_retire,
    bench_map,
    bench_spin_lock_read,
);
criterion_main!(benches);
