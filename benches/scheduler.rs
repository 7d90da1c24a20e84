//! Benchmarks for reflow
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use parking_lot::Mutex;
use reflow::{Cell, Fault, Guard, Render, Scheduler};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

struct Probe {
    guard: Guard,
    renders: AtomicUsize,
}

impl Probe {
    fn new(scheduler: &Scheduler, depth: usize) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Probe>| Probe {
            guard: Guard::new(scheduler, weak.clone(), depth),
            renders: AtomicUsize::new(0),
        })
    }
}

impl Render for Probe {
    fn render(&self) -> Result<(), Fault> {
        self.guard.enter()?;
        self.renders.fetch_add(1, Ordering::SeqCst);
        self.guard.exit()
    }
}

// =============================================================================
// CELL BENCHMARKS
// =============================================================================

fn bench_cell_set_changed(c: &mut Criterion) {
    let scheduler = Scheduler::new();
    let owner = Probe::new(&scheduler, 0);
    scheduler.init(&owner.guard).unwrap();
    let cell = Cell::new(&owner.guard, 0i32);

    let mut i = 0i32;
    c.bench_function("cell_set_changed", |b| {
        b.iter(|| {
            cell.set(black_box(i));
            i += 1;
        })
    });
}

fn bench_cell_set_same_value(c: &mut Criterion) {
    let scheduler = Scheduler::new();
    let owner = Probe::new(&scheduler, 0);
    scheduler.init(&owner.guard).unwrap();
    let cell = Cell::new(&owner.guard, 42i32);

    c.bench_function("cell_set_same_value", |b| {
        b.iter(|| cell.set(black_box(42)))
    });
}

fn bench_cell_get(c: &mut Criterion) {
    let scheduler = Scheduler::new();
    let owner = Probe::new(&scheduler, 0);
    scheduler.init(&owner.guard).unwrap();
    let cell = Cell::new(&owner.guard, 42i32);

    c.bench_function("cell_get", |b| {
        b.iter(|| black_box(cell.get(&owner.guard).unwrap()))
    });
}

// =============================================================================
// REGISTRY BENCHMARKS
// =============================================================================

fn bench_stain_clean(c: &mut Criterion) {
    let scheduler = Scheduler::new();
    let probe = Probe::new(&scheduler, 3);
    scheduler.clean(&probe.guard);

    c.bench_function("stain_clean", |b| {
        b.iter(|| {
            scheduler.stain(&probe.guard);
            scheduler.clean(&probe.guard);
        })
    });
}

fn bench_stain_idempotent(c: &mut Criterion) {
    let scheduler = Scheduler::new();
    let probe = Probe::new(&scheduler, 3);

    c.bench_function("stain_idempotent", |b| {
        b.iter(|| scheduler.stain(&probe.guard))
    });
}

// =============================================================================
// DRAIN BENCHMARKS
// =============================================================================

fn bench_drain_all_dirty(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain_all_dirty");
    for size in [10usize, 100, 1000] {
        let scheduler = Scheduler::new();
        let root = Probe::new(&scheduler, 0);
        scheduler.init(&root.guard).unwrap();

        // Components spread over ten depth levels.
        let probes: Vec<Arc<Probe>> = (0..size)
            .map(|i| Probe::new(&scheduler, 1 + i % 10))
            .collect();
        scheduler.drain().unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                for probe in &probes {
                    scheduler.stain(&probe.guard);
                }
                scheduler.drain().unwrap();
            })
        });
    }
    group.finish();
}

fn bench_drain_idle(c: &mut Criterion) {
    let scheduler = Scheduler::new();
    let root = Probe::new(&scheduler, 0);
    scheduler.init(&root.guard).unwrap();

    c.bench_function("drain_idle", |b| b.iter(|| scheduler.drain().unwrap()));
}

// =============================================================================
// EFFECT BENCHMARKS
// =============================================================================

fn bench_render_with_effect(c: &mut Criterion) {
    struct Effectful {
        guard: Guard,
        counter: Arc<Mutex<u64>>,
    }

    impl Render for Effectful {
        fn render(&self) -> Result<(), Fault> {
            self.guard.enter()?;
            let counter = self.counter.clone();
            self.guard.use_effect(move || {
                *counter.lock() += 1;
                let counter = counter.clone();
                move || *counter.lock() += 1
            });
            self.guard.exit()
        }
    }

    let scheduler = Scheduler::new();
    let component = Arc::new_cyclic(|weak: &Weak<Effectful>| Effectful {
        guard: Guard::new(&scheduler, weak.clone(), 0usize),
        counter: Arc::new(Mutex::new(0)),
    });
    scheduler.init(&component.guard).unwrap();

    c.bench_function("render_with_effect", |b| {
        b.iter(|| {
            scheduler.stain(&component.guard);
            scheduler.drain().unwrap();
        })
    });
}

// =============================================================================
// CRITERION SETUP
// =============================================================================

criterion_group!(
    cell_benches,
    bench_cell_set_changed,
    bench_cell_set_same_value,
    bench_cell_get,
);

criterion_group!(
    registry_benches,
    bench_stain_clean,
    bench_stain_idempotent,
);

criterion_group!(
    drain_benches,
    bench_drain_all_dirty,
    bench_drain_idle,
    bench_render_with_effect,
);

criterion_main!(cell_benches, registry_benches, drain_benches);
