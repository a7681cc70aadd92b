#[macro_use]
extern crate criterion;
extern crate back_pressure;

use back_pressure::executor::*;
use criterion::Criterion;
use std::sync::Arc;
use std::thread;

fn open_gate_1k_fast_path() {
    let gate = GatedExecutor::new();
    for _ in 0..1000 {
        let _ = gate.execute(None, || ());
    }
}

fn open_gate_1k(size: usize) {
    let gate = Arc::new(GatedExecutor::new());
    let mut threads = Vec::new();
    for _ in 0..size {
        let gate = gate.clone();
        let tid = thread::spawn(move || for _ in 0..1024 {
            let _ = gate.execute(None, || ());
        });
        threads.push(tid);
    }

    for tid in threads {
        let _ = tid.join().unwrap();
    }
}

fn release_64_parked() {
    let gate = Arc::new(GatedExecutor::new());
    gate.engage_back_pressure();
    let mut threads = Vec::new();
    for _ in 0..64 {
        let gate = gate.clone();
        let tid = thread::spawn(move || { gate.execute(None, || ()); });
        threads.push(tid);
    }

    while gate.pending() < 64 {
        thread::yield_now();
    }
    gate.remove_back_pressure();

    for tid in threads {
        let _ = tid.join().unwrap();
    }
}

fn benchmark(c: &mut Criterion) {
    c.bench_function("gate (open, 1K fast path)", |b| b.iter(|| open_gate_1k_fast_path()));
    c.bench_function("gate (open, 1K X 4)", |b| b.iter(|| open_gate_1k(4)));
    c.bench_function("gate (release 64 parked)", |b| b.iter(|| release_64_parked()));
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
