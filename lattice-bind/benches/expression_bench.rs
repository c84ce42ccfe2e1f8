//! Benchmarks for expression parsing, evaluation, and signal propagation.
//!
//! Run with: `cargo bench -p lattice-bind --bench expression_bench`

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

use lattice_bind::expr::{parse, ExpressionCache};
use lattice_bind::{
    batch, computed, deep_ref, evaluate, parse_expression, standard_globals, watch_effect,
    EvalOptions, Signal, Value,
};

const SOURCES: &[(&str, &str)] = &[
    ("short", "a + b * c"),
    ("member", "user.profile.address.city"),
    (
        "template",
        "`${user.name} has ${items.filter(x => x.done).length} of ${items.length} done`",
    ),
    (
        "handler",
        "selected = items.find(x => x.id === $event.id) ?? null; open = !!selected",
    ),
];

// =============================================================================
// Parsing
// =============================================================================

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("expr/parse");

    for &(name, source) in SOURCES {
        group.throughput(Throughput::Bytes(source.len() as u64));
        group.bench_with_input(BenchmarkId::new("uncached", name), source, |b, source| {
            b.iter(|| black_box(parse(black_box(source))))
        });
    }

    let cache = ExpressionCache::new();
    for &(_, source) in SOURCES {
        let _ = cache.parse(source);
    }
    for &(name, source) in SOURCES {
        group.bench_with_input(BenchmarkId::new("cache_hit", name), source, |b, source| {
            b.iter(|| black_box(cache.parse(black_box(source))))
        });
    }

    group.finish();
}

// =============================================================================
// Evaluation
// =============================================================================

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("expr/evaluate");

    let items: Vec<_> = (0..100)
        .map(|i| json!({ "id": i, "done": i % 3 == 0 }))
        .collect();
    let state = json!({
        "a": 1,
        "b": 2,
        "c": 3,
        "user": { "name": "Ada", "profile": { "address": { "city": "Oslo" } } },
        "items": items,
    });
    let plain = [Value::from_json(&state)];
    let reactive = [Value::Signal(deep_ref(Value::from_json(&state)))];
    let globals = Value::Object(standard_globals());

    for &(name, source) in &SOURCES[..3] {
        let Ok(ast) = parse_expression(source) else {
            continue;
        };
        group.bench_function(BenchmarkId::new("plain", name), |b| {
            b.iter(|| black_box(evaluate(&ast, &plain, &globals, &EvalOptions::new())))
        });
        let collecting = EvalOptions::new().collecting();
        group.bench_function(BenchmarkId::new("deep_ref", name), |b| {
            b.iter(|| black_box(evaluate(&ast, &reactive, &globals, &collecting)))
        });
    }

    group.finish();
}

// =============================================================================
// Propagation
// =============================================================================

fn bench_propagation(c: &mut Criterion) {
    let mut group = c.benchmark_group("reactive/propagation");

    for &fanout in &[1usize, 10, 100] {
        let source = Signal::new(0);
        let effects: Vec<_> = (0..fanout)
            .map(|_| {
                let s = source.clone();
                watch_effect(move |_| {
                    black_box(s.read());
                })
            })
            .collect();

        group.throughput(Throughput::Elements(fanout as u64));
        group.bench_with_input(BenchmarkId::new("effects", fanout), &fanout, |b, _| {
            let mut n = 0;
            b.iter(|| {
                n += 1;
                source.write(n).unwrap();
            })
        });

        for effect in effects {
            effect.stop();
        }
    }

    for &length in &[10usize, 100] {
        let head = Signal::new(0);
        let mut tail = head.clone();
        for _ in 0..length {
            let previous = tail.clone();
            tail = computed(move || previous.read().to_number() + 1.0);
        }

        group.bench_with_input(BenchmarkId::new("computed_chain", length), &length, |b, _| {
            let mut n = 0;
            b.iter(|| {
                n += 1;
                head.write(n).unwrap();
                black_box(tail.read())
            })
        });
    }

    let signals: Vec<Signal> = (0..100).map(Signal::new).collect();
    let watcher = {
        let signals = signals.clone();
        watch_effect(move |_| {
            for s in &signals {
                black_box(s.read());
            }
        })
    };
    group.bench_function("batched_writes_100", |b| {
        let mut n = 0;
        b.iter(|| {
            n += 1;
            batch(|| {
                for s in &signals {
                    s.write(n).unwrap();
                }
            })
        })
    });
    watcher.stop();

    group.finish();
}

criterion_group!(benches, bench_parse, bench_evaluate, bench_propagation);
criterion_main!(benches);
