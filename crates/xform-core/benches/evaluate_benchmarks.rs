//! Benchmarks for JSONata and Jolt evaluation
//!
//! Covers compilation, evaluation of common query shapes, Jolt chains, and
//! the full dispatcher path including envelope handling.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};
use xform_core::jolt::Chain;
use xform_core::jsonata::Jsonata;
use xform_core::{Dispatcher, EvaluateRequest};

fn create_test_data() -> Value {
    json!({
        "store": {
            "book": [
                {"category": "reference", "author": "Nigel Rees", "title": "Sayings of the Century", "price": 8.95},
                {"category": "fiction", "author": "Evelyn Waugh", "title": "Sword of Honour", "price": 12.99},
                {"category": "fiction", "author": "Herman Melville", "title": "Moby Dick", "price": 8.99},
                {"category": "fiction", "author": "J. R. R. Tolkien", "title": "The Lord of the Rings", "price": 22.99}
            ],
            "bicycle": {"color": "red", "price": 19.95}
        }
    })
}

fn create_large_data() -> Value {
    let items: Vec<Value> = (0..1000)
        .map(|i| {
            json!({
                "id": i,
                "name": format!("Item {}", i),
                "category": ["A", "B", "C"][i % 3],
                "price": (i as f64) * 1.5 + 10.0,
                "in_stock": i % 2 == 0
            })
        })
        .collect();
    json!({"items": items})
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("jsonata_compile");

    let expressions = vec![
        "store.book[0].title",
        "store.book[price < 10].author",
        "$sum(store.book.price)",
        "store.book^(>price).{ 'title': title, 'price': price }",
        "($cheap := function($b) { $b.price < 10 }; $filter(store.book, $cheap).title)",
    ];

    for expr in expressions {
        group.bench_with_input(BenchmarkId::new("compile", expr), expr, |b, expr| {
            b.iter(|| black_box(Jsonata::compile(black_box(expr))))
        });
    }

    group.finish();
}

fn bench_jsonata(c: &mut Criterion) {
    let mut group = c.benchmark_group("jsonata_evaluate");
    let data = create_test_data();

    let test_cases = vec![
        ("field", "store.bicycle.color"),
        ("mapping", "store.book.author"),
        ("filter", "store.book[category = 'fiction' and price > 10].title"),
        ("aggregate", "$sum(store.book.price)"),
        ("sort", "store.book^(>price).title"),
        ("descendants", "**.price"),
    ];

    for (name, expr) in test_cases {
        let compiled = Jsonata::compile(expr).unwrap();
        group.bench_with_input(BenchmarkId::new("evaluate", name), &compiled, |b, compiled| {
            b.iter(|| black_box(compiled.evaluate(black_box(&data))))
        });
    }

    group.finish();
}

fn bench_large_dataset(c: &mut Criterion) {
    let mut group = c.benchmark_group("large_dataset");
    let data = create_large_data();

    let test_cases = vec![
        ("all_names", "items.name"),
        ("filtered", "items[price > 500].id"),
        ("group_by", "items{category: $count(id)}"),
        ("total", "$sum(items[in_stock].price)"),
    ];

    for (name, expr) in test_cases {
        let compiled = Jsonata::compile(expr).unwrap();
        group.bench_with_input(BenchmarkId::new("large", name), &compiled, |b, compiled| {
            b.iter(|| black_box(compiled.evaluate(black_box(&data))))
        });
    }

    group.finish();
}

fn bench_jolt(c: &mut Criterion) {
    let mut group = c.benchmark_group("jolt_apply");
    let data = create_large_data();

    let chains = vec![
        ("shift", json!([{"operation": "shift", "spec": {"items": {"*": {"id": "ids[]", "name": "items[&1].label"}}}}])),
        ("default_sort", json!([
            {"operation": "default", "spec": {"items": {"*": {"currency": "EUR"}}}},
            {"operation": "sort"}
        ])),
    ];

    for (name, spec) in chains {
        let chain = Chain::from_value(&spec).unwrap();
        group.bench_with_input(BenchmarkId::new("chain", name), &chain, |b, chain| {
            b.iter(|| black_box(chain.apply(black_box(data.clone()))))
        });
    }

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    let dispatcher = Dispatcher::new();
    let body = json!({"expression": "store.book[price < 10].title", "input": create_test_data()}).to_string();
    let request = EvaluateRequest::new("store.book.title", create_test_data());

    group.bench_function("evaluate_request", |b| {
        b.iter(|| black_box(dispatcher.evaluate(black_box(&request))))
    });
    group.bench_function("evaluate_body", |b| {
        b.iter(|| black_box(dispatcher.evaluate_body(black_box(body.as_bytes()))))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_compile,
    bench_jsonata,
    bench_large_dataset,
    bench_jolt,
    bench_dispatch
);
criterion_main!(benches);
