//! Benchmarks for the per-row cast and validate path.
//!
//! Benchmark targets:
//! - Primitive casts + declarative rules: <20us per row
//! - Registered filters: <10us per row
//! - Date casting (free form): <5us per value

// Criterion macros generate items without docs - this is expected for benchmarks
#![allow(missing_docs)]
// Benchmark setup uses unwrap for simplicity
#![allow(clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use csv_importer::filters::{FilterRegistry, Subject};
use csv_importer::rules::{DateCaster, DatePrecision, RuleResolver, StandardValidator};
use csv_importer::{FieldRule, ImportDefinition, Row};
use serde_json::{Value, json};

fn definition() -> ImportDefinition {
    ImportDefinition::new()
        .field(
            "serial_number",
            FieldRule::new().required().validate("numeric").cast("int"),
        )
        .field("title", FieldRule::new().validate("required|max:64").cast("lowercase"))
        .field("company", FieldRule::new().validate("in:ESP,Gibson,Fender,Ibanez"))
        .field("email", FieldRule::new().validate("email"))
        .field("released", FieldRule::new().cast("date"))
}

fn registry() -> FilterRegistry {
    let mut registry = FilterRegistry::new();
    registry.register_cast_fn(
        |value| match value {
            Value::String(s) => Value::String(s.to_lowercase()),
            other => other,
        },
        Some("lowercase"),
    );
    registry.register_validation_fn(
        |subject: Subject<'_>| subject.get("title").is_some_and(|v| !v.is_null()),
        Some("has_title"),
    );
    registry
}

fn row(n: usize) -> Row {
    let mut row = Row::new();
    row.insert("serial_number".to_string(), json!(n.to_string()));
    row.insert("title".to_string(), json!(format!("Guitar Model {n}")));
    row.insert("company".to_string(), json!(["ESP", "Gibson", "Ibanez"][n % 3]));
    row.insert("email".to_string(), json!(format!("sales{n}@example.com")));
    row.insert("released".to_string(), json!("2017/02/26"));
    row
}

fn bench_row_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("row_pipeline");
    group.measurement_time(Duration::from_secs(5));

    let resolver = RuleResolver::compile(
        &definition(),
        &registry(),
        Arc::new(StandardValidator::new()),
        DateCaster::new(None),
    )
    .unwrap();

    for size in [1_usize, 100, 1_000] {
        let rows: Vec<Row> = (0..size).map(row).collect();
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::new("cast_and_validate", size), &rows, |b, rows| {
            b.iter(|| {
                for row in rows {
                    let cast = resolver.cast_row(black_box(row.clone()));
                    black_box(resolver.validate_row(&cast).unwrap());
                }
            });
        });
    }

    group.finish();
}

fn bench_date_casting(c: &mut Criterion) {
    let mut group = c.benchmark_group("date_casting");

    let free_form = DateCaster::new(None);
    let strict = DateCaster::new(Some("Y-m-d"));

    group.bench_function("free_form", |b| {
        b.iter(|| free_form.cast(black_box("26.02.2017 13:45"), DatePrecision::DateTime));
    });

    group.bench_function("strict", |b| {
        b.iter(|| strict.cast(black_box("2017-02-26"), DatePrecision::Date));
    });

    group.bench_function("sentinel", |b| {
        b.iter(|| strict.cast(black_box("not a date"), DatePrecision::Date));
    });

    group.finish();
}

criterion_group!(benches, bench_row_pipeline, bench_date_casting);
criterion_main!(benches);
