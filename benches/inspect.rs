//! Criterion benchmarks for query inspection.
//!
//! Run with:
//!   cargo bench --bench inspect
//!
//! These cover the work done for every intercepted statement before any database
//! round trip: placeholder binding, then classification, then table extraction, then static hints.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mysql_indexer::inspect::{
    bind_parameters, classify, extract_table, hints, BindValue, Bindings, MySqlQuoter,
    QueryEvent, SqlInspection,
};

/// Binding alone, positional and named, including a placeholder inside a literal.
fn bench_binding(c: &mut Criterion) {
    let mut group = c.benchmark_group("inspect/bind");

    let positional = Bindings::Positional(vec![
        BindValue::Int(42),
        BindValue::from("O'Reilly"),
        BindValue::Float(9.5),
        BindValue::Null,
    ]);
    let named = Bindings::Named(vec![
        ("id".to_string(), BindValue::Int(42)),
        ("email".to_string(), BindValue::from("a@example.com")),
    ]);

    let cases: &[(&str, &str, &Bindings)] = &[
        (
            "positional",
            "SELECT * FROM users WHERE id = ? AND name = ? AND score > ? AND deleted_at IS ?",
            &positional,
        ),
        (
            "positional_with_literal",
            "SELECT * FROM users WHERE note = 'what?' AND id = ? AND name = ?",
            &positional,
        ),
        (
            "named",
            "SELECT * FROM users WHERE id = :id AND email = :email",
            &named,
        ),
    ];

    for (name, sql, bindings) in cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), sql, |b, sql| {
            b.iter(|| bind_parameters(black_box(sql), bindings, &MySqlQuoter))
        });
    }

    group.finish();
}

/// Classification, table extraction and hints over already-bound SQL.
fn bench_heuristics(c: &mut Criterion) {
    let mut group = c.benchmark_group("inspect/heuristics");

    let cases: &[(&str, &str)] = &[
        ("simple_select", "SELECT id, name FROM users WHERE id = 1"),
        ("select_star_no_where", "SELECT * FROM users"),
        (
            "join",
            "select u.id, o.total from `orders` o join users u on u.id = o.user_id \
             where o.status != 'paid' order by rand() limit 10",
        ),
        (
            "leading_wildcard_like",
            "SELECT id FROM users WHERE email LIKE '%@example.com' LIMIT 5",
        ),
        ("update", "UPDATE users SET active = 0 WHERE id = 1"),
    ];

    for (name, sql) in cases {
        group.bench_with_input(BenchmarkId::from_parameter(name), sql, |b, sql| {
            b.iter(|| {
                let sql = black_box(*sql);
                (classify(sql), extract_table(sql), hints::analyze(sql))
            })
        });
    }

    group.finish();
}

/// The full per-event pipeline the engine runs before deciding whether to trial.
fn bench_inspection(c: &mut Criterion) {
    let event = QueryEvent::new("select * from users where email = ? and status = ? limit 1")
        .with_bindings(Bindings::Positional(vec![
            BindValue::from("a@example.com"),
            BindValue::Int(1),
        ]));
    c.bench_function("inspect/from_event", |b| {
        b.iter(|| SqlInspection::from_event(black_box(&event), &MySqlQuoter))
    });
}

criterion_group!(benches, bench_binding, bench_heuristics, bench_inspection);
criterion_main!(benches);
