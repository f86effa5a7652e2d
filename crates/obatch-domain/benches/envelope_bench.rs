//! Benchmark for envelope parsing.
//!
//! Run with: cargo bench -p obatch-domain

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use obatch_domain::parse_envelope;

fn build_envelope(parts: usize) -> String {
    let mut body = String::new();
    for i in 0..parts {
        body.push_str("--batch\r\nContent-Type: application/http\r\n\r\n");
        if i % 2 == 0 {
            body.push_str("GET Sales?$top=10&$orderby=name HTTP/1.1\r\nAccept: application/json\r\n\r\n");
        } else {
            body.push_str(&format!(
                "POST Sales HTTP/1.1\r\nContent-Type: application/json\r\n\r\n{{\"__id\":\"k{i}\",\"name\":\"n{i}\"}}\r\n"
            ));
        }
    }
    body.push_str("--batch--\r\n");
    body
}

fn envelope_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse_envelope");
    for parts in [1usize, 100, 1000] {
        let body = build_envelope(parts);
        group.bench_with_input(BenchmarkId::from_parameter(parts), &body, |b, body| {
            b.iter(|| parse_envelope(black_box("batch"), black_box(body)))
        });
    }
    group.finish();
}

criterion_group!(benches, envelope_benchmark);
criterion_main!(benches);
