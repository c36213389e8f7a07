//! 정규화 세션 벤치마크
//!
//! MockEngine 위에서 경계 레이어(집계기 reset, 문자열 변환, 결과 핸들 수명)의
//! 호출당 비용을 측정합니다.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use lognorm_core::{NormalizerOptions, RuleSource};
use lognorm_normalizer::{ContextFactory, MockEngine};

const SHORT_MESSAGE: &str = "offline";

const LONG_MESSAGE: &str = "Failed password for root from 192.168.1.100 port 22 ssh2 after 3 previous attempts within 60 seconds exceeding rate limit threshold";

fn bench_normalize(c: &mut Criterion) {
    let engine = Arc::new(MockEngine::new());
    let mut group = c.benchmark_group("normalize");
    group.throughput(Throughput::Elements(1));

    for (name, message) in [("short", SHORT_MESSAGE), ("long", LONG_MESSAGE)] {
        let mut session = ContextFactory::new(engine.clone(), RuleSource::inline("rule=:%all:rest%"))
            .build()
            .unwrap();
        group.bench_with_input(BenchmarkId::new("to_string", name), message, |b, msg| {
            b.iter(|| session.normalize_to_string(black_box(msg)).unwrap())
        });
    }

    group.finish();
}

fn bench_options(c: &mut Criterion) {
    let engine = Arc::new(MockEngine::new());
    let mut session = ContextFactory::new(engine, RuleSource::inline("rule=:%all:rest%"))
        .with_options(
            NormalizerOptions::new()
                .add_original_message(true)
                .add_rule(true)
                .add_rule_location(true),
        )
        .build()
        .unwrap();

    c.bench_function("normalize_with_metadata", |b| {
        b.iter(|| session.normalize_to_string(black_box(SHORT_MESSAGE)).unwrap())
    });
}

fn bench_build(c: &mut Criterion) {
    let engine = Arc::new(MockEngine::new());
    let factory = ContextFactory::new(engine, RuleSource::inline("rule=:%all:rest%"));

    c.bench_function("session_build_close", |b| {
        b.iter(|| {
            let mut session = factory.build().unwrap();
            session.close();
        })
    });
}

criterion_group!(benches, bench_normalize, bench_options, bench_build);
criterion_main!(benches);
