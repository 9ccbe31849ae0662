use criterion::{Criterion, criterion_group, criterion_main};
use insurance_recommender::boost::GradientBoostingParams;
use insurance_recommender::generate::{TableRow, generate};
use insurance_recommender::train::{TrainingConfig, train};
use insurance_recommender::{CustomerProfile, RecommendationEngine};
use std::hint::black_box;

fn engine() -> RecommendationEngine {
    let rows: Vec<TableRow> = generate(1000, 42).iter().map(TableRow::from).collect();
    let outcome = train(&rows, &TrainingConfig::default()).expect("training failed");
    RecommendationEngine::new(outcome.model, outcome.encoders).expect("mismatched artifacts")
}

fn bench_recommend_single(c: &mut Criterion) {
    let engine = engine();
    let profile = CustomerProfile::parse(34, "married", true, "medium", "new_baby").unwrap();

    c.bench_function("recommend one profile", |b| {
        b.iter(|| {
            let _ = engine.recommend(black_box(&profile));
        })
    });
}

fn bench_train(c: &mut Criterion) {
    let rows: Vec<TableRow> = generate(1000, 42).iter().map(TableRow::from).collect();
    let config = TrainingConfig {
        params: GradientBoostingParams::new().n_estimators(20),
        ..TrainingConfig::default()
    };

    let mut group = c.benchmark_group("training");
    group.sample_size(10);
    group.bench_function("train 1k rows, 20 rounds", |b| {
        b.iter(|| {
            let _ = train(black_box(&rows), &config);
        })
    });
    group.finish();
}

criterion_group!(benches, bench_recommend_single, bench_train);
criterion_main!(benches);
