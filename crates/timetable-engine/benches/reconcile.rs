use std::hint::black_box;

use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use timetable_engine::reconcile::Window;
use timetable_engine::{
    CollisionDetector, EngineConfig, MemoryStore, RecurrenceRule, Reconciler, Series,
    SeriesRepository,
};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap()
}

fn hourly_for(days: i64) -> Series {
    Series::new(t0(), t0() + Duration::minutes(30))
        .with_rule(RecurrenceRule::hourly())
        .with_recurring_period_end(t0() + Duration::days(days))
}

/// Planning against a fully stored series: the common "nothing to do" path.
fn bench_plan_complete(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_complete");
    for days in [7, 30, 90] {
        let config = EngineConfig::default();
        let mut store: MemoryStore = MemoryStore::new();
        let series = store.insert_series(hourly_for(days)).unwrap();
        Reconciler::new(&config)
            .reconcile(&mut store, &series, Window::full(), true, &())
            .unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(days), &series, |b, series| {
            b.iter(|| {
                Reconciler::new(&config)
                    .plan(&store, black_box(series), Window::full(), &())
                    .unwrap()
            })
        });
    }
    group.finish();
}

/// Planning against half-stored series across batch sizes.
fn bench_plan_gaps(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan_gaps");
    for batch in [10, 100, 500] {
        let config = EngineConfig::default().with_max_batch_size(batch);
        let mut store: MemoryStore = MemoryStore::new();
        let series = store.insert_series(hourly_for(30)).unwrap();
        Reconciler::new(&config)
            .reconcile(
                &mut store,
                &series,
                Window::ending(t0() + Duration::days(15)),
                true,
                &(),
            )
            .unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(batch), &series, |b, series| {
            b.iter(|| {
                Reconciler::new(&config)
                    .plan(&store, black_box(series), Window::full(), &())
                    .unwrap()
            })
        });
    }
    group.finish();
}

fn bench_collision(c: &mut Criterion) {
    let config = EngineConfig::default();
    let mut store: MemoryStore = MemoryStore::new();
    let calendar = store.add_calendar(true);
    let stored = store.insert_series(hourly_for(30).in_calendar(calendar)).unwrap();
    Reconciler::new(&config)
        .reconcile(&mut store, &stored, Window::full(), true, &())
        .unwrap();

    // Fits in the gaps between the stored half hours.
    let start = t0() + Duration::minutes(30);
    let candidate = Series::new(start, start + Duration::minutes(30))
        .with_rule(RecurrenceRule::hourly())
        .with_recurring_period_end(start + Duration::days(30))
        .in_calendar(calendar);

    c.bench_function("collision_free_month", |b| {
        b.iter(|| {
            CollisionDetector::new(&config)
                .find_series_collision(&store, calendar, black_box(&candidate))
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_plan_complete, bench_plan_gaps, bench_collision);
criterion_main!(benches);
