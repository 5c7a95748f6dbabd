//! # Lifecycle Benchmarks
//!
//! Performance benchmarks for escape-core gameplay and storage operations.
//!
//! Run with: `cargo bench -p escape-core`

use chrono::Utc;
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use escape_core::puzzles::{self, FORMATTED_CODE};
use escape_core::{
    GameStats, LifecycleController, MemoryStore, NewSession, PlayerProfile, SessionStore,
    StoreGateway, SyncPolicy,
};
use std::hint::black_box;

fn controller() -> LifecycleController {
    LifecycleController::new(
        PlayerProfile {
            name: "bench".to_string(),
            course: "BIT".to_string(),
            module: "Web".to_string(),
        },
        Box::new(StoreGateway::new(MemoryStore::new())),
        SyncPolicy::BestEffort,
    )
}

/// Create a store holding `size` sessions, every other one completed.
fn populated_store(size: usize) -> MemoryStore {
    let mut store = MemoryStore::new();
    for i in 0..size {
        let new = NewSession {
            player_name: format!("player-{}", i),
            course: "BIT".to_string(),
            module: "Web".to_string(),
            total_time: 2700,
            time_remaining: 2700,
            custom_timer_duration: None,
        };
        let id = store
            .create_session(&new, Utc::now())
            .expect("create")
            .session
            .id;
        if i % 2 == 0 {
            let update = escape_core::SessionUpdate {
                is_completed: Some(true),
                time_remaining: Some(1200),
                ..Default::default()
            };
            store.update_session(id, &update, Utc::now()).expect("update");
        }
    }
    store
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_full_play_through(c: &mut Criterion) {
    c.bench_function("full_play_through", |b| {
        b.iter(|| {
            let mut game = controller();
            game.start(Some(15)).expect("start");
            for stage in 1..=6u8 {
                game.advance(30);
                game.complete_stage(stage, game.stage_elapsed())
                    .expect("complete");
            }
            black_box(game.score())
        });
    });
}

fn bench_countdown(c: &mut Criterion) {
    c.bench_function("countdown_45_minutes", |b| {
        b.iter(|| {
            let mut game = controller();
            game.start(None).expect("start");
            game.advance(black_box(2700));
            black_box(game.phase())
        });
    });
}

fn bench_code_check(c: &mut Criterion) {
    c.bench_function("check_code_format", |b| {
        b.iter(|| black_box(puzzles::check_code_format(black_box(FORMATTED_CODE))));
    });
}

fn bench_stats_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("stats_aggregation");

    for size in [100, 1000, 5000].iter() {
        let store = populated_store(*size);
        let records = store.list_sessions().expect("list");

        group.bench_with_input(BenchmarkId::from_parameter(size), &records, |b, records| {
            b.iter(|| {
                black_box(GameStats::from_sessions(
                    records.iter().map(|r| &r.session),
                    Utc::now(),
                ))
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_full_play_through,
    bench_countdown,
    bench_code_check,
    bench_stats_aggregation
);
criterion_main!(benches);
