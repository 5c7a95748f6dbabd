//! # Lifecycle Scenarios
//!
//! End-to-end play-throughs through the public API, persisted to a real redb
//! database and read back.

use escape_core::puzzles::{self, FORMATTED_CODE, SEQUENCE_END};
use escape_core::{
    CompletionReason, LifecycleController, PerformanceRating, Phase, PlayerProfile, Points,
    RedbStore, SessionStore, StageKind, StoreGateway, Submission, SyncPolicy, TruthTable,
    refresh_stats,
};
use chrono::Utc;
use std::path::Path;
use tempfile::tempdir;

fn player(name: &str) -> PlayerProfile {
    PlayerProfile {
        name: name.to_string(),
        course: "Bachelor of IT".to_string(),
        module: "Web Development".to_string(),
    }
}

fn controller_on(path: &Path, name: &str) -> LifecycleController {
    let store = RedbStore::open(path).expect("open db");
    LifecycleController::new(
        player(name),
        Box::new(StoreGateway::new(store)),
        SyncPolicy::BestEffort,
    )
}

/// Submissions that solve each stage.
fn solution(kind: StageKind) -> Submission {
    match kind {
        StageKind::CodeFormat => Submission::Code(FORMATTED_CODE.to_string()),
        StageKind::DebugClick => Submission::Selection(2),
        StageKind::NumberGenerator => Submission::Sequence((0..=SEQUENCE_END).collect()),
        StageKind::DataPort => Submission::Csv(puzzles::expected_csv()),
        StageKind::CssPuzzle => Submission::Css(puzzles::EXPECTED_CSS.to_string()),
        StageKind::LogicGate => Submission::TruthTable(TruthTable {
            input1: true,
            input2: false,
            input3: true,
            output: true,
        }),
    }
}

#[test]
fn full_escape_is_persisted() {
    let temp = tempdir().expect("temp dir");
    let db_path = temp.path().join("game.redb");

    let session_id = {
        let mut c = controller_on(&db_path, "Aroha");
        c.start(Some(30)).expect("start");

        while c.phase() == Phase::InProgress {
            let stage = c.current_stage();
            let verdict = puzzles::check(stage.kind, &solution(stage.kind)).expect("check");
            assert!(verdict.is_correct(), "stage {} rejected", stage.id);
            c.advance(45);
            c.complete_stage(stage.id, c.stage_elapsed()).expect("complete");
        }

        assert_eq!(c.phase(), Phase::Completed(CompletionReason::Escaped));
        assert_eq!(c.time_remaining(), 1800 - 6 * 45);
        assert_eq!(
            PerformanceRating::for_state(c.state()),
            PerformanceRating::MasterCoder
        );
        c.session_id().expect("session id")
    };

    // Reopen: everything the controller sent is on disk.
    let mut store = RedbStore::open(&db_path).expect("reopen db");
    let record = store.get_session(session_id).expect("get").expect("present");
    assert!(record.session.is_completed);
    assert!(record.session.end_time.is_some());
    assert_eq!(record.session.score, Points::from_millis(6 * 99_250));
    assert_eq!(record.custom_timer.map(|t| t.duration), Some(30));
    assert_eq!(record.stages.len(), 6);
    assert!(record.stages.iter().all(|s| s.completed && s.time_spent == 45));

    let stats = refresh_stats(&mut store, Utc::now()).expect("stats");
    assert_eq!(stats.total_games, 1);
    assert_eq!(stats.completed_games, 1);
    assert_eq!(stats.average_time_millis, 6 * 45 * 1000);
}

#[test]
fn fifteen_minute_timeout() {
    let temp = tempdir().expect("temp dir");
    let db_path = temp.path().join("timeout.redb");

    let mut c = controller_on(&db_path, "Tane");
    c.start(Some(15)).expect("start");
    assert_eq!(c.state().total_time, 900);
    assert_eq!(c.time_remaining(), 900);

    c.complete_stage(1, 30).expect("complete");
    assert_eq!(c.score(), Points::from_millis(99_500));

    for _ in 0..900 {
        c.tick();
    }
    assert_eq!(c.phase(), Phase::Completed(CompletionReason::TimeUp));
    assert_eq!(c.time_remaining(), 0);
    assert_eq!(
        PerformanceRating::for_state(c.state()),
        PerformanceRating::TryAgain
    );
    let id = c.session_id().expect("session id");
    drop(c);

    let store = RedbStore::open(&db_path).expect("reopen db");
    let record = store.get_session(id).expect("get").expect("present");
    assert_eq!(record.session.time_remaining, 0);
    assert_eq!(record.stages.len(), 1);
}

#[test]
fn play_again_creates_a_second_session() {
    let temp = tempdir().expect("temp dir");
    let db_path = temp.path().join("again.redb");

    let mut c = controller_on(&db_path, "Mere");
    c.start(None).expect("start");
    c.complete_stage(1, 20).expect("complete");
    c.reset();
    c.start(None).expect("restart");
    let second = c.session_id().expect("session id");
    drop(c);

    let store = RedbStore::open(&db_path).expect("reopen db");
    let sessions = store.list_sessions().expect("list");
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0].session.id, second);
    assert_eq!(sessions[1].stages.len(), 1);
}
