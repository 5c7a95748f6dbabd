//! Integration tests for the escape room HTTP API.
//!
//! Uses axum-test to test the API handlers without starting a real server.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use axum::http::{HeaderValue, StatusCode, header};
use axum_test::TestServer;
use escape_core::StoreBackend;
use escape_room::api::types::{
    ErrorResponse, HealthResponse, MessageResponse, SessionJson, StageCompletionJson,
    StatsResponse,
};
use escape_room::api::{AppState, create_router};
use escape_room::config::SecurityConfig;
use serde_json::{Value, json};

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Security settings with rate limiting and auth switched off.
fn open_security() -> SecurityConfig {
    SecurityConfig {
        rate_limit: 0,
        ..SecurityConfig::default()
    }
}

/// Create a test server over a fresh in-memory store.
fn create_test_server() -> TestServer {
    server_with(StoreBackend::default(), &open_security())
}

fn server_with(store: StoreBackend, security: &SecurityConfig) -> TestServer {
    let router = create_router(AppState::new(store), security);
    TestServer::new(router).unwrap()
}

fn session_body(name: &str) -> Value {
    json!({
        "playerName": name,
        "course": "BSCS",
        "module": "Web Engineering",
        "totalTime": 2700,
        "timeRemaining": 2700,
    })
}

async fn create_session(server: &TestServer, body: Value) -> SessionJson {
    let response = server.post("/game-sessions").json(&body).await;
    response.assert_status(StatusCode::CREATED);
    response.json()
}

fn stage_body(session_id: u64, stage_id: u8, completed: bool, time_spent: u32) -> Value {
    json!({
        "gameSessionId": session_id,
        "stageId": stage_id,
        "stageTitle": "Code Formatter",
        "stageType": "code-format",
        "completed": completed,
        "timeSpent": time_spent,
        "hintsUsed": 1,
    })
}

fn bearer(key: &str) -> HeaderValue {
    format!("Bearer {}", key).parse::<HeaderValue>().unwrap()
}

// =============================================================================
// HEALTH ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let server = create_test_server();

    let response = server.get("/health").await;

    response.assert_status_ok();
    let health: HealthResponse = response.json();
    assert_eq!(health.status, "ok");
    assert_eq!(health.version, env!("CARGO_PKG_VERSION"));
}

// =============================================================================
// SESSION ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_create_session_returns_record() {
    let server = create_test_server();

    let session = create_session(&server, session_body("Ayesha")).await;

    assert!(session.id > 0);
    assert_eq!(session.player_name, "Ayesha");
    assert_eq!(session.total_time, 2700);
    assert_eq!(session.time_remaining, 2700);
    assert_eq!(session.score, 0.0);
    assert!(!session.is_completed);
    assert!(session.end_time.is_none());
    assert!(session.custom_timer.is_none());
    assert!(session.stages.is_empty());
}

#[tokio::test]
async fn test_create_session_with_custom_timer() {
    let server = create_test_server();

    let session = create_session(
        &server,
        json!({
            "playerName": "Bilal",
            "course": "BSSE",
            "module": "Web",
            "totalTime": 900,
            "timeRemaining": 900,
            "customTimerDuration": 15,
        }),
    )
    .await;

    let timer = session.custom_timer.expect("custom timer");
    assert_eq!(timer.duration, 15);
    assert_eq!(timer.game_session_id, session.id);
}

#[tokio::test]
async fn test_create_session_defaults_times() {
    let server = create_test_server();

    let session = create_session(
        &server,
        json!({"playerName": "Sara", "course": "BSIT", "module": "Web", "totalTime": 0}),
    )
    .await;

    assert_eq!(session.total_time, 2700);
    assert_eq!(session.time_remaining, 2700);
}

#[tokio::test]
async fn test_create_session_missing_fields_is_400() {
    let server = create_test_server();

    let response = server
        .post("/game-sessions")
        .json(&json!({"playerName": "Sara", "course": "  "}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let error: ErrorResponse = response.json();
    assert!(error.error.contains("course"), "{}", error.error);
    assert!(error.error.contains("module"), "{}", error.error);
}

#[tokio::test]
async fn test_create_session_remaining_above_total_is_400() {
    let server = create_test_server();

    let mut body = session_body("Sara");
    body["timeRemaining"] = json!(5000);
    let response = server.post("/game-sessions").json(&body).await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_sessions_newest_first() {
    let server = create_test_server();
    let first = create_session(&server, session_body("First")).await;
    let second = create_session(&server, session_body("Second")).await;

    let response = server.get("/game-sessions").await;

    response.assert_status_ok();
    let sessions: Vec<SessionJson> = response.json();
    let ids: Vec<u64> = sessions.iter().map(|s| s.id).collect();
    assert_eq!(ids, vec![second.id, first.id]);
}

#[tokio::test]
async fn test_get_session_includes_stages() {
    let server = create_test_server();
    let session = create_session(&server, session_body("Hamza")).await;
    server
        .post("/stages")
        .json(&stage_body(session.id, 1, true, 30))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server.get(&format!("/game-sessions/{}", session.id)).await;

    response.assert_status_ok();
    let fetched: SessionJson = response.json();
    assert_eq!(fetched.stages.len(), 1);
    assert_eq!(fetched.stages[0].stage_id, 1);
    assert!(fetched.stages[0].completed_at.is_some());
}

#[tokio::test]
async fn test_get_unknown_session_is_404() {
    let server = create_test_server();

    server.get("/game-sessions/999").await.assert_status_not_found();
    server.get("/game-sessions/abc").await.assert_status_not_found();
}

#[tokio::test]
async fn test_update_session_partial() {
    let server = create_test_server();
    let session = create_session(&server, session_body("Zara")).await;

    let response = server
        .put(&format!("/game-sessions/{}", session.id))
        .json(&json!({"score": 199.25, "hintsUsed": 2}))
        .await;

    response.assert_status_ok();
    let updated: SessionJson = response.json();
    assert_eq!(updated.score, 199.25);
    assert_eq!(updated.hints_used, 2);
    assert_eq!(updated.time_remaining, 2700);
    assert!(!updated.is_completed);
}

#[tokio::test]
async fn test_update_session_completion() {
    let server = create_test_server();
    let session = create_session(&server, session_body("Zara")).await;

    let response = server
        .put(&format!("/game-sessions/{}", session.id))
        .json(&json!({
            "isCompleted": true,
            "endTime": "2026-10-19T10:30:00Z",
            "timeRemaining": 0,
        }))
        .await;

    response.assert_status_ok();
    let updated: SessionJson = response.json();
    assert!(updated.is_completed);
    assert_eq!(updated.time_remaining, 0);
    assert_eq!(
        updated.end_time.map(|t| t.to_rfc3339()),
        Some("2026-10-19T10:30:00+00:00".to_string())
    );
}

#[tokio::test]
async fn test_update_unknown_session_is_404() {
    let server = create_test_server();

    let response = server
        .put("/game-sessions/42")
        .json(&json!({"score": 10}))
        .await;

    response.assert_status_not_found();
}

#[tokio::test]
async fn test_delete_session_cascades() {
    let server = create_test_server();
    let session = create_session(&server, session_body("Omar")).await;
    server
        .post("/stages")
        .json(&stage_body(session.id, 1, true, 30))
        .await
        .assert_status(StatusCode::CREATED);

    let response = server.delete(&format!("/game-sessions/{}", session.id)).await;

    response.assert_status_ok();
    let message: MessageResponse = response.json();
    assert!(message.message.contains("deleted"));
    server
        .get(&format!("/game-sessions/{}", session.id))
        .await
        .assert_status_not_found();
}

#[tokio::test]
async fn test_delete_unknown_session_is_500() {
    let server = create_test_server();

    let response = server.delete("/game-sessions/999").await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let error: ErrorResponse = response.json();
    // Storage details stay in the server log.
    assert_eq!(error.error, "Failed to delete game session");
}

// =============================================================================
// STAGE ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_stage_upsert_keeps_one_row() {
    let server = create_test_server();
    let session = create_session(&server, session_body("Noor")).await;

    let first: StageCompletionJson = server
        .post("/stages")
        .json(&stage_body(session.id, 1, false, 10))
        .await
        .json();
    assert!(first.completed_at.is_none());

    let second: StageCompletionJson = server
        .post("/stages")
        .json(&stage_body(session.id, 1, true, 40))
        .await
        .json();

    assert_eq!(second.id, first.id);
    assert!(second.completed);
    assert_eq!(second.time_spent, 40);
    assert!(second.completed_at.is_some());

    let fetched: SessionJson = server
        .get(&format!("/game-sessions/{}", session.id))
        .await
        .json();
    assert_eq!(fetched.stages.len(), 1);
}

#[tokio::test]
async fn test_stage_accepts_string_session_id() {
    let server = create_test_server();
    let session = create_session(&server, session_body("Noor")).await;

    let mut body = stage_body(session.id, 2, true, 12);
    body["gameSessionId"] = json!(session.id.to_string());
    let response = server.post("/stages").json(&body).await;

    response.assert_status(StatusCode::CREATED);
    let stage: StageCompletionJson = response.json();
    assert_eq!(stage.game_session_id, session.id);
}

#[tokio::test]
async fn test_stage_missing_completed_is_400() {
    let server = create_test_server();
    let session = create_session(&server, session_body("Noor")).await;

    let mut body = stage_body(session.id, 1, true, 12);
    body.as_object_mut().unwrap().remove("completed");
    let response = server.post("/stages").json(&body).await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let error: ErrorResponse = response.json();
    assert!(error.error.contains("completed"), "{}", error.error);
}

#[tokio::test]
async fn test_stage_out_of_range_is_400() {
    let server = create_test_server();
    let session = create_session(&server, session_body("Noor")).await;

    let response = server
        .post("/stages")
        .json(&stage_body(session.id, 7, true, 12))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stage_unknown_session_is_404() {
    let server = create_test_server();

    server
        .post("/stages")
        .json(&stage_body(77, 1, true, 12))
        .await
        .assert_status_not_found();

    let mut body = stage_body(1, 1, true, 12);
    body["gameSessionId"] = json!("not-a-number");
    server
        .post("/stages")
        .json(&body)
        .await
        .assert_status_not_found();
}

// =============================================================================
// STATISTICS ENDPOINT TESTS
// =============================================================================

#[tokio::test]
async fn test_stats_empty() {
    let server = create_test_server();

    let response = server.get("/game-stats").await;

    response.assert_status_ok();
    let stats: StatsResponse = response.json();
    assert_eq!(stats.total_games, 0);
    assert_eq!(stats.completed_games, 0);
    assert_eq!(stats.average_score, 0.0);
    assert_eq!(stats.average_time, 0.0);
}

#[tokio::test]
async fn test_stats_are_recomputed() {
    let server = create_test_server();
    let done = create_session(&server, session_body("Done")).await;
    let open = create_session(&server, session_body("Open")).await;
    server
        .put(&format!("/game-sessions/{}", done.id))
        .json(&json!({"score": 500, "isCompleted": true, "timeRemaining": 900, "hintsUsed": 2}))
        .await
        .assert_status_ok();
    server
        .put(&format!("/game-sessions/{}", open.id))
        .json(&json!({"hintsUsed": 3}))
        .await
        .assert_status_ok();

    let stats: StatsResponse = server.get("/game-stats").await.json();

    assert_eq!(stats.total_games, 2);
    assert_eq!(stats.completed_games, 1);
    assert_eq!(stats.average_score, 500.0);
    // 2700 - 900 seconds = 30 minutes.
    assert_eq!(stats.average_time, 30.0);
    assert_eq!(stats.total_hints_used, 5);
}

#[tokio::test]
async fn test_stats_manual_overwrite() {
    let server = create_test_server();

    let response = server
        .post("/game-stats")
        .json(&json!({"totalGames": 10, "averageTime": 12.5}))
        .await;

    response.assert_status_ok();
    let stats: StatsResponse = response.json();
    assert_eq!(stats.total_games, 10);
    assert_eq!(stats.completed_games, 0);
    assert_eq!(stats.average_time, 12.5);
}

#[tokio::test]
async fn test_stats_negative_time_is_400() {
    let server = create_test_server();

    server
        .post("/game-stats")
        .json(&json!({"averageTime": -1}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

// =============================================================================
// PERSISTENCE TESTS
// =============================================================================

#[tokio::test]
async fn test_redb_backend_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("api.db");

    let id = {
        let server = server_with(
            StoreBackend::open_persistent(&path).unwrap(),
            &open_security(),
        );
        create_session(&server, session_body("Persisted")).await.id
    };

    let server = server_with(
        StoreBackend::open_persistent(&path).unwrap(),
        &open_security(),
    );
    let fetched: SessionJson = server.get(&format!("/game-sessions/{}", id)).await.json();
    assert_eq!(fetched.player_name, "Persisted");
}

// =============================================================================
// ERROR HANDLING TESTS
// =============================================================================

#[tokio::test]
async fn test_404_on_unknown_endpoint() {
    let server = create_test_server();

    server.get("/unknown").await.assert_status_not_found();
}

#[tokio::test]
async fn test_method_not_allowed() {
    let server = create_test_server();

    // /stages is POST only
    let response = server.get("/stages").await;
    assert_eq!(response.status_code().as_u16(), 405);
}

#[tokio::test]
async fn test_invalid_json_body_is_400() {
    let server = create_test_server();

    let response = server
        .post("/game-sessions")
        .bytes(bytes::Bytes::from("not valid json"))
        .content_type("application/json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let error: ErrorResponse = response.json();
    assert!(!error.error.is_empty());
}

// =============================================================================
// SECURITY MIDDLEWARE TESTS
// =============================================================================

fn auth_server(api_key: &str) -> TestServer {
    let security = SecurityConfig {
        api_key: Some(api_key.to_string()),
        ..open_security()
    };
    server_with(StoreBackend::default(), &security)
}

#[tokio::test]
async fn test_auth_valid_bearer_token() {
    let server = auth_server("test-secret-key-12345");

    let response = server
        .get("/game-sessions")
        .add_header(header::AUTHORIZATION, bearer("test-secret-key-12345"))
        .await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_auth_valid_raw_token() {
    let server = auth_server("test-raw-key-67890");

    let response = server
        .get("/game-stats")
        .add_header(
            header::AUTHORIZATION,
            "test-raw-key-67890".parse::<HeaderValue>().unwrap(),
        )
        .await;

    response.assert_status_ok();
}

#[tokio::test]
async fn test_auth_invalid_token_rejected() {
    let server = auth_server("correct-key");

    server
        .get("/game-sessions")
        .add_header(header::AUTHORIZATION, bearer("wrong-key"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_missing_header_rejected() {
    let server = auth_server("correct-key");

    server
        .post("/game-sessions")
        .json(&session_body("Intruder"))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_health_endpoint_bypasses_auth() {
    let server = auth_server("correct-key");

    server.get("/health").await.assert_status_ok();
}

#[tokio::test]
async fn test_empty_configured_key_disables_auth() {
    let server = auth_server("");

    server.get("/game-sessions").await.assert_status_ok();
}

#[tokio::test]
async fn test_rate_limit_rejects_burst() {
    let security = SecurityConfig {
        rate_limit: 1,
        ..open_security()
    };
    let server = server_with(StoreBackend::default(), &security);

    server.get("/health").await.assert_status_ok();
    server
        .get("/health")
        .await
        .assert_status(StatusCode::TOO_MANY_REQUESTS);
}
