//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::play::{PlayLoop, format_clock};
use crate::api::{self, types::SessionJson, types::StatsResponse};
use crate::config::{Backend, Settings};
use crate::remote::HttpGateway;
use chrono::Utc;
use escape_core::{
    EscapeError, LifecycleController, PlayerProfile, STAGES, SessionGateway, SessionId,
    SessionRecord, SessionStore, StoreBackend, StoreGateway, refresh_stats,
};
use std::time::Instant;

/// Print a value as pretty JSON.
fn print_json(value: &impl serde::Serialize) -> Result<(), EscapeError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| EscapeError::SerializationError(e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server.
pub async fn cmd_server(settings: &Settings) -> Result<(), EscapeError> {
    let store = open_store(settings)?;

    println!("Escape Room Server Starting...");
    println!();
    println!("Configuration:");
    println!("  Host:     {}", settings.host);
    println!("  Port:     {}", settings.port);
    println!("  Backend:  {:?}", settings.backend);
    println!("  Database: {:?}", settings.database);
    println!();
    println!("Endpoints:");
    println!("  GET    /health             - Health check");
    println!("  GET    /game-sessions      - List sessions");
    println!("  POST   /game-sessions      - Create a session");
    println!("  GET    /game-sessions/{{id}} - Fetch a session");
    println!("  PUT    /game-sessions/{{id}} - Update a session");
    println!("  DELETE /game-sessions/{{id}} - Delete a session");
    println!("  POST   /stages             - Save a stage completion");
    println!("  GET    /game-stats         - Aggregate statistics");
    println!("  POST   /game-stats         - Overwrite statistics");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    let addr = format!("{}:{}", settings.host, settings.port);
    api::run_server(&addr, store, &settings.security).await
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database.
pub fn cmd_init(settings: &Settings, force: bool) -> Result<(), EscapeError> {
    let path = &settings.database;
    match settings.backend {
        Backend::Memory => {
            println!("The memory backend needs no initialization");
            Ok(())
        }
        Backend::Redb => {
            if path.exists() {
                if !force {
                    return Err(EscapeError::IoError(
                        "Database already exists. Use --force to overwrite.".to_string(),
                    ));
                }
                std::fs::remove_file(path).map_err(|e| {
                    EscapeError::IoError(format!("Cannot remove {}: {}", path.display(), e))
                })?;
            }
            let _store = StoreBackend::open_persistent(path)?;
            println!("Initialized new redb database at {:?}", path);
            Ok(())
        }
    }
}

// =============================================================================
// SESSION COMMANDS
// =============================================================================

/// List sessions, newest first.
pub fn cmd_sessions(
    settings: &Settings,
    json_mode: bool,
    limit: Option<usize>,
) -> Result<(), EscapeError> {
    let store = open_store(settings)?;
    let records = store.list_sessions()?;
    let shown = &records[..limit.unwrap_or(records.len()).min(records.len())];

    if json_mode {
        let sessions: Vec<SessionJson> = shown.iter().map(SessionJson::from).collect();
        return print_json(&sessions);
    }

    println!("Escape Room Sessions ({} total)", records.len());
    println!("=============================");
    if shown.is_empty() {
        println!("No sessions recorded yet.");
        return Ok(());
    }
    println!(
        "{:>5}  {:<20} {:<12} {:>9} {:>7} {:>6}  {}",
        "ID", "PLAYER", "COURSE", "SCORE", "STAGES", "HINTS", "STATUS"
    );
    for record in shown {
        let s = &record.session;
        let done = record.stages.iter().filter(|st| st.completed).count();
        println!(
            "{:>5}  {:<20} {:<12} {:>9} {:>5}/6 {:>6}  {}",
            s.id,
            truncate(&s.player_name, 20),
            truncate(&s.course, 12),
            s.score.to_string(),
            done,
            s.hints_used,
            if s.is_completed {
                "completed"
            } else {
                "in progress"
            }
        );
    }
    Ok(())
}

/// Show one session.
pub fn cmd_show(settings: &Settings, json_mode: bool, id: &str) -> Result<(), EscapeError> {
    let id: SessionId = id.parse()?;
    let store = open_store(settings)?;
    let record = store
        .get_session(id)?
        .ok_or(EscapeError::SessionNotFound(id))?;

    if json_mode {
        return print_json(&SessionJson::from(&record));
    }
    print_record(&record);
    Ok(())
}

/// Delete one session.
pub fn cmd_delete(settings: &Settings, json_mode: bool, id: &str) -> Result<(), EscapeError> {
    let id: SessionId = id.parse()?;
    let mut store = open_store(settings)?;
    store.delete_session(id)?;

    if json_mode {
        return print_json(&serde_json::json!({ "deleted": id.0 }));
    }
    println!("Deleted session {}", id);
    Ok(())
}

fn print_record(record: &SessionRecord) {
    let s = &record.session;
    println!("Session {}", s.id);
    println!("==========");
    println!("Player:     {}", s.player_name);
    println!("Course:     {}", s.course);
    println!("Module:     {}", s.module);
    println!("Started:    {}", s.start_time.to_rfc3339());
    if let Some(end) = s.end_time {
        println!("Ended:      {}", end.to_rfc3339());
    }
    println!(
        "Time:       {} of {} used",
        format_clock(s.time_spent()),
        format_clock(s.total_time)
    );
    println!("Score:      {}", s.score);
    println!("Hints used: {}", s.hints_used);
    println!("Completed:  {}", s.is_completed);
    if let Some(timer) = &record.custom_timer {
        println!("Custom timer: {} minutes", timer.duration);
    }
    if record.stages.is_empty() {
        return;
    }
    println!();
    println!("Stages:");
    for stage in &record.stages {
        println!(
            "  {} {:<18} {:<17} {:>6}  hints {}  {}",
            stage.stage_id,
            stage.stage_title,
            stage.stage_type.as_str(),
            format_clock(stage.time_spent),
            stage.hints_used,
            if stage.completed { "done" } else { "open" }
        );
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let mut short: String = text.chars().take(width.saturating_sub(1)).collect();
        short.push('~');
        short
    }
}

// =============================================================================
// STATS COMMAND
// =============================================================================

/// Recompute, persist and show aggregate statistics.
pub fn cmd_stats(settings: &Settings, json_mode: bool) -> Result<(), EscapeError> {
    let mut store = open_store(settings)?;
    let stats = refresh_stats(&mut store, Utc::now())?;

    if json_mode {
        return print_json(&StatsResponse::from(&stats));
    }

    println!("Escape Room Statistics");
    println!("======================");
    println!("Database:        {:?}", settings.database);
    println!();
    println!("Total games:     {}", stats.total_games);
    println!("Completed games: {}", stats.completed_games);
    println!("Average score:   {}", stats.average_score);
    println!(
        "Average time:    {}",
        format_clock(u32::try_from(stats.average_time_millis / 1000).unwrap_or(u32::MAX))
    );
    println!("Total hints:     {}", stats.total_hints_used);
    Ok(())
}

// =============================================================================
// STAGES COMMAND
// =============================================================================

/// Show the stage catalog.
pub fn cmd_stages(json_mode: bool, hints: bool) -> Result<(), EscapeError> {
    if json_mode {
        let stages: Vec<serde_json::Value> = STAGES
            .iter()
            .map(|s| {
                let mut value = serde_json::json!({
                    "id": s.id,
                    "title": s.title,
                    "description": s.description,
                    "type": s.kind,
                });
                if hints {
                    value["hints"] = serde_json::json!(s.hints);
                }
                value
            })
            .collect();
        return print_json(&stages);
    }

    println!("Escape Room Stages");
    println!("==================");
    for s in &STAGES {
        println!();
        println!("{}. {} ({})", s.id, s.title, s.kind);
        println!("   {}", s.description);
        if hints {
            for (i, hint) in s.hints.iter().enumerate() {
                println!("   hint {}: {}", i + 1, hint);
            }
        }
    }
    Ok(())
}

// =============================================================================
// PLAY COMMAND
// =============================================================================

/// Play in this terminal.
///
/// Blocking: run it off the async runtime.
pub fn cmd_play(
    settings: &Settings,
    player: PlayerProfile,
    minutes: Option<u32>,
) -> Result<(), EscapeError> {
    let gateway: Box<dyn SessionGateway + Send> = match &settings.server_url {
        Some(url) => {
            tracing::info!(server = %url, "persisting through server");
            Box::new(HttpGateway::new(url, settings.security.api_key.clone())?)
        }
        None => {
            tracing::info!(database = %settings.database.display(), "persisting locally");
            Box::new(StoreGateway::new(open_store(settings)?))
        }
    };
    let controller = LifecycleController::new(player, gateway, settings.sync_policy.into());

    let started = Instant::now();
    let stdin = std::io::stdin();
    let mut play = PlayLoop::new(
        controller,
        minutes,
        stdin.lock(),
        std::io::stdout(),
        move || started.elapsed(),
    );
    play.run()
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Open the configured store.
pub fn open_store(settings: &Settings) -> Result<StoreBackend, EscapeError> {
    match settings.backend {
        Backend::Redb => StoreBackend::open_persistent(&settings.database),
        Backend::Memory => Ok(StoreBackend::default()),
    }
}
