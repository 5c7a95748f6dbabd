//! # Session Lifecycle Controller
//!
//! The state machine behind one play-through:
//!
//! ```text
//! NotStarted --start--> InProgress --last stage--> Completed(Escaped)
//!                           |
//!                           +------timer at 0----> Completed(TimeUp)
//! ```
//!
//! Gameplay state lives in `GameState` and is authoritative. Persistence goes
//! through an injected `SessionGateway`; what happens when a write fails is
//! decided by the controller's `SyncPolicy`. A failed write never rolls back
//! gameplay state.

use crate::catalog::{self, STAGES};
use crate::gateway::SessionGateway;
use crate::primitives::{
    DEFAULT_TOTAL_SECONDS, MAX_CUSTOM_MINUTES, MIN_CUSTOM_MINUTES, STAGE_COUNT, stage_millipoints,
};
use crate::{
    EscapeError, NewSession, Points, SessionId, SessionUpdate, StageCompletionInput,
};
use chrono::Utc;
use std::collections::{BTreeMap, VecDeque};

// =============================================================================
// STATE
// =============================================================================

/// Why a play-through ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionReason {
    /// The last stage was solved.
    Escaped,
    /// The countdown reached zero.
    TimeUp,
}

/// Lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    NotStarted,
    InProgress,
    Completed(CompletionReason),
}

impl Phase {
    /// Human-readable name, used in transition errors.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Phase::NotStarted => "not started",
            Phase::InProgress => "in progress",
            Phase::Completed(_) => "completed",
        }
    }
}

/// Per-stage progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageProgress {
    pub completed: bool,
    /// Index of the last revealed hint.
    pub current_hint: usize,
    pub hints_used: u32,
    /// Seconds reported at completion.
    pub time_spent: u32,
}

/// The full gameplay state of one controller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GameState {
    pub phase: Phase,
    /// Zero-based index into the stage catalog.
    pub current_stage: usize,
    pub stages: [StageProgress; STAGE_COUNT],
    /// Session length in seconds.
    pub total_time: u32,
    /// Seconds left on the countdown, always within `0..=total_time`.
    pub time_remaining: u32,
    pub score: Points,
    pub hints_used: u32,
    /// Persisted session id, once the gateway returned one.
    pub session_id: Option<SessionId>,
    /// Countdown seconds already elapsed when the current stage began.
    stage_started_at: u32,
}

impl GameState {
    /// Seconds elapsed since the session started.
    #[must_use]
    pub fn elapsed(&self) -> u32 {
        self.total_time.saturating_sub(self.time_remaining)
    }

    /// Number of completed stages.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.stages.iter().filter(|s| s.completed).count()
    }
}

/// The player the session is recorded for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerProfile {
    pub name: String,
    pub course: String,
    pub module: String,
}

// =============================================================================
// SYNC POLICY
// =============================================================================

/// What to do when a persistence write fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPolicy {
    /// Log the failure and drop the write.
    #[default]
    BestEffort,
    /// Log the failure and keep the write for `flush_outbox`.
    Outbox,
}

/// Result of a manual save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    /// The gateway accepted the update.
    Saved,
    /// The gateway rejected the update; nothing was kept.
    Failed,
    /// The update is waiting in the outbox.
    Queued,
    /// No session id was ever obtained, so there is nothing to update.
    NoSession,
}

/// A write waiting in the outbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingWrite {
    CreateSession(NewSession),
    UpdateSession(SessionUpdate),
    UpsertStage(StageCompletionInput),
}

impl PendingWrite {
    fn label(&self) -> &'static str {
        match self {
            PendingWrite::CreateSession(_) => "create_session",
            PendingWrite::UpdateSession(_) => "update_session",
            PendingWrite::UpsertStage(_) => "upsert_stage_completion",
        }
    }
}

/// Outbox entry: a write tagged with the play-through it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
struct OutboxEntry {
    generation: u64,
    write: PendingWrite,
}

/// Result of `flush_outbox`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FlushReport {
    /// Writes accepted by the gateway.
    pub delivered: usize,
    /// Writes discarded because their session was never created.
    pub dropped: usize,
    /// Writes still queued after the first failure.
    pub remaining: usize,
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// Drives one player's play-throughs and mirrors them to a gateway.
pub struct LifecycleController {
    player: PlayerProfile,
    state: GameState,
    gateway: Box<dyn SessionGateway + Send>,
    policy: SyncPolicy,
    outbox: VecDeque<OutboxEntry>,
    /// Bumped by every `start`; ties queued writes to their play-through.
    generation: u64,
    /// Session ids obtained per play-through.
    sessions: BTreeMap<u64, SessionId>,
}

impl std::fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("player", &self.player)
            .field("state", &self.state)
            .field("policy", &self.policy)
            .field("outbox_len", &self.outbox.len())
            .finish_non_exhaustive()
    }
}

impl LifecycleController {
    /// Create a controller in `NotStarted`.
    #[must_use]
    pub fn new(
        player: PlayerProfile,
        gateway: Box<dyn SessionGateway + Send>,
        policy: SyncPolicy,
    ) -> Self {
        Self {
            player,
            state: GameState::default(),
            gateway,
            policy,
            outbox: VecDeque::new(),
            generation: 0,
            sessions: BTreeMap::new(),
        }
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Start a play-through, optionally with a custom length in minutes.
    ///
    /// Gameplay starts even if the session cannot be created remotely; the
    /// state then simply has no `session_id`.
    pub fn start(&mut self, custom_minutes: Option<u32>) -> Result<(), EscapeError> {
        if self.state.phase != Phase::NotStarted {
            return Err(self.transition_error("start"));
        }
        if let Some(minutes) = custom_minutes
            && !(MIN_CUSTOM_MINUTES..=MAX_CUSTOM_MINUTES).contains(&minutes)
        {
            return Err(EscapeError::Validation(format!(
                "custom timer must be between {} and {} minutes, got {}",
                MIN_CUSTOM_MINUTES, MAX_CUSTOM_MINUTES, minutes
            )));
        }

        let total = custom_minutes.map_or(DEFAULT_TOTAL_SECONDS, |m| m * 60);
        self.generation = self.generation.saturating_add(1);
        self.state = GameState {
            phase: Phase::InProgress,
            total_time: total,
            time_remaining: total,
            ..GameState::default()
        };
        tracing::info!(
            player = %self.player.name,
            total_seconds = total,
            "game started"
        );

        let new = NewSession {
            player_name: self.player.name.clone(),
            course: self.player.course.clone(),
            module: self.player.module.clone(),
            total_time: total,
            time_remaining: total,
            custom_timer_duration: custom_minutes,
        };
        self.dispatch(PendingWrite::CreateSession(new));
        Ok(())
    }

    /// One second of countdown. No-op outside `InProgress`.
    pub fn tick(&mut self) {
        if self.state.phase != Phase::InProgress {
            return;
        }
        self.state.time_remaining = self.state.time_remaining.saturating_sub(1);
        if self.state.time_remaining == 0 {
            tracing::info!(score = %self.state.score, "time is up");
            self.finish(CompletionReason::TimeUp);
        }
    }

    /// Apply `seconds` ticks at once.
    pub fn advance(&mut self, seconds: u32) {
        for _ in 0..seconds {
            if self.state.phase != Phase::InProgress {
                break;
            }
            self.tick();
        }
    }

    /// Mark a stage solved and award `max(0, 100 - time_spent/60)` points.
    ///
    /// Each new completion moves the stage pointer forward; the completion
    /// made while the pointer is on the last stage ends the game.
    ///
    /// Completing an already completed stage re-sends its completion record
    /// but awards no further points and does not move the stage pointer.
    pub fn complete_stage(&mut self, stage_id: u8, time_spent: u32) -> Result<(), EscapeError> {
        if self.state.phase != Phase::InProgress {
            return Err(self.transition_error("complete a stage"));
        }
        let index = catalog::index_of(stage_id).ok_or(EscapeError::InvalidStage(stage_id))?;
        let def = &STAGES[index];

        let first_time = !self.state.stages[index].completed;
        let was_last = self.state.current_stage == STAGE_COUNT - 1;
        if first_time {
            let earned = Points::from_millis(stage_millipoints(time_spent));
            let progress = &mut self.state.stages[index];
            progress.completed = true;
            progress.time_spent = time_spent;
            self.state.score = self.state.score.saturating_add(earned);
            if !was_last {
                self.state.current_stage += 1;
            }
            self.state.stage_started_at = self.state.elapsed();
            tracing::info!(
                stage = stage_id,
                time_spent,
                earned = %earned,
                score = %self.state.score,
                "stage completed"
            );
        } else {
            tracing::debug!(stage = stage_id, "stage already completed, score unchanged");
        }

        let progress = self.state.stages[index];
        // The session id is bound when the write is delivered.
        self.dispatch(PendingWrite::UpsertStage(StageCompletionInput {
            game_session_id: self.state.session_id.unwrap_or(SessionId(0)),
            stage_id,
            stage_title: def.title.to_string(),
            stage_type: def.kind,
            completed: true,
            time_spent: progress.time_spent,
            hints_used: progress.hints_used,
        }));

        if first_time && was_last {
            self.finish(CompletionReason::Escaped);
        }
        Ok(())
    }

    /// Move a stage's hint pointer forward and return the hint it lands on.
    ///
    /// The pointer is capped at the last hint; once it sits there, asking
    /// again fails with `HintsExhausted` and changes nothing.
    pub fn use_hint(&mut self, stage_id: u8) -> Result<&'static str, EscapeError> {
        if self.state.phase != Phase::InProgress {
            return Err(self.transition_error("use a hint"));
        }
        let index = catalog::index_of(stage_id).ok_or(EscapeError::InvalidStage(stage_id))?;
        let hints = STAGES[index].hints;
        let last = hints.len().saturating_sub(1);
        let progress = &mut self.state.stages[index];
        if progress.current_hint >= last {
            return Err(EscapeError::HintsExhausted(stage_id));
        }
        let next = progress.current_hint + 1;
        let Some(text) = hints.get(next).copied() else {
            return Err(EscapeError::HintsExhausted(stage_id));
        };
        progress.current_hint = next;
        progress.hints_used = progress.hints_used.saturating_add(1);
        self.state.hints_used = self.state.hints_used.saturating_add(1);
        tracing::debug!(stage = stage_id, hint = next, "hint revealed");
        Ok(text)
    }

    /// Return to `NotStarted`. The persisted session is left alone and the
    /// outbox keeps its entries.
    pub fn reset(&mut self) {
        self.state = GameState::default();
        tracing::info!("game reset");
    }

    /// Manual save of the session's progress.
    pub fn save(&mut self) -> SaveStatus {
        let update = self.progress_update();
        let Some(id) = self.current_session_id() else {
            if self.policy == SyncPolicy::Outbox && self.create_pending() {
                self.enqueue(PendingWrite::UpdateSession(update));
                return SaveStatus::Queued;
            }
            return SaveStatus::NoSession;
        };
        if self.policy == SyncPolicy::Outbox && !self.outbox.is_empty() {
            self.enqueue(PendingWrite::UpdateSession(update));
            return SaveStatus::Queued;
        }
        match self.gateway.update_session(id, &update) {
            Ok(_) => {
                tracing::info!(session_id = %id, "progress saved");
                SaveStatus::Saved
            }
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "save failed");
                match self.policy {
                    SyncPolicy::BestEffort => SaveStatus::Failed,
                    SyncPolicy::Outbox => {
                        self.enqueue(PendingWrite::UpdateSession(update));
                        SaveStatus::Queued
                    }
                }
            }
        }
    }

    /// Retry queued writes in order, stopping at the first failure.
    pub fn flush_outbox(&mut self) -> FlushReport {
        let mut report = FlushReport::default();
        while let Some(entry) = self.outbox.pop_front() {
            match self.deliver(&entry) {
                Delivery::Sent => report.delivered += 1,
                Delivery::Orphaned => {
                    tracing::warn!(
                        write = entry.write.label(),
                        "dropping queued write: its session was never created"
                    );
                    report.dropped += 1;
                }
                Delivery::Failed(e) => {
                    tracing::warn!(write = entry.write.label(), error = %e, "outbox flush stopped");
                    self.outbox.push_front(entry);
                    break;
                }
            }
        }
        report.remaining = self.outbox.len();
        report
    }

    // -------------------------------------------------------------------------
    // Snapshot accessors
    // -------------------------------------------------------------------------

    /// The full gameplay state.
    #[must_use]
    pub fn state(&self) -> &GameState {
        &self.state
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    #[must_use]
    pub fn player(&self) -> &PlayerProfile {
        &self.player
    }

    #[must_use]
    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }

    /// Catalog entry of the current stage.
    #[must_use]
    pub fn current_stage(&self) -> &'static catalog::StageDefinition {
        &STAGES[self.state.current_stage.min(STAGE_COUNT - 1)]
    }

    #[must_use]
    pub fn score(&self) -> Points {
        self.state.score
    }

    #[must_use]
    pub fn hints_used(&self) -> u32 {
        self.state.hints_used
    }

    #[must_use]
    pub fn time_remaining(&self) -> u32 {
        self.state.time_remaining
    }

    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.state.session_id
    }

    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.state.completed_count()
    }

    /// Completed stages as a whole percentage of the catalog.
    #[must_use]
    pub fn progress_percent(&self) -> u32 {
        (self.completed_count() * 100 / STAGE_COUNT) as u32
    }

    /// Text of the last revealed hint of the current stage, if any.
    #[must_use]
    pub fn current_hint(&self) -> Option<&'static str> {
        let index = self.state.current_stage.min(STAGE_COUNT - 1);
        let progress = &self.state.stages[index];
        if progress.hints_used == 0 {
            return None;
        }
        STAGES[index].hints.get(progress.current_hint).copied()
    }

    /// Seconds elapsed on the countdown since the current stage began.
    #[must_use]
    pub fn stage_elapsed(&self) -> u32 {
        self.state.elapsed().saturating_sub(self.state.stage_started_at)
    }

    /// Number of writes waiting in the outbox.
    #[must_use]
    pub fn pending_writes(&self) -> usize {
        self.outbox.len()
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    fn transition_error(&self, action: &'static str) -> EscapeError {
        EscapeError::InvalidTransition {
            action,
            phase: self.state.phase.name(),
        }
    }

    fn finish(&mut self, reason: CompletionReason) {
        self.state.phase = Phase::Completed(reason);
        tracing::info!(
            ?reason,
            score = %self.state.score,
            hints = self.state.hints_used,
            remaining = self.state.time_remaining,
            "game completed"
        );
        let update = self.progress_update();
        self.dispatch(PendingWrite::UpdateSession(update));
    }

    /// Session fields a save or completion sends.
    fn progress_update(&self) -> SessionUpdate {
        let completed = matches!(self.state.phase, Phase::Completed(_));
        SessionUpdate {
            score: Some(self.state.score),
            hints_used: Some(self.state.hints_used),
            is_completed: Some(completed),
            end_time: completed.then(Utc::now),
            time_remaining: Some(self.state.time_remaining),
        }
    }

    fn current_session_id(&self) -> Option<SessionId> {
        self.state.session_id
    }

    fn create_pending(&self) -> bool {
        self.outbox.iter().any(|e| {
            e.generation == self.generation && matches!(e.write, PendingWrite::CreateSession(_))
        })
    }

    fn enqueue(&mut self, write: PendingWrite) {
        tracing::debug!(write = write.label(), "write queued in outbox");
        self.outbox.push_back(OutboxEntry {
            generation: self.generation,
            write,
        });
    }

    /// Send a write now, or handle it according to the policy.
    fn dispatch(&mut self, write: PendingWrite) {
        let entry = OutboxEntry {
            generation: self.generation,
            write,
        };
        if self.policy == SyncPolicy::Outbox && !self.outbox.is_empty() {
            self.outbox.push_back(entry);
            return;
        }
        match self.deliver(&entry) {
            Delivery::Sent => {}
            Delivery::Orphaned => match self.policy {
                SyncPolicy::BestEffort => tracing::debug!(
                    write = entry.write.label(),
                    "no session id, write skipped"
                ),
                SyncPolicy::Outbox => self.outbox.push_back(entry),
            },
            Delivery::Failed(e) => {
                tracing::warn!(write = entry.write.label(), error = %e, "persistence write failed");
                if self.policy == SyncPolicy::Outbox {
                    self.outbox.push_back(entry);
                }
            }
        }
    }

    fn deliver(&mut self, entry: &OutboxEntry) -> Delivery {
        match &entry.write {
            PendingWrite::CreateSession(new) => match self.gateway.create_session(new) {
                Ok(id) => {
                    self.sessions.insert(entry.generation, id);
                    if entry.generation == self.generation {
                        self.state.session_id = Some(id);
                    }
                    tracing::info!(session_id = %id, "session created");
                    Delivery::Sent
                }
                Err(e) => Delivery::Failed(e),
            },
            PendingWrite::UpdateSession(update) => {
                let Some(&id) = self.sessions.get(&entry.generation) else {
                    return Delivery::Orphaned;
                };
                match self.gateway.update_session(id, update) {
                    Ok(_) => Delivery::Sent,
                    Err(e) => Delivery::Failed(e),
                }
            }
            PendingWrite::UpsertStage(input) => {
                let Some(&id) = self.sessions.get(&entry.generation) else {
                    return Delivery::Orphaned;
                };
                let input = StageCompletionInput {
                    game_session_id: id,
                    ..input.clone()
                };
                match self.gateway.upsert_stage_completion(&input) {
                    Ok(_) => Delivery::Sent,
                    Err(e) => Delivery::Failed(e),
                }
            }
        }
    }
}

enum Delivery {
    Sent,
    /// The write needs a session that does not exist.
    Orphaned,
    Failed(EscapeError),
}

// =============================================================================
// TESTS
// =============================================================================
