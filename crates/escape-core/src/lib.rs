//! # escape-core
//!
//! The gameplay and persistence core of the escape room - THE LOGIC.
//!
//! A play-through is six sequential puzzles under a countdown. This crate
//! holds everything that decides what happens during one:
//! - `controller`: the session lifecycle state machine (timer, stages, hints, score)
//! - `puzzles`: the six stateless answer checks
//! - `catalog`: the fixed stage list with titles and hints
//! - `gateway`: the persistence operations the controller depends on
//! - `store`: in-memory and redb-backed session storage
//! - `system`: aggregate statistics and the end-of-game rating
//!
//! ## Architectural Constraints
//!
//! - NO async, NO network dependencies (pure Rust)
//! - `BTreeMap` only, for deterministic iteration order
//! - Integer score arithmetic: points are stored as millipoints
//! - Gameplay state is authoritative; persistence failures never roll it back

// =============================================================================
// MODULES
// =============================================================================

pub mod catalog;
pub mod controller;
pub mod gateway;
pub mod primitives;
pub mod puzzles;
pub mod store;
pub mod system;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    CustomTimer, EscapeError, GameSession, GameStats, NewSession, Points, SessionId,
    SessionRecord, SessionUpdate, StageCompletion, StageCompletionId, StageCompletionInput,
    StageKind, StatsUpdate, TimerId,
};

// =============================================================================
// RE-EXPORTS: Gameplay
// =============================================================================

pub use catalog::{STAGES, StageDefinition};
pub use controller::{
    CompletionReason, FlushReport, GameState, LifecycleController, PendingWrite, Phase,
    PlayerProfile, SaveStatus, StageProgress, SyncPolicy,
};
pub use puzzles::{Submission, TruthTable, Verdict};

// =============================================================================
// RE-EXPORTS: Persistence
// =============================================================================

pub use gateway::{SessionGateway, StoreGateway};
pub use store::{MemoryStore, RedbStore, SessionStore, StoreBackend};

// =============================================================================
// RE-EXPORTS: System (from system module)
// =============================================================================

pub use system::{PerformanceRating, ScoreTier, average_stage_seconds, refresh_stats};
