//! # System Module
//!
//! Derived views over finished play-throughs: aggregate statistics across all
//! sessions and the performance rating shown at the end of a game.
//!
//! Both are pure functions of stored records or controller state, so they
//! live in the core next to the data they summarize.

mod rating;
mod stats;

pub use rating::*;
pub use stats::*;
