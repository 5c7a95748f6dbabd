//! # escape-room
//!
//! The escape room application: REST session server, CLI and terminal
//! client, all built on `escape-core`.
//!
//! - `api`: axum router, handlers and security middleware
//! - `cli`: clap commands and the terminal play loop
//! - `config`: layered settings (defaults, TOML file, environment, flags)
//! - `remote`: HTTP implementation of `SessionGateway`

pub mod api;
pub mod cli;
pub mod config;
pub mod remote;
