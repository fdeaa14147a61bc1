//! Chat against a generated email report.
//!
//! This module provides the session controller and the REPL plumbing around
//! it. It supports:
//!
//! - Forwarding questions, recent history, and the loaded report to the assistant
//! - A single in-flight exchange with timeout and cancellation
//! - Slash commands for session control
//!
//! # Architecture
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: The controller and its conversation context
//! - [`commands`]: Slash command parsing

mod commands;
mod config;
mod session;

pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{ChatArgs, ChatConfig, DEFAULT_NO_REPORT_MESSAGE};
pub use session::{
    APOLOGY, AssistantBackend, BUSY_NOTICE, ChatContext, ChatController, PendingExchange,
    Prepared, SessionStats, SubmitOutcome,
};
