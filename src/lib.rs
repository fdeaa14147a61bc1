//! Chat with an assistant about a consolidated email report.
//!
//! The crate is organized around [`ChatController`], which forwards user
//! questions, recent history, and the loaded report to a remote assistant
//! endpoint and draws the results on a [`ChatView`]. Reports come from
//! [`generate_report`] and reach the controller through
//! [`ChatController::set_analysis_data`].

// Public modules
pub mod chat;
pub mod client;
pub mod error;
pub mod markdown;
pub mod observability;
pub mod render;
pub mod report;
pub mod types;

// Re-exports
pub use chat::{AssistantBackend, ChatConfig, ChatContext, ChatController, SubmitOutcome};
pub use client::Backend;
pub use error::{Error, Result};
pub use markdown::{MarkdownOptions, MarkdownRenderer, build_renderer};
pub use observability::register_biometrics;
pub use render::{ChatView, RenderedTurn, TerminalView, Transcript};
pub use report::{ReportBackend, ReportOutcome, ReportQuery, generate_report};
pub use types::*;
