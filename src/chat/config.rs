//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg` and configuration
//! structures for controlling chat behavior.

use std::time::Duration;

use arrrg_derive::CommandLine;

use crate::markdown::MarkdownOptions;

/// Default number of history turns sent with each query.
const DEFAULT_CONTEXT_WINDOW: usize = 4;

/// Default bound on a single assistant request.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shortest request timeout accepted from the command line.
const MIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Default pause before the no-report guidance replaces the typing placeholder.
const DEFAULT_TYPING_DELAY: Duration = Duration::from_millis(600);

/// Default tracing filter for the binary.
const DEFAULT_LOG_LEVEL: &str = "warn";

/// Guidance shown when the user chats before any report exists.
pub const DEFAULT_NO_REPORT_MESSAGE: &str = "No report has been generated yet. \
     Generate a report first, then ask me about it.";

/// Command-line arguments for the reportchat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Base URL of the report backend.
    #[arrrg(optional, "Backend base URL (default: $REPORTCHAT_BASE_URL or http://127.0.0.1:5000/)", "URL")]
    pub base_url: Option<String>,

    /// Seconds before an assistant request is abandoned.
    #[arrrg(optional, "Request timeout in seconds, at least 1 (default: 30)", "SECS")]
    pub timeout_secs: Option<u64>,

    /// History turns sent with each query.
    #[arrrg(optional, "History turns sent with each query (default: 4)", "TURNS")]
    pub context_window: Option<usize>,

    /// Pause before the no-report guidance appears.
    #[arrrg(optional, "Typing delay in milliseconds when no report exists (default: 600)", "MS")]
    pub typing_delay_ms: Option<u64>,

    /// Tracing filter directive.
    #[arrrg(optional, "Log filter, overridden by RUST_LOG (default: warn)", "FILTER")]
    pub log_level: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Print assistant replies as rendered HTML.
    #[arrrg(flag, "Print assistant replies as rendered HTML")]
    pub html: bool,
}

/// Configuration for a chat session.
///
/// This struct holds the resolved configuration values after processing
/// command-line arguments with appropriate defaults.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Backend base URL; `None` defers to the environment and the default.
    pub base_url: Option<String>,

    /// Bound on a single assistant request.
    pub request_timeout: Duration,

    /// History turns sent with each query.
    pub context_window: usize,

    /// Pause before the no-report guidance appears.
    pub typing_delay: Duration,

    /// Guidance shown when no report exists.
    pub no_report_message: String,

    /// Markdown renderer options.
    pub markdown: MarkdownOptions,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,

    /// Whether to print assistant replies as rendered HTML.
    pub show_html: bool,

    /// Tracing filter directive.
    pub log_level: String,
}

impl ChatConfig {
    /// Creates a new ChatConfig with default values.
    ///
    /// Defaults:
    /// - Context window: 4 turns
    /// - Request timeout: 30 seconds
    /// - Typing delay: 600 ms
    /// - Color: enabled
    /// - HTML output: disabled
    pub fn new() -> Self {
        Self {
            base_url: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            context_window: DEFAULT_CONTEXT_WINDOW,
            typing_delay: DEFAULT_TYPING_DELAY,
            no_report_message: DEFAULT_NO_REPORT_MESSAGE.to_string(),
            markdown: MarkdownOptions::default(),
            use_color: true,
            show_html: false,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }

    /// Sets the backend base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets how many history turns accompany each query.
    pub fn with_context_window(mut self, turns: usize) -> Self {
        self.context_window = turns;
        self
    }

    /// Sets the typing delay used when no report exists.
    pub fn with_typing_delay(mut self, delay: Duration) -> Self {
        self.typing_delay = delay;
        self
    }

    /// Sets the guidance shown when no report exists.
    pub fn with_no_report_message(mut self, message: impl Into<String>) -> Self {
        self.no_report_message = message.into();
        self
    }

    /// Sets the Markdown renderer options.
    pub fn with_markdown(mut self, markdown: MarkdownOptions) -> Self {
        self.markdown = markdown;
        self
    }

    /// Disables ANSI color output.
    pub fn without_color(mut self) -> Self {
        self.use_color = false;
        self
    }

    /// Prints assistant replies as rendered HTML.
    pub fn with_html_output(mut self, show_html: bool) -> Self {
        self.show_html = show_html;
        self
    }

    /// Sets the tracing filter directive.
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ChatArgs> for ChatConfig {
    fn from(args: ChatArgs) -> Self {
        let defaults = ChatConfig::new();
        ChatConfig {
            base_url: args.base_url,
            request_timeout: args
                .timeout_secs
                .map(|secs| Duration::from_secs(secs).max(MIN_REQUEST_TIMEOUT))
                .unwrap_or(defaults.request_timeout),
            context_window: args.context_window.unwrap_or(defaults.context_window),
            typing_delay: args
                .typing_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.typing_delay),
            use_color: !args.no_color,
            show_html: args.html,
            log_level: args.log_level.unwrap_or(defaults.log_level.clone()),
            ..defaults
        }
    }
}
