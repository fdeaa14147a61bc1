//! Views that display the chat transcript.
//!
//! The controller talks to a [`ChatView`] instead of a DOM. [`Transcript`]
//! keeps every rendered turn in memory and can emit the HTML fragment the
//! page used to build; [`TerminalView`] prints turns to stdout with optional
//! ANSI styling.

use std::io::{self, Write};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::types::Role;

/// ANSI escape code for dim text (used for the typing placeholder).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for italic text (used for the typing placeholder).
const ANSI_ITALIC: &str = "\x1b[3m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the assistant label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for red text (used for errors).
const ANSI_RED: &str = "\x1b[31m";

/// ANSI escape code for yellow text (used for notices).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI sequence that returns to column zero and erases the line.
const ANSI_ERASE_LINE: &str = "\r\x1b[2K";

/// A turn ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedTurn {
    /// The sender of the turn.
    pub role: Role,

    /// The text as typed or received.
    pub source: String,

    /// The HTML fragment to display.
    pub html: String,
}

impl RenderedTurn {
    /// Create a new rendered turn.
    pub fn new(role: Role, source: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            role,
            source: source.into(),
            html: html.into(),
        }
    }
}

/// Handle for a typing placeholder shown by a view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaceholderId(u64);

impl PlaceholderId {
    /// Wrap a raw identifier.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Trait for displaying the chat.
///
/// Methods take `&self` because the controller shares its view across
/// concurrent submissions; implementations synchronize internally.
pub trait ChatView: Send + Sync {
    /// Append a turn to the visible transcript.
    fn append_turn(&self, turn: &RenderedTurn);

    /// Clear the message input after a submission.
    fn clear_input(&self) {}

    /// Show a typing placeholder and return its handle.
    fn show_typing(&self) -> PlaceholderId;

    /// Remove a typing placeholder. Unknown handles are ignored.
    fn remove_typing(&self, id: PlaceholderId);

    /// Print an informational notice outside the transcript.
    fn print_info(&self, info: &str);

    /// Print an error notice outside the transcript.
    fn print_error(&self, error: &str);
}

///////////////////////////////////////////// Transcript ////////////////////////////////////////////

/// One element of the visible transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscriptEntry {
    /// A rendered turn.
    Turn(RenderedTurn),

    /// A typing placeholder that has not been removed yet.
    Typing(PlaceholderId),
}

/// A notice printed outside the transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// Informational notice.
    Info(String),

    /// Error notice.
    Error(String),
}

#[derive(Debug, Default)]
struct TranscriptState {
    entries: Vec<TranscriptEntry>,
    notices: Vec<Notice>,
    input_clears: usize,
    next_placeholder: u64,
}

/// In-memory view that records everything the controller displays.
#[derive(Debug, Default)]
pub struct Transcript {
    state: Mutex<TranscriptState>,
}

impl Transcript {
    /// Create an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TranscriptState> {
        // A panic while holding the lock leaves plain data behind; keep using it.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the transcript in display order.
    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.lock().entries.clone()
    }

    /// Snapshot of the rendered turns in display order.
    pub fn turns(&self) -> Vec<RenderedTurn> {
        self.lock()
            .entries
            .iter()
            .filter_map(|entry| match entry {
                TranscriptEntry::Turn(turn) => Some(turn.clone()),
                TranscriptEntry::Typing(_) => None,
            })
            .collect()
    }

    /// Number of typing placeholders currently shown.
    pub fn typing_count(&self) -> usize {
        self.lock()
            .entries
            .iter()
            .filter(|entry| matches!(entry, TranscriptEntry::Typing(_)))
            .count()
    }

    /// Notices printed so far.
    pub fn notices(&self) -> Vec<Notice> {
        self.lock().notices.clone()
    }

    /// How many times the input was cleared.
    pub fn input_clears(&self) -> usize {
        self.lock().input_clears
    }

    /// Remove every entry and notice.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.notices.clear();
    }

    /// Render the transcript as the HTML fragment of a chat container.
    pub fn to_html(&self) -> String {
        let state = self.lock();
        let mut out = String::new();
        for entry in &state.entries {
            match entry {
                TranscriptEntry::Turn(turn) => {
                    let class = match turn.role {
                        Role::User => "user-message",
                        Role::Assistant => "assistant-message",
                    };
                    out.push_str(&format!(
                        "<div class=\"{class}\"><div class=\"message-content\">{}</div></div>\n",
                        turn.html
                    ));
                }
                TranscriptEntry::Typing(_) => {
                    out.push_str(
                        "<div class=\"message-typing\"><div class=\"typing-indicator\">\
                         <span></span><span></span><span></span></div></div>\n",
                    );
                }
            }
        }
        out
    }
}

impl ChatView for Transcript {
    fn append_turn(&self, turn: &RenderedTurn) {
        self.lock().entries.push(TranscriptEntry::Turn(turn.clone()));
    }

    fn clear_input(&self) {
        self.lock().input_clears += 1;
    }

    fn show_typing(&self) -> PlaceholderId {
        let mut state = self.lock();
        let id = PlaceholderId::new(state.next_placeholder);
        state.next_placeholder += 1;
        state.entries.push(TranscriptEntry::Typing(id));
        id
    }

    fn remove_typing(&self, id: PlaceholderId) {
        self.lock()
            .entries
            .retain(|entry| entry != &TranscriptEntry::Typing(id));
    }

    fn print_info(&self, info: &str) {
        self.lock().notices.push(Notice::Info(info.to_string()));
    }

    fn print_error(&self, error: &str) {
        self.lock().notices.push(Notice::Error(error.to_string()));
    }
}

//////////////////////////////////////////// TerminalView ///////////////////////////////////////////

/// Terminal view with optional ANSI styling.
///
/// User turns are not echoed: the line editor already shows what was typed.
pub struct TerminalView {
    use_color: bool,
    show_html: bool,
    typing: AtomicBool,
    next_placeholder: AtomicU64,
}

impl TerminalView {
    /// Creates a new TerminalView with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_options(true, false)
    }

    /// Creates a new TerminalView.
    ///
    /// With `show_html`, assistant turns are printed as their rendered HTML
    /// instead of their Markdown source.
    pub fn with_options(use_color: bool, show_html: bool) -> Self {
        Self {
            use_color,
            show_html,
            typing: AtomicBool::new(false),
            next_placeholder: AtomicU64::new(0),
        }
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
    }

    fn erase_typing(&self) {
        if self.typing.swap(false, Ordering::Relaxed) && self.use_color {
            print!("{ANSI_ERASE_LINE}");
            self.flush();
        }
    }
}

impl Default for TerminalView {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatView for TerminalView {
    fn append_turn(&self, turn: &RenderedTurn) {
        if turn.role == Role::User {
            return;
        }
        self.erase_typing();
        let body = if self.show_html {
            turn.html.trim_end()
        } else {
            turn.source.trim_end()
        };
        if self.use_color {
            println!("{ANSI_CYAN}Assistant:{ANSI_RESET}\n{body}\n");
        } else {
            println!("Assistant:\n{body}\n");
        }
        self.flush();
    }

    fn show_typing(&self) -> PlaceholderId {
        let id = PlaceholderId::new(self.next_placeholder.fetch_add(1, Ordering::Relaxed));
        self.typing.store(true, Ordering::Relaxed);
        if self.use_color {
            print!("{ANSI_DIM}{ANSI_ITALIC}Assistant is typing...{ANSI_RESET}");
        } else {
            println!("[typing...]");
        }
        self.flush();
        id
    }

    fn remove_typing(&self, _id: PlaceholderId) {
        self.erase_typing();
    }

    fn print_info(&self, info: &str) {
        self.erase_typing();
        if self.use_color {
            println!("{ANSI_YELLOW}{info}{ANSI_RESET}");
        } else {
            println!("{info}");
        }
    }

    fn print_error(&self, error: &str) {
        self.erase_typing();
        if self.use_color {
            eprintln!("{ANSI_RED}Error: {error}{ANSI_RESET}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}
