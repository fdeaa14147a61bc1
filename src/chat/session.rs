//! Core chat session management.
//!
//! This module provides the [`ChatController`], which owns the conversation
//! context, forwards user turns to the assistant endpoint, and drives a
//! [`ChatView`] while a request is in flight.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::chat::config::ChatConfig;
use crate::error::{Error, Result};
use crate::markdown::{MarkdownRenderer, build_renderer, render_literal};
use crate::observability::{
    BACKEND_CANCELLATIONS, BACKEND_TIMEOUTS, CHAT_FAILURES, CHAT_IGNORED, CHAT_NO_REPORT,
    CHAT_REJECTED, CHAT_SUBMISSIONS,
};
use crate::render::{ChatView, PlaceholderId, RenderedTurn};
use crate::types::{AnalysisData, AssistantQuery, AssistantReply, ConversationTurn, Role};

/// Fixed opening of the turn shown when an exchange fails.
pub const APOLOGY: &str = "Sorry, something went wrong while processing your message.";

/// Notice shown when a submission arrives while another is in flight.
pub const BUSY_NOTICE: &str = "Still waiting for the previous reply; message not sent.";

/// Remote assistant the controller consults.
#[async_trait::async_trait]
pub trait AssistantBackend: Send + Sync {
    /// Send one query and wait for the reply.
    async fn consult(&self, query: &AssistantQuery) -> Result<AssistantReply>;
}

///////////////////////////////////////////// ChatContext ///////////////////////////////////////////

/// Conversation state owned by one chat session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatContext {
    last_analysis_data: Option<AnalysisData>,
    conversation_history: Vec<ConversationTurn>,
}

impl ChatContext {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// The last generated report, if any.
    pub fn analysis_data(&self) -> Option<&AnalysisData> {
        self.last_analysis_data.as_ref()
    }

    /// Replace the report wholesale.
    pub fn set_analysis_data(&mut self, data: AnalysisData) {
        self.last_analysis_data = Some(data);
    }

    /// Forget the report.
    pub fn clear_analysis_data(&mut self) {
        self.last_analysis_data = None;
    }

    /// Every recorded turn, oldest first.
    pub fn history(&self) -> &[ConversationTurn] {
        &self.conversation_history
    }

    /// The last `window` turns, oldest first.
    pub fn recent(&self, window: usize) -> &[ConversationTurn] {
        let start = self.conversation_history.len().saturating_sub(window);
        &self.conversation_history[start..]
    }

    /// Record a successful exchange.
    pub fn record_exchange(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.conversation_history.push(ConversationTurn::user(user));
        self.conversation_history
            .push(ConversationTurn::assistant(assistant));
    }

    /// Drop the conversation history; the report is kept.
    pub fn clear_history(&mut self) {
        self.conversation_history.clear();
    }
}

///////////////////////////////////////////// RequestSlot ///////////////////////////////////////////

/// Single-slot guard: at most one exchange is in flight.
#[derive(Debug, Default)]
struct RequestSlot {
    busy: AtomicBool,
}

impl RequestSlot {
    fn try_acquire(&self) -> Option<SlotPermit<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SlotPermit { slot: self })
    }

    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

#[derive(Debug)]
struct SlotPermit<'a> {
    slot: &'a RequestSlot,
}

impl Drop for SlotPermit<'_> {
    fn drop(&mut self) {
        self.slot.busy.store(false, Ordering::Release);
    }
}

/////////////////////////////////////////// PendingExchange /////////////////////////////////////////

/// An exchange whose user turn is displayed and whose reply is outstanding.
///
/// Holding one occupies the controller's in-flight slot; the slot frees when
/// the exchange is handed back to the controller or dropped. Dropping an
/// unfinished exchange also takes its typing placeholder off the view.
pub struct PendingExchange<'a> {
    user_text: String,
    placeholder: PlaceholderId,
    typing_shown: bool,
    query: Option<AssistantQuery>,
    view: &'a dyn ChatView,
    _permit: SlotPermit<'a>,
}

impl PendingExchange<'_> {
    fn remove_typing(&mut self) {
        if self.typing_shown {
            self.typing_shown = false;
            self.view.remove_typing(self.placeholder);
        }
    }

    /// The trimmed user message.
    pub fn user_text(&self) -> &str {
        &self.user_text
    }

    /// The typing placeholder shown for this exchange.
    pub fn placeholder(&self) -> PlaceholderId {
        self.placeholder
    }

    /// The query to send, or `None` when no report exists yet.
    pub fn query(&self) -> Option<&AssistantQuery> {
        self.query.as_ref()
    }
}

impl Drop for PendingExchange<'_> {
    fn drop(&mut self) {
        self.remove_typing();
    }
}

impl fmt::Debug for PendingExchange<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingExchange")
            .field("user_text", &self.user_text)
            .field("placeholder", &self.placeholder)
            .field("typing_shown", &self.typing_shown)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

/// Result of the synchronous half of a submission.
#[derive(Debug)]
pub enum Prepared<'a> {
    /// The message was empty after trimming.
    Ignored,

    /// Another exchange is in flight.
    Rejected,

    /// The exchange is displayed and awaits a reply.
    Pending(PendingExchange<'a>),
}

/// What a submission ended up doing.
#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    /// Empty message; nothing happened.
    Ignored,

    /// Another exchange was in flight; nothing was sent.
    Rejected,

    /// No report exists; the guidance turn was shown without a request.
    NoReport,

    /// The assistant replied and the exchange was recorded.
    Answered,

    /// The request failed; an apology turn was shown.
    Failed(Error),
}

impl SubmitOutcome {
    /// Returns true if the assistant replied.
    pub fn is_answered(&self) -> bool {
        matches!(self, SubmitOutcome::Answered)
    }
}

/// Aggregated stats for a chat session.
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// The number of turns in the conversation history.
    pub history_len: usize,
    /// Whether a report is loaded.
    pub has_analysis_data: bool,
    /// The loaded report's kind, when it declares one.
    pub analysis_kind: Option<String>,
    /// How many history turns accompany each query.
    pub context_window: usize,
    /// The per-request timeout.
    pub request_timeout: Duration,
    /// Whether a request is in flight right now.
    pub in_flight: bool,
    /// Exchanges answered by the assistant.
    pub answered: u64,
    /// Exchanges that failed.
    pub failed: u64,
    /// Submissions rejected because another was in flight.
    pub rejected: u64,
}

//////////////////////////////////////////// ChatController /////////////////////////////////////////

/// Mediates between a chat view and the remote assistant.
///
/// All methods take `&self`. State lives behind locks that are never held
/// across an `.await`, so one controller can be shared by every task that
/// reacts to user input; the in-flight slot keeps those tasks from issuing
/// overlapping requests.
pub struct ChatController<B: AssistantBackend, V: ChatView> {
    backend: B,
    view: V,
    markdown: Box<dyn MarkdownRenderer>,
    config: ChatConfig,
    context: Mutex<ChatContext>,
    slot: RequestSlot,
    answered: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

impl<B: AssistantBackend, V: ChatView> ChatController<B, V> {
    /// Creates a controller, building the Markdown renderer from `config`.
    pub fn new(backend: B, view: V, config: ChatConfig) -> Self {
        let markdown = build_renderer(&config.markdown);
        Self::with_renderer(backend, view, config, markdown)
    }

    /// Creates a controller with a custom Markdown renderer.
    pub fn with_renderer(
        backend: B,
        view: V,
        config: ChatConfig,
        markdown: Box<dyn MarkdownRenderer>,
    ) -> Self {
        Self {
            backend,
            view,
            markdown,
            config,
            context: Mutex::new(ChatContext::new()),
            slot: RequestSlot::default(),
            answered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Replace the session context, e.g. to seed it with a report.
    pub fn with_context(self, context: ChatContext) -> Self {
        *self.lock_context() = context;
        self
    }

    fn lock_context(&self) -> MutexGuard<'_, ChatContext> {
        // ChatContext has no cross-field invariants a panic could break.
        self.context
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The view the controller draws on.
    pub fn view(&self) -> &V {
        &self.view
    }

    /// The backend the controller consults.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The active configuration.
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// A snapshot of the session context.
    pub fn context(&self) -> ChatContext {
        self.lock_context().clone()
    }

    /// A snapshot of the conversation history.
    pub fn history(&self) -> Vec<ConversationTurn> {
        self.lock_context().history().to_vec()
    }

    /// Replace the report the assistant answers questions about.
    pub fn set_analysis_data(&self, data: AnalysisData) {
        tracing::info!(kind = data.kind().unwrap_or("unknown"), "analysis data updated");
        self.lock_context().set_analysis_data(data);
    }

    /// Forget the current report.
    pub fn clear_analysis_data(&self) {
        self.lock_context().clear_analysis_data();
    }

    /// Returns true if a report is loaded.
    pub fn has_analysis_data(&self) -> bool {
        self.lock_context().analysis_data().is_some()
    }

    /// Clears the conversation history.
    pub fn clear_history(&self) {
        self.lock_context().clear_history();
    }

    /// Returns true while an exchange is in flight.
    pub fn is_busy(&self) -> bool {
        self.slot.is_busy()
    }

    /// Returns the current session statistics snapshot.
    pub fn stats(&self) -> SessionStats {
        let context = self.lock_context();
        SessionStats {
            history_len: context.history().len(),
            has_analysis_data: context.analysis_data().is_some(),
            analysis_kind: context
                .analysis_data()
                .and_then(|data| data.kind())
                .map(str::to_string),
            context_window: self.config.context_window,
            request_timeout: self.config.request_timeout,
            in_flight: self.slot.is_busy(),
            answered: self.answered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }

    /// Sends a user message and displays the reply.
    ///
    /// This method:
    /// 1. Ignores messages that are empty after trimming
    /// 2. Rejects the message if another exchange is in flight
    /// 3. Displays the user turn and a typing placeholder
    /// 4. Shows the guidance turn after a short delay when no report exists,
    ///    or consults the assistant, bounded by the timeout and `cancel`
    /// 5. Replaces the placeholder with the reply or an apology
    ///
    /// Failures are displayed, not returned.
    pub async fn submit_user_message(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> SubmitOutcome {
        let pending = match self.prepare_submission(text) {
            Prepared::Ignored => return SubmitOutcome::Ignored,
            Prepared::Rejected => return SubmitOutcome::Rejected,
            Prepared::Pending(pending) => pending,
        };

        let Some(query) = pending.query().cloned() else {
            tokio::select! {
                _ = tokio::time::sleep(self.config.typing_delay) => {}
                _ = cancel.cancelled() => {}
            }
            return self.finish_without_report(pending);
        };

        let result = self.request(&query, cancel).await;
        self.handle_assistant_reply(pending, result)
    }

    /// The synchronous half of a submission.
    ///
    /// On success the user turn and a typing placeholder are on screen, the
    /// input is cleared, and the returned exchange holds the in-flight slot.
    pub fn prepare_submission(&self, text: &str) -> Prepared<'_> {
        let text = text.trim();
        if text.is_empty() {
            CHAT_IGNORED.click();
            return Prepared::Ignored;
        }

        let Some(permit) = self.slot.try_acquire() else {
            CHAT_REJECTED.click();
            self.rejected.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("submission rejected: exchange already in flight");
            self.view.print_info(BUSY_NOTICE);
            return Prepared::Rejected;
        };
        CHAT_SUBMISSIONS.click();

        self.view
            .append_turn(&RenderedTurn::new(Role::User, text, render_literal(text)));
        self.view.clear_input();
        let placeholder = self.view.show_typing();

        let query = {
            let context = self.lock_context();
            context.analysis_data().map(|data| {
                AssistantQuery::new(
                    text,
                    context.recent(self.config.context_window).to_vec(),
                    Some(data.clone()),
                )
            })
        };

        Prepared::Pending(PendingExchange {
            user_text: text.to_string(),
            placeholder,
            typing_shown: true,
            query,
            view: &self.view,
            _permit: permit,
        })
    }

    /// Complete an exchange that has no report to ask about.
    pub fn finish_without_report(&self, mut pending: PendingExchange<'_>) -> SubmitOutcome {
        CHAT_NO_REPORT.click();
        pending.remove_typing();
        let guidance = &self.config.no_report_message;
        self.view.append_turn(&RenderedTurn::new(
            Role::Assistant,
            guidance.as_str(),
            self.markdown.render(guidance),
        ));
        SubmitOutcome::NoReport
    }

    /// Display the outcome of a request and release the in-flight slot.
    ///
    /// Only a successful exchange is recorded in the conversation history; a
    /// failed one leaves the history untouched.
    pub fn handle_assistant_reply(
        &self,
        mut pending: PendingExchange<'_>,
        result: Result<AssistantReply>,
    ) -> SubmitOutcome {
        pending.remove_typing();

        let result = result.and_then(|reply| {
            if reply.response.trim().is_empty() {
                Err(Error::serialization(
                    "the assistant returned an empty response",
                    None,
                ))
            } else {
                Ok(reply)
            }
        });

        match result {
            Ok(reply) => {
                self.view.append_turn(&RenderedTurn::new(
                    Role::Assistant,
                    reply.response.as_str(),
                    self.markdown.render(&reply.response),
                ));
                self.lock_context()
                    .record_exchange(pending.user_text.as_str(), reply.response);
                self.answered.fetch_add(1, Ordering::Relaxed);
                tracing::debug!("assistant replied");
                SubmitOutcome::Answered
            }
            Err(err) => {
                CHAT_FAILURES.click();
                self.failed.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(error = %err, "assistant request failed");
                let message = format!("{APOLOGY} {err}");
                self.view.append_turn(&RenderedTurn::new(
                    Role::Assistant,
                    message.as_str(),
                    render_literal(&message),
                ));
                SubmitOutcome::Failed(err)
            }
        }
    }

    async fn request(
        &self,
        query: &AssistantQuery,
        cancel: &CancellationToken,
    ) -> Result<AssistantReply> {
        let timeout = self.config.request_timeout;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                BACKEND_CANCELLATIONS.click();
                Err(Error::abort("cancelled by user"))
            }
            result = tokio::time::timeout(timeout, self.backend.consult(query)) => match result {
                Ok(result) => result,
                Err(_) => {
                    BACKEND_TIMEOUTS.click();
                    Err(Error::timeout(
                        "no reply from the assistant",
                        Some(timeout.as_secs_f64()),
                    ))
                }
            },
        }
    }
}
