use biometrics::{Collector, Counter, Moments};

pub(crate) static CHAT_SUBMISSIONS: Counter = Counter::new("reportchat.chat.submissions");
pub(crate) static CHAT_IGNORED: Counter = Counter::new("reportchat.chat.ignored");
pub(crate) static CHAT_REJECTED: Counter = Counter::new("reportchat.chat.rejected");
pub(crate) static CHAT_NO_REPORT: Counter = Counter::new("reportchat.chat.no_report");
pub(crate) static CHAT_FAILURES: Counter = Counter::new("reportchat.chat.failures");

pub(crate) static BACKEND_REQUESTS: Counter = Counter::new("reportchat.backend.requests");
pub(crate) static BACKEND_REQUEST_ERRORS: Counter =
    Counter::new("reportchat.backend.request_errors");
pub(crate) static BACKEND_TIMEOUTS: Counter = Counter::new("reportchat.backend.timeouts");
pub(crate) static BACKEND_CANCELLATIONS: Counter =
    Counter::new("reportchat.backend.cancellations");
pub(crate) static BACKEND_REQUEST_DURATION: Moments =
    Moments::new("reportchat.backend.request_duration_seconds");

pub(crate) static REPORTS_GENERATED: Counter = Counter::new("reportchat.report.generated");
pub(crate) static REPORTS_EMPTY: Counter = Counter::new("reportchat.report.empty");

pub(crate) static MARKDOWN_FALLBACKS: Counter = Counter::new("reportchat.markdown.fallbacks");

/// Register this crate's biometrics with the provided collector.
pub fn register_biometrics(collector: Collector) {
    collector.register_counter(&CHAT_SUBMISSIONS);
    collector.register_counter(&CHAT_IGNORED);
    collector.register_counter(&CHAT_REJECTED);
    collector.register_counter(&CHAT_NO_REPORT);
    collector.register_counter(&CHAT_FAILURES);

    collector.register_counter(&BACKEND_REQUESTS);
    collector.register_counter(&BACKEND_REQUEST_ERRORS);
    collector.register_counter(&BACKEND_TIMEOUTS);
    collector.register_counter(&BACKEND_CANCELLATIONS);
    collector.register_moments(&BACKEND_REQUEST_DURATION);

    collector.register_counter(&REPORTS_GENERATED);
    collector.register_counter(&REPORTS_EMPTY);

    collector.register_counter(&MARKDOWN_FALLBACKS);
}
