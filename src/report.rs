//! Email report generation.
//!
//! A report is a consolidated summary of the emails matching a subject and an
//! optional date range. Once generated it becomes the [`AnalysisData`] the chat
//! controller sends with every question.

use time::Date;
use time::format_description::FormatItem;
use time::macros::format_description;

use crate::error::{Error, Result};
use crate::observability::{REPORTS_EMPTY, REPORTS_GENERATED};
use crate::types::{AnalysisData, ReportResponse};

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

/// Backend that searches emails and summarizes them.
#[async_trait::async_trait]
pub trait ReportBackend: Send + Sync {
    /// Run the search described by `query`.
    async fn search_emails(&self, query: &ReportQuery) -> Result<ReportResponse>;
}

/// Validated filters for an email search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportQuery {
    subject: String,
    from: Option<Date>,
    to: Option<Date>,
}

impl ReportQuery {
    /// Create a query for `subject` with no date bounds.
    pub fn new(subject: impl AsRef<str>) -> Result<Self> {
        let subject = subject.as_ref().trim();
        if subject.is_empty() {
            return Err(Error::validation(
                "a report needs a subject",
                Some("asunto".to_string()),
            ));
        }
        Ok(Self {
            subject: subject.to_string(),
            from: None,
            to: None,
        })
    }

    /// Parse a query from raw command arguments.
    ///
    /// Dates must be `YYYY-MM-DD`; blank dates are treated as absent.
    pub fn parse(subject: &str, from: Option<&str>, to: Option<&str>) -> Result<Self> {
        let from = parse_date(from, "fecha_desde")?;
        let to = parse_date(to, "fecha_hasta")?;
        Self::new(subject)?.with_range(from, to)
    }

    /// Restrict the search to a date range; either end may be open.
    pub fn with_range(mut self, from: Option<Date>, to: Option<Date>) -> Result<Self> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(Error::validation(
                    format!("start date {from} is after end date {to}"),
                    Some("fecha_desde".to_string()),
                ));
            }
        }
        self.from = from;
        self.to = to;
        Ok(self)
    }

    /// The subject to search for.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// The first day searched, if bounded.
    pub fn from(&self) -> Option<Date> {
        self.from
    }

    /// The last day searched, if bounded.
    pub fn to(&self) -> Option<Date> {
        self.to
    }

    /// The start date as the backend expects it; empty when unbounded.
    pub fn from_param(&self) -> String {
        format_date(self.from)
    }

    /// The end date as the backend expects it; empty when unbounded.
    pub fn to_param(&self) -> String {
        format_date(self.to)
    }
}

fn parse_date(raw: Option<&str>, param: &str) -> Result<Option<Date>> {
    let Some(raw) = raw.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(None);
    };
    Date::parse(raw, DATE_FORMAT).map(Some).map_err(|e| {
        Error::validation(
            format!("{raw:?} is not a YYYY-MM-DD date: {e}"),
            Some(param.to_string()),
        )
    })
}

fn format_date(date: Option<Date>) -> String {
    date.and_then(|date| date.format(DATE_FORMAT).ok())
        .unwrap_or_default()
}

/// What a search produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    /// A summary was generated.
    Generated {
        /// Consolidated summary of the matching emails.
        summary: String,
        /// Number of emails summarized.
        total_emails: u64,
        /// The payload to hand to the chat controller.
        data: AnalysisData,
    },

    /// Nothing matched; the backend explains why.
    NoResults(String),

    /// The backend answered without a summary or an explanation.
    Empty,
}

/// Search emails and turn the response into a report.
pub async fn generate_report<B: ReportBackend + ?Sized>(
    backend: &B,
    query: &ReportQuery,
) -> Result<ReportOutcome> {
    tracing::info!(
        subject = query.subject(),
        from = %query.from_param(),
        to = %query.to_param(),
        "generating report"
    );
    let response = backend.search_emails(query).await?;
    let outcome = interpret(query, response);
    match &outcome {
        ReportOutcome::Generated { total_emails, .. } => {
            REPORTS_GENERATED.click();
            tracing::info!(total_emails, "report generated");
        }
        ReportOutcome::NoResults(_) | ReportOutcome::Empty => {
            REPORTS_EMPTY.click();
            tracing::info!("report search returned nothing");
        }
    }
    Ok(outcome)
}

fn interpret(query: &ReportQuery, response: ReportResponse) -> ReportOutcome {
    // An empty search carries both mensaje_general and a placeholder summary.
    if let Some(message) = response.general_message.filter(|m| !m.trim().is_empty()) {
        return ReportOutcome::NoResults(message);
    }
    match response.summary.filter(|s| !s.trim().is_empty()) {
        Some(summary) => {
            let total_emails = response.total_emails.unwrap_or(0);
            let data = AnalysisData::email_report(query.subject(), &summary, total_emails);
            ReportOutcome::Generated {
                summary,
                total_emails,
                data,
            }
        }
        None => ReportOutcome::Empty,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use time::macros::date;

    use super::*;
    use crate::types::EMAIL_REPORT_KIND;

    struct MockBackend {
        response: Result<ReportResponse>,
        calls: Mutex<Vec<ReportQuery>>,
    }

    impl MockBackend {
        fn new(response: Result<ReportResponse>) -> Self {
            Self {
                response,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl ReportBackend for MockBackend {
        async fn search_emails(&self, query: &ReportQuery) -> Result<ReportResponse> {
            self.calls.lock().unwrap().push(query.clone());
            self.response.clone()
        }
    }

    #[test]
    fn subject_is_required() {
        let err = ReportQuery::new("   ").unwrap_err();
        assert!(err.is_validation());
        assert!(err.to_string().contains("asunto"), "{err}");
    }

    #[test]
    fn parse_dates() {
        let query = ReportQuery::parse(" Outage ", Some("2024-05-01"), Some("2024-05-31")).unwrap();
        assert_eq!(query.subject(), "Outage");
        assert_eq!(query.from(), Some(date!(2024 - 05 - 01)));
        assert_eq!(query.to(), Some(date!(2024 - 05 - 31)));
        assert_eq!(query.from_param(), "2024-05-01");
        assert_eq!(query.to_param(), "2024-05-31");
    }

    #[test]
    fn open_range_params_are_empty() {
        let query = ReportQuery::parse("Outage", None, Some("")).unwrap();
        assert_eq!(query.from_param(), "");
        assert_eq!(query.to_param(), "");
    }

    #[test]
    fn malformed_date_is_rejected() {
        for raw in ["2024/05/01", "01-05-2024", "2024-13-01", "yesterday"] {
            let err = ReportQuery::parse("Outage", Some(raw), None).unwrap_err();
            assert!(err.is_validation(), "{raw}: {err:?}");
        }
    }

    #[test]
    fn inverted_range_is_rejected() {
        let err = ReportQuery::parse("Outage", Some("2024-06-01"), Some("2024-05-01")).unwrap_err();
        assert!(err.is_validation());

        // A single-day range is fine.
        ReportQuery::parse("Outage", Some("2024-05-01"), Some("2024-05-01")).unwrap();
    }

    #[tokio::test]
    async fn generated_report_yields_analysis_data() {
        let backend = MockBackend::new(Ok(ReportResponse {
            summary: Some("Two incidents, both resolved.".to_string()),
            total_emails: Some(7),
            ..ReportResponse::default()
        }));
        let query = ReportQuery::new("Outage").unwrap();
        let outcome = generate_report(&backend, &query).await.unwrap();

        let ReportOutcome::Generated {
            summary,
            total_emails,
            data,
        } = outcome
        else {
            panic!("expected a generated report");
        };
        assert_eq!(summary, "Two incidents, both resolved.");
        assert_eq!(total_emails, 7);
        assert_eq!(data.kind(), Some(EMAIL_REPORT_KIND));
        assert_eq!(data.as_value()["asunto"], "Outage");
        assert_eq!(backend.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn general_message_wins_over_summary() {
        let backend = MockBackend::new(Ok(ReportResponse {
            summary: Some("No hay correos.".to_string()),
            general_message: Some("No emails matched those filters.".to_string()),
            ..ReportResponse::default()
        }));
        let query = ReportQuery::new("Outage").unwrap();
        let outcome = generate_report(&backend, &query).await.unwrap();
        assert_eq!(
            outcome,
            ReportOutcome::NoResults("No emails matched those filters.".to_string())
        );
    }

    #[tokio::test]
    async fn empty_response_is_empty() {
        let backend = MockBackend::new(Ok(ReportResponse::default()));
        let query = ReportQuery::new("Outage").unwrap();
        let outcome = generate_report(&backend, &query).await.unwrap();
        assert_eq!(outcome, ReportOutcome::Empty);
    }

    #[tokio::test]
    async fn backend_errors_propagate() {
        let backend = MockBackend::new(Err(Error::bad_request("asunto is required")));
        let query = ReportQuery::new("Outage").unwrap();
        let err = generate_report(&backend, &query).await.unwrap_err();
        assert!(matches!(err, Error::BadRequest { .. }));
    }
}
