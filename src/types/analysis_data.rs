use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Tag the assistant endpoint uses to recognize an email report.
pub const EMAIL_REPORT_KIND: &str = "informe_correo";

/// Opaque report payload handed to the assistant endpoint as context.
///
/// The chat controller never looks inside; it only stores the latest value and
/// forwards it with every query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct AnalysisData(Value);

impl AnalysisData {
    /// Wrap an arbitrary JSON payload.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Build the payload for a consolidated email report.
    pub fn email_report(subject: &str, summary: &str, total_emails: u64) -> Self {
        Self(json!({
            "tipo": EMAIL_REPORT_KIND,
            "asunto": subject,
            "contenido": summary,
            "total_correos": total_emails,
        }))
    }

    /// The report kind, when the payload carries one.
    pub fn kind(&self) -> Option<&str> {
        self.0.get("tipo").and_then(Value::as_str)
    }

    /// Borrow the underlying JSON value.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume the wrapper and return the JSON value.
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for AnalysisData {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_report_shape() {
        let data = AnalysisData::email_report("Outage", "It broke.", 3);
        assert_eq!(data.kind(), Some(EMAIL_REPORT_KIND));
        assert_eq!(data.as_value()["asunto"], "Outage");
        assert_eq!(data.as_value()["contenido"], "It broke.");
        assert_eq!(data.as_value()["total_correos"], 3);
    }

    #[test]
    fn serializes_transparently() {
        let data = AnalysisData::new(json!({"families": [1, 2]}));
        let json = serde_json::to_string(&data).unwrap();
        assert_eq!(json, r#"{"families":[1,2]}"#);
        assert_eq!(data.kind(), None);
    }
}
