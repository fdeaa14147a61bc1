use serde::{Deserialize, Serialize};

/// Body returned by `GET /api/buscar_correos`.
///
/// Every field is optional: a successful search carries `resumen_consolidado`,
/// and an empty search adds `mensaje_general`. Failure bodies are read by the
/// client's error handling, not through this type.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportResponse {
    /// Consolidated summary of the matching emails.
    #[serde(rename = "resumen_consolidado", skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Number of emails the summary covers.
    #[serde(rename = "total_correos", skip_serializing_if = "Option::is_none")]
    pub total_emails: Option<u64>,

    /// Explanation sent when nothing matched the filters.
    #[serde(rename = "mensaje_general", skip_serializing_if = "Option::is_none")]
    pub general_message: Option<String>,
}
