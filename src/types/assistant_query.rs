use serde::{Deserialize, Serialize};

use crate::types::{AnalysisData, ConversationTurn};

/// Body of `POST /api/asistente_consulta`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssistantQuery {
    /// The user's message.
    pub query: String,

    /// The most recent history entries, oldest first.
    pub context: Vec<ConversationTurn>,

    /// The last generated report, or `null` when none exists.
    #[serde(rename = "analysisData")]
    pub analysis_data: Option<AnalysisData>,
}

impl AssistantQuery {
    /// Create a new query.
    pub fn new(
        query: impl Into<String>,
        context: Vec<ConversationTurn>,
        analysis_data: Option<AnalysisData>,
    ) -> Self {
        Self {
            query: query.into(),
            context,
            analysis_data,
        }
    }
}

/// Successful body of `POST /api/asistente_consulta`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssistantReply {
    /// Markdown text produced by the assistant.
    pub response: String,
}

impl AssistantReply {
    /// Create a new reply.
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}
