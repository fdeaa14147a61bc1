// Public modules
pub mod analysis_data;
pub mod assistant_query;
pub mod conversation_turn;
pub mod report_response;

// Re-exports
pub use analysis_data::{AnalysisData, EMAIL_REPORT_KIND};
pub use assistant_query::{AssistantQuery, AssistantReply};
pub use conversation_turn::{ConversationTurn, Role, RoleParseError};
pub use report_response::ReportResponse;
