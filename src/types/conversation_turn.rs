use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Who sent a turn.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person typing into the chat.
    User,

    /// The remote assistant.
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Error returned when parsing an invalid role string.
#[derive(Debug)]
pub struct RoleParseError {
    /// The invalid string value that could not be parsed.
    pub invalid_value: String,
}

impl fmt::Display for RoleParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown role: {}", self.invalid_value)
    }
}

impl std::error::Error for RoleParseError {}

impl FromStr for Role {
    type Err = RoleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            _ => Err(RoleParseError {
                invalid_value: s.to_string(),
            }),
        }
    }
}

/// One message exchanged in the chat.
///
/// Turns have no identity beyond their position in the history they live in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationTurn {
    /// The sender of the turn.
    pub role: Role,

    /// The raw, unrendered text of the turn.
    pub content: String,
}

impl ConversationTurn {
    /// Create a new turn.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialization() {
        let turn = ConversationTurn::user("hola");
        let json = serde_json::to_string(&turn).unwrap();
        assert_eq!(json, r#"{"role":"user","content":"hola"}"#);
    }

    #[test]
    fn deserialization() {
        let json = r#"{"role":"assistant","content":"**ok**"}"#;
        let turn: ConversationTurn = serde_json::from_str(json).unwrap();
        assert_eq!(turn, ConversationTurn::assistant("**ok**"));
    }

    #[test]
    fn role_round_trips_through_display() {
        assert_eq!(Role::User.to_string().parse::<Role>().unwrap(), Role::User);
        assert_eq!(
            Role::Assistant.to_string().parse::<Role>().unwrap(),
            Role::Assistant
        );
        assert!("system".parse::<Role>().is_err());
    }
}
