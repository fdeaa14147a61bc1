//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to generate reports and control the session without
//! sending messages to the assistant.

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the assistant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Clear the conversation history.
    Clear,

    /// Generate an email report and load it as analysis data.
    Report {
        /// Subject to search for.
        subject: String,
        /// Raw `from=` date, if given.
        from: Option<String>,
        /// Raw `to=` date, if given.
        to: Option<String>,
    },

    /// Drop the loaded report.
    Forget,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Display session statistics.
    Stats,

    /// Show the current configuration.
    ShowConfig,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use reportchat::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/report Outage from=2024-05-01").is_some());
/// assert!(parse_command("What caused the outage?").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "clear" => ChatCommand::Clear,
        "report" => parse_report_command(argument),
        "forget" => ChatCommand::Forget,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        "stats" | "status" => ChatCommand::Stats,
        "config" => ChatCommand::ShowConfig,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn parse_report_command(argument: Option<&str>) -> ChatCommand {
    let Some(arg) = argument else {
        return ChatCommand::Invalid("/report requires a subject".to_string());
    };

    let mut subject = Vec::new();
    let mut from = None;
    let mut to = None;
    for word in arg.split_whitespace() {
        if let Some(date) = word.strip_prefix("from=") {
            from = Some(date.to_string());
        } else if let Some(date) = word.strip_prefix("to=") {
            to = Some(date.to_string());
        } else {
            subject.push(word);
        }
    }

    if subject.is_empty() {
        return ChatCommand::Invalid("/report requires a subject".to_string());
    }

    ChatCommand::Report {
        subject: subject.join(" "),
        from,
        to,
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /report <subject> [from=YYYY-MM-DD] [to=YYYY-MM-DD]
                         Summarize matching emails and chat about the report
  /forget                Drop the loaded report
  /clear                 Clear conversation history
  /stats                 Show session statistics
  /config                Show current configuration
  /help                  Show this help message
  /quit                  Exit the chat

Ctrl+C while waiting for a reply cancels the request."#
}
