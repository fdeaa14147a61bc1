//! Interactive chat about a consolidated email report.
//!
//! This binary provides a REPL for generating an email report from the
//! backend and then asking the assistant questions about it.
//!
//! # Usage
//!
//! ```bash
//! # Talk to the backend at $REPORTCHAT_BASE_URL (or http://127.0.0.1:5000/)
//! reportchat
//!
//! # Point at another backend and give slow replies more time
//! reportchat --base-url http://reports.internal:8000 --timeout-secs 90
//!
//! # Disable colors (useful for piping output)
//! reportchat --no-color
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/report <subject> [from=YYYY-MM-DD] [to=YYYY-MM-DD]` - Generate a report
//! - `/forget` - Drop the loaded report
//! - `/clear` - Clear conversation history
//! - `/stats` - Show session statistics
//! - `/help` - Show available commands
//! - `/quit` - Exit the application

use std::sync::{Arc, Mutex};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use reportchat::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatController, SubmitOutcome, help_text, parse_command,
};
use reportchat::render::{ChatView, TerminalView};
use reportchat::report::{ReportOutcome, ReportQuery, generate_report};
use reportchat::{Backend, Error};

type Controller = ChatController<Backend, TerminalView>;

const NO_REPORT_MESSAGE: &str = "No report has been generated yet. \
     Run `/report <subject>` first, then ask me about it.";

/// Main entry point for the reportchat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ChatArgs::from_command_line_relaxed("reportchat [OPTIONS]");
    let config = ChatConfig::from(args).with_no_report_message(NO_REPORT_MESSAGE);
    init_tracing(&config.log_level);

    let backend = Backend::with_options(config.base_url.clone(), Some(config.request_timeout))?;
    let base_url = backend.base_url().clone();
    let view = TerminalView::with_options(config.use_color, config.show_html);
    let controller = ChatController::new(backend, view, config);
    let mut rl = DefaultEditor::new()?;

    // Token for the request currently in flight; replaced before each input.
    let cancel = Arc::new(Mutex::new(CancellationToken::new()));

    // Set up Ctrl+C handler
    let cancel_clone = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        if let Ok(token) = cancel_clone.lock() {
            token.cancel();
        }
    })?;

    println!("Report Chat (backend: {base_url})");
    println!("Type /help for commands, /quit to exit\n");

    loop {
        let token = CancellationToken::new();
        if let Ok(mut current) = cancel.lock() {
            *current = token.clone();
        }

        match rl.readline("You: ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(line);

                // Check for slash commands
                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Clear => {
                            controller.clear_history();
                            controller.view().print_info("Conversation cleared.");
                        }
                        ChatCommand::Forget => {
                            controller.clear_analysis_data();
                            controller.view().print_info("Report dropped.");
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {}", line);
                            }
                        }
                        ChatCommand::Report { subject, from, to } => {
                            run_report(&controller, &subject, from, to, &token).await;
                        }
                        ChatCommand::Stats => {
                            print_stats(&controller);
                        }
                        ChatCommand::ShowConfig => {
                            print_config(&controller);
                        }
                        ChatCommand::Invalid(message) => {
                            controller.view().print_error(&message);
                        }
                    }
                    continue;
                }

                // Regular message - send to the assistant
                if let SubmitOutcome::Rejected = controller.submit_user_message(line, &token).await
                {
                    tracing::debug!("input dropped while a reply was pending");
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                // Ctrl+D - exit
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                controller
                    .view()
                    .print_error(&format!("Input error: {}", err));
                break;
            }
        }
    }

    Ok(())
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn run_report(
    controller: &Controller,
    subject: &str,
    from: Option<String>,
    to: Option<String>,
    cancel: &CancellationToken,
) {
    let view = controller.view();
    let query = match ReportQuery::parse(subject, from.as_deref(), to.as_deref()) {
        Ok(query) => query,
        Err(err) => {
            view.print_error(&err.to_string());
            return;
        }
    };

    view.print_info(&format!("Searching emails about {:?}...", query.subject()));
    let result = tokio::select! {
        result = generate_report(controller.backend(), &query) => result,
        _ = cancel.cancelled() => Err(Error::abort("cancelled by user")),
    };

    match result {
        Ok(ReportOutcome::Generated {
            summary,
            total_emails,
            data,
        }) => {
            controller.set_analysis_data(data);
            println!("{summary}\n");
            view.print_info(&format!(
                "Report loaded ({total_emails} emails). Ask away."
            ));
        }
        Ok(ReportOutcome::NoResults(message)) => view.print_info(&message),
        Ok(ReportOutcome::Empty) => view.print_info("The backend returned an empty report."),
        Err(err) => view.print_error(&format!("Report failed: {err}")),
    }
}

fn print_stats(controller: &Controller) {
    let stats = controller.stats();
    println!("    Session Statistics:");
    println!("      Messages: {}", stats.history_len);
    match stats.analysis_kind.as_deref() {
        Some(kind) => println!("      Report: loaded ({kind})"),
        None if stats.has_analysis_data => println!("      Report: loaded"),
        None => println!("      Report: (none)"),
    }
    println!(
        "      Exchanges: {} answered / {} failed / {} rejected",
        stats.answered, stats.failed, stats.rejected
    );
    println!(
        "      In flight: {}",
        if stats.in_flight { "yes" } else { "no" }
    );
}

fn print_config(controller: &Controller) {
    let config = controller.config();
    println!("    Current Configuration:");
    println!("      Backend: {}", controller.backend().base_url());
    println!(
        "      Request timeout: {:.1}s",
        config.request_timeout.as_secs_f64()
    );
    println!("      Context window: {} turns", config.context_window);
    println!(
        "      Typing delay: {}ms",
        config.typing_delay.as_millis()
    );
    println!(
        "      Output: {}{}",
        if config.use_color { "color" } else { "plain" },
        if config.show_html { ", html" } else { "" }
    );
    println!("      Log filter: {}", config.log_level);
}
