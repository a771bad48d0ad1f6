//! Slash command handler, intercepted before the model is called.
//!
//! Recognised commands never reach `ChatModel::send_stream`. Anything else,
//! including unknown `/foo` text, is forwarded to the orchestrator verbatim.

use std::sync::Arc;

use tracing::{info, warn};

use crate::runtime::AgentSession;

const HELP_TEXT: &str = "Available commands:\n\
    /help - show this help\n\
    /clear - clear the chat history\n\
    /tools - list the available tools\n\
    /chat save <tag> - save the chat history as a checkpoint\n\
    /chat list - list saved checkpoints\n\
    /chat resume <tag> - restore a saved checkpoint";

const SAVE_USAGE: &str = "Error: please specify a tag. Usage: /chat save <tag>";
const RESUME_USAGE: &str = "Error: please specify a tag. Usage: /chat resume <tag>";

const MAX_TAG_LEN: usize = 64;

/// How the client should present a command result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Open a dialog (only `/help`).
    Dialog,
    /// Plain message shown in the transcript.
    Message,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub kind: CommandKind,
    pub content: String,
}

impl CommandOutcome {
    fn dialog(content: impl Into<String>) -> Self {
        Self {
            kind: CommandKind::Dialog,
            content: content.into(),
        }
    }

    fn message(content: impl Into<String>) -> Self {
        Self {
            kind: CommandKind::Message,
            content: content.into(),
        }
    }
}

/// Command interceptor scoped to one session's agent.
#[derive(Clone)]
pub struct SlashCommands {
    session: Arc<AgentSession>,
}

impl SlashCommands {
    pub fn new(session: Arc<AgentSession>) -> Self {
        Self { session }
    }

    /// Handle `raw` if it is a recognised command.
    ///
    /// Returns `None` when the text should go to the model instead.
    /// Commands that change the model conversation take the session pass
    /// lock so they cannot interleave with a running turn.
    pub async fn process(&self, raw: &str) -> Option<CommandOutcome> {
        let trimmed = raw.trim();
        let agent = self.session.agent();

        if trimmed == "/help" {
            return Some(CommandOutcome::dialog(HELP_TEXT));
        }

        if trimmed == "/clear" {
            let _pass = self.session.begin_pass().await;
            if let Err(e) = agent.model().reset_chat().await {
                warn!(session_id = %self.session.id(), error = %e, "reset_chat failed");
                return Some(CommandOutcome::message(format!(
                    "Error: failed to clear chat history: {e}"
                )));
            }
            info!(session_id = %self.session.id(), "chat history cleared");
            return Some(CommandOutcome::message("Chat history cleared."));
        }

        if trimmed == "/tools" {
            let listing = agent
                .tools()
                .declarations()
                .iter()
                .map(|d| format!("- {}: {}", d.name, d.description))
                .collect::<Vec<_>>()
                .join("\n");
            return Some(CommandOutcome::message(format!(
                "Available tools:\n{}",
                listing
            )));
        }

        if trimmed == "/chat list" {
            let tags = agent.checkpoint_tags().await;
            if tags.is_empty() {
                return Some(CommandOutcome::message("No saved checkpoints."));
            }
            let listing = tags
                .iter()
                .map(|t| format!("- {}", t))
                .collect::<Vec<_>>()
                .join("\n");
            return Some(CommandOutcome::message(format!(
                "Saved checkpoints:\n{}",
                listing
            )));
        }

        if let Some(rest) = subcommand(trimmed, "/chat save") {
            let tag = rest.trim();
            if tag.is_empty() {
                return Some(CommandOutcome::message(SAVE_USAGE));
            }
            if let Err(reason) = validate_tag(tag) {
                return Some(CommandOutcome::message(format!("Error: {reason}")));
            }
            let _pass = self.session.begin_pass().await;
            let saved = agent.save_checkpoint(tag).await;
            info!(session_id = %self.session.id(), tag, entries = saved, "checkpoint saved");
            return Some(CommandOutcome::message(format!(
                "Chat history saved as \"{}\".",
                tag
            )));
        }

        if let Some(rest) = subcommand(trimmed, "/chat resume") {
            let tag = rest.trim();
            if tag.is_empty() {
                return Some(CommandOutcome::message(RESUME_USAGE));
            }
            let _pass = self.session.begin_pass().await;
            return Some(match agent.resume_checkpoint(tag).await {
                Some(entries) => {
                    info!(session_id = %self.session.id(), tag, entries, "checkpoint resumed");
                    CommandOutcome::message(format!("Resumed chat history \"{}\".", tag))
                }
                None => CommandOutcome::message(format!("Error: no checkpoint named \"{}\".", tag)),
            });
        }

        None
    }
}

/// `Some(rest)` when `input` is exactly `command` or `command` followed by
/// whitespace. `/chat saveX` does not match `/chat save`.
fn subcommand<'a>(input: &'a str, command: &str) -> Option<&'a str> {
    let rest = input.strip_prefix(command)?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest)
    } else {
        None
    }
}

fn validate_tag(tag: &str) -> Result<(), String> {
    if tag.chars().count() > MAX_TAG_LEN {
        return Err(format!("tag is longer than {} characters", MAX_TAG_LEN));
    }
    if !tag
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(format!(
            "invalid tag \"{}\": use letters, digits, '-', '_' or '.'",
            tag
        ));
    }
    Ok(())
}
