//! Message pipeline: slash-command interception and the multi-turn
//! tool-calling orchestrator.
//!
//! A connection hands each user message to `SlashCommands::process` first;
//! when that returns `None` the message goes through `run_turn`.

pub mod slash;
pub mod turn;

pub use slash::{CommandKind, CommandOutcome, SlashCommands};
pub use turn::{run_turn, TurnEvent};
