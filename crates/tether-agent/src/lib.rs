//! Agent side of Tether: the Gemini chat client, the tool registry, the
//! slash-command interceptor and the multi-turn tool-calling loop.

pub mod gemini;
pub mod pipeline;
pub mod provider;
pub mod runtime;
pub mod stream;
pub mod tools;

pub use pipeline::{run_turn, CommandKind, CommandOutcome, SlashCommands, TurnEvent};
pub use provider::{ChatModel, ModelError};
pub use runtime::{AgentSession, GeminiAgentFactory, SessionAgent};
