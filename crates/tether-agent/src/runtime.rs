use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tether_core::config::TetherConfig;
use tether_sessions::{AgentFactory, Session, SessionContext, SessionError};
use tokio::sync::Mutex;
use tracing::info;

use crate::gemini::GeminiChat;
use crate::provider::{ChatModel, Content};
use crate::tools::ToolRegistry;

/// Per-session agent: the model conversation, the tools it may call and the
/// in-memory `/chat save` checkpoints.
pub struct SessionAgent {
    model: Arc<dyn ChatModel>,
    tools: ToolRegistry,
    checkpoints: Mutex<HashMap<String, Vec<Content>>>,
}

/// A session whose agent is a `SessionAgent`.
pub type AgentSession = Session<SessionAgent>;

impl SessionAgent {
    pub fn new(model: Arc<dyn ChatModel>, tools: ToolRegistry) -> Self {
        Self {
            model,
            tools,
            checkpoints: Mutex::new(HashMap::new()),
        }
    }

    pub fn model(&self) -> &dyn ChatModel {
        &*self.model
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Snapshot the model history under `tag`, replacing any earlier one.
    /// Returns the number of history entries saved.
    pub async fn save_checkpoint(&self, tag: &str) -> usize {
        let history = self.model.history().await;
        let len = history.len();
        self.checkpoints.lock().await.insert(tag.to_string(), history);
        len
    }

    /// Restore the model history saved under `tag`. `None` if unknown.
    pub async fn resume_checkpoint(&self, tag: &str) -> Option<usize> {
        let history = self.checkpoints.lock().await.get(tag).cloned()?;
        let len = history.len();
        self.model.set_history(history).await;
        Some(len)
    }

    /// Saved checkpoint tags, sorted.
    pub async fn checkpoint_tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.checkpoints.lock().await.keys().cloned().collect();
        tags.sort();
        tags
    }
}

/// Builds a Gemini-backed `SessionAgent` with the built-in tools rooted at
/// the session working directory.
pub struct GeminiAgentFactory {
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl GeminiAgentFactory {
    pub fn new(api_key: Option<String>, base_url: String, model: String) -> Self {
        Self {
            api_key,
            base_url,
            model,
        }
    }

    pub fn from_config(config: &TetherConfig) -> Self {
        Self::new(
            config.gemini_api_key(),
            config.gemini_base_url(),
            config.agent.model.clone(),
        )
    }
}

#[async_trait]
impl AgentFactory for GeminiAgentFactory {
    type Agent = SessionAgent;

    async fn build(&self, ctx: &SessionContext) -> tether_sessions::error::Result<SessionAgent> {
        let api_key = self
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                SessionError::Configuration(
                    "API key not configured. Please set GEMINI_API_KEY environment variable."
                        .to_string(),
                )
            })?;

        let tools = ToolRegistry::builtin(&ctx.working_dir, ctx.credential.as_deref());
        let chat = GeminiChat::new(api_key, Some(self.base_url.clone()), self.model.clone())
            .with_system_instruction(system_instruction(ctx));

        info!(
            session_id = %ctx.id,
            model = %self.model,
            tools = tools.len(),
            "agent built"
        );
        Ok(SessionAgent::new(Arc::new(chat), tools))
    }
}

fn system_instruction(ctx: &SessionContext) -> String {
    let mut s = format!(
        "You are a coding assistant working inside the directory `{}`.\n\
         Use the available tools to inspect and change files there. \
         Paths are relative to that directory and may not leave it. \
         Keep answers concise.",
        ctx.working_dir.display()
    );
    if ctx.credential.is_some() {
        s.push_str("\nA GitHub token is available to shell commands as GITHUB_TOKEN.");
    }
    s
}
