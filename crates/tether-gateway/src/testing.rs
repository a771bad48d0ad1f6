//! Shared fakes for handler tests.

use std::sync::Arc;

use async_trait::async_trait;
use tether_agent::provider::{ChunkStream, Content, FunctionDeclaration, ModelChunk, Part};
use tether_agent::tools::ToolRegistry;
use tether_agent::{ChatModel, GeminiAgentFactory, ModelError, SessionAgent};
use tether_core::config::TetherConfig;
use tether_sessions::{AgentFactory, SessionContext, SessionStore};
use tokio::sync::Mutex;

use crate::app::AppState;

/// Answers every message with `echo: <text>`; a message containing `boom`
/// is refused with an API error.
#[derive(Default)]
pub struct EchoModel {
    history: Arc<Mutex<Vec<Content>>>,
}

#[async_trait]
impl ChatModel for EchoModel {
    fn name(&self) -> &str {
        "echo"
    }

    async fn send_stream(
        &self,
        message: Vec<Part>,
        _tools: &[FunctionDeclaration],
        _prompt_id: &str,
    ) -> Result<ChunkStream, ModelError> {
        let text = Content::user(message.clone()).text();
        if text.contains("boom") {
            return Err(ModelError::Api {
                status: 500,
                message: "upstream exploded".into(),
            });
        }
        let reply = format!("echo: {text}");
        let history = Arc::clone(&self.history);
        let stream = async_stream::stream! {
            yield Ok(ModelChunk::from_text(reply.clone()));
            let mut h = history.lock().await;
            h.push(Content::user(message));
            h.push(Content::model(vec![Part::text(reply)]));
        };
        Ok(Box::pin(stream))
    }

    async fn reset_chat(&self) -> Result<(), ModelError> {
        self.history.lock().await.clear();
        Ok(())
    }

    async fn history(&self) -> Vec<Content> {
        self.history.lock().await.clone()
    }

    async fn set_history(&self, history: Vec<Content>) {
        *self.history.lock().await = history;
    }
}

pub struct EchoFactory;

#[async_trait]
impl AgentFactory for EchoFactory {
    type Agent = SessionAgent;

    async fn build(&self, ctx: &SessionContext) -> tether_sessions::error::Result<SessionAgent> {
        Ok(SessionAgent::new(
            Arc::new(EchoModel::default()),
            ToolRegistry::builtin(&ctx.working_dir, None),
        ))
    }
}

fn state_with(factory: Arc<dyn AgentFactory<Agent = SessionAgent>>) -> (Arc<AppState>, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(factory, dir.path());
    let state = AppState::new(TetherConfig::default(), Arc::new(store));
    (Arc::new(state), dir)
}

pub fn state() -> (Arc<AppState>, tempfile::TempDir) {
    state_with(Arc::new(EchoFactory))
}

/// State whose factory is the real Gemini one without an API key.
pub fn state_without_key() -> (Arc<AppState>, tempfile::TempDir) {
    state_with(Arc::new(GeminiAgentFactory::new(
        None,
        "http://localhost:9".into(),
        "gemini-2.5-pro".into(),
    )))
}
