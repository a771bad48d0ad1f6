use std::sync::Arc;

use tether_agent::{run_turn, AgentSession, SlashCommands};
use tether_protocol::{ClientFrame, ServerFrame};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::ws::relay;
use crate::ws::send::{self, Outbound};

/// Per-connection state. `Unbound` until a valid `init`; a later valid
/// `init` rebinds to another session.
pub enum ConnState {
    Unbound,
    Bound(Binding),
}

/// The session a connection talks to, plus its command interceptor.
pub struct Binding {
    session: Arc<AgentSession>,
    commands: SlashCommands,
}

impl Binding {
    fn new(session: Arc<AgentSession>) -> Self {
        let commands = SlashCommands::new(Arc::clone(&session));
        Self { session, commands }
    }
}

impl ConnState {
    pub fn session_id(&self) -> Option<&str> {
        match self {
            ConnState::Unbound => None,
            ConnState::Bound(b) => Some(b.session.id().as_str()),
        }
    }
}

/// Process one inbound WS text frame. Returns the new connection state.
///
/// Every rejection is answered with an `error` frame and leaves the state
/// as it was.
pub async fn handle(
    conn_id: &str,
    text: &str,
    state: ConnState,
    tx: &Outbound,
    app: &AppState,
    cancel: &CancellationToken,
) -> ConnState {
    let frame = match ClientFrame::parse(text) {
        Ok(f) => f,
        Err(e) => {
            warn!(conn_id, error = %e, "rejected inbound frame");
            send::frame(tx, ServerFrame::error(e.to_string())).await;
            return state;
        }
    };

    match frame {
        ClientFrame::Init { session_id } => handle_init(conn_id, &session_id, state, tx, app).await,
        ClientFrame::Message { content } => match state {
            ConnState::Unbound => {
                send::frame(tx, ServerFrame::error("Session not initialized")).await;
                ConnState::Unbound
            }
            ConnState::Bound(binding) => {
                handle_message(conn_id, &content, &binding, tx, app, cancel).await;
                ConnState::Bound(binding)
            }
        },
    }
}

async fn handle_init(
    conn_id: &str,
    session_id: &str,
    state: ConnState,
    tx: &Outbound,
    app: &AppState,
) -> ConnState {
    match app.sessions.get(session_id) {
        Ok(session) => {
            if let Some(previous) = state.session_id() {
                info!(conn_id, from = previous, to = session_id, "connection rebound");
            } else {
                info!(conn_id, session_id, "session initialized");
            }
            send::frame(tx, ServerFrame::Ready).await;
            ConnState::Bound(Binding::new(session))
        }
        Err(e) => {
            warn!(conn_id, session_id, error = %e, "init for unknown session");
            send::frame(tx, ServerFrame::error("Session not found")).await;
            state
        }
    }
}

async fn handle_message(
    conn_id: &str,
    content: &str,
    binding: &Binding,
    tx: &Outbound,
    app: &AppState,
    cancel: &CancellationToken,
) {
    // Re-resolve so an evicted session is reported, and mark it active.
    let session = match app.sessions.get(binding.session.id().as_str()) {
        Ok(s) => s,
        Err(_) => {
            send::frame(tx, ServerFrame::error("Session not found")).await;
            return;
        }
    };

    if let Some(outcome) = binding.commands.process(content).await {
        debug!(conn_id, session_id = %session.id(), kind = ?outcome.kind, "slash command handled");
        relay::command_outcome(outcome, tx).await;
        return;
    }

    let events = run_turn(
        session,
        content.to_string(),
        app.config.agent.max_turns,
        cancel.child_token(),
    );
    if !relay::forward(events, tx).await {
        debug!(conn_id, "client went away mid-pass");
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::testing;

    struct Harness {
        app: Arc<AppState>,
        tx: Outbound,
        rx: mpsc::Receiver<ServerFrame>,
        cancel: CancellationToken,
        state: ConnState,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        fn new() -> Self {
            let (app, dir) = testing::state();
            let (tx, rx) = mpsc::channel(64);
            Self {
                app,
                tx,
                rx,
                cancel: CancellationToken::new(),
                state: ConnState::Unbound,
                _dir: dir,
            }
        }

        async fn send(&mut self, text: &str) -> Vec<ServerFrame> {
            let state = std::mem::replace(&mut self.state, ConnState::Unbound);
            self.state = handle("test", text, state, &self.tx, &self.app, &self.cancel).await;
            let mut frames = Vec::new();
            while let Ok(f) = self.rx.try_recv() {
                frames.push(f);
            }
            frames
        }

        async fn new_session(&self) -> Arc<AgentSession> {
            self.app.sessions.create().await.unwrap()
        }

        async fn init(&mut self, session: &AgentSession) {
            let frames = self
                .send(&format!(r#"{{"type":"init","sessionId":"{}"}}"#, session.id()))
                .await;
            assert_eq!(frames, vec![ServerFrame::Ready]);
        }
    }

    #[tokio::test]
    async fn malformed_frames_are_rejected_without_state_change() {
        let mut h = Harness::new();
        for bad in ["not json", "[1,2]", r#"{"content":"x"}"#, r#"{"type":7}"#] {
            let frames = h.send(bad).await;
            assert_eq!(frames, vec![ServerFrame::error("Invalid message format")], "{bad}");
            assert!(h.state.session_id().is_none());
        }
        let frames = h.send(r#"{"type":"bogus"}"#).await;
        assert_eq!(frames, vec![ServerFrame::error("Unknown message type: bogus")]);
    }

    #[tokio::test]
    async fn malformed_frames_keep_an_existing_binding() {
        let mut h = Harness::new();
        let session = h.new_session().await;
        h.init(&session).await;

        for bad in ["not json", "[1,2]", r#"{"content":"x"}"#, r#"{"type":7}"#] {
            let frames = h.send(bad).await;
            assert_eq!(frames, vec![ServerFrame::error("Invalid message format")], "{bad}");
            assert_eq!(h.state.session_id(), Some(session.id().as_str()), "{bad}");
        }
        let frames = h.send(r#"{"type":"bogus"}"#).await;
        assert_eq!(frames, vec![ServerFrame::error("Unknown message type: bogus")]);
        assert_eq!(h.state.session_id(), Some(session.id().as_str()));
        assert_eq!(session.history_len(), 0);

        let frames = h.send(r#"{"type":"message","content":"still bound"}"#).await;
        assert_eq!(
            frames,
            vec![ServerFrame::content("echo: still bound"), ServerFrame::StreamEnd]
        );
    }

    #[tokio::test]
    async fn message_before_init_is_an_error() {
        let mut h = Harness::new();
        let session = h.new_session().await;
        let frames = h.send(r#"{"type":"message","content":"hello"}"#).await;
        assert_eq!(frames, vec![ServerFrame::error("Session not initialized")]);
        assert_eq!(session.history_len(), 0);
    }

    #[tokio::test]
    async fn init_requires_a_known_session() {
        let mut h = Harness::new();
        let frames = h.send(r#"{"type":"init"}"#).await;
        assert_eq!(frames, vec![ServerFrame::error("Session ID is required")]);

        let frames = h.send(r#"{"type":"init","sessionId":"missing"}"#).await;
        assert_eq!(frames, vec![ServerFrame::error("Session not found")]);
        assert!(h.state.session_id().is_none());
    }

    #[tokio::test]
    async fn hello_round_trip() {
        let mut h = Harness::new();
        let session = h.new_session().await;
        h.init(&session).await;

        let frames = h.send(r#"{"type":"message","content":"hello"}"#).await;
        assert_eq!(
            frames,
            vec![ServerFrame::content("echo: hello"), ServerFrame::StreamEnd]
        );
        let history = session.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].content, "echo: hello");
    }

    #[tokio::test]
    async fn help_is_answered_without_the_model() {
        let mut h = Harness::new();
        let session = h.new_session().await;
        h.init(&session).await;

        let frames = h.send(r#"{"type":"message","content":"/help"}"#).await;
        assert_eq!(frames.len(), 2);
        match &frames[0] {
            ServerFrame::StreamChunk { .. } => {
                assert!(frames[0].to_json().contains("/chat save <tag>"));
            }
            other => panic!("expected chunk, got {other:?}"),
        }
        assert_eq!(frames[1], ServerFrame::StreamEnd);
        assert_eq!(session.history_len(), 0);
        assert!(session.agent().model().history().await.is_empty());
    }

    #[tokio::test]
    async fn chat_save_without_tag_is_usage_error() {
        let mut h = Harness::new();
        let session = h.new_session().await;
        h.init(&session).await;

        let frames = h.send(r#"{"type":"message","content":"/chat save"}"#).await;
        assert_eq!(
            frames,
            vec![
                ServerFrame::content("Error: please specify a tag. Usage: /chat save <tag>"),
                ServerFrame::StreamEnd,
            ]
        );
    }

    #[tokio::test]
    async fn upstream_failure_is_error_then_end() {
        let mut h = Harness::new();
        let session = h.new_session().await;
        h.init(&session).await;

        let frames = h.send(r#"{"type":"message","content":"boom"}"#).await;
        assert_eq!(
            frames,
            vec![
                ServerFrame::error("Failed to send message: API error (500): upstream exploded"),
                ServerFrame::StreamEnd,
            ]
        );
        assert_eq!(session.history_len(), 1);
    }

    #[tokio::test]
    async fn reinit_rebinds_and_failed_reinit_keeps_binding() {
        let mut h = Harness::new();
        let first = h.new_session().await;
        let second = h.new_session().await;
        h.init(&first).await;

        let frames = h.send(r#"{"type":"init","sessionId":"missing"}"#).await;
        assert_eq!(frames, vec![ServerFrame::error("Session not found")]);
        assert_eq!(h.state.session_id(), Some(first.id().as_str()));

        h.init(&second).await;
        assert_eq!(h.state.session_id(), Some(second.id().as_str()));

        h.send(r#"{"type":"message","content":"hi"}"#).await;
        assert_eq!(first.history_len(), 0);
        assert_eq!(second.history_len(), 2);
    }

    #[tokio::test]
    async fn empty_message_only_ends_the_stream() {
        let mut h = Harness::new();
        let session = h.new_session().await;
        h.init(&session).await;

        let frames = h.send(r#"{"type":"message","content":"   "}"#).await;
        assert_eq!(frames, vec![ServerFrame::StreamEnd]);
        assert_eq!(session.history_len(), 0);
    }
}
