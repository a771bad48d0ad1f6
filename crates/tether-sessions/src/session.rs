use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tether_core::types::{SessionId, Turn};
use tokio::sync::OwnedMutexGuard;

/// What an `AgentFactory` gets to know about the session it builds for.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub id: SessionId,
    pub working_dir: PathBuf,
    pub credential: Option<String>,
}

/// One conversational context: its agent and the append-only turn history
/// shown to clients.
///
/// `A` is the agent handle (model client + tool registry) built for this
/// session; the store is agnostic of what it contains.
pub struct Session<A> {
    id: SessionId,
    credential: Option<String>,
    agent: A,
    history: RwLock<Vec<Turn>>,
    last_active: Mutex<Instant>,
    /// Held for the whole of one orchestration pass so concurrent connections
    /// bound to the same session cannot interleave history appends.
    pass: Arc<tokio::sync::Mutex<()>>,
}

impl<A> Session<A> {
    pub fn new(ctx: SessionContext, agent: A) -> Self {
        Self {
            id: ctx.id,
            credential: ctx.credential,
            agent,
            history: RwLock::new(Vec::new()),
            last_active: Mutex::new(Instant::now()),
            pass: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn credential(&self) -> Option<&str> {
        self.credential.as_deref()
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    /// Snapshot of the recorded turns, oldest first.
    pub fn history(&self) -> Vec<Turn> {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn history_len(&self) -> usize {
        self.history
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Append a fully-formed turn. History is never rewritten.
    pub fn append(&self, turn: Turn) {
        self.history
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(turn);
        self.touch();
    }

    /// Mark the session as used now (resets the idle clock).
    pub fn touch(&self) {
        *self
            .last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        let last = *self
            .last_active
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        now.saturating_duration_since(last)
    }

    /// Wait for any in-flight pass on this session to finish, then claim it.
    /// The pass ends when the returned guard is dropped.
    pub async fn begin_pass(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.pass).lock_owned().await
    }
}
