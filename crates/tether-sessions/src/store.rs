use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use tether_core::types::SessionId;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use crate::credential::CredentialSource;
use crate::error::{Result, SessionError};
use crate::session::{Session, SessionContext};

/// Builds the per-session agent (model client, tools, ...).
///
/// Returning `SessionError::Configuration` aborts session creation.
#[async_trait]
pub trait AgentFactory: Send + Sync {
    type Agent: Send + Sync + 'static;

    async fn build(&self, ctx: &SessionContext) -> Result<Self::Agent>;
}

/// In-memory registry of live sessions.
///
/// Sessions live until the process exits unless an idle TTL is configured,
/// in which case `evict_idle` (driven by `run_sweeper`) drops sessions that
/// have not been touched for longer than the TTL.
pub struct SessionStore<A> {
    sessions: DashMap<SessionId, Arc<Session<A>>>,
    factory: Arc<dyn AgentFactory<Agent = A>>,
    credentials: Option<Arc<dyn CredentialSource>>,
    working_dir: PathBuf,
    idle_ttl: Option<Duration>,
}

impl<A: Send + Sync + 'static> SessionStore<A> {
    pub fn new(factory: Arc<dyn AgentFactory<Agent = A>>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            sessions: DashMap::new(),
            factory,
            credentials: None,
            working_dir: working_dir.into(),
            idle_ttl: None,
        }
    }

    /// Attach a side-channel credential source consulted on every `create`.
    pub fn with_credentials(mut self, source: Arc<dyn CredentialSource>) -> Self {
        self.credentials = Some(source);
        self
    }

    pub fn with_idle_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.idle_ttl = ttl;
        self
    }

    /// Allocate a new session with empty history and a freshly built agent.
    #[instrument(skip(self))]
    pub async fn create(&self) -> Result<Arc<Session<A>>> {
        let working_dir = self.prepare_working_dir().await?;

        let credential = match &self.credentials {
            Some(source) => {
                let token = source.fetch().await.map_err(|e| {
                    warn!(source = source.name(), error = %e, "credential fetch failed");
                    e
                })?;
                debug!(source = source.name(), len = token.len(), "credential attached");
                Some(token)
            }
            None => None,
        };

        loop {
            let ctx = SessionContext {
                id: SessionId::new(),
                working_dir: working_dir.clone(),
                credential: credential.clone(),
            };

            // Skip a colliding id before building its agent.
            if self.sessions.contains_key(&ctx.id) {
                continue;
            }

            let agent = self.factory.build(&ctx).await?;
            let id = ctx.id.clone();
            let session = Arc::new(Session::new(ctx, agent));

            match self.sessions.entry(id.clone()) {
                Entry::Occupied(_) => continue,
                Entry::Vacant(slot) => {
                    slot.insert(Arc::clone(&session));
                    info!(session_id = %id, total = self.sessions.len(), "session stored");
                    return Ok(session);
                }
            }
        }
    }

    /// Create the working directory if needed and return its canonical path.
    async fn prepare_working_dir(&self) -> Result<PathBuf> {
        let unavailable = |e: std::io::Error| {
            SessionError::Configuration(format!(
                "cannot prepare working directory '{}': {e}",
                self.working_dir.display()
            ))
        };
        tokio::fs::create_dir_all(&self.working_dir)
            .await
            .map_err(unavailable)?;
        tokio::fs::canonicalize(&self.working_dir)
            .await
            .map_err(unavailable)
    }

    /// Look up a live session and mark it active.
    pub fn get(&self, id: &str) -> Result<Arc<Session<A>>> {
        let session = self
            .sessions
            .get(&SessionId::from(id))
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SessionError::NotFound { id: id.to_string() })?;
        session.touch();
        Ok(session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn idle_ttl(&self) -> Option<Duration> {
        self.idle_ttl
    }

    /// Drop every session idle for longer than the TTL. Returns the number
    /// evicted; always 0 when no TTL is configured.
    ///
    /// Connections already bound keep their `Arc` and finish normally; only
    /// new `get`s fail.
    pub fn evict_idle(&self, now: Instant) -> usize {
        let Some(ttl) = self.idle_ttl else {
            return 0;
        };
        let before = self.sessions.len();
        self.sessions.retain(|id, session| {
            let keep = session.idle_for(now) <= ttl;
            if !keep {
                info!(session_id = %id, "evicting idle session");
            }
            keep
        });
        before.saturating_sub(self.sessions.len())
    }

    /// Periodically evict idle sessions until `shutdown` flips to true.
    pub async fn run_sweeper(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        if self.idle_ttl.is_none() {
            debug!("no session TTL configured, sweeper idle");
            return;
        }
        let mut tick = tokio::time::interval(interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let evicted = self.evict_idle(Instant::now());
                    if evicted > 0 {
                        info!(evicted, remaining = self.len(), "session sweep complete");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    }
}
