use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tether_agent::{GeminiAgentFactory, SessionAgent};
use tether_core::config::TetherConfig;
use tether_sessions::{AgentFactory, SessionStore, StaticCredential};
use tracing::{info, warn};

mod app;
mod http;
#[cfg(test)]
mod testing;
mod ws;

/// HTTP + WebSocket gateway for the Tether coding agent.
#[derive(Debug, Parser)]
#[command(name = "tether-gateway", version, about)]
struct Args {
    /// Path to the TOML config file (default: $TETHER_CONFIG or ~/.tether/tether.toml).
    #[arg(long)]
    config: Option<String>,

    /// Port to listen on, overrides `gateway.port`.
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind, overrides `gateway.bind`.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional; real environment variables win.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "tether_gateway=info,tether_agent=info,tether_sessions=info,tower_http=debug".into()
            }),
        )
        .init();

    let args = Args::parse();

    // load config: --config > TETHER_CONFIG env > ~/.tether/tether.toml
    let config_path = args.config.or_else(|| std::env::var("TETHER_CONFIG").ok());
    let mut config = TetherConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!(code = e.code(), "Config load failed ({}), using defaults", e);
        TetherConfig::default()
    });
    if let Some(port) = args.port {
        config.gateway.port = port;
    }
    if let Some(bind) = args.bind {
        config.gateway.bind = bind;
    }

    let working_dir = match config.agent.working_dir.as_deref() {
        Some(dir) => PathBuf::from(dir),
        None => std::env::current_dir()?,
    };

    if config.gemini_api_key().is_none() {
        warn!("GEMINI_API_KEY is not set, session creation will fail until it is configured");
    }

    let factory: Arc<dyn AgentFactory<Agent = SessionAgent>> =
        Arc::new(GeminiAgentFactory::from_config(&config));
    let idle_ttl = config.sessions.idle_ttl_secs.map(Duration::from_secs);
    let mut store = SessionStore::new(factory, &working_dir).with_idle_ttl(idle_ttl);
    if let Some(token) = config.github_token() {
        info!(len = token.len(), "GitHub credential configured");
        store = store.with_credentials(Arc::new(StaticCredential::new("github", token)));
    }
    let sessions = Arc::new(store);

    info!(
        model = %config.agent.model,
        working_dir = %working_dir.display(),
        idle_ttl_secs = ?config.sessions.idle_ttl_secs,
        "agent configured"
    );

    // session sweeper runs until shutdown
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let sweep_interval = Duration::from_secs(config.sessions.sweep_interval_secs.max(1));
    tokio::spawn(Arc::clone(&sessions).run_sweeper(sweep_interval, shutdown_rx));

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let state = Arc::new(app::AppState::new(config, sessions));
    let router = app::build_router(state);

    info!("Tether gateway listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // signal sweeper to stop
    let _ = shutdown_tx.send(true);
    info!("Tether gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
