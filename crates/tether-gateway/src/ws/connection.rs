use axum::{
    extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{Stream, StreamExt};
use std::sync::Arc;
use tether_core::TetherError;
use tether_protocol::ServerFrame;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::ws::message::{self, ConnState};
use crate::ws::send::{self, Outbound};

const OUTBOUND_BUFFER: usize = 256;
const INBOUND_BUFFER: usize = 32;

/// What the reader task hands to the connection loop.
#[derive(Debug, PartialEq, Eq)]
enum Inbound {
    Text(String),
    TooLarge(usize),
}

/// How the reader treats one socket message.
#[derive(Debug, PartialEq, Eq)]
enum Read {
    Forward(Inbound),
    Skip,
    Close,
}

/// Axum handler, upgrades HTTP to WebSocket at GET /ws.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| run_connection(socket, state))
}

/// Per-connection event loop. Lives for the entire WS session.
///
/// A reader task watches the socket and cancels in-flight work when the
/// client leaves. This loop handles frames strictly in arrival order, and a
/// writer task owns the sink.
async fn run_connection(socket: WebSocket, state: Arc<AppState>) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    info!(conn_id = %conn_id, "new WS connection");

    let (sink, stream) = socket.split();
    let (out_tx, out_rx) = mpsc::channel::<ServerFrame>(OUTBOUND_BUFFER);
    let writer = tokio::spawn(send::run_writer(conn_id.clone(), sink, out_rx));

    let cancel = CancellationToken::new();
    let (in_tx, mut in_rx) = mpsc::channel::<Inbound>(INBOUND_BUFFER);
    let reader = tokio::spawn(read_frames(
        conn_id.clone(),
        stream,
        in_tx,
        cancel.clone(),
        state.config.gateway.max_payload_bytes,
    ));

    let conn_state = serve_frames(&conn_id, &mut in_rx, &out_tx, &state, &cancel).await;

    cancel.cancel();
    drop(out_tx);
    let _ = reader.await;
    let _ = writer.await;
    info!(conn_id = %conn_id, session_id = ?conn_state.session_id(), "WS connection closed");
}

/// Handle queued frames until the reader goes away. Frames still queued
/// when the connection is cancelled are dropped unhandled.
async fn serve_frames(
    conn_id: &str,
    in_rx: &mut mpsc::Receiver<Inbound>,
    tx: &Outbound,
    app: &AppState,
    cancel: &CancellationToken,
) -> ConnState {
    let mut conn_state = ConnState::Unbound;
    while let Some(inbound) = in_rx.recv().await {
        if cancel.is_cancelled() {
            debug!(conn_id, "connection closed, dropping queued frames");
            break;
        }
        conn_state = match inbound {
            Inbound::Text(text) => message::handle(conn_id, &text, conn_state, tx, app, cancel).await,
            Inbound::TooLarge(size) => {
                let err = TetherError::PayloadTooLarge {
                    size,
                    max: app.config.gateway.max_payload_bytes,
                };
                send::frame(tx, ServerFrame::error(err.to_string())).await;
                conn_state
            }
        };
    }
    conn_state
}

fn classify(msg: Message, max_payload: usize) -> Read {
    match msg {
        Message::Text(text) if text.len() > max_payload => Read::Forward(Inbound::TooLarge(text.len())),
        Message::Text(text) => Read::Forward(Inbound::Text(text.to_string())),
        Message::Binary(bytes) if bytes.len() > max_payload => {
            Read::Forward(Inbound::TooLarge(bytes.len()))
        }
        Message::Binary(bytes) => {
            Read::Forward(Inbound::Text(String::from_utf8_lossy(&bytes).into_owned()))
        }
        Message::Close(_) => Read::Close,
        _ => Read::Skip,
    }
}

/// Forward text frames to the connection loop until the socket closes, then
/// cancel whatever the connection is still running.
async fn read_frames<S, E>(
    conn_id: String,
    mut stream: S,
    tx: mpsc::Sender<Inbound>,
    cancel: CancellationToken,
    max_payload: usize,
) where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: std::fmt::Display,
{
    while let Some(msg) = stream.next().await {
        let msg = match msg {
            Ok(msg) => msg,
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "WS read failed");
                break;
            }
        };
        let inbound = match classify(msg, max_payload) {
            Read::Forward(inbound) => inbound,
            Read::Skip => continue,
            Read::Close => break,
        };
        if let Inbound::TooLarge(size) = inbound {
            warn!(conn_id = %conn_id, size, "payload too large");
        }
        if tx.send(inbound).await.is_err() {
            break;
        }
    }
    cancel.cancel();
}
