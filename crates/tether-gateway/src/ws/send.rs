use axum::extract::ws::{Message, WebSocket};
use futures_util::{stream::SplitSink, SinkExt};
use tether_protocol::ServerFrame;
use tokio::sync::mpsc;
use tracing::debug;

/// Outbound half of a connection. Frames are written by a single writer
/// task, in the order they were queued.
pub type Outbound = mpsc::Sender<ServerFrame>;

/// Queue one frame. `false` once the writer is gone (client disconnected).
pub async fn frame(tx: &Outbound, frame: ServerFrame) -> bool {
    tx.send(frame).await.is_ok()
}

/// Drain queued frames into the socket until the queue closes or a write fails.
pub async fn run_writer(
    conn_id: String,
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<ServerFrame>,
) {
    while let Some(frame) = rx.recv().await {
        if let Err(e) = sink.send(Message::Text(frame.to_json().into())).await {
            debug!(conn_id = %conn_id, error = %e, "WS write failed, stopping writer");
            break;
        }
    }
    let _ = sink.close().await;
}
