//! Turns orchestrator events and command outcomes into outbound frames,
//! one frame per event, in emission order.

use futures_util::{Stream, StreamExt};
use tether_agent::{CommandOutcome, TurnEvent};
use tether_protocol::ServerFrame;

use crate::ws::send::{self, Outbound};

pub fn frame_for(event: TurnEvent) -> ServerFrame {
    match event {
        TurnEvent::Content(text) => ServerFrame::content(text),
        TurnEvent::ToolResult { tool_name, result } => ServerFrame::tool_result(tool_name, result),
        TurnEvent::ToolError { tool_name, error } => ServerFrame::tool_error(tool_name, error),
        TurnEvent::Error(message) => ServerFrame::error(message),
        TurnEvent::StreamEnd => ServerFrame::StreamEnd,
    }
}

/// Forward every event of a pass. Stops early (dropping the pass) when the
/// client is gone; returns whether the whole pass was delivered.
pub async fn forward<S>(events: S, tx: &Outbound) -> bool
where
    S: Stream<Item = TurnEvent>,
{
    let mut events = std::pin::pin!(events);
    while let Some(event) = events.next().await {
        if !send::frame(tx, frame_for(event)).await {
            return false;
        }
    }
    true
}

/// An intercepted command answers like a one-chunk pass.
pub async fn command_outcome(outcome: CommandOutcome, tx: &Outbound) -> bool {
    send::frame(tx, ServerFrame::content(outcome.content)).await
        && send::frame(tx, ServerFrame::StreamEnd).await
}
