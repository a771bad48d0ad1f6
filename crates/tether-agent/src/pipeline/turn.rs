//! Multi-turn tool-calling loop.
//!
//! One user message becomes one *pass*: the model is called, any function
//! calls it requests are executed and their results fed back, until the
//! model answers without calls or the turn cap is reached. Every step is
//! surfaced as a `TurnEvent` as soon as it happens.

use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use tether_core::types::Turn;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::provider::{ChunkStream, FunctionCall, ModelChunk, ModelError, Part};
use crate::runtime::AgentSession;

/// One observable step of a pass, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// A piece of model text, forwarded unbuffered.
    Content(String),
    /// A tool call succeeded; `result` is its display string.
    ToolResult { tool_name: String, result: String },
    /// A tool call failed; the loop carries on.
    ToolError { tool_name: String, error: String },
    /// The model call failed; the pass is aborted.
    Error(String),
    /// Always the last event of a pass.
    StreamEnd,
}

/// Transient state of one user message while the loop runs.
struct PendingExchange {
    outbound: Vec<Part>,
    turn: usize,
    calls: Vec<FunctionCall>,
    responses: Vec<Part>,
}

impl PendingExchange {
    fn new(text: &str) -> Self {
        Self {
            outbound: vec![Part::text(text)],
            turn: 0,
            calls: Vec::new(),
            responses: Vec::new(),
        }
    }

    /// Advance the turn counter. `false` once it would exceed `max_turns`.
    fn next_turn(&mut self, max_turns: usize) -> bool {
        if self.turn >= max_turns {
            return false;
        }
        self.turn += 1;
        true
    }

    fn take_outbound(&mut self) -> Vec<Part> {
        std::mem::take(&mut self.outbound)
    }

    fn absorb(&mut self, chunk: &ModelChunk) {
        self.calls.extend(chunk.function_calls());
    }

    fn take_calls(&mut self) -> Vec<FunctionCall> {
        std::mem::take(&mut self.calls)
    }

    fn respond(&mut self, part: Part) {
        self.responses.push(part);
    }

    /// The tool responses of this batch become the next outbound message.
    fn finish_batch(&mut self) {
        self.outbound = std::mem::take(&mut self.responses);
    }
}

enum Polled<T> {
    Ready(T),
    Cancelled,
}

/// Drive one user message through the model and tools.
///
/// The returned stream is lazy: nothing happens until it is polled, and the
/// session pass lock is held from the first poll until `StreamEnd`. Input is
/// trimmed; empty input yields only `StreamEnd` and records nothing.
///
/// When `cancel` fires no further model or tool call starts, in-flight tool
/// calls see a cancelled child token and the pass ends with `StreamEnd`. A
/// pass that is already cancelled once it holds the lock records nothing.
pub fn run_turn(
    session: Arc<AgentSession>,
    text: String,
    max_turns: usize,
    cancel: CancellationToken,
) -> impl Stream<Item = TurnEvent> + Send + 'static {
    async_stream::stream! {
        let text = text.trim().to_string();
        if text.is_empty() {
            yield TurnEvent::StreamEnd;
            return;
        }

        let _pass = session.begin_pass().await;
        if cancel.is_cancelled() {
            debug!(session_id = %session.id(), "pass cancelled before start");
            yield TurnEvent::StreamEnd;
            return;
        }
        session.append(Turn::user(text.clone()));

        let agent = session.agent();
        let declarations = agent.tools().declarations();
        let mut exchange = PendingExchange::new(&text);
        let mut aborted = false;

        loop {
            if !exchange.next_turn(max_turns) {
                info!(session_id = %session.id(), max_turns, "turn limit reached, ending pass");
                break;
            }
            if cancel.is_cancelled() {
                aborted = true;
                break;
            }

            let prompt_id = new_prompt_id();
            debug!(session_id = %session.id(), turn = exchange.turn, prompt_id = %prompt_id, "calling model");

            let opened = tokio::select! {
                biased;
                _ = cancel.cancelled() => Polled::Cancelled,
                res = agent.model().send_stream(exchange.take_outbound(), &declarations, &prompt_id) => Polled::Ready(res),
            };
            let mut chunks: ChunkStream = match opened {
                Polled::Cancelled => {
                    aborted = true;
                    break;
                }
                Polled::Ready(Ok(stream)) => stream,
                Polled::Ready(Err(e)) => {
                    warn!(session_id = %session.id(), prompt_id = %prompt_id, error = %e, "model call failed");
                    yield failure(&e);
                    aborted = true;
                    break;
                }
            };

            let mut stream_error = None;
            loop {
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Polled::Cancelled,
                    item = chunks.next() => Polled::Ready(item),
                };
                match next {
                    Polled::Cancelled => {
                        aborted = true;
                        break;
                    }
                    Polled::Ready(None) => break,
                    Polled::Ready(Some(Ok(chunk))) => {
                        exchange.absorb(&chunk);
                        if let Some(text) = chunk.text() {
                            yield TurnEvent::Content(text);
                        }
                    }
                    Polled::Ready(Some(Err(e))) => {
                        stream_error = Some(e);
                        break;
                    }
                }
            }
            // Dropping the stream before it ends leaves model history untouched.
            drop(chunks);

            if let Some(e) = stream_error {
                warn!(session_id = %session.id(), prompt_id = %prompt_id, error = %e, "model stream failed");
                yield failure(&e);
                aborted = true;
                break;
            }
            if aborted {
                break;
            }

            let calls = exchange.take_calls();
            if calls.is_empty() {
                break;
            }

            for mut call in calls {
                if cancel.is_cancelled() {
                    aborted = true;
                    break;
                }
                if call.args.is_null() {
                    call.args = serde_json::json!({});
                }

                let Some(tool) = agent.tools().get(&call.name) else {
                    warn!(session_id = %session.id(), tool = %call.name, "model requested unknown tool");
                    let msg = format!("Tool \"{}\" not found in registry.", call.name);
                    exchange.respond(Part::function_error(&call, msg));
                    continue;
                };

                info!(session_id = %session.id(), tool = %call.name, turn = exchange.turn, "executing tool");
                match tool.execute(call.args.clone(), cancel.child_token()).await {
                    Ok(output) => {
                        exchange.respond(Part::function_response(&call, output.content));
                        yield TurnEvent::ToolResult {
                            tool_name: call.name.clone(),
                            result: output.display,
                        };
                    }
                    Err(e) => {
                        warn!(session_id = %session.id(), tool = %call.name, error = %e, "tool failed");
                        let error = e.to_string();
                        exchange.respond(Part::function_error(&call, error.clone()));
                        yield TurnEvent::ToolError {
                            tool_name: call.name.clone(),
                            error,
                        };
                    }
                }
            }
            if aborted {
                break;
            }
            exchange.finish_batch();
        }

        if aborted {
            if cancel.is_cancelled() {
                info!(session_id = %session.id(), "pass cancelled");
            }
        } else if let Some(last) = agent.model().history().await.last() {
            if last.is_model() {
                session.append(Turn::assistant(last.text()));
            }
        }

        yield TurnEvent::StreamEnd;
    }
}

fn failure(e: &ModelError) -> TurnEvent {
    TurnEvent::Error(format!("Failed to send message: {e}"))
}

fn new_prompt_id() -> String {
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "prompt_{}_{}",
        chrono::Utc::now().timestamp_millis(),
        &nonce[..8]
    )
}
