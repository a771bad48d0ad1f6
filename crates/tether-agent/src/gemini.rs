//! Gemini chat client: `streamGenerateContent` over SSE.
//!
//! Holds the model-side conversation for one session. Each `send_stream`
//! replays the history plus the new user turn; the response is folded back
//! into history once the stream completes cleanly.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::provider::{
    ChatModel, ChunkStream, Content, FunctionDeclaration, ModelChunk, ModelError, Part,
};
use crate::stream::{parse_sse_line, LineBuffer, SseParsed};

pub struct GeminiChat {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    system_instruction: Option<String>,
    history: Arc<Mutex<Vec<Content>>>,
}

impl GeminiChat {
    pub fn new(api_key: String, base_url: Option<String>, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string())
                .trim_end_matches('/')
                .to_string(),
            model,
            system_instruction: None,
            history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.base_url, self.model
        )
    }

    fn build_body(&self, contents: &[Content], tools: &[FunctionDeclaration]) -> serde_json::Value {
        let mut body = serde_json::json!({ "contents": contents });
        if !tools.is_empty() {
            body["tools"] = serde_json::json!([{ "functionDeclarations": tools }]);
        }
        if let Some(ref si) = self.system_instruction {
            body["systemInstruction"] = serde_json::json!({ "parts": [{ "text": si }] });
        }
        body
    }
}

#[async_trait]
impl ChatModel for GeminiChat {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn send_stream(
        &self,
        message: Vec<Part>,
        tools: &[FunctionDeclaration],
        prompt_id: &str,
    ) -> Result<ChunkStream, ModelError> {
        let user_turn = Content::user(message);
        let mut contents = self.history.lock().await.clone();
        contents.push(user_turn.clone());

        let body = self.build_body(&contents, tools);
        debug!(model = %self.model, prompt_id, turns = contents.len(), tools = tools.len(), "sending request to Gemini");

        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry_after_secs = retry_after_secs(resp.headers());
            warn!(?retry_after_secs, "Gemini rate limit hit");
            return Err(ModelError::RateLimited { retry_after_secs });
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Gemini API error");
            return Err(ModelError::Api {
                status,
                message: text,
            });
        }

        let history = Arc::clone(&self.history);
        let prompt_id = prompt_id.to_string();

        let stream = async_stream::stream! {
            let mut byte_stream = resp.bytes_stream();
            let mut lines = LineBuffer::new();
            let mut collected = ResponseCollector::default();

            while let Some(bytes) = byte_stream.next().await {
                let bytes = match bytes {
                    Ok(b) => b,
                    Err(e) => {
                        warn!(prompt_id = %prompt_id, error = %e, "Gemini stream interrupted");
                        yield Err(ModelError::Http(e));
                        return;
                    }
                };
                for line in lines.push(&bytes) {
                    match parse_chunk_line(&line) {
                        Some(Ok(chunk)) => {
                            collected.absorb(&chunk);
                            yield Ok(chunk);
                        }
                        Some(Err(e)) => {
                            yield Err(e);
                            return;
                        }
                        None => {}
                    }
                }
            }
            if let Some(line) = lines.finish() {
                match parse_chunk_line(&line) {
                    Some(Ok(chunk)) => {
                        collected.absorb(&chunk);
                        yield Ok(chunk);
                    }
                    Some(Err(e)) => {
                        yield Err(e);
                        return;
                    }
                    None => {}
                }
            }

            let mut guard = history.lock().await;
            guard.push(user_turn);
            guard.push(collected.into_content());
            debug!(prompt_id = %prompt_id, turns = guard.len(), "Gemini response recorded");
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

/// Decode one SSE line into a chunk. `None` for non-data lines.
fn parse_chunk_line(line: &str) -> Option<Result<ModelChunk, ModelError>> {
    match parse_sse_line(line)? {
        SseParsed::Data(data) => {
            if data == "[DONE]" {
                return None;
            }
            Some(serde_json::from_str::<ModelChunk>(&data).map_err(|e| {
                ModelError::Parse(format!("invalid stream chunk: {e}"))
            }))
        }
        SseParsed::Event(_) => None,
    }
}

/// Folds streamed chunks into the single `model` turn stored in history.
#[derive(Default)]
struct ResponseCollector {
    text: String,
    calls: Vec<Part>,
}

impl ResponseCollector {
    fn absorb(&mut self, chunk: &ModelChunk) {
        if let Some(text) = chunk.text() {
            self.text.push_str(&text);
        }
        self.calls
            .extend(chunk.function_calls().into_iter().map(Part::function_call));
    }

    fn into_content(self) -> Content {
        let mut parts = Vec::with_capacity(self.calls.len() + 1);
        if !self.text.is_empty() {
            parts.push(Part::text(self.text));
        }
        parts.extend(self.calls);
        Content::model(parts)
    }
}

/// `Retry-After` as delta-seconds. HTTP-date values are not interpreted.
fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}
