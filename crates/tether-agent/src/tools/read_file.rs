//! Tool: read_file. Read the contents of a file inside the working directory.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{display_path, required_str, resolve_in, Tool, ToolError, ToolOutput};

/// Maximum characters returned by read_file to avoid flooding the context window.
const MAX_OUTPUT_CHARS: usize = 30_000;

pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file. Optionally limit to a line range with \
         `offset` (1-based first line) and `limit` (number of lines to return)."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path, relative to the working directory."
                },
                "offset": {
                    "type": "integer",
                    "description": "1-based line number to start reading from (optional)."
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of lines to return (optional)."
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        _cancel: CancellationToken,
    ) -> Result<ToolOutput, ToolError> {
        let raw = required_str(&input, "path")?;
        let path = resolve_in(&self.root, raw).await?;

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::Io {
                path: raw.to_string(),
                source: e,
            })?;

        let offset = input
            .get("offset")
            .and_then(|v| v.as_u64())
            .map(|v| v.saturating_sub(1) as usize); // convert to 0-based
        let limit = input.get("limit").and_then(|v| v.as_u64()).map(|v| v as usize);

        let selected = if offset.is_some() || limit.is_some() {
            content
                .lines()
                .skip(offset.unwrap_or(0))
                .take(limit.unwrap_or(usize::MAX))
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            content
        };
        let line_count = selected.lines().count();

        let result = match truncate_at_char_boundary(&selected, MAX_OUTPUT_CHARS) {
            Some(head) => format!(
                "{}\n\n[output truncated at {} characters]",
                head, MAX_OUTPUT_CHARS
            ),
            None => selected,
        };

        Ok(ToolOutput::new(
            result,
            format!("Read {} lines from {}", line_count, display_path(&self.root, &path)),
        ))
    }
}

/// The longest prefix of at most `max` bytes ending on a char boundary, or
/// `None` when `s` already fits.
fn truncate_at_char_boundary(s: &str, max: usize) -> Option<&str> {
    if s.len() <= max {
        return None;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    Some(&s[..end])
}
