//! Tool: list_directory. List directory contents with type and size info.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{display_path, resolve_in, Tool, ToolError, ToolOutput};

/// Maximum entries returned to avoid overwhelming the context window.
const MAX_ENTRIES: usize = 1_000;

pub struct ListDirectoryTool {
    root: PathBuf,
}

impl ListDirectoryTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the contents of a directory inside the working directory. Each entry \
         shows its type (file/dir) and size in bytes. Returns at most 1000 entries."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path, relative to the working directory. Defaults to '.'."
                }
            }
        })
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        _cancel: CancellationToken,
    ) -> Result<ToolOutput, ToolError> {
        let raw = input.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let path = resolve_in(&self.root, raw).await?;

        let mut read_dir = tokio::fs::read_dir(&path).await.map_err(|e| ToolError::Io {
            path: raw.to_string(),
            source: e,
        })?;

        let mut entries: Vec<String> = Vec::new();
        let mut truncated = false;

        while let Ok(Some(entry)) = read_dir.next_entry().await {
            if entries.len() >= MAX_ENTRIES {
                truncated = true;
                break;
            }
            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            let name = entry.file_name().to_string_lossy().to_string();
            let kind = if metadata.is_dir() { "dir" } else { "file" };
            entries.push(format!("[{}] {} ({} bytes)", kind, name, metadata.len()));
        }

        // Sort for deterministic output.
        entries.sort();

        let count = entries.len();
        let mut output = entries.join("\n");
        if truncated {
            output.push_str(&format!("\n\n[truncated at {} entries]", MAX_ENTRIES));
        }
        if output.is_empty() {
            output = "(empty directory)".to_string();
        }

        Ok(ToolOutput::new(
            output,
            format!("Listed {} entries in {}", count, display_path(&self.root, &path)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_sorted_entries() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "12345").unwrap();
        std::fs::create_dir(dir.path().join("a")).unwrap();

        let tool = ListDirectoryTool::new(dir.path().to_path_buf());
        let out = tool
            .execute(serde_json::json!({}), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(out.content.lines().count(), 2);
        assert!(out.content.starts_with("[dir] a"));
        assert!(out.content.contains("[file] b.txt (5 bytes)"));
        assert!(out.display.starts_with("Listed 2 entries"));
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ListDirectoryTool::new(dir.path().to_path_buf());
        let err = tool
            .execute(serde_json::json!({ "path": "nope" }), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Io { .. }));
    }
}
