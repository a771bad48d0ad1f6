//! Tool: write_file. Write content to a file, creating parent directories as needed.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{display_path, required_str, resolve_in, Tool, ToolError, ToolOutput};

pub struct WriteFileTool {
    root: PathBuf,
}

impl WriteFileTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file inside the working directory. Creates parent \
         directories if they do not exist. Overwrites the file if it already exists."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path, relative to the working directory."
                },
                "content": {
                    "type": "string",
                    "description": "Text content to write into the file."
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        cancel: CancellationToken,
    ) -> Result<ToolOutput, ToolError> {
        let raw = required_str(&input, "path")?;
        let content = required_str(&input, "content")?;
        let path = resolve_in(&self.root, raw).await?;

        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled);
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::Io {
                    path: raw.to_string(),
                    source: e,
                })?;
        }

        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ToolError::Io {
                path: raw.to_string(),
                source: e,
            })?;

        let shown = display_path(&self.root, &path);
        Ok(ToolOutput::new(
            format!("File written: {} bytes to '{}'", content.len(), shown),
            format!("Wrote {} bytes to {}", content.len(), shown),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(dir.path().to_path_buf());
        let out = tool
            .execute(
                serde_json::json!({ "path": "nested/dir/out.txt", "content": "hello" }),
                CancellationToken::new(),
            )
            .await
            .unwrap();

        let written = std::fs::read_to_string(dir.path().join("nested/dir/out.txt")).unwrap();
        assert_eq!(written, "hello");
        assert_eq!(out.display, "Wrote 5 bytes to nested/dir/out.txt");
    }

    #[tokio::test]
    async fn refuses_paths_outside_root() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(dir.path().to_path_buf());
        let err = tool
            .execute(
                serde_json::json!({ "path": "../escape.txt", "content": "x" }),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::OutsideWorkspace(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn refuses_to_write_through_escaping_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("out")).unwrap();

        let tool = WriteFileTool::new(dir.path().to_path_buf());
        let err = tool
            .execute(
                serde_json::json!({ "path": "out/planted.txt", "content": "x" }),
                CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::OutsideWorkspace(_)));
        assert!(!outside.path().join("planted.txt").exists());
    }

    #[tokio::test]
    async fn missing_content_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(dir.path().to_path_buf());
        let err = tool
            .execute(serde_json::json!({ "path": "a.txt" }), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "missing required parameter: content");
    }
}
