//! Tool: search_file_content. Recursively search file contents for a substring.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{display_path, required_str, resolve_in, Tool, ToolError, ToolOutput};

/// Maximum number of matching lines returned.
const MAX_MATCHES: usize = 100;

pub struct SearchFilesTool {
    root: PathBuf,
}

impl SearchFilesTool {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_file_content"
    }

    fn description(&self) -> &str {
        "Recursively search file contents for a substring pattern. Returns matching \
         lines in `file:line_number: content` format. Skips binary files and the .git \
         directory. Returns at most 100 matches."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Substring to search for (case-sensitive)."
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in, relative to the working directory. Defaults to '.'."
                },
                "file_pattern": {
                    "type": "string",
                    "description": "Optional filename suffix filter, e.g. '.rs' or '.toml'."
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        cancel: CancellationToken,
    ) -> Result<ToolOutput, ToolError> {
        let pattern = required_str(&input, "pattern")?.to_string();
        if pattern.is_empty() {
            return Err(ToolError::InvalidInput("pattern must not be empty".into()));
        }
        let raw = input.get("path").and_then(|v| v.as_str()).unwrap_or(".");
        let start = resolve_in(&self.root, raw).await?;
        let file_pattern = input
            .get("file_pattern")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());

        let root = self.root.clone();
        let walk_cancel = cancel.clone();
        let (matches, truncated) = tokio::task::spawn_blocking(move || {
            let mut search = Search {
                root: &root,
                pattern: &pattern,
                file_pattern: file_pattern.as_deref(),
                cancel: &walk_cancel,
                matches: Vec::new(),
                truncated: false,
            };
            search.dir(&start);
            (search.matches, search.truncated)
        })
        .await
        .map_err(|e| ToolError::Failed(format!("search task failed: {e}")))?;

        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled);
        }

        if matches.is_empty() {
            return Ok(ToolOutput::new("No matches found.", "No matches"));
        }

        let count = matches.len();
        let mut output = matches.join("\n");
        if truncated {
            output.push_str(&format!("\n\n[truncated at {} matches]", MAX_MATCHES));
        }
        Ok(ToolOutput::new(output, format!("Found {} matches", count)))
    }
}

struct Search<'a> {
    root: &'a Path,
    pattern: &'a str,
    file_pattern: Option<&'a str>,
    cancel: &'a CancellationToken,
    matches: Vec<String>,
    truncated: bool,
}

impl Search<'_> {
    fn stopped(&self) -> bool {
        self.truncated || self.cancel.is_cancelled()
    }

    /// Recursively walk `dir`, collecting substring matches.
    fn dir(&mut self, dir: &Path) {
        let Ok(read_dir) = std::fs::read_dir(dir) else {
            return;
        };

        let mut entries: Vec<PathBuf> = read_dir.filter_map(|e| e.ok()).map(|e| e.path()).collect();
        // Deterministic traversal order.
        entries.sort();

        for entry in entries {
            if self.stopped() {
                return;
            }
            if entry.file_name().is_some_and(|n| n == ".git") {
                continue;
            }
            let Ok(meta) = std::fs::symlink_metadata(&entry) else {
                continue;
            };
            // Symlinks are not followed.
            if meta.file_type().is_symlink() {
                continue;
            }
            if meta.is_dir() {
                self.dir(&entry);
            } else if meta.is_file() {
                if let Some(fp) = self.file_pattern {
                    if !entry.to_string_lossy().ends_with(fp) {
                        continue;
                    }
                }
                self.file(&entry);
            }
        }
    }

    /// Search a single file for the pattern.
    fn file(&mut self, path: &Path) {
        let Ok(content) = std::fs::read(path) else {
            return;
        };

        // Skip files that look binary (contain a null byte in the first 8 KB).
        if content[..content.len().min(8192)].contains(&0u8) {
            return;
        }
        let Ok(text) = std::str::from_utf8(&content) else {
            return;
        };

        let shown = display_path(self.root, path);
        for (idx, line) in text.lines().enumerate() {
            if line.contains(self.pattern) {
                self.matches.push(format!("{}:{}: {}", shown, idx + 1, line));
                if self.matches.len() >= MAX_MATCHES {
                    self.truncated = true;
                    return;
                }
            }
        }
    }
}
