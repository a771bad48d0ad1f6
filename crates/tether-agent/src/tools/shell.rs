//! `run_shell_command` tool: one-shot `sh -c` in the session working directory.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{required_str, Tool, ToolError, ToolOutput};

const TIMEOUT_SECS: u64 = 60;

/// Maximum characters of combined output handed back to the model.
const MAX_OUTPUT_CHARS: usize = 30_000;

pub struct ShellTool {
    root: PathBuf,
    timeout: Duration,
    env: Vec<(String, String)>,
}

impl ShellTool {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            timeout: Duration::from_secs(TIMEOUT_SECS),
            env: Vec::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "run_shell_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the working directory and return its stdout and \
         stderr. The command is run via `sh -c` and is killed after 60 seconds."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute via sh -c."
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        cancel: CancellationToken,
    ) -> Result<ToolOutput, ToolError> {
        let command = required_str(&input, "command")?;
        if command.trim().is_empty() {
            return Err(ToolError::InvalidInput("command must not be empty".into()));
        }
        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled);
        }

        debug!(command, cwd = %self.root.display(), "running shell command");

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.root)
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::Failed(format!("failed to spawn shell: {e}")))?;

        // Dropping the `wait_with_output` future drops the child, which kills it.
        let result = tokio::select! {
            out = child.wait_with_output() => out,
            _ = cancel.cancelled() => {
                warn!(command, "shell command cancelled");
                return Err(ToolError::Cancelled);
            }
            _ = tokio::time::sleep(self.timeout) => {
                warn!(command, secs = self.timeout.as_secs(), "shell command timed out");
                return Err(ToolError::Timeout { secs: self.timeout.as_secs() });
            }
        };
        let output = result.map_err(|e| ToolError::Failed(format!("shell wait failed: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let exit_code = output.status.code().unwrap_or(-1);

        let mut text = String::new();
        if !stdout.is_empty() {
            text.push_str(&stdout);
        }
        if !stderr.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str("[stderr]\n");
            text.push_str(&stderr);
        }
        if exit_code != 0 {
            text.push_str(&format!("\n[exit code: {}]", exit_code));
        }
        if text.is_empty() {
            text = "(no output)".to_string();
        }
        if text.chars().count() > MAX_OUTPUT_CHARS {
            text = text.chars().take(MAX_OUTPUT_CHARS).collect();
            text.push_str("\n\n[output truncated]");
        }

        Ok(ToolOutput::new(
            text,
            format!("Ran `{}` (exit code {})", command, exit_code),
        ))
    }
}
