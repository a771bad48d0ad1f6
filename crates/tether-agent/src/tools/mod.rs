//! Tool system for AI agent tool calling.
//!
//! Defines the `Tool` trait that all tools implement, plus a registry
//! for looking tools up by name and converting them to API declarations.

pub mod list_directory;
pub mod read_file;
pub mod search_files;
pub mod shell;
pub mod write_file;

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::provider::FunctionDeclaration;

/// Successful tool output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Text handed back to the model.
    pub content: String,
    /// Short human-readable summary shown to the client.
    pub display: String,
}

impl ToolOutput {
    pub fn new(content: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            display: display.into(),
        }
    }

    /// Same text for the model and the client.
    pub fn text(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            display: content.clone(),
            content,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("missing required parameter: {0}")]
    MissingParam(&'static str),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("path '{0}' is outside the working directory")]
    OutsideWorkspace(String),

    #[error("failed to access '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Failed(String),
}

/// Trait that all tools must implement.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name for this tool (e.g. "read_file").
    fn name(&self) -> &str;
    /// Human-readable description of what this tool does.
    fn description(&self) -> &str;
    /// JSON Schema for the tool's input parameters.
    fn input_schema(&self) -> serde_json::Value;
    /// Execute the tool. `cancel` fires when the caller gives up on the call.
    async fn execute(
        &self,
        input: serde_json::Value,
        cancel: CancellationToken,
    ) -> Result<ToolOutput, ToolError>;
}

/// Named collection of tools available to one agent.
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in file and shell tools, confined to `root`. A session
    /// credential, when present, is exported to shell commands as `GITHUB_TOKEN`.
    pub fn builtin(root: &Path, credential: Option<&str>) -> Self {
        let root = root.to_path_buf();
        let mut registry = Self::new();
        registry.register(Arc::new(list_directory::ListDirectoryTool::new(root.clone())));
        registry.register(Arc::new(read_file::ReadFileTool::new(root.clone())));
        registry.register(Arc::new(write_file::WriteFileTool::new(root.clone())));
        registry.register(Arc::new(search_files::SearchFilesTool::new(root.clone())));
        let mut shell = shell::ShellTool::new(root);
        if let Some(token) = credential {
            shell = shell.with_env("GITHUB_TOKEN", token);
        }
        registry.register(Arc::new(shell));
        registry
    }

    /// Add a tool. A tool with the same name replaces the earlier one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.retain(|t| t.name() != tool.name());
        self.tools.push(tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Declarations sent to the model with every request.
    pub fn declarations(&self) -> Vec<FunctionDeclaration> {
        self.tools
            .iter()
            .map(|t| FunctionDeclaration {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.input_schema(),
            })
            .collect()
    }
}

/// Fetch a required string parameter.
pub(crate) fn required_str<'a>(
    input: &'a serde_json::Value,
    key: &'static str,
) -> Result<&'a str, ToolError> {
    input
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or(ToolError::MissingParam(key))
}

/// Resolve a user-supplied path against `root`, refusing anything that
/// would land outside it, including through a symlink. The target need not
/// exist; its nearest existing ancestor must resolve inside `root`.
pub(crate) async fn resolve_in(root: &Path, raw: &str) -> Result<PathBuf, ToolError> {
    let path = normalize_in(root, raw)?;
    let real_root = tokio::fs::canonicalize(root)
        .await
        .unwrap_or_else(|_| root.to_path_buf());

    let mut inside = true;
    for ancestor in path.ancestors().take_while(|a| a.starts_with(root)) {
        match tokio::fs::canonicalize(ancestor).await {
            Ok(real) => {
                inside = real.starts_with(&real_root);
                break;
            }
            // dangling symlink
            Err(_) if is_symlink(ancestor).await => {
                inside = false;
                break;
            }
            Err(_) => {}
        }
    }

    if inside {
        Ok(path)
    } else {
        Err(ToolError::OutsideWorkspace(raw.to_string()))
    }
}

async fn is_symlink(path: &Path) -> bool {
    tokio::fs::symlink_metadata(path)
        .await
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

/// Lexical half of `resolve_in`: joins and folds `.`/`..` without touching
/// the filesystem.
fn normalize_in(root: &Path, raw: &str) -> Result<PathBuf, ToolError> {
    let candidate = Path::new(raw);
    let joined = if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        root.join(candidate)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(ToolError::OutsideWorkspace(raw.to_string()));
                }
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }

    if normalized.starts_with(root) {
        Ok(normalized)
    } else {
        Err(ToolError::OutsideWorkspace(raw.to_string()))
    }
}

/// Path relative to `root` for display; falls back to the full path.
pub(crate) fn display_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .ok()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(path)
        .display()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl Tool for Named {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "test tool"
        }
        fn input_schema(&self) -> serde_json::Value {
            serde_json::json!({ "type": "object" })
        }
        async fn execute(
            &self,
            _input: serde_json::Value,
            _cancel: CancellationToken,
        ) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::text(self.0))
        }
    }

    #[test]
    fn registry_lookup_and_declarations() {
        let mut reg = ToolRegistry::new();
        reg.register(Arc::new(Named("a")));
        reg.register(Arc::new(Named("b")));
        reg.register(Arc::new(Named("a")));

        assert_eq!(reg.len(), 2);
        assert!(reg.get("a").is_some());
        assert!(reg.get("missing").is_none());

        let names: Vec<String> = reg.declarations().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn builtin_registry_has_all_tools() {
        let dir = tempfile::tempdir().unwrap();
        let reg = ToolRegistry::builtin(dir.path(), None);
        for name in [
            "list_directory",
            "read_file",
            "write_file",
            "search_file_content",
            "run_shell_command",
        ] {
            assert!(reg.get(name).is_some(), "missing {name}");
        }
    }

    #[test]
    fn normalize_keeps_paths_inside_root() {
        let root = Path::new("/work/project");
        assert_eq!(
            normalize_in(root, "src/main.rs").unwrap(),
            PathBuf::from("/work/project/src/main.rs")
        );
        assert_eq!(
            normalize_in(root, "./a/../b").unwrap(),
            PathBuf::from("/work/project/b")
        );
        assert_eq!(
            normalize_in(root, "/work/project/x").unwrap(),
            PathBuf::from("/work/project/x")
        );
    }

    #[test]
    fn normalize_rejects_escapes() {
        let root = Path::new("/work/project");
        assert!(matches!(
            normalize_in(root, "../secret"),
            Err(ToolError::OutsideWorkspace(_))
        ));
        assert!(matches!(
            normalize_in(root, "/etc/passwd"),
            Err(ToolError::OutsideWorkspace(_))
        ));
    }

    #[tokio::test]
    async fn resolve_allows_missing_targets_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        let path = resolve_in(dir.path(), "src/new/file.rs").await.unwrap();
        assert_eq!(path, dir.path().join("src/new/file.rs"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn resolve_rejects_symlinks_leaving_root() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "s").unwrap();
        symlink(outside.path(), dir.path().join("escape")).unwrap();
        symlink(outside.path().join("gone"), dir.path().join("dangling")).unwrap();

        for raw in ["escape", "escape/secret.txt", "escape/new.txt", "dangling"] {
            assert!(
                matches!(resolve_in(dir.path(), raw).await, Err(ToolError::OutsideWorkspace(_))),
                "{raw}"
            );
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn resolve_allows_symlinks_within_root() {
        use std::os::unix::fs::symlink;

        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("real")).unwrap();
        std::fs::write(dir.path().join("real/a.txt"), "a").unwrap();
        symlink(dir.path().join("real"), dir.path().join("alias")).unwrap();

        let path = resolve_in(dir.path(), "alias/a.txt").await.unwrap();
        assert_eq!(path, dir.path().join("alias/a.txt"));
    }

    #[test]
    fn display_path_is_relative() {
        let root = Path::new("/work");
        assert_eq!(display_path(root, Path::new("/work/a/b.txt")), "a/b.txt");
        assert_eq!(display_path(root, Path::new("/work")), "/work");
    }
}
