//! Side-channel credential attached to a session (e.g. a GitHub token the
//! agent's tools may use). Acquisition itself is opaque: a source either
//! yields a bearer string or fails.

use async_trait::async_trait;

use crate::error::{Result, SessionError};

#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Short label for logs ("github", ...).
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<String>;
}

/// A credential known up front (config file or env var).
pub struct StaticCredential {
    name: String,
    token: String,
}

impl StaticCredential {
    pub fn new(name: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl CredentialSource for StaticCredential {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<String> {
        if self.token.trim().is_empty() {
            return Err(SessionError::Configuration(format!(
                "{} credential is empty",
                self.name
            )));
        }
        Ok(self.token.clone())
    }
}
