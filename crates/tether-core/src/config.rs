use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_MODEL: &str = "gemini-2.5-pro";
pub const DEFAULT_STATIC_DIR: &str = "public";
pub const MAX_PAYLOAD_BYTES: usize = 128 * 1024; // 128 KB hard cap per frame
pub const MAX_TURNS: usize = 10; // model round-trips per user message
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 300;

/// Top-level config (tether.toml + TETHER_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TetherConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub credentials: CredentialsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Directory served as static files for any unmatched GET.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
    #[serde(default = "default_max_payload")]
    pub max_payload_bytes: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
            static_dir: DEFAULT_STATIC_DIR.to_string(),
            max_payload_bytes: MAX_PAYLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_model")]
    pub model: String,
    /// Upper bound on model round-trips for one user message.
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// Root directory the built-in tools operate in. Defaults to the process cwd.
    pub working_dir: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_turns: MAX_TURNS,
            working_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub gemini: Option<GeminiConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Falls back to the GEMINI_API_KEY env var when absent.
    pub api_key: Option<String>,
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_gemini_base_url(),
        }
    }
}

/// Session lifecycle policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionsConfig {
    /// Evict sessions idle for longer than this. `None` keeps them for the
    /// whole process lifetime.
    pub idle_ttl_secs: Option<u64>,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_ttl_secs: None,
            sweep_interval_secs: DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

/// Optional side-channel credential attached to every new session.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CredentialsConfig {
    /// Falls back to the GITHUB_TOKEN env var when absent.
    pub github_token: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_static_dir() -> String {
    DEFAULT_STATIC_DIR.to_string()
}
fn default_max_payload() -> usize {
    MAX_PAYLOAD_BYTES
}
fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}
fn default_max_turns() -> usize {
    MAX_TURNS
}
fn default_sweep_interval() -> u64 {
    DEFAULT_SWEEP_INTERVAL_SECS
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

impl TetherConfig {
    /// Load config from a TOML file with TETHER_* env var overrides.
    ///
    /// Nested keys use a double underscore: `TETHER_GATEWAY__PORT=8080`.
    /// A missing file is not an error; defaults fill every gap.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        Figment::from(Serialized::defaults(TetherConfig::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("TETHER_").split("__"))
            .extract()
            .map_err(|e| crate::error::TetherError::Config(e.to_string()))
    }

    /// Gemini API key from config, else from `GEMINI_API_KEY`.
    pub fn gemini_api_key(&self) -> Option<String> {
        self.providers
            .gemini
            .as_ref()
            .and_then(|g| g.api_key.clone())
            .or_else(|| std::env::var("GEMINI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
    }

    pub fn gemini_base_url(&self) -> String {
        self.providers
            .gemini
            .as_ref()
            .map(|g| g.base_url.clone())
            .unwrap_or_else(default_gemini_base_url)
    }

    /// GitHub token from config, else from `GITHUB_TOKEN`.
    pub fn github_token(&self) -> Option<String> {
        self.credentials
            .github_token
            .clone()
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|t| !t.trim().is_empty())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.tether/tether.toml", home)
}
