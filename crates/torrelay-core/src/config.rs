//! Bridge configuration.
//!
//! All deployment parameters live in one TOML file; secrets may instead
//! be supplied via environment variables. The resulting struct is passed
//! to the clients at construction, nothing reads globals after startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file not found.
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    /// Failed to read configuration file.
    #[error("Failed to read configuration file: {0}")]
    Read(String),

    /// Failed to parse configuration file.
    #[error("Failed to parse configuration file: {0}")]
    Parse(String),

    /// A required value is absent from both the file and the environment.
    #[error("Missing configuration value: {0}")]
    Missing(String),
}

/// Top-level bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Download daemon endpoint and credentials.
    #[serde(default)]
    pub daemon: DaemonSettings,

    /// Chat platform settings.
    #[serde(default)]
    pub telegram: TelegramSettings,

    /// Submission-flow pacing and spool location.
    #[serde(default)]
    pub flow: FlowSettings,
}

/// Download daemon settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonSettings {
    /// RPC endpoint URL.
    #[serde(default = "default_daemon_url")]
    pub url: String,

    /// Basic-auth username.
    #[serde(default)]
    pub username: String,

    /// Basic-auth password.
    #[serde(default)]
    pub password: String,

    /// Per-request timeout for RPC calls, in seconds.
    #[serde(default = "default_rpc_timeout_secs")]
    pub rpc_timeout_secs: u64,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            url: default_daemon_url(),
            username: String::new(),
            password: String::new(),
            rpc_timeout_secs: default_rpc_timeout_secs(),
        }
    }
}

impl DaemonSettings {
    /// RPC timeout as a `Duration`.
    #[must_use]
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }
}

/// Chat platform settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramSettings {
    /// Bot token; may come from `TORRELAY_BOT_TOKEN` instead.
    #[serde(default)]
    pub bot_token: String,

    /// Long-poll timeout handed to the platform, in seconds.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self { bot_token: String::new(), poll_timeout_secs: default_poll_timeout_secs() }
    }
}

impl TelegramSettings {
    /// Long-poll timeout as a `Duration`.
    #[must_use]
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

/// Submission-flow settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSettings {
    /// Directory the received metafiles are spooled under.
    #[serde(default = "default_spool_dir")]
    pub spool_dir: PathBuf,

    /// Interval between status polls, in seconds.
    #[serde(default = "default_status_poll_interval_secs")]
    pub status_poll_interval_secs: u64,

    /// Upper bound on the whole status poll, in seconds.
    #[serde(default = "default_status_poll_timeout_secs")]
    pub status_poll_timeout_secs: u64,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            spool_dir: default_spool_dir(),
            status_poll_interval_secs: default_status_poll_interval_secs(),
            status_poll_timeout_secs: default_status_poll_timeout_secs(),
        }
    }
}

impl FlowSettings {
    /// Poll interval as a `Duration`.
    #[must_use]
    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_secs(self.status_poll_interval_secs)
    }

    /// Poll bound as a `Duration`.
    #[must_use]
    pub fn status_poll_timeout(&self) -> Duration {
        Duration::from_secs(self.status_poll_timeout_secs)
    }
}

fn default_daemon_url() -> String {
    "http://localhost:9091/transmission/rpc/".to_string()
}

fn default_rpc_timeout_secs() -> u64 {
    30
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_spool_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_status_poll_interval_secs() -> u64 {
    2
}

fn default_status_poll_timeout_secs() -> u64 {
    10
}

impl BridgeConfig {
    /// Default local configuration file path.
    #[must_use]
    pub fn default_local_path() -> PathBuf {
        PathBuf::from("torrelay.toml")
    }

    /// Loads configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)))
    }

    /// Loads the given file, or the default local file, or the defaults.
    ///
    /// An explicitly named file must exist; the default local file is
    /// optional.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => {
                let local = Self::default_local_path();
                if local.exists() { Self::load_from_file(&local) } else { Ok(Self::default()) }
            }
        }
    }

    /// Applies environment-variable overrides for secrets.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) = std::env::var("TORRELAY_BOT_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Ok(username) = std::env::var("TORRELAY_DAEMON_USER") {
            self.daemon.username = username;
        }
        if let Ok(password) = std::env::var("TORRELAY_DAEMON_PASSWORD") {
            self.daemon.password = password;
        }
    }

    /// Checks that everything the bridge cannot run without is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.bot_token.is_empty() {
            return Err(ConfigError::Missing(
                "telegram.bot_token (or TORRELAY_BOT_TOKEN)".to_string(),
            ));
        }
        Ok(())
    }
}
