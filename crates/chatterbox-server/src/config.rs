//! Server configuration: TOML file + CLI overrides.

use chatterbox_core::{ChatError, ChatResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment variable consulted for the credential secret.
pub const SECRET_ENV: &str = "CHATTERBOX_SECRET";

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub relay: RelaySection,
    /// Group id -> member ids.
    #[serde(default)]
    pub groups: HashMap<String, Vec<String>>,
}

/// `[server]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

/// `[auth]` section of the config TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthSection {
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default = "default_leeway")]
    pub leeway_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_window")]
    pub window_secs: u64,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            secret: None,
            leeway_secs: default_leeway(),
            max_attempts: default_max_attempts(),
            window_secs: default_window(),
        }
    }
}

/// `[relay]` section of the config TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelaySection {
    /// Discard group sends from users outside the group.
    #[serde(default)]
    pub require_group_membership: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_outbound_buffer() -> usize {
    64
}
fn default_leeway() -> u64 {
    30
}
fn default_max_attempts() -> u32 {
    20
}
fn default_window() -> u64 {
    60
}

/// Values given on the command line (or environment) that win over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub secret: Option<String>,
}

/// Resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Capacity of each session's outbound queue.
    pub outbound_buffer: usize,
    pub secret: Vec<u8>,
    pub leeway_secs: u64,
    pub max_attempts: u32,
    pub window_secs: u64,
    pub require_group_membership: bool,
    pub groups: HashMap<String, Vec<String>>,
}

impl ServerConfig {
    /// Defaults for everything but the secret.
    pub fn with_secret(secret: impl Into<Vec<u8>>) -> Self {
        let server = ServerSection::default();
        let auth = AuthSection::default();
        Self {
            host: server.host,
            port: server.port,
            outbound_buffer: server.outbound_buffer,
            secret: secret.into(),
            leeway_secs: auth.leeway_secs,
            max_attempts: auth.max_attempts,
            window_secs: auth.window_secs,
            require_group_membership: false,
            groups: HashMap::new(),
        }
    }

    /// Load config from a TOML file, then apply overrides.
    ///
    /// A missing file means defaults. The secret comes from the overrides,
    /// then `CHATTERBOX_SECRET`, then the file.
    pub fn load(config_path: Option<&Path>, mut overrides: Overrides) -> ChatResult<Self> {
        let file_config = match config_path.map(expand_tilde) {
            Some(path) if path.exists() => {
                info!(path = %path.display(), "loading config file");
                let content = std::fs::read_to_string(&path)?;
                toml::from_str::<ConfigFile>(&content)
                    .map_err(|e| ChatError::Config(format!("config parse error: {e}")))?
            }
            Some(path) => {
                info!(path = %path.display(), "config file not found, using defaults");
                ConfigFile::default()
            }
            None => ConfigFile::default(),
        };

        if overrides.secret.is_none() {
            overrides.secret = std::env::var(SECRET_ENV).ok().filter(|s| !s.is_empty());
        }
        Self::resolve(file_config, overrides)
    }

    /// Merge a parsed file with overrides.
    pub fn resolve(file: ConfigFile, overrides: Overrides) -> ChatResult<Self> {
        let secret = overrides
            .secret
            .or(file.auth.secret)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ChatError::Config(format!(
                    "no credential secret configured (set [auth].secret, {SECRET_ENV} or --secret)"
                ))
            })?;

        if file.server.outbound_buffer == 0 {
            return Err(ChatError::Config("outbound_buffer must be at least 1".into()));
        }

        Ok(Self {
            host: overrides.host.unwrap_or(file.server.host),
            port: overrides.port.unwrap_or(file.server.port),
            outbound_buffer: file.server.outbound_buffer,
            secret: secret.into_bytes(),
            leeway_secs: file.auth.leeway_secs,
            max_attempts: file.auth.max_attempts,
            window_secs: file.auth.window_secs,
            require_group_membership: file.relay.require_group_membership,
            groups: file.groups,
        })
    }

    /// `host:port` to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
