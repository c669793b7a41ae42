//! Client configuration at `~/.chatterbox/config.toml`.
//!
//! CLI flags always override config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable holding the credential signing secret.
pub const SECRET_ENV: &str = "CHATTERBOX_SECRET";

/// Top-level config file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub default: DefaultConfig,
}

/// Default connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultConfig {
    /// Relay base URL.
    #[serde(default = "default_server")]
    pub server: String,

    /// Secret used by `chatterbox token`.
    #[serde(default)]
    pub secret: Option<String>,
}

impl Default for DefaultConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            secret: None,
        }
    }
}

fn default_server() -> String {
    "ws://127.0.0.1:8000".to_string()
}

impl Config {
    /// Load configuration from a TOML file, returning defaults if the file
    /// does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config at {}", path.display()))?;

        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Pick the signing secret: flag, then environment, then file.
    pub fn resolve_secret(&self, flag: Option<&str>) -> Result<String> {
        flag.map(str::to_string)
            .or_else(|| std::env::var(SECRET_ENV).ok())
            .or_else(|| self.default.secret.clone())
            .filter(|s| !s.is_empty())
            .with_context(|| {
                format!("no signing secret: pass --secret, set {SECRET_ENV} or [default].secret")
            })
    }
}

/// `~/.chatterbox/config.toml`.
pub fn default_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_default()
        .join(".chatterbox")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let cfg = Config::default();
        assert_eq!(cfg.default.server, "ws://127.0.0.1:8000");
        assert!(cfg.default.secret.is_none());
    }

    #[test]
    fn parse_toml_config() {
        let cfg: Config = toml::from_str(
            r#"
[default]
server = "ws://chat.example.com:9000"
secret = "dev"
"#,
        )
        .unwrap();
        assert_eq!(cfg.default.server, "ws://chat.example.com:9000");
        assert_eq!(cfg.default.secret.as_deref(), Some("dev"));
    }

    #[test]
    fn flag_secret_wins() {
        let mut cfg = Config::default();
        cfg.default.secret = Some("file".into());
        assert_eq!(cfg.resolve_secret(Some("flag")).unwrap(), "flag");
    }

    #[test]
    fn missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default.server, default_server());
    }
}
