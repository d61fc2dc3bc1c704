//! Client configuration.
//!
//! Reads/writes `~/.loopin/config.toml`. `LOOPIN_SERVER` and `LOOPIN_TOKEN`
//! override the file; `--server` overrides both.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const SERVER_ENV: &str = "LOOPIN_SERVER";
pub const TOKEN_ENV: &str = "LOOPIN_TOKEN";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// API base URL (e.g. "http://127.0.0.1:8000").
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub server: String,

    /// Bearer token issued by the server's login endpoint.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
}

/// Where to connect and as whom, after all overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub server: String,
    pub token: Option<String>,
}

impl ClientConfig {
    /// Default config file path: ~/.loopin/config.toml.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }

    /// Load config from disk, or return default if file doesn't exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn resolve(&self, server_flag: Option<&str>) -> Resolved {
        self.resolve_with(server_flag, |key| std::env::var(key).ok())
    }

    fn resolve_with(
        &self,
        server_flag: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Resolved {
        let non_empty = |s: String| if s.trim().is_empty() { None } else { Some(s) };
        let file_server = non_empty(self.server.clone());
        let server = server_flag
            .map(str::to_string)
            .or_else(|| env(SERVER_ENV).and_then(non_empty))
            .or(file_server)
            .unwrap_or_else(|| loopin_feed::DEFAULT_BASE_URL.to_string());
        let token = env(TOKEN_ENV)
            .and_then(non_empty)
            .or_else(|| non_empty(self.token.clone()));
        Resolved { server, token }
    }
}

/// Return the Loop.in config directory (~/.loopin).
fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".loopin")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_to_local_server() {
        let resolved = ClientConfig::default().resolve_with(None, no_env);
        assert_eq!(resolved.server, "http://127.0.0.1:8000");
        assert_eq!(resolved.token, None);
    }

    #[test]
    fn flag_beats_env_beats_file() {
        let config = ClientConfig {
            server: "http://file:1".into(),
            token: "file-token".into(),
        };
        let env = |key: &str| match key {
            SERVER_ENV => Some("http://env:2".to_string()),
            TOKEN_ENV => Some("env-token".to_string()),
            _ => None,
        };

        let resolved = config.resolve_with(None, env);
        assert_eq!(resolved.server, "http://env:2");
        assert_eq!(resolved.token.as_deref(), Some("env-token"));

        let resolved = config.resolve_with(Some("http://flag:3"), env);
        assert_eq!(resolved.server, "http://flag:3");

        let resolved = config.resolve_with(None, no_env);
        assert_eq!(resolved.server, "http://file:1");
        assert_eq!(resolved.token.as_deref(), Some("file-token"));
    }

    #[test]
    fn roundtrip_skips_empty_fields() {
        let config = ClientConfig {
            server: "http://localhost:8000".into(),
            token: String::new(),
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(!toml_str.contains("token"));
        let back: ClientConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(back, config);
    }
}
