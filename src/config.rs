use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_remote_timeout_secs")]
    pub remote_timeout_secs: u64,
    pub discord: DiscordConfig,
    pub servers: Vec<ServerConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscordConfig {
    #[serde(default = "default_bot_token_env")]
    pub bot_token_env: String,
    #[serde(default)]
    pub bot_token: Option<String>,
    pub channel_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub name: String,
    /// True for the host the daemon itself runs on. At most one entry should
    /// be marked local; that is the operator's responsibility.
    #[serde(default)]
    pub local: bool,
    /// Environment prefix for remote SSH credentials, e.g. `NAS` reads
    /// `NAS_SSH_HOST`, `NAS_SSH_USER` and `NAS_SSH_PASS`.
    #[serde(default)]
    pub env_prefix: Option<String>,
}

/// Credentials for one remote host, resolved from the environment.
#[derive(Debug, Clone)]
pub struct RemoteCredentials {
    pub host: String,
    pub username: String,
    pub password: String,
}

impl RemoteCredentials {
    /// Returns `None` when any of the three variables is missing or blank.
    pub fn from_env(prefix: &str) -> Option<Self> {
        let host = non_empty_env(&format!("{prefix}_SSH_HOST"))?;
        let username = non_empty_env(&format!("{prefix}_SSH_USER"))?;
        let password = non_empty_env(&format!("{prefix}_SSH_PASS"))?;
        Some(Self {
            host,
            username,
            password,
        })
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("config validation error: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg: Config = serde_yaml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs < 1 {
            return Err(ConfigError::Validation(
                "interval_secs must be >= 1".to_string(),
            ));
        }
        if self.remote_timeout_secs < 1 {
            return Err(ConfigError::Validation(
                "remote_timeout_secs must be >= 1".to_string(),
            ));
        }
        if self.discord.channel_id.trim().is_empty() {
            return Err(ConfigError::Validation(
                "discord.channel_id must not be empty".to_string(),
            ));
        }
        if self.servers.is_empty() {
            return Err(ConfigError::Validation(
                "servers must contain at least one entry".to_string(),
            ));
        }

        validate_servers(&self.servers)?;

        Ok(())
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn validate_servers(servers: &[ServerConfig]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for server in servers {
        if server.name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "servers[*].name must not be empty".to_string(),
            ));
        }
        if !names.insert(server.name.clone()) {
            return Err(ConfigError::Validation(format!(
                "server name '{}' must be unique",
                server.name
            )));
        }
        if !server.local {
            let has_prefix = server
                .env_prefix
                .as_deref()
                .is_some_and(|p| !p.trim().is_empty());
            if !has_prefix {
                return Err(ConfigError::Validation(format!(
                    "remote server '{}' needs an env_prefix",
                    server.name
                )));
            }
        }
    }
    Ok(())
}

const fn default_interval_secs() -> u64 {
    300
}

const fn default_remote_timeout_secs() -> u64 {
    10
}

fn default_bot_token_env() -> String {
    "DISCORD_BOT_TOKEN".to_string()
}
