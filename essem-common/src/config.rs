//! Configuration loading and config-file resolution
//!
//! The worker receives one immutable [`Config`] resolved before the core
//! runs. The config file location follows a priority order:
//! 1. Command-line argument (highest priority)
//! 2. `ESSEM_CONFIG` environment variable
//! 3. Per-user config directory (`~/.config/essem/config.toml` on Linux)
//! 4. `/etc/essem/config.toml` (fallback)
//!
//! Credentials may additionally be overridden through environment variables
//! so they can be injected at deploy time without touching the file.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "ESSEM_CONFIG";

/// Fully resolved worker configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub amqp: AmqpConfig,
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub health: HealthConfig,
}

/// Broker connection, topology, and routing-key table
#[derive(Debug, Clone, Deserialize)]
pub struct AmqpConfig {
    #[serde(default = "default_amqp_host")]
    pub host: String,
    #[serde(default = "default_amqp_port")]
    pub port: u16,
    #[serde(default = "default_vhost")]
    pub vhost: String,
    pub username: String,
    pub password: String,
    /// Topic exchange the queue is bound to
    pub exchange: String,
    /// Queue receiving all three inbound event kinds
    pub queue: String,
    /// Maximum unacknowledged deliveries the broker keeps in flight
    #[serde(default = "default_prefetch")]
    pub prefetch_count: u16,
    pub routing: RoutingKeys,
}

/// The four routing keys the worker speaks
///
/// Three inbound bindings plus the single outbound get-metadata key.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingKeys {
    pub essence_linked: String,
    pub essence_unlinked: String,
    pub object_deleted: String,
    pub get_metadata: String,
}

/// Media repository endpoint and credentials
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryConfig {
    pub base_url: String,
    pub username: String,
    pub password: String,
}

/// Health endpoint listen address
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    #[serde(default = "default_health_listen")]
    pub listen: String,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            listen: default_health_listen(),
        }
    }
}

fn default_amqp_host() -> String {
    "localhost".to_string()
}

fn default_amqp_port() -> u16 {
    5672
}

fn default_vhost() -> String {
    "/".to_string()
}

fn default_prefetch() -> u16 {
    1
}

fn default_health_listen() -> String {
    "127.0.0.1:5760".to_string()
}

impl Config {
    /// Load configuration from the resolved config file, then apply
    /// environment overrides for credentials.
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        let path = resolve_config_path(cli_path)?;
        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        let mut config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Cannot parse {}: {}", path.display(), e)))?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Credentials from the environment win over the file.
    fn apply_env_overrides(&mut self) {
        apply_override("ESSEM_AMQP_USERNAME", &mut self.amqp.username);
        apply_override("ESSEM_AMQP_PASSWORD", &mut self.amqp.password);
        apply_override("ESSEM_REPOSITORY_USERNAME", &mut self.repository.username);
        apply_override("ESSEM_REPOSITORY_PASSWORD", &mut self.repository.password);
    }

    fn validate(&self) -> Result<()> {
        let required = [
            ("amqp.exchange", &self.amqp.exchange),
            ("amqp.queue", &self.amqp.queue),
            ("amqp.routing.essence_linked", &self.amqp.routing.essence_linked),
            ("amqp.routing.essence_unlinked", &self.amqp.routing.essence_unlinked),
            ("amqp.routing.object_deleted", &self.amqp.routing.object_deleted),
            ("amqp.routing.get_metadata", &self.amqp.routing.get_metadata),
            ("repository.base_url", &self.repository.base_url),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{} must not be empty", key)));
            }
        }
        Ok(())
    }
}

fn apply_override(env_var: &str, target: &mut String) {
    if let Ok(value) = std::env::var(env_var) {
        if !value.trim().is_empty() {
            if !target.trim().is_empty() {
                warn!(
                    "{} set in both environment and config file; using environment",
                    env_var
                );
            }
            *target = value;
        }
    }
}

/// Resolve the config file path following the priority order above.
pub fn resolve_config_path(cli_path: Option<&Path>) -> Result<PathBuf> {
    // Priority 1: command-line argument
    if let Some(path) = cli_path {
        return Ok(path.to_path_buf());
    }

    // Priority 2: environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return Ok(PathBuf::from(path));
    }

    // Priority 3: per-user config directory
    if let Some(path) = dirs::config_dir().map(|d| d.join("essem").join("config.toml")) {
        if path.exists() {
            return Ok(path);
        }
    }

    // Priority 4: system-wide fallback
    let system_config = PathBuf::from("/etc/essem/config.toml");
    if system_config.exists() {
        return Ok(system_config);
    }

    Err(Error::Config(
        "No config file found. Provide one via --config, ESSEM_CONFIG, \
         ~/.config/essem/config.toml or /etc/essem/config.toml"
            .to_string(),
    ))
}
