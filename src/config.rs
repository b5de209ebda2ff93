use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use pareto_core::engine::EngineOptions;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a connection waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    5
}
fn default_busy_timeout_ms() -> u64 {
    5000
}

impl DbConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_request_timeout_ms() -> u64 {
    10_000
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            key_prefix: default_key_prefix(),
        }
    }
}

fn default_ttl_secs() -> u64 {
    300
}
fn default_key_prefix() -> String {
    "compare:".to_string()
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    #[serde(default = "default_sweep_threshold")]
    pub sweep_threshold: usize,
    #[serde(default = "default_max_dominated")]
    pub max_dominated: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sweep_threshold: default_sweep_threshold(),
            max_dominated: default_max_dominated(),
        }
    }
}

fn default_sweep_threshold() -> usize {
    256
}
fn default_max_dominated() -> usize {
    500
}

impl EngineConfig {
    pub fn options(&self) -> EngineOptions {
        EngineOptions {
            sweep_threshold: self.sweep_threshold,
            max_dominated: self.max_dominated,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.db.max_connections == 0 {
        anyhow::bail!("db.max_connections must be > 0");
    }
    if config.cache.ttl_secs == 0 {
        anyhow::bail!("cache.ttl_secs must be > 0");
    }
    if config.cache.key_prefix.is_empty() {
        anyhow::bail!("cache.key_prefix must not be empty");
    }
    if config.engine.max_dominated == 0 {
        anyhow::bail!("engine.max_dominated must be > 0");
    }
    if config.server.request_timeout_ms == 0 {
        anyhow::bail!("server.request_timeout_ms must be > 0");
    }
    Ok(())
}
