use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use hive_client::ClientConfig;
use hive_core::{AgentConfig, host_name};
use hive_exec::DockerConfig;
use hive_observe::{LoggerConfig, LoggerFormat};
use thiserror::Error;

pub const STATE_FILE: &str = "task-statuses.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

fn invalid(var: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        var,
        reason: reason.into(),
    }
}

/// Daemon settings, read from `HIVE_*` environment variables and `DOCKER_HOST`.
#[derive(Debug, Clone)]
pub struct AgentdConfig {
    /// Name this host is registered under with the master.
    pub host: String,
    /// Master endpoint. Without one the agent only keeps what it recovered.
    pub master: Option<String>,
    pub state_dir: PathBuf,
    pub sync_interval: Duration,
    pub reactor_timeout: Duration,
    /// Local status API; `None` when `HIVE_API_ADDR=off`.
    pub api_addr: Option<SocketAddr>,
    pub log_level: String,
    pub log_format: LoggerFormat,
    pub docker_host: Option<String>,
}

impl Default for AgentdConfig {
    fn default() -> Self {
        Self {
            host: host_name(),
            master: None,
            state_dir: PathBuf::from("/var/lib/hive"),
            sync_interval: Duration::from_secs(5),
            reactor_timeout: AgentConfig::default().reactor_timeout,
            api_addr: Some(SocketAddr::from(([127, 0, 0, 1], 5803))),
            log_level: "info".to_string(),
            log_format: LoggerFormat::Text,
            docker_host: None,
        }
    }
}

impl AgentdConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; unset or blank variables keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut cfg = Self::default();

        if let Some(host) = get("HIVE_HOST") {
            cfg.host = host;
        }
        cfg.master = get("HIVE_MASTER");
        if let Some(dir) = get("HIVE_STATE_DIR") {
            cfg.state_dir = PathBuf::from(dir);
        }
        if let Some(ms) = get("HIVE_SYNC_INTERVAL_MS") {
            cfg.sync_interval = parse_millis("HIVE_SYNC_INTERVAL_MS", &ms)?;
        }
        if let Some(ms) = get("HIVE_REACTOR_TIMEOUT_MS") {
            cfg.reactor_timeout = parse_millis("HIVE_REACTOR_TIMEOUT_MS", &ms)?;
        }
        if let Some(addr) = get("HIVE_API_ADDR") {
            cfg.api_addr = match addr.as_str() {
                "off" | "none" => None,
                _ => Some(
                    addr.parse()
                        .map_err(|e| invalid("HIVE_API_ADDR", format!("{addr}: {e}")))?,
                ),
            };
        }
        if let Some(level) = get("HIVE_LOG_LEVEL") {
            cfg.log_level = level;
        }
        if let Some(format) = get("HIVE_LOG_FORMAT") {
            cfg.log_format = format
                .parse()
                .map_err(|e| invalid("HIVE_LOG_FORMAT", format!("{e}")))?;
        }
        cfg.docker_host = get("DOCKER_HOST");

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.is_empty() {
            return Err(invalid("HIVE_HOST", "host name is empty"));
        }
        if self.sync_interval.is_zero() {
            return Err(invalid("HIVE_SYNC_INTERVAL_MS", "must be positive"));
        }
        if self.reactor_timeout.is_zero() {
            return Err(invalid("HIVE_REACTOR_TIMEOUT_MS", "must be positive"));
        }
        if let Some(master) = &self.master {
            ClientConfig::new(master.as_str())
                .validate()
                .map_err(|e| invalid("HIVE_MASTER", e.to_string()))?;
        }
        self.logger()
            .validate()
            .map_err(|e| invalid("HIVE_LOG_LEVEL", e.to_string()))?;
        self.docker()
            .validate()
            .map_err(|e| invalid("DOCKER_HOST", e.to_string()))?;
        Ok(())
    }

    pub fn state_file(&self) -> PathBuf {
        self.state_dir.join(STATE_FILE)
    }

    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    pub fn logger(&self) -> LoggerConfig {
        LoggerConfig::default()
            .with_format(self.log_format)
            .with_level(self.log_level.clone())
    }

    pub fn docker(&self) -> DockerConfig {
        match &self.docker_host {
            Some(host) => DockerConfig::default().with_host(host.clone()),
            None => DockerConfig::default(),
        }
    }

    pub fn agent(&self) -> AgentConfig {
        AgentConfig {
            reactor_timeout: self.reactor_timeout,
        }
    }

    /// Client settings for the master; the host name doubles as the request user.
    pub fn client(&self) -> Option<ClientConfig> {
        self.master
            .as_ref()
            .map(|master| ClientConfig::new(master.as_str()).with_user(self.host.clone()))
    }
}

fn parse_millis(var: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| invalid(var, format!("{value}: {e}")))
}
