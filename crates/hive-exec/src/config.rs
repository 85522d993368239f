use crate::error::ExecError;

/// How to reach the Docker engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerConfig {
    /// CLI binary, looked up on `PATH` unless absolute.
    pub binary: String,
    /// Engine endpoint passed with `-H` (`unix:///var/run/docker.sock`, `tcp://host:2375`).
    /// `None` keeps the CLI default.
    pub host: Option<String>,
    /// Label carrying the job id on every container we create.
    pub label: String,
    /// Prefix of generated container names.
    pub name_prefix: String,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
            host: None,
            label: "hive.job-id".to_string(),
            name_prefix: "hive".to_string(),
        }
    }
}

impl DockerConfig {
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn validate(&self) -> Result<(), ExecError> {
        if self.binary.trim().is_empty() {
            return Err(ExecError::Config("docker binary is empty".into()));
        }
        if self.label.trim().is_empty() || self.label.contains('=') {
            return Err(ExecError::Config(format!("invalid label key: {:?}", self.label)));
        }
        if let Some(host) = &self.host
            && !(host.starts_with("unix://") || host.starts_with("tcp://"))
        {
            return Err(ExecError::Config(format!(
                "docker host must be unix:// or tcp://, got {host}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        assert!(DockerConfig::default().validate().is_ok());
    }

    #[test]
    fn accepts_unix_and_tcp_hosts() {
        let unix = DockerConfig::default().with_host("unix:///var/run/docker.sock");
        let tcp = DockerConfig::default().with_host("tcp://10.0.0.5:2375");
        assert!(unix.validate().is_ok());
        assert!(tcp.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_scheme() {
        let cfg = DockerConfig::default().with_host("http://localhost:2375");
        assert!(matches!(cfg.validate(), Err(ExecError::Config(_))));
    }
}
