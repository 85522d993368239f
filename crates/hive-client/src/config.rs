use std::time::Duration;

use reqwest::Url;

use crate::error::ClientError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the master, e.g. `http://master:5801`.
    pub endpoint: String,
    /// Sent as the `user` query parameter on every request.
    pub user: String,
    /// Per-request timeout, connect included.
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:5801".to_string(),
            user: "hive-agent".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Parse the endpoint into the base URL requests are built on.
    pub fn base_url(&self) -> Result<Url, ClientError> {
        let invalid = |reason: String| ClientError::InvalidEndpoint {
            endpoint: self.endpoint.clone(),
            reason,
        };
        let url = Url::parse(&self.endpoint).map_err(|e| invalid(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(invalid(format!("unsupported scheme {other:?}"))),
        }
        if url.query().is_some() || url.fragment().is_some() {
            return Err(invalid("query and fragment are not allowed".into()));
        }
        Ok(url)
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        self.base_url()?;
        if self.user.trim().is_empty() {
            return Err(ClientError::Config("user must not be empty".into()));
        }
        if self.timeout.is_zero() {
            return Err(ClientError::Config("timeout must be positive".into()));
        }
        Ok(())
    }
}
