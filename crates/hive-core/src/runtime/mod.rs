//! Container runtime abstraction driven by [`crate::ContainerSupervisor`].

use std::time::Duration;

use async_trait::async_trait;
use hive_model::{Job, JobId};

use crate::error::RuntimeError;

/// Container found on the host for a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: String,
    pub running: bool,
}

impl ContainerInfo {
    pub fn new(id: impl Into<String>, running: bool) -> Self {
        Self {
            id: id.into(),
            running,
        }
    }
}

/// Operations a supervisor needs from a container engine.
///
/// Containers are tagged with their [`JobId`], so a restarted daemon can find what its
/// predecessor left behind.
#[async_trait]
pub trait ContainerRuntime: Send + Sync + 'static {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;

    /// Most recent container labelled for `job_id`, running or not.
    async fn find(&self, job_id: &JobId) -> Result<Option<ContainerInfo>, RuntimeError>;

    /// Make `image` available locally.
    async fn pull(&self, image: &str) -> Result<(), RuntimeError>;

    /// Create (but do not start) a container for `job`; returns its id.
    async fn create(&self, job_id: &JobId, job: &Job) -> Result<String, RuntimeError>;

    async fn start(&self, container_id: &str) -> Result<(), RuntimeError>;

    /// Resolve once the container exits, with its exit code.
    async fn wait(&self, container_id: &str) -> Result<i64, RuntimeError>;

    async fn stop(&self, container_id: &str, grace: Duration) -> Result<(), RuntimeError>;

    async fn remove(&self, container_id: &str) -> Result<(), RuntimeError>;
}
