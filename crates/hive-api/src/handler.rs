use async_trait::async_trait;
use hive_core::SupervisorView;
use hive_model::{JobId, Task, TaskState, TaskStatus};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Metrics in a text exposition format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exposition {
    pub content_type: String,
    pub body: String,
}

/// Identity and runtime facts of the agent process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: String,
    pub host: String,
    pub version: String,
    pub os: String,
    pub platform: String,
    pub arch: String,
    pub uptime_seconds: u64,
}

/// Backend of the status API.
///
/// `AgentApiAdapter` serves a running agent; tests and embedders can plug in their own.
#[async_trait]
pub trait ApiHandler: Send + Sync + 'static {
    /// Last reported status of every job, optionally only those in `state`. Sorted by job.
    async fn task_statuses(&self, state: Option<TaskState>) -> Result<Vec<TaskStatus>, ApiError>;

    async fn task_status(&self, id: &JobId) -> Result<Option<TaskStatus>, ApiError>;

    /// Desired task set as last received from the master. Sorted by job.
    async fn desired_tasks(&self) -> Result<Vec<Task>, ApiError>;

    async fn supervisors(&self) -> Result<Vec<SupervisorView>, ApiError>;

    async fn metrics(&self) -> Result<Exposition, ApiError>;

    async fn agent_info(&self) -> Result<AgentInfo, ApiError>;
}
