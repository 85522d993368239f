//! Contracts between the agent and its source of truth.

use std::{collections::HashMap, sync::Arc};

use hive_model::{JobId, Task, TaskStatus};

use crate::error::CoreError;

/// Change notification without payload.
///
/// Implementations must re-query the model; a notification only says "something changed".
pub trait ModelListener: Send + Sync {
    fn tasks_changed(&self);
}

/// Desired task set and last-known statuses, as seen by the agent.
pub trait AgentModel: Send + Sync {
    /// Current desired state.
    fn tasks(&self) -> Result<HashMap<JobId, Task>, CoreError>;

    /// Best-known last observed status per job. Jobs never observed are absent.
    fn task_statuses(&self) -> Result<HashMap<JobId, TaskStatus>, CoreError>;

    /// Register a listener, invoked at least once after every change.
    fn add_listener(&self, listener: Arc<dyn ModelListener>);
}

/// Where supervisors publish the statuses they observe.
pub trait StatusSink: Send + Sync {
    fn set_task_status(&self, job_id: &JobId, status: TaskStatus);

    /// Forget a job's status; called once nothing is left to recover for it.
    fn remove_task_status(&self, job_id: &JobId);
}
