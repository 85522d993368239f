//! Per-task lifecycle controllers.

mod config;
pub use config::{BackoffStrategy, SupervisorConfig};

mod container;
pub use container::{ContainerSupervisor, ContainerSupervisorFactory};

use std::sync::Arc;

use hive_model::{Job, JobId, TaskState};

use crate::error::SupervisorError;

/// Lifecycle controller for one task.
///
/// `start` and `stop` are fire-and-forget: they return immediately and the outcome shows up
/// later through [`Supervisor::status`] and [`Supervisor::is_starting`]. Runtime failures never
/// surface as errors here.
pub trait Supervisor: Send + Sync {
    /// Bring the container to a running state. No-op while starting or running.
    fn start(&self);

    /// Tear the container down. Safe to call repeatedly or on a supervisor that never ran.
    ///
    /// Should report [`TaskState::Stopping`] (or `Stopped`) promptly: the agent does not call
    /// `stop` again while that status holds and no start is in flight.
    fn stop(&self);

    /// `true` while a start is in flight and not yet confirmed running or failed.
    fn is_starting(&self) -> bool;

    /// Last observed state; `None` until the supervisor has observed anything.
    fn status(&self) -> Option<TaskState>;

    /// Release background work without touching the container.
    fn close(&self);
}

/// Builds supervisors. Must stay cheap: no I/O beyond wiring.
pub trait SupervisorFactory: Send + Sync {
    fn create(&self, job_id: &JobId, job: &Job) -> Result<Arc<dyn Supervisor>, SupervisorError>;
}
