use hive_model::{TaskState, TaskStatus};
use tracing::{debug, error, info, warn};

#[inline]
pub fn message_for(state: TaskState) -> &'static str {
    match state {
        // start sequence
        TaskState::PullingImage => "pulling image",
        TaskState::Creating => "creating container",
        TaskState::Starting => "starting container",
        TaskState::Running => "task running",

        // stop sequence
        TaskState::Stopping => "stopping container",
        TaskState::Stopped => "task stopped",

        // terminal
        TaskState::Exited => "container exited",
        TaskState::Failed => "task failed",
    }
}

/// Log a status change at the level its new state deserves.
#[inline]
pub fn log_transition(status: &TaskStatus, previous: Option<TaskState>) {
    let msg = message_for(status.state);
    let job = status.job.name.as_str();
    let version = status.job.version.as_str();
    let container = status.container_id.as_deref().unwrap_or("-");
    let from = previous.map(|p| p.as_str()).unwrap_or("-");

    match status.state {
        TaskState::Failed => error!(
            job,
            version,
            container,
            from,
            throttled = ?status.throttled,
            "{msg}"
        ),
        TaskState::Exited => warn!(job, version, container, from, "{msg}"),
        TaskState::Running | TaskState::Stopped => info!(job, version, container, from, "{msg}"),
        TaskState::PullingImage
        | TaskState::Creating
        | TaskState::Starting
        | TaskState::Stopping => debug!(job, version, container, from, throttled = ?status.throttled, "{msg}"),
    }
}
