use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Observed lifecycle state of a task's container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskState {
    PullingImage,
    Creating,
    Starting,
    Running,
    /// The container exited on its own.
    Exited,
    Stopping,
    /// The container was stopped on request (or never existed).
    Stopped,
    Failed,
}

impl TaskState {
    /// `true` if no container process is running and none is on its way.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Exited | TaskState::Stopped | TaskState::Failed)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, TaskState::Stopped)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, TaskState::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskState::PullingImage => "PULLING_IMAGE",
            TaskState::Creating => "CREATING",
            TaskState::Starting => "STARTING",
            TaskState::Running => "RUNNING",
            TaskState::Exited => "EXITED",
            TaskState::Stopping => "STOPPING",
            TaskState::Stopped => "STOPPED",
            TaskState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PULLING_IMAGE" => Ok(TaskState::PullingImage),
            "CREATING" => Ok(TaskState::Creating),
            "STARTING" => Ok(TaskState::Starting),
            "RUNNING" => Ok(TaskState::Running),
            "EXITED" => Ok(TaskState::Exited),
            "STOPPING" => Ok(TaskState::Stopping),
            "STOPPED" => Ok(TaskState::Stopped),
            "FAILED" => Ok(TaskState::Failed),
            _ => Err(format!("unknown task state: {s}")),
        }
    }
}

/// Why a supervisor is holding back on (re)starting a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThrottleState {
    #[default]
    No,
    ImageMissing,
    ImagePullFailed,
    /// Container keeps exiting shortly after start; restarts are delayed.
    Flapping,
}

impl ThrottleState {
    pub fn is_throttled(&self) -> bool {
        !matches!(self, ThrottleState::No)
    }
}
