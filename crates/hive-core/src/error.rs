use std::path::PathBuf;

use hive_model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("state file {path}: {reason}")]
    State { path: PathBuf, reason: String },

    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Failure to construct a supervisor for a job.
#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("invalid job {job}: {source}")]
    InvalidJob {
        job: String,
        #[source]
        source: ModelError,
    },

    #[error("job id {expected} does not match job content {actual}")]
    IdMismatch { expected: String, actual: String },
}

/// Errors reported by a [`crate::ContainerRuntime`].
///
/// These never cross the supervisor boundary; they end up as a `FAILED` task state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("image pull failed: {0}")]
    ImagePull(String),

    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("runtime unavailable: {0}")]
    Unavailable(String),

    #[error("runtime command failed: {0}")]
    Command(String),
}
