use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unknown log format {0:?}, expected text, json or journald")]
    UnknownFormat(String),

    #[error("journald output needs Linux and the `journald` feature")]
    JournaldUnavailable,

    #[error("a global subscriber is already installed")]
    AlreadyInstalled,

    #[error("failed to install subscriber: {0}")]
    Install(String),

    #[error("invalid log filter {directive:?}: {reason}")]
    InvalidFilter { directive: String, reason: String },
}
