use thiserror::Error;

pub type ExecResult<T> = Result<T, ExecError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    #[error("non-zero exit code {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("killed by signal")]
    KilledBySignal,
    #[error("unexpected output: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Config(String),
}

impl ExecError {
    /// Diagnostic text the command printed, if any.
    pub fn stderr(&self) -> &str {
        match self {
            ExecError::NonZeroExit { stderr, .. } => stderr,
            _ => "",
        }
    }
}
