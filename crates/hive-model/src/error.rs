use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("invalid job id '{0}' (expected name:version[:hash])")]
    InvalidJobId(String),
    #[error("invalid job: {0}")]
    InvalidJob(String),
    #[error("failed to encode job: {0}")]
    Encode(String),
}
