use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("metrics are not enabled")]
    MetricsDisabled,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("core error: {0}")]
    Core(#[from] hive_core::CoreError),

    #[error("invalid job id: {0}")]
    Model(#[from] hive_model::ModelError),
}

#[cfg(feature = "http")]
impl axum::response::IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            ApiError::InvalidRequest(_) | ApiError::Model(_) => StatusCode::BAD_REQUEST,
            ApiError::TaskNotFound(_) | ApiError::MetricsDisabled => StatusCode::NOT_FOUND,
            ApiError::Core(hive_core::CoreError::ModelUnavailable(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ApiError::Internal(_) | ApiError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::warn!(error = %self, "api request failed");
        }
        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
