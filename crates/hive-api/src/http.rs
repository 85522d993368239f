use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
};
use hive_core::SupervisorView;
use hive_model::{Goal, Job, JobId, TaskState, TaskStatus};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::ApiError, handler::ApiHandler};

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
}

impl<H> HttpApi<H>
where
    H: ApiHandler,
{
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// Build axum router with mounted endpoints.
    ///
    /// Routes:
    /// - GET /api/v1/tasks - Task statuses (`?state=running` to filter)
    /// - GET /api/v1/tasks/{job_id} - Status of one job
    /// - GET /api/v1/desired - Desired task set
    /// - GET /api/v1/supervisors - Supervisors tracked by the agent
    /// - GET /api/v1/agent - Agent identity, version and uptime
    /// - GET /metrics - Prometheus exposition
    pub fn router(self) -> Router {
        Router::new()
            .route("/api/v1/tasks", get(list_tasks::<H>))
            .route("/api/v1/tasks/{job_id}", get(get_task::<H>))
            .route("/api/v1/desired", get(list_desired::<H>))
            .route("/api/v1/supervisors", get(list_supervisors::<H>))
            .route("/api/v1/agent", get(agent_info::<H>))
            .route("/metrics", get(metrics::<H>))
            .with_state(self.handler)
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListTasksParams {
    /// Filter by task state
    state: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ListTasksResponse {
    tasks: Vec<TaskStatus>,
    total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct DesiredTask {
    job_id: JobId,
    goal: Goal,
    job: Job,
}

#[derive(Debug, Serialize, Deserialize)]
struct ListDesiredResponse {
    tasks: Vec<DesiredTask>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SupervisorInfo {
    job_id: JobId,
    #[serde(skip_serializing_if = "Option::is_none")]
    state: Option<TaskState>,
    starting: bool,
}

impl From<SupervisorView> for SupervisorInfo {
    fn from(view: SupervisorView) -> Self {
        Self {
            job_id: view.job_id,
            state: view.state,
            starting: view.starting,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ListSupervisorsResponse {
    supervisors: Vec<SupervisorInfo>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/tasks
async fn list_tasks<H>(
    State(handler): State<Arc<H>>,
    Query(params): Query<ListTasksParams>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let state = params
        .state
        .as_deref()
        .map(|s| s.parse::<TaskState>().map_err(ApiError::InvalidRequest))
        .transpose()?;

    let tasks = handler.task_statuses(state).await?;
    debug!(count = tasks.len(), ?state, "tasks listed");

    let response = ListTasksResponse {
        total: tasks.len(),
        tasks,
    };
    Ok(Json(response))
}

/// GET /api/v1/tasks/{job_id}
async fn get_task<H>(
    State(handler): State<Arc<H>>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let job_id = JobId::parse(&job_id)?;
    match handler.task_status(&job_id).await? {
        Some(status) => Ok(Json(status)),
        None => Err(ApiError::TaskNotFound(job_id.to_string())),
    }
}

/// GET /api/v1/desired
async fn list_desired<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let tasks = handler
        .desired_tasks()
        .await?
        .into_iter()
        .map(|task| DesiredTask {
            job_id: task.job_id(),
            goal: task.goal(),
            job: task.job().clone(),
        })
        .collect();
    Ok(Json(ListDesiredResponse { tasks }))
}

/// GET /api/v1/supervisors
async fn list_supervisors<H>(
    State(handler): State<Arc<H>>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let supervisors = handler
        .supervisors()
        .await?
        .into_iter()
        .map(SupervisorInfo::from)
        .collect();
    Ok(Json(ListSupervisorsResponse { supervisors }))
}

/// GET /api/v1/agent
async fn agent_info<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    Ok(Json(handler.agent_info().await?))
}

/// GET /metrics
async fn metrics<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let exposition = handler.metrics().await?;
    Ok(([(header::CONTENT_TYPE, exposition.content_type)], exposition.body))
}
