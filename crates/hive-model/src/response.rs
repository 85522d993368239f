//! Response envelopes returned by the master's HTTP API.
//!
//! Non-2xx statuses that carry one of these bodies are decoded as regular responses;
//! the `status` field tells the caller what happened.

use serde::{Deserialize, Serialize};

use crate::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreateJobStatus {
    Ok,
    JobAlreadyExists,
    InvalidJobDefinition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub status: CreateJobStatus,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobDeleteStatus {
    Ok,
    JobNotFound,
    StillInUse,
    Forbidden,
    InvalidToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDeleteResponse {
    pub status: JobDeleteStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobDeployStatus {
    Ok,
    JobNotFound,
    HostNotFound,
    JobAlreadyDeployed,
    InvalidId,
    PortConflict,
    Forbidden,
    InvalidToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDeployResponse {
    pub status: JobDeployStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<JobId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobUndeployStatus {
    Ok,
    HostNotFound,
    JobNotFound,
    InvalidId,
    Forbidden,
    InvalidToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobUndeployResponse {
    pub status: JobUndeployStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<JobId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SetGoalStatus {
    Ok,
    JobNotFound,
    JobNotDeployed,
    InvalidToken,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetGoalResponse {
    pub status: SetGoalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<JobId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HostDeregisterStatus {
    Ok,
    NotFound,
    JobsStillDeployed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostDeregisterResponse {
    pub status: HostDeregisterStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// Aggregated status of one job across hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub job: crate::Job,
    #[serde(default)]
    pub task_statuses: std::collections::HashMap<String, crate::TaskStatus>,
    #[serde(default)]
    pub deployments: std::collections::HashMap<String, crate::Deployment>,
}

/// Client and master versions. A master that cannot be reached is reported in `master`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionResponse {
    pub client: String,
    pub master: String,
}
