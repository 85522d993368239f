use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Goal, JobId, TaskStatus};

/// A job assigned to a host with a goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    pub job_id: JobId,
    pub goal: Goal,
}

impl Deployment {
    pub fn new(job_id: JobId, goal: Goal) -> Self {
        Self { job_id, goal }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HostState {
    Up,
    Down,
}

/// What the master knows about one host: its deployments and last reported task statuses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostStatus {
    pub status: HostState,
    #[serde(default)]
    pub jobs: HashMap<JobId, Deployment>,
    #[serde(default)]
    pub statuses: HashMap<JobId, TaskStatus>,
}
