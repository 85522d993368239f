use serde::{Deserialize, Serialize};

use crate::{Goal, Job, JobId};

/// Desired (job, goal) pair for one host.
///
/// Tasks are replaced wholesale when either part changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    job: Job,
    goal: Goal,
}

impl Task {
    pub fn new(job: Job, goal: Goal) -> Self {
        Self { job, goal }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }

    pub fn goal(&self) -> Goal {
        self.goal
    }

    pub fn job_id(&self) -> JobId {
        self.job.id()
    }

    /// Same job, different goal.
    pub fn with_goal(&self, goal: Goal) -> Self {
        Self {
            job: self.job.clone(),
            goal,
        }
    }
}
