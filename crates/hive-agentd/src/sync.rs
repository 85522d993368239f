//! Periodic pull of this host's desired task set from the master.

use std::{collections::HashMap, time::Duration};

use hive_client::{ClientError, MasterClient};
use hive_core::TaskModel;
use hive_model::{JobId, Task};
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("master request failed: {0}")]
    Client(#[from] ClientError),

    #[error("host {0} is not known to the master")]
    UnknownHost(String),

    #[error("job {0} is deployed but has no definition")]
    MissingJob(JobId),
}

/// Pulls desired tasks for one host into a [`TaskModel`].
pub struct MasterSync {
    client: MasterClient,
    host: String,
    agent_id: String,
    model: TaskModel,
    registered: bool,
}

impl MasterSync {
    pub fn new(client: MasterClient, host: String, agent_id: String, model: TaskModel) -> Self {
        Self {
            client,
            host,
            agent_id,
            model,
            registered: false,
        }
    }

    /// Sync every `interval` until cancelled. A failed round leaves the previous desired set
    /// in place and is retried on the next tick.
    pub async fn run(mut self, interval: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if let Err(e) = self.sync_once().await {
                warn!("sync failed: {}", e);
            }
        }
        debug!("master sync stopped");
    }

    pub async fn sync_once(&mut self) -> Result<usize, SyncError> {
        if !self.registered {
            self.register().await?;
        }
        let tasks = self.desired_tasks().await?;
        let count = tasks.len();
        self.model.set_tasks(tasks);
        debug!(tasks = count, "sync completed successfully");
        Ok(count)
    }

    async fn register(&mut self) -> Result<(), SyncError> {
        match self.client.register_host(&self.host, &self.agent_id).await? {
            200 => info!(host = %self.host, id = %self.agent_id, "registered with master"),
            status => warn!(host = %self.host, status, "master refused host registration"),
        }
        // One attempt per process; a refusal is not retried.
        self.registered = true;
        Ok(())
    }

    /// Build the desired task map from the host's deployments and their job definitions.
    pub async fn desired_tasks(&self) -> Result<HashMap<JobId, Task>, SyncError> {
        let status = self
            .client
            .host_status(&self.host)
            .await?
            .ok_or_else(|| SyncError::UnknownHost(self.host.clone()))?;

        let mut tasks = HashMap::with_capacity(status.jobs.len());
        for (job_id, deployment) in status.jobs {
            let job = self
                .client
                .job(&job_id)
                .await?
                .ok_or_else(|| SyncError::MissingJob(job_id.clone()))?;
            tasks.insert(job_id, Task::new(job, deployment.goal));
        }
        Ok(tasks)
    }
}
