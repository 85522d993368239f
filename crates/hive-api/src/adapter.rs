use std::sync::Arc;

use async_trait::async_trait;
use hive_core::{
    Agent, SupervisorView, TaskModel, arch, host_name, os_info, platform, uptime_seconds,
};
use hive_model::{JobId, Task, TaskState, TaskStatus};
use hive_prometheus::PrometheusMetrics;

use crate::error::ApiError;
use crate::handler::{AgentInfo, ApiHandler, Exposition};

/// Serves the status API from a [`TaskModel`] and the [`Agent`] converging it.
pub struct AgentApiAdapter {
    model: TaskModel,
    agent: Arc<Agent>,
    metrics: Option<PrometheusMetrics>,
    id: String,
    host: String,
    os: String,
}

impl AgentApiAdapter {
    pub fn new(model: TaskModel, agent: Arc<Agent>) -> Self {
        Self {
            model,
            agent,
            metrics: None,
            id: String::new(),
            host: host_name(),
            os: os_info(),
        }
    }

    /// Agent id and the host name the agent registers under.
    pub fn with_identity(mut self, id: impl Into<String>, host: impl Into<String>) -> Self {
        self.id = id.into();
        self.host = host.into();
        self
    }

    pub fn with_metrics(mut self, metrics: PrometheusMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

#[async_trait]
impl ApiHandler for AgentApiAdapter {
    async fn task_statuses(&self, state: Option<TaskState>) -> Result<Vec<TaskStatus>, ApiError> {
        let mut statuses = match state {
            Some(state) => self.model.statuses_in(state),
            None => self.model.status_snapshot(),
        };
        statuses.sort_by_cached_key(TaskStatus::job_id);
        Ok(statuses)
    }

    async fn task_status(&self, id: &JobId) -> Result<Option<TaskStatus>, ApiError> {
        Ok(self.model.task_status(id))
    }

    async fn desired_tasks(&self) -> Result<Vec<Task>, ApiError> {
        let mut tasks: Vec<_> = self.model.task_snapshot().into_iter().collect();
        tasks.sort_by(|(a, _), (b, _)| a.cmp(b));
        Ok(tasks.into_iter().map(|(_, task)| task).collect())
    }

    async fn supervisors(&self) -> Result<Vec<SupervisorView>, ApiError> {
        Ok(self.agent.snapshot())
    }

    async fn metrics(&self) -> Result<Exposition, ApiError> {
        let metrics = self.metrics.as_ref().ok_or(ApiError::MetricsDisabled)?;
        Ok(Exposition {
            content_type: metrics.content_type().to_string(),
            body: metrics.encode(),
        })
    }

    async fn agent_info(&self) -> Result<AgentInfo, ApiError> {
        Ok(AgentInfo {
            id: self.id.clone(),
            host: self.host.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            os: self.os.clone(),
            platform: platform().to_string(),
            arch: arch().to_string(),
            uptime_seconds: uptime_seconds(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use hive_core::{
        AgentConfig, Supervisor, SupervisorError, SupervisorFactory, TokioReactorFactory,
    };
    use hive_model::{Goal, Job};

    struct NoSupervisors;

    impl SupervisorFactory for NoSupervisors {
        fn create(
            &self,
            job_id: &JobId,
            _job: &Job,
        ) -> Result<Arc<dyn Supervisor>, SupervisorError> {
            Err(SupervisorError::IdMismatch {
                expected: job_id.to_string(),
                actual: String::new(),
            })
        }
    }

    fn job(name: &str) -> Job {
        Job::builder(name, "1").image("busybox:1").build()
    }

    fn adapter(model: &TaskModel) -> AgentApiAdapter {
        let agent = Agent::new(
            Arc::new(model.clone()),
            Arc::new(NoSupervisors),
            &TokioReactorFactory::current().unwrap(),
            AgentConfig::default(),
        );
        AgentApiAdapter::new(model.clone(), Arc::new(agent))
    }

    #[tokio::test]
    async fn statuses_are_sorted_and_filtered() {
        let model = TaskModel::new();
        let seeded = [
            ("b", TaskState::Running),
            ("a", TaskState::Failed),
            ("c", TaskState::Running),
        ];
        for (name, state) in seeded {
            let job = job(name);
            model.set_task_status(job.id(), TaskStatus::new(job, state));
        }
        let api = adapter(&model);

        let all = api.task_statuses(None).await.unwrap();
        let names: Vec<_> = all.iter().map(|s| s.job.name.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);

        let running = api.task_statuses(Some(TaskState::Running)).await.unwrap();
        assert_eq!(running.len(), 2);
        assert!(running.iter().all(|s| s.state == TaskState::Running));

        let a = job("a");
        assert_eq!(api.task_status(&a.id()).await.unwrap().unwrap().state, TaskState::Failed);
        assert!(api.task_status(&job("zzz").id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn desired_tasks_follow_the_model() {
        let model = TaskModel::new();
        let (web, db) = (job("web"), job("db"));
        model.set_tasks(HashMap::from([
            (web.id(), Task::new(web.clone(), Goal::Start)),
            (db.id(), Task::new(db.clone(), Goal::Stop)),
        ]));
        let api = adapter(&model);

        let desired = api.desired_tasks().await.unwrap();
        let mut ids = vec![web.id(), db.id()];
        ids.sort();
        assert_eq!(desired.iter().map(Task::job_id).collect::<Vec<_>>(), ids);
        assert!(api.supervisors().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn metrics_need_a_registry() {
        let model = TaskModel::new();
        assert!(matches!(adapter(&model).metrics().await, Err(ApiError::MetricsDisabled)));

        let api = adapter(&model).with_metrics(PrometheusMetrics::new().unwrap());
        let exposition = api.metrics().await.unwrap();
        assert!(exposition.content_type.starts_with("text/plain"));
        assert!(exposition.body.contains("hive_agent_passes_total"));
    }

    #[tokio::test]
    async fn agent_info_reports_identity() {
        let model = TaskModel::new();
        let api = adapter(&model).with_identity("agent-7", "worker-3");

        let info = api.agent_info().await.unwrap();
        assert_eq!(info.id, "agent-7");
        assert_eq!(info.host, "worker-3");
        assert_eq!(info.platform, std::env::consts::OS);
        assert_eq!(info.arch, std::env::consts::ARCH);
        assert!(!info.version.is_empty());
        assert!(!info.os.is_empty());
    }
}
