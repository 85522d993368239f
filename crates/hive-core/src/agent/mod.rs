//! Convergence loop: keeps one supervisor per job in line with the desired task set.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use hive_model::{Goal, Job, JobId, Task, TaskState};
use tracing::{debug, error, info, instrument, warn};

use crate::{
    metrics::{AgentMetrics, NoopMetrics, SupervisorAction},
    model::{AgentModel, ModelListener},
    reactor::{Reactor, ReactorFactory},
    supervisor::{Supervisor, SupervisorFactory},
};

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// Upper bound between two convergence passes when nothing changes.
    pub reactor_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            reactor_timeout: Duration::from_secs(30),
        }
    }
}

/// Read-only view of one tracked supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorView {
    pub job_id: JobId,
    pub state: Option<TaskState>,
    pub starting: bool,
}

/// Drives supervisors towards the desired task set of an [`AgentModel`].
///
/// Passes run on the reactor, one at a time. Model changes only request a pass; the pass
/// always re-reads the full snapshot, so missed or duplicated notifications heal on the next
/// tick. Closing the agent releases supervisors without stopping their containers.
pub struct Agent {
    model: Arc<dyn AgentModel>,
    reactor: Arc<dyn Reactor>,
    core: Arc<Mutex<AgentCore>>,
}

struct AgentCore {
    model: Arc<dyn AgentModel>,
    factory: Arc<dyn SupervisorFactory>,
    metrics: Arc<dyn AgentMetrics>,
    supervisors: HashMap<JobId, Arc<dyn Supervisor>>,
    closed: bool,
}

/// Turns model notifications into reactor wake-ups.
struct ReactorListener(Arc<dyn Reactor>);

impl ModelListener for ReactorListener {
    fn tasks_changed(&self) {
        self.0.update();
    }
}

impl Agent {
    pub fn new(
        model: Arc<dyn AgentModel>,
        factory: Arc<dyn SupervisorFactory>,
        reactors: &dyn ReactorFactory,
        config: AgentConfig,
    ) -> Self {
        let core = Arc::new(Mutex::new(AgentCore {
            model: Arc::clone(&model),
            factory,
            metrics: Arc::new(NoopMetrics),
            supervisors: HashMap::new(),
            closed: false,
        }));

        let pass = Arc::clone(&core);
        let reactor = reactors.create(
            "agent",
            Box::new(move || lock(&pass).converge()),
            config.reactor_timeout,
        );

        Self {
            model,
            reactor,
            core,
        }
    }

    pub fn with_metrics(self, metrics: Arc<dyn AgentMetrics>) -> Self {
        lock(&self.core).metrics = metrics;
        self
    }

    /// Recover supervisors for every job with a known status, run one pass, then follow the model.
    #[instrument(level = "info", skip(self))]
    pub fn start(&self) {
        {
            let mut core = lock(&self.core);
            core.recover();
            core.converge();
        }
        self.model
            .add_listener(Arc::new(ReactorListener(Arc::clone(&self.reactor))));
        self.reactor.start();
        info!("agent started");
    }

    /// Stop the loop and release every supervisor. Containers keep running.
    #[instrument(level = "info", skip(self))]
    pub fn close(&self) {
        self.reactor.close();

        let mut guard = lock(&self.core);
        let core = &mut *guard;
        if core.closed {
            return;
        }
        core.closed = true;
        for (job_id, supervisor) in core.supervisors.drain() {
            debug!(job = %job_id, "closing supervisor");
            supervisor.close();
            core.metrics.supervisor_action(SupervisorAction::Close);
        }
        info!("agent closed");
    }

    /// Copy of the tracked supervisors, sorted by job.
    pub fn snapshot(&self) -> Vec<SupervisorView> {
        let core = lock(&self.core);
        let mut views: Vec<_> = core
            .supervisors
            .iter()
            .map(|(job_id, supervisor)| SupervisorView {
                job_id: job_id.clone(),
                state: supervisor.status(),
                starting: supervisor.is_starting(),
            })
            .collect();
        views.sort_by(|a, b| a.job_id.cmp(&b.job_id));
        views
    }
}

impl Drop for Agent {
    fn drop(&mut self) {
        self.reactor.close();
    }
}

fn lock(core: &Mutex<AgentCore>) -> MutexGuard<'_, AgentCore> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AgentCore {
    /// Track a supervisor for every job the model has seen, desired or not.
    fn recover(&mut self) {
        let statuses = match self.model.task_statuses() {
            Ok(statuses) => statuses,
            Err(e) => {
                warn!(error = %e, "failed to read task statuses, nothing recovered");
                return;
            }
        };
        for (job_id, status) in statuses {
            if self.supervisors.contains_key(&job_id) {
                continue;
            }
            info!(job = %job_id, state = %status.state, "recovering supervisor");
            self.create(&job_id, &status.job);
        }
    }

    #[instrument(level = "debug", skip(self))]
    fn converge(&mut self) {
        if self.closed {
            return;
        }
        let started = Instant::now();

        let tasks = match self.model.tasks() {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(error = %e, "failed to read desired tasks, pass skipped");
                self.metrics.pass_skipped();
                return;
            }
        };

        for (job_id, task) in &tasks {
            match task.goal() {
                Goal::Start => self.ensure_started(job_id, task),
                Goal::Stop => self.ensure_stopped(job_id, task),
            }
        }
        self.retire_undesired(&tasks);

        let live = self.supervisors.len();
        self.metrics.pass_completed(started.elapsed(), live);
        debug!(desired = tasks.len(), live, "convergence pass complete");
    }

    fn ensure_started(&mut self, job_id: &JobId, task: &Task) {
        let supervisor = match self.supervisors.get(job_id) {
            Some(supervisor) => {
                if supervisor.is_starting() || supervisor.status() == Some(TaskState::Running) {
                    return;
                }
                Arc::clone(supervisor)
            }
            None => match self.create(job_id, task.job()) {
                Some(supervisor) => supervisor,
                None => return,
            },
        };
        debug!(job = %job_id, "starting");
        supervisor.start();
        self.metrics.supervisor_action(SupervisorAction::Start);
    }

    fn ensure_stopped(&mut self, job_id: &JobId, task: &Task) {
        let supervisor = match self.supervisors.get(job_id) {
            Some(supervisor) => {
                if stop_underway(&**supervisor) {
                    return;
                }
                Arc::clone(supervisor)
            }
            // A fresh supervisor finds out what, if anything, is running for the job.
            None => match self.create(job_id, task.job()) {
                Some(supervisor) => supervisor,
                None => return,
            },
        };
        debug!(job = %job_id, "stopping");
        supervisor.stop();
        self.metrics.supervisor_action(SupervisorAction::Stop);
    }

    /// Stop supervisors whose job left the desired set; close and drop them once stopped.
    fn retire_undesired(&mut self, tasks: &HashMap<JobId, Task>) {
        let mut retired = Vec::new();
        for (job_id, supervisor) in &self.supervisors {
            if tasks.contains_key(job_id) {
                continue;
            }
            if supervisor.status() == Some(TaskState::Stopped) {
                debug!(job = %job_id, "closing stopped supervisor");
                supervisor.close();
                self.metrics.supervisor_action(SupervisorAction::Close);
                retired.push(job_id.clone());
            } else if !stop_underway(&**supervisor) {
                debug!(job = %job_id, "stopping undesired job");
                supervisor.stop();
                self.metrics.supervisor_action(SupervisorAction::Stop);
            }
        }
        for job_id in retired {
            self.supervisors.remove(&job_id);
        }
    }

    fn create(&mut self, job_id: &JobId, job: &Job) -> Option<Arc<dyn Supervisor>> {
        match self.factory.create(job_id, job) {
            Ok(supervisor) => {
                debug!(job = %job_id, "supervisor created");
                self.metrics.supervisor_action(SupervisorAction::Create);
                self.supervisors
                    .insert(job_id.clone(), Arc::clone(&supervisor));
                Some(supervisor)
            }
            Err(e) => {
                error!(job = %job_id, error = %e, "failed to create supervisor, job skipped");
                None
            }
        }
    }
}

/// Stopped, or stopping with no start in flight: another `stop()` would change nothing.
fn stop_underway(supervisor: &dyn Supervisor) -> bool {
    !supervisor.is_starting()
        && matches!(
            supervisor.status(),
            Some(TaskState::Stopping | TaskState::Stopped)
        )
}
