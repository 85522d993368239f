use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use hive_model::{Goal, Job, JobId, Task, TaskState, TaskStatus};

use super::{Agent, AgentConfig, SupervisorView};
use crate::{
    error::{CoreError, SupervisorError},
    metrics::{AgentMetrics, SupervisorAction},
    model::{AgentModel, ModelListener},
    reactor::{Callback, Reactor, ReactorFactory},
    state::TaskModel,
    supervisor::{Supervisor, SupervisorFactory},
};

#[derive(Default)]
struct FakeSupervisor {
    starts: AtomicUsize,
    stops: AtomicUsize,
    closes: AtomicUsize,
    starting: AtomicBool,
    status: Mutex<Option<TaskState>>,
}

impl FakeSupervisor {
    fn set_status(&self, state: TaskState) {
        *self.status.lock().unwrap() = Some(state);
    }

    fn set_starting(&self, starting: bool) {
        self.starting.store(starting, Ordering::SeqCst);
    }

    fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

impl Supervisor for FakeSupervisor {
    fn start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        let mut status = self.status.lock().unwrap();
        if *status != Some(TaskState::Stopped) {
            *status = Some(TaskState::Stopping);
        }
    }

    fn is_starting(&self) -> bool {
        self.starting.load(Ordering::SeqCst)
    }

    fn status(&self) -> Option<TaskState> {
        *self.status.lock().unwrap()
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct FakeFactory {
    created: Mutex<Vec<(JobId, Arc<FakeSupervisor>)>>,
    attempts: AtomicUsize,
    broken: Mutex<Vec<JobId>>,
}

impl FakeFactory {
    fn created(&self, job_id: &JobId) -> Vec<Arc<FakeSupervisor>> {
        self.created
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _)| id == job_id)
            .map(|(_, s)| Arc::clone(s))
            .collect()
    }

    /// The single supervisor created for `job_id`.
    fn only(&self, job_id: &JobId) -> Arc<FakeSupervisor> {
        let created = self.created(job_id);
        assert_eq!(created.len(), 1, "expected one supervisor for {job_id}");
        Arc::clone(&created[0])
    }

    fn break_job(&self, job_id: &JobId) {
        self.broken.lock().unwrap().push(job_id.clone());
    }
}

impl SupervisorFactory for FakeFactory {
    fn create(&self, job_id: &JobId, job: &Job) -> Result<Arc<dyn Supervisor>, SupervisorError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.broken.lock().unwrap().contains(job_id) {
            return Err(SupervisorError::IdMismatch {
                expected: job_id.to_string(),
                actual: job.id().to_string(),
            });
        }
        let supervisor = Arc::new(FakeSupervisor::default());
        self.created
            .lock()
            .unwrap()
            .push((job_id.clone(), Arc::clone(&supervisor)));
        Ok(supervisor)
    }
}

#[derive(Default)]
struct FakeReactor {
    started: AtomicBool,
    closed: AtomicBool,
    updates: AtomicUsize,
}

impl Reactor for FakeReactor {
    fn start(&self) {
        self.started.store(true, Ordering::SeqCst);
    }

    fn update(&self) {
        self.updates.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Hands out one [`FakeReactor`] and keeps the callback so tests can run passes by hand.
#[derive(Default)]
struct CapturingReactors {
    reactor: Arc<FakeReactor>,
    callback: Mutex<Option<Callback>>,
}

impl CapturingReactors {
    fn tick(&self) {
        let mut callback = self.callback.lock().unwrap();
        (callback.as_mut().expect("reactor was never created"))();
    }
}

impl ReactorFactory for CapturingReactors {
    fn create(&self, _name: &str, callback: Callback, _timeout: Duration) -> Arc<dyn Reactor> {
        *self.callback.lock().unwrap() = Some(callback);
        self.reactor.clone()
    }
}

struct UnavailableModel;

impl AgentModel for UnavailableModel {
    fn tasks(&self) -> Result<HashMap<JobId, Task>, CoreError> {
        Err(CoreError::ModelUnavailable("backend down".into()))
    }

    fn task_statuses(&self) -> Result<HashMap<JobId, TaskStatus>, CoreError> {
        Err(CoreError::ModelUnavailable("backend down".into()))
    }

    fn add_listener(&self, _listener: Arc<dyn ModelListener>) {}
}

#[derive(Default)]
struct RecordingMetrics {
    passes: AtomicUsize,
    skipped: AtomicUsize,
    actions: Mutex<Vec<SupervisorAction>>,
}

impl AgentMetrics for RecordingMetrics {
    fn pass_completed(&self, _duration: Duration, _live: usize) {
        self.passes.fetch_add(1, Ordering::SeqCst);
    }

    fn pass_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    fn supervisor_action(&self, action: SupervisorAction) {
        self.actions.lock().unwrap().push(action);
    }
}

struct Harness {
    model: TaskModel,
    factory: Arc<FakeFactory>,
    reactors: CapturingReactors,
    agent: Agent,
}

impl Harness {
    fn new() -> Self {
        Self::with_model(TaskModel::new())
    }

    fn with_model(model: TaskModel) -> Self {
        let factory = Arc::new(FakeFactory::default());
        let reactors = CapturingReactors::default();
        let agent = Agent::new(
            Arc::new(model.clone()),
            factory.clone(),
            &reactors,
            AgentConfig::default(),
        );
        Self {
            model,
            factory,
            reactors,
            agent,
        }
    }

    fn desire(&self, entries: &[(&Job, Goal)]) {
        self.model.set_tasks(
            entries
                .iter()
                .map(|(job, goal)| (job.id(), Task::new((*job).clone(), *goal)))
                .collect(),
        );
    }

    fn tick(&self) {
        self.reactors.tick();
    }
}

fn job(name: &str) -> Job {
    Job::builder(name, "1").image(format!("{name}:1")).build()
}

#[test]
fn start_subscribes_the_reactor_to_model_changes() {
    let h = Harness::new();
    h.agent.start();
    assert!(h.reactors.reactor.started.load(Ordering::SeqCst));

    h.desire(&[(&job("foo"), Goal::Start)]);
    assert!(h.reactors.reactor.updates.load(Ordering::SeqCst) >= 1);
}

#[test]
fn startup_recovery_stops_orphaned_job() {
    let bar = job("bar");
    let model = TaskModel::new();
    model.set_task_status(bar.id(), TaskStatus::new(bar.clone(), TaskState::Running));

    let h = Harness::with_model(model);
    h.agent.start();

    let supervisor = h.factory.only(&bar.id());
    assert_eq!(supervisor.stops(), 1);
    assert_eq!(supervisor.starts(), 0);
}

#[test]
fn startup_recovery_reuses_supervisor_for_desired_job() {
    let foo = job("foo");
    let model = TaskModel::new();
    model.set_task_status(foo.id(), TaskStatus::new(foo.clone(), TaskState::Running));

    let h = Harness::with_model(model);
    h.desire(&[(&foo, Goal::Start)]);
    h.agent.start();

    // One supervisor: recovered, then asked to start (it adopts the running container).
    let supervisor = h.factory.only(&foo.id());
    assert_eq!(supervisor.starts(), 1);
    assert_eq!(supervisor.stops(), 0);
}

#[test]
fn recovered_state_converges_without_repeated_actions() {
    let (foo, bar) = (job("foo"), job("bar"));
    let model = TaskModel::new();
    model.set_task_status(foo.id(), TaskStatus::new(foo.clone(), TaskState::Creating));
    model.set_task_status(bar.id(), TaskStatus::new(bar.clone(), TaskState::Running));

    let h = Harness::with_model(model);
    h.desire(&[(&foo, Goal::Start), (&bar, Goal::Stop)]);
    h.agent.start();

    let (foo_sup, bar_sup) = (h.factory.only(&foo.id()), h.factory.only(&bar.id()));
    foo_sup.set_starting(true);
    h.tick();

    assert_eq!(foo_sup.starts(), 1);
    assert_eq!(bar_sup.stops(), 1);
    assert_eq!(bar_sup.status(), Some(TaskState::Stopping));
}

#[test]
fn stop_is_repeated_once_a_start_races_ahead() {
    let bar = job("bar");
    let h = Harness::new();
    h.desire(&[(&bar, Goal::Stop)]);
    h.agent.start();
    let supervisor = h.factory.only(&bar.id());
    assert_eq!(supervisor.stops(), 1);

    h.tick();
    assert_eq!(supervisor.stops(), 1);

    supervisor.set_starting(true);
    h.tick();
    assert_eq!(supervisor.stops(), 2);
}

#[test]
fn start_is_not_repeated_while_starting_or_running() {
    let foo = job("foo");
    let h = Harness::new();
    h.desire(&[(&foo, Goal::Start)]);
    h.agent.start();

    let supervisor = h.factory.only(&foo.id());
    assert_eq!(supervisor.starts(), 1);

    supervisor.set_starting(true);
    h.tick();
    h.tick();
    assert_eq!(supervisor.starts(), 1);

    supervisor.set_starting(false);
    supervisor.set_status(TaskState::Running);
    h.tick();
    assert_eq!(supervisor.starts(), 1);

    // The container died: the next pass retries.
    supervisor.set_status(TaskState::Exited);
    h.tick();
    assert_eq!(supervisor.starts(), 2);
}

#[test]
fn removed_job_is_stopped_then_closed() {
    let foo = job("foo");
    let h = Harness::new();
    h.desire(&[(&foo, Goal::Start)]);
    h.agent.start();
    let supervisor = h.factory.only(&foo.id());
    assert_eq!(supervisor.starts(), 1);

    h.desire(&[]);
    h.tick();
    assert_eq!(supervisor.stops(), 1);
    assert_eq!(supervisor.closes(), 0);
    assert_eq!(h.agent.snapshot().len(), 1);

    // Still stopping: left alone.
    h.tick();
    assert_eq!(supervisor.stops(), 1);

    supervisor.set_status(TaskState::Stopped);
    h.tick();
    assert_eq!(supervisor.closes(), 1);
    assert!(h.agent.snapshot().is_empty());

    // Gone for good: later passes leave it alone.
    h.tick();
    assert_eq!(supervisor.stops(), 1);
    assert_eq!(supervisor.closes(), 1);
}

#[test]
fn readded_job_gets_a_new_supervisor() {
    let bar = job("bar");
    let h = Harness::new();
    h.desire(&[(&bar, Goal::Start)]);
    h.agent.start();
    let first = h.factory.only(&bar.id());

    h.desire(&[]);
    h.tick();
    first.set_status(TaskState::Stopped);
    h.tick();
    assert_eq!(first.closes(), 1);

    h.desire(&[(&bar, Goal::Start)]);
    h.tick();

    let created = h.factory.created(&bar.id());
    assert_eq!(created.len(), 2);
    assert_eq!(created[1].starts(), 1);
    assert_eq!(first.starts(), 1);
}

#[test]
fn close_releases_supervisors_without_stopping_them() {
    let foo = job("foo");
    let h = Harness::new();
    h.desire(&[(&foo, Goal::Start)]);
    h.agent.start();
    let supervisor = h.factory.only(&foo.id());
    supervisor.set_status(TaskState::Running);

    h.agent.close();

    assert_eq!(supervisor.closes(), 1);
    assert_eq!(supervisor.stops(), 0);
    assert!(h.reactors.reactor.closed.load(Ordering::SeqCst));
    assert!(h.agent.snapshot().is_empty());

    // A callback that was already scheduled does nothing.
    h.tick();
    assert_eq!(h.factory.created(&foo.id()).len(), 1);
    assert_eq!(supervisor.stops(), 0);
}

#[test]
fn start_and_stop_goals_converge_then_stay_quiet() {
    let (foo, bar) = (job("foo"), job("bar"));
    let h = Harness::new();
    h.desire(&[(&foo, Goal::Start), (&bar, Goal::Stop)]);

    h.agent.start();
    let (foo_sup, bar_sup) = (h.factory.only(&foo.id()), h.factory.only(&bar.id()));
    assert_eq!((foo_sup.starts(), foo_sup.stops()), (1, 0));
    assert_eq!((bar_sup.starts(), bar_sup.stops()), (0, 1));

    foo_sup.set_status(TaskState::Running);
    bar_sup.set_status(TaskState::Stopped);
    h.tick();

    assert_eq!((foo_sup.starts(), foo_sup.stops()), (1, 0));
    assert_eq!((bar_sup.starts(), bar_sup.stops()), (0, 1));
    assert_eq!(
        h.agent.snapshot(),
        {
            let mut expected = vec![
                SupervisorView {
                    job_id: foo.id(),
                    state: Some(TaskState::Running),
                    starting: false,
                },
                SupervisorView {
                    job_id: bar.id(),
                    state: Some(TaskState::Stopped),
                    starting: false,
                },
            ];
            expected.sort_by(|a, b| a.job_id.cmp(&b.job_id));
            expected
        }
    );
}

#[test]
fn stop_goal_interrupts_a_start_in_flight() {
    let foo = job("foo");
    let h = Harness::new();
    h.desire(&[(&foo, Goal::Start)]);
    h.agent.start();
    let supervisor = h.factory.only(&foo.id());

    supervisor.set_starting(true);
    supervisor.set_status(TaskState::Stopped);
    h.desire(&[(&foo, Goal::Stop)]);
    h.tick();
    assert_eq!(supervisor.stops(), 1);

    supervisor.set_starting(false);
    h.tick();
    assert_eq!(supervisor.stops(), 1);
}

#[test]
fn factory_failure_skips_only_that_job() {
    let (foo, bar) = (job("foo"), job("bar"));
    let h = Harness::new();
    h.factory.break_job(&foo.id());
    h.desire(&[(&foo, Goal::Start), (&bar, Goal::Start)]);

    h.agent.start();
    assert!(h.factory.created(&foo.id()).is_empty());
    assert_eq!(h.factory.only(&bar.id()).starts(), 1);

    // Retried on the next pass.
    let attempts = h.factory.attempts.load(Ordering::SeqCst);
    h.tick();
    assert_eq!(h.factory.attempts.load(Ordering::SeqCst), attempts + 1);
    assert_eq!(h.agent.snapshot().len(), 1);
}

#[test]
fn unreadable_model_skips_the_pass() {
    let factory = Arc::new(FakeFactory::default());
    let reactors = CapturingReactors::default();
    let metrics = Arc::new(RecordingMetrics::default());
    let agent = Agent::new(
        Arc::new(UnavailableModel),
        factory.clone(),
        &reactors,
        AgentConfig::default(),
    )
    .with_metrics(metrics.clone());

    agent.start();
    reactors.tick();

    assert_eq!(metrics.skipped.load(Ordering::SeqCst), 2);
    assert_eq!(metrics.passes.load(Ordering::SeqCst), 0);
    assert_eq!(factory.attempts.load(Ordering::SeqCst), 0);
    assert!(reactors.reactor.started.load(Ordering::SeqCst));
}

#[test]
fn metrics_record_supervisor_actions() {
    let foo = job("foo");
    let metrics = Arc::new(RecordingMetrics::default());
    let factory = Arc::new(FakeFactory::default());
    let reactors = CapturingReactors::default();
    let model = TaskModel::new();
    let agent = Agent::new(
        Arc::new(model.clone()),
        factory.clone(),
        &reactors,
        AgentConfig::default(),
    )
    .with_metrics(metrics.clone());
    model.set_tasks(HashMap::from([(foo.id(), Task::new(foo.clone(), Goal::Start))]));

    agent.start();
    agent.close();

    assert_eq!(
        *metrics.actions.lock().unwrap(),
        vec![
            SupervisorAction::Create,
            SupervisorAction::Start,
            SupervisorAction::Close
        ]
    );
    assert_eq!(metrics.passes.load(Ordering::SeqCst), 1);
}
