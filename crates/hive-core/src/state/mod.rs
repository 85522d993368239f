mod file;
mod writer;

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, PoisonError, RwLock},
};

use hive_model::{JobId, Task, TaskState, TaskStatus};
use tracing::{debug, trace};

use crate::{
    error::CoreError,
    model::{AgentModel, ModelListener, StatusSink},
};
use file::StatusFile;
use writer::StatusWriter;

/// In-memory agent model: desired tasks plus last-known statuses.
///
/// Statuses can be backed by a JSON state file so that a restarted daemon recovers the
/// containers left behind by its predecessor. The file is written by a dedicated thread, so
/// status updates never wait on disk.
#[derive(Clone)]
pub struct TaskModel {
    inner: Arc<RwLock<TaskModelInner>>,
    listeners: Arc<RwLock<Vec<Arc<dyn ModelListener>>>>,
    writer: Option<Arc<StatusWriter>>,
}

struct TaskModelInner {
    /// Desired tasks indexed by JobId.
    tasks: HashMap<JobId, Task>,
    /// Last observed status per JobId.
    statuses: HashMap<JobId, TaskStatus>,
    /// Bumped on every status change.
    version: u64,
}

impl TaskModel {
    /// Create an empty, memory-only model.
    pub fn new() -> Self {
        Self::with_state(HashMap::new(), None)
    }

    /// Open a model whose statuses live in `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, CoreError> {
        let file = StatusFile::new(path);
        let statuses = file.load()?;
        debug!(path = %file.path().display(), count = statuses.len(), "task statuses loaded");
        let writer = StatusWriter::spawn(file)?;
        Ok(Self::with_state(statuses, Some(Arc::new(writer))))
    }

    fn with_state(
        statuses: HashMap<JobId, TaskStatus>,
        writer: Option<Arc<StatusWriter>>,
    ) -> Self {
        Self {
            inner: Arc::new(RwLock::new(TaskModelInner {
                tasks: HashMap::new(),
                statuses,
                version: 0,
            })),
            listeners: Arc::new(RwLock::new(Vec::new())),
            writer,
        }
    }

    /// Path of the backing state file, if any.
    pub fn state_path(&self) -> Option<PathBuf> {
        self.writer.as_ref().map(|w| w.path().to_path_buf())
    }

    /// Block until every status recorded so far is on disk. No-op for memory-only models.
    ///
    /// Must not be called from an async context.
    pub fn sync(&self) {
        if let Some(writer) = &self.writer {
            writer.sync();
        }
    }

    /// Replace the desired task set. Listeners are notified only if it changed.
    pub fn set_tasks(&self, tasks: HashMap<JobId, Task>) {
        {
            let mut inner = self.write();
            if inner.tasks == tasks {
                trace!("desired tasks unchanged");
                return;
            }
            debug!(count = tasks.len(), "desired tasks updated");
            inner.tasks = tasks;
        }
        self.notify();
    }

    /// Record an observed status and notify listeners.
    pub fn set_task_status(&self, job_id: JobId, status: TaskStatus) {
        let persisted = {
            let mut inner = self.write();
            inner.statuses.insert(job_id, status);
            inner.version += 1;
            self.persisted(&inner)
        };
        self.flush(persisted);
        self.notify();
    }

    /// Forget the status of a job and notify listeners.
    pub fn remove_task_status(&self, job_id: &JobId) {
        let persisted = {
            let mut inner = self.write();
            if inner.statuses.remove(job_id).is_none() {
                return;
            }
            inner.version += 1;
            self.persisted(&inner)
        };
        self.flush(persisted);
        self.notify();
    }

    /// Get the status of a single job.
    pub fn task_status(&self, job_id: &JobId) -> Option<TaskStatus> {
        self.read().statuses.get(job_id).cloned()
    }

    /// Copy of every known status.
    pub fn status_snapshot(&self) -> Vec<TaskStatus> {
        self.read().statuses.values().cloned().collect()
    }

    /// Copy of the statuses in a given state.
    pub fn statuses_in(&self, state: TaskState) -> Vec<TaskStatus> {
        self.read()
            .statuses
            .values()
            .filter(|s| s.state == state)
            .cloned()
            .collect()
    }

    /// Copy of the desired task set.
    pub fn task_snapshot(&self) -> HashMap<JobId, Task> {
        self.read().tasks.clone()
    }

    fn notify(&self) {
        // Listeners run outside every lock: they may call back into the model.
        let listeners: Vec<_> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener.tasks_changed();
        }
    }

    /// Snapshot to hand to the writer; `None` for memory-only models.
    fn persisted(&self, inner: &TaskModelInner) -> Option<(u64, HashMap<JobId, TaskStatus>)> {
        self.writer
            .as_ref()
            .map(|_| (inner.version, inner.statuses.clone()))
    }

    fn flush(&self, persisted: Option<(u64, HashMap<JobId, TaskStatus>)>) {
        // Snapshots may be queued out of order; the writer keeps the highest version.
        if let (Some(writer), Some((version, statuses))) = (&self.writer, persisted) {
            writer.store(version, statuses);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, TaskModelInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, TaskModelInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for TaskModel {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentModel for TaskModel {
    fn tasks(&self) -> Result<HashMap<JobId, Task>, CoreError> {
        Ok(self.task_snapshot())
    }

    fn task_statuses(&self) -> Result<HashMap<JobId, TaskStatus>, CoreError> {
        Ok(self.read().statuses.clone())
    }

    fn add_listener(&self, listener: Arc<dyn ModelListener>) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }
}

impl StatusSink for TaskModel {
    fn set_task_status(&self, job_id: &JobId, status: TaskStatus) {
        TaskModel::set_task_status(self, job_id.clone(), status);
    }

    fn remove_task_status(&self, job_id: &JobId) {
        TaskModel::remove_task_status(self, job_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_model::{Goal, Job};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingListener(AtomicUsize);

    impl ModelListener for CountingListener {
        fn tasks_changed(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn job(name: &str) -> Job {
        Job::builder(name, "1").image(format!("{name}:1")).build()
    }

    fn tasks(entries: &[(&Job, Goal)]) -> HashMap<JobId, Task> {
        entries
            .iter()
            .map(|(job, goal)| (job.id(), Task::new((*job).clone(), *goal)))
            .collect()
    }

    #[test]
    fn set_tasks_notifies_only_on_change() {
        let model = TaskModel::new();
        let listener = Arc::new(CountingListener::default());
        model.add_listener(listener.clone());

        let foo = job("foo");
        model.set_tasks(tasks(&[(&foo, Goal::Start)]));
        model.set_tasks(tasks(&[(&foo, Goal::Start)]));
        assert_eq!(listener.0.load(Ordering::SeqCst), 1);

        model.set_tasks(tasks(&[(&foo, Goal::Stop)]));
        assert_eq!(listener.0.load(Ordering::SeqCst), 2);
        assert_eq!(model.tasks().unwrap()[&foo.id()].goal(), Goal::Stop);
    }

    #[test]
    fn status_changes_notify_listeners() {
        let model = TaskModel::new();
        let listener = Arc::new(CountingListener::default());
        model.add_listener(listener.clone());

        let foo = job("foo");
        model.set_task_status(foo.id(), TaskStatus::new(foo.clone(), TaskState::Creating));
        model.set_task_status(foo.id(), TaskStatus::new(foo.clone(), TaskState::Running));
        assert_eq!(listener.0.load(Ordering::SeqCst), 2);
        assert_eq!(model.task_status(&foo.id()).unwrap().state, TaskState::Running);

        model.remove_task_status(&foo.id());
        assert_eq!(listener.0.load(Ordering::SeqCst), 3);
        assert!(model.task_statuses().unwrap().is_empty());

        // Removing an unknown job is silent.
        model.remove_task_status(&foo.id());
        assert_eq!(listener.0.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn snapshots_are_copies() {
        let model = TaskModel::new();
        let foo = job("foo");
        model.set_tasks(tasks(&[(&foo, Goal::Start)]));

        let snapshot = model.tasks().unwrap();
        model.set_tasks(HashMap::new());

        assert_eq!(snapshot.len(), 1);
        assert!(model.tasks().unwrap().is_empty());
    }

    #[test]
    fn statuses_in_filters_by_state() {
        let model = TaskModel::new();
        let (foo, bar) = (job("foo"), job("bar"));
        model.set_task_status(foo.id(), TaskStatus::new(foo.clone(), TaskState::Running));
        model.set_task_status(bar.id(), TaskStatus::new(bar.clone(), TaskState::Stopped));

        let running = model.statuses_in(TaskState::Running);
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].job, foo);
        assert_eq!(model.status_snapshot().len(), 2);
    }

    #[test]
    fn statuses_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task-statuses.json");
        let bar = job("bar");

        {
            let model = TaskModel::open(&path).unwrap();
            model.set_task_status(
                bar.id(),
                TaskStatus::new(bar.clone(), TaskState::Running).with_container("bar-1"),
            );
            // Desired tasks are not persisted.
            model.set_tasks(tasks(&[(&bar, Goal::Start)]));
        }

        // The last clone going away drains the writer.
        let reopened = TaskModel::open(&path).unwrap();
        assert_eq!(reopened.state_path().as_deref(), Some(path.as_path()));
        let statuses = reopened.task_statuses().unwrap();
        assert_eq!(statuses[&bar.id()].container_id.as_deref(), Some("bar-1"));
        assert!(reopened.tasks().unwrap().is_empty());
    }

    #[test]
    fn status_updates_are_persisted_off_the_caller() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("task-statuses.json");
        let model = TaskModel::open(&path).unwrap();
        let (foo, bar) = (job("foo"), job("bar"));

        for state in [TaskState::Creating, TaskState::Starting, TaskState::Running] {
            model.set_task_status(foo.id(), TaskStatus::new(foo.clone(), state));
        }
        model.set_task_status(bar.id(), TaskStatus::new(bar.clone(), TaskState::Stopped));
        model.remove_task_status(&bar.id());
        model.sync();

        let on_disk = StatusFile::new(&path).load().unwrap();
        assert_eq!(on_disk.len(), 1);
        assert_eq!(on_disk[&foo.id()].state, TaskState::Running);
    }

    #[test]
    fn memory_only_model_has_no_state_file() {
        let model = TaskModel::new();
        let foo = job("foo");
        model.set_task_status(foo.id(), TaskStatus::new(foo.clone(), TaskState::Running));
        model.sync();
        assert!(model.state_path().is_none());
    }
}
