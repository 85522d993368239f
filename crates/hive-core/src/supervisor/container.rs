use std::{
    future::Future,
    mem,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use hive_model::{Job, JobId, TaskState, TaskStatus, ThrottleState};
use tokio::{runtime::Handle, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use super::{Supervisor, SupervisorConfig, SupervisorFactory};
use crate::{
    error::{RuntimeError, SupervisorError},
    model::StatusSink,
    runtime::ContainerRuntime,
};

/// [`Supervisor`] driving one job's container through a [`ContainerRuntime`].
///
/// Start and stop run as background sequences on the captured runtime handle. Each call
/// supersedes the previous sequence: only the latest one may change state, so a stop issued
/// mid-start wins even if the start is still waiting on the runtime.
pub struct ContainerSupervisor {
    shared: Arc<Shared>,
}

struct Shared {
    job_id: JobId,
    job: Job,
    runtime: Arc<dyn ContainerRuntime>,
    sink: Arc<dyn StatusSink>,
    config: SupervisorConfig,
    handle: Handle,
    /// Parent of every sequence token; cancelled by `close`.
    closed: CancellationToken,
    /// Held while publishing so the sink sees transitions in order.
    publish: Mutex<()>,
    inner: Mutex<Inner>,
}

struct Inner {
    state: Option<TaskState>,
    container_id: Option<String>,
    throttled: ThrottleState,
    starting: bool,
    /// Consecutive failed or short-lived runs.
    failures: u32,
    /// Token of the sequence currently allowed to change state.
    op: CancellationToken,
}

impl Inner {
    fn replace_op(&mut self, parent: &CancellationToken) -> CancellationToken {
        self.op.cancel();
        self.op = parent.child_token();
        self.op.clone()
    }
}

impl ContainerSupervisor {
    pub fn new(
        job_id: JobId,
        job: Job,
        runtime: Arc<dyn ContainerRuntime>,
        sink: Arc<dyn StatusSink>,
        config: SupervisorConfig,
        handle: Handle,
    ) -> Self {
        let closed = CancellationToken::new();
        let op = closed.child_token();
        Self {
            shared: Arc::new(Shared {
                job_id,
                job,
                runtime,
                sink,
                config,
                handle,
                closed,
                publish: Mutex::new(()),
                inner: Mutex::new(Inner {
                    state: None,
                    container_id: None,
                    throttled: ThrottleState::No,
                    starting: false,
                    failures: 0,
                    op,
                }),
            }),
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.shared.job_id
    }
}

impl Supervisor for ContainerSupervisor {
    #[instrument(level = "debug", skip(self), fields(job = %self.shared.job_id))]
    fn start(&self) {
        let op = {
            let mut inner = self.shared.lock();
            if self.shared.closed.is_cancelled() {
                debug!("supervisor closed, start ignored");
                return;
            }
            if inner.starting || inner.state == Some(TaskState::Running) {
                trace!("already starting or running");
                return;
            }
            inner.starting = true;
            inner.replace_op(&self.shared.closed)
        };
        self.shared
            .handle
            .spawn(Arc::clone(&self.shared).run_start(op));
    }

    #[instrument(level = "debug", skip(self), fields(job = %self.shared.job_id))]
    fn stop(&self) {
        let op = {
            let mut inner = self.shared.lock();
            if self.shared.closed.is_cancelled() {
                debug!("supervisor closed, stop ignored");
                return;
            }
            let was_starting = mem::replace(&mut inner.starting, false);
            if !was_starting
                && matches!(inner.state, Some(TaskState::Stopping | TaskState::Stopped))
            {
                trace!("already stopping or stopped");
                return;
            }
            inner.replace_op(&self.shared.closed)
        };
        self.shared
            .handle
            .spawn(Arc::clone(&self.shared).run_stop(op));
    }

    fn is_starting(&self) -> bool {
        self.shared.lock().starting
    }

    fn status(&self) -> Option<TaskState> {
        self.shared.lock().state
    }

    #[instrument(level = "debug", skip(self), fields(job = %self.shared.job_id))]
    fn close(&self) {
        let _publish = self
            .shared
            .publish
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let forget = {
            let mut inner = self.shared.lock();
            if self.shared.closed.is_cancelled() {
                return;
            }
            self.shared.closed.cancel();
            inner.starting = false;
            inner.state == Some(TaskState::Stopped)
        };
        // Nothing left to recover for a stopped job.
        if forget {
            self.shared.sink.remove_task_status(&self.shared.job_id);
        }
        debug!(forget, "supervisor closed");
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply `change` on behalf of `op` and publish the result.
    /// Returns `false` once `op` has been superseded or the supervisor closed.
    fn update(&self, op: &CancellationToken, change: impl FnOnce(&mut Inner)) -> bool {
        let _publish = self.publish.lock().unwrap_or_else(PoisonError::into_inner);
        let status = {
            let mut inner = self.lock();
            if op.is_cancelled() {
                return false;
            }
            change(&mut inner);
            inner.state.map(|state| {
                let status =
                    TaskStatus::new(self.job.clone(), state).with_throttled(inner.throttled);
                match &inner.container_id {
                    Some(id) => status.with_container(id.clone()),
                    None => status,
                }
            })
        };
        if let Some(status) = status {
            self.sink.set_task_status(&self.job_id, status);
        }
        true
    }

    fn fail(&self, op: &CancellationToken, error: RuntimeError) {
        let throttled = match &error {
            RuntimeError::ImageNotFound(_) => ThrottleState::ImageMissing,
            RuntimeError::ImagePull(_) => ThrottleState::ImagePullFailed,
            _ => ThrottleState::No,
        };
        let applied = self.update(op, |inner| {
            inner.state = Some(TaskState::Failed);
            inner.starting = false;
            inner.throttled = throttled;
            inner.failures = inner.failures.saturating_add(1);
        });
        if applied {
            warn!(job = %self.job_id, runtime = self.runtime.name(), error = %error, "task failed");
        }
    }

    /// Await a runtime call for `op`. `None` ends the sequence: it was superseded or it failed.
    async fn call<T>(
        &self,
        op: &CancellationToken,
        fut: impl Future<Output = Result<T, RuntimeError>>,
    ) -> Option<T> {
        match op.run_until_cancelled(fut).await? {
            Ok(value) => Some(value),
            Err(e) => {
                self.fail(op, e);
                None
            }
        }
    }

    async fn run_start(self: Arc<Self>, op: CancellationToken) {
        let delay = {
            let inner = self.lock();
            self.config.restart_backoff.delay(inner.failures)
        };
        if !delay.is_zero() {
            debug!(job = %self.job_id, delay_ms = delay.as_millis() as u64, "delaying restart");
            if !self.update(&op, |inner| inner.throttled = ThrottleState::Flapping) {
                return;
            }
            if op
                .run_until_cancelled(tokio::time::sleep(delay))
                .await
                .is_none()
            {
                return;
            }
        }

        let Some(found) = self.call(&op, self.runtime.find(&self.job_id)).await else {
            return;
        };
        match found {
            Some(container) if container.running => {
                info!(job = %self.job_id, container = %container.id, "adopting running container");
                let id = container.id.clone();
                let adopted = self.update(&op, |inner| {
                    inner.state = Some(TaskState::Running);
                    inner.container_id = Some(container.id);
                    inner.starting = false;
                    inner.throttled = ThrottleState::No;
                });
                if adopted {
                    self.monitor(&op, id).await;
                }
                return;
            }
            Some(stale) => {
                debug!(job = %self.job_id, container = %stale.id, "removing exited container");
                match op.run_until_cancelled(self.runtime.remove(&stale.id)).await {
                    None => return,
                    Some(Err(e)) => {
                        warn!(job = %self.job_id, container = %stale.id, error = %e, "failed to remove exited container");
                    }
                    Some(Ok(())) => {}
                }
            }
            None => {}
        }

        let pulling = self.update(&op, |inner| {
            inner.state = Some(TaskState::PullingImage);
            inner.container_id = None;
            inner.throttled = ThrottleState::No;
        });
        if !pulling {
            return;
        }
        let Some(()) = self.call(&op, self.runtime.pull(&self.job.image)).await else {
            return;
        };

        if !self.update(&op, |inner| inner.state = Some(TaskState::Creating)) {
            return;
        }
        let Some(id) = self
            .call(&op, self.runtime.create(&self.job_id, &self.job))
            .await
        else {
            return;
        };

        let starting = self.update(&op, |inner| {
            inner.state = Some(TaskState::Starting);
            inner.container_id = Some(id.clone());
        });
        if !starting {
            return;
        }
        let Some(()) = self.call(&op, self.runtime.start(&id)).await else {
            return;
        };

        let running = self.update(&op, |inner| {
            inner.state = Some(TaskState::Running);
            inner.starting = false;
        });
        if running {
            info!(job = %self.job_id, container = %id, "task running");
            self.monitor(&op, id).await;
        }
    }

    async fn monitor(&self, op: &CancellationToken, container_id: String) {
        let started = Instant::now();
        let Some(code) = self.call(op, self.runtime.wait(&container_id)).await else {
            return;
        };
        let short = started.elapsed() < self.config.flap_window;
        let exited = self.update(op, |inner| {
            inner.state = Some(TaskState::Exited);
            inner.failures = if short {
                inner.failures.saturating_add(1)
            } else {
                0
            };
        });
        if exited {
            warn!(job = %self.job_id, container = %container_id, exit_code = code, short, "container exited");
        }
    }

    async fn run_stop(self: Arc<Self>, op: CancellationToken) {
        let stopping = self.update(&op, |inner| {
            inner.state = Some(TaskState::Stopping);
            inner.throttled = ThrottleState::No;
        });
        if !stopping {
            return;
        }

        // The label lookup also covers containers left behind by a previous daemon.
        let Some(found) = self.call(&op, self.runtime.find(&self.job_id)).await else {
            return;
        };
        let target = found.filter(|c| c.running).map(|c| c.id);
        if let Some(id) = &target {
            let Some(()) = self
                .call(&op, self.runtime.stop(id, self.config.stop_grace))
                .await
            else {
                return;
            };
        }

        let stopped = self.update(&op, |inner| {
            inner.state = Some(TaskState::Stopped);
            inner.failures = 0;
            if target.is_some() {
                inner.container_id = target.clone();
            }
        });
        if stopped {
            info!(job = %self.job_id, container = ?target, "task stopped");
        }
    }
}

/// Builds [`ContainerSupervisor`]s sharing one runtime, sink and configuration.
#[derive(Clone)]
pub struct ContainerSupervisorFactory {
    runtime: Arc<dyn ContainerRuntime>,
    sink: Arc<dyn StatusSink>,
    config: SupervisorConfig,
    handle: Handle,
}

impl ContainerSupervisorFactory {
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        sink: Arc<dyn StatusSink>,
        config: SupervisorConfig,
        handle: Handle,
    ) -> Self {
        Self {
            runtime,
            sink,
            config,
            handle,
        }
    }
}

impl SupervisorFactory for ContainerSupervisorFactory {
    fn create(&self, job_id: &JobId, job: &Job) -> Result<Arc<dyn Supervisor>, SupervisorError> {
        job.validate().map_err(|source| SupervisorError::InvalidJob {
            job: job_id.to_string(),
            source,
        })?;
        if job_id.name() != job.name || job_id.version() != job.version {
            return Err(SupervisorError::IdMismatch {
                expected: job_id.to_string(),
                actual: job.id().to_string(),
            });
        }
        Ok(Arc::new(ContainerSupervisor::new(
            job_id.clone(),
            job.clone(),
            Arc::clone(&self.runtime),
            Arc::clone(&self.sink),
            self.config.clone(),
            self.handle.clone(),
        )))
    }
}
