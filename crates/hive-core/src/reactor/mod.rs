//! Debounced single-consumer scheduler.
//!
//! `update()` requests a run of the callback; requests arriving before the callback runs
//! coalesce into one run. Without requests the callback still runs once per timeout.

use std::{
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{runtime::Handle, sync::Notify, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument, trace};

use crate::error::CoreError;

/// Zero-argument action run by a reactor.
pub type Callback = Box<dyn FnMut() + Send + 'static>;

pub trait Reactor: Send + Sync {
    /// Begin scheduling. Calls before `start` are remembered.
    fn start(&self);

    /// Request a run "soon". Non-blocking, callable from any context.
    fn update(&self);

    /// Stop future scheduling. Does not wait for a callback that is already running.
    fn close(&self);
}

pub trait ReactorFactory: Send + Sync {
    fn create(&self, name: &str, callback: Callback, timeout: Duration) -> Arc<dyn Reactor>;
}

/// Reactor running its callback on one tokio task.
pub struct TokioReactor {
    name: String,
    timeout: Duration,
    handle: Handle,
    wake: Arc<Wake>,
    cancel: CancellationToken,
    callback: Mutex<Option<Callback>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TokioReactor {
    pub fn new(name: impl Into<String>, callback: Callback, timeout: Duration, handle: Handle) -> Self {
        Self {
            name: name.into(),
            timeout,
            handle,
            wake: Arc::new(Wake::default()),
            cancel: CancellationToken::new(),
            callback: Mutex::new(Some(callback)),
            task: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Reactor for TokioReactor {
    #[instrument(level = "debug", skip(self), fields(reactor = %self.name))]
    fn start(&self) {
        let Some(callback) = self
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            debug!("reactor already started");
            return;
        };
        if self.cancel.is_cancelled() {
            debug!("reactor closed before start");
            return;
        }

        let task = self.handle.spawn(run(
            self.name.clone(),
            callback,
            self.timeout,
            Arc::clone(&self.wake),
            self.cancel.clone(),
        ));
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        debug!(timeout_ms = self.timeout.as_millis() as u64, "reactor started");
    }

    fn update(&self) {
        self.wake.request();
    }

    fn close(&self) {
        self.cancel.cancel();
        self.callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        // Dropping the handle detaches the task; it exits at its next cancellation check.
        self.task.lock().unwrap_or_else(PoisonError::into_inner).take();
        debug!(reactor = %self.name, "reactor closed");
    }
}

impl Drop for TokioReactor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Pending flag plus wake signal: a queue of depth one.
#[derive(Default)]
struct Wake {
    pending: AtomicBool,
    notify: Notify,
}

impl Wake {
    fn request(&self) {
        if !self.pending.swap(true, Ordering::AcqRel) {
            self.notify.notify_one();
        }
    }

    /// Clear the flag before running, so requests made during the run schedule another one.
    fn take(&self) {
        self.pending.store(false, Ordering::Release);
    }
}

async fn run(
    name: String,
    mut callback: Callback,
    timeout: Duration,
    wake: Arc<Wake>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = wake.notify.notified() => trace!(reactor = %name, "update"),
            _ = tokio::time::sleep(timeout) => trace!(reactor = %name, "timeout"),
        }
        if cancel.is_cancelled() {
            break;
        }
        wake.take();
        if catch_unwind(AssertUnwindSafe(&mut callback)).is_err() {
            error!(reactor = %name, "reactor callback panicked");
        }
        // Let other tasks (and a pending close) make progress between runs.
        tokio::task::yield_now().await;
    }
    debug!(reactor = %name, "reactor loop exited");
}

/// Creates [`TokioReactor`]s on a fixed runtime handle.
#[derive(Clone)]
pub struct TokioReactorFactory {
    handle: Handle,
}

impl TokioReactorFactory {
    pub fn new(handle: Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running in.
    pub fn current() -> Result<Self, CoreError> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| CoreError::NoRuntime(e.to_string()))
    }
}

impl ReactorFactory for TokioReactorFactory {
    fn create(&self, name: &str, callback: Callback, timeout: Duration) -> Arc<dyn Reactor> {
        Arc::new(TokioReactor::new(name, callback, timeout, self.handle.clone()))
    }
}
