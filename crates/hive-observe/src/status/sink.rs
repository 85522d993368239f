use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use hive_core::StatusSink;
use hive_model::{JobId, TaskState, TaskStatus};

use super::view::log_transition;

/// [`StatusSink`] decorator logging every state change before forwarding it.
///
/// Repeated publications of the same state (e.g. a throttle flag flipping) are forwarded
/// without a log line.
pub struct LoggingSink<S> {
    inner: S,
    last: Mutex<HashMap<JobId, TaskState>>,
}

impl<S: StatusSink> LoggingSink<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            last: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: StatusSink> StatusSink for LoggingSink<S> {
    fn set_task_status(&self, job_id: &JobId, status: TaskStatus) {
        let previous = self
            .last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_id.clone(), status.state);
        if previous != Some(status.state) {
            log_transition(&status, previous);
        }
        self.inner.set_task_status(job_id, status);
    }

    fn remove_task_status(&self, job_id: &JobId) {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(job_id);
        self.inner.remove_task_status(job_id);
    }
}
