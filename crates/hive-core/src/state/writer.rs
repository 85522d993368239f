use std::{
    collections::HashMap,
    path::Path,
    sync::mpsc::{self, Receiver, Sender, TryRecvError},
    thread::{self, JoinHandle},
};

use hive_model::{JobId, TaskStatus};
use tracing::{debug, trace, warn};

use super::file::StatusFile;
use crate::error::CoreError;

enum WriteCommand {
    Store {
        version: u64,
        statuses: HashMap<JobId, TaskStatus>,
    },
    Sync(Sender<()>),
    Shutdown,
}

/// Dedicated thread that owns the status file.
///
/// Snapshots are queued without blocking the caller. When several are pending only the
/// one with the highest version is written.
pub(super) struct StatusWriter {
    tx: Sender<WriteCommand>,
    file: StatusFile,
    handle: Option<JoinHandle<()>>,
}

impl StatusWriter {
    pub(super) fn spawn(file: StatusFile) -> Result<Self, CoreError> {
        let (tx, rx) = mpsc::channel();
        let worker = file.clone();
        let handle = thread::Builder::new()
            .name("hive-state-writer".into())
            .spawn(move || process(&worker, rx))
            .map_err(|e| CoreError::State {
                path: file.path().to_path_buf(),
                reason: format!("failed to spawn writer thread: {e}"),
            })?;

        Ok(Self {
            tx,
            file,
            handle: Some(handle),
        })
    }

    pub(super) fn path(&self) -> &Path {
        self.file.path()
    }

    pub(super) fn store(&self, version: u64, statuses: HashMap<JobId, TaskStatus>) {
        if self.tx.send(WriteCommand::Store { version, statuses }).is_err() {
            warn!(path = %self.path().display(), "state writer is gone, status not persisted");
        }
    }

    /// Block until every snapshot queued before this call has been handled.
    pub(super) fn sync(&self) {
        let (done_tx, done_rx) = mpsc::channel();
        if self.tx.send(WriteCommand::Sync(done_tx)).is_ok() {
            let _ = done_rx.recv();
        }
    }
}

impl Drop for StatusWriter {
    fn drop(&mut self) {
        let _ = self.tx.send(WriteCommand::Shutdown);
        if let Some(handle) = self.handle.take()
            && let Err(e) = handle.join()
        {
            warn!("state writer thread panicked: {:?}", e);
        }
    }
}

fn process(file: &StatusFile, rx: Receiver<WriteCommand>) {
    let mut written = 0u64;
    let mut latest: Option<(u64, HashMap<JobId, TaskStatus>)> = None;
    let mut waiters = Vec::new();

    while let Ok(first) = rx.recv() {
        let mut shutdown = false;
        let mut next = Some(first);
        while let Some(cmd) = next.take() {
            match cmd {
                WriteCommand::Store { version, statuses } => {
                    if latest.as_ref().is_none_or(|(v, _)| version > *v) {
                        latest = Some((version, statuses));
                    }
                }
                WriteCommand::Sync(done) => waiters.push(done),
                WriteCommand::Shutdown => shutdown = true,
            }
            next = match rx.try_recv() {
                Ok(cmd) => Some(cmd),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
            };
        }

        if let Some((version, statuses)) = latest.take() {
            if version > written {
                match file.store(&statuses) {
                    Ok(()) => {
                        trace!(version, count = statuses.len(), "task statuses persisted");
                        written = version;
                    }
                    Err(e) => warn!(error = %e, "failed to persist task statuses"),
                }
            }
        }
        for done in waiters.drain(..) {
            let _ = done.send(());
        }
        if shutdown {
            break;
        }
    }
    debug!(path = %file.path().display(), written, "state writer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use hive_model::{Job, TaskState};

    fn statuses(state: TaskState) -> HashMap<JobId, TaskStatus> {
        let job = Job::builder("foo", "1").image("foo:1").build();
        HashMap::from([(job.id(), TaskStatus::new(job, state))])
    }

    fn stored_state(file: &StatusFile) -> TaskState {
        let loaded = file.load().unwrap();
        loaded.values().next().expect("one status").state
    }

    #[test]
    fn sync_waits_for_queued_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let file = StatusFile::new(dir.path().join("statuses.json"));
        let writer = StatusWriter::spawn(file.clone()).unwrap();

        writer.store(1, statuses(TaskState::Creating));
        writer.store(2, statuses(TaskState::Running));
        writer.sync();

        assert_eq!(stored_state(&file), TaskState::Running);
    }

    #[test]
    fn older_snapshot_never_overwrites_newer() {
        let dir = tempfile::tempdir().unwrap();
        let file = StatusFile::new(dir.path().join("statuses.json"));
        let writer = StatusWriter::spawn(file.clone()).unwrap();

        writer.store(5, statuses(TaskState::Stopped));
        writer.sync();
        writer.store(3, statuses(TaskState::Running));
        writer.sync();

        assert_eq!(stored_state(&file), TaskState::Stopped);
    }

    #[test]
    fn drop_drains_pending_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let file = StatusFile::new(dir.path().join("statuses.json"));

        let writer = StatusWriter::spawn(file.clone()).unwrap();
        writer.store(1, statuses(TaskState::Exited));
        drop(writer);

        assert_eq!(stored_state(&file), TaskState::Exited);
    }
}
