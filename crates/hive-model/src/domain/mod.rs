mod job;
pub use job::{Job, JobBuilder, PortMapping, Protocol};

mod job_id;
pub use job_id::JobId;

mod goal;
pub use goal::Goal;

mod task;
pub use task::Task;

mod task_state;
pub use task_state::{TaskState, ThrottleState};

mod task_status;
pub use task_status::{TaskStatus, TaskStatusEvent, TaskStatusEvents, TaskStatusEventsStatus};

mod host;
pub use host::{Deployment, HostState, HostStatus};

/// Environment passed to a job's container.
///
/// A `BTreeMap` keeps the canonical encoding (and therefore the [`JobId`]) stable.
pub type Env = std::collections::BTreeMap<String, String>;
