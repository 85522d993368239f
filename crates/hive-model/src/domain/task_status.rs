use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::{Job, JobId, TaskState, ThrottleState};

/// Observed state of a task's container at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    pub job: Job,
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(default)]
    pub throttled: ThrottleState,
    /// When this status was observed.
    #[serde(with = "time_serde")]
    pub updated_at: SystemTime,
}

impl TaskStatus {
    pub fn new(job: Job, state: TaskState) -> Self {
        Self {
            job,
            state,
            container_id: None,
            throttled: ThrottleState::No,
            updated_at: SystemTime::now(),
        }
    }

    pub fn with_container(mut self, container_id: impl Into<String>) -> Self {
        self.container_id = Some(container_id.into());
        self
    }

    pub fn with_throttled(mut self, throttled: ThrottleState) -> Self {
        self.throttled = throttled;
        self
    }

    pub fn job_id(&self) -> JobId {
        self.job.id()
    }
}

/// One entry of a job's status history, as recorded by the master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusEvent {
    pub status: TaskStatus,
    #[serde(with = "time_serde")]
    pub timestamp: SystemTime,
    /// Host that reported the status.
    pub host: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatusEventsStatus {
    Ok,
    JobIdNotFound,
}

/// Status history of a job, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStatusEvents {
    #[serde(default)]
    pub events: Vec<TaskStatusEvent>,
    pub status: TaskStatusEventsStatus,
}

mod time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{Duration, SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        (since_epoch.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::builder("bar", "63").image("bar:5656").build()
    }

    #[test]
    fn status_serde_keeps_observation() {
        let status = TaskStatus::new(job(), TaskState::Running)
            .with_container("bar-container-1")
            .with_throttled(ThrottleState::Flapping);

        let json = serde_json::to_string(&status).unwrap();
        assert!(json.contains(r#""state":"RUNNING""#));
        assert!(json.contains(r#""containerId":"bar-container-1""#));

        let back: TaskStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back.job, status.job);
        assert_eq!(back.state, TaskState::Running);
        assert_eq!(back.container_id.as_deref(), Some("bar-container-1"));
        assert_eq!(back.throttled, ThrottleState::Flapping);
    }

    #[test]
    fn history_timestamps_are_epoch_millis() {
        let json = serde_json::json!({
            "status": "JOB_ID_NOT_FOUND",
        });
        let missing: TaskStatusEvents = serde_json::from_value(json).unwrap();
        assert_eq!(missing.status, TaskStatusEventsStatus::JobIdNotFound);
        assert!(missing.events.is_empty());

        let event = TaskStatusEvent {
            status: TaskStatus::new(job(), TaskState::Exited),
            timestamp: std::time::UNIX_EPOCH + std::time::Duration::from_millis(1_700_000_000_123),
            host: "node-1".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["timestamp"], 1_700_000_000_123u64);
        assert_eq!(json["status"]["state"], "EXITED");
    }

    #[test]
    fn missing_container_is_omitted() {
        let json = serde_json::to_string(&TaskStatus::new(job(), TaskState::Creating)).unwrap();
        assert!(!json.contains("containerId"));
    }
}
