//! Metrics hooks for the convergence loop.
//!
//! The agent reports through [`AgentMetrics`]; backends (e.g. `hive-prometheus`) decide how to
//! expose them. [`NoopMetrics`] is used when nothing is configured.

use std::{fmt, time::Duration};

/// Call issued by the agent against a supervisor during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupervisorAction {
    Create,
    Start,
    Stop,
    Close,
}

impl SupervisorAction {
    pub const ALL: [SupervisorAction; 4] = [Self::Create, Self::Start, Self::Stop, Self::Close];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Close => "close",
        }
    }
}

impl fmt::Display for SupervisorAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub trait AgentMetrics: Send + Sync {
    /// A convergence pass finished; `live` is the number of tracked supervisors afterwards.
    fn pass_completed(&self, duration: Duration, live: usize);

    /// A pass was skipped because the model could not be read.
    fn pass_skipped(&self);

    fn supervisor_action(&self, action: SupervisorAction);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl AgentMetrics for NoopMetrics {
    fn pass_completed(&self, _duration: Duration, _live: usize) {}
    fn pass_skipped(&self) {}
    fn supervisor_action(&self, _action: SupervisorAction) {}
}
