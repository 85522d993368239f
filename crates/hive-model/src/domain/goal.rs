use std::fmt;

use serde::{Deserialize, Serialize};

/// Target lifecycle intent of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Goal {
    Start,
    Stop,
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Goal::Start => f.write_str("START"),
            Goal::Stop => f.write_str("STOP"),
        }
    }
}
