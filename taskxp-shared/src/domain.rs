use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where a task sits in its lifecycle. Only ever moves forward:
/// `Pending -> Completed -> Reviewed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
    Reviewed,
}

/// Something a user does to a task that may move its status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskAction {
    /// Child marks the task as done; credits XP.
    Complete,
    /// Parent acknowledges a completed task.
    Review,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot {action} a task that is {from}")]
pub struct TransitionError {
    pub from: TaskStatus,
    pub action: TaskAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown task status: {0}")]
pub struct UnknownStatus(pub String);

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [
        TaskStatus::Pending,
        TaskStatus::Completed,
        TaskStatus::Reviewed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Reviewed => "reviewed",
        }
    }

    /// The transition table. Every status change in the system goes through here.
    pub fn apply(self, action: TaskAction) -> Result<TaskStatus, TransitionError> {
        match (self, action) {
            (TaskStatus::Pending, TaskAction::Complete) => Ok(TaskStatus::Completed),
            (TaskStatus::Completed, TaskAction::Review) => Ok(TaskStatus::Reviewed),
            (from, action) => Err(TransitionError { from, action }),
        }
    }
}

impl TaskAction {
    /// Status a task must be in for this action to apply.
    pub fn required_status(&self) -> TaskStatus {
        match self {
            TaskAction::Complete => TaskStatus::Pending,
            TaskAction::Review => TaskStatus::Completed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskAction::Complete => "complete",
            TaskAction::Review => "review",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(TaskStatus::Pending),
            "completed" => Ok(TaskStatus::Completed),
            "reviewed" => Ok(TaskStatus::Reviewed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}
