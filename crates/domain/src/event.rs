//! Event — an immutable notification about engine progress.
//!
//! Events are broadcast while a task runs: status changes, step
//! boundaries and the final outcome. They are fire-and-forget; nothing in
//! the engine waits on an observer.

use serde::{Deserialize, Serialize};

use crate::id::{EventId, TaskId};
use crate::time::{Timestamp, now};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// The engine-level [`AutomationState`](crate::state::AutomationState) changed.
    StatusChanged,
    StepStarted,
    StepCompleted,
    StepFailed,
    RunFinished,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::StatusChanged => "status_changed",
            Self::StepStarted => "step_started",
            Self::StepCompleted => "step_completed",
            Self::StepFailed => "step_failed",
            Self::RunFinished => "run_finished",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub event_type: EventType,
    pub task_id: Option<TaskId>,
    pub data: serde_json::Value,
    pub timestamp: Timestamp,
}

impl Event {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn new(event_type: EventType, task_id: Option<TaskId>, data: serde_json::Value) -> Self {
        Self {
            id: EventId::new(),
            event_type,
            task_id,
            data,
            timestamp: now(),
        }
    }
}
