//! Run status — the per-run lifecycle and the engine-level snapshot.

use serde::{Deserialize, Serialize};

use crate::id::TaskId;
use crate::time::Timestamp;

/// Engine-level status. `stopping` lasts from a stop request until the
/// active run has wound down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutomationStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Stopping,
}

/// Lifecycle of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
    Failed,
    Stopped,
}

impl RunStatus {
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }
}

/// Snapshot of the engine, broadcast on every change.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AutomationState {
    pub status: AutomationStatus,
    pub current_task_id: Option<TaskId>,
    pub current_index: Option<usize>,
    pub total_actions: Option<usize>,
    pub started_at: Option<Timestamp>,
    /// Runs that reached their end without failing.
    pub execution_count: u64,
    /// Kept until the next successful start.
    pub last_error: Option<String>,
}

impl AutomationState {
    /// Forget the active run, keeping counters and the last error.
    pub fn clear_progress(&mut self) {
        self.current_task_id = None;
        self.current_index = None;
        self.total_actions = None;
        self.started_at = None;
    }
}
