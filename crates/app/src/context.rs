//! Per-run mutable state.

use macrobot_domain::config::AutomationConfig;
use macrobot_domain::id::{RunId, TaskId};
use macrobot_domain::state::RunStatus;
use macrobot_domain::time::{Timestamp, now};
use macrobot_domain::variable::Variables;

/// State owned by exactly one run. Nothing outside that run reads or
/// writes its variables.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub run_id: RunId,
    pub task_id: TaskId,
    pub variables: Variables,
    /// Index of the top-level action being executed.
    pub current_index: usize,
    pub status: RunStatus,
    pub started_at: Timestamp,
    pub error: Option<String>,
    /// Settings snapshot taken when the run started.
    pub config: AutomationConfig,
}

impl ExecutionContext {
    #[must_use]
    pub fn new(task_id: TaskId, config: AutomationConfig) -> Self {
        Self {
            run_id: RunId::new(),
            task_id,
            variables: Variables::new(),
            current_index: 0,
            status: RunStatus::Idle,
            started_at: now(),
            error: None,
            config,
        }
    }
}
