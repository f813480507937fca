//! Storage port — repository traits for persistence.

use std::future::Future;
use std::sync::Arc;

use macrobot_domain::config::AutomationConfig;
use macrobot_domain::error::MacrobotError;
use macrobot_domain::id::TaskId;
use macrobot_domain::task::Task;

/// Repository for persisting and querying [`Task`]s.
pub trait TaskRepository {
    /// Get a task by its unique identifier.
    fn get_by_id(
        &self,
        id: TaskId,
    ) -> impl Future<Output = Result<Option<Task>, MacrobotError>> + Send;

    /// Get all tasks, ordered by name.
    fn get_all(&self) -> impl Future<Output = Result<Vec<Task>, MacrobotError>> + Send;

    /// Insert the task, or replace the stored one with the same id.
    fn save(&self, task: Task) -> impl Future<Output = Result<Task, MacrobotError>> + Send;

    /// Delete a task by its unique identifier.
    ///
    /// Returns [`MacrobotError::NotFound`] when no such task exists.
    fn delete(&self, id: TaskId) -> impl Future<Output = Result<(), MacrobotError>> + Send;
}

/// Repository for the global automation settings.
pub trait SettingsRepository {
    /// Stored settings, or [`AutomationConfig::default`] when none were saved.
    fn get_automation_config(
        &self,
    ) -> impl Future<Output = Result<AutomationConfig, MacrobotError>> + Send;

    fn save_automation_config(
        &self,
        config: AutomationConfig,
    ) -> impl Future<Output = Result<(), MacrobotError>> + Send;
}

impl<T: TaskRepository + Send + Sync> TaskRepository for Arc<T> {
    fn get_by_id(
        &self,
        id: TaskId,
    ) -> impl Future<Output = Result<Option<Task>, MacrobotError>> + Send {
        (**self).get_by_id(id)
    }

    fn get_all(&self) -> impl Future<Output = Result<Vec<Task>, MacrobotError>> + Send {
        (**self).get_all()
    }

    fn save(&self, task: Task) -> impl Future<Output = Result<Task, MacrobotError>> + Send {
        (**self).save(task)
    }

    fn delete(&self, id: TaskId) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        (**self).delete(id)
    }
}

impl<T: SettingsRepository + Send + Sync> SettingsRepository for Arc<T> {
    fn get_automation_config(
        &self,
    ) -> impl Future<Output = Result<AutomationConfig, MacrobotError>> + Send {
        (**self).get_automation_config()
    }

    fn save_automation_config(
        &self,
        config: AutomationConfig,
    ) -> impl Future<Output = Result<(), MacrobotError>> + Send {
        (**self).save_automation_config(config)
    }
}
