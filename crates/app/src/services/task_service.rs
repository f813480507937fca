//! Task service — use-cases for managing stored tasks.

use macrobot_domain::error::{MacrobotError, NotFoundError};
use macrobot_domain::id::TaskId;
use macrobot_domain::task::Task;
use macrobot_domain::time::now;

use crate::ports::TaskRepository;

/// Application service for task CRUD.
pub struct TaskService<R> {
    repo: R,
}

impl<R: TaskRepository> TaskService<R> {
    /// Create a new service backed by the given repository.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Validate and store a task, replacing any task with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`MacrobotError::Validation`] listing every problem found,
    /// or a storage error propagated from the repository.
    #[tracing::instrument(skip(self, task), fields(task_id = %task.id))]
    pub async fn save_task(&self, mut task: Task) -> Result<Task, MacrobotError> {
        task.validate()?;
        task.updated_at = now();
        self.repo.save(task).await
    }

    /// Look up a task by id, returning an error if not found.
    ///
    /// # Errors
    ///
    /// Returns [`MacrobotError::NotFound`] when no task with `id` exists,
    /// or a storage error from the repository.
    pub async fn get_task(&self, id: TaskId) -> Result<Task, MacrobotError> {
        self.repo.get_by_id(id).await?.ok_or_else(|| {
            NotFoundError {
                entity: "Task",
                id: id.to_string(),
            }
            .into()
        })
    }

    /// List all tasks.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the repository.
    pub async fn list_tasks(&self) -> Result<Vec<Task>, MacrobotError> {
        self.repo.get_all().await
    }

    /// Enable or disable a task.
    ///
    /// # Errors
    ///
    /// Returns [`MacrobotError::NotFound`] if the task does not exist,
    /// or a storage error from the repository.
    #[tracing::instrument(skip(self))]
    pub async fn set_enabled(&self, id: TaskId, enabled: bool) -> Result<Task, MacrobotError> {
        let mut task = self.get_task(id).await?;
        task.enabled = enabled;
        task.updated_at = now();
        self.repo.save(task).await
    }

    /// Delete a task by id.
    ///
    /// # Errors
    ///
    /// Returns [`MacrobotError::NotFound`] if the task does not exist,
    /// or a storage error from the repository.
    pub async fn delete_task(&self, id: TaskId) -> Result<(), MacrobotError> {
        self.repo.delete(id).await
    }
}
