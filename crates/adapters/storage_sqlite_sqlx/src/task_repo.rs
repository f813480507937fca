//! `SQLite` implementation of [`TaskRepository`].
//!
//! The action tree is stored as one JSON document per task; statistics and
//! metadata live in their own columns.

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use macrobot_app::ports::TaskRepository;
use macrobot_domain::action::Action;
use macrobot_domain::error::{MacrobotError, NotFoundError};
use macrobot_domain::id::TaskId;
use macrobot_domain::task::Task;
use macrobot_domain::time::Timestamp;

use crate::error::StorageError;

/// Wrapper for converting database rows into domain types without polluting
/// domain structs with database concerns.
struct Wrapper(Task);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Task> {
        value.map(|w| w.0)
    }
}

fn decode_err(err: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}

fn parse_timestamp(value: &str) -> Result<Timestamp, sqlx::Error> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.to_utc())
        .map_err(decode_err)
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let name: String = row.try_get("name")?;
        let description: Option<String> = row.try_get("description")?;
        let enabled: bool = row.try_get("enabled")?;
        let actions_json: String = row.try_get("actions")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;
        let run_count: i64 = row.try_get("run_count")?;
        let last_run_at: Option<String> = row.try_get("last_run_at")?;
        let last_run_success: Option<bool> = row.try_get("last_run_success")?;

        let id = TaskId::from_str(&id).map_err(decode_err)?;
        let actions: Vec<Action> = serde_json::from_str(&actions_json).map_err(decode_err)?;

        Ok(Self(Task {
            id,
            name,
            description,
            enabled,
            actions,
            created_at: parse_timestamp(&created_at)?,
            updated_at: parse_timestamp(&updated_at)?,
            run_count: u64::try_from(run_count).unwrap_or_default(),
            last_run_at: last_run_at.as_deref().map(parse_timestamp).transpose()?,
            last_run_success,
        }))
    }
}

/// `SQLite`-backed task repository.
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl TaskRepository for SqliteTaskRepository {
    async fn get_by_id(&self, id: TaskId) -> Result<Option<Task>, MacrobotError> {
        let row: Option<Wrapper> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(Wrapper::maybe(row))
    }

    async fn get_all(&self) -> Result<Vec<Task>, MacrobotError> {
        let rows: Vec<Wrapper> = sqlx::query_as("SELECT * FROM tasks ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(rows.into_iter().map(|w| w.0).collect())
    }

    async fn save(&self, task: Task) -> Result<Task, MacrobotError> {
        let actions_json = serde_json::to_string(&task.actions).map_err(StorageError::from)?;
        let run_count = i64::try_from(task.run_count).unwrap_or(i64::MAX);

        sqlx::query(
            "INSERT INTO tasks (id, name, description, enabled, actions, created_at, updated_at, run_count, last_run_at, last_run_success) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
                name = excluded.name, \
                description = excluded.description, \
                enabled = excluded.enabled, \
                actions = excluded.actions, \
                updated_at = excluded.updated_at, \
                run_count = excluded.run_count, \
                last_run_at = excluded.last_run_at, \
                last_run_success = excluded.last_run_success",
        )
        .bind(task.id.to_string())
        .bind(&task.name)
        .bind(&task.description)
        .bind(task.enabled)
        .bind(&actions_json)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .bind(run_count)
        .bind(task.last_run_at.map(|ts| ts.to_rfc3339()))
        .bind(task.last_run_success)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(task)
    }

    async fn delete(&self, id: TaskId) -> Result<(), MacrobotError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        if result.rows_affected() == 0 {
            return Err(NotFoundError {
                entity: "Task",
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Config;
    use macrobot_domain::action::{ActionKind, ClickAction, ClickTarget, LoopKind};
    use macrobot_domain::time::now;

    async fn setup() -> SqliteTaskRepository {
        let db = Config {
            database_url: "sqlite::memory:".to_string(),
        }
        .build()
        .await
        .unwrap();
        SqliteTaskRepository::new(db.pool().clone())
    }

    fn task(name: &str) -> Task {
        let click = Action::new(
            "click",
            ActionKind::Click(ClickAction::at(ClickTarget::Coordinates { x: 10, y: 20 })),
        );
        let body = Action::new(
            "repeat",
            ActionKind::Loop {
                loop_kind: LoopKind::Count,
                count: Some(3),
                template: None,
                max_iterations: None,
                actions: vec![click],
            },
        )
        .with_delay_after(250);

        Task::builder().name(name).action(body).build().unwrap()
    }

    #[tokio::test]
    async fn should_save_and_retrieve_task_with_nested_actions() {
        let repo = setup().await;
        let task = task("Daily quest");
        let id = task.id;

        repo.save(task.clone()).await.unwrap();
        let found = repo.get_by_id(id).await.unwrap().unwrap();

        assert_eq!(found, task);
    }

    #[tokio::test]
    async fn should_return_none_when_task_not_found() {
        let repo = setup().await;
        let found = repo.get_by_id(TaskId::new()).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn should_replace_stored_task_when_saved_again() {
        let repo = setup().await;
        let mut task = task("Before");
        repo.save(task.clone()).await.unwrap();

        task.name = "After".to_string();
        task.enabled = false;
        task.record_run(false, now());
        repo.save(task.clone()).await.unwrap();

        let all = repo.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].name, "After");
        assert!(!all[0].enabled);
        assert_eq!(all[0].run_count, 1);
        assert_eq!(all[0].last_run_success, Some(false));
    }

    #[tokio::test]
    async fn should_list_tasks_ordered_by_name() {
        let repo = setup().await;
        repo.save(task("Zeta")).await.unwrap();
        repo.save(task("Alpha")).await.unwrap();

        let names: Vec<String> = repo
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();

        assert_eq!(names, vec!["Alpha", "Zeta"]);
    }

    #[tokio::test]
    async fn should_delete_task() {
        let repo = setup().await;
        let task = task("Gone");
        let id = task.id;
        repo.save(task).await.unwrap();

        repo.delete(id).await.unwrap();

        assert!(repo.get_by_id(id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn should_return_not_found_when_deleting_missing_task() {
        let repo = setup().await;
        let err = repo.delete(TaskId::new()).await.unwrap_err();
        assert!(matches!(err, MacrobotError::NotFound(_)));
    }
}
