//! `SQLite` implementation of [`SettingsRepository`].

use sqlx::SqlitePool;

use macrobot_app::ports::SettingsRepository;
use macrobot_domain::config::AutomationConfig;
use macrobot_domain::error::MacrobotError;
use macrobot_domain::time::now;

use crate::error::StorageError;

const AUTOMATION_KEY: &str = "automation";

/// Settings stored as JSON documents in a key/value table.
pub struct SqliteSettingsRepository {
    pool: SqlitePool,
}

impl SqliteSettingsRepository {
    /// Create a new repository backed by the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl SettingsRepository for SqliteSettingsRepository {
    async fn get_automation_config(&self) -> Result<AutomationConfig, MacrobotError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(AUTOMATION_KEY)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        match row {
            Some((json,)) => Ok(serde_json::from_str(&json).map_err(StorageError::from)?),
            None => Ok(AutomationConfig::default()),
        }
    }

    async fn save_automation_config(&self, config: AutomationConfig) -> Result<(), MacrobotError> {
        let json = serde_json::to_string(&config).map_err(StorageError::from)?;

        sqlx::query(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(AUTOMATION_KEY)
        .bind(&json)
        .bind(now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;

        Ok(())
    }
}
