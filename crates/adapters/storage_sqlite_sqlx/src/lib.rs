//! # macrobot-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement `TaskRepository` and `SettingsRepository` from `macrobot-app::ports::storage`
//! - Manage the `SQLite` connection pool lifecycle
//! - Run the embedded migrations on startup
//! - Map between domain types and database rows (action trees and settings are stored as JSON)
//!
//! ## Dependency rule
//! Depends on `macrobot-app` (for port traits) and `macrobot-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod error;
mod pool;
mod settings_repo;
mod task_repo;

pub use error::StorageError;
pub use pool::{Config, Database};
pub use settings_repo::SqliteSettingsRepository;
pub use task_repo::SqliteTaskRepository;
