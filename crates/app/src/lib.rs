//! # macrobot-app
//!
//! Application layer — use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `InputDevice` — mouse and keyboard
//!   - `Vision` — template matching on the screen
//!   - `TaskRepository` / `SettingsRepository` — persistence
//!   - `EventPublisher` — progress notifications
//! - Provide the run machinery:
//!   - `Dispatcher` — maps one action to port calls
//!   - `Runner` — sequences top-level actions with delays, pause and stop
//!   - `AutomationEngine` — owns the single active run and the shared state
//!   - `TaskService` — validate, store, list and delete tasks
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `macrobot-domain` only (plus `tokio` for timers and channels).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod context;
pub mod control;
pub mod dispatcher;
pub mod engine;
pub mod event_bus;
pub mod ports;
pub mod runner;
pub mod services;
