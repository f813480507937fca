//! Common error types used across the workspace.
//!
//! [`MacrobotError`] is what every port returns. Layers define their own
//! typed errors and convert via `#[from]`; step execution failures are
//! described by [`StepError`].

use crate::id::ActionId;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Base error returned by ports and services.
#[derive(Debug, thiserror::Error)]
pub enum MacrobotError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error("storage error: {0}")]
    Storage(#[source] BoxError),

    #[error("device error: {0}")]
    Device(#[source] BoxError),
}

impl MacrobotError {
    /// Wrap a failure raised by an input device or vision backend.
    pub fn device(err: impl Into<BoxError>) -> Self {
        Self::Device(err.into())
    }
}

/// A referenced record does not exist.
#[derive(Debug, thiserror::Error)]
#[error("{entity} not found: {id}")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// A single problem found while validating a task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("task name must not be empty")]
    EmptyName,

    #[error("action id must not be empty")]
    EmptyActionId,

    #[error("action id {id} is used more than once")]
    DuplicateActionId { id: ActionId },

    #[error("action {action_id} is missing required field {field}")]
    MissingField {
        action_id: ActionId,
        field: &'static str,
    },

    #[error("action {action_id} has invalid {field}: {reason}")]
    InvalidField {
        action_id: ActionId,
        field: &'static str,
        reason: &'static str,
    },
}

/// Every problem found while validating a task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("task is invalid: {}", join_problems(.0))]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.0
    }
}

impl From<ValidationError> for ValidationErrors {
    fn from(value: ValidationError) -> Self {
        Self(vec![value])
    }
}

impl From<ValidationError> for MacrobotError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value.into())
    }
}

/// Why a step failed.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("image not found on screen: {template}")]
    TargetNotFound { template: String },

    #[error(
        "timed out after {timeout_ms}ms waiting for {template} to {}",
        direction(.disappear)
    )]
    Timeout {
        template: String,
        timeout_ms: u64,
        disappear: bool,
    },

    #[error("variable {name} is missing or is not a point")]
    InvalidVariable { name: String },

    #[error("no known key in [{}]", join_keys(.keys))]
    UnknownKey { keys: Vec<String> },

    #[error("dispatch failed: {0}")]
    Dispatch(#[from] MacrobotError),

    /// A stop request was observed at a suspension point.
    #[error("run was stopped")]
    Interrupted,
}

fn join_problems(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn join_keys(keys: &[String]) -> String {
    keys.join(", ")
}

fn direction(disappear: &bool) -> &'static str {
    if *disappear { "disappear" } else { "appear" }
}

impl StepError {
    #[must_use]
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}
