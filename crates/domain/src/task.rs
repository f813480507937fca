//! Task — a named, ordered script of actions plus run statistics.
//!
//! Tasks are owned by storage. The engine reads a snapshot at start time
//! and writes back the updated run statistics when the run ends.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::error::{ValidationError, ValidationErrors};
use crate::id::TaskId;
use crate::time::{Timestamp, now};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub enabled: bool,
    pub actions: Vec<Action>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub run_count: u64,
    #[serde(default)]
    pub last_run_at: Option<Timestamp>,
    #[serde(default)]
    pub last_run_success: Option<bool>,
}

impl Task {
    /// Create a builder for constructing a [`Task`].
    #[must_use]
    pub fn builder() -> TaskBuilder {
        TaskBuilder::default()
    }

    /// Check the task and every nested action.
    ///
    /// All problems are collected rather than stopping at the first one.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrors`] when:
    /// - `name` is empty
    /// - an action id is empty or used more than once anywhere in the tree
    /// - an action lacks a field its variant requires, or holds an invalid value
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push(ValidationError::EmptyName);
        }

        let mut seen = HashSet::new();
        let mut reported = HashSet::new();
        for action in self.walk() {
            if action.id.is_empty() {
                errors.push(ValidationError::EmptyActionId);
            } else if !seen.insert(&action.id) && reported.insert(&action.id) {
                errors.push(ValidationError::DuplicateActionId {
                    id: action.id.clone(),
                });
            }
            action.check(&mut errors);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidationErrors(errors))
        }
    }

    /// Every action in the tree, depth-first in execution order.
    #[must_use]
    pub fn walk(&self) -> Vec<&Action> {
        fn visit<'a>(actions: &'a [Action], out: &mut Vec<&'a Action>) {
            for action in actions {
                out.push(action);
                for children in action.children() {
                    visit(children, out);
                }
            }
        }

        let mut out = Vec::new();
        visit(&self.actions, &mut out);
        out
    }

    /// Record the end of a run.
    pub fn record_run(&mut self, success: bool, at: Timestamp) {
        self.run_count += 1;
        self.last_run_at = Some(at);
        self.last_run_success = Some(success);
        self.updated_at = at;
    }
}

/// Step-by-step builder for [`Task`].
#[derive(Debug, Default)]
pub struct TaskBuilder {
    id: Option<TaskId>,
    name: Option<String>,
    description: Option<String>,
    enabled: Option<bool>,
    actions: Vec<Action>,
}

impl TaskBuilder {
    #[must_use]
    pub fn id(mut self, id: TaskId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    #[must_use]
    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    #[must_use]
    pub fn actions(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.actions.extend(actions);
        self
    }

    /// Consume the builder, validate, and return a [`Task`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationErrors`] if the task or any of its actions is invalid.
    pub fn build(self) -> Result<Task, ValidationErrors> {
        let created_at = now();
        let task = Task {
            id: self.id.unwrap_or_default(),
            name: self.name.unwrap_or_default(),
            description: self.description,
            enabled: self.enabled.unwrap_or(true),
            actions: self.actions,
            created_at,
            updated_at: created_at,
            run_count: 0,
            last_run_at: None,
            last_run_success: None,
        };
        task.validate()?;
        Ok(task)
    }
}
