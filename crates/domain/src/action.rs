//! Action — one scripted step of a task.
//!
//! Every action carries the same common fields (identity, description,
//! delays, error policy) around a variant-specific [`ActionKind`]. The
//! `condition` and `loop` kinds embed further action sequences, which makes
//! a task's script a tree.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::geometry::Region;
use crate::id::ActionId;

/// Safety valve applied to every loop that does not set `max_iterations`.
pub const DEFAULT_MAX_ITERATIONS: u32 = 1000;

/// One step of a script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: ActionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Sleep before dispatching the step. Defaults to none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_before_ms: Option<u64>,
    /// Sleep after a successful step. Defaults to the configured default delay.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_after_ms: Option<u64>,
    /// Let the run continue when this step fails (top-level steps only).
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(flatten)]
    pub kind: ActionKind,
}

/// The variant-specific part of an [`Action`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionKind {
    Click(ClickAction),
    DoubleClick(ClickAction),
    RightClick(ClickAction),
    Type {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        inter_key_delay_ms: Option<u64>,
    },
    PressKey {
        key: String,
    },
    Hotkey {
        keys: Vec<String>,
    },
    Wait {
        #[serde(default)]
        duration_ms: Option<u64>,
        /// Symmetric jitter applied to the duration.
        #[serde(default)]
        random_variation_ms: u64,
    },
    FindImage {
        template: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        region: Option<Region>,
        /// Variable receiving the found point, or null when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        store_into: Option<String>,
    },
    WaitForImage {
        template: String,
        #[serde(default)]
        timeout_ms: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        confidence: Option<f32>,
        #[serde(default)]
        wait_for_disappearance: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        store_into: Option<String>,
    },
    Condition {
        predicate: ConditionKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        template: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variable: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expected: Option<String>,
        #[serde(default)]
        then_actions: Vec<Action>,
        #[serde(default)]
        else_actions: Vec<Action>,
    },
    Loop {
        loop_kind: LoopKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        count: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        template: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_iterations: Option<u32>,
        #[serde(default)]
        actions: Vec<Action>,
    },
}

/// Shape shared by the click, double-click and right-click steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClickAction {
    pub target: ClickTarget,
    #[serde(default)]
    pub offset_x: i32,
    #[serde(default)]
    pub offset_y: i32,
    /// Symmetric jitter in pixels applied on each axis.
    #[serde(default)]
    pub random_offset: u32,
}

impl ClickAction {
    #[must_use]
    pub fn at(target: ClickTarget) -> Self {
        Self {
            target,
            offset_x: 0,
            offset_y: 0,
            random_offset: 0,
        }
    }
}

/// Where a click lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClickTarget {
    Coordinates { x: i32, y: i32 },
    /// Centre of the named template's match on screen.
    Image { template: String },
    /// A point previously stored in a run variable.
    Variable { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    ImageVisible,
    ImageNotVisible,
    VariableEquals,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopKind {
    Count,
    WhileImageVisible,
    UntilImageVisible,
    Infinite,
}

/// Which mouse button sequence a click-family step performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickKind {
    Single,
    Double,
    Right,
}

impl Action {
    /// A step with default common fields.
    #[must_use]
    pub fn new(id: impl Into<ActionId>, kind: ActionKind) -> Self {
        Self {
            id: id.into(),
            description: None,
            delay_before_ms: None,
            delay_after_ms: None,
            continue_on_error: false,
            kind,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_delay_before(mut self, ms: u64) -> Self {
        self.delay_before_ms = Some(ms);
        self
    }

    #[must_use]
    pub fn with_delay_after(mut self, ms: u64) -> Self {
        self.delay_after_ms = Some(ms);
        self
    }

    #[must_use]
    pub fn continue_on_error(mut self) -> Self {
        self.continue_on_error = true;
        self
    }

    /// Nested sequences embedded in this step, in declaration order.
    #[must_use]
    pub fn children(&self) -> Vec<&[Action]> {
        match &self.kind {
            ActionKind::Condition {
                then_actions,
                else_actions,
                ..
            } => vec![then_actions.as_slice(), else_actions.as_slice()],
            ActionKind::Loop { actions, .. } => vec![actions.as_slice()],
            _ => Vec::new(),
        }
    }

    /// Check the variant-specific invariants of this step (not its children).
    pub(crate) fn check(&self, errors: &mut Vec<ValidationError>) {
        let mut missing = |field: &'static str| {
            errors.push(ValidationError::MissingField {
                action_id: self.id.clone(),
                field,
            });
        };

        match &self.kind {
            ActionKind::Click(click)
            | ActionKind::DoubleClick(click)
            | ActionKind::RightClick(click) => match &click.target {
                ClickTarget::Coordinates { .. } => {}
                ClickTarget::Image { template } if blank(template) => missing("target.template"),
                ClickTarget::Variable { name } if blank(name) => missing("target.name"),
                ClickTarget::Image { .. } | ClickTarget::Variable { .. } => {}
            },
            ActionKind::Type { .. } => {}
            ActionKind::PressKey { key } => {
                if blank(key) {
                    missing("key");
                }
            }
            ActionKind::Hotkey { keys } => {
                if keys.iter().all(|k| blank(k)) {
                    missing("keys");
                }
            }
            ActionKind::Wait { duration_ms, .. } => {
                if duration_ms.is_none() {
                    missing("duration_ms");
                }
            }
            ActionKind::FindImage {
                template,
                confidence,
                ..
            } => {
                if blank(template) {
                    missing("template");
                }
                self.check_confidence(*confidence, errors);
            }
            ActionKind::WaitForImage {
                template,
                timeout_ms,
                confidence,
                ..
            } => {
                if blank(template) {
                    missing("template");
                }
                if timeout_ms.is_none() {
                    missing("timeout_ms");
                }
                self.check_confidence(*confidence, errors);
            }
            ActionKind::Condition {
                predicate,
                template,
                variable,
                expected,
                ..
            } => match predicate {
                ConditionKind::ImageVisible | ConditionKind::ImageNotVisible => {
                    if template.as_deref().is_none_or(blank) {
                        missing("template");
                    }
                }
                ConditionKind::VariableEquals => {
                    if variable.as_deref().is_none_or(blank) {
                        missing("variable");
                    }
                    if expected.is_none() {
                        missing("expected");
                    }
                }
            },
            ActionKind::Loop {
                loop_kind,
                count,
                template,
                max_iterations,
                ..
            } => {
                match loop_kind {
                    LoopKind::Count if count.is_none() => missing("count"),
                    LoopKind::WhileImageVisible | LoopKind::UntilImageVisible
                        if template.as_deref().is_none_or(blank) =>
                    {
                        missing("template");
                    }
                    _ => {}
                }
                if *max_iterations == Some(0) {
                    errors.push(ValidationError::InvalidField {
                        action_id: self.id.clone(),
                        field: "max_iterations",
                        reason: "must be greater than zero",
                    });
                }
            }
        }
    }

    fn check_confidence(&self, confidence: Option<f32>, errors: &mut Vec<ValidationError>) {
        if confidence.is_some_and(|c| !(0.0..=1.0).contains(&c)) {
            errors.push(ValidationError::InvalidField {
                action_id: self.id.clone(),
                field: "confidence",
                reason: "must be between 0 and 1",
            });
        }
    }
}

fn blank(value: &str) -> bool {
    value.trim().is_empty()
}

impl ActionKind {
    /// The mouse button sequence for click-family steps.
    #[must_use]
    pub fn click_kind(&self) -> Option<(ClickKind, &ClickAction)> {
        match self {
            Self::Click(click) => Some((ClickKind::Single, click)),
            Self::DoubleClick(click) => Some((ClickKind::Double, click)),
            Self::RightClick(click) => Some((ClickKind::Right, click)),
            _ => None,
        }
    }
}

impl std::fmt::Display for ClickTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Coordinates { x, y } => write!(f, "{x},{y}"),
            Self::Image { template } => write!(f, "image:{template}"),
            Self::Variable { name } => write!(f, "var:{name}"),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            ActionKind::Click(click) => write!(f, "click({})", click.target),
            ActionKind::DoubleClick(click) => write!(f, "double_click({})", click.target),
            ActionKind::RightClick(click) => write!(f, "right_click({})", click.target),
            ActionKind::Type { text, .. } => write!(f, "type({} chars)", text.chars().count()),
            ActionKind::PressKey { key } => write!(f, "press_key({key})"),
            ActionKind::Hotkey { keys } => write!(f, "hotkey({})", keys.join("+")),
            ActionKind::Wait { duration_ms, .. } => {
                write!(f, "wait({}ms)", duration_ms.unwrap_or_default())
            }
            ActionKind::FindImage { template, .. } => write!(f, "find_image({template})"),
            ActionKind::WaitForImage {
                template,
                wait_for_disappearance,
                ..
            } => {
                if *wait_for_disappearance {
                    write!(f, "wait_for_image({template}, gone)")
                } else {
                    write!(f, "wait_for_image({template})")
                }
            }
            ActionKind::Condition {
                predicate,
                then_actions,
                else_actions,
                ..
            } => write!(
                f,
                "condition({predicate:?}, {}/{} steps)",
                then_actions.len(),
                else_actions.len()
            ),
            ActionKind::Loop {
                loop_kind, actions, ..
            } => write!(f, "loop({loop_kind:?}, {} steps)", actions.len()),
        }
    }
}
