//! Step dispatcher — turns one [`Action`] into calls on the input and
//! vision ports.
//!
//! Nested sequences (condition branches, loop bodies) are executed here
//! too. A failure inside a nested sequence fails the enclosing step;
//! `continue_on_error` is only honoured by the runner for top-level steps.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;

use macrobot_domain::action::{
    Action, ActionKind, ClickAction, ClickKind, ClickTarget, ConditionKind, DEFAULT_MAX_ITERATIONS,
    LoopKind,
};
use macrobot_domain::error::{MacrobotError, StepError, ValidationError};
use macrobot_domain::geometry::{MatchResult, Point, Region};
use macrobot_domain::key::Key;
use macrobot_domain::time::{jittered_millis, millis};

use crate::context::ExecutionContext;
use crate::control::RunControl;
use crate::ports::{InputDevice, Vision};

/// Interval between two searches of a `wait_for_image` step.
pub const PERCEPTION_POLL: Duration = Duration::from_millis(100);

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Executes actions against an input device and a vision backend.
pub struct Dispatcher<'a, I, V> {
    input: &'a I,
    vision: &'a V,
    control: &'a RunControl,
}

impl<'a, I: InputDevice, V: Vision> Dispatcher<'a, I, V> {
    pub fn new(input: &'a I, vision: &'a V, control: &'a RunControl) -> Self {
        Self {
            input,
            vision,
            control,
        }
    }

    /// Execute a single action, including any nested sequence it holds.
    ///
    /// # Errors
    ///
    /// Returns the [`StepError`] of the first failing step. A stop observed
    /// at a sleep, poll or loop boundary yields [`StepError::Interrupted`].
    pub async fn execute(
        &self,
        action: &Action,
        ctx: &mut ExecutionContext,
    ) -> Result<(), StepError> {
        match &action.kind {
            ActionKind::Click(click) => self.click(ClickKind::Single, click, ctx).await,
            ActionKind::DoubleClick(click) => self.click(ClickKind::Double, click, ctx).await,
            ActionKind::RightClick(click) => self.click(ClickKind::Right, click, ctx).await,
            ActionKind::Type {
                text,
                inter_key_delay_ms,
            } => {
                tracing::debug!(chars = text.chars().count(), "typing text");
                self.input
                    .type_text(text, inter_key_delay_ms.map(millis))
                    .await?;
                Ok(())
            }
            ActionKind::PressKey { key } => {
                let resolved = Key::from_name(key).ok_or_else(|| StepError::UnknownKey {
                    keys: vec![key.clone()],
                })?;
                tracing::debug!(key = %resolved, "pressing key");
                self.input.press_key(resolved).await?;
                Ok(())
            }
            ActionKind::Hotkey { keys } => self.hotkey(keys).await,
            ActionKind::Wait {
                duration_ms,
                random_variation_ms,
            } => {
                let base = duration_ms.unwrap_or_default();
                let duration = jittered_millis(base, jitter(*random_variation_ms), 0);
                self.control.sleep(duration).await
            }
            ActionKind::FindImage {
                template,
                confidence,
                region,
                store_into,
            } => {
                let found = self.find(template, *confidence, *region, ctx).await?;
                tracing::debug!(template = %template, found = found.found, "searched for image");
                if let Some(name) = store_into {
                    ctx.variables.set(name.clone(), found.location());
                }
                Ok(())
            }
            ActionKind::WaitForImage {
                template,
                timeout_ms,
                confidence,
                wait_for_disappearance,
                store_into,
            } => {
                let found = self
                    .wait_for_image(
                        template,
                        timeout_ms.unwrap_or_default(),
                        *confidence,
                        *wait_for_disappearance,
                        ctx,
                    )
                    .await?;
                if let (false, Some(name)) = (*wait_for_disappearance, store_into) {
                    ctx.variables.set(name.clone(), found.location());
                }
                Ok(())
            }
            ActionKind::Condition {
                predicate,
                template,
                variable,
                expected,
                then_actions,
                else_actions,
            } => {
                let holds = match predicate {
                    ConditionKind::ImageVisible => {
                        let template = required(action, template.as_deref(), "template")?;
                        self.is_visible(template, ctx).await?
                    }
                    ConditionKind::ImageNotVisible => {
                        let template = required(action, template.as_deref(), "template")?;
                        !self.is_visible(template, ctx).await?
                    }
                    ConditionKind::VariableEquals => {
                        let name = required(action, variable.as_deref(), "variable")?;
                        let expected = required(action, expected.as_deref(), "expected")?;
                        ctx.variables.display(name) == expected
                    }
                };
                tracing::debug!(?predicate, holds, "condition evaluated");
                let branch = if holds { then_actions } else { else_actions };
                self.execute_all(branch, ctx).await
            }
            ActionKind::Loop {
                loop_kind,
                count,
                template,
                max_iterations,
                actions,
            } => {
                let limit = max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS);
                let mut iteration: u32 = 0;
                loop {
                    self.control.wait_while_paused().await;
                    self.control.checkpoint()?;

                    let proceed = match loop_kind {
                        LoopKind::Count => iteration < count.unwrap_or_default(),
                        LoopKind::Infinite => true,
                        LoopKind::WhileImageVisible | LoopKind::UntilImageVisible
                            if iteration >= limit =>
                        {
                            true
                        }
                        LoopKind::WhileImageVisible => {
                            let template = required(action, template.as_deref(), "template")?;
                            self.is_visible(template, ctx).await?
                        }
                        LoopKind::UntilImageVisible => {
                            let template = required(action, template.as_deref(), "template")?;
                            !self.is_visible(template, ctx).await?
                        }
                    };
                    if !proceed {
                        break;
                    }
                    if iteration >= limit {
                        tracing::warn!(
                            action_id = %action.id,
                            limit,
                            "loop reached its iteration limit"
                        );
                        break;
                    }

                    tracing::debug!(action_id = %action.id, iteration, "loop iteration");
                    self.execute_all(actions, ctx).await?;
                    iteration += 1;
                }
                Ok(())
            }
        }
    }

    /// Execute a nested sequence in order, honouring each step's explicit
    /// delays.
    fn execute_all<'s>(
        &'s self,
        actions: &'s [Action],
        ctx: &'s mut ExecutionContext,
    ) -> BoxFuture<'s, Result<(), StepError>> {
        Box::pin(async move {
            for action in actions {
                if let Some(ms) = action.delay_before_ms {
                    self.control.sleep(millis(ms)).await?;
                }
                self.execute(action, ctx).await?;
                if let Some(ms) = action.delay_after_ms {
                    self.control.sleep(millis(ms)).await?;
                }
            }
            Ok(())
        })
    }

    async fn click(
        &self,
        kind: ClickKind,
        click: &ClickAction,
        ctx: &ExecutionContext,
    ) -> Result<(), StepError> {
        let mut point = self
            .resolve_target(&click.target, ctx)
            .await?
            .offset(click.offset_x, click.offset_y);
        if click.random_offset > 0 {
            let range = u64::from(click.random_offset);
            point = point.offset(pixels(jitter(range)), pixels(jitter(range)));
        }

        tracing::debug!(?kind, %point, target = %click.target, "clicking");
        match kind {
            ClickKind::Single => self.input.click(Some(point)).await?,
            ClickKind::Double => self.input.double_click(Some(point)).await?,
            ClickKind::Right => self.input.right_click(Some(point)).await?,
        }
        Ok(())
    }

    async fn resolve_target(
        &self,
        target: &ClickTarget,
        ctx: &ExecutionContext,
    ) -> Result<Point, StepError> {
        match target {
            ClickTarget::Coordinates { x, y } => Ok(Point::new(*x, *y)),
            ClickTarget::Image { template } => self
                .find(template, None, None, ctx)
                .await?
                .location()
                .ok_or_else(|| StepError::TargetNotFound {
                    template: template.clone(),
                }),
            ClickTarget::Variable { name } => {
                ctx.variables
                    .point(name)
                    .ok_or_else(|| StepError::InvalidVariable { name: name.clone() })
            }
        }
    }

    async fn hotkey(&self, names: &[String]) -> Result<(), StepError> {
        let mut keys = Vec::with_capacity(names.len());
        for name in names {
            match Key::from_name(name) {
                Some(key) => keys.push(key),
                None => tracing::warn!(key = %name, "skipping unknown hotkey key"),
            }
        }
        if keys.is_empty() {
            return Err(StepError::UnknownKey {
                keys: names.to_vec(),
            });
        }

        tracing::debug!(?keys, "pressing hotkey");
        self.input.hotkey(&keys).await?;
        Ok(())
    }

    async fn wait_for_image(
        &self,
        template: &str,
        timeout_ms: u64,
        confidence: Option<f32>,
        disappear: bool,
        ctx: &ExecutionContext,
    ) -> Result<MatchResult, StepError> {
        let deadline = Instant::now() + millis(timeout_ms);
        loop {
            let result = self.find(template, confidence, None, ctx).await?;
            if result.found != disappear {
                tracing::debug!(template, disappear, "image wait satisfied");
                return Ok(result);
            }
            if Instant::now() >= deadline {
                return Err(StepError::Timeout {
                    template: template.to_string(),
                    timeout_ms,
                    disappear,
                });
            }
            self.control.sleep(PERCEPTION_POLL).await?;
        }
    }

    async fn is_visible(&self, template: &str, ctx: &ExecutionContext) -> Result<bool, StepError> {
        Ok(self.find(template, None, None, ctx).await?.found)
    }

    /// Search with the step's settings, falling back to the run's defaults.
    async fn find(
        &self,
        template: &str,
        confidence: Option<f32>,
        region: Option<Region>,
        ctx: &ExecutionContext,
    ) -> Result<MatchResult, MacrobotError> {
        let confidence = confidence.unwrap_or(ctx.config.default_confidence);
        let region = region.or(ctx.config.capture_region);
        self.vision.find(template, Some(confidence), region).await
    }
}

fn required<'v>(
    action: &Action,
    value: Option<&'v str>,
    field: &'static str,
) -> Result<&'v str, StepError> {
    value.ok_or_else(|| {
        MacrobotError::from(ValidationError::MissingField {
            action_id: action.id.clone(),
            field,
        })
        .into()
    })
}

/// A uniform offset in `-range..=range`.
pub(crate) fn jitter(range: u64) -> i64 {
    if range == 0 {
        return 0;
    }
    let range = i64::try_from(range).unwrap_or(i64::MAX);
    rand::thread_rng().gen_range(-range..=range)
}

fn pixels(offset: i64) -> i32 {
    i32::try_from(offset).unwrap_or_default()
}
