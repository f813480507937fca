//! Runner — sequences the top-level actions of one task.
//!
//! Between two top-level steps the runner honours a pending pause and a
//! stop request, then applies the step's delays around the dispatch.
//! `continue_on_error` is evaluated here and nowhere else.

use std::future::Future;
use std::time::Duration;

use macrobot_domain::action::Action;
use macrobot_domain::error::StepError;
use macrobot_domain::id::ActionId;
use macrobot_domain::state::RunStatus;
use macrobot_domain::task::Task;
use macrobot_domain::time::{jittered_millis, millis};

use crate::context::ExecutionContext;
use crate::control::RunControl;
use crate::dispatcher::{Dispatcher, jitter};
use crate::ports::{InputDevice, Vision};

/// Lower bound of a jittered post-step delay.
pub const MIN_STEP_DELAY_MS: u64 = 10;

/// How a run ended when no step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// Stopped before top-level step `at_index` began.
    Stopped { at_index: usize },
}

impl RunOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Stopped { .. } => "stopped",
        }
    }
}

/// A top-level step failed without `continue_on_error`.
#[derive(Debug, thiserror::Error)]
#[error("action {action_id} (step {index}) failed: {source}")]
pub struct RunFailure {
    pub index: usize,
    pub action_id: ActionId,
    pub source: StepError,
}

/// Progress hooks called by the runner. Every hook defaults to a no-op.
pub trait RunObserver {
    fn step_started(
        &self,
        _index: usize,
        _total: usize,
        _action: &Action,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    fn step_completed(
        &self,
        _index: usize,
        _total: usize,
        _action: &Action,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// `continued` tells whether the run goes on past this failure.
    fn step_failed(
        &self,
        _index: usize,
        _total: usize,
        _action: &Action,
        _error: &StepError,
        _continued: bool,
    ) -> impl Future<Output = ()> + Send {
        async {}
    }

    /// The run is about to block on a pause before step `index`.
    fn paused(&self, _index: usize) -> impl Future<Output = ()> + Send {
        async {}
    }
}

impl RunObserver for () {}

pub struct Runner<'a, I, V> {
    dispatcher: Dispatcher<'a, I, V>,
    control: &'a RunControl,
}

impl<'a, I: InputDevice, V: Vision> Runner<'a, I, V> {
    pub fn new(input: &'a I, vision: &'a V, control: &'a RunControl) -> Self {
        Self {
            dispatcher: Dispatcher::new(input, vision, control),
            control,
        }
    }

    /// Walk the task's top-level actions in order.
    ///
    /// # Errors
    ///
    /// Returns [`RunFailure`] for the first failing step whose
    /// `continue_on_error` is unset. A stop is not a failure; it ends the
    /// run with [`RunOutcome::Stopped`].
    pub async fn run<O: RunObserver + Sync>(
        &self,
        task: &Task,
        ctx: &mut ExecutionContext,
        observer: &O,
    ) -> Result<RunOutcome, RunFailure> {
        let total = task.actions.len();
        ctx.status = RunStatus::Running;

        for (index, action) in task.actions.iter().enumerate() {
            ctx.current_index = index;

            if self.control.is_paused() && !self.control.is_stopped() {
                ctx.status = RunStatus::Paused;
                observer.paused(index).await;
                self.control.wait_while_paused().await;
                ctx.status = RunStatus::Running;
            }
            if self.control.is_stopped() {
                return Ok(stopped(ctx, index));
            }

            observer.step_started(index, total, action).await;
            tracing::debug!(index, total, action = %action, "step started");

            match self.step(action, ctx).await {
                Ok(()) => {
                    observer.step_completed(index, total, action).await;
                    if self.post_delay(action, ctx).await.is_err() {
                        return Ok(stopped(ctx, index + 1));
                    }
                }
                Err(err) if err.is_interrupted() => {
                    return Ok(stopped(ctx, index));
                }
                Err(err) if action.continue_on_error => {
                    tracing::warn!(
                        index,
                        action_id = %action.id,
                        error = %err,
                        "step failed, continuing"
                    );
                    observer.step_failed(index, total, action, &err, true).await;
                }
                Err(err) => {
                    observer.step_failed(index, total, action, &err, false).await;
                    let failure = RunFailure {
                        index,
                        action_id: action.id.clone(),
                        source: err,
                    };
                    ctx.status = RunStatus::Failed;
                    ctx.error = Some(failure.to_string());
                    return Err(failure);
                }
            }
        }

        ctx.status = RunStatus::Completed;
        Ok(RunOutcome::Completed)
    }

    async fn step(&self, action: &Action, ctx: &mut ExecutionContext) -> Result<(), StepError> {
        if let Some(ms) = action.delay_before_ms {
            self.control.sleep(millis(ms)).await?;
        }
        self.dispatcher.execute(action, ctx).await
    }

    async fn post_delay(&self, action: &Action, ctx: &ExecutionContext) -> Result<(), StepError> {
        let delay = post_step_delay(
            action.delay_after_ms.unwrap_or(ctx.config.default_delay_ms),
            ctx.config.random_delay_variation_ms,
        );
        self.control.sleep(delay).await
    }
}

fn stopped(ctx: &mut ExecutionContext, at_index: usize) -> RunOutcome {
    tracing::info!(at_index, "run stopped");
    ctx.status = RunStatus::Stopped;
    RunOutcome::Stopped { at_index }
}

/// A zero base means no delay; anything else is jittered and floored.
fn post_step_delay(base_ms: u64, variation_ms: u64) -> Duration {
    if base_ms == 0 {
        Duration::ZERO
    } else {
        jittered_millis(base_ms, jitter(variation_ms), MIN_STEP_DELAY_MS)
    }
}
