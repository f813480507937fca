//! Automation engine — owns the single active run and the shared
//! [`AutomationState`].
//!
//! Every state mutation goes through one place that also broadcasts a
//! `status_changed` event, so observers never see a half-updated state.
//! Control calls (`pause`, `resume`, `stop`, `emergency_stop`, `status`)
//! take `&self` and can be issued from other tasks while `start_task`
//! awaits the run.

use std::future::Future;
use std::sync::{Mutex, PoisonError};

use macrobot_domain::action::Action;
use macrobot_domain::error::{MacrobotError, StepError, ValidationErrors};
use macrobot_domain::event::{Event, EventType};
use macrobot_domain::id::TaskId;
use macrobot_domain::state::{AutomationState, AutomationStatus};
use macrobot_domain::time::now;

use crate::context::ExecutionContext;
use crate::control::RunControl;
use crate::ports::{EventPublisher, InputDevice, SettingsRepository, TaskRepository, Vision};
use crate::runner::{RunFailure, RunObserver, RunOutcome, Runner};

/// `last_error` recorded by [`AutomationEngine::emergency_stop`].
pub const EMERGENCY_STOP_MESSAGE: &str = "Emergency stop activated";

/// Reasons a run could not start, or how it failed.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("a task is already running")]
    AlreadyRunning,

    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("task is disabled: {0}")]
    TaskDisabled(TaskId),

    #[error(transparent)]
    Invalid(#[from] ValidationErrors),

    #[error(transparent)]
    Storage(#[from] MacrobotError),

    #[error(transparent)]
    Run(#[from] RunFailure),
}

/// Runs one task at a time against the input and vision ports.
pub struct AutomationEngine<TR, SR, P, I, V> {
    tasks: TR,
    settings: SR,
    publisher: P,
    input: I,
    vision: V,
    state: Mutex<AutomationState>,
    /// Control of the active run; set from start until the run has wound down.
    current: Mutex<Option<RunControl>>,
}

impl<TR, SR, P, I, V> AutomationEngine<TR, SR, P, I, V>
where
    TR: TaskRepository + Send + Sync,
    SR: SettingsRepository + Send + Sync,
    P: EventPublisher + Send + Sync,
    I: InputDevice,
    V: Vision,
{
    /// Create a new idle engine.
    pub fn new(tasks: TR, settings: SR, publisher: P, input: I, vision: V) -> Self {
        Self {
            tasks,
            settings,
            publisher,
            input,
            vision,
            state: Mutex::new(AutomationState::default()),
            current: Mutex::new(None),
        }
    }

    /// Independent copy of the current state.
    #[must_use]
    pub fn status(&self) -> AutomationState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Run a stored task to its end.
    ///
    /// Preconditions are checked in order: another run active, task
    /// missing, task disabled, task invalid. None of them starts a run.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AlreadyRunning`], [`EngineError::TaskNotFound`],
    /// [`EngineError::TaskDisabled`] or [`EngineError::Invalid`] when a
    /// precondition fails, [`EngineError::Storage`] if loading the task or
    /// the settings fails, and [`EngineError::Run`] when a step fails.
    #[tracing::instrument(skip(self))]
    pub async fn start_task(&self, task_id: TaskId) -> Result<RunOutcome, EngineError> {
        if self.is_busy() {
            return Err(EngineError::AlreadyRunning);
        }
        let task = self
            .tasks
            .get_by_id(task_id)
            .await?
            .ok_or(EngineError::TaskNotFound(task_id))?;
        if !task.enabled {
            return Err(EngineError::TaskDisabled(task_id));
        }
        task.validate()?;
        let config = self.settings.get_automation_config().await?;

        let control = RunControl::new();
        let total = task.actions.len();
        let claimed = self.transition(|current, state| {
            if current.is_some() || state.status != AutomationStatus::Idle {
                return false;
            }
            *current = Some(control.clone());
            state.status = AutomationStatus::Running;
            state.current_task_id = Some(task_id);
            state.current_index = Some(0);
            state.total_actions = Some(total);
            state.started_at = Some(now());
            state.last_error = None;
            true
        });
        let Some(snapshot) = claimed else {
            return Err(EngineError::AlreadyRunning);
        };
        self.broadcast(snapshot).await;
        tracing::info!(task = %task.name, total, "run started");

        let mut ctx = ExecutionContext::new(task_id, config);
        let observer = Progress {
            engine: self,
            task_id,
        };
        let result = Runner::new(&self.input, &self.vision, &control)
            .run(&task, &mut ctx, &observer)
            .await;

        self.record_statistics(task_id, result.is_ok()).await;
        self.finish(task_id, &result).await;
        result.map_err(EngineError::from)
    }

    /// Ask the active run to pause at its next suspension point.
    ///
    /// Returns `false` unless a run is currently running.
    pub async fn pause(&self) -> bool {
        let snapshot = self.transition(|current, state| match current {
            Some(control) if state.status == AutomationStatus::Running => {
                control.pause();
                state.status = AutomationStatus::Paused;
                true
            }
            _ => false,
        });
        self.broadcast_changed(snapshot, "run paused").await
    }

    /// Release a pause. Returns `false` unless the run is paused.
    pub async fn resume(&self) -> bool {
        let snapshot = self.transition(|current, state| match current {
            Some(control) if state.status == AutomationStatus::Paused => {
                control.resume();
                state.status = AutomationStatus::Running;
                true
            }
            _ => false,
        });
        self.broadcast_changed(snapshot, "run resumed").await
    }

    /// Ask the active run to stop before its next top-level step.
    ///
    /// Does nothing when the engine is idle. The status stays `stopping`
    /// until the run has wound down.
    pub async fn stop(&self) -> bool {
        let snapshot = self.transition(|current, state| match current {
            Some(control)
                if matches!(
                    state.status,
                    AutomationStatus::Running | AutomationStatus::Paused
                ) =>
            {
                control.stop();
                state.status = AutomationStatus::Stopping;
                state.clear_progress();
                true
            }
            _ => false,
        });
        self.broadcast_changed(snapshot, "stop requested").await
    }

    /// Stop whatever is running and force the engine back to idle with an
    /// error recorded. Safe to call at any time.
    pub async fn emergency_stop(&self) {
        let snapshot = self.transition(|current, state| {
            if let Some(control) = current {
                control.stop();
            }
            state.status = AutomationStatus::Idle;
            state.clear_progress();
            state.last_error = Some(EMERGENCY_STOP_MESSAGE.to_string());
            true
        });
        tracing::warn!("emergency stop activated");
        if let Some(snapshot) = snapshot {
            self.broadcast(snapshot).await;
        }
    }

    /// Move `current_index` while a run is active. A stopping or idle
    /// engine keeps its cleared progress.
    fn advance(&self, index: usize) -> Option<AutomationState> {
        self.transition(|_, state| {
            if matches!(
                state.status,
                AutomationStatus::Running | AutomationStatus::Paused
            ) {
                state.current_index = Some(index);
                true
            } else {
                false
            }
        })
    }

    fn is_busy(&self) -> bool {
        let current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        current.is_some() || self.status().status != AutomationStatus::Idle
    }

    /// Apply `mutate` while holding both locks, returning a snapshot when it
    /// reported a change. Lock order is always `current` then `state`.
    fn transition<F>(&self, mutate: F) -> Option<AutomationState>
    where
        F: FnOnce(&mut Option<RunControl>, &mut AutomationState) -> bool,
    {
        let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        mutate(&mut current, &mut state).then(|| state.clone())
    }

    async fn broadcast_changed(&self, snapshot: Option<AutomationState>, message: &str) -> bool {
        match snapshot {
            Some(snapshot) => {
                tracing::info!("{message}");
                self.broadcast(snapshot).await;
                true
            }
            None => false,
        }
    }

    async fn broadcast(&self, snapshot: AutomationState) {
        let data = serde_json::to_value(&snapshot).unwrap_or_default();
        self.publish(EventType::StatusChanged, snapshot.current_task_id, data)
            .await;
    }

    async fn publish(&self, event_type: EventType, task_id: Option<TaskId>, data: serde_json::Value) {
        let event = Event::new(event_type, task_id, data);
        if let Err(err) = self.publisher.publish(event).await {
            tracing::warn!(error = %err, %event_type, "failed to publish event");
        }
    }

    /// Persist run statistics; a storage failure never changes the outcome.
    async fn record_statistics(&self, task_id: TaskId, success: bool) {
        let mut task = match self.tasks.get_by_id(task_id).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                tracing::warn!(%task_id, "task vanished before its statistics were recorded");
                return;
            }
            Err(err) => {
                tracing::error!(%task_id, error = %err, "failed to reload task statistics");
                return;
            }
        };
        task.record_run(success, now());
        if let Err(err) = self.tasks.save(task).await {
            tracing::error!(%task_id, error = %err, "failed to save task statistics");
        }
    }

    async fn finish(&self, task_id: TaskId, result: &Result<RunOutcome, RunFailure>) {
        let snapshot = self.transition(|current, state| {
            *current = None;
            state.status = AutomationStatus::Idle;
            state.clear_progress();
            match result {
                Ok(_) => state.execution_count += 1,
                Err(failure) => state.last_error = Some(failure.to_string()),
            }
            true
        });
        if let Some(snapshot) = snapshot {
            self.broadcast(snapshot).await;
        }

        let data = match result {
            Ok(outcome) => {
                tracing::info!(outcome = outcome.as_str(), "run finished");
                serde_json::json!({ "outcome": outcome.as_str() })
            }
            Err(failure) => {
                tracing::error!(error = %failure, "run failed");
                serde_json::json!({
                    "outcome": "failed",
                    "index": failure.index,
                    "action_id": failure.action_id,
                    "error": failure.to_string(),
                })
            }
        };
        self.publish(EventType::RunFinished, Some(task_id), data)
            .await;
    }
}

/// Bridges runner hooks to engine state and step events.
struct Progress<'e, TR, SR, P, I, V> {
    engine: &'e AutomationEngine<TR, SR, P, I, V>,
    task_id: TaskId,
}

impl<TR, SR, P, I, V> Progress<'_, TR, SR, P, I, V>
where
    TR: TaskRepository + Send + Sync,
    SR: SettingsRepository + Send + Sync,
    P: EventPublisher + Send + Sync,
    I: InputDevice,
    V: Vision,
{
    fn step_data(index: usize, total: usize, action: &Action) -> serde_json::Value {
        serde_json::json!({
            "index": index,
            "total": total,
            "action_id": action.id,
            "action": action.to_string(),
        })
    }
}

impl<TR, SR, P, I, V> RunObserver for Progress<'_, TR, SR, P, I, V>
where
    TR: TaskRepository + Send + Sync,
    SR: SettingsRepository + Send + Sync,
    P: EventPublisher + Send + Sync,
    I: InputDevice,
    V: Vision,
{
    fn step_started(
        &self,
        index: usize,
        total: usize,
        action: &Action,
    ) -> impl Future<Output = ()> + Send {
        let snapshot = self.engine.advance(index);
        let data = Self::step_data(index, total, action);
        async move {
            if let Some(snapshot) = snapshot {
                self.engine.broadcast(snapshot).await;
            }
            self.engine
                .publish(EventType::StepStarted, Some(self.task_id), data)
                .await;
        }
    }

    /// The finished step no longer counts as current.
    fn step_completed(
        &self,
        index: usize,
        total: usize,
        action: &Action,
    ) -> impl Future<Output = ()> + Send {
        let snapshot = self.engine.advance(index + 1);
        let data = Self::step_data(index, total, action);
        async move {
            if let Some(snapshot) = snapshot {
                self.engine.broadcast(snapshot).await;
            }
            self.engine
                .publish(EventType::StepCompleted, Some(self.task_id), data)
                .await;
        }
    }

    fn step_failed(
        &self,
        index: usize,
        total: usize,
        action: &Action,
        error: &StepError,
        continued: bool,
    ) -> impl Future<Output = ()> + Send {
        let mut data = Self::step_data(index, total, action);
        data["error"] = serde_json::Value::String(error.to_string());
        data["continued"] = serde_json::Value::Bool(continued);
        self.engine
            .publish(EventType::StepFailed, Some(self.task_id), data)
    }

    fn paused(&self, index: usize) -> impl Future<Output = ()> + Send {
        tracing::info!(index, "run waiting for resume");
        async {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::{broadcast, mpsc};

    use macrobot_domain::action::{ActionKind, ClickAction, ClickTarget};
    use macrobot_domain::config::AutomationConfig;
    use macrobot_domain::error::NotFoundError;
    use macrobot_domain::geometry::{MatchResult, Point, Region};
    use macrobot_domain::key::Key;
    use macrobot_domain::task::Task;

    use crate::event_bus::InProcessEventBus;

    #[derive(Default)]
    struct InMemoryTaskRepo {
        store: Mutex<HashMap<TaskId, Task>>,
        fail_saves: bool,
    }

    impl TaskRepository for InMemoryTaskRepo {
        fn get_by_id(
            &self,
            id: TaskId,
        ) -> impl Future<Output = Result<Option<Task>, MacrobotError>> + Send {
            let result = self.store.lock().unwrap().get(&id).cloned();
            async { Ok(result) }
        }

        fn get_all(&self) -> impl Future<Output = Result<Vec<Task>, MacrobotError>> + Send {
            let result: Vec<Task> = self.store.lock().unwrap().values().cloned().collect();
            async { Ok(result) }
        }

        fn save(&self, task: Task) -> impl Future<Output = Result<Task, MacrobotError>> + Send {
            let result = if self.fail_saves {
                Err(MacrobotError::Storage("disk full".into()))
            } else {
                self.store.lock().unwrap().insert(task.id, task.clone());
                Ok(task)
            };
            async { result }
        }

        fn delete(&self, id: TaskId) -> impl Future<Output = Result<(), MacrobotError>> + Send {
            let removed = self.store.lock().unwrap().remove(&id);
            async move {
                removed.map(|_| ()).ok_or_else(|| {
                    NotFoundError {
                        entity: "Task",
                        id: id.to_string(),
                    }
                    .into()
                })
            }
        }
    }

    struct FixedSettings(AutomationConfig);

    impl SettingsRepository for FixedSettings {
        fn get_automation_config(
            &self,
        ) -> impl Future<Output = Result<AutomationConfig, MacrobotError>> + Send {
            let config = self.0.clone();
            async { Ok(config) }
        }

        fn save_automation_config(
            &self,
            _config: AutomationConfig,
        ) -> impl Future<Output = Result<(), MacrobotError>> + Send {
            async { Ok(()) }
        }
    }

    /// Records every clicked x and reports it on a channel.
    struct ClickLog {
        clicks: Mutex<Vec<i32>>,
        notify: mpsc::UnboundedSender<i32>,
        /// When set, clicks fail with this device message.
        broken: Mutex<Option<&'static str>>,
    }

    impl InputDevice for ClickLog {
        fn move_to(
            &self,
            _point: Point,
            _humanized: bool,
        ) -> impl Future<Output = Result<(), MacrobotError>> + Send {
            async { Ok(()) }
        }

        fn click(
            &self,
            point: Option<Point>,
        ) -> impl Future<Output = Result<(), MacrobotError>> + Send {
            let result = match *self.broken.lock().unwrap() {
                Some(message) => Err(MacrobotError::device(message)),
                None => {
                    let x = point.map_or(-1, |p| p.x);
                    self.clicks.lock().unwrap().push(x);
                    let _ = self.notify.send(x);
                    Ok(())
                }
            };
            async { result }
        }

        fn double_click(
            &self,
            point: Option<Point>,
        ) -> impl Future<Output = Result<(), MacrobotError>> + Send {
            self.click(point)
        }

        fn right_click(
            &self,
            point: Option<Point>,
        ) -> impl Future<Output = Result<(), MacrobotError>> + Send {
            self.click(point)
        }

        fn type_text(
            &self,
            _text: &str,
            _delay: Option<Duration>,
        ) -> impl Future<Output = Result<(), MacrobotError>> + Send {
            async { Ok(()) }
        }

        fn key_down(&self, _key: Key) -> impl Future<Output = Result<(), MacrobotError>> + Send {
            async { Ok(()) }
        }

        fn key_up(&self, _key: Key) -> impl Future<Output = Result<(), MacrobotError>> + Send {
            async { Ok(()) }
        }

        fn press_key(&self, _key: Key) -> impl Future<Output = Result<(), MacrobotError>> + Send {
            async { Ok(()) }
        }

        fn drag(
            &self,
            _from: Point,
            _to: Point,
        ) -> impl Future<Output = Result<(), MacrobotError>> + Send {
            async { Ok(()) }
        }

        fn scroll(&self, _amount: i32) -> impl Future<Output = Result<(), MacrobotError>> + Send {
            async { Ok(()) }
        }
    }

    struct EmptyScreen;

    impl Vision for EmptyScreen {
        fn find(
            &self,
            _template: &str,
            _confidence: Option<f32>,
            _region: Option<Region>,
        ) -> impl Future<Output = Result<MatchResult, MacrobotError>> + Send {
            async { Ok(MatchResult::not_found()) }
        }
    }

    type TestEngine = AutomationEngine<
        Arc<InMemoryTaskRepo>,
        FixedSettings,
        Arc<InProcessEventBus>,
        Arc<ClickLog>,
        EmptyScreen,
    >;

    struct Harness {
        engine: Arc<TestEngine>,
        repo: Arc<InMemoryTaskRepo>,
        input: Arc<ClickLog>,
        clicks: mpsc::UnboundedReceiver<i32>,
        events: broadcast::Receiver<Event>,
    }

    fn harness_with(repo: InMemoryTaskRepo, default_delay_ms: u64) -> Harness {
        let repo = Arc::new(repo);
        let bus = Arc::new(InProcessEventBus::new(256));
        let events = bus.subscribe();
        let (notify, clicks) = mpsc::unbounded_channel();
        let input = Arc::new(ClickLog {
            clicks: Mutex::new(Vec::new()),
            notify,
            broken: Mutex::new(None),
        });
        let settings = FixedSettings(AutomationConfig {
            default_delay_ms,
            random_delay_variation_ms: 0,
            ..AutomationConfig::default()
        });
        let engine = Arc::new(AutomationEngine::new(
            repo.clone(),
            settings,
            bus,
            input.clone(),
            EmptyScreen,
        ));
        Harness {
            engine,
            repo,
            input,
            clicks,
            events,
        }
    }

    fn harness(default_delay_ms: u64) -> Harness {
        harness_with(InMemoryTaskRepo::default(), default_delay_ms)
    }

    impl Harness {
        fn store(&self, task: Task) -> TaskId {
            let id = task.id;
            self.repo.store.lock().unwrap().insert(id, task);
            id
        }

        fn clicks(&self) -> Vec<i32> {
            self.input.clicks.lock().unwrap().clone()
        }

        fn stored(&self, id: TaskId) -> Task {
            self.repo.store.lock().unwrap().get(&id).cloned().unwrap()
        }

        fn drain_events(&mut self) -> Vec<Event> {
            let mut events = Vec::new();
            while let Ok(event) = self.events.try_recv() {
                events.push(event);
            }
            events
        }
    }

    fn click_at(id: &str, x: i32) -> Action {
        Action::new(
            id,
            ActionKind::Click(ClickAction::at(ClickTarget::Coordinates { x, y: 0 })),
        )
    }

    fn clicks_task(xs: &[i32]) -> Task {
        Task::builder()
            .name("clicks")
            .actions(
                xs.iter()
                    .enumerate()
                    .map(|(i, x)| click_at(&format!("c{i}"), *x)),
            )
            .build()
            .unwrap()
    }

    fn failing_task() -> Task {
        Task::builder()
            .name("failing")
            .action(Action::new(
                "missing",
                ActionKind::Click(ClickAction::at(ClickTarget::Image {
                    template: "missing.png".into(),
                })),
            ))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn should_complete_run_and_record_statistics() {
        let h = harness(0);
        let id = h.store(clicks_task(&[1, 2]));

        let outcome = h.engine.start_task(id).await.unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(h.clicks(), vec![1, 2]);
        let state = h.engine.status();
        assert_eq!(state.status, AutomationStatus::Idle);
        assert_eq!(state.execution_count, 1);
        assert!(state.current_task_id.is_none());
        assert!(state.started_at.is_none());
        let stored = h.stored(id);
        assert_eq!(stored.run_count, 1);
        assert_eq!(stored.last_run_success, Some(true));
        assert!(stored.last_run_at.is_some());
    }

    #[tokio::test]
    async fn should_return_task_not_found_when_task_missing() {
        let h = harness(0);
        let err = h.engine.start_task(TaskId::new()).await.unwrap_err();
        assert!(matches!(err, EngineError::TaskNotFound(_)));
        assert_eq!(h.engine.status().status, AutomationStatus::Idle);
    }

    #[tokio::test]
    async fn should_return_task_disabled_when_task_disabled() {
        let h = harness(0);
        let mut task = clicks_task(&[1]);
        task.enabled = false;
        let id = h.store(task);

        let err = h.engine.start_task(id).await.unwrap_err();

        assert!(matches!(err, EngineError::TaskDisabled(_)));
        assert!(h.clicks().is_empty());
    }

    #[tokio::test]
    async fn should_reject_invalid_task_before_running() {
        let h = harness(0);
        let mut task = clicks_task(&[1, 2]);
        task.actions[1].id = "c0".into();
        let id = h.store(task);

        let err = h.engine.start_task(id).await.unwrap_err();

        assert!(matches!(err, EngineError::Invalid(_)));
        assert!(h.clicks().is_empty());
        assert_eq!(h.stored(id).run_count, 0);
    }

    #[tokio::test]
    async fn should_record_failure_and_last_error_when_step_fails() {
        let h = harness(0);
        let id = h.store(failing_task());

        let err = h.engine.start_task(id).await.unwrap_err();

        assert!(matches!(err, EngineError::Run(_)));
        let state = h.engine.status();
        assert_eq!(state.status, AutomationStatus::Idle);
        assert_eq!(state.execution_count, 0);
        assert!(state.last_error.as_deref().unwrap().contains("missing.png"));
        let stored = h.stored(id);
        assert_eq!(stored.run_count, 1);
        assert_eq!(stored.last_run_success, Some(false));
    }

    #[tokio::test]
    async fn should_keep_device_message_in_last_error() {
        let mut h = harness(0);
        *h.input.broken.lock().unwrap() = Some("pointer unavailable");
        let id = h.store(clicks_task(&[1]));

        let err = h.engine.start_task(id).await.unwrap_err();

        assert!(err.to_string().contains("pointer unavailable"));
        let last_error = h.engine.status().last_error.unwrap();
        assert!(last_error.contains("pointer unavailable"));
        let finished = h.drain_events().pop().unwrap();
        assert_eq!(finished.event_type, EventType::RunFinished);
        assert!(
            finished.data["error"]
                .as_str()
                .unwrap()
                .contains("pointer unavailable")
        );
    }

    #[tokio::test]
    async fn should_clear_last_error_on_next_successful_start() {
        let h = harness(0);
        let failing = h.store(failing_task());
        let passing = h.store(clicks_task(&[1]));

        let _ = h.engine.start_task(failing).await;
        h.engine.start_task(passing).await.unwrap();

        assert!(h.engine.status().last_error.is_none());
    }

    #[tokio::test]
    async fn should_keep_outcome_when_saving_statistics_fails() {
        let h = harness_with(
            InMemoryTaskRepo {
                fail_saves: true,
                ..InMemoryTaskRepo::default()
            },
            0,
        );
        let id = h.store(clicks_task(&[1]));

        let outcome = h.engine.start_task(id).await.unwrap();

        assert_eq!(outcome, RunOutcome::Completed);
        assert_eq!(h.engine.status().execution_count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn should_reject_second_start_while_running() {
        let mut h = harness(1_000);
        let first = h.store(clicks_task(&[1, 2]));
        let second = h.store(clicks_task(&[9]));

        let engine = h.engine.clone();
        let run = tokio::spawn(async move { engine.start_task(first).await });
        assert_eq!(h.clicks.recv().await, Some(1));

        let err = h.engine.start_task(second).await.unwrap_err();
        assert!(matches!(err, EngineError::AlreadyRunning));

        assert_eq!(run.await.unwrap().unwrap(), RunOutcome::Completed);
        assert_eq!(h.clicks(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_run_and_accept_new_start_once_idle() {
        let mut h = harness(1_000);
        let first = h.store(clicks_task(&[1, 2, 3]));
        let second = h.store(clicks_task(&[7]));

        let engine = h.engine.clone();
        let run = tokio::spawn(async move { engine.start_task(first).await });
        assert_eq!(h.clicks.recv().await, Some(1));

        assert!(h.engine.stop().await);
        let state = h.engine.status();
        assert_eq!(state.status, AutomationStatus::Stopping);
        assert!(state.current_index.is_none());

        let outcome = run.await.unwrap().unwrap();
        assert_eq!(outcome, RunOutcome::Stopped { at_index: 1 });
        assert_eq!(h.engine.status().status, AutomationStatus::Idle);
        assert_eq!(h.engine.status().execution_count, 1);

        h.engine.start_task(second).await.unwrap();
        assert_eq!(h.clicks(), vec![1, 7]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_advance_current_index_when_step_completes() {
        let mut h = harness(0);
        let id = h.store(
            Task::builder()
                .name("slow")
                .action(click_at("a", 1).with_delay_after(10_000))
                .action(click_at("b", 2).with_delay_after(10_000))
                .build()
                .unwrap(),
        );

        let engine = h.engine.clone();
        let run = tokio::spawn(async move { engine.start_task(id).await });

        assert_eq!(h.clicks.recv().await, Some(1));
        tokio::time::sleep(Duration::from_secs(1)).await;
        let state = h.engine.status();
        assert_eq!(state.current_index, Some(1));
        assert_eq!(state.total_actions, Some(2));

        assert_eq!(h.clicks.recv().await, Some(2));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(h.engine.status().current_index, Some(2));

        assert_eq!(run.await.unwrap().unwrap(), RunOutcome::Completed);
        assert!(h.engine.status().current_index.is_none());
    }

    #[tokio::test]
    async fn should_ignore_control_calls_when_idle() {
        let h = harness(0);
        assert!(!h.engine.pause().await);
        assert!(!h.engine.resume().await);
        assert!(!h.engine.stop().await);
        assert_eq!(h.engine.status(), AutomationState::default());
    }

    #[tokio::test(start_paused = true)]
    async fn should_pause_and_resume_without_skipping_steps() {
        let mut h = harness(100);
        let id = h.store(clicks_task(&[1, 2, 3]));

        let engine = h.engine.clone();
        let run = tokio::spawn(async move { engine.start_task(id).await });
        assert_eq!(h.clicks.recv().await, Some(1));

        assert!(h.engine.pause().await);
        assert!(!h.engine.pause().await);
        assert_eq!(h.engine.status().status, AutomationStatus::Paused);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(h.clicks(), vec![1]);

        assert!(h.engine.resume().await);
        assert_eq!(h.engine.status().status, AutomationStatus::Running);

        assert_eq!(run.await.unwrap().unwrap(), RunOutcome::Completed);
        assert_eq!(h.clicks(), vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_stop_paused_run() {
        let mut h = harness(100);
        let id = h.store(clicks_task(&[1, 2]));

        let engine = h.engine.clone();
        let run = tokio::spawn(async move { engine.start_task(id).await });
        assert_eq!(h.clicks.recv().await, Some(1));

        h.engine.pause().await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(h.engine.stop().await);

        assert_eq!(
            run.await.unwrap().unwrap(),
            RunOutcome::Stopped { at_index: 1 }
        );
        assert_eq!(h.clicks(), vec![1]);
    }

    #[tokio::test(start_paused = true)]
    async fn should_force_idle_with_error_on_emergency_stop() {
        let mut h = harness(1_000);
        let first = h.store(clicks_task(&[1, 2]));
        let second = h.store(clicks_task(&[5]));

        let engine = h.engine.clone();
        let run = tokio::spawn(async move { engine.start_task(first).await });
        assert_eq!(h.clicks.recv().await, Some(1));

        h.engine.emergency_stop().await;
        let state = h.engine.status();
        assert_eq!(state.status, AutomationStatus::Idle);
        assert_eq!(state.last_error.as_deref(), Some(EMERGENCY_STOP_MESSAGE));
        assert!(matches!(
            h.engine.start_task(second).await,
            Err(EngineError::AlreadyRunning)
        ));

        run.await.unwrap().unwrap();
        assert_eq!(
            h.engine.status().last_error.as_deref(),
            Some(EMERGENCY_STOP_MESSAGE)
        );
        assert_eq!(h.clicks(), vec![1]);
    }

    #[tokio::test]
    async fn should_allow_emergency_stop_when_idle() {
        let h = harness(0);
        h.engine.emergency_stop().await;
        let state = h.engine.status();
        assert_eq!(state.status, AutomationStatus::Idle);
        assert_eq!(state.last_error.as_deref(), Some(EMERGENCY_STOP_MESSAGE));
    }

    #[tokio::test]
    async fn should_broadcast_status_and_step_events_in_order() {
        let mut h = harness(0);
        let id = h.store(clicks_task(&[1]));

        h.engine.start_task(id).await.unwrap();

        let types: Vec<EventType> = h.drain_events().iter().map(|e| e.event_type).collect();
        assert_eq!(
            types,
            vec![
                EventType::StatusChanged,
                EventType::StatusChanged,
                EventType::StepStarted,
                EventType::StatusChanged,
                EventType::StepCompleted,
                EventType::StatusChanged,
                EventType::RunFinished,
            ]
        );
    }

    #[tokio::test]
    async fn should_publish_step_failed_with_error_message() {
        let mut h = harness(0);
        let id = h.store(failing_task());

        let _ = h.engine.start_task(id).await;

        let events = h.drain_events();
        let failed = events
            .iter()
            .find(|e| e.event_type == EventType::StepFailed)
            .unwrap();
        assert_eq!(failed.data["action_id"], "missing");
        assert_eq!(failed.data["continued"], false);
        let finished = events.last().unwrap();
        assert_eq!(finished.event_type, EventType::RunFinished);
        assert_eq!(finished.data["outcome"], "failed");
    }
}
