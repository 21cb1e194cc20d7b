//! The core engine that orchestrates the entire Focusclock system.

use crate::common::{ListenerId, Phase, SessionStage};
use crate::components::coordinator::{Effect, SessionCoordinator, Transition};
use crate::components::watcher::CompletionWatcher;
use crate::config::FocusclockConfig;
use crate::error::{FocusclockError, PersistError, Result};
use crate::events::{PhaseCompleted, SessionEvent, SystemEvent, TickEvent};
use crate::session::{
    BreakFeedback, FocusFeedback, Mood, SessionDraft, SessionRecord, SessionTask, TimerConfiguration,
};
use crate::store::{open_store, IdentityProvider, SessionStore, StaticIdentity};
use crate::time::SystemClock;
use crate::timer::{TimerEngine, TimerSnapshot};
use slotmap::SlotMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Both state machines, guarded together so a tick and a command can never
/// interleave.
#[derive(Debug, Default)]
struct Core {
    timer: TimerEngine,
    coordinator: SessionCoordinator,
    /// Finished sessions whose save failed, oldest first, kept for `retry_save`.
    unsaved: VecDeque<SessionDraft>,
    tick_count: u64,
}

/// The main Focusclock engine.
///
/// One instance exists per user session. It owns the countdown, the session
/// coordinator and the only ticker. Clones are cheap handles to the same
/// instance, so any number of views can hold one, read snapshots and subscribe
/// to events without affecting the countdown.
#[derive(Clone)]
pub struct FocusclockEngine {
    config: Arc<FocusclockConfig>,
    clock: SystemClock,
    core: Arc<Mutex<Core>>,
    ticker: Arc<StdMutex<Option<JoinHandle<()>>>>,
    store: Arc<dyn SessionStore>,
    identity: Arc<dyn IdentityProvider>,

    tick_sender: broadcast::Sender<TickEvent>,
    phase_sender: broadcast::Sender<PhaseCompleted>,
    session_event_sender: broadcast::Sender<SessionEvent>,
    system_event_sender: broadcast::Sender<SystemEvent>,

    completion_watchers: Arc<RwLock<SlotMap<ListenerId, CompletionWatcher>>>,
}

// Core implementation block for internal logic.
impl FocusclockEngine {
    /// Creates a new `FocusclockEngine` with explicit collaborators.
    pub fn new(
        config: FocusclockConfig,
        store: Arc<dyn SessionStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        let capacity = config.channel_capacity.max(1);
        let (tick_sender, _) = broadcast::channel(capacity);
        let (phase_sender, _) = broadcast::channel(capacity);
        let (session_event_sender, _) = broadcast::channel(capacity);
        let (system_event_sender, _) = broadcast::channel(capacity);

        Self {
            clock: SystemClock::new(config.resolution),
            config: Arc::new(config),
            core: Arc::new(Mutex::new(Core::default())),
            ticker: Arc::new(StdMutex::new(None)),
            store,
            identity,
            tick_sender,
            phase_sender,
            session_event_sender,
            system_event_sender,
            completion_watchers: Arc::new(RwLock::new(SlotMap::with_key())),
        }
    }

    /// Creates an engine whose store and identity come from the configuration.
    pub fn from_config(config: FocusclockConfig) -> Self {
        let store = open_store(&config.store);
        let identity = match &config.user_id {
            Some(user) => StaticIdentity::new(user.clone()),
            None => StaticIdentity::anonymous(),
        };
        Self::new(config, store, Arc::new(identity))
    }

    /// Runs until a shutdown signal is received, then stops the ticker.
    pub async fn run(&self) -> anyhow::Result<()> {
        info!("FocusclockEngine starting up...");
        self.system_event_sender
            .send(SystemEvent::EngineStarted {
                timestamp: tokio::time::Instant::now(),
            })
            .ok();
        info!(
            "Engine running at {:?} per tick. Press Ctrl+C to shut down.",
            self.clock.period()
        );
        tokio::signal::ctrl_c().await?;

        info!("Shutdown signal received.");
        self.shutdown();
        Ok(())
    }

    /// Stops the ticker and announces shutdown. The timer state is kept.
    pub fn shutdown(&self) {
        self.cancel_ticker();
        self.system_event_sender
            .send(SystemEvent::EngineShutdown)
            .ok();
        info!("FocusclockEngine has shut down.");
    }

    /// Replaces any existing ticker with one bound to `epoch`.
    ///
    /// Called with the core lock held, so no tick for the old epoch can be
    /// applied between the abort and the new spawn.
    fn spawn_ticker(&self, epoch: u64) {
        let engine = self.clone();
        let handle = self.clock.spawn(move |_| {
            let engine = engine.clone();
            async move { engine.apply_tick(epoch).await }
        });
        let mut slot = self.ticker.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = slot.replace(handle) {
            previous.abort();
        }
        debug!(epoch, "ticker spawned");
    }

    fn cancel_ticker(&self) {
        let mut slot = self.ticker.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = slot.take() {
            handle.abort();
            debug!("ticker cancelled");
        }
    }

    /// Applies one tick for `epoch`. Returns `false` when the ticker should stop.
    async fn apply_tick(&self, epoch: u64) -> bool {
        let (completed, transition, snapshot, tick_count, keep_going) = {
            let mut core = self.core.lock().await;
            if core.timer.epoch() != epoch {
                return false;
            }
            let completed = core.timer.tick_for(epoch);
            core.tick_count += 1;
            let transition = completed.and_then(|done| core.coordinator.on_phase_completed(done));
            (
                completed,
                transition,
                core.timer.snapshot(),
                core.tick_count,
                core.timer.is_counting(),
            )
        };

        self.tick_sender
            .send(TickEvent {
                tick_count,
                snapshot,
            })
            .ok();
        if let Some(done) = completed {
            self.dispatch_completion(done, transition).await;
        }
        keep_going
    }

    /// Carries out the effects of a coordinator transition against the timer.
    /// A `Persist` effect is returned for the caller to run after unlocking.
    fn apply(&self, core: &mut Core, transition: Transition) -> Result<Option<SessionDraft>> {
        let mut to_persist = None;
        for effect in transition.effects {
            match effect {
                Effect::StartPhase {
                    phase,
                    duration_seconds,
                } => {
                    core.timer.start(phase, duration_seconds)?;
                    self.spawn_ticker(core.timer.epoch());
                }
                Effect::ResetEngine => {
                    core.timer.reset();
                    self.cancel_ticker();
                }
                Effect::Persist(draft) => to_persist = Some(draft),
            }
        }
        self.announce_stage(transition.from, transition.to);
        Ok(to_persist)
    }

    fn announce_stage(&self, from: SessionStage, to: SessionStage) {
        if from != to {
            self.session_event_sender
                .send(SessionEvent::StageChanged { from, to })
                .ok();
        }
    }

    /// Delivers one completion to the coordinator's listeners, the registered
    /// watchers and the phase stream. Every consumer sees the same emission.
    async fn dispatch_completion(&self, done: PhaseCompleted, transition: Option<Transition>) {
        info!(phase = %done.phase, seconds = done.duration_seconds, "phase completed");
        if let Some(transition) = transition {
            self.announce_stage(transition.from, transition.to);
        }

        let mut watchers = self.completion_watchers.write().await;
        let mut fired_one_shots = Vec::new();
        for (id, watcher) in watchers.iter_mut() {
            if watcher.process_completion(done) && watcher.is_one_shot {
                fired_one_shots.push(id);
            }
        }
        for id in fired_one_shots {
            if watchers.remove(id).is_some() {
                self.system_event_sender
                    .send(SystemEvent::ListenerRemoved { id })
                    .ok();
            }
        }
        drop(watchers);

        self.phase_sender.send(done).ok();
    }

    /// Saves a finished session. The stage has already moved on.
    ///
    /// The draft is not in the unsaved queue while the save runs. On failure it
    /// goes back in: at the front for a retry, at the back for a new session.
    async fn persist(&self, draft: SessionDraft, retrying: bool) -> Result<SessionRecord> {
        let outcome = match self.identity.current_user_id() {
            None => Err(PersistError::NoUser),
            Some(user_id) => {
                let record = draft.clone().into_record(user_id);
                let saved = self.store.save(&record).await;
                saved.map(|()| record)
            }
        };

        match outcome {
            Ok(record) => {
                info!(id = %record.id, "session saved");
                self.session_event_sender
                    .send(SessionEvent::Saved {
                        record: record.clone(),
                    })
                    .ok();
                Ok(record)
            }
            Err(err) => {
                error!("failed to save session: {}", err);
                let mut core = self.core.lock().await;
                if retrying {
                    core.unsaved.push_front(draft);
                } else {
                    core.unsaved.push_back(draft);
                }
                let pending = core.unsaved.len();
                drop(core);
                warn!(pending, "sessions waiting for a manual retry");
                self.session_event_sender
                    .send(SessionEvent::SaveFailed {
                        reason: err.to_string(),
                    })
                    .ok();
                Err(err.into())
            }
        }
    }
}

// Public API implementation block.
impl FocusclockEngine {
    pub fn config(&self) -> &FocusclockConfig {
        &self.config
    }

    /// Reads the current countdown state.
    pub async fn snapshot(&self) -> TimerSnapshot {
        self.core.lock().await.timer.snapshot()
    }

    pub async fn stage(&self) -> SessionStage {
        self.core.lock().await.coordinator.stage()
    }

    /// The configuration the current session was started with.
    pub async fn session_config(&self) -> Option<TimerConfiguration> {
        self.core.lock().await.coordinator.config()
    }

    /// The oldest finished session whose save failed, if any.
    pub async fn pending_record(&self) -> Option<SessionDraft> {
        self.core.lock().await.unsaved.front().cloned()
    }

    /// Every finished session still waiting to be saved, oldest first.
    pub async fn pending_records(&self) -> Vec<SessionDraft> {
        self.core.lock().await.unsaved.iter().cloned().collect()
    }

    /// Tasks attributed to the session in progress.
    pub async fn session_tasks(&self) -> Vec<SessionTask> {
        self.core.lock().await.coordinator.tasks().to_vec()
    }

    /// Setup → Focus. The configuration is copied; later edits don't apply.
    pub async fn start_session(&self, config: TimerConfiguration) -> Result<TimerSnapshot> {
        let mut core = self.core.lock().await;
        let transition = core.coordinator.start_session(config)?;
        self.apply(&mut core, transition)?;
        Ok(core.timer.snapshot())
    }

    /// Pauses a counting phase or resumes a paused one.
    pub async fn pause_or_resume(&self) -> Result<TimerSnapshot> {
        let mut core = self.core.lock().await;
        if !core.timer.snapshot().is_running {
            return Err(FocusclockError::InvalidStage {
                stage: core.coordinator.stage(),
                command: "pause",
            });
        }
        let paused = core.timer.toggle_pause();
        self.cancel_ticker();
        if !paused {
            self.spawn_ticker(core.timer.epoch());
        }
        info!(paused, "timer {}", if paused { "paused" } else { "resumed" });
        Ok(core.timer.snapshot())
    }

    /// Abandons whatever is in progress and returns to Setup. Nothing is saved.
    pub async fn reset(&self) -> Result<TimerSnapshot> {
        let mut core = self.core.lock().await;
        let transition = core.coordinator.reset();
        if transition.abandoned() {
            self.session_event_sender
                .send(SessionEvent::Abandoned {
                    at: transition.from,
                })
                .ok();
        }
        self.apply(&mut core, transition)?;
        Ok(core.timer.snapshot())
    }

    /// Ends the running phase now, as though its countdown had reached zero.
    pub async fn skip_phase(&self) -> Result<TimerSnapshot> {
        let (done, transition, snapshot) = {
            let mut core = self.core.lock().await;
            let Some(done) = core.timer.skip() else {
                return Err(FocusclockError::InvalidStage {
                    stage: core.coordinator.stage(),
                    command: "skip",
                });
            };
            self.cancel_ticker();
            let transition = core.coordinator.on_phase_completed(done);
            (done, transition, core.timer.snapshot())
        };
        self.dispatch_completion(done, transition).await;
        Ok(snapshot)
    }

    /// Runs the phase that just finished again, before its feedback is given.
    pub async fn restart_phase(&self) -> Result<TimerSnapshot> {
        let mut core = self.core.lock().await;
        let transition = core.coordinator.restart_phase()?;
        self.apply(&mut core, transition)?;
        Ok(core.timer.snapshot())
    }

    /// FocusFeedback → Break.
    pub async fn submit_focus_feedback(&self, mood: Mood, productivity: u8) -> Result<TimerSnapshot> {
        let feedback = FocusFeedback::new(mood, productivity)?;
        let mut core = self.core.lock().await;
        let transition = core.coordinator.submit_focus_feedback(feedback)?;
        self.apply(&mut core, transition)?;
        Ok(core.timer.snapshot())
    }

    /// BreakFeedback → SessionEnd, then one save attempt.
    ///
    /// A failed save is returned as an error, but the session has ended either
    /// way and the record joins the queue behind `pending_records`.
    pub async fn submit_break_feedback(
        &self,
        activity: Option<String>,
        satisfaction: i8,
    ) -> Result<SessionRecord> {
        let feedback = BreakFeedback::new(activity, satisfaction)?;
        let draft = {
            let mut core = self.core.lock().await;
            let transition = core.coordinator.submit_break_feedback(feedback)?;
            self.apply(&mut core, transition)?
        };
        match draft {
            Some(draft) => self.persist(draft, false).await,
            None => {
                warn!("session ended without a record to save");
                Err(FocusclockError::NothingToRetry)
            }
        }
    }

    /// Re-attempts the oldest failed save. Only ever called on user request.
    pub async fn retry_save(&self) -> Result<SessionRecord> {
        let draft = self
            .core
            .lock()
            .await
            .unsaved
            .pop_front()
            .ok_or(FocusclockError::NothingToRetry)?;
        self.persist(draft, true).await
    }

    /// Attributes a task to the session in progress. `false` if already attached.
    pub async fn add_task_to_session(&self, task_id: &str) -> Result<bool> {
        self.core.lock().await.coordinator.attach_task(task_id)
    }

    /// `false` if the task wasn't attached.
    pub async fn remove_task_from_session(&self, task_id: &str) -> Result<bool> {
        self.core.lock().await.coordinator.detach_task(task_id)
    }

    pub async fn update_task_time(&self, task_id: &str, seconds: u64) -> Result<()> {
        self.core.lock().await.coordinator.set_task_time(task_id, seconds)
    }

    /// SessionEnd → Setup.
    pub async fn start_new_session(&self) -> Result<TimerSnapshot> {
        let mut core = self.core.lock().await;
        let transition = core.coordinator.start_new_session()?;
        self.apply(&mut core, transition)?;
        Ok(core.timer.snapshot())
    }

    /// Registers logic to run when a phase completes.
    ///
    /// `phase` limits the watcher to one phase; `None` watches both. A one-shot
    /// watcher is removed after it fires.
    pub async fn on_phase_completed(
        &self,
        phase: Option<Phase>,
        task_logic: impl FnMut(PhaseCompleted) + Send + Sync + 'static,
        is_one_shot: bool,
    ) -> ListenerId {
        let watcher = CompletionWatcher::new(phase, Box::new(task_logic), is_one_shot);
        let id = self.completion_watchers.write().await.insert(watcher);
        self.system_event_sender
            .send(SystemEvent::ListenerAdded { id })
            .ok();
        id
    }

    /// Removes a completion listener. Returns `true` if it was registered.
    pub async fn remove_listener(&self, id: ListenerId) -> bool {
        let was_removed = self.completion_watchers.write().await.remove(id).is_some();
        if was_removed {
            self.system_event_sender
                .send(SystemEvent::ListenerRemoved { id })
                .ok();
        }
        was_removed
    }

    /// Subscribes to per-second countdown updates.
    pub fn subscribe_tick_events(&self) -> broadcast::Receiver<TickEvent> {
        self.tick_sender.subscribe()
    }

    /// Subscribes to the `PhaseCompleted` stream.
    pub fn subscribe_phase_events(&self) -> broadcast::Receiver<PhaseCompleted> {
        self.phase_sender.subscribe()
    }

    /// Subscribes to the `SessionEvent` stream.
    pub fn subscribe_session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.session_event_sender.subscribe()
    }

    /// Subscribes to the `SystemEvent` stream.
    pub fn subscribe_system_events(&self) -> broadcast::Receiver<SystemEvent> {
        self.system_event_sender.subscribe()
    }
}
