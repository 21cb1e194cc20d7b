//! The session feedback coordinator.
//!
//! A stateful automation that walks a session through its stages in order,
//! one step per command or completed phase. Like the timer engine it is
//! synchronous: every transition returns the `Effect`s it needs, and the
//! caller (normally `FocusclockEngine`) carries them out.

use crate::common::{Phase, SessionStage};
use crate::error::{ConfigError, FocusclockError, Result};
use crate::events::PhaseCompleted;
use crate::session::{
    BreakFeedback, FeedbackRecord, FocusFeedback, SessionDraft, SessionTask, TimerConfiguration,
};
use chrono::Utc;
use tracing::{debug, info};

/// A side effect requested by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Start the timer engine on `phase` for `duration_seconds`.
    StartPhase { phase: Phase, duration_seconds: u64 },
    /// Put the timer engine back into `Setup`.
    ResetEngine,
    /// Hand the finished session to the store. Produced once per session.
    Persist(SessionDraft),
}

/// The outcome of one coordinator step.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub from: SessionStage,
    pub to: SessionStage,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn new(from: SessionStage, to: SessionStage, effects: Vec<Effect>) -> Self {
        Self { from, to, effects }
    }

    /// True when a reset threw away an unfinished session.
    pub fn abandoned(&self) -> bool {
        self.from.is_in_progress() && self.to == SessionStage::Setup
    }
}

#[derive(Debug, Default)]
pub struct SessionCoordinator {
    stage: SessionStage,
    /// Snapshot taken at `start_session`; all durations come from here.
    config: Option<TimerConfiguration>,
    focus_feedback: Option<FocusFeedback>,
    tasks: Vec<SessionTask>,
}

impl SessionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stage(&self) -> SessionStage {
        self.stage
    }

    pub fn config(&self) -> Option<TimerConfiguration> {
        self.config
    }

    pub fn tasks(&self) -> &[SessionTask] {
        &self.tasks
    }

    /// Attributes a task to the session in progress.
    ///
    /// Returns `false` if the task was already attached.
    pub fn attach_task(&mut self, task_id: &str) -> Result<bool> {
        self.expect_in_progress("add task")?;
        let task = SessionTask::new(task_id)?;
        if self.tasks.iter().any(|t| t.task_id == task.task_id) {
            return Ok(false);
        }
        debug!(task = %task.task_id, "task attached");
        self.tasks.push(task);
        Ok(true)
    }

    /// Returns `false` if the task wasn't attached.
    pub fn detach_task(&mut self, task_id: &str) -> Result<bool> {
        self.expect_in_progress("remove task")?;
        let before = self.tasks.len();
        self.tasks.retain(|t| t.task_id != task_id.trim());
        Ok(self.tasks.len() != before)
    }

    /// Sets how long was spent on an attached task.
    pub fn set_task_time(&mut self, task_id: &str, seconds: u64) -> Result<()> {
        self.expect_in_progress("task time")?;
        let task_id = task_id.trim();
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.task_id == task_id)
            .ok_or_else(|| FocusclockError::UnknownTask(task_id.to_string()))?;
        task.task_seconds = seconds;
        Ok(())
    }

    /// Setup → Focus.
    pub fn start_session(&mut self, config: TimerConfiguration) -> Result<Transition> {
        self.expect_stage(SessionStage::Setup, "start")?;
        if config.focus_minutes() == 0 {
            return Err(ConfigError::ZeroFocus.into());
        }
        self.config = Some(config);
        self.focus_feedback = None;
        self.tasks.clear();
        info!(
            total = config.total_session_minutes(),
            focus = config.focus_minutes(),
            "session started"
        );
        Ok(self.move_to(
            SessionStage::Focus,
            vec![Effect::StartPhase {
                phase: Phase::Focus,
                duration_seconds: config.focus_seconds(),
            }],
        ))
    }

    /// Focus → FocusFeedback or Break → BreakFeedback.
    ///
    /// A completion that doesn't belong to the current stage is ignored.
    pub fn on_phase_completed(&mut self, done: PhaseCompleted) -> Option<Transition> {
        let next = match (self.stage, done.phase) {
            (SessionStage::Focus, Phase::Focus) => SessionStage::FocusFeedback,
            (SessionStage::Break, Phase::Break) => SessionStage::BreakFeedback,
            (stage, phase) => {
                debug!(%stage, %phase, "ignoring completion outside its stage");
                return None;
            }
        };
        Some(self.move_to(next, Vec::new()))
    }

    /// FocusFeedback → Break.
    ///
    /// With no break time left in the session the break is skipped and the
    /// coordinator goes straight to `BreakFeedback`.
    pub fn submit_focus_feedback(&mut self, feedback: FocusFeedback) -> Result<Transition> {
        self.expect_stage(SessionStage::FocusFeedback, "focus feedback")?;
        let config = self.active_config()?;
        self.focus_feedback = Some(feedback);

        let break_seconds = config.break_seconds();
        if break_seconds == 0 {
            return Ok(self.move_to(SessionStage::BreakFeedback, Vec::new()));
        }
        Ok(self.move_to(
            SessionStage::Break,
            vec![Effect::StartPhase {
                phase: Phase::Break,
                duration_seconds: break_seconds,
            }],
        ))
    }

    /// BreakFeedback → SessionEnd, requesting exactly one save.
    pub fn submit_break_feedback(&mut self, feedback: BreakFeedback) -> Result<Transition> {
        self.expect_stage(SessionStage::BreakFeedback, "break feedback")?;
        let config = self.active_config()?;
        let focus = self.focus_feedback.take().ok_or(FocusclockError::InvalidStage {
            stage: self.stage,
            command: "break feedback",
        })?;

        let draft = SessionDraft {
            config,
            feedback: FeedbackRecord::from_parts(focus, feedback),
            tasks: std::mem::take(&mut self.tasks),
            completed_at: Utc::now(),
        };
        Ok(self.move_to(SessionStage::SessionEnd, vec![Effect::Persist(draft)]))
    }

    /// Re-runs the phase that just finished, before its feedback is given.
    pub fn restart_phase(&mut self) -> Result<Transition> {
        let config = self.active_config()?;
        let (next, phase, duration_seconds) = match self.stage {
            SessionStage::FocusFeedback => (SessionStage::Focus, Phase::Focus, config.focus_seconds()),
            SessionStage::BreakFeedback if config.break_seconds() > 0 => {
                (SessionStage::Break, Phase::Break, config.break_seconds())
            }
            stage => {
                return Err(FocusclockError::InvalidStage {
                    stage,
                    command: "restart",
                })
            }
        };
        Ok(self.move_to(
            next,
            vec![Effect::StartPhase {
                phase,
                duration_seconds,
            }],
        ))
    }

    /// SessionEnd → Setup.
    pub fn start_new_session(&mut self) -> Result<Transition> {
        self.expect_stage(SessionStage::SessionEnd, "new session")?;
        Ok(self.clear())
    }

    /// Any stage → Setup. Accumulated feedback is dropped and nothing is saved.
    pub fn reset(&mut self) -> Transition {
        let transition = self.clear();
        if transition.abandoned() {
            info!(at = %transition.from, "session abandoned");
        }
        transition
    }

    fn clear(&mut self) -> Transition {
        self.config = None;
        self.focus_feedback = None;
        self.tasks.clear();
        self.move_to(SessionStage::Setup, vec![Effect::ResetEngine])
    }

    fn active_config(&self) -> Result<TimerConfiguration> {
        self.config.ok_or(FocusclockError::InvalidStage {
            stage: self.stage,
            command: "session command",
        })
    }

    fn expect_in_progress(&self, command: &'static str) -> Result<()> {
        if self.stage.is_in_progress() {
            Ok(())
        } else {
            Err(FocusclockError::InvalidStage {
                stage: self.stage,
                command,
            })
        }
    }

    fn expect_stage(&self, expected: SessionStage, command: &'static str) -> Result<()> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(FocusclockError::InvalidStage {
                stage: self.stage,
                command,
            })
        }
    }

    fn move_to(&mut self, to: SessionStage, effects: Vec<Effect>) -> Transition {
        let from = self.stage;
        self.stage = to;
        debug!(%from, %to, "stage changed");
        Transition::new(from, to, effects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Mood;

    fn completed(phase: Phase, duration_seconds: u64) -> PhaseCompleted {
        PhaseCompleted {
            phase,
            duration_seconds,
        }
    }

    fn focus_feedback() -> FocusFeedback {
        FocusFeedback::new(Mood::new(0.6, 0.4).unwrap(), 8).unwrap()
    }

    fn in_focus_feedback(total: u32, focus: u32) -> SessionCoordinator {
        let mut coordinator = SessionCoordinator::new();
        coordinator
            .start_session(TimerConfiguration::new(total, focus).unwrap())
            .unwrap();
        coordinator.on_phase_completed(completed(Phase::Focus, u64::from(focus) * 60));
        coordinator
    }

    #[test]
    fn start_requests_focus_countdown() {
        let mut coordinator = SessionCoordinator::new();
        let transition = coordinator
            .start_session(TimerConfiguration::new(30, 25).unwrap())
            .unwrap();
        assert_eq!(transition.to, SessionStage::Focus);
        assert_eq!(
            transition.effects,
            vec![Effect::StartPhase {
                phase: Phase::Focus,
                duration_seconds: 1500
            }]
        );
    }

    #[test]
    fn zero_focus_is_refused_in_setup() {
        let mut coordinator = SessionCoordinator::new();
        let err = coordinator
            .start_session(TimerConfiguration::new(30, 0).unwrap())
            .unwrap_err();
        assert!(matches!(err, FocusclockError::Config(ConfigError::ZeroFocus)));
        assert_eq!(coordinator.stage(), SessionStage::Setup);
    }

    #[test]
    fn focus_feedback_starts_break_from_snapshot() {
        let mut coordinator = in_focus_feedback(45, 30);
        assert_eq!(coordinator.stage(), SessionStage::FocusFeedback);
        let transition = coordinator.submit_focus_feedback(focus_feedback()).unwrap();
        assert_eq!(
            transition.effects,
            vec![Effect::StartPhase {
                phase: Phase::Break,
                duration_seconds: 900
            }]
        );
    }

    #[test]
    fn no_break_time_goes_straight_to_break_feedback() {
        let mut coordinator = in_focus_feedback(25, 25);
        let transition = coordinator.submit_focus_feedback(focus_feedback()).unwrap();
        assert_eq!(transition.to, SessionStage::BreakFeedback);
        assert!(transition.effects.is_empty());
    }

    #[test]
    fn only_the_last_step_persists() {
        let mut coordinator = in_focus_feedback(30, 25);
        let mut persists = 0;
        let mut steps = vec![coordinator.submit_focus_feedback(focus_feedback()).unwrap()];
        steps.extend(coordinator.on_phase_completed(completed(Phase::Break, 300)));
        steps.push(
            coordinator
                .submit_break_feedback(BreakFeedback::new(Some("walk".into()), -2).unwrap())
                .unwrap(),
        );
        for step in &steps {
            for effect in &step.effects {
                if let Effect::Persist(draft) = effect {
                    persists += 1;
                    assert_eq!(draft.feedback.productivity_level, 8);
                    assert_eq!(draft.feedback.break_activity.as_deref(), Some("walk"));
                    assert_eq!(draft.config.total_session_minutes(), 30);
                }
            }
        }
        assert_eq!(persists, 1);
        assert_eq!(coordinator.stage(), SessionStage::SessionEnd);
    }

    #[test]
    fn reset_from_feedback_abandons_without_persisting() {
        let mut coordinator = in_focus_feedback(30, 25);
        let transition = coordinator.reset();
        assert!(transition.abandoned());
        assert_eq!(transition.effects, vec![Effect::ResetEngine]);
        assert_eq!(coordinator.stage(), SessionStage::Setup);
        assert!(coordinator.config().is_none());
    }

    #[test]
    fn commands_out_of_stage_change_nothing() {
        let mut coordinator = SessionCoordinator::new();
        assert!(matches!(
            coordinator.submit_focus_feedback(focus_feedback()),
            Err(FocusclockError::InvalidStage { .. })
        ));
        assert!(coordinator.start_new_session().is_err());
        assert!(coordinator
            .on_phase_completed(completed(Phase::Focus, 60))
            .is_none());
        assert_eq!(coordinator.stage(), SessionStage::Setup);
    }

    #[test]
    fn wrong_phase_completion_is_ignored() {
        let mut coordinator = SessionCoordinator::new();
        coordinator
            .start_session(TimerConfiguration::new(30, 25).unwrap())
            .unwrap();
        assert!(coordinator
            .on_phase_completed(completed(Phase::Break, 300))
            .is_none());
        assert_eq!(coordinator.stage(), SessionStage::Focus);
    }

    #[test]
    fn restart_reruns_the_finished_phase() {
        let mut coordinator = in_focus_feedback(30, 25);
        let transition = coordinator.restart_phase().unwrap();
        assert_eq!(transition.to, SessionStage::Focus);
        assert!(coordinator.restart_phase().is_err());
    }

    #[test]
    fn new_session_only_after_end() {
        let mut coordinator = in_focus_feedback(30, 25);
        coordinator.submit_focus_feedback(focus_feedback()).unwrap();
        coordinator.on_phase_completed(completed(Phase::Break, 300));
        coordinator
            .submit_break_feedback(BreakFeedback::new(None, 0).unwrap())
            .unwrap();
        let transition = coordinator.start_new_session().unwrap();
        assert!(!transition.abandoned());
        assert_eq!(coordinator.stage(), SessionStage::Setup);
    }

    #[test]
    fn attached_tasks_travel_with_the_saved_session() {
        let mut coordinator = SessionCoordinator::new();
        coordinator
            .start_session(TimerConfiguration::new(30, 25).unwrap())
            .unwrap();
        assert_eq!(coordinator.stage().counting_phase(), Some(Phase::Focus));
        assert!(coordinator.attach_task("essay").unwrap());
        assert!(coordinator.attach_task("reading").unwrap());
        assert!(!coordinator.attach_task(" essay ").unwrap());
        coordinator.set_task_time("essay", 900).unwrap();
        assert!(coordinator.detach_task("reading").unwrap());
        assert!(matches!(
            coordinator.set_task_time("reading", 60),
            Err(FocusclockError::UnknownTask(_))
        ));

        coordinator.on_phase_completed(completed(Phase::Focus, 1500));
        assert_eq!(coordinator.stage().counting_phase(), None);
        coordinator.submit_focus_feedback(focus_feedback()).unwrap();
        coordinator.on_phase_completed(completed(Phase::Break, 300));
        let transition = coordinator
            .submit_break_feedback(BreakFeedback::new(None, 0).unwrap())
            .unwrap();

        let Some(Effect::Persist(draft)) = transition.effects.first() else {
            panic!("expected a persist effect, got {:?}", transition.effects);
        };
        assert_eq!(
            draft.tasks,
            vec![SessionTask {
                task_id: "essay".into(),
                task_seconds: 900
            }]
        );
        assert!(coordinator.tasks().is_empty());
    }

    #[test]
    fn tasks_need_a_session_in_progress() {
        let mut coordinator = SessionCoordinator::new();
        assert!(matches!(
            coordinator.attach_task("essay"),
            Err(FocusclockError::InvalidStage { .. })
        ));

        let mut coordinator = in_focus_feedback(30, 25);
        coordinator.attach_task("essay").unwrap();
        coordinator.reset();
        assert!(coordinator.tasks().is_empty());
    }
}
