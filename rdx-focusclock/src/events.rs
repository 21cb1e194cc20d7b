//! Defines all public event types broadcast by the Focusclock engine.
//!
//! Renderers, loggers and the shell subscribe to these streams. None of them
//! can influence the countdown; commands go through `FocusclockEngine`.

use crate::common::{ListenerId, Phase, SessionStage};
use crate::session::SessionRecord;
use crate::timer::TimerSnapshot;
use tokio::time::Instant;

/// Emitted exactly once when a phase's countdown reaches zero (or is skipped).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseCompleted {
    pub phase: Phase,
    /// Full length of the phase that just ended.
    pub duration_seconds: u64,
}

/// One applied tick, carrying the state right after it.
#[derive(Debug, Clone, Copy)]
pub struct TickEvent {
    pub tick_count: u64,
    pub snapshot: TimerSnapshot,
}

/// Events related to the lifecycle of the engine itself.
#[derive(Debug, Clone)]
pub enum SystemEvent {
    /// Fired once when `run` begins.
    EngineStarted { timestamp: Instant },
    /// Fired once when `run` is about to return.
    EngineShutdown,
    ListenerAdded { id: ListenerId },
    ListenerRemoved { id: ListenerId },
}

/// Coordinator-level progress through a session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StageChanged {
        from: SessionStage,
        to: SessionStage,
    },
    /// A reset threw away an unfinished session. Nothing was saved.
    Abandoned { at: SessionStage },
    Saved { record: SessionRecord },
    /// The save failed; the record is kept for a manual retry.
    SaveFailed { reason: String },
}
