//! Contains common, primitive types shared by every layer of the engine.
//!
//! This module defines the identifiers and the two phase enums. `Phase` is what
//! the timer engine counts down. `SessionStage` is the coordinator's view of a
//! whole session. Both are plain sum types so that adding a variant forces every
//! `match` in the crate to be revisited.

use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    /// Uniquely and safely identifies a registered completion listener.
    ///
    /// Returned by `FocusclockEngine::on_phase_completed`. Keys are never reused,
    /// so a stale id can't remove somebody else's listener.
    pub struct ListenerId;
}

/// The engine-level phase of the single `TimerRun`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Nothing is counting down.
    #[default]
    Setup,
    Focus,
    Break,
}

impl Phase {
    pub fn label(self) -> &'static str {
        match self {
            Phase::Setup => "Timer",
            Phase::Focus => "Focus",
            Phase::Break => "Break",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The coordinator-level stage of a session.
///
/// `FocusFeedback`, `BreakFeedback` and `SessionEnd` exist only here; the timer
/// engine never sees them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStage {
    #[default]
    Setup,
    Focus,
    FocusFeedback,
    Break,
    BreakFeedback,
    /// Terminal until `start_new_session`.
    SessionEnd,
}

impl SessionStage {
    /// The timer phase that should be counting down in this stage, if any.
    pub fn counting_phase(self) -> Option<Phase> {
        match self {
            SessionStage::Focus => Some(Phase::Focus),
            SessionStage::Break => Some(Phase::Break),
            SessionStage::Setup
            | SessionStage::FocusFeedback
            | SessionStage::BreakFeedback
            | SessionStage::SessionEnd => None,
        }
    }

    /// Stages from which a reset abandons work in progress.
    pub fn is_in_progress(self) -> bool {
        match self {
            SessionStage::Focus
            | SessionStage::FocusFeedback
            | SessionStage::Break
            | SessionStage::BreakFeedback => true,
            SessionStage::Setup | SessionStage::SessionEnd => false,
        }
    }
}

impl fmt::Display for SessionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStage::Setup => "setup",
            SessionStage::Focus => "focus",
            SessionStage::FocusFeedback => "focus feedback",
            SessionStage::Break => "break",
            SessionStage::BreakFeedback => "break feedback",
            SessionStage::SessionEnd => "session end",
        };
        f.write_str(name)
    }
}
