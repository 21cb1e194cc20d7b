//! The timer engine: one countdown, owned in one place.
//!
//! `TimerEngine` is synchronous. It knows nothing about tasks, channels or wall
//! clocks. The ticker owned by `FocusclockEngine` calls `tick_for` once per
//! elapsed second.

use crate::common::Phase;
use crate::error::ConfigError;
use crate::events::PhaseCompleted;
use crate::format::format_clock;
use serde::Serialize;
use tracing::{debug, trace};

/// The mutable state of the single run.
#[derive(Debug, Clone, Default)]
pub struct TimerRun {
    phase: Phase,
    time_left_seconds: u64,
    total_phase_seconds: u64,
    is_running: bool,
    is_paused: bool,
    /// Identifies one uninterrupted running window. Bumped by every command
    /// that starts, pauses, resumes or discards the countdown.
    epoch: u64,
}

/// Read-only view handed to renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub phase: Phase,
    pub time_left_seconds: u64,
    pub total_phase_seconds: u64,
    pub is_running: bool,
    pub is_paused: bool,
}

impl TimerSnapshot {
    /// Fraction of the phase already elapsed, for a progress bar.
    pub fn progress(&self) -> f64 {
        if self.total_phase_seconds == 0 {
            return 0.0;
        }
        let elapsed = self.total_phase_seconds.saturating_sub(self.time_left_seconds);
        elapsed as f64 / self.total_phase_seconds as f64
    }

    pub fn remaining_display(&self) -> String {
        format_clock(self.time_left_seconds)
    }

    /// Stopped at zero after completing a phase, waiting for the next command.
    pub fn is_stopped(&self) -> bool {
        !self.is_running && self.phase != Phase::Setup && self.time_left_seconds == 0
    }
}

#[derive(Debug, Default)]
pub struct TimerEngine {
    run: TimerRun,
}

impl TimerEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            phase: self.run.phase,
            time_left_seconds: self.run.time_left_seconds,
            total_phase_seconds: self.run.total_phase_seconds,
            is_running: self.run.is_running,
            is_paused: self.run.is_paused,
        }
    }

    pub fn epoch(&self) -> u64 {
        self.run.epoch
    }

    /// True when a ticker should be feeding this engine.
    pub fn is_counting(&self) -> bool {
        self.run.is_running && !self.run.is_paused
    }

    /// Begins counting `duration_seconds` down for `phase`.
    ///
    /// A zero duration is refused and leaves the engine untouched.
    pub fn start(&mut self, phase: Phase, duration_seconds: u64) -> Result<(), ConfigError> {
        if duration_seconds == 0 || phase == Phase::Setup {
            return Err(ConfigError::NonPositiveDuration);
        }
        self.run = TimerRun {
            phase,
            time_left_seconds: duration_seconds,
            total_phase_seconds: duration_seconds,
            is_running: true,
            is_paused: false,
            epoch: self.run.epoch.wrapping_add(1),
        };
        debug!(%phase, duration_seconds, "timer started");
        Ok(())
    }

    /// Pauses a counting run or resumes a paused one. Returns the new paused
    /// flag. Does nothing (and returns `false`) unless a run is active.
    pub fn toggle_pause(&mut self) -> bool {
        if !self.run.is_running {
            return false;
        }
        self.run.is_paused = !self.run.is_paused;
        self.run.epoch = self.run.epoch.wrapping_add(1);
        debug!(paused = self.run.is_paused, left = self.run.time_left_seconds, "timer toggled");
        self.run.is_paused
    }

    /// Discards whatever is in progress and returns to `Setup`.
    pub fn reset(&mut self) {
        let epoch = self.run.epoch.wrapping_add(1);
        self.run = TimerRun {
            epoch,
            ..TimerRun::default()
        };
        debug!("timer reset");
    }

    /// Applies one elapsed second.
    ///
    /// Returns the completion signal on the tick that reaches zero and never
    /// again for the same run.
    pub fn tick(&mut self) -> Option<PhaseCompleted> {
        if !self.is_counting() {
            return None;
        }
        self.run.time_left_seconds = self.run.time_left_seconds.saturating_sub(1);
        trace!(left = self.run.time_left_seconds, "tick");
        if self.run.time_left_seconds == 0 {
            return Some(self.complete());
        }
        None
    }

    /// Like `tick`, but only if `epoch` still names the current running window.
    pub fn tick_for(&mut self, epoch: u64) -> Option<PhaseCompleted> {
        if epoch != self.run.epoch {
            trace!(stale = epoch, current = self.run.epoch, "dropping stale tick");
            return None;
        }
        self.tick()
    }

    /// Ends the active phase now, as if its last second had elapsed.
    pub fn skip(&mut self) -> Option<PhaseCompleted> {
        if !self.run.is_running {
            return None;
        }
        self.run.time_left_seconds = 0;
        Some(self.complete())
    }

    fn complete(&mut self) -> PhaseCompleted {
        self.run.is_running = false;
        self.run.is_paused = false;
        self.run.epoch = self.run.epoch.wrapping_add(1);
        debug!(phase = %self.run.phase, "phase completed");
        PhaseCompleted {
            phase: self.run.phase,
            duration_seconds: self.run.total_phase_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn running(seconds: u64) -> TimerEngine {
        let mut engine = TimerEngine::new();
        engine.start(Phase::Focus, seconds).unwrap();
        engine
    }

    #[test]
    fn countdown_is_monotonic_and_saturates() {
        for (start, ticks) in [(10u64, 3u64), (10, 10), (10, 25), (1, 1), (90, 0)] {
            let mut engine = running(start);
            for _ in 0..ticks {
                engine.tick();
            }
            assert_eq!(
                engine.snapshot().time_left_seconds,
                start.saturating_sub(ticks),
                "start={start} ticks={ticks}"
            );
        }
    }

    #[test]
    fn zero_duration_is_rejected_without_side_effects() {
        let mut engine = TimerEngine::new();
        let before = engine.snapshot();
        assert!(matches!(
            engine.start(Phase::Focus, 0),
            Err(ConfigError::NonPositiveDuration)
        ));
        assert_eq!(engine.snapshot(), before);
    }

    #[test]
    fn double_toggle_keeps_time_left() {
        let mut engine = running(60);
        engine.tick();
        assert!(engine.toggle_pause());
        assert!(!engine.toggle_pause());
        assert_eq!(engine.snapshot().time_left_seconds, 59);
    }

    #[test]
    fn paused_run_consumes_no_time() {
        let mut engine = running(60);
        engine.toggle_pause();
        for _ in 0..10 {
            assert!(engine.tick().is_none());
        }
        assert_eq!(engine.snapshot().time_left_seconds, 60);
    }

    #[test]
    fn completion_fires_once_then_engine_stays_stopped() {
        let mut engine = running(3);
        let signals: Vec<_> = (0..10).filter_map(|_| engine.tick()).collect();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].phase, Phase::Focus);
        let snap = engine.snapshot();
        assert!(!snap.is_running);
        assert_eq!(snap.time_left_seconds, 0);
        assert!(snap.is_stopped());
    }

    #[test]
    fn reset_returns_to_setup() {
        let mut engine = running(30);
        engine.tick();
        engine.reset();
        let snap = engine.snapshot();
        assert_eq!(snap.phase, Phase::Setup);
        assert_eq!(snap.time_left_seconds, 0);
        assert!(!snap.is_running && !snap.is_paused);
    }

    #[test]
    fn stale_ticks_are_dropped_after_pause() {
        let mut engine = running(30);
        let epoch = engine.epoch();
        engine.toggle_pause();
        engine.toggle_pause();
        assert!(engine.tick_for(epoch).is_none());
        assert_eq!(engine.snapshot().time_left_seconds, 30);
        let fresh = engine.epoch();
        engine.tick_for(fresh);
        assert_eq!(engine.snapshot().time_left_seconds, 29);
    }

    #[test]
    fn skip_completes_immediately_once() {
        let mut engine = running(120);
        let done = engine.skip().unwrap();
        assert_eq!(done.duration_seconds, 120);
        assert!(engine.skip().is_none());
        assert!(engine.tick().is_none());
        assert!(engine.snapshot().is_stopped());
    }

    #[test]
    fn progress_tracks_elapsed_fraction() {
        let mut engine = running(4);
        engine.tick();
        assert_eq!(engine.snapshot().progress(), 0.25);
        assert_eq!(engine.snapshot().remaining_display(), "00:03");
        assert_eq!(TimerEngine::new().snapshot().progress(), 0.0);
    }
}
