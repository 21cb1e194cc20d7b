//! Defines watchers that react to phase completions.

use crate::common::Phase;
use crate::events::PhaseCompleted;

/// Logic to execute when a watched phase completes.
pub type CompletionCallback = Box<dyn FnMut(PhaseCompleted) + Send + Sync>;

/// Runs a callback on `PhaseCompleted`, optionally for one phase only.
#[doc(hidden)]
pub(crate) struct CompletionWatcher {
    pub phase_filter: Option<Phase>,
    pub task_logic: CompletionCallback,
    pub is_one_shot: bool,
}

impl CompletionWatcher {
    /// Creates a new `CompletionWatcher`. `None` watches every phase.
    pub(crate) fn new(
        phase_filter: Option<Phase>,
        task_logic: CompletionCallback,
        is_one_shot: bool,
    ) -> Self {
        Self {
            phase_filter,
            task_logic,
            is_one_shot,
        }
    }

    /// Executes the callback if `done` matches the filter.
    /// Returns `true` if the watcher fired.
    pub(crate) fn process_completion(&mut self, done: PhaseCompleted) -> bool {
        if self.phase_filter.map_or(true, |phase| phase == done.phase) {
            (self.task_logic)(done);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn filter_limits_which_phases_fire() {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let mut watcher = CompletionWatcher::new(
            Some(Phase::Break),
            Box::new(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
            false,
        );
        let focus = PhaseCompleted {
            phase: Phase::Focus,
            duration_seconds: 60,
        };
        let rest = PhaseCompleted {
            phase: Phase::Break,
            duration_seconds: 60,
        };
        assert!(!watcher.process_completion(focus));
        assert!(watcher.process_completion(rest));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
