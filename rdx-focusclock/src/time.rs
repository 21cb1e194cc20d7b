//! The clock that drives the engine.
//!
//! `SystemClock` is the only timing primitive in the crate: it invokes a
//! callback once per period until the callback says stop or the task is
//! aborted. The engine keeps the resulting `JoinHandle` in a single slot.

use crate::config::TickResolution;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::trace;

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    period: Duration,
}

impl SystemClock {
    pub fn new(resolution: TickResolution) -> Self {
        Self {
            period: resolution.tick_period(),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Spawns the clock loop on a new Tokio task.
    ///
    /// The first tick lands one full period after the call. `on_tick` receives
    /// the running tick count and returns `false` to stop the clock.
    pub fn spawn<F, Fut>(&self, mut on_tick: F) -> JoinHandle<()>
    where
        F: FnMut(u64) -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let period = self.period;
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            // Keeps the countdown tied to elapsed time if the runtime stalls.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
            let mut tick_count: u64 = 0;
            loop {
                ticker.tick().await;
                tick_count += 1;
                trace!("clock tick #{}", tick_count);
                if !on_tick(tick_count).await {
                    break;
                }
            }
        })
    }
}
