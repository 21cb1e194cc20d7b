//! # Focusclock
//!
//! A single-owner Pomodoro session engine for Rust.
//!
//! Focusclock keeps one authoritative countdown per user session. Views come
//! and go; they read snapshots and subscribe to events, but only the engine
//! ticks.
//!
//! ## Core Concepts
//!
//! - **Timer Engine**: a synchronous countdown (`timer::TimerEngine`) with
//!   start, pause/resume toggle, reset, skip and a saturating one-second tick.
//! - **Session Coordinator**: walks a session through
//!   Setup → Focus → FocusFeedback → Break → BreakFeedback → SessionEnd and asks
//!   for exactly one save when the session completes.
//! - **Single ticker**: `FocusclockEngine` owns the only `SystemClock` task.
//!   Pausing or resetting cancels it before the command returns.
//! - **Event-Driven**: `PhaseCompleted`, per-second `TickEvent`s and session
//!   progress are broadcast to any number of subscribers.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use focusclock::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = FocusclockEngine::from_config(FocusclockConfig::default());
//!
//!     let mut phases = engine.subscribe_phase_events();
//!     tokio::spawn(async move {
//!         while let Ok(done) = phases.recv().await {
//!             println!("{} finished", done.phase);
//!         }
//!     });
//!
//!     engine.start_session(TimerConfiguration::new(30, 25)?).await?;
//!     engine.run().await?;
//!     Ok(())
//! }
//! ```

pub const ENGINE_NAME: &str = "Focus Engine";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod common;
pub mod components;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod format;
pub mod session;
pub mod store;
pub mod time;
pub mod timer;

/// A prelude module for easy importing of the most common Focusclock types.
pub mod prelude {
    pub use crate::common::{ListenerId, Phase, SessionStage};
    pub use crate::config::{FocusclockConfig, TickResolution};
    pub use crate::engine::FocusclockEngine;
    pub use crate::error::{ConfigError, FocusclockError, PersistError};
    pub use crate::events::{PhaseCompleted, SessionEvent, SystemEvent, TickEvent};
    pub use crate::session::{Mood, SessionRecord, SessionTask, TimerConfiguration};
    pub use crate::store::{IdentityProvider, MemoryStore, SessionStore, StaticIdentity};
    pub use crate::timer::TimerSnapshot;
}
