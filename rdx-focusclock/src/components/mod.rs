//! Contains the building blocks layered on top of the timer engine.
//!
//! The coordinator sequences a whole session around the countdown, and
//! watchers let callers attach logic to phase completions. `FocusclockEngine`
//! owns one coordinator and a collection of watchers.

pub mod coordinator;
pub mod watcher;
