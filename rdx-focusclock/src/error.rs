//! Error types for the Focusclock library.
//!
//! Configuration problems are rejected synchronously at the call that caused
//! them. Persistence problems are reported after the session has already moved
//! to `SessionEnd`, so a failing store never leaves the user stuck.

use crate::common::SessionStage;
use thiserror::Error;

/// Top-level error returned by engine and coordinator commands.
#[derive(Error, Debug)]
pub enum FocusclockError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("session could not be saved: {0}")]
    Persist(#[from] PersistError),

    /// A command arrived in a stage that doesn't accept it. Nothing changed.
    #[error("'{command}' is not available during {stage}")]
    InvalidStage {
        stage: SessionStage,
        command: &'static str,
    },

    #[error("there is no unsaved session to retry")]
    NothingToRetry,

    #[error("task '{0}' is not attached to this session")]
    UnknownTask(String),
}

/// Rejected inputs. The caller stays where it was.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("phase duration must be greater than zero seconds")]
    NonPositiveDuration,

    #[error("focus time ({focus} min) can't exceed the total session ({total} min)")]
    FocusExceedsTotal { focus: u32, total: u32 },

    #[error("focus time must be at least one minute")]
    ZeroFocus,

    #[error("productivity level {0} is outside 1..=10")]
    ProductivityOutOfRange(u8),

    #[error("break satisfaction {0} is outside -10..=10")]
    SatisfactionOutOfRange(i8),

    #[error("mood coordinates must be finite numbers in 0..=1")]
    MoodOutOfRange,

    #[error("task id must not be blank")]
    EmptyTaskId,

    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
}

/// Failures of the external persistence collaborators.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("no signed-in user to attribute the session to")]
    NoUser,

    #[error("store rejected the session: {0}")]
    Store(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = FocusclockError> = std::result::Result<T, E>;
