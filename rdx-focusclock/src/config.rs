//! Defines all configuration structures for the Focusclock engine.
//!
//! These structs are deserialized with `serde` from an optional TOML file and
//! `FOCUSCLOCK__*` environment variables, layered with the `config` crate. They
//! hold the defaults offered at setup time, the tick speed, and which store
//! completed sessions go to.

use crate::error::ConfigError;
use crate::session::TimerConfiguration;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The top-level configuration for the `FocusclockEngine`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FocusclockConfig {
    /// How fast one timer second passes in real time.
    pub resolution: TickResolution,

    /// Values pre-filled on the setup screen.
    pub defaults: SessionDefaults,

    /// Where completed sessions are written.
    pub store: StoreConfig,

    /// Static identity used by the shell and demo binaries.
    pub user_id: Option<String>,

    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Capacity of every broadcast channel.
    pub channel_capacity: usize,
}

/// Defines the speed of the ticker. One tick is always one timer second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TickResolution {
    /// One tick per real second.
    #[default]
    Realtime,
    /// `factor` ticks per real second. For demos and manual testing.
    Accelerated { factor: u32 },
}

impl TickResolution {
    pub fn tick_period(&self) -> Duration {
        match self {
            TickResolution::Realtime => Duration::from_secs(1),
            TickResolution::Accelerated { factor } => Duration::from_secs(1) / (*factor).max(1),
        }
    }
}

/// Values offered on the setup screen when the user enters nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SessionDefaults {
    pub total_session_minutes: u32,
    pub focus_minutes: u32,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            total_session_minutes: 25,
            focus_minutes: 20,
        }
    }
}

impl SessionDefaults {
    pub fn to_configuration(&self) -> Result<TimerConfiguration, ConfigError> {
        TimerConfiguration::new(self.total_session_minutes, self.focus_minutes)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    /// One JSON object per line, appended to `StoreConfig::path`.
    Jsonl,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            path: PathBuf::from("sessions.jsonl"),
        }
    }
}

impl Default for FocusclockConfig {
    fn default() -> Self {
        Self {
            resolution: TickResolution::Realtime,
            defaults: SessionDefaults::default(),
            store: StoreConfig::default(),
            user_id: None,
            log_level: "info".to_string(),
            channel_capacity: 64,
        }
    }
}

impl FocusclockConfig {
    /// Loads the configuration, layering an optional TOML file under
    /// `FOCUSCLOCK__`-prefixed environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                File::new(&path.to_string_lossy(), FileFormat::Toml).required(true),
            );
        }
        let settings = builder
            .add_source(
                Environment::with_prefix("FOCUSCLOCK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_the_setup_screen() {
        let config = FocusclockConfig::default();
        assert_eq!(config.resolution.tick_period(), Duration::from_secs(1));
        let session = config.defaults.to_configuration().unwrap();
        assert_eq!(session.break_minutes(), 5);
    }

    #[test]
    fn accelerated_resolution_shortens_the_period() {
        let fast = TickResolution::Accelerated { factor: 50 };
        assert_eq!(fast.tick_period(), Duration::from_millis(20));
        let degenerate = TickResolution::Accelerated { factor: 0 };
        assert_eq!(degenerate.tick_period(), Duration::from_secs(1));
    }

    #[test]
    fn loads_partial_toml_over_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
user_id = "ada"

[resolution.accelerated]
factor = 10

[defaults]
total_session_minutes = 50

[store]
kind = "jsonl"
path = "/tmp/focus.jsonl"
"#
        )
        .unwrap();

        let config = FocusclockConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.user_id.as_deref(), Some("ada"));
        assert_eq!(config.resolution, TickResolution::Accelerated { factor: 10 });
        assert_eq!(config.defaults.total_session_minutes, 50);
        assert_eq!(config.defaults.focus_minutes, 20);
        assert_eq!(config.store.kind, StoreKind::Jsonl);
        assert_eq!(config.channel_capacity, 64);
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let err = FocusclockConfig::load(Some(Path::new("/definitely/not/here.toml")));
        assert!(matches!(err, Err(ConfigError::Load(_))));
    }
}
