//! Session data: the configuration chosen at setup, the feedback collected
//! between phases, and the record handed to the store at the end.

use crate::error::ConfigError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const SECONDS_PER_MINUTE: u64 = 60;

/// Default productivity level shown before the user moves the slider.
pub const DEFAULT_PRODUCTIVITY: u8 = 5;

/// Total session length and how much of it is focus time.
///
/// The break is whatever remains. A configuration is validated once, on
/// construction, and copied into the coordinator when a session starts, so
/// later edits by the caller never reach a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfiguration {
    total_session_minutes: u32,
    focus_minutes: u32,
}

impl TimerConfiguration {
    pub fn new(total_session_minutes: u32, focus_minutes: u32) -> Result<Self, ConfigError> {
        if focus_minutes > total_session_minutes {
            return Err(ConfigError::FocusExceedsTotal {
                focus: focus_minutes,
                total: total_session_minutes,
            });
        }
        Ok(Self {
            total_session_minutes,
            focus_minutes,
        })
    }

    pub fn total_session_minutes(&self) -> u32 {
        self.total_session_minutes
    }

    pub fn focus_minutes(&self) -> u32 {
        self.focus_minutes
    }

    /// Never underflows: `new` guarantees `focus <= total`.
    pub fn break_minutes(&self) -> u32 {
        self.total_session_minutes - self.focus_minutes
    }

    pub fn focus_seconds(&self) -> u64 {
        u64::from(self.focus_minutes) * SECONDS_PER_MINUTE
    }

    pub fn break_seconds(&self) -> u64 {
        u64::from(self.break_minutes()) * SECONDS_PER_MINUTE
    }
}

/// A point on the mood grid. `x` runs sad → happy, `y` irritated → calm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mood {
    pub x: f64,
    pub y: f64,
}

impl Default for Mood {
    fn default() -> Self {
        Self { x: 0.5, y: 0.5 }
    }
}

impl Mood {
    pub fn new(x: f64, y: f64) -> Result<Self, ConfigError> {
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_unit(x) || !in_unit(y) {
            return Err(ConfigError::MoodOutOfRange);
        }
        Ok(Self { x, y })
    }

    /// The grid colour under this point, as `#rrggbb`.
    ///
    /// X blends blue into yellow, Y blends magenta into green, and the two are
    /// averaged channel by channel.
    pub fn color(&self) -> String {
        let channel = |v: f64| (255.0 * v).round() as u16;
        let x_rgb = [channel(self.x), channel(self.x), channel(1.0 - self.x)];
        let y_rgb = [channel(1.0 - self.y), channel(self.y), channel(1.0 - self.y)];
        let blend = |i: usize| ((f64::from(x_rgb[i]) + f64::from(y_rgb[i])) / 2.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", blend(0), blend(1), blend(2))
    }
}

/// What the user reports when a focus phase ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FocusFeedback {
    pub mood: Mood,
    pub productivity_level: u8,
}

impl FocusFeedback {
    pub fn new(mood: Mood, productivity_level: u8) -> Result<Self, ConfigError> {
        if !(1..=10).contains(&productivity_level) {
            return Err(ConfigError::ProductivityOutOfRange(productivity_level));
        }
        Ok(Self {
            mood,
            productivity_level,
        })
    }
}

/// What the user reports when a break ends.
///
/// Negative satisfaction means the break felt too short, positive too long.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakFeedback {
    pub activity: Option<String>,
    pub satisfaction: i8,
}

impl BreakFeedback {
    pub fn new(activity: Option<String>, satisfaction: i8) -> Result<Self, ConfigError> {
        if !(-10..=10).contains(&satisfaction) {
            return Err(ConfigError::SatisfactionOutOfRange(satisfaction));
        }
        let activity = activity
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());
        Ok(Self {
            activity,
            satisfaction,
        })
    }
}

/// Feedback for one full session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub mood: Mood,
    pub productivity_level: u8,
    pub break_activity: Option<String>,
    pub break_satisfaction: i8,
}

impl FeedbackRecord {
    pub fn from_parts(focus: FocusFeedback, rest: BreakFeedback) -> Self {
        Self {
            mood: focus.mood,
            productivity_level: focus.productivity_level,
            break_activity: rest.activity,
            break_satisfaction: rest.satisfaction,
        }
    }
}

/// A task the user worked on during a session, with the time spent on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTask {
    pub task_id: String,
    pub task_seconds: u64,
}

impl SessionTask {
    pub fn new(task_id: &str) -> Result<Self, ConfigError> {
        let task_id = task_id.trim();
        if task_id.is_empty() {
            return Err(ConfigError::EmptyTaskId);
        }
        Ok(Self {
            task_id: task_id.to_string(),
            task_seconds: 0,
        })
    }
}

/// A completed session as it is written to a store.
///
/// Field names match the columns the hosted backend uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: Uuid,
    pub user_id: String,
    pub session_minutes: u32,
    pub focus_minutes: u32,
    pub prod_level: u8,
    pub mood_x: f64,
    pub mood_y: f64,
    pub break_activity: Option<String>,
    pub break_satisfaction: i8,
    pub created_at: DateTime<Utc>,
    /// Tasks attributed to this session.
    #[serde(default)]
    pub tasks: Vec<SessionTask>,
}

/// Everything needed for a `SessionRecord` except who it belongs to.
///
/// The identity is only looked up at save time.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionDraft {
    pub config: TimerConfiguration,
    pub feedback: FeedbackRecord,
    pub tasks: Vec<SessionTask>,
    pub completed_at: DateTime<Utc>,
}

impl SessionDraft {
    pub fn into_record(self, user_id: String) -> SessionRecord {
        SessionRecord {
            id: Uuid::new_v4(),
            user_id,
            session_minutes: self.config.total_session_minutes(),
            focus_minutes: self.config.focus_minutes(),
            prod_level: self.feedback.productivity_level,
            mood_x: self.feedback.mood.x,
            mood_y: self.feedback.mood.y,
            break_activity: self.feedback.break_activity,
            break_satisfaction: self.feedback.break_satisfaction,
            created_at: self.completed_at,
            tasks: self.tasks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn break_is_the_remainder_of_the_session() {
        let config = TimerConfiguration::new(45, 30).unwrap();
        assert_eq!(config.break_minutes(), 15);
        assert_eq!(config.focus_seconds(), 1800);
        assert_eq!(config.break_seconds(), 900);
    }

    #[test]
    fn focus_longer_than_session_is_rejected() {
        let err = TimerConfiguration::new(20, 25).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::FocusExceedsTotal {
                focus: 25,
                total: 20
            }
        ));
    }

    #[test]
    fn feedback_ranges_are_enforced() {
        assert!(FocusFeedback::new(Mood::default(), 0).is_err());
        assert!(FocusFeedback::new(Mood::default(), 11).is_err());
        assert!(FocusFeedback::new(Mood::default(), 10).is_ok());
        assert!(BreakFeedback::new(None, -11).is_err());
        assert!(BreakFeedback::new(None, 10).is_ok());
        assert!(Mood::new(1.2, 0.3).is_err());
        assert!(Mood::new(f64::NAN, 0.3).is_err());
    }

    #[test]
    fn blank_break_activity_is_dropped() {
        let rest = BreakFeedback::new(Some("   ".into()), 0).unwrap();
        assert_eq!(rest.activity, None);
        let rest = BreakFeedback::new(Some(" walk ".into()), 0).unwrap();
        assert_eq!(rest.activity.as_deref(), Some("walk"));
    }

    #[test]
    fn mood_color_matches_grid_corners() {
        // sad and irritated: blue averaged with magenta
        assert_eq!(Mood::new(0.0, 0.0).unwrap().color(), "#8000ff");
        // happy and calm: yellow averaged with green
        assert_eq!(Mood::new(1.0, 1.0).unwrap().color(), "#80ff00");
    }

    #[test]
    fn draft_becomes_record_with_store_field_names() {
        let draft = SessionDraft {
            config: TimerConfiguration::new(30, 25).unwrap(),
            feedback: FeedbackRecord::from_parts(
                FocusFeedback::new(Mood::new(0.6, 0.4).unwrap(), 8).unwrap(),
                BreakFeedback::new(Some("walk".into()), -2).unwrap(),
            ),
            tasks: vec![SessionTask {
                task_id: "essay".into(),
                task_seconds: 600,
            }],
            completed_at: Utc::now(),
        };
        let record = draft.into_record("user-1".into());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["session_minutes"], 30);
        assert_eq!(json["focus_minutes"], 25);
        assert_eq!(json["prod_level"], 8);
        assert_eq!(json["mood_x"], 0.6);
        assert_eq!(json["break_activity"], "walk");
        assert_eq!(json["break_satisfaction"], -2);
        assert_eq!(json["user_id"], "user-1");
        assert_eq!(json["tasks"][0]["task_id"], "essay");
        assert_eq!(json["tasks"][0]["task_seconds"], 600);
    }

    #[test]
    fn task_ids_are_trimmed_and_must_not_be_blank() {
        assert_eq!(SessionTask::new(" essay ").unwrap().task_id, "essay");
        assert!(matches!(SessionTask::new("  "), Err(ConfigError::EmptyTaskId)));
    }

    #[test]
    fn records_written_before_tasks_existed_still_load() {
        let line = r#"{"id":"6f2c1a4e-8a4f-4d53-9d5e-0d7f3f2b9a11","user_id":"u","session_minutes":30,"focus_minutes":25,"prod_level":5,"mood_x":0.5,"mood_y":0.5,"break_activity":null,"break_satisfaction":0,"created_at":"2026-01-01T00:00:00Z"}"#;
        let record: SessionRecord = serde_json::from_str(line).unwrap();
        assert!(record.tasks.is_empty());
    }
}
