//! Game configuration schema.
//!
//! Every section has a `Default` so a partial YAML file only needs to
//! list the values it overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::game::model::Point;

/// Root configuration for a game engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GameConfig {
    pub session: SessionSettings,
    pub cipher: CipherSettings,
    pub meeting: MeetingSettings,
    pub tasks: TaskSettings,
    pub persistence: PersistenceSettings,
}

/// Roster-level rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionSettings {
    /// Number of saboteurs picked per session. Must stay below the roster size.
    pub saboteur_count: usize,
    /// Saboteurs win once this many (or fewer) players are alive.
    pub survival_threshold: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            saboteur_count: 1,
            survival_threshold: 3,
        }
    }
}

/// Secret artifact settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CipherSettings {
    /// Candidate secrets; one is drawn per session.
    pub secrets: Vec<String>,
    /// Character shown for hidden positions.
    pub placeholder: char,
    /// Percentage points earned per saboteur task.
    pub reveal_step: u32,
    /// Percentage points re-masked per majority wave.
    pub conceal_step: u32,
}

impl Default for CipherSettings {
    fn default() -> Self {
        Self {
            secrets: vec![
                "THE VAULT OPENS AT DAWN".to_owned(),
                "ORBITAL RELAY SEVEN IS COMPROMISED".to_owned(),
                "TRUST NO ONE IN ENGINEERING".to_owned(),
            ],
            placeholder: '*',
            reveal_step: 10,
            conceal_step: 5,
        }
    }
}

/// Meeting trigger and chat rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MeetingSettings {
    /// Majority completions since the last meeting that start a new one.
    pub task_threshold: u64,
    /// Minimum time between automatic meetings.
    #[serde(with = "duration_str")]
    pub cooldown: Duration,
    /// Meetings end on their own after this long.
    #[serde(with = "duration_str")]
    pub duration: Duration,
    /// Longest accepted chat message, in characters.
    pub max_message_len: usize,
}

impl Default for MeetingSettings {
    fn default() -> Self {
        Self {
            task_threshold: 3,
            cooldown: Duration::from_secs(30),
            duration: Duration::from_secs(60),
            max_message_len: 280,
        }
    }
}

/// Task catalog and claim validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TaskSettings {
    /// Maximum distance between the reported position and the task.
    /// `None` disables the proximity check.
    pub proximity_threshold: Option<f64>,
    /// Tasks handed to every majority player.
    pub majority: Vec<TaskTemplate>,
    /// Tasks handed to every saboteur.
    pub saboteur: Vec<TaskTemplate>,
}

impl TaskSettings {
    /// Number of majority tasks each majority player owns.
    #[must_use]
    pub fn tasks_per_player(&self) -> usize {
        self.majority.len()
    }
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            proximity_threshold: Some(3.0),
            majority: vec![
                TaskTemplate::new("wiring", "Fix Wiring", 4.0, 12.0, 10),
                TaskTemplate::new("reactor", "Stabilize Reactor", 18.0, 3.0, 15),
                TaskTemplate::new("navigation", "Chart Course", 30.0, 20.0, 10),
                TaskTemplate::new("filters", "Clean O2 Filter", 9.0, 27.0, 5),
            ],
            saboteur: vec![
                TaskTemplate::new("relay", "Tap Comms Relay", 22.0, 14.0, 20),
                TaskTemplate::new("terminal", "Breach Terminal", 2.0, 2.0, 20),
                TaskTemplate::new("archive", "Copy Archive", 35.0, 8.0, 20),
            ],
        }
    }
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskTemplate {
    /// Stable key, unique within its catalog.
    pub key: String,
    pub name: String,
    pub location: Point,
    #[serde(default = "default_points")]
    pub points: u32,
}

const fn default_points() -> u32 {
    10
}

impl TaskTemplate {
    #[must_use]
    pub fn new(key: &str, name: &str, x: f64, y: f64, points: u32) -> Self {
        Self {
            key: key.to_owned(),
            name: name.to_owned(),
            location: Point::new(x, y),
            points,
        }
    }
}

/// Retry policy for critical durable writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PersistenceSettings {
    /// Total attempts for a critical write (first try included).
    pub max_attempts: u32,
    #[serde(with = "duration_str")]
    pub initial_backoff: Duration,
    #[serde(with = "duration_str")]
    pub max_backoff: Duration,
}

impl Default for PersistenceSettings {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
        }
    }
}

/// Serde adapter for human-readable durations such as `"30s"` or `"1m 30s"`.
mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = GameConfig::default();
        assert_eq!(config.session.saboteur_count, 1);
        assert_eq!(config.meeting.task_threshold, 3);
        assert_eq!(config.meeting.cooldown, Duration::from_secs(30));
        assert_eq!(config.meeting.duration, Duration::from_secs(60));
        assert_eq!(config.tasks.tasks_per_player(), 4);
        assert!(!config.cipher.secrets.is_empty());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let yaml = "meeting:\n  cooldown: 10s\n  duration: 1m 30s\n";
        let config: GameConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.meeting.cooldown, Duration::from_secs(10));
        assert_eq!(config.meeting.duration, Duration::from_secs(90));
        assert_eq!(config.meeting.task_threshold, 3);
        assert_eq!(config.session, SessionSettings::default());
    }

    #[test]
    fn unknown_fields_rejected() {
        let yaml = "meeting:\n  cooldwn: 10s\n";
        assert!(serde_yaml::from_str::<GameConfig>(yaml).is_err());
    }

    #[test]
    fn bad_duration_rejected() {
        let yaml = "meeting:\n  cooldown: soon\n";
        assert!(serde_yaml::from_str::<GameConfig>(yaml).is_err());
    }

    #[test]
    fn template_points_default() {
        let yaml = "key: scan\nname: Submit Scan\nlocation: { x: 1.0, y: 2.0 }\n";
        let template: TaskTemplate = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(template.points, 10);
        assert_eq!(template.location, Point::new(1.0, 2.0));
    }

    #[test]
    fn yaml_round_trip_of_defaults() {
        let yaml = serde_yaml::to_string(&GameConfig::default()).unwrap();
        let parsed: GameConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, GameConfig::default());
    }
}
