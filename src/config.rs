//! Application-level configuration loading: room timings, limits, rewards and identities.

use std::{collections::HashMap, env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

use crate::{
    dao::models::Profile,
    dto::room::RoomSettingsInput,
    error::RoomError,
    state::{room::RoomSettings, scoring::RewardTable},
};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "QUIZ_DUEL_CONFIG_PATH";

/// Delays driving a room once the quiz has started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomTimings {
    /// Pause between "everyone answered" and the results.
    pub settle_delay: Duration,
    /// Pause between the results and the next question.
    pub inter_question_delay: Duration,
    /// Pause between the last results and the final leaderboard.
    pub finish_delay: Duration,
    /// How long a finished or abandoned room stays registered.
    pub grace_period: Duration,
    /// How long a new socket may take to authenticate.
    pub identification_timeout: Duration,
}

impl Default for RoomTimings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(2),
            inter_question_delay: Duration::from_secs(5),
            finish_delay: Duration::from_secs(3),
            grace_period: Duration::from_secs(60),
            identification_timeout: Duration::from_secs(10),
        }
    }
}

/// Defaults and upper bounds applied to room settings supplied by hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RoomLimits {
    /// Player limit when the host gives none.
    pub default_max_players: usize,
    /// Highest player limit a host may request.
    pub max_players: usize,
    /// Seconds per question when the host gives none.
    pub default_time_per_question: u32,
    /// Highest seconds per question a host may request.
    pub max_time_per_question: u32,
}

impl Default for RoomLimits {
    fn default() -> Self {
        Self {
            default_max_players: 8,
            max_players: 50,
            default_time_per_question: 30,
            max_time_per_question: 300,
        }
    }
}

#[derive(Debug, Clone, Default)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Delays and timeouts of the room lifecycle.
    pub timings: RoomTimings,
    /// Bounds on host-supplied room settings.
    pub limits: RoomLimits,
    /// Experience granted by finishing position.
    pub rewards: RewardTable,
    /// Optional JSON file with extra quizzes.
    pub quiz_path: Option<PathBuf>,
    /// Static token table handed to the identity provider.
    pub identities: HashMap<String, Profile>,
    /// Admit `guest:<name>` tokens.
    pub allow_guests: bool,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        identities = app_config.identities.len(),
                        allow_guests = app_config.allow_guests,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::with_defaults()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::with_defaults()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::with_defaults()
            }
        }
    }

    /// Built-in configuration: default timings and limits, guests allowed.
    pub fn with_defaults() -> Self {
        RawConfig::default().into()
    }

    /// Turn host-supplied settings into the settings a room is created with.
    ///
    /// Missing values take the configured defaults; values above the configured
    /// caps are rejected.
    pub fn resolve_settings(&self, input: RoomSettingsInput) -> Result<RoomSettings, RoomError> {
        let limits = &self.limits;

        let max_players = input.max_players.unwrap_or(limits.default_max_players);
        if max_players > limits.max_players {
            return Err(RoomError::Validation(format!(
                "max_players must be at most {}",
                limits.max_players
            )));
        }

        let time_per_question = input
            .time_per_question
            .unwrap_or(limits.default_time_per_question);
        if time_per_question > limits.max_time_per_question {
            return Err(RoomError::Validation(format!(
                "time_per_question must be at most {}",
                limits.max_time_per_question
            )));
        }

        Ok(RoomSettings {
            max_players,
            time_per_question,
            question_count: input.question_count,
            options: input.options,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    timings: RawTimings,
    limits: RoomLimits,
    rewards: RewardTable,
    quiz_path: Option<PathBuf>,
    identities: Vec<RawIdentity>,
    allow_guests: bool,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            timings: RawTimings::default(),
            limits: RoomLimits::default(),
            rewards: RewardTable::default(),
            quiz_path: None,
            identities: Vec::new(),
            allow_guests: true,
        }
    }
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let identities = value
            .identities
            .into_iter()
            .map(|raw| (raw.token, raw.profile))
            .collect();
        Self {
            timings: value.timings.into(),
            limits: value.limits,
            rewards: value.rewards,
            quiz_path: value.quiz_path,
            identities,
            allow_guests: value.allow_guests,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
/// Delays expressed in milliseconds inside the configuration file.
struct RawTimings {
    settle_delay_ms: u64,
    inter_question_delay_ms: u64,
    finish_delay_ms: u64,
    grace_period_ms: u64,
    identification_timeout_ms: u64,
}

impl Default for RawTimings {
    fn default() -> Self {
        let defaults = RoomTimings::default();
        Self {
            settle_delay_ms: millis(defaults.settle_delay),
            inter_question_delay_ms: millis(defaults.inter_question_delay),
            finish_delay_ms: millis(defaults.finish_delay),
            grace_period_ms: millis(defaults.grace_period),
            identification_timeout_ms: millis(defaults.identification_timeout),
        }
    }
}

impl From<RawTimings> for RoomTimings {
    fn from(value: RawTimings) -> Self {
        Self {
            settle_delay: Duration::from_millis(value.settle_delay_ms),
            inter_question_delay: Duration::from_millis(value.inter_question_delay_ms),
            finish_delay: Duration::from_millis(value.finish_delay_ms),
            grace_period: Duration::from_millis(value.grace_period_ms),
            identification_timeout: Duration::from_millis(value.identification_timeout_ms),
        }
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[derive(Debug, Deserialize)]
/// One entry of the static token table.
struct RawIdentity {
    token: String,
    #[serde(flatten)]
    profile: Profile,
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let raw: RawConfig = serde_json::from_str("{}").unwrap();
        let config = AppConfig::from(raw);
        assert_eq!(config.timings, RoomTimings::default());
        assert_eq!(config.limits, RoomLimits::default());
        assert_eq!(config.rewards, RewardTable::default());
        assert!(config.allow_guests);
        assert!(config.identities.is_empty());
    }

    #[test]
    fn partial_file_overrides_only_given_values() {
        let raw: RawConfig = serde_json::from_str(
            r#"{
                "timings": {"settle_delay_ms": 500},
                "rewards": {"base_xp": 200},
                "allow_guests": false,
                "identities": [{"token": "t1", "id": "u1", "name": "Una"}]
            }"#,
        )
        .unwrap();
        let config = AppConfig::from(raw);

        assert_eq!(config.timings.settle_delay, Duration::from_millis(500));
        assert_eq!(config.timings.grace_period, Duration::from_secs(60));
        assert_eq!(config.rewards.base_xp, 200);
        assert_eq!(config.rewards.step_xp, 20);
        assert!(!config.allow_guests);
        assert_eq!(config.identities["t1"].name, "Una");
        assert_eq!(config.identities["t1"].level, 1);
    }

    #[test]
    fn settings_fall_back_to_defaults() {
        let config = AppConfig::with_defaults();
        let settings = config
            .resolve_settings(RoomSettingsInput::default())
            .unwrap();
        assert_eq!(settings.max_players, 8);
        assert_eq!(settings.time_per_question, 30);
        assert_eq!(settings.question_count, None);
    }

    #[test]
    fn settings_above_the_caps_are_rejected() {
        let mut config = AppConfig::with_defaults();
        config.limits.max_players = 4;
        let err = config
            .resolve_settings(RoomSettingsInput {
                max_players: Some(5),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }
}
