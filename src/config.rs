//! Configuration types for the storyteller session.

use crate::error::{Result, SessionError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the API credential for the language service.
pub const API_KEY_ENV: &str = "OPENAI_KEY";
/// Environment variable holding the robot's network address.
pub const ROBOT_ADDRESS_ENV: &str = "NAO_IP";

/// Top-level configuration for a storyteller session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Turn-taking and topic-switch behaviour.
    pub turns: TurnConfig,
    /// Speech input timeouts.
    pub listen: ListenConfig,
    /// Filler gestures played while speaking.
    pub filler: FillerConfig,
    /// Topic dataset settings.
    pub topics: TopicConfig,
    /// Language model settings.
    pub llm: LlmConfig,
    /// Per-topic image/audio playback.
    pub media: MediaConfig,
}

/// Turn budget, disengagement heuristic and fixed utterances.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TurnConfig {
    /// Maximum number of listening turns before the session ends.
    pub max_turns: usize,
    /// A reply with fewer words than this counts as short.
    pub short_reply_words: usize,
    /// Number of consecutive short replies that triggers a topic switch.
    pub short_reply_window: usize,
    /// How long each face-sensor poll waits before retrying, in milliseconds.
    pub face_poll_timeout_ms: u64,
    /// Spoken once a face is detected.
    pub welcome_message: String,
    /// Spoken when the topic is switched.
    pub switch_acknowledgment: String,
    /// Spoken when the dataset has no topic to offer.
    pub no_topic_message: String,
    /// Whether spoken switch requests ("change", "switch") trigger a topic switch.
    pub keyword_switch: bool,
    /// Phrases that count as a spoken switch request when `keyword_switch` is on.
    pub switch_keywords: Vec<String>,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            max_turns: 10,
            short_reply_words: 5,
            short_reply_window: 3,
            face_poll_timeout_ms: 5_000,
            welcome_message: "Hello! I am a social robot, and today, we will time-travel together \
                              to explore the fascinating history of Amsterdam. Get ready for an \
                              immersive experience!"
                .to_owned(),
            switch_acknowledgment:
                "Oh, I understand that you are uninterested in this subject, let me switch."
                    .to_owned(),
            no_topic_message: "I couldn't find any historical role. Let's continue!".to_owned(),
            keyword_switch: false,
            switch_keywords: vec![
                "switch".to_owned(),
                "change".to_owned(),
                "stop".to_owned(),
            ],
        }
    }
}

impl TurnConfig {
    /// Face-sensor poll timeout as a [`Duration`].
    pub fn face_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.face_poll_timeout_ms)
    }
}

/// Speech input timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    /// How long to wait for the user to start speaking, in seconds.
    pub wait_timeout_secs: u64,
    /// Longest utterance accepted, in seconds.
    pub max_utterance_secs: u64,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            wait_timeout_secs: 10,
            max_utterance_secs: 30,
        }
    }
}

impl ListenConfig {
    /// Wait-for-speech timeout.
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }

    /// Maximum utterance duration.
    pub fn max_utterance(&self) -> Duration {
        Duration::from_secs(self.max_utterance_secs)
    }
}

/// Filler gesture playback while the robot speaks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FillerConfig {
    /// Whether filler gestures are played at all.
    pub enabled: bool,
    /// Lower bound of the random pause between gestures, in milliseconds.
    pub min_interval_ms: u64,
    /// Upper bound of the random pause between gestures, in milliseconds.
    pub max_interval_ms: u64,
    /// Gesture identifiers to choose from.
    pub gestures: Vec<String>,
}

impl Default for FillerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval_ms: 1_000,
            max_interval_ms: 2_000,
            gestures: (1..=11)
                .map(|n| format!("animations/Stand/Gestures/Explain_{n}"))
                .collect(),
        }
    }
}

/// Topic dataset settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TopicConfig {
    /// Path to the era dataset (JSON).
    pub dataset_path: PathBuf,
    /// Era introduced first. Falls back to a random era when unset or unknown.
    pub opening_era: Option<String>,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("data/amsterdam_eras.json"),
            opening_era: Some("1500s".to_owned()),
        }
    }
}

/// Language model settings for the chat-completions API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible server.
    pub api_url: String,
    /// Model identifier.
    pub model: String,
    /// Persona prompt pinned at the start of every request.
    pub system_prompt: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Maximum tokens per reply.
    pub max_tokens: u32,
    /// Dialogue messages kept in the request window (0 = unbounded).
    pub max_history_messages: usize,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com".to_owned(),
            model: "gpt-4o-mini".to_owned(),
            system_prompt: "You are a social robot carrying out an experiment. You will only talk \
                            to one user at a time. The scenario is that you are a time traveler \
                            who has visited different periods in Amsterdam. Talk with an \
                            adventurous tone and use real facts of that time period to tell a \
                            story. Always remain on topic unless the user requests otherwise. \
                            Avoid sensitive or private information. Ask engaging questions to \
                            guide the conversation."
                .to_owned(),
            temperature: 0.7,
            max_tokens: 400,
            max_history_messages: 20,
            request_timeout_secs: 30,
        }
    }
}

/// Per-topic media playback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Start a topic's images and ambient audio when it is introduced.
    pub enabled: bool,
}

impl SessionConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| SessionError::Config(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| SessionError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `<config dir>/timewalk/config.toml`.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| std::env::temp_dir().join("timewalk-config"))
            .join("timewalk")
            .join("config.toml")
    }
}

/// Secrets and addresses that must come from the environment.
#[derive(Clone)]
pub struct Credentials {
    /// API key for the language and speech services.
    pub api_key: String,
    /// Network address of the robot.
    pub robot_address: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("robot_address", &self.robot_address)
            .finish()
    }
}

impl Credentials {
    /// Read credentials from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] naming every missing variable.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary lookup (used by tests).
    ///
    /// Blank values count as missing.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] naming every missing variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let api_key = get(API_KEY_ENV);
        let robot_address = get(ROBOT_ADDRESS_ENV);

        match (api_key, robot_address) {
            (Some(api_key), Some(robot_address)) => Ok(Self {
                api_key,
                robot_address,
            }),
            (api_key, robot_address) => {
                let missing: Vec<&str> = [
                    (api_key.is_none(), API_KEY_ENV),
                    (robot_address.is_none(), ROBOT_ADDRESS_ENV),
                ]
                .into_iter()
                .filter_map(|(absent, name)| absent.then_some(name))
                .collect();
                Err(SessionError::Config(format!(
                    "missing environment variables: {}",
                    missing.join(", ")
                )))
            }
        }
    }
}
