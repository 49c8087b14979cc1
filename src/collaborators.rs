//! Contracts for the external services the session drives.
//!
//! Camera and face detection, speech recognition, speech synthesis, robot
//! actuators, touch sensors and the language model all live behind these
//! traits. The turn controller only ever talks to them through `Arc<dyn _>`
//! handles so a robot SDK, a console stand-in or a test fake can be swapped
//! in without touching the state machine.

use crate::error::Result;
use crate::topics::Topic;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// A face bounding box reported by the face detector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One face-detection result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    pub faces: Vec<BoundingBox>,
}

impl Detection {
    /// Whether at least one face was found.
    pub fn has_face(&self) -> bool {
        !self.faces.is_empty()
    }
}

/// State of one touch channel (head, hand, bumper...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TouchReading {
    pub channel: String,
    pub active: bool,
}

/// Callback invoked by a [`TouchSensor`] on its own execution context.
pub type TouchHandler = Arc<dyn Fn(&[TouchReading]) + Send + Sync>;

/// Eye LED cue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EyeColor {
    /// Listening to the user.
    Green,
    /// Speaking.
    Blue,
    Off,
}

/// Body posture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Posture {
    Stand,
    Sit,
}

/// Chat message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in the conversation sent to the language model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Media that accompanies a topic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicMedia {
    pub images: Vec<PathBuf>,
    pub audio: Option<PathBuf>,
}

impl TopicMedia {
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.audio.is_none()
    }
}

impl From<&Topic> for TopicMedia {
    fn from(topic: &Topic) -> Self {
        Self {
            images: topic.images.clone(),
            audio: topic.audio.clone(),
        }
    }
}

/// Face detector fed by the camera.
#[async_trait]
pub trait FaceSensor: Send + Sync {
    /// Wait up to `timeout` for the newest detection. `Ok(None)` means nothing
    /// arrived in time.
    async fn poll(&self, timeout: Duration) -> Result<Option<Detection>>;
}

/// Speech recognition.
#[async_trait]
pub trait SpeechInput: Send + Sync {
    /// Record and transcribe one utterance. Returns an empty string when the
    /// user did not start speaking within `wait_timeout`.
    async fn transcribe(&self, wait_timeout: Duration, max_duration: Duration) -> Result<String>;
}

/// Speech synthesis. `speak` resolves once the utterance has finished.
#[async_trait]
pub trait SpeechOutput: Send + Sync {
    async fn speak(&self, text: &str) -> Result<()>;
}

/// Robot body: gestures, eye LEDs and posture.
#[async_trait]
pub trait GestureActuator: Send + Sync {
    async fn play(&self, gesture: &str) -> Result<()>;

    async fn set_eye_color(&self, color: EyeColor) -> Result<()>;

    async fn set_posture(&self, posture: Posture) -> Result<()>;
}

/// Chat-completion language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;
}

/// Touch sensors. The handler may be invoked from any thread.
pub trait TouchSensor: Send + Sync {
    fn subscribe(&self, handler: TouchHandler) -> Result<()>;
}

/// Image slideshow and ambient audio for the active topic.
#[async_trait]
pub trait MediaPlayer: Send + Sync {
    /// Start playback, replacing anything already playing.
    async fn start(&self, media: &TopicMedia) -> Result<()>;

    /// Stop playback. Must be idempotent.
    async fn stop(&self) -> Result<()>;
}

/// Whether any reading in a touch event is active.
pub fn any_touch_active(readings: &[TouchReading]) -> bool {
    readings.iter().any(|r| r.active)
}
