//! Error types for the storyteller session.

/// Top-level error type for the turn-taking session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Configuration or credential error. Fatal at startup.
    #[error("config error: {0}")]
    Config(String),

    /// Topic dataset could not be read or parsed.
    #[error("dataset error: {0}")]
    Dataset(String),

    /// Requested topic id is not in the dataset.
    #[error("topic not found: {0}")]
    TopicNotFound(String),

    /// Language model request error.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Speech-to-text collaborator error.
    #[error("speech input error: {0}")]
    SpeechInput(String),

    /// Text-to-speech collaborator error.
    #[error("speech output error: {0}")]
    SpeechOutput(String),

    /// Gesture, LED or posture command error.
    #[error("actuator error: {0}")]
    Actuator(String),

    /// Face or touch sensor error.
    #[error("sensor error: {0}")]
    Sensor(String),

    /// Image/audio playback error.
    #[error("media error: {0}")]
    Media(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, SessionError>;
