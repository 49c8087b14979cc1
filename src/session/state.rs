//! State machine vocabulary for the turn controller.

use std::fmt;

/// Step of the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Waiting for the face sensor to report someone.
    AwaitingFace,
    /// Speaking the fixed welcome.
    Greeting,
    /// Introducing the opening topic.
    TopicIntro,
    /// Transcribing the user's reply.
    Listening,
    /// Deciding between responding and switching topic.
    Evaluate,
    /// Speaking the language model's reply.
    Respond,
    /// Acknowledging disinterest and introducing a new topic.
    SwitchTopic,
    /// Terminal.
    Done,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        self == Self::Done
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AwaitingFace => "awaiting_face",
            Self::Greeting => "greeting",
            Self::TopicIntro => "topic_intro",
            Self::Listening => "listening",
            Self::Evaluate => "evaluate",
            Self::Respond => "respond",
            Self::SwitchTopic => "switch_topic",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Who holds the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    AwaitingUser,
    Speaking,
    Listening,
    /// An interrupt was observed and is being handled.
    Interrupted,
}
