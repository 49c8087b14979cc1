//! Conversation log sent to the language model.

use crate::collaborators::ChatMessage;
use std::collections::VecDeque;

/// Persona and topic prompts followed by a bounded window of dialogue.
///
/// The persona prompt and the active topic prompt are pinned; only dialogue
/// messages are subject to the `max_messages` window (0 = unbounded).
#[derive(Debug, Clone)]
pub struct ConversationLog {
    persona: Option<ChatMessage>,
    topic: Option<ChatMessage>,
    dialogue: VecDeque<ChatMessage>,
    max_messages: usize,
}

impl ConversationLog {
    pub fn new(persona_prompt: &str, max_messages: usize) -> Self {
        let persona = (!persona_prompt.trim().is_empty())
            .then(|| ChatMessage::system(persona_prompt));
        Self {
            persona,
            topic: None,
            dialogue: VecDeque::new(),
            max_messages,
        }
    }

    /// Replace the active topic instructions.
    pub fn set_topic_prompt(&mut self, prompt: impl Into<String>) {
        self.topic = Some(ChatMessage::system(prompt));
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.push(ChatMessage::assistant(content));
    }

    fn push(&mut self, message: ChatMessage) {
        self.dialogue.push_back(message);
        if self.max_messages > 0 {
            while self.dialogue.len() > self.max_messages {
                let _ = self.dialogue.pop_front();
            }
        }
    }

    /// Number of dialogue messages currently held.
    pub fn dialogue_len(&self) -> usize {
        self.dialogue.len()
    }

    /// Messages in request order.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.persona
            .iter()
            .chain(self.topic.iter())
            .chain(self.dialogue.iter())
            .cloned()
            .collect()
    }
}
