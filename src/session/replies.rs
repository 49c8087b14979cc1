//! Disengagement detection over the user's most recent replies.

use std::collections::VecDeque;

/// Bounded window of the last user utterances.
#[derive(Debug, Clone)]
pub struct RecentReplies {
    capacity: usize,
    replies: VecDeque<String>,
}

impl RecentReplies {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            replies: VecDeque::with_capacity(capacity),
        }
    }

    /// Record a reply, dropping the oldest when the window is full.
    pub fn push(&mut self, reply: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        if self.replies.len() == self.capacity {
            let _ = self.replies.pop_front();
        }
        self.replies.push_back(reply.into());
    }

    pub fn clear(&mut self) {
        self.replies.clear();
    }

    pub fn len(&self) -> usize {
        self.replies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }

    pub fn latest(&self) -> Option<&str> {
        self.replies.back().map(String::as_str)
    }

    /// True once the window is full and every reply in it has fewer than
    /// `word_threshold` words.
    pub fn all_short(&self, word_threshold: usize) -> bool {
        self.capacity > 0
            && self.replies.len() == self.capacity
            && self
                .replies
                .iter()
                .all(|r| word_count(r) < word_threshold)
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
