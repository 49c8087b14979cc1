//! Historical era topics used to seed the storyteller persona.
//!
//! Topics are loaded once from a JSON object mapping an era id (e.g.
//! `"1600s"`) to the role, era description, guiding questions and dialogue
//! style for that era. A [`TopicSource`] hands them out without repetition
//! until every era has been used, then starts over.

use crate::error::{Result, SessionError};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Prompt used when no topic is available.
const FALLBACK_PROMPT: &str = "You are a historian in Amsterdam. Engage with the user using your \
                               knowledge of Amsterdam's history.";

/// A themed persona-and-era bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    /// Era key, e.g. `"1500s"`.
    pub id: String,
    pub role_description: String,
    pub era_description: String,
    pub interactive_questions: Vec<String>,
    pub dialogue_style: Vec<String>,
    /// Images shown while the topic is active.
    pub images: Vec<PathBuf>,
    /// Ambient audio looped while the topic is active.
    pub audio: Option<PathBuf>,
}

/// On-disk shape of one era entry.
#[derive(Debug, Deserialize)]
struct TopicRecord {
    role: String,
    era_description: String,
    #[serde(default)]
    interactive_questions: Vec<String>,
    #[serde(default)]
    dialogue_style: Vec<String>,
    #[serde(default)]
    image: Vec<PathBuf>,
    #[serde(default)]
    audio: Option<PathBuf>,
}

impl TopicRecord {
    fn into_topic(self, id: String) -> Topic {
        Topic {
            id,
            role_description: self.role,
            era_description: self.era_description,
            interactive_questions: self.interactive_questions,
            dialogue_style: self.dialogue_style,
            images: self.image,
            audio: self.audio.filter(|p| !p.as_os_str().is_empty()),
        }
    }
}

/// Parse a dataset document into topics keyed by id.
///
/// # Errors
///
/// Returns [`SessionError::Dataset`] if the JSON is malformed.
pub fn parse_topics(json: &str) -> Result<BTreeMap<String, Topic>> {
    let records: BTreeMap<String, TopicRecord> = serde_json::from_str(json)
        .map_err(|e| SessionError::Dataset(format!("invalid era dataset: {e}")))?;
    Ok(records
        .into_iter()
        .map(|(id, record)| (id.clone(), record.into_topic(id)))
        .collect())
}

/// Hands out topics without repetition, resetting once all have been used.
pub struct TopicSource {
    topics: BTreeMap<String, Topic>,
    used: HashSet<String>,
    current: Option<String>,
    rng: StdRng,
}

impl TopicSource {
    /// Create a source over the given topics.
    pub fn new(topics: impl IntoIterator<Item = Topic>) -> Self {
        Self::with_rng(topics, StdRng::from_entropy())
    }

    /// Create a source with a fixed random seed (deterministic selection order).
    pub fn with_seed(topics: impl IntoIterator<Item = Topic>, seed: u64) -> Self {
        Self::with_rng(topics, StdRng::seed_from_u64(seed))
    }

    fn with_rng(topics: impl IntoIterator<Item = Topic>, rng: StdRng) -> Self {
        Self {
            topics: topics.into_iter().map(|t| (t.id.clone(), t)).collect(),
            used: HashSet::new(),
            current: None,
            rng,
        }
    }

    /// Load topics from a JSON dataset file.
    ///
    /// A missing or unreadable dataset is not fatal: the source comes back
    /// empty and [`format_prompt`](Self::format_prompt) falls back to a
    /// generic historian prompt.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(json) => match parse_topics(&json) {
                Ok(topics) => {
                    info!("loaded {} eras from {}", topics.len(), path.display());
                    Self::new(topics.into_values())
                }
                Err(e) => {
                    warn!("{e} ({}); continuing without topics", path.display());
                    Self::new(Vec::new())
                }
            },
            Err(e) => {
                warn!(
                    "era dataset {} unavailable: {e}; continuing without topics",
                    path.display()
                );
                Self::new(Vec::new())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    /// All era ids in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.topics.keys().map(String::as_str)
    }

    /// The most recently selected topic.
    pub fn current(&self) -> Option<&Topic> {
        self.current.as_ref().and_then(|id| self.topics.get(id))
    }

    /// Pick a uniformly random topic that has not been used this session.
    ///
    /// When every topic has been used the used-set is cleared first, so this
    /// only returns `None` for an empty dataset.
    pub fn next_topic(&mut self) -> Option<&Topic> {
        if self.topics.is_empty() {
            return None;
        }

        let mut remaining: Vec<&String> = self
            .topics
            .keys()
            .filter(|id| !self.used.contains(*id))
            .collect();
        if remaining.is_empty() {
            debug!("all {} eras used, starting over", self.topics.len());
            self.used.clear();
            remaining = self.topics.keys().collect();
        }

        let id = (*remaining.choose(&mut self.rng)?).clone();
        self.used.insert(id.clone());
        self.current = Some(id);
        self.current()
    }

    /// Select a specific topic and mark it used.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::TopicNotFound`] for an unknown id.
    pub fn topic_for_id(&mut self, id: &str) -> Result<&Topic> {
        if !self.topics.contains_key(id) {
            return Err(SessionError::TopicNotFound(id.to_owned()));
        }
        self.used.insert(id.to_owned());
        self.current = Some(id.to_owned());
        self.current()
            .ok_or_else(|| SessionError::TopicNotFound(id.to_owned()))
    }

    /// Format a topic as system instructions for the language model.
    pub fn format_prompt(topic: Option<&Topic>) -> String {
        let Some(topic) = topic else {
            return FALLBACK_PROMPT.to_owned();
        };
        format!(
            "You are role-playing as:\n{}\n\n\
             Era Description:\n{}\n\n\
             Interactive Questions to guide the conversation:\n{}\n\n\
             Dialogue Style:\n{}\n\n\
             Stay in character and engage the user interactively.",
            topic.role_description,
            topic.era_description,
            topic.interactive_questions.join(" "),
            topic.dialogue_style.join(" "),
        )
    }

    /// Short spoken introduction of a topic.
    pub fn introduction_line(topic: &Topic) -> String {
        format!("{} {}", topic.role_description, topic.era_description)
    }
}
