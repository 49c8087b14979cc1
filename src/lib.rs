//! timewalk: turn-taking controller for a time-travel storyteller robot.
//!
//! The robot waits for a face, greets the visitor, role-plays a character from
//! a historical era of Amsterdam and alternates between speaking and
//! listening. A head touch, a run of short replies or (optionally) a spoken
//! request makes it acknowledge the disinterest and switch to another era.
//!
//! # Architecture
//!
//! - **Session**: [`TurnController`] runs the phase machine on one task
//! - **Topics**: [`TopicSource`] hands out eras without repetition
//! - **Collaborators**: sensors, speech, body and the language model behind
//!   async traits in [`collaborators`]
//! - **LLM**: [`ApiLanguageModel`] talks to any chat-completions server
//! - **Console**: terminal stand-ins for running without a robot

pub mod collaborators;
pub mod config;
pub mod console;
pub mod error;
pub mod llm;
pub mod runtime;
pub mod session;
pub mod topics;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{Credentials, SessionConfig};
pub use error::{Result, SessionError};
pub use llm::ApiLanguageModel;
pub use runtime::{SessionEvent, SwitchReason};
pub use session::{Collaborators, Phase, SessionSummary, TurnController, TurnState};
pub use topics::{Topic, TopicSource};
