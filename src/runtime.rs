//! Runtime events emitted by the session for UI and observability.
//!
//! Events are broadcast best-effort: a lagging or absent subscriber never
//! blocks the turn loop.

use crate::session::state::{Phase, TurnState};

/// What triggered a topic switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchReason {
    /// Touch sensor (or another external signal) raised the interrupt flag.
    Interrupt,
    /// The last few replies were all short.
    ShortReplies,
    /// The user asked to change the subject.
    SpokenRequest,
}

/// Events that describe what the session is doing "right now".
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Session started.
    Started { session_id: String },
    /// State machine moved between phases.
    PhaseChanged { from: Phase, to: Phase },
    /// Speaking/listening state changed.
    TurnStateChanged(TurnState),
    /// A topic became active.
    TopicSelected { id: String },
    /// The robot finished (or attempted) one utterance.
    Spoken { text: String },
    /// A user reply was transcribed (may be empty).
    Transcribed { text: String },
    /// Remaining sentences of a reply were skipped because of an interrupt.
    SpeechCut { skipped: usize },
    /// A topic switch was decided.
    TopicSwitch { reason: SwitchReason },
    /// Session reached its terminal phase.
    Finished { turns: usize },
}
