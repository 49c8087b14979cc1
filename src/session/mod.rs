//! Turn-taking session: state machine, interrupt handling and speech helpers.

pub mod controller;
pub mod filler;
pub mod history;
pub mod interrupt;
pub mod replies;
pub mod sentences;
pub mod slot;
pub mod state;

pub use controller::{Collaborators, Decision, SessionSummary, TurnController};
pub use filler::speak_with_filler;
pub use interrupt::InterruptFlag;
pub use slot::{SensorSlot, SlotFaceSensor};
pub use state::{Phase, TurnState};
