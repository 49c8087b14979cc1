//! Cross-thread topic-switch request flag.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared interrupt request.
///
/// Written by sensor callbacks on foreign threads, read by the turn loop at
/// sentence boundaries. `consume` is an atomic swap so a touch landing
/// between "check" and "clear" is never lost.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    inner: Arc<AtomicBool>,
}

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a topic switch.
    pub fn signal(&self) {
        self.inner.store(true, Ordering::Release);
    }

    /// Whether a switch is pending, without clearing it.
    pub fn is_set(&self) -> bool {
        self.inner.load(Ordering::Acquire)
    }

    /// Clear the flag, returning whether it was set.
    pub fn consume(&self) -> bool {
        self.inner.swap(false, Ordering::AcqRel)
    }
}
