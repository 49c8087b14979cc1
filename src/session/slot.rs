//! Latest-value buffers for callback-driven sensors.
//!
//! Sensor SDKs push frames and detections from their own threads. The turn
//! loop only ever cares about the newest value, so each channel is a
//! capacity-1 slot: publishing overwrites whatever is pending, and the reader
//! waits with a timeout.

use crate::collaborators::{Detection, FaceSensor};
use crate::error::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

struct SlotInner<T> {
    value: Mutex<Option<T>>,
    notify: Notify,
}

/// Capacity-1, drop-oldest buffer with timed receive.
pub struct SensorSlot<T> {
    inner: Arc<SlotInner<T>>,
}

impl<T> Clone for SensorSlot<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Default for SensorSlot<T> {
    fn default() -> Self {
        Self {
            inner: Arc::new(SlotInner {
                value: Mutex::new(None),
                notify: Notify::new(),
            }),
        }
    }
}

impl<T: Send> SensorSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value`, replacing any unread one. Returns `true` if an unread
    /// value was dropped. Safe to call from any thread.
    pub fn publish(&self, value: T) -> bool {
        let dropped = match self.inner.value.lock() {
            Ok(mut guard) => guard.replace(value).is_some(),
            Err(poisoned) => poisoned.into_inner().replace(value).is_some(),
        };
        self.inner.notify.notify_one();
        dropped
    }

    /// Take the pending value without waiting.
    pub fn try_take(&self) -> Option<T> {
        match self.inner.value.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }

    /// Wait up to `timeout` for a value. `None` means nothing arrived in time.
    pub async fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            // Register interest before checking so a publish between the
            // check and the await is not missed.
            let notified = self.inner.notify.notified();
            if let Some(value) = self.try_take() {
                return Some(value);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.try_take();
            }
        }
    }
}

/// [`FaceSensor`] backed by a [`SensorSlot`] that the detector callback feeds.
#[derive(Clone, Default)]
pub struct SlotFaceSensor {
    slot: SensorSlot<Detection>,
}

impl SlotFaceSensor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callback to register with the face detector.
    pub fn publisher(&self) -> impl Fn(Detection) + Send + Sync + 'static {
        let slot = self.slot.clone();
        move |detection| {
            slot.publish(detection);
        }
    }
}

#[async_trait]
impl FaceSensor for SlotFaceSensor {
    async fn poll(&self, timeout: Duration) -> Result<Option<Detection>> {
        Ok(self.slot.recv_timeout(timeout).await)
    }
}
