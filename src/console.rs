//! Terminal stand-ins for the robot's sensors and actuators.
//!
//! Lets the storyteller run on a desktop: replies are typed on stdin, speech
//! is printed to stdout and body commands are logged. Any typed line counts
//! as a face in front of the camera; a line starting with `!` is a head
//! touch.

use crate::collaborators::{
    BoundingBox, Detection, EyeColor, GestureActuator, Posture, SpeechInput, SpeechOutput,
    TouchHandler, TouchReading, TouchSensor,
};
use crate::error::{Result, SessionError};
use crate::session::SlotFaceSensor;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Prefix that turns a typed line into a touch event.
pub const TOUCH_PREFIX: char = '!';

/// Components wired to one stdin reader task.
pub struct ConsoleFrontend {
    pub face: Arc<SlotFaceSensor>,
    pub input: Arc<ConsoleInput>,
    pub touch: Arc<ConsoleTouch>,
}

impl ConsoleFrontend {
    /// Spawn the stdin reader and return the collaborators it feeds.
    pub fn spawn() -> Self {
        let face = Arc::new(SlotFaceSensor::new());
        let touch = Arc::new(ConsoleTouch::default());
        let (tx, rx) = mpsc::unbounded_channel();

        let publish_face = face.publisher();
        let reader_touch = Arc::clone(&touch);
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        publish_face(console_face());
                        route_line(line, &reader_touch, &tx);
                    }
                    Ok(None) => {
                        debug!("stdin closed");
                        return;
                    }
                    Err(e) => {
                        warn!("stdin read failed: {e}");
                        return;
                    }
                }
            }
        });

        Self {
            face,
            input: Arc::new(ConsoleInput::new(rx)),
            touch,
        }
    }
}

fn route_line(line: String, touch: &ConsoleTouch, tx: &mpsc::UnboundedSender<String>) {
    if line.trim_start().starts_with(TOUCH_PREFIX) {
        touch.fire(true);
    } else if tx.send(line).is_err() {
        debug!("console input dropped, no listener");
    }
}

fn console_face() -> Detection {
    Detection {
        faces: vec![BoundingBox {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        }],
    }
}

/// Typed replies as speech input.
pub struct ConsoleInput {
    lines: tokio::sync::Mutex<mpsc::UnboundedReceiver<String>>,
}

impl ConsoleInput {
    pub fn new(lines: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            lines: tokio::sync::Mutex::new(lines),
        }
    }
}

#[async_trait]
impl SpeechInput for ConsoleInput {
    async fn transcribe(&self, wait_timeout: Duration, _max_duration: Duration) -> Result<String> {
        let mut lines = self.lines.lock().await;
        // Only lines typed while listening count.
        while lines.try_recv().is_ok() {}
        println!("(your turn)");
        match tokio::time::timeout(wait_timeout, lines.recv()).await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(SessionError::SpeechInput("stdin closed".to_owned())),
            Err(_) => Ok(String::new()),
        }
    }
}

/// Prints utterances, optionally paced like real speech.
#[derive(Debug, Default)]
pub struct ConsoleSpeech {
    per_word: Duration,
}

impl ConsoleSpeech {
    /// Wait `per_word` for each word after printing.
    pub fn with_pace(per_word: Duration) -> Self {
        Self { per_word }
    }
}

#[async_trait]
impl SpeechOutput for ConsoleSpeech {
    async fn speak(&self, text: &str) -> Result<()> {
        println!("robot> {text}");
        let words = u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX);
        if !self.per_word.is_zero() {
            tokio::time::sleep(self.per_word.saturating_mul(words)).await;
        }
        Ok(())
    }
}

/// Logs body commands instead of moving anything.
#[derive(Debug)]
pub struct LoggingBody {
    gesture_time: Duration,
}

impl LoggingBody {
    pub fn new(gesture_time: Duration) -> Self {
        Self { gesture_time }
    }
}

impl Default for LoggingBody {
    fn default() -> Self {
        Self::new(Duration::from_millis(800))
    }
}

#[async_trait]
impl GestureActuator for LoggingBody {
    async fn play(&self, gesture: &str) -> Result<()> {
        debug!("gesture: {gesture}");
        tokio::time::sleep(self.gesture_time).await;
        Ok(())
    }

    async fn set_eye_color(&self, color: EyeColor) -> Result<()> {
        debug!("eyes: {color:?}");
        Ok(())
    }

    async fn set_posture(&self, posture: Posture) -> Result<()> {
        info!("posture: {posture:?}");
        Ok(())
    }
}

/// Touch sensor driven by `!` lines.
#[derive(Default)]
pub struct ConsoleTouch {
    handlers: Mutex<Vec<TouchHandler>>,
}

impl ConsoleTouch {
    /// Deliver a head-touch event to every subscriber.
    pub fn fire(&self, active: bool) {
        let handlers = match self.handlers.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let readings = [TouchReading {
            channel: "Head/Touch/Middle".to_owned(),
            active,
        }];
        for handler in handlers {
            handler(&readings);
        }
    }
}

impl TouchSensor for ConsoleTouch {
    fn subscribe(&self, handler: TouchHandler) -> Result<()> {
        match self.handlers.lock() {
            Ok(mut guard) => guard.push(handler),
            Err(poisoned) => poisoned.into_inner().push(handler),
        }
        Ok(())
    }
}
