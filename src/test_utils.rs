//! Shared test fakes for the collaborator traits.
//!
//! Every fake records what it was asked to do so tests can assert on the
//! conversation afterwards.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use crate::collaborators::{
    BoundingBox, ChatMessage, Detection, EyeColor, FaceSensor, GestureActuator, LanguageModel,
    MediaPlayer, Posture, SpeechInput, SpeechOutput, TopicMedia, TouchHandler, TouchReading,
    TouchSensor,
};
use crate::error::{Result, SessionError};
use crate::topics::Topic;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type Hook = Box<dyn Fn() + Send + Sync>;

/// Reply used by [`FakeLlm`] once its script runs out.
pub const DEFAULT_LLM_REPLY: &str = "Tell me more about yourself.";

/// A minimal topic whose fields are derived from `id`.
pub fn topic(id: &str) -> Topic {
    Topic {
        id: id.to_owned(),
        role_description: format!("Role of {id}"),
        era_description: format!("Amsterdam in the {id}."),
        interactive_questions: vec![format!("What do you know about the {id}?")],
        dialogue_style: vec!["Friendly.".to_owned()],
        images: Vec::new(),
        audio: None,
    }
}

/// Records gestures, eye colours and postures.
#[derive(Default)]
pub struct FakeBody {
    gestures: AtomicUsize,
    active: AtomicUsize,
    eyes: Mutex<Vec<EyeColor>>,
    postures: Mutex<Vec<Posture>>,
}

impl FakeBody {
    pub fn gesture_count(&self) -> usize {
        self.gestures.load(Ordering::SeqCst)
    }

    /// Gestures currently mid-playback.
    pub fn active_gestures(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn eyes(&self) -> Vec<EyeColor> {
        self.eyes.lock().unwrap().clone()
    }

    pub fn postures(&self) -> Vec<Posture> {
        self.postures.lock().unwrap().clone()
    }
}

/// Decrements the active-gesture count even when playback is cancelled.
struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl GestureActuator for FakeBody {
    async fn play(&self, _gesture: &str) -> Result<()> {
        self.gestures.fetch_add(1, Ordering::SeqCst);
        self.active.fetch_add(1, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);
        tokio::time::sleep(Duration::from_millis(2)).await;
        Ok(())
    }

    async fn set_eye_color(&self, color: EyeColor) -> Result<()> {
        self.eyes.lock().unwrap().push(color);
        Ok(())
    }

    async fn set_posture(&self, posture: Posture) -> Result<()> {
        self.postures.lock().unwrap().push(posture);
        Ok(())
    }
}

/// Records spoken sentences; can be slowed down, made to fail, or hooked.
#[derive(Default)]
pub struct FakeSpeechOutput {
    delay: Duration,
    fail: bool,
    spoken: Mutex<Vec<String>>,
    hooks: Mutex<Vec<(String, Hook)>>,
}

impl FakeSpeechOutput {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Every call fails after `delay`.
    pub fn failing_after(delay: Duration) -> Self {
        Self {
            delay,
            fail: true,
            ..Self::default()
        }
    }

    /// Run `hook` right after `sentence` has been spoken.
    pub fn on_sentence(&self, sentence: &str, hook: impl Fn() + Send + Sync + 'static) {
        self.hooks
            .lock()
            .unwrap()
            .push((sentence.to_owned(), Box::new(hook)));
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

#[async_trait]
impl SpeechOutput for FakeSpeechOutput {
    async fn speak(&self, text: &str) -> Result<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(SessionError::SpeechOutput("speaker unplugged".to_owned()));
        }
        self.spoken.lock().unwrap().push(text.to_owned());
        for (sentence, hook) in self.hooks.lock().unwrap().iter() {
            if sentence == text {
                hook();
            }
        }
        Ok(())
    }
}

#[derive(Default)]
enum InputMode {
    #[default]
    Scripted,
    Failing,
    Hanging,
}

/// Returns scripted transcripts, then silence.
#[derive(Default)]
pub struct FakeSpeechInput {
    mode: InputMode,
    script: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
    hooks: Mutex<Vec<(usize, Hook)>>,
}

impl FakeSpeechInput {
    pub fn scripted(replies: &[&str]) -> Self {
        Self {
            script: Mutex::new(replies.iter().map(|r| (*r).to_owned()).collect()),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            mode: InputMode::Failing,
            ..Self::default()
        }
    }

    /// Never returns.
    pub fn hanging() -> Self {
        Self {
            mode: InputMode::Hanging,
            ..Self::default()
        }
    }

    /// Run `hook` during the `call`-th transcription (1-based).
    pub fn on_call(&self, call: usize, hook: impl Fn() + Send + Sync + 'static) {
        self.hooks.lock().unwrap().push((call, Box::new(hook)));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechInput for FakeSpeechInput {
    async fn transcribe(&self, _wait: Duration, _max: Duration) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        for (n, hook) in self.hooks.lock().unwrap().iter() {
            if *n == call {
                hook();
            }
        }
        match self.mode {
            InputMode::Scripted => Ok(self.script.lock().unwrap().pop_front().unwrap_or_default()),
            InputMode::Failing => Err(SessionError::SpeechInput("microphone busy".to_owned())),
            InputMode::Hanging => std::future::pending().await,
        }
    }
}

/// Scripted chat model that records every request.
#[derive(Default)]
pub struct FakeLlm {
    fail: bool,
    script: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl FakeLlm {
    pub fn scripted(replies: &[&str]) -> Self {
        Self {
            script: Mutex::new(replies.iter().map(|r| (*r).to_owned()).collect()),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for FakeLlm {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.requests.lock().unwrap().push(messages.to_vec());
        if self.fail {
            return Err(SessionError::Llm("rate limited".to_owned()));
        }
        Ok(self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| DEFAULT_LLM_REPLY.to_owned()))
    }
}

/// Reports no face for a number of polls, then a face on every poll.
pub struct FakeFaceSensor {
    misses: Option<usize>,
    polls: AtomicUsize,
}

impl FakeFaceSensor {
    pub fn after_misses(misses: usize) -> Self {
        Self {
            misses: Some(misses),
            polls: AtomicUsize::new(0),
        }
    }

    /// Never sees anyone.
    pub fn never() -> Self {
        Self {
            misses: None,
            polls: AtomicUsize::new(0),
        }
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FaceSensor for FakeFaceSensor {
    async fn poll(&self, timeout: Duration) -> Result<Option<Detection>> {
        let poll = self.polls.fetch_add(1, Ordering::SeqCst);
        match self.misses {
            Some(misses) if poll >= misses => Ok(Some(Detection {
                faces: vec![BoundingBox {
                    x: 100.0,
                    y: 80.0,
                    width: 64.0,
                    height: 64.0,
                }],
            })),
            Some(_) => Ok(None),
            None => {
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
        }
    }
}

/// Holds the subscribed handler so tests can fire touch events.
#[derive(Default)]
pub struct FakeTouch {
    handler: Mutex<Option<TouchHandler>>,
}

impl FakeTouch {
    pub fn fire(&self, readings: &[TouchReading]) {
        let handler = self.handler.lock().unwrap().clone();
        if let Some(handler) = handler {
            handler(readings);
        }
    }
}

impl TouchSensor for FakeTouch {
    fn subscribe(&self, handler: TouchHandler) -> Result<()> {
        *self.handler.lock().unwrap() = Some(handler);
        Ok(())
    }
}

/// Records media start and stop calls.
#[derive(Default)]
pub struct FakeMedia {
    started: Mutex<Vec<TopicMedia>>,
    stops: AtomicUsize,
}

impl FakeMedia {
    pub fn started(&self) -> Vec<TopicMedia> {
        self.started.lock().unwrap().clone()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaPlayer for FakeMedia {
    async fn start(&self, media: &TopicMedia) -> Result<()> {
        self.started.lock().unwrap().push(media.clone());
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
