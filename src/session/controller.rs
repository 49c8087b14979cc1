//! Turn-taking controller: greets, tells stories, listens and switches topic.
//!
//! One sequential task drives the [`Phase`] machine. Collaborator calls never
//! overlap; the only concurrency is the filler-gesture task inside each
//! utterance and the touch callback raising the [`InterruptFlag`] from the
//! sensor's own thread. Interrupts are cooperative: they are observed between
//! sentences, never in the middle of one.

use crate::collaborators::{
    EyeColor, FaceSensor, GestureActuator, LanguageModel, MediaPlayer, Posture, SpeechInput,
    SpeechOutput, TopicMedia, TouchHandler, TouchReading, TouchSensor, any_touch_active,
};
use crate::config::SessionConfig;
use crate::runtime::{SessionEvent, SwitchReason};
use crate::session::filler::speak_with_filler;
use crate::session::history::ConversationLog;
use crate::session::interrupt::InterruptFlag;
use crate::session::replies::RecentReplies;
use crate::session::sentences::split_sentences;
use crate::session::state::{Phase, TurnState};
use crate::topics::{Topic, TopicSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Slack added on top of the speech-input timeouts before giving up on it.
const LISTEN_GRACE: Duration = Duration::from_secs(1);

/// External services the controller drives.
#[derive(Clone)]
pub struct Collaborators {
    pub face: Arc<dyn FaceSensor>,
    pub speech_in: Arc<dyn SpeechInput>,
    pub speech_out: Arc<dyn SpeechOutput>,
    pub body: Arc<dyn GestureActuator>,
    pub llm: Arc<dyn LanguageModel>,
    pub touch: Option<Arc<dyn TouchSensor>>,
    pub media: Option<Arc<dyn MediaPlayer>>,
}

/// Outcome of the Evaluate phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Respond,
    Switch(SwitchReason),
}

/// What actually came out of the speaker.
#[derive(Debug, Default)]
struct SpeechReport {
    /// Sentences the speech output accepted, in order.
    spoken: Vec<String>,
    /// Sentences dropped because of an interrupt.
    skipped: usize,
}

/// Which topic to introduce.
enum TopicChoice<'a> {
    Opening(Option<&'a str>),
    Next,
}

/// What a finished session did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub session_id: String,
    /// Listening turns taken.
    pub turns: usize,
    /// Topic ids introduced, in order.
    pub topics: Vec<String>,
    /// Number of topic switches.
    pub switches: usize,
}

/// Drives one conversational session from face detection to goodbye.
pub struct TurnController {
    config: SessionConfig,
    io: Collaborators,
    topics: TopicSource,
    interrupt: InterruptFlag,
    replies: RecentReplies,
    log: ConversationLog,
    phase: Phase,
    state: TurnState,
    turns_taken: usize,
    last_transcript: String,
    visited: Vec<String>,
    switches: usize,
    session_id: String,
    cancel: CancellationToken,
    runtime_tx: Option<broadcast::Sender<SessionEvent>>,
}

impl TurnController {
    pub fn new(config: SessionConfig, io: Collaborators, topics: TopicSource) -> Self {
        let replies = RecentReplies::new(config.turns.short_reply_window);
        let log = ConversationLog::new(&config.llm.system_prompt, config.llm.max_history_messages);
        Self {
            config,
            io,
            topics,
            interrupt: InterruptFlag::new(),
            replies,
            log,
            phase: Phase::AwaitingFace,
            state: TurnState::default(),
            turns_taken: 0,
            last_transcript: String::new(),
            visited: Vec::new(),
            switches: 0,
            session_id: uuid::Uuid::new_v4().to_string(),
            cancel: CancellationToken::new(),
            runtime_tx: None,
        }
    }

    /// Attach a runtime event broadcaster for UI/observability.
    pub fn with_runtime_events(mut self, tx: broadcast::Sender<SessionEvent>) -> Self {
        self.runtime_tx = Some(tx);
        self
    }

    /// Token that ends the session at the next phase boundary (or while
    /// waiting for a face or a reply).
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Handle for raising interrupts from other tasks or threads.
    pub fn interrupt_handle(&self) -> InterruptFlag {
        self.interrupt.clone()
    }

    /// Request a topic switch at the next sentence boundary.
    pub fn signal_interrupt(&self) {
        self.interrupt.signal();
    }

    /// Clear a pending interrupt, returning whether one was pending.
    pub fn consume_interrupt(&self) -> bool {
        self.interrupt.consume()
    }

    pub fn interrupt_pending(&self) -> bool {
        self.interrupt.is_set()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn turn_state(&self) -> TurnState {
        self.state
    }

    pub fn turns_taken(&self) -> usize {
        self.turns_taken
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn topics(&self) -> &TopicSource {
        &self.topics
    }

    pub fn log(&self) -> &ConversationLog {
        &self.log
    }

    pub fn replies(&self) -> &RecentReplies {
        &self.replies
    }

    /// Touch callback: any active reading raises the interrupt flag.
    pub fn touch_handler(&self) -> TouchHandler {
        let flag = self.interrupt.clone();
        Arc::new(move |readings: &[TouchReading]| {
            if any_touch_active(readings) {
                info!("touch detected, requesting topic switch");
                flag.signal();
            }
        })
    }

    /// Decide what follows a user reply.
    pub fn evaluate(&self) -> Decision {
        let turns = &self.config.turns;
        if self.interrupt.is_set() {
            return Decision::Switch(SwitchReason::Interrupt);
        }
        if self.replies.all_short(turns.short_reply_words) {
            return Decision::Switch(SwitchReason::ShortReplies);
        }
        if turns.keyword_switch
            && self
                .replies
                .latest()
                .is_some_and(|reply| is_switch_request(reply, &turns.switch_keywords))
        {
            return Decision::Switch(SwitchReason::SpokenRequest);
        }
        Decision::Respond
    }

    /// Run the session to completion.
    pub async fn run(&mut self) -> SessionSummary {
        self.emit(SessionEvent::Started {
            session_id: self.session_id.clone(),
        });
        info!(session_id = %self.session_id, "session starting");

        if let Some(touch) = &self.io.touch
            && let Err(e) = touch.subscribe(self.touch_handler())
        {
            warn!("touch sensor unavailable, interrupts limited to disengagement: {e}");
        }
        self.set_posture(Posture::Stand).await;

        let mut phase = self.phase;
        while !phase.is_terminal() {
            let next = if self.cancel.is_cancelled() {
                info!("session cancelled");
                Phase::Done
            } else {
                self.step(phase).await
            };
            self.transition(phase, next);
            phase = next;
        }

        self.finish().await
    }

    fn transition(&mut self, from: Phase, to: Phase) {
        debug!("phase {from} -> {to}");
        self.phase = to;
        if from != to {
            self.emit(SessionEvent::PhaseChanged { from, to });
        }
    }

    async fn step(&mut self, phase: Phase) -> Phase {
        match phase {
            Phase::AwaitingFace => self.await_face().await,
            Phase::Greeting => {
                let welcome = self.config.turns.welcome_message.clone();
                self.speak_units(&[welcome]).await;
                Phase::TopicIntro
            }
            Phase::TopicIntro => {
                let opening = self.config.topics.opening_era.clone();
                self.introduce_topic(TopicChoice::Opening(opening.as_deref()))
                    .await;
                self.listen_or_finish()
            }
            Phase::Listening => self.listen().await,
            Phase::Evaluate => match self.evaluate() {
                Decision::Respond => Phase::Respond,
                Decision::Switch(reason) => {
                    info!("switching topic: {reason:?}");
                    self.emit(SessionEvent::TopicSwitch { reason });
                    Phase::SwitchTopic
                }
            },
            Phase::Respond => self.respond().await,
            Phase::SwitchTopic => {
                self.switch_topic().await;
                self.listen_or_finish()
            }
            Phase::Done => Phase::Done,
        }
    }

    fn listen_or_finish(&self) -> Phase {
        if self.turns_taken >= self.config.turns.max_turns {
            info!("turn budget of {} reached", self.config.turns.max_turns);
            Phase::Done
        } else {
            Phase::Listening
        }
    }

    async fn await_face(&mut self) -> Phase {
        self.set_state(TurnState::AwaitingUser);
        info!("waiting for a face to start the conversation");
        let timeout = self.config.turns.face_poll_timeout();
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return Phase::Done,
                res = self.io.face.poll(timeout) => match res {
                    Ok(Some(detection)) if detection.has_face() => {
                        info!("face detected, starting conversation");
                        return Phase::Greeting;
                    }
                    Ok(_) => debug!("no face detected yet, still waiting"),
                    Err(e) => warn!("face sensor error: {e}"),
                },
            }
        }
    }

    async fn listen(&mut self) -> Phase {
        self.turns_taken += 1;
        self.set_state(TurnState::Listening);
        self.set_eyes(EyeColor::Green).await;
        info!(
            "turn {}/{}: listening",
            self.turns_taken, self.config.turns.max_turns
        );

        let wait = self.config.listen.wait_timeout();
        let max = self.config.listen.max_utterance();
        let guard = wait + max + LISTEN_GRACE;
        let transcript = tokio::select! {
            () = self.cancel.cancelled() => return Phase::Done,
            res = tokio::time::timeout(guard, self.io.speech_in.transcribe(wait, max)) => match res {
                Ok(Ok(text)) => text.trim().to_owned(),
                Ok(Err(e)) => {
                    warn!("speech input failed, treating as silence: {e}");
                    String::new()
                }
                Err(_) => {
                    warn!("speech input did not return within {guard:?}, treating as silence");
                    String::new()
                }
            },
        };

        info!("user said: {transcript:?}");
        self.emit(SessionEvent::Transcribed {
            text: transcript.clone(),
        });
        if !transcript.is_empty() {
            self.log.push_user(transcript.clone());
        }
        self.replies.push(transcript.clone());
        self.last_transcript = transcript;
        Phase::Evaluate
    }

    async fn respond(&mut self) -> Phase {
        if self.last_transcript.is_empty() {
            debug!("empty reply, nothing to respond to");
            return self.after_speech();
        }

        let reply = self.ask_model().await;
        self.speak_reply(&reply).await;
        self.after_speech()
    }

    /// After speaking a reply: switch straight away if an interrupt arrived,
    /// otherwise hand the floor back to the user.
    fn after_speech(&mut self) -> Phase {
        if self.interrupt.is_set() {
            self.emit(SessionEvent::TopicSwitch {
                reason: SwitchReason::Interrupt,
            });
            Phase::SwitchTopic
        } else {
            self.listen_or_finish()
        }
    }

    async fn switch_topic(&mut self) {
        self.set_state(TurnState::Interrupted);
        self.interrupt.consume();
        self.replies.clear();
        self.switches += 1;
        self.stop_media().await;

        let ack = self.config.turns.switch_acknowledgment.clone();
        self.speak_units(&[ack]).await;
        // A touch that lands while the acknowledgment plays belongs to the
        // same request.
        self.interrupt.consume();

        self.introduce_topic(TopicChoice::Next).await;
    }

    async fn introduce_topic(&mut self, choice: TopicChoice<'_>) {
        let switching = matches!(choice, TopicChoice::Next);
        let topic = self.select_topic(choice);
        match &topic {
            Some(topic) => {
                info!("introducing era {}", topic.id);
                self.visited.push(topic.id.clone());
                self.emit(SessionEvent::TopicSelected {
                    id: topic.id.clone(),
                });
                self.start_media(topic).await;
            }
            None if switching => {
                let msg = self.config.turns.no_topic_message.clone();
                self.speak_units(&[msg]).await;
                return;
            }
            None => warn!("no topics available, using generic historian prompt"),
        }

        self.log
            .set_topic_prompt(TopicSource::format_prompt(topic.as_ref()));
        let reply = self.ask_model().await;
        self.speak_reply(&reply).await;
    }

    /// Speak a model reply and remember only what was actually said.
    async fn speak_reply(&mut self, reply: &str) {
        let report = self.speak_units(&split_sentences(reply)).await;
        if report.skipped > 0 {
            debug!("{} sentence(s) of the reply left unsaid", report.skipped);
        }
        if !report.spoken.is_empty() {
            self.log.push_assistant(report.spoken.join(" "));
        }
    }

    fn select_topic(&mut self, choice: TopicChoice<'_>) -> Option<Topic> {
        if let TopicChoice::Opening(Some(id)) = choice {
            match self.topics.topic_for_id(id) {
                Ok(topic) => return Some(topic.clone()),
                Err(e) => warn!("opening era unavailable ({e}), picking at random"),
            }
        }
        self.topics.next_topic().cloned()
    }

    /// Query the language model; failures degrade to an empty reply.
    async fn ask_model(&mut self) -> String {
        let messages = self.log.messages();
        match self.io.llm.complete(&messages).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("language model failed, saying nothing: {e}");
                String::new()
            }
        }
    }

    /// Speak sentences in order, stopping at the first sentence boundary
    /// after an interrupt is raised.
    async fn speak_units(&mut self, sentences: &[String]) -> SpeechReport {
        let mut report = SpeechReport::default();
        if sentences.is_empty() {
            return report;
        }
        self.set_state(TurnState::Speaking);
        self.set_eyes(EyeColor::Blue).await;

        for (i, sentence) in sentences.iter().enumerate() {
            match speak_with_filler(
                self.io.speech_out.as_ref(),
                &self.io.body,
                &self.config.filler,
                sentence,
            )
            .await
            {
                Ok(()) => {
                    info!("robot says: {sentence}");
                    report.spoken.push(sentence.clone());
                    self.emit(SessionEvent::Spoken {
                        text: sentence.clone(),
                    });
                }
                Err(e) => warn!("speech output failed: {e}"),
            }

            let skipped = sentences.len() - i - 1;
            if skipped > 0 && self.interrupt.is_set() {
                info!("interrupt observed, skipping {skipped} sentence(s)");
                self.emit(SessionEvent::SpeechCut { skipped });
                report.skipped = skipped;
                break;
            }
        }

        self.set_state(TurnState::AwaitingUser);
        report
    }

    async fn finish(&mut self) -> SessionSummary {
        self.stop_media().await;
        self.set_eyes(EyeColor::Off).await;
        self.set_posture(Posture::Sit).await;
        self.set_state(TurnState::AwaitingUser);
        info!(
            "conversation done after {} turn(s), {} switch(es)",
            self.turns_taken, self.switches
        );
        self.emit(SessionEvent::Finished {
            turns: self.turns_taken,
        });
        SessionSummary {
            session_id: self.session_id.clone(),
            turns: self.turns_taken,
            topics: self.visited.clone(),
            switches: self.switches,
        }
    }

    async fn start_media(&self, topic: &Topic) {
        if !self.config.media.enabled {
            return;
        }
        let Some(player) = &self.io.media else {
            return;
        };
        let media = TopicMedia::from(topic);
        if media.is_empty() {
            return;
        }
        if let Err(e) = player.start(&media).await {
            warn!("media playback for {} failed: {e}", topic.id);
        }
    }

    async fn stop_media(&self) {
        if let Some(player) = &self.io.media
            && let Err(e) = player.stop().await
        {
            warn!("stopping media failed: {e}");
        }
    }

    async fn set_eyes(&self, color: EyeColor) {
        if let Err(e) = self.io.body.set_eye_color(color).await {
            debug!("eye LED command failed: {e}");
        }
    }

    async fn set_posture(&self, posture: Posture) {
        if let Err(e) = self.io.body.set_posture(posture).await {
            warn!("posture {posture:?} failed: {e}");
        }
    }

    fn set_state(&mut self, state: TurnState) {
        if self.state != state {
            self.state = state;
            self.emit(SessionEvent::TurnStateChanged(state));
        }
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.runtime_tx {
            let _ = tx.send(event);
        }
    }
}

/// Whether a reply asks to change the subject.
///
/// Keywords match whole words, so `"stop"` does not fire on "nonstop".
/// Multi-word keywords must appear as a contiguous run of words.
fn is_switch_request(reply: &str, keywords: &[String]) -> bool {
    let words = lowercase_words(reply);
    keywords.iter().map(|k| lowercase_words(k)).any(|keyword| {
        !keyword.is_empty()
            && words
                .windows(keyword.len())
                .any(|run| run == keyword.as_slice())
    })
}

fn lowercase_words(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}
