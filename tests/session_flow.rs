//! End-to-end session tests through the public API.
//!
//! The language model is a real `ApiLanguageModel` against a mock server;
//! the robot's sensors and actuators are small local fakes.

use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use timewalk::collaborators::{
    BoundingBox, Detection, EyeColor, GestureActuator, Posture, SpeechInput, SpeechOutput,
    TouchHandler, TouchReading, TouchSensor,
};
use timewalk::session::SlotFaceSensor;
use timewalk::topics::parse_topics;
use timewalk::{
    ApiLanguageModel, Collaborators, SessionConfig, SessionEvent, SwitchReason, TopicSource,
    TurnController,
};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct Transcript {
    spoken: Mutex<Vec<String>>,
}

#[async_trait]
impl SpeechOutput for Transcript {
    async fn speak(&self, text: &str) -> timewalk::Result<()> {
        self.spoken.lock().unwrap().push(text.to_owned());
        Ok(())
    }
}

struct Visitor {
    replies: Mutex<VecDeque<String>>,
    /// Touches the robot's head while it is listening.
    fidgets: Option<Arc<HeadSensor>>,
}

impl Visitor {
    fn saying(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| (*r).to_owned()).collect()),
            fidgets: None,
        }
    }

    fn touching(mut self, head: Arc<HeadSensor>) -> Self {
        self.fidgets = Some(head);
        self
    }
}

#[async_trait]
impl SpeechInput for Visitor {
    async fn transcribe(&self, _wait: Duration, _max: Duration) -> timewalk::Result<String> {
        if let Some(head) = &self.fidgets {
            head.touch();
        }
        Ok(self.replies.lock().unwrap().pop_front().unwrap_or_default())
    }
}

struct StillBody;

#[async_trait]
impl GestureActuator for StillBody {
    async fn play(&self, _gesture: &str) -> timewalk::Result<()> {
        Ok(())
    }

    async fn set_eye_color(&self, _color: EyeColor) -> timewalk::Result<()> {
        Ok(())
    }

    async fn set_posture(&self, _posture: Posture) -> timewalk::Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct HeadSensor {
    handler: Mutex<Option<TouchHandler>>,
}

impl HeadSensor {
    fn touch(&self) {
        let handler = self.handler.lock().unwrap().clone();
        if let Some(handler) = handler {
            handler(&[TouchReading {
                channel: "Head/Touch/Front".to_owned(),
                active: true,
            }]);
        }
    }
}

impl TouchSensor for HeadSensor {
    fn subscribe(&self, handler: TouchHandler) -> timewalk::Result<()> {
        *self.handler.lock().unwrap() = Some(handler);
        Ok(())
    }
}

fn face_in_view() -> Arc<SlotFaceSensor> {
    let sensor = Arc::new(SlotFaceSensor::new());
    let publish = sensor.publisher();
    publish(Detection {
        faces: vec![BoundingBox {
            x: 120.0,
            y: 90.0,
            width: 80.0,
            height: 80.0,
        }],
    });
    sensor
}

fn dataset_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("data")
        .join("amsterdam_eras.json")
}

fn quiet_config(max_turns: usize) -> SessionConfig {
    let mut config = SessionConfig::default();
    config.turns.max_turns = max_turns;
    config.filler.enabled = false;
    config.listen.wait_timeout_secs = 1;
    config.listen.max_utterance_secs = 1;
    config.topics.dataset_path = dataset_path();
    config
}

async fn mock_llm(reply: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{"index": 0, "message": {"role": "assistant", "content": reply}}]
        })))
        .mount(&server)
        .await;
    server
}

fn collaborators(
    llm: ApiLanguageModel,
    visitor: Visitor,
    speech: Arc<Transcript>,
    touch: Arc<HeadSensor>,
) -> Collaborators {
    Collaborators {
        face: face_in_view(),
        speech_in: Arc::new(visitor),
        speech_out: speech,
        body: Arc::new(StillBody),
        llm: Arc::new(llm),
        touch: Some(touch),
        media: None,
    }
}

#[test]
fn bundled_dataset_has_five_eras() {
    let json = std::fs::read_to_string(dataset_path()).expect("dataset readable");
    let topics = parse_topics(&json).expect("dataset parses");
    assert_eq!(
        topics.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["1500s", "1600s", "1700s", "1800s", "1900s"]
    );
    assert!(topics.values().all(|t| !t.interactive_questions.is_empty()));
}

#[tokio::test]
async fn session_opens_in_1500s_and_respects_budget() {
    let server = mock_llm("Welcome, traveller. Shall we walk to the harbour?").await;
    let llm = ApiLanguageModel::new(&SessionConfig::default().llm, "test-key")
        .unwrap()
        .with_base_url(server.uri());
    let speech = Arc::new(Transcript::default());
    let visitor = Visitor::saying(&[
        "I would love to see the fishing boats today",
        "What did people eat for breakfast back then",
    ]);

    let config = quiet_config(2);
    let topics = TopicSource::load(&config.topics.dataset_path);
    let io = collaborators(llm, visitor, speech.clone(), Arc::new(HeadSensor::default()));
    let (tx, mut rx) = tokio::sync::broadcast::channel(128);
    let mut controller = TurnController::new(config, io, topics).with_runtime_events(tx);

    let summary = controller.run().await;

    assert_eq!(summary.turns, 2);
    assert_eq!(summary.topics, vec!["1500s"]);
    assert_eq!(summary.switches, 0);

    let spoken = speech.spoken.lock().unwrap().clone();
    assert!(spoken[0].starts_with("Hello"));
    assert!(spoken.contains(&"Shall we walk to the harbour?".to_owned()));

    let mut started = false;
    while let Ok(event) = rx.try_recv() {
        if matches!(event, SessionEvent::Started { .. }) {
            started = true;
        }
    }
    assert!(started);
}

#[tokio::test]
async fn head_touch_switches_era() {
    let server = mock_llm("A new century awaits.").await;
    let llm = ApiLanguageModel::new(&SessionConfig::default().llm, "test-key")
        .unwrap()
        .with_base_url(server.uri());
    let speech = Arc::new(Transcript::default());
    let touch = Arc::new(HeadSensor::default());

    let config = quiet_config(1);
    let ack = config.turns.switch_acknowledgment.clone();
    let topics = TopicSource::load(&config.topics.dataset_path);
    let io = collaborators(
        llm,
        Visitor::saying(&["Tell me everything about the herring trade please"])
            .touching(touch.clone()),
        speech.clone(),
        touch,
    );
    let (tx, mut rx) = tokio::sync::broadcast::channel(128);
    let mut controller = TurnController::new(config, io, topics).with_runtime_events(tx);

    let summary = controller.run().await;

    assert_eq!(summary.switches, 1);
    assert_eq!(summary.topics.len(), 2);
    assert_eq!(summary.topics[0], "1500s");
    assert_ne!(summary.topics[1], "1500s");
    assert!(speech.spoken.lock().unwrap().contains(&ack));
    assert!(!controller.interrupt_pending());

    let mut reasons = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let SessionEvent::TopicSwitch { reason } = event {
            reasons.push(reason);
        }
    }
    assert_eq!(reasons, vec![SwitchReason::Interrupt]);
}

#[tokio::test]
async fn missing_dataset_still_runs_a_session() {
    let server = mock_llm("I am a historian of this fine city.").await;
    let llm = ApiLanguageModel::new(&SessionConfig::default().llm, "test-key")
        .unwrap()
        .with_base_url(server.uri());
    let speech = Arc::new(Transcript::default());

    let dir = tempfile::tempdir().unwrap();
    let mut config = quiet_config(1);
    config.topics.dataset_path = dir.path().join("missing.json");
    let topics = TopicSource::load(&config.topics.dataset_path);
    assert!(topics.is_empty());

    let io = collaborators(
        llm,
        Visitor::saying(&["Which buildings are the oldest in town"]),
        speech.clone(),
        Arc::new(HeadSensor::default()),
    );
    let mut controller = TurnController::new(config, io, topics);

    let summary = controller.run().await;

    assert_eq!(summary.turns, 1);
    assert!(summary.topics.is_empty());
    let requests = server.received_requests().await.unwrap();
    let first: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(
        first["messages"][1]["content"]
            .as_str()
            .unwrap()
            .starts_with("You are a historian in Amsterdam.")
    );
}

#[tokio::test]
async fn config_file_round_trips_through_tempdir() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("config.toml");
    let mut config = SessionConfig::default();
    config.turns.max_turns = 4;
    config.turns.keyword_switch = true;
    config.topics.opening_era = Some("1700s".to_owned());
    config.save_to_file(&path).unwrap();

    let loaded = SessionConfig::from_file(&path).unwrap();
    assert_eq!(loaded.turns.max_turns, 4);
    assert!(loaded.turns.keyword_switch);
    assert_eq!(loaded.topics.opening_era.as_deref(), Some("1700s"));
}
