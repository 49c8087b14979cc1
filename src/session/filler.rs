//! Filler gestures played while the robot is speaking.

use crate::collaborators::{GestureActuator, SpeechOutput};
use crate::config::FillerConfig;
use crate::error::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Speak `text` while a background task plays random filler gestures.
///
/// The gesture task is cancelled and joined before this returns, whether the
/// speech call succeeds or fails. If the returned future is dropped early the
/// task is cancelled as well, so it never outlives the utterance.
///
/// # Errors
///
/// Returns the speech output's error after the gesture task has stopped.
pub async fn speak_with_filler(
    speech: &dyn SpeechOutput,
    gestures: &Arc<dyn GestureActuator>,
    config: &FillerConfig,
    text: &str,
) -> Result<()> {
    if !config.enabled || config.gestures.is_empty() {
        return speech.speak(text).await;
    }

    let stop = CancellationToken::new();
    // Stops the gesture task even if this future is dropped mid-speech.
    let _stop_on_drop = stop.clone().drop_guard();
    let handle = tokio::spawn(run_filler_loop(
        Arc::clone(gestures),
        config.clone(),
        stop.clone(),
    ));

    let result = speech.speak(text).await;

    stop.cancel();
    if let Err(e) = handle.await {
        warn!("filler gesture task failed: {e}");
    }
    result
}

async fn run_filler_loop(
    gestures: Arc<dyn GestureActuator>,
    config: FillerConfig,
    stop: CancellationToken,
) {
    let mut rng = StdRng::from_entropy();
    let (lo, hi) = interval_bounds(&config);

    while !stop.is_cancelled() {
        let Some(gesture) = config.gestures.choose(&mut rng) else {
            return;
        };
        tokio::select! {
            () = stop.cancelled() => return,
            res = gestures.play(gesture) => {
                if let Err(e) = res {
                    debug!("filler gesture {gesture} failed: {e}");
                }
            }
        }

        let pause = Duration::from_millis(rng.gen_range(lo..=hi));
        tokio::select! {
            () = stop.cancelled() => return,
            () = tokio::time::sleep(pause) => {}
        }
    }
}

fn interval_bounds(config: &FillerConfig) -> (u64, u64) {
    let lo = config.min_interval_ms.min(config.max_interval_ms);
    let hi = config.min_interval_ms.max(config.max_interval_ms);
    (lo, hi)
}
