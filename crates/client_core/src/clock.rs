//! Audio playback abstraction and the adapter that turns it into clock events.

use std::{
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use shared::error::PlaybackError;
use tokio::{sync::mpsc, task::JoinHandle, time::MissedTickBehavior};
use tracing::debug;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub struct MediaRequest {
    pub url: String,
    /// Used by sources that cannot probe the media themselves.
    pub duration_hint: Option<f64>,
}

/// A single audio output. Implementations are driven by one [`PlaybackClock`]
/// at a time.
#[async_trait]
pub trait AudioSource: Send + Sync {
    /// Opens the media and returns its duration when known.
    async fn open(&self, request: &MediaRequest) -> Result<Option<f64>, PlaybackError>;
    fn play(&self) -> Result<(), PlaybackError>;
    fn pause(&self);
    fn seek(&self, seconds: f64);
    fn position(&self) -> f64;
    fn is_ended(&self) -> bool;
    fn close(&self);
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClockEvent {
    MetadataReady(Option<f64>),
    TimeAdvanced(f64),
    Ended,
}

/// A clock event tagged with the load generation that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockSignal {
    pub generation: u64,
    pub event: ClockEvent,
}

/// Wraps an [`AudioSource`] for one loaded story. While playing, a poll task
/// reports the position every `poll_interval`; at most one poll task exists.
pub struct PlaybackClock {
    audio: Arc<dyn AudioSource>,
    generation: u64,
    poll_interval: Duration,
    signals: mpsc::UnboundedSender<ClockSignal>,
    poll_task: Option<JoinHandle<()>>,
    duration: Option<f64>,
}

impl PlaybackClock {
    pub fn new(
        audio: Arc<dyn AudioSource>,
        generation: u64,
        poll_interval: Duration,
        signals: mpsc::UnboundedSender<ClockSignal>,
    ) -> Self {
        Self {
            audio,
            generation,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            signals,
            poll_task: None,
            duration: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Re-tags a halted clock so it can serve a newer generation.
    pub fn rebind(&mut self, generation: u64) {
        self.stop_polling();
        self.generation = generation;
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn current_time(&self) -> f64 {
        self.audio.position()
    }

    pub fn is_polling(&self) -> bool {
        self.poll_task
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    pub async fn load(&mut self, request: &MediaRequest) -> Result<Option<f64>, PlaybackError> {
        self.stop_polling();
        let duration = self
            .audio
            .open(request)
            .await?
            .filter(|duration| duration.is_finite() && *duration > 0.0);
        self.duration = duration;
        debug!(url = %request.url, ?duration, generation = self.generation, "audio opened");
        self.emit(ClockEvent::MetadataReady(duration));
        Ok(duration)
    }

    pub fn play(&mut self) -> Result<(), PlaybackError> {
        self.audio.play()?;
        self.start_polling();
        Ok(())
    }

    pub fn pause(&mut self) {
        self.audio.pause();
        self.stop_polling();
    }

    /// Seeks within `[0, duration]` and returns the clamped position.
    pub fn seek(&mut self, seconds: f64) -> f64 {
        let mut target = if seconds.is_finite() { seconds.max(0.0) } else { 0.0 };
        if let Some(duration) = self.duration {
            target = target.min(duration);
        }
        self.audio.seek(target);
        target
    }

    /// Stops the poll task and pauses the audio without releasing it.
    pub fn halt(&mut self) {
        self.pause();
    }

    /// Stops polling and releases the audio.
    pub fn teardown(mut self) {
        self.stop_polling();
        self.audio.pause();
        self.audio.close();
        debug!(generation = self.generation, "playback clock torn down");
    }

    fn emit(&self, event: ClockEvent) {
        let _ = self.signals.send(ClockSignal {
            generation: self.generation,
            event,
        });
    }

    fn start_polling(&mut self) {
        self.stop_polling();
        let audio = Arc::clone(&self.audio);
        let signals = self.signals.clone();
        let generation = self.generation;
        let period = self.poll_interval;
        self.poll_task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let event = if audio.is_ended() {
                    ClockEvent::Ended
                } else {
                    ClockEvent::TimeAdvanced(audio.position())
                };
                let ended = event == ClockEvent::Ended;
                if signals.send(ClockSignal { generation, event }).is_err() || ended {
                    break;
                }
            }
        }));
    }

    fn stop_polling(&mut self) {
        if let Some(task) = self.poll_task.take() {
            task.abort();
        }
    }
}

impl Drop for PlaybackClock {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

#[derive(Debug, Default)]
struct SimulatedState {
    url: Option<String>,
    duration: Option<f64>,
    offset: f64,
    started_at: Option<Instant>,
}

/// Wall-clock stand-in for a real audio device: position advances in real time
/// (times `speed`) while playing and stops at the duration hint.
#[derive(Debug)]
pub struct SimulatedAudio {
    speed: f64,
    state: Mutex<SimulatedState>,
}

impl Default for SimulatedAudio {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl SimulatedAudio {
    pub fn new(speed: f64) -> Self {
        let speed = if speed.is_finite() && speed > 0.0 { speed } else { 1.0 };
        Self {
            speed,
            state: Mutex::new(SimulatedState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimulatedState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn position_of(&self, state: &SimulatedState) -> f64 {
        let elapsed = state
            .started_at
            .map(|started| started.elapsed().as_secs_f64() * self.speed)
            .unwrap_or(0.0);
        let position = state.offset + elapsed;
        match state.duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }
}

#[async_trait]
impl AudioSource for SimulatedAudio {
    async fn open(&self, request: &MediaRequest) -> Result<Option<f64>, PlaybackError> {
        if request.url.trim().is_empty() {
            return Err(PlaybackError::Open {
                url: request.url.clone(),
                reason: "empty media url".into(),
            });
        }
        let mut state = self.state();
        *state = SimulatedState {
            url: Some(request.url.clone()),
            duration: request.duration_hint,
            offset: 0.0,
            started_at: None,
        };
        Ok(request.duration_hint)
    }

    fn play(&self) -> Result<(), PlaybackError> {
        let mut state = self.state();
        if state.url.is_none() {
            return Err(PlaybackError::NotLoaded);
        }
        if state.started_at.is_none() {
            let position = self.position_of(&state);
            if state.duration.is_some_and(|duration| position >= duration) {
                state.offset = 0.0;
            }
            state.started_at = Some(Instant::now());
        }
        Ok(())
    }

    fn pause(&self) {
        let mut state = self.state();
        if state.started_at.is_some() {
            state.offset = self.position_of(&state);
            state.started_at = None;
        }
    }

    fn seek(&self, seconds: f64) {
        let mut state = self.state();
        state.offset = seconds.max(0.0);
        if state.started_at.is_some() {
            state.started_at = Some(Instant::now());
        }
    }

    fn position(&self) -> f64 {
        let state = self.state();
        self.position_of(&state)
    }

    fn is_ended(&self) -> bool {
        let state = self.state();
        state
            .duration
            .is_some_and(|duration| self.position_of(&state) >= duration)
    }

    fn close(&self) {
        let mut state = self.state();
        if let Some(url) = state.url.take() {
            debug!(%url, "simulated audio closed");
        }
        *state = SimulatedState::default();
    }
}

#[cfg(test)]
#[path = "tests/clock_tests.rs"]
mod tests;
