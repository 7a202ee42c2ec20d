use std::{collections::BTreeSet, sync::Arc, time::Duration};

use shared::{
    domain::{StoryDescriptor, StoryId},
    error::{PlaybackError, StoryError},
};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::{
    clock::{AudioSource, ClockEvent, ClockSignal, MediaRequest, PlaybackClock, DEFAULT_POLL_INTERVAL},
    segments::SegmentStore,
    source::StorySource,
    sync::{ended_outcome, EndedPolicy, SyncEngine},
    view::PresentationView,
};

#[derive(Debug, Clone)]
pub struct SlideshowConfig {
    pub poll_interval: Duration,
    pub on_ended: EndedPolicy,
    /// Start playing as soon as a story is ready.
    pub autoplay: bool,
}

impl Default for SlideshowConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            on_ended: EndedPolicy::default(),
            autoplay: false,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SlideshowError {
    #[error("no story at catalog position {0}")]
    NoSuchStory(usize),
    #[error("story `{0}` is not in the catalog")]
    UnknownStory(StoryId),
}

/// A story whose segments are loaded and on screen.
#[derive(Debug, Clone)]
pub struct LoadedStory {
    pub descriptor: StoryDescriptor,
    pub segments: SegmentStore,
    pub engine: SyncEngine,
    pub position: f64,
    pub duration: Option<f64>,
    pub failed_images: BTreeSet<usize>,
}

impl LoadedStory {
    fn new(descriptor: StoryDescriptor, segments: SegmentStore) -> Self {
        let engine = SyncEngine::starting(segments.segments());
        Self {
            descriptor,
            segments,
            engine,
            position: 0.0,
            duration: None,
            failed_images: BTreeSet::new(),
        }
    }

    pub fn active_index(&self) -> Option<usize> {
        self.engine.active()
    }
}

#[derive(Debug, Clone)]
pub enum SlideshowState {
    Idle,
    CatalogLoading,
    CatalogError {
        message: String,
    },
    StoryLoading {
        story: StoryDescriptor,
        /// Previous story, kept on screen until the new one is ready.
        shown: Option<Box<LoadedStory>>,
    },
    Ready {
        story: Box<LoadedStory>,
        playing: bool,
        notice: Option<String>,
    },
    StoryError {
        story: StoryDescriptor,
        message: String,
    },
    /// Segments are loaded but the audio is unusable; slides stay navigable.
    PlaybackError {
        story: Box<LoadedStory>,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    CatalogLoading,
    CatalogError,
    StoryLoading,
    Ready,
    StoryError,
    PlaybackError,
}

impl SlideshowState {
    pub fn phase(&self) -> Phase {
        match self {
            Self::Idle => Phase::Idle,
            Self::CatalogLoading => Phase::CatalogLoading,
            Self::CatalogError { .. } => Phase::CatalogError,
            Self::StoryLoading { .. } => Phase::StoryLoading,
            Self::Ready { .. } => Phase::Ready,
            Self::StoryError { .. } => Phase::StoryError,
            Self::PlaybackError { .. } => Phase::PlaybackError,
        }
    }

    /// The story currently on screen, if any.
    pub fn shown(&self) -> Option<&LoadedStory> {
        match self {
            Self::Ready { story, .. } | Self::PlaybackError { story, .. } => Some(story),
            Self::StoryLoading { shown, .. } => shown.as_deref(),
            _ => None,
        }
    }

    fn shown_mut(&mut self) -> Option<&mut LoadedStory> {
        match self {
            Self::Ready { story, .. } | Self::PlaybackError { story, .. } => Some(story),
            Self::StoryLoading { shown, .. } => shown.as_deref_mut(),
            _ => None,
        }
    }
}

/// Results of background work, fed back into the slideshow.
#[derive(Debug)]
pub enum SlideshowEvent {
    CatalogFetched(Result<Vec<StoryDescriptor>, StoryError>),
    StoryFetched {
        generation: u64,
        story: StoryDescriptor,
        result: Result<SegmentStore, StoryError>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlideshowUpdate {
    PhaseChanged(Phase),
    SlideChanged { story_id: StoryId, index: usize },
    Progress { story_id: StoryId, position: f64 },
    Notice(String),
}

/// Single-threaded owner of all slideshow state. Background fetches and clock
/// ticks arrive as events and are applied by [`Slideshow::step`]; anything
/// tagged with an older generation than the current load is dropped.
pub struct Slideshow {
    source: Arc<dyn StorySource>,
    audio: Arc<dyn AudioSource>,
    config: SlideshowConfig,
    state: SlideshowState,
    catalog: Vec<StoryDescriptor>,
    current: Option<usize>,
    generation: u64,
    clock: Option<PlaybackClock>,
    events_tx: mpsc::UnboundedSender<SlideshowEvent>,
    events_rx: mpsc::UnboundedReceiver<SlideshowEvent>,
    clock_tx: mpsc::UnboundedSender<ClockSignal>,
    clock_rx: mpsc::UnboundedReceiver<ClockSignal>,
    updates: broadcast::Sender<SlideshowUpdate>,
}

/// One unit of queued work for [`Slideshow::apply`].
#[derive(Debug)]
pub enum SlideshowInput {
    Event(SlideshowEvent),
    Clock(ClockSignal),
}

impl Slideshow {
    pub fn new(
        source: Arc<dyn StorySource>,
        audio: Arc<dyn AudioSource>,
        config: SlideshowConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (clock_tx, clock_rx) = mpsc::unbounded_channel();
        let (updates, _) = broadcast::channel(256);
        Self {
            source,
            audio,
            config,
            state: SlideshowState::Idle,
            catalog: Vec::new(),
            current: None,
            generation: 0,
            clock: None,
            events_tx,
            events_rx,
            clock_tx,
            clock_rx,
            updates,
        }
    }

    pub fn state(&self) -> &SlideshowState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn catalog(&self) -> &[StoryDescriptor] {
        &self.catalog
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn config(&self) -> &SlideshowConfig {
        &self.config
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, SlideshowState::Ready { playing: true, .. })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SlideshowUpdate> {
        self.updates.subscribe()
    }

    pub fn view(&self) -> PresentationView {
        PresentationView::build(self, self.source.as_ref())
    }

    pub fn load_catalog(&mut self) {
        self.set_state(SlideshowState::CatalogLoading);
        let source = Arc::clone(&self.source);
        let events = self.events_tx.clone();
        tokio::spawn(async move {
            let result = source.list_stories().await;
            let _ = events.send(SlideshowEvent::CatalogFetched(result));
        });
    }

    /// Switches to the story at `index` in the catalog. The current clock is
    /// halted before the new manifest is requested.
    pub fn select(&mut self, index: usize) -> Result<(), SlideshowError> {
        let descriptor = self
            .catalog
            .get(index)
            .cloned()
            .ok_or(SlideshowError::NoSuchStory(index))?;
        self.generation += 1;
        self.current = Some(index);
        if let Some(clock) = self.clock.as_mut() {
            clock.halt();
        }

        let previous = std::mem::replace(&mut self.state, SlideshowState::Idle);
        let shown = match previous {
            SlideshowState::Ready { story, .. } => Some(story),
            SlideshowState::StoryLoading { shown, .. } => shown,
            _ => None,
        };
        if shown.is_none() {
            if let Some(clock) = self.clock.take() {
                clock.teardown();
            }
        }
        info!(story = %descriptor.id, generation = self.generation, "loading story");
        self.set_state(SlideshowState::StoryLoading {
            story: descriptor.clone(),
            shown,
        });

        let source = Arc::clone(&self.source);
        let events = self.events_tx.clone();
        let generation = self.generation;
        tokio::spawn(async move {
            let result = SegmentStore::load(source.as_ref(), &descriptor.id).await;
            let _ = events.send(SlideshowEvent::StoryFetched {
                generation,
                story: descriptor,
                result,
            });
        });
        Ok(())
    }

    pub fn select_id(&mut self, story_id: &StoryId) -> Result<(), SlideshowError> {
        let index = self
            .catalog
            .iter()
            .position(|story| &story.id == story_id)
            .ok_or_else(|| SlideshowError::UnknownStory(story_id.clone()))?;
        self.select(index)
    }

    /// Advances cyclically through the catalog from the last story attempted,
    /// so a story that failed to load is skipped. With no catalog yet, retries
    /// loading it.
    pub fn next_story(&mut self) {
        if self.catalog.is_empty() {
            if !matches!(self.state, SlideshowState::CatalogLoading) {
                self.load_catalog();
            }
            return;
        }
        let next = self
            .current
            .map(|index| (index + 1) % self.catalog.len())
            .unwrap_or(0);
        let _ = self.select(next);
    }

    pub fn play(&mut self) {
        let SlideshowState::Ready { playing, .. } = &self.state else {
            return;
        };
        if *playing {
            return;
        }
        let Some(clock) = self.clock.as_mut() else {
            return;
        };
        match clock.play() {
            Ok(()) => {
                if let SlideshowState::Ready {
                    playing, notice, ..
                } = &mut self.state
                {
                    *playing = true;
                    *notice = None;
                }
            }
            Err(error) => self.fail_playback(error),
        }
    }

    pub fn pause(&mut self) {
        let SlideshowState::Ready { playing, .. } = &mut self.state else {
            return;
        };
        *playing = false;
        if let Some(clock) = self.clock.as_mut() {
            clock.pause();
        }
    }

    pub fn toggle_play(&mut self) {
        if self.is_playing() {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Moves the transport and re-resolves the slide, picking the nearest
    /// segment when `seconds` falls in a gap.
    pub fn seek(&mut self, seconds: f64) {
        let SlideshowState::Ready { story, .. } = &mut self.state else {
            return;
        };
        let Some(clock) = self.clock.as_mut() else {
            return;
        };
        let position = clock.seek(seconds);
        story.position = position;
        let changed = story.engine.seek(position, story.segments.segments());
        let story_id = story.descriptor.id.clone();
        if let Some(index) = changed {
            self.publish(SlideshowUpdate::SlideChanged {
                story_id: story_id.clone(),
                index,
            });
        }
        self.publish(SlideshowUpdate::Progress { story_id, position });
    }

    /// Seeks to a fraction of the known duration. Ignored while the duration
    /// is unknown.
    pub fn seek_fraction(&mut self, fraction: f64) {
        let Some(duration) = self.state.shown().and_then(|story| story.duration) else {
            return;
        };
        if !fraction.is_finite() {
            return;
        }
        self.seek(fraction.clamp(0.0, 1.0) * duration);
    }

    pub fn next_slide(&mut self) {
        if let Some(index) = self.state.shown().and_then(LoadedStory::active_index) {
            self.show_slide(index + 1);
        }
    }

    pub fn previous_slide(&mut self) {
        if let Some(index) = self.state.shown().and_then(LoadedStory::active_index) {
            if let Some(previous) = index.checked_sub(1) {
                self.show_slide(previous);
            }
        }
    }

    /// Jumps to a slide. With working audio the transport follows to the
    /// slide's start.
    pub fn show_slide(&mut self, index: usize) {
        match &mut self.state {
            SlideshowState::Ready { story, .. } => {
                let Some(start) = story.segments.segment_at(index).map(|segment| segment.start) else {
                    return;
                };
                if let Some(clock) = self.clock.as_mut() {
                    story.position = clock.seek(start);
                }
                let changed = story.engine.show(index, story.segments.segments());
                let story_id = story.descriptor.id.clone();
                let position = story.position;
                if let Some(index) = changed {
                    self.publish(SlideshowUpdate::SlideChanged {
                        story_id: story_id.clone(),
                        index,
                    });
                }
                self.publish(SlideshowUpdate::Progress { story_id, position });
            }
            SlideshowState::PlaybackError { story, .. } => {
                if let Some(index) = story.engine.show(index, story.segments.segments()) {
                    let story_id = story.descriptor.id.clone();
                    self.publish(SlideshowUpdate::SlideChanged { story_id, index });
                }
            }
            _ => {}
        }
    }

    /// Records that the illustration of `index` could not be displayed.
    pub fn mark_image_failed(&mut self, index: usize) {
        if let Some(story) = self.state.shown_mut() {
            if index < story.segments.len() && story.failed_images.insert(index) {
                warn!(
                    story = %story.descriptor.id,
                    image = ?story.segments.segment_at(index).map(|segment| segment.image.as_str()),
                    "illustration failed to load"
                );
            }
        }
    }

    /// Probes every illustration of the shown story and marks the missing ones.
    pub async fn probe_images(&mut self) -> usize {
        let Some(story) = self.state.shown() else {
            return 0;
        };
        let story_id = story.descriptor.id.clone();
        let images: Vec<(usize, String)> = story
            .segments
            .segments()
            .iter()
            .enumerate()
            .map(|(index, segment)| (index, segment.image.clone()))
            .collect();
        let mut failed = Vec::new();
        for (index, image) in images {
            if let Err(error) = self.source.probe_image(&story_id, &image).await {
                debug!(story = %story_id, %image, %error, "image probe failed");
                failed.push(index);
            }
        }
        let still_shown = self
            .state
            .shown()
            .is_some_and(|story| story.descriptor.id == story_id);
        if !still_shown {
            return 0;
        }
        for index in &failed {
            self.mark_image_failed(*index);
        }
        failed.len()
    }

    /// Waits for the next background result or clock tick. Cancel safe, so it
    /// can sit in a `select!` next to other input sources.
    pub async fn next_input(&mut self) -> Option<SlideshowInput> {
        tokio::select! {
            Some(event) = self.events_rx.recv() => Some(SlideshowInput::Event(event)),
            Some(signal) = self.clock_rx.recv() => Some(SlideshowInput::Clock(signal)),
            else => None,
        }
    }

    pub async fn apply(&mut self, input: SlideshowInput) {
        match input {
            SlideshowInput::Event(event) => self.handle_event(event).await,
            SlideshowInput::Clock(signal) => self.handle_clock(signal),
        }
    }

    /// Waits for the next queued input and applies it.
    pub async fn step(&mut self) {
        if let Some(input) = self.next_input().await {
            self.apply(input).await;
        }
    }

    pub async fn handle_event(&mut self, event: SlideshowEvent) {
        match event {
            SlideshowEvent::CatalogFetched(result) => self.on_catalog(result),
            SlideshowEvent::StoryFetched {
                generation,
                story,
                result,
            } => {
                if generation != self.generation {
                    debug!(
                        story = %story.id,
                        generation,
                        current = self.generation,
                        "dropping superseded story load"
                    );
                    return;
                }
                match result {
                    Ok(segments) => self.on_story_loaded(story, segments).await,
                    Err(error) => self.on_story_failed(story, error),
                }
            }
        }
    }

    pub fn handle_clock(&mut self, signal: ClockSignal) {
        if signal.generation != self.generation {
            debug!(
                generation = signal.generation,
                current = self.generation,
                "dropping stale clock signal"
            );
            return;
        }
        match signal.event {
            ClockEvent::MetadataReady(duration) => {
                if let Some(story) = self.state.shown_mut() {
                    story.duration = duration;
                }
            }
            ClockEvent::TimeAdvanced(reported) => {
                // A tick queued before a seek carries the old position.
                let position = self
                    .clock
                    .as_ref()
                    .map(PlaybackClock::current_time)
                    .unwrap_or(reported);
                self.on_tick(position);
            }
            ClockEvent::Ended => self.on_ended(),
        }
    }

    /// Stops playback and releases the audio.
    pub fn shutdown(&mut self) {
        self.generation += 1;
        if let Some(clock) = self.clock.take() {
            clock.teardown();
        }
        if let SlideshowState::Ready { playing, .. } = &mut self.state {
            *playing = false;
        }
    }

    fn on_catalog(&mut self, result: Result<Vec<StoryDescriptor>, StoryError>) {
        if !matches!(self.state, SlideshowState::CatalogLoading) {
            debug!("ignoring catalog result outside catalog loading");
            return;
        }
        match result {
            Ok(stories) if stories.is_empty() => {
                warn!("story catalog is empty");
                self.set_state(SlideshowState::CatalogError {
                    message: "No stories found".into(),
                });
            }
            Ok(stories) => {
                info!(count = stories.len(), "story catalog loaded");
                self.catalog = stories;
                self.current = None;
                let _ = self.select(0);
            }
            Err(error) => {
                warn!(%error, "story catalog failed");
                self.set_state(SlideshowState::CatalogError {
                    message: error.to_string(),
                });
            }
        }
    }

    async fn on_story_loaded(&mut self, descriptor: StoryDescriptor, segments: SegmentStore) {
        if let Some(old) = self.clock.take() {
            old.teardown();
        }
        let mut story = LoadedStory::new(descriptor, segments);
        let request = MediaRequest {
            url: self.source.audio_url(&story.descriptor.id),
            duration_hint: story.segments.narration_end(),
        };
        let mut clock = PlaybackClock::new(
            Arc::clone(&self.audio),
            self.generation,
            self.config.poll_interval,
            self.clock_tx.clone(),
        );
        let story_id = story.descriptor.id.clone();
        let first = story.active_index();
        match clock.load(&request).await {
            Ok(duration) => {
                story.duration = duration;
                info!(story = %story_id, segments = story.segments.len(), ?duration, "story ready");
                self.clock = Some(clock);
                self.set_state(SlideshowState::Ready {
                    story: Box::new(story),
                    playing: false,
                    notice: None,
                });
                if let Some(index) = first {
                    self.publish(SlideshowUpdate::SlideChanged { story_id, index });
                }
                if self.config.autoplay {
                    self.play();
                }
            }
            Err(error) => {
                warn!(story = %story_id, %error, "story audio unavailable");
                self.set_state(SlideshowState::PlaybackError {
                    story: Box::new(story),
                    message: error.to_string(),
                });
                if let Some(index) = first {
                    self.publish(SlideshowUpdate::SlideChanged { story_id, index });
                }
            }
        }
    }

    fn on_story_failed(&mut self, descriptor: StoryDescriptor, error: StoryError) {
        warn!(story = %descriptor.id, %error, "story failed to load");
        let message = format!("Could not load \"{}\": {error}", descriptor.title);
        let previous = std::mem::replace(&mut self.state, SlideshowState::Idle);
        let shown = match previous {
            SlideshowState::StoryLoading { shown, .. } => shown,
            _ => None,
        };
        let restored = shown.filter(|_| self.clock.is_some());
        if let Some(story) = restored {
            let generation = self.generation;
            if let Some(clock) = self.clock.as_mut() {
                clock.rebind(generation);
            }
            self.set_state(SlideshowState::Ready {
                story,
                playing: false,
                notice: Some(message.clone()),
            });
        } else {
            if let Some(clock) = self.clock.take() {
                clock.teardown();
            }
            self.set_state(SlideshowState::StoryError {
                story: descriptor,
                message: message.clone(),
            });
        }
        self.publish(SlideshowUpdate::Notice(message));
    }

    fn on_tick(&mut self, position: f64) {
        let SlideshowState::Ready {
            story,
            playing: true,
            ..
        } = &mut self.state
        else {
            return;
        };
        story.position = position;
        let changed = story.engine.advance(position, story.segments.segments());
        let story_id = story.descriptor.id.clone();
        if let Some(index) = changed {
            debug!(story = %story_id, index, position, "slide changed");
            self.publish(SlideshowUpdate::SlideChanged {
                story_id: story_id.clone(),
                index,
            });
        }
        self.publish(SlideshowUpdate::Progress { story_id, position });
    }

    fn on_ended(&mut self) {
        let policy = self.config.on_ended;
        let SlideshowState::Ready { story, playing, .. } = &mut self.state else {
            return;
        };
        let Some(clock) = self.clock.as_mut() else {
            return;
        };
        let outcome = ended_outcome(policy, story.segments.segments(), story.duration);
        info!(story = %story.descriptor.id, %policy, "narration ended");

        if !outcome.keep_playing {
            clock.pause();
            *playing = false;
        }
        story.position = clock.seek(outcome.position);
        let changed = match outcome.index {
            Some(index) => story.engine.show(index, story.segments.segments()),
            None => None,
        };
        let story_id = story.descriptor.id.clone();
        let position = story.position;
        let restart = outcome.keep_playing.then(|| clock.play());

        if let Some(index) = changed {
            self.publish(SlideshowUpdate::SlideChanged {
                story_id: story_id.clone(),
                index,
            });
        }
        self.publish(SlideshowUpdate::Progress { story_id, position });
        if let Some(Err(error)) = restart {
            self.fail_playback(error);
        }
    }

    fn fail_playback(&mut self, error: PlaybackError) {
        warn!(%error, "playback failed");
        let previous = std::mem::replace(&mut self.state, SlideshowState::Idle);
        match previous {
            SlideshowState::Ready { story, .. } => {
                if let Some(clock) = self.clock.take() {
                    clock.teardown();
                }
                self.set_state(SlideshowState::PlaybackError {
                    story,
                    message: error.to_string(),
                });
            }
            other => self.state = other,
        }
    }

    fn set_state(&mut self, state: SlideshowState) {
        let phase = state.phase();
        let changed = phase != self.state.phase();
        self.state = state;
        if changed {
            self.publish(SlideshowUpdate::PhaseChanged(phase));
        }
    }

    fn publish(&self, update: SlideshowUpdate) {
        let _ = self.updates.send(update);
    }
}

impl Drop for Slideshow {
    fn drop(&mut self) {
        if let Some(clock) = self.clock.take() {
            clock.teardown();
        }
    }
}

#[cfg(test)]
#[path = "tests/slideshow_tests.rs"]
mod tests;
