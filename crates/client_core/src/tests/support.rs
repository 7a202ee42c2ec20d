use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    domain::{Segment, StoryDescriptor, StoryId, StoryManifest},
    error::{PlaybackError, StoryError},
};

use crate::{
    clock::{AudioSource, MediaRequest},
    source::StorySource,
};

pub(crate) fn story_id(raw: &str) -> StoryId {
    StoryId::parse(raw).expect("story id")
}

pub(crate) fn segment(text: &str, start: f64, end: f64) -> Segment {
    Segment {
        text: text.into(),
        image: format!("{text}.png"),
        start,
        end,
    }
}

pub(crate) fn manifest(segments: Vec<Segment>) -> StoryManifest {
    StoryManifest {
        title: None,
        segments,
    }
}

#[derive(Debug, Default, Clone)]
pub(crate) struct ManualAudioState {
    pub opened: Vec<String>,
    pub position: f64,
    pub ended: bool,
    pub playing: bool,
    pub closed: usize,
    pub fail_open: bool,
    pub fail_play: bool,
    pub report_duration: bool,
    pub duration: Option<f64>,
}

/// Audio whose position is set by the test.
#[derive(Debug, Default)]
pub(crate) struct ManualAudio {
    state: Mutex<ManualAudioState>,
}

impl ManualAudio {
    pub fn new() -> Arc<Self> {
        let audio = Self::default();
        audio.update(|state| state.report_duration = true);
        Arc::new(audio)
    }

    pub fn update(&self, f: impl FnOnce(&mut ManualAudioState)) {
        f(&mut self.state.lock().expect("audio state"));
    }

    pub fn snapshot(&self) -> ManualAudioState {
        self.state.lock().expect("audio state").clone()
    }

    pub fn set_position(&self, seconds: f64) {
        self.update(|state| state.position = seconds);
    }
}

#[async_trait]
impl AudioSource for ManualAudio {
    async fn open(&self, request: &MediaRequest) -> Result<Option<f64>, PlaybackError> {
        let mut state = self.state.lock().expect("audio state");
        if state.fail_open {
            return Err(PlaybackError::Open {
                url: request.url.clone(),
                reason: "unsupported format".into(),
            });
        }
        state.opened.push(request.url.clone());
        state.position = 0.0;
        state.ended = false;
        state.duration = request.duration_hint;
        Ok(if state.report_duration {
            request.duration_hint
        } else {
            None
        })
    }

    fn play(&self) -> Result<(), PlaybackError> {
        let mut state = self.state.lock().expect("audio state");
        if state.fail_play {
            return Err(PlaybackError::Play("autoplay blocked".into()));
        }
        state.playing = true;
        Ok(())
    }

    fn pause(&self) {
        self.state.lock().expect("audio state").playing = false;
    }

    fn seek(&self, seconds: f64) {
        let mut state = self.state.lock().expect("audio state");
        state.position = seconds;
        state.ended = false;
    }

    fn position(&self) -> f64 {
        self.state.lock().expect("audio state").position
    }

    fn is_ended(&self) -> bool {
        self.state.lock().expect("audio state").ended
    }

    fn close(&self) {
        let mut state = self.state.lock().expect("audio state");
        state.closed += 1;
        state.playing = false;
    }
}

/// In-memory stories with optional per-story response delays.
#[derive(Default)]
pub(crate) struct FakeSource {
    pub catalog: Mutex<Option<Result<Vec<StoryDescriptor>, StoryError>>>,
    pub manifests: Mutex<HashMap<StoryId, Result<StoryManifest, StoryError>>>,
    pub delays: Mutex<HashMap<StoryId, Duration>>,
    pub missing_images: Mutex<HashSet<String>>,
}

impl FakeSource {
    pub fn with_stories(stories: Vec<(&str, Result<StoryManifest, StoryError>)>) -> Arc<Self> {
        let source = Self::default();
        let mut catalog = Vec::new();
        {
            let mut manifests = source.manifests.lock().expect("manifests");
            for (raw, manifest) in stories {
                let id = story_id(raw);
                catalog.push(StoryDescriptor::from_id(id.clone()));
                manifests.insert(id, manifest);
            }
        }
        *source.catalog.lock().expect("catalog") = Some(Ok(catalog));
        Arc::new(source)
    }

    pub fn delay(&self, raw: &str, delay: Duration) {
        self.delays
            .lock()
            .expect("delays")
            .insert(story_id(raw), delay);
    }
}

#[async_trait]
impl StorySource for FakeSource {
    async fn list_stories(&self) -> Result<Vec<StoryDescriptor>, StoryError> {
        self.catalog
            .lock()
            .expect("catalog")
            .clone()
            .unwrap_or_else(|| Err(StoryError::CatalogUnavailable("offline".into())))
    }

    async fn load_manifest(&self, story_id: &StoryId) -> Result<StoryManifest, StoryError> {
        let delay = self.delays.lock().expect("delays").get(story_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.manifests
            .lock()
            .expect("manifests")
            .get(story_id)
            .cloned()
            .unwrap_or_else(|| Err(StoryError::ManifestNotFound(story_id.clone())))
    }

    fn audio_url(&self, story_id: &StoryId) -> String {
        format!("fake://{story_id}/story_audio.mp3")
    }

    fn image_url(&self, story_id: &StoryId, image: &str) -> String {
        format!("fake://{story_id}/{image}")
    }

    async fn probe_image(&self, story_id: &StoryId, image: &str) -> Result<(), StoryError> {
        if self.missing_images.lock().expect("images").contains(image) {
            Err(StoryError::AssetMissing {
                story_id: story_id.clone(),
                filename: image.into(),
            })
        } else {
            Ok(())
        }
    }
}
