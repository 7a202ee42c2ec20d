use std::sync::Arc;

use shared::{
    domain::{self, Segment, StoryDescriptor, StoryId, StoryManifest},
    error::StoryError,
};

use crate::source::StorySource;

/// Immutable, ordered segment list of one story. Cheap to clone.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentStore {
    story_id: StoryId,
    title: String,
    segments: Arc<[Segment]>,
}

impl SegmentStore {
    pub fn new(story_id: StoryId, manifest: StoryManifest) -> Self {
        let title = manifest.title_or_humanized(&story_id);
        Self {
            story_id,
            title,
            segments: manifest.segments.into(),
        }
    }

    pub fn from_segments(descriptor: &StoryDescriptor, segments: Vec<Segment>) -> Self {
        Self {
            story_id: descriptor.id.clone(),
            title: descriptor.title.clone(),
            segments: segments.into(),
        }
    }

    pub async fn load(source: &dyn StorySource, story_id: &StoryId) -> Result<Self, StoryError> {
        let manifest = source.load_manifest(story_id).await?;
        Ok(Self::new(story_id.clone(), manifest))
    }

    pub fn story_id(&self) -> &StoryId {
        &self.story_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn segment_at(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.segments.len().checked_sub(1)
    }

    pub fn narration_end(&self) -> Option<f64> {
        domain::narration_end(&self.segments)
    }
}
