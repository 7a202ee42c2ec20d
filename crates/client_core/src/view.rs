//! Read-only projection of the slideshow for whatever renders it.

use shared::domain::StoryId;

use crate::{
    slideshow::{Phase, Slideshow, SlideshowState},
    source::StorySource,
};

#[derive(Debug, Clone, PartialEq)]
pub struct SlideView {
    pub index: usize,
    pub total: usize,
    pub text: String,
    pub image: String,
    pub image_url: String,
    pub image_failed: bool,
}

impl SlideView {
    /// One-based position, as shown to the listener.
    pub fn number(&self) -> usize {
        self.index + 1
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PresentationView {
    pub phase: Phase,
    pub story_id: Option<StoryId>,
    pub title: Option<String>,
    pub slide: Option<SlideView>,
    pub playing: bool,
    /// Play, pause and seek are available.
    pub transport_enabled: bool,
    pub position: f64,
    pub duration: Option<f64>,
    pub message: Option<String>,
    pub loading: bool,
    pub can_change_story: bool,
}

impl PresentationView {
    pub fn build(slideshow: &Slideshow, source: &dyn StorySource) -> Self {
        let state = slideshow.state();
        let shown = state.shown();
        let slide = shown.and_then(|story| {
            let index = story.active_index()?;
            let segment = story.segments.segment_at(index)?;
            Some(SlideView {
                index,
                total: story.segments.len(),
                text: segment.text.clone(),
                image: segment.image.clone(),
                image_url: source.image_url(&story.descriptor.id, &segment.image),
                image_failed: story.failed_images.contains(&index),
            })
        });
        let (playing, notice) = match state {
            SlideshowState::Ready {
                playing, notice, ..
            } => (*playing, notice.clone()),
            _ => (false, None),
        };
        let message = match state {
            SlideshowState::CatalogError { message }
            | SlideshowState::StoryError { message, .. }
            | SlideshowState::PlaybackError { message, .. } => Some(message.clone()),
            SlideshowState::Ready { .. } if shown.is_some_and(|s| s.segments.is_empty()) => {
                Some(notice.unwrap_or_else(|| "This story has no slides yet.".into()))
            }
            _ => notice,
        };
        let title = match state {
            SlideshowState::StoryLoading { story, .. } | SlideshowState::StoryError { story, .. } => {
                Some(story.title.clone())
            }
            _ => shown.map(|story| story.segments.title().to_string()),
        };
        let story_id = match state {
            SlideshowState::StoryLoading { story, .. } | SlideshowState::StoryError { story, .. } => {
                Some(story.id.clone())
            }
            _ => shown.map(|story| story.descriptor.id.clone()),
        };

        Self {
            phase: state.phase(),
            story_id,
            title,
            slide,
            playing,
            transport_enabled: matches!(state, SlideshowState::Ready { .. }),
            position: shown.map(|story| story.position).unwrap_or(0.0),
            duration: shown.and_then(|story| story.duration),
            message,
            loading: matches!(
                state,
                SlideshowState::CatalogLoading | SlideshowState::StoryLoading { .. }
            ),
            can_change_story: !slideshow.catalog().is_empty()
                || matches!(state, SlideshowState::CatalogError { .. }),
        }
    }

    /// Playback progress in `[0, 1]`; zero while the duration is unknown.
    pub fn progress(&self) -> f64 {
        progress_fraction(self.position, self.duration)
    }

    pub fn is_empty_story(&self) -> bool {
        self.phase == Phase::Ready && self.slide.is_none()
    }
}

pub fn progress_fraction(position: f64, duration: Option<f64>) -> f64 {
    match duration {
        Some(duration) if duration.is_finite() && duration > 0.0 && position.is_finite() => {
            (position / duration).clamp(0.0, 1.0)
        }
        _ => 0.0,
    }
}

/// `mm:ss` for transport labels.
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
