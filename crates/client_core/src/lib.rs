//! Client side of the story slideshow: loads stories from a [`StorySource`],
//! drives an [`AudioSource`] and keeps the on-screen slide in step with it.

pub mod clock;
pub mod segments;
pub mod slideshow;
pub mod source;
pub mod sync;
pub mod view;

pub use clock::{AudioSource, ClockEvent, ClockSignal, MediaRequest, PlaybackClock, SimulatedAudio};
pub use segments::SegmentStore;
pub use slideshow::{
    LoadedStory, Phase, Slideshow, SlideshowConfig, SlideshowError, SlideshowEvent, SlideshowInput,
    SlideshowState, SlideshowUpdate,
};
pub use source::{HttpStorySource, LocalStorySource, StorySource};
pub use sync::{resolve, resolve_seek, EndedPolicy, SyncEngine};
pub use view::{PresentationView, SlideView};

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
