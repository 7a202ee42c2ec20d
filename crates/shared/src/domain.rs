use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StoryError;

pub const SEGMENTS_FILE: &str = "story_segments.json";
pub const AUDIO_FILE: &str = "story_audio.mp3";
pub const CATALOG_FILE: &str = "stories.json";

/// Folder key of a story. Always a single, non-traversing path component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoryId(String);

impl StoryId {
    pub fn parse(raw: impl Into<String>) -> Result<Self, StoryError> {
        let raw = raw.into();
        if raw.is_empty()
            || raw == "."
            || raw == ".."
            || raw.contains(['/', '\\', '\0'])
        {
            return Err(StoryError::InvalidPath(raw));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `the-curious-cloud` becomes `The Curious Cloud`.
    pub fn humanized(&self) -> String {
        self.0
            .split('-')
            .filter(|word| !word.is_empty())
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl TryFrom<String> for StoryId {
    type Error = StoryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<StoryId> for String {
    fn from(value: StoryId) -> Self {
        value.0
    }
}

impl fmt::Display for StoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One slide: its text, illustration and `[start, end)` narration window in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub image: String,
    pub start: f64,
    pub end: f64,
}

impl Segment {
    pub fn contains(&self, seconds: f64) -> bool {
        self.start <= seconds && seconds < self.end
    }

    /// Distance from `seconds` to the window, zero inside it.
    pub fn distance_to(&self, seconds: f64) -> f64 {
        if seconds < self.start {
            self.start - seconds
        } else if seconds >= self.end {
            seconds - self.end
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryDescriptor {
    pub id: StoryId,
    pub title: String,
}

impl StoryDescriptor {
    pub fn from_id(id: StoryId) -> Self {
        let title = id.humanized();
        Self { id, title }
    }
}

/// Parsed `story_segments.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoryManifest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub segments: Vec<Segment>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawManifest {
    Titled {
        #[serde(default)]
        title: Option<String>,
        segments: Vec<Segment>,
    },
    Bare(Vec<Segment>),
}

impl StoryManifest {
    /// Accepts `{ "title"?, "segments": [...] }` or a bare segment array.
    pub fn from_json(story_id: &StoryId, raw: &[u8]) -> Result<Self, StoryError> {
        let value: serde_json::Value =
            serde_json::from_slice(raw).map_err(|e| StoryError::ManifestMalformed {
                story_id: story_id.clone(),
                reason: e.to_string(),
            })?;
        if let Some(object) = value.as_object() {
            if !object.contains_key("segments") {
                return Err(StoryError::ManifestMalformed {
                    story_id: story_id.clone(),
                    reason: "missing `segments`".into(),
                });
            }
        }
        let manifest = serde_json::from_value::<RawManifest>(value).map_err(|e| {
            StoryError::ManifestMalformed {
                story_id: story_id.clone(),
                reason: e.to_string(),
            }
        })?;
        Ok(match manifest {
            RawManifest::Titled { title, segments } => Self {
                title: title.filter(|t| !t.trim().is_empty()),
                segments,
            },
            RawManifest::Bare(segments) => Self {
                title: None,
                segments,
            },
        })
    }

    pub fn title_or_humanized(&self, story_id: &StoryId) -> String {
        self.title.clone().unwrap_or_else(|| story_id.humanized())
    }
}

/// End of the last segment window; a duration hint when the audio has none.
pub fn narration_end(segments: &[Segment]) -> Option<f64> {
    segments
        .iter()
        .map(|segment| segment.end)
        .filter(|end| end.is_finite())
        .reduce(f64::max)
}
