use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::StoryId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    NotFound,
    Validation,
    Malformed,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum StoryError {
    #[error("story manifest not found for `{0}`")]
    ManifestNotFound(StoryId),
    #[error("story manifest for `{story_id}` is malformed: {reason}")]
    ManifestMalformed { story_id: StoryId, reason: String },
    #[error("asset `{filename}` missing for story `{story_id}`")]
    AssetMissing { story_id: StoryId, filename: String },
    #[error("story catalog unavailable: {0}")]
    CatalogUnavailable(String),
    #[error("story catalog is malformed: {0}")]
    CatalogMalformed(String),
    #[error("invalid story path `{0}`")]
    InvalidPath(String),
    #[error("i/o error: {0}")]
    Io(String),
}

impl StoryError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ManifestNotFound(_) | Self::AssetMissing { .. } => ErrorCode::NotFound,
            Self::ManifestMalformed { .. } | Self::CatalogMalformed(_) => ErrorCode::Malformed,
            Self::InvalidPath(_) => ErrorCode::Validation,
            Self::CatalogUnavailable(_) | Self::Io(_) => ErrorCode::Internal,
        }
    }
}

impl From<StoryError> for ApiError {
    fn from(value: StoryError) -> Self {
        Self::new(value.code(), value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("audio `{url}` could not be opened: {reason}")]
    Open { url: String, reason: String },
    #[error("audio playback failed: {0}")]
    Play(String),
    #[error("no audio loaded")]
    NotLoaded,
}
