use shared::{
    domain::StoryId,
    error::ApiError,
    protocol::{StoryListResponse, StoryManifestResponse},
};
use storage::{AssetPath, MediaFile, StoryLibrary};
use tracing::{info, warn};

#[derive(Clone)]
pub struct ApiContext {
    pub library: StoryLibrary,
    pub media_cache_seconds: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaScope {
    /// Every root, then the placeholder image.
    Resolved,
    /// Primary root only.
    Static,
}

pub async fn list_stories(ctx: &ApiContext) -> Result<StoryListResponse, ApiError> {
    let stories = ctx.library.list_stories().await.map_err(|error| {
        warn!(%error, "failed to list stories");
        ApiError::from(error)
    })?;
    info!(count = stories.len(), "listed stories");
    Ok(StoryListResponse { stories })
}

pub async fn story_manifest(
    ctx: &ApiContext,
    story_id: &str,
) -> Result<StoryManifestResponse, ApiError> {
    let story_id = StoryId::parse(story_id)?;
    let manifest = ctx.library.load_manifest(&story_id).await.map_err(|error| {
        warn!(story = %story_id, %error, "failed to load story manifest");
        ApiError::from(error)
    })?;
    Ok(StoryManifestResponse {
        title: manifest.title_or_humanized(&story_id),
        id: story_id.to_string(),
        segments: manifest.segments,
    })
}

pub async fn media_file(
    ctx: &ApiContext,
    raw_path: &str,
    scope: MediaScope,
) -> Result<MediaFile, ApiError> {
    let asset = AssetPath::parse(raw_path).map_err(|error| {
        warn!(path = %raw_path, %error, "rejected media path");
        ApiError::from(error)
    })?;
    let result = match scope {
        MediaScope::Resolved => ctx.library.get_file(&asset).await,
        MediaScope::Static => ctx.library.get_static_file(&asset).await,
    };
    result.map_err(|error| {
        warn!(path = %asset.display_path(), %error, "media file unavailable");
        ApiError::from(error)
    })
}

#[cfg(test)]
#[path = "tests/mod_tests.rs"]
mod tests;
