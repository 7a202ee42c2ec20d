use serde::{Deserialize, Serialize};

use crate::domain::{Segment, StoryDescriptor};

/// `stories.json` in the primary story root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogManifest {
    pub stories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryListResponse {
    pub stories: Vec<StoryDescriptor>,
}

/// Manifest as served by `/api/stories/:id`, title already resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryManifestResponse {
    pub id: String,
    pub title: String,
    pub segments: Vec<Segment>,
}

pub fn media_route(story_id: &str, filename: &str) -> String {
    format!("/api/media/{story_id}/{filename}")
}

pub fn static_route(story_id: &str, filename: &str) -> String {
    format!("/output/{story_id}/{filename}")
}

pub fn content_type_for(filename: &str) -> &'static str {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}
