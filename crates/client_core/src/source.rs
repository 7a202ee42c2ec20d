use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use shared::{
    domain::{StoryDescriptor, StoryId, StoryManifest, AUDIO_FILE, SEGMENTS_FILE},
    error::{ApiError, StoryError},
    protocol::{media_route, static_route, StoryListResponse},
};
use storage::{AssetPath, StoryLibrary};
use tracing::{debug, warn};
use url::Url;

/// Where the slideshow gets its catalog, manifests and media URLs from.
#[async_trait]
pub trait StorySource: Send + Sync {
    async fn list_stories(&self) -> Result<Vec<StoryDescriptor>, StoryError>;
    async fn load_manifest(&self, story_id: &StoryId) -> Result<StoryManifest, StoryError>;
    fn audio_url(&self, story_id: &StoryId) -> String;
    fn image_url(&self, story_id: &StoryId, image: &str) -> String;
    /// Checks that an illustration can be fetched.
    async fn probe_image(&self, story_id: &StoryId, image: &str) -> Result<(), StoryError>;
}

/// Talks to the story server over HTTP.
pub struct HttpStorySource {
    http: Client,
    server_url: String,
}

impl HttpStorySource {
    pub fn new(server_url: &str) -> Result<Self, url::ParseError> {
        let parsed = Url::parse(server_url)?;
        Ok(Self {
            http: Client::new(),
            server_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn url_for(&self, route: &str) -> String {
        format!("{}{route}", self.server_url)
    }

    async fn error_message(response: reqwest::Response) -> String {
        let status = response.status();
        match response.json::<ApiError>().await {
            Ok(error) => error.message,
            Err(_) => format!("server responded with {status}"),
        }
    }
}

#[async_trait]
impl StorySource for HttpStorySource {
    async fn list_stories(&self) -> Result<Vec<StoryDescriptor>, StoryError> {
        let url = self.url_for("/api/stories");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|error| StoryError::CatalogUnavailable(error.to_string()))?;
        if !response.status().is_success() {
            return Err(StoryError::CatalogUnavailable(
                Self::error_message(response).await,
            ));
        }
        let list: StoryListResponse = response
            .json()
            .await
            .map_err(|error| StoryError::CatalogMalformed(error.to_string()))?;
        debug!(count = list.stories.len(), "fetched story catalog");
        Ok(list.stories)
    }

    /// Tries the resolving media route first, then the static route.
    async fn load_manifest(&self, story_id: &StoryId) -> Result<StoryManifest, StoryError> {
        let candidates = [
            media_route(story_id.as_str(), SEGMENTS_FILE),
            static_route(story_id.as_str(), SEGMENTS_FILE),
        ];
        for route in candidates {
            let url = self.url_for(&route);
            let response = self
                .http
                .get(&url)
                .send()
                .await
                .map_err(|error| StoryError::Io(format!("{url}: {error}")))?;
            match response.status() {
                StatusCode::NOT_FOUND => {
                    debug!(%url, "manifest candidate missing");
                    continue;
                }
                status if status.is_success() => {
                    let bytes = response
                        .bytes()
                        .await
                        .map_err(|error| StoryError::Io(format!("{url}: {error}")))?;
                    return StoryManifest::from_json(story_id, &bytes);
                }
                StatusCode::BAD_REQUEST => {
                    return Err(StoryError::InvalidPath(story_id.to_string()));
                }
                status => {
                    warn!(%url, %status, "manifest request failed");
                    return Err(StoryError::Io(Self::error_message(response).await));
                }
            }
        }
        Err(StoryError::ManifestNotFound(story_id.clone()))
    }

    fn audio_url(&self, story_id: &StoryId) -> String {
        self.url_for(&media_route(story_id.as_str(), AUDIO_FILE))
    }

    fn image_url(&self, story_id: &StoryId, image: &str) -> String {
        self.url_for(&media_route(story_id.as_str(), image))
    }

    async fn probe_image(&self, story_id: &StoryId, image: &str) -> Result<(), StoryError> {
        let url = self.image_url(story_id, image);
        let response = self
            .http
            .head(&url)
            .send()
            .await
            .map_err(|error| StoryError::Io(format!("{url}: {error}")))?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(StoryError::AssetMissing {
                story_id: story_id.clone(),
                filename: image.to_string(),
            })
        }
    }
}

/// Reads stories straight from disk through a [`StoryLibrary`].
#[derive(Clone)]
pub struct LocalStorySource {
    library: StoryLibrary,
}

impl LocalStorySource {
    pub fn new(library: StoryLibrary) -> Self {
        Self { library }
    }

    fn local_path(&self, story_id: &StoryId, filename: &str) -> String {
        self.library
            .roots()
            .iter()
            .map(|root| root.join(story_id.as_str()).join(filename))
            .find(|path| path.is_file())
            .or_else(|| {
                self.library
                    .roots()
                    .first()
                    .map(|root| root.join(story_id.as_str()).join(filename))
            })
            .map(|path| path.display().to_string())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StorySource for LocalStorySource {
    async fn list_stories(&self) -> Result<Vec<StoryDescriptor>, StoryError> {
        self.library.list_stories().await
    }

    async fn load_manifest(&self, story_id: &StoryId) -> Result<StoryManifest, StoryError> {
        self.library.load_manifest(story_id).await
    }

    fn audio_url(&self, story_id: &StoryId) -> String {
        self.local_path(story_id, AUDIO_FILE)
    }

    fn image_url(&self, story_id: &StoryId, image: &str) -> String {
        self.local_path(story_id, image)
    }

    async fn probe_image(&self, story_id: &StoryId, image: &str) -> Result<(), StoryError> {
        let asset = AssetPath::new(story_id.clone(), image)?;
        self.library.get_file(&asset).await.map(|_| ())
    }
}

#[cfg(test)]
#[path = "tests/source_tests.rs"]
mod tests;
