//! Ordered asset lookup: each strategy answers hit or miss, the chain takes the first hit.

use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use shared::{domain::StoryId, error::StoryError};
use tracing::debug;

/// A validated `<story>/<file...>` request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetPath {
    pub story_id: StoryId,
    pub relative: PathBuf,
}

impl AssetPath {
    pub fn new(story_id: StoryId, filename: &str) -> Result<Self, StoryError> {
        let relative = sanitize_relative(filename)?;
        Ok(Self { story_id, relative })
    }

    /// Parses a route tail such as `the-curious-cloud/image_1.png`.
    pub fn parse(raw: &str) -> Result<Self, StoryError> {
        let (story, rest) = raw
            .trim_start_matches('/')
            .split_once('/')
            .ok_or_else(|| StoryError::InvalidPath(raw.to_string()))?;
        if story.is_empty() || rest.is_empty() {
            return Err(StoryError::InvalidPath(raw.to_string()));
        }
        Self::new(StoryId::parse(story)?, rest)
    }

    pub fn file_name(&self) -> &str {
        self.relative
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }

    pub fn display_path(&self) -> String {
        format!("{}/{}", self.story_id, self.relative.to_string_lossy())
    }

    /// Story illustrations are named `image_<n>.png`.
    pub fn is_numbered_image(&self) -> bool {
        is_numbered_image(self.file_name())
    }
}

pub fn is_numbered_image(file_name: &str) -> bool {
    file_name
        .strip_prefix("image_")
        .and_then(|rest| rest.strip_suffix(".png"))
        .is_some_and(|digits| !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()))
}

fn sanitize_relative(raw: &str) -> Result<PathBuf, StoryError> {
    if raw.is_empty() || raw.contains(['\\', '\0']) {
        return Err(StoryError::InvalidPath(raw.to_string()));
    }
    let path = Path::new(raw);
    let mut relative = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(StoryError::InvalidPath(raw.to_string()));
            }
        }
    }
    if relative.as_os_str().is_empty() {
        return Err(StoryError::InvalidPath(raw.to_string()));
    }
    Ok(relative)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub path: PathBuf,
    pub placeholder: bool,
    pub resolver: String,
}

#[async_trait]
pub trait AssetResolver: Send + Sync {
    fn name(&self) -> String;
    async fn resolve(&self, asset: &AssetPath) -> Option<ResolvedAsset>;
}

/// Looks for `<root>/<story>/<file>`.
pub struct DirectoryResolver {
    root: PathBuf,
}

impl DirectoryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl AssetResolver for DirectoryResolver {
    fn name(&self) -> String {
        format!("dir:{}", self.root.display())
    }

    async fn resolve(&self, asset: &AssetPath) -> Option<ResolvedAsset> {
        let path = self
            .root
            .join(asset.story_id.as_str())
            .join(&asset.relative);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Some(ResolvedAsset {
                path,
                placeholder: false,
                resolver: self.name(),
            }),
            _ => None,
        }
    }
}

/// Substitutes a shared image for missing `image_<n>.png` files only.
pub struct PlaceholderResolver {
    image: PathBuf,
}

impl PlaceholderResolver {
    pub fn new(image: impl Into<PathBuf>) -> Self {
        Self {
            image: image.into(),
        }
    }
}

#[async_trait]
impl AssetResolver for PlaceholderResolver {
    fn name(&self) -> String {
        "placeholder".to_string()
    }

    async fn resolve(&self, asset: &AssetPath) -> Option<ResolvedAsset> {
        if !asset.is_numbered_image() {
            return None;
        }
        match tokio::fs::metadata(&self.image).await {
            Ok(meta) if meta.is_file() => Some(ResolvedAsset {
                path: self.image.clone(),
                placeholder: true,
                resolver: self.name(),
            }),
            _ => None,
        }
    }
}

#[derive(Clone, Default)]
pub struct ResolverChain {
    resolvers: Vec<Arc<dyn AssetResolver>>,
}

impl ResolverChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(mut self, resolver: impl AssetResolver + 'static) -> Self {
        self.resolvers.push(Arc::new(resolver));
        self
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    pub async fn resolve(&self, asset: &AssetPath) -> Option<ResolvedAsset> {
        for resolver in &self.resolvers {
            if let Some(found) = resolver.resolve(asset).await {
                debug!(
                    asset = %asset.display_path(),
                    resolver = %found.resolver,
                    path = %found.path.display(),
                    "asset resolved"
                );
                return Some(found);
            }
            debug!(asset = %asset.display_path(), resolver = %resolver.name(), "asset miss");
        }
        None
    }
}
