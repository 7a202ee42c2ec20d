use std::{
    collections::HashSet,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Result};
use shared::{
    domain::{StoryDescriptor, StoryId, StoryManifest, CATALOG_FILE, SEGMENTS_FILE},
    error::StoryError,
    protocol::{content_type_for, CatalogManifest},
};
use tracing::{debug, info, warn};

pub mod maintenance;
pub mod resolver;

pub use resolver::{
    AssetPath, AssetResolver, DirectoryResolver, PlaceholderResolver, ResolvedAsset,
    ResolverChain,
};

#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// Story roots in lookup order; the first one is primary.
    pub roots: Vec<PathBuf>,
    /// Defaults to `<primary root>/stories.json`.
    pub catalog_manifest: Option<PathBuf>,
    pub placeholder_image: Option<PathBuf>,
}

impl LibraryConfig {
    pub fn single_root(root: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![root.into()],
            catalog_manifest: None,
            placeholder_image: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MediaFile {
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
    pub placeholder: bool,
}

/// Flat-file story library spread over one or more root directories.
#[derive(Clone)]
pub struct StoryLibrary {
    inner: Arc<LibraryInner>,
}

struct LibraryInner {
    roots: Vec<PathBuf>,
    catalog_manifest: PathBuf,
    media: ResolverChain,
    primary: ResolverChain,
}

impl StoryLibrary {
    pub fn new(config: LibraryConfig) -> Result<Self> {
        let Some(primary_root) = config.roots.first().cloned() else {
            bail!("story library needs at least one root directory");
        };
        for root in &config.roots {
            if !root.is_dir() {
                warn!(root = %root.display(), "story root does not exist yet");
            }
        }

        let mut media = config
            .roots
            .iter()
            .fold(ResolverChain::new(), |chain, root| {
                chain.then(DirectoryResolver::new(root))
            });
        if let Some(placeholder) = &config.placeholder_image {
            media = media.then(PlaceholderResolver::new(placeholder));
        }
        let primary = ResolverChain::new().then(DirectoryResolver::new(&primary_root));
        let catalog_manifest = config
            .catalog_manifest
            .clone()
            .unwrap_or_else(|| primary_root.join(CATALOG_FILE));

        info!(
            roots = ?config.roots,
            catalog = %catalog_manifest.display(),
            resolvers = media.len(),
            "story library ready"
        );

        Ok(Self {
            inner: Arc::new(LibraryInner {
                roots: config.roots,
                catalog_manifest,
                media,
                primary,
            }),
        })
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.inner.roots
    }

    pub fn catalog_manifest_path(&self) -> &Path {
        &self.inner.catalog_manifest
    }

    /// Catalog from `stories.json` when present, otherwise a scan of every root.
    pub async fn list_stories(&self) -> Result<Vec<StoryDescriptor>, StoryError> {
        match self.read_catalog_manifest().await? {
            Some(catalog) => Ok(self.describe_catalog(catalog).await),
            None => self.scan_stories().await,
        }
    }

    pub async fn read_catalog_manifest(&self) -> Result<Option<CatalogManifest>, StoryError> {
        let path = &self.inner.catalog_manifest;
        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoryError::CatalogUnavailable(e.to_string())),
        };
        serde_json::from_slice::<CatalogManifest>(&raw)
            .map(Some)
            .map_err(|e| StoryError::CatalogMalformed(e.to_string()))
    }

    async fn describe_catalog(&self, catalog: CatalogManifest) -> Vec<StoryDescriptor> {
        let mut seen = HashSet::new();
        let mut stories = Vec::with_capacity(catalog.stories.len());
        for raw in catalog.stories {
            let id = match StoryId::parse(raw.clone()) {
                Ok(id) => id,
                Err(error) => {
                    warn!(entry = %raw, %error, "skipping invalid catalog entry");
                    continue;
                }
            };
            if !seen.insert(id.clone()) {
                continue;
            }
            let title = match self.load_manifest(&id).await {
                Ok(manifest) => manifest.title_or_humanized(&id),
                Err(_) => id.humanized(),
            };
            stories.push(StoryDescriptor { id, title });
        }
        stories
    }

    /// Every story folder with a parseable manifest, primary root first.
    pub async fn scan_stories(&self) -> Result<Vec<StoryDescriptor>, StoryError> {
        let mut seen = HashSet::new();
        let mut stories = Vec::new();
        for root in &self.inner.roots {
            for id in story_folders(root).await? {
                if seen.contains(&id) {
                    continue;
                }
                match read_manifest_at(&root.join(id.as_str()).join(SEGMENTS_FILE), &id).await {
                    Ok(manifest) => {
                        let title = manifest.title_or_humanized(&id);
                        seen.insert(id.clone());
                        stories.push(StoryDescriptor { id, title });
                    }
                    Err(error) => debug!(story = %id, %error, "skipping folder without valid manifest"),
                }
            }
        }
        Ok(stories)
    }

    pub async fn load_manifest(&self, story_id: &StoryId) -> Result<StoryManifest, StoryError> {
        let asset = AssetPath::new(story_id.clone(), SEGMENTS_FILE)?;
        let resolved = self
            .inner
            .media
            .resolve(&asset)
            .await
            .ok_or_else(|| StoryError::ManifestNotFound(story_id.clone()))?;
        read_manifest_at(&resolved.path, story_id).await
    }

    /// Media lookup through every root, then the placeholder.
    pub async fn get_file(&self, asset: &AssetPath) -> Result<MediaFile, StoryError> {
        self.read_through(&self.inner.media, asset).await
    }

    /// Primary root only, never substituted.
    pub async fn get_static_file(&self, asset: &AssetPath) -> Result<MediaFile, StoryError> {
        self.read_through(&self.inner.primary, asset).await
    }

    async fn read_through(
        &self,
        chain: &ResolverChain,
        asset: &AssetPath,
    ) -> Result<MediaFile, StoryError> {
        let missing = || StoryError::AssetMissing {
            story_id: asset.story_id.clone(),
            filename: asset.relative.to_string_lossy().into_owned(),
        };
        let resolved = chain.resolve(asset).await.ok_or_else(missing)?;
        if resolved.placeholder {
            info!(asset = %asset.display_path(), "serving placeholder for missing image");
        }
        let bytes = match tokio::fs::read(&resolved.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(missing()),
            Err(e) => return Err(StoryError::Io(e.to_string())),
        };
        Ok(MediaFile {
            bytes,
            // The requested name decides the type, even for a substituted placeholder.
            content_type: content_type_for(asset.file_name()),
            placeholder: resolved.placeholder,
        })
    }
}

/// Sorted subdirectory names of `root` that are valid story ids.
pub async fn story_folders(root: &Path) -> Result<Vec<StoryId>, StoryError> {
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoryError::CatalogUnavailable(e.to_string())),
    };
    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| StoryError::CatalogUnavailable(e.to_string()))?
    {
        let is_dir = entry
            .file_type()
            .await
            .map(|kind| kind.is_dir())
            .unwrap_or(false);
        if !is_dir {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if let Ok(id) = StoryId::parse(name) {
                names.push(id);
            }
        }
    }
    names.sort();
    Ok(names)
}

pub async fn read_manifest_at(path: &Path, story_id: &StoryId) -> Result<StoryManifest, StoryError> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(StoryError::ManifestNotFound(story_id.clone()))
        }
        Err(e) => return Err(StoryError::Io(e.to_string())),
    };
    StoryManifest::from_json(story_id, &raw)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
