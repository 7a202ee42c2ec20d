//! Story folder checks and repairs used by the `tools` binary.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use shared::{
    domain::{StoryId, AUDIO_FILE, CATALOG_FILE, SEGMENTS_FILE},
    protocol::CatalogManifest,
};
use tracing::info;

use crate::{read_manifest_at, resolver::is_numbered_image, story_folders};

pub const DEFAULT_WORDS_PER_MINUTE: f64 = 150.0;
pub const STORY_TEXT_FILE: &str = "story.txt";
pub const MIN_ESTIMATED_SECONDS: f64 = 30.0;
const TIMING_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub enum TimingIssue {
    MissingTiming { index: usize },
    EmptyWindow { index: usize, start: f64, end: f64 },
    Discontinuous { index: usize, previous_end: f64, start: f64 },
}

#[derive(Debug, Clone, Default)]
pub struct StoryReport {
    pub story_id: String,
    pub has_manifest: bool,
    pub has_audio: bool,
    pub manifest_error: Option<String>,
    pub missing_images: Vec<String>,
    pub timing_issues: Vec<TimingIssue>,
}

impl StoryReport {
    pub fn is_healthy(&self) -> bool {
        self.has_manifest
            && self.has_audio
            && self.manifest_error.is_none()
            && self.missing_images.is_empty()
            && self.timing_issues.is_empty()
    }
}

fn timing_of(segment: &Value) -> Option<(f64, f64)> {
    let start = segment.get("start")?.as_f64()?;
    let end = segment.get("end")?.as_f64()?;
    Some((start, end))
}

pub fn timing_issues(segments: &[Value]) -> Vec<TimingIssue> {
    let mut issues = Vec::new();
    let mut previous_end: Option<f64> = None;
    for (index, segment) in segments.iter().enumerate() {
        let Some((start, end)) = timing_of(segment) else {
            issues.push(TimingIssue::MissingTiming { index });
            previous_end = None;
            continue;
        };
        if end <= start {
            issues.push(TimingIssue::EmptyWindow { index, start, end });
        }
        if let Some(previous_end) = previous_end {
            if (start - previous_end).abs() > TIMING_EPSILON {
                issues.push(TimingIssue::Discontinuous {
                    index,
                    previous_end,
                    start,
                });
            }
        }
        previous_end = Some(end);
    }
    issues
}

pub fn estimate_duration(words: usize, words_per_minute: f64) -> f64 {
    let wpm = if words_per_minute > 0.0 {
        words_per_minute
    } else {
        DEFAULT_WORDS_PER_MINUTE
    };
    (words as f64 / wpm * 60.0).max(MIN_ESTIMATED_SECONDS)
}

/// Spreads the segments evenly over the estimated narration length.
/// Returns the estimated duration.
pub fn retime_evenly(segments: &mut [Value], words_per_minute: f64) -> f64 {
    let words = segments
        .iter()
        .filter_map(|segment| segment.get("text").and_then(Value::as_str))
        .map(|text| text.split_whitespace().count())
        .sum();
    let duration = estimate_duration(words, words_per_minute);
    if segments.is_empty() {
        return duration;
    }
    let slot = duration / segments.len() as f64;
    for (index, segment) in segments.iter_mut().enumerate() {
        if let Some(object) = segment.as_object_mut() {
            object.insert("start".into(), Value::from(index as f64 * slot));
            object.insert("end".into(), Value::from((index + 1) as f64 * slot));
        }
    }
    duration
}

fn segments_mut(document: &mut Value) -> Option<&mut Vec<Value>> {
    match document {
        Value::Array(segments) => Some(segments),
        Value::Object(object) => object.get_mut("segments").and_then(Value::as_array_mut),
        _ => None,
    }
}

pub async fn inspect_story(story_dir: &Path) -> StoryReport {
    let story_id = story_dir
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut report = StoryReport {
        story_id,
        has_audio: is_file(&story_dir.join(AUDIO_FILE)).await,
        ..StoryReport::default()
    };

    let manifest_path = story_dir.join(SEGMENTS_FILE);
    let raw = match tokio::fs::read(&manifest_path).await {
        Ok(raw) => raw,
        Err(_) => return report,
    };
    report.has_manifest = true;

    let mut document: Value = match serde_json::from_slice(&raw) {
        Ok(document) => document,
        Err(e) => {
            report.manifest_error = Some(e.to_string());
            return report;
        }
    };
    let Some(segments) = segments_mut(&mut document) else {
        report.manifest_error = Some("missing `segments`".into());
        return report;
    };

    report.timing_issues = timing_issues(segments);
    for segment in segments.iter() {
        if let Some(image) = segment.get("image").and_then(Value::as_str) {
            let already_listed = report.missing_images.iter().any(|m| m == image);
            if !already_listed && !is_file(&story_dir.join(image)).await {
                report.missing_images.push(image.to_string());
            }
        }
    }
    report
}

pub async fn inspect_root(root: &Path) -> Result<Vec<StoryReport>> {
    let mut reports = Vec::new();
    for id in story_folders(root).await? {
        reports.push(inspect_story(&root.join(id.as_str())).await);
    }
    Ok(reports)
}

/// Re-times the manifest when it has timing issues. Returns whether it was rewritten.
pub async fn fix_timings(story_dir: &Path, words_per_minute: f64) -> Result<bool> {
    let manifest_path = story_dir.join(SEGMENTS_FILE);
    let mut document = read_manifest_document(story_dir).await?;
    let segments = segments_mut(&mut document)
        .with_context(|| format!("missing `segments` in {}", manifest_path.display()))?;

    if segments.is_empty() || timing_issues(segments).is_empty() {
        return Ok(false);
    }
    let duration = retime_evenly(segments, words_per_minute);
    let rendered = serde_json::to_string_pretty(&document)?;
    tokio::fs::write(&manifest_path, rendered)
        .await
        .with_context(|| format!("failed to write {}", manifest_path.display()))?;
    info!(
        story = %story_dir.display(),
        estimated_seconds = duration,
        "rewrote segment timings"
    );
    Ok(true)
}

/// Segment texts in manifest order, separated by blank lines.
pub fn story_text(segments: &[Value]) -> String {
    segments
        .iter()
        .filter_map(|segment| segment.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("\n\n")
}

async fn read_manifest_document(story_dir: &Path) -> Result<Value> {
    let manifest_path = story_dir.join(SEGMENTS_FILE);
    let raw = tokio::fs::read(&manifest_path)
        .await
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    serde_json::from_slice(&raw)
        .with_context(|| format!("invalid JSON in {}", manifest_path.display()))
}

/// Writes `story.txt` from the manifest when it is missing. Returns whether it
/// was written.
pub async fn write_story_text(story_dir: &Path) -> Result<bool> {
    let path = story_dir.join(STORY_TEXT_FILE);
    if is_file(&path).await {
        return Ok(false);
    }
    let mut document = read_manifest_document(story_dir).await?;
    let segments = segments_mut(&mut document)
        .with_context(|| format!("missing `segments` in {}", story_dir.display()))?;
    tokio::fs::write(&path, story_text(segments))
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(story = %story_dir.display(), "wrote story text");
    Ok(true)
}

/// Copies `placeholder` into every `image_<n>.png` the manifest references but
/// the folder lacks. Returns the filled image names.
pub async fn fill_missing_images(story_dir: &Path, placeholder: &Path) -> Result<Vec<String>> {
    let report = inspect_story(story_dir).await;
    if let Some(error) = report.manifest_error {
        bail!("cannot read manifest in {}: {error}", story_dir.display());
    }
    let missing: Vec<String> = report
        .missing_images
        .into_iter()
        .filter(|image| is_numbered_image(image))
        .collect();
    if missing.is_empty() {
        return Ok(missing);
    }
    if !is_file(placeholder).await {
        bail!("placeholder image {} does not exist", placeholder.display());
    }
    for image in &missing {
        let target = story_dir.join(image);
        tokio::fs::copy(placeholder, &target)
            .await
            .with_context(|| format!("failed to write {}", target.display()))?;
    }
    info!(story = %story_dir.display(), images = missing.len(), "filled missing images with placeholder");
    Ok(missing)
}

/// Writes `stories.json` for every folder in `root` with a valid manifest.
pub async fn write_catalog(root: &Path) -> Result<(PathBuf, Vec<StoryId>)> {
    let mut valid = Vec::new();
    for id in story_folders(root).await? {
        if read_manifest_at(&root.join(id.as_str()).join(SEGMENTS_FILE), &id)
            .await
            .is_ok()
        {
            valid.push(id);
        }
    }
    let catalog = CatalogManifest {
        stories: valid.iter().map(|id| id.to_string()).collect(),
    };
    let path = root.join(CATALOG_FILE);
    tokio::fs::write(&path, serde_json::to_string_pretty(&catalog)?)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), stories = valid.len(), "wrote story catalog");
    Ok((path, valid))
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}
