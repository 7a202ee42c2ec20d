use std::{collections::HashMap, fs, path::PathBuf};

use serde::Deserialize;
use storage::LibraryConfig;
pub const CONFIG_FILE: &str = "server.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub story_roots: Vec<String>,
    pub catalog_manifest: Option<String>,
    pub placeholder_image: Option<String>,
    pub media_cache_seconds: u32,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:3000".into(),
            story_roots: vec!["public/output".into(), "output".into()],
            catalog_manifest: None,
            placeholder_image: Some("public/placeholder.png".into()),
            media_cache_seconds: 86_400,
            log_filter: "info".into(),
        }
    }
}

impl Settings {
    pub fn library_config(&self) -> LibraryConfig {
        LibraryConfig {
            roots: self.story_roots.iter().map(PathBuf::from).collect(),
            catalog_manifest: self.catalog_manifest.as_ref().map(PathBuf::from),
            placeholder_image: self.placeholder_image.as_ref().map(PathBuf::from),
        }
    }
}

/// Settings plus the problems met while layering them. Loading runs before
/// logging is set up, so the caller reports the warnings afterwards.
pub fn load_settings() -> (Settings, Vec<String>) {
    let file = fs::read_to_string(CONFIG_FILE).ok();
    load_settings_from(file.as_deref(), |key| std::env::var(key).ok())
}

/// Defaults, then `server.toml`, then environment; later layers win.
pub fn load_settings_from(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> (Settings, Vec<String>) {
    let mut settings = Settings::default();
    let mut warnings = Vec::new();

    if let Some(raw) = file {
        match toml::from_str::<HashMap<String, String>>(raw) {
            Ok(file_cfg) => apply(&mut settings, &mut warnings, |key| {
                file_cfg.get(key).cloned()
            }),
            Err(error) => {
                warnings.push(format!("ignoring unreadable {CONFIG_FILE}: {error}"))
            }
        }
    }

    apply(&mut settings, &mut warnings, |key| {
        env(&key.to_ascii_uppercase())
    });
    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("RUST_LOG") {
        settings.log_filter = v;
    }
    apply(&mut settings, &mut warnings, |key| {
        env(&format!("APP__{}", key.to_ascii_uppercase()))
    });

    (settings, warnings)
}

fn apply(
    settings: &mut Settings,
    warnings: &mut Vec<String>,
    lookup: impl Fn(&str) -> Option<String>,
) {
    if let Some(v) = lookup("bind_addr") {
        settings.server_bind = v;
    }
    if let Some(v) = lookup("story_roots") {
        let roots = split_roots(&v);
        if !roots.is_empty() {
            settings.story_roots = roots;
        }
    }
    if let Some(v) = lookup("catalog_manifest") {
        settings.catalog_manifest = non_empty(v);
    }
    if let Some(v) = lookup("placeholder_image") {
        settings.placeholder_image = non_empty(v);
    }
    if let Some(v) = lookup("media_cache_seconds") {
        match v.trim().parse::<u32>() {
            Ok(parsed) => settings.media_cache_seconds = parsed,
            Err(_) => warnings.push(format!("ignoring invalid media_cache_seconds `{v}`")),
        }
    }
    if let Some(v) = lookup("log_filter") {
        settings.log_filter = v;
    }
}

fn split_roots(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|root| !root.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
