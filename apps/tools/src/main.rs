use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use shared::domain::StoryId;
use storage::maintenance::{
    fill_missing_images, fix_timings, inspect_root, write_catalog, write_story_text, StoryReport,
    TimingIssue, DEFAULT_WORDS_PER_MINUTE,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Maintenance commands for story folders")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report missing files and broken timings for every story.
    Check {
        /// Story root holding one folder per story.
        #[arg(default_value = "public/output")]
        root: PathBuf,
    },
    /// Re-time manifests whose segment windows are missing or inconsistent.
    FixTimings {
        #[arg(default_value = "public/output")]
        root: PathBuf,
        /// Only this story.
        #[arg(long)]
        story: Option<String>,
        #[arg(long, default_value_t = DEFAULT_WORDS_PER_MINUTE)]
        words_per_minute: f64,
    },
    /// Write missing story.txt files and fill missing illustrations with the
    /// placeholder image.
    FixFiles {
        #[arg(default_value = "public/output")]
        root: PathBuf,
        /// Only this story.
        #[arg(long)]
        story: Option<String>,
        #[arg(long, default_value = "public/placeholder.png")]
        placeholder: PathBuf,
    },
    /// Write stories.json listing every story with a valid manifest.
    WriteCatalog {
        #[arg(default_value = "public/output")]
        root: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    match cli.command {
        Command::Check { root } => {
            let reports = inspect_root(&root).await?;
            for report in &reports {
                println!("{}", describe(report));
            }
            let unhealthy = reports.iter().filter(|r| !r.is_healthy()).count();
            println!("{} stories, {unhealthy} with problems", reports.len());
            if unhealthy > 0 {
                std::process::exit(1);
            }
        }
        Command::FixTimings {
            root,
            story,
            words_per_minute,
        } => {
            let targets = match story {
                Some(raw) => vec![StoryId::parse(raw)?],
                None => storage::story_folders(&root).await?,
            };
            let mut rewritten = 0;
            for id in targets {
                if retime(&root, &id, words_per_minute).await? {
                    println!("re-timed {id}");
                    rewritten += 1;
                }
            }
            println!("{rewritten} manifests rewritten");
        }
        Command::FixFiles {
            root,
            story,
            placeholder,
        } => {
            let targets = match story {
                Some(raw) => vec![StoryId::parse(raw)?],
                None => storage::story_folders(&root).await?,
            };
            let mut changed = 0;
            for id in targets {
                let (wrote_text, filled) = repair_files(&root, &id, &placeholder).await?;
                if wrote_text {
                    println!("wrote story.txt for {id}");
                }
                if !filled.is_empty() {
                    println!("filled {id}: {}", filled.join(", "));
                }
                if wrote_text || !filled.is_empty() {
                    changed += 1;
                }
            }
            println!("{changed} stories repaired");
        }
        Command::WriteCatalog { root } => {
            let (path, stories) = write_catalog(&root).await?;
            println!("wrote {} with {} stories", path.display(), stories.len());
        }
    }

    Ok(())
}

fn story_dir(root: &Path, id: &StoryId) -> Result<PathBuf> {
    let dir = root.join(id.as_str());
    if !dir.is_dir() {
        bail!("no story folder at {}", dir.display());
    }
    Ok(dir)
}

async fn retime(root: &Path, id: &StoryId, words_per_minute: f64) -> Result<bool> {
    fix_timings(&story_dir(root, id)?, words_per_minute).await
}

/// Returns whether `story.txt` was written and which images were filled.
async fn repair_files(root: &Path, id: &StoryId, placeholder: &Path) -> Result<(bool, Vec<String>)> {
    let dir = story_dir(root, id)?;
    let wrote_text = write_story_text(&dir).await?;
    let filled = fill_missing_images(&dir, placeholder).await?;
    Ok((wrote_text, filled))
}

fn describe(report: &StoryReport) -> String {
    if report.is_healthy() {
        return format!("ok    {}", report.story_id);
    }
    let mut problems = Vec::new();
    if !report.has_manifest {
        problems.push("no manifest".to_string());
    }
    if !report.has_audio {
        problems.push("no audio".to_string());
    }
    if let Some(error) = &report.manifest_error {
        problems.push(format!("bad manifest: {error}"));
    }
    if !report.missing_images.is_empty() {
        problems.push(format!("missing images: {}", report.missing_images.join(", ")));
    }
    problems.extend(report.timing_issues.iter().map(describe_timing));
    format!("FAIL  {}: {}", report.story_id, problems.join("; "))
}

fn describe_timing(issue: &TimingIssue) -> String {
    match issue {
        TimingIssue::MissingTiming { index } => format!("segment {index} has no timing"),
        TimingIssue::EmptyWindow { index, start, end } => {
            format!("segment {index} window [{start}, {end}) is empty")
        }
        TimingIssue::Discontinuous {
            index,
            previous_end,
            start,
        } => format!("segment {index} starts at {start} but previous ended at {previous_end}"),
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
