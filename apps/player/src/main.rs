use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use client_core::{
    EndedPolicy, HttpStorySource, LocalStorySource, Phase, SimulatedAudio, Slideshow,
    SlideshowConfig, SlideshowUpdate, StorySource,
};
use shared::domain::StoryId;
use storage::{LibraryConfig, StoryLibrary};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::{broadcast::error::TryRecvError, mpsc},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod render;

use commands::{PlayerCommand, HELP};

#[derive(Parser, Debug)]
#[command(about = "Narrated bedtime-story slideshow for the terminal")]
struct Args {
    /// Story server to stream from, e.g. http://127.0.0.1:3000
    #[arg(long, conflicts_with = "library")]
    server_url: Option<String>,
    /// Story root directory to read directly; repeat for fallback roots.
    #[arg(long, value_name = "DIR")]
    library: Vec<PathBuf>,
    #[arg(long, default_value_t = EndedPolicy::Reset)]
    on_ended: EndedPolicy,
    #[arg(long, default_value_t = 100)]
    poll_ms: u64,
    /// Playback speed of the simulated narration clock.
    #[arg(long, default_value_t = 1.0)]
    speed: f64,
    #[arg(long)]
    autoplay: bool,
    /// Used when RUST_LOG is unset.
    #[arg(long, default_value = "warn")]
    log_filter: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let source = story_source(&args)?;
    let mut slideshow = Slideshow::new(
        source,
        Arc::new(SimulatedAudio::new(args.speed)),
        SlideshowConfig {
            poll_interval: Duration::from_millis(args.poll_ms.max(1)),
            on_ended: args.on_ended,
            autoplay: args.autoplay,
        },
    );
    let mut updates = slideshow.subscribe();
    let mut commands = spawn_stdin_reader();

    println!("{HELP}\n");
    slideshow.load_catalog();
    println!("{}", render::render(&slideshow.view()));

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else { break };
                if command == PlayerCommand::Quit {
                    break;
                }
                if apply_command(&mut slideshow, command) {
                    println!("{}", render::render(&slideshow.view()));
                }
            }
            input = slideshow.next_input() => {
                let Some(input) = input else { break };
                slideshow.apply(input).await;
            }
        }

        let (redraw, became_ready) = drain_updates(&mut updates);
        if became_ready {
            let missing = slideshow.probe_images().await;
            if missing > 0 {
                warn!(missing, "story has missing illustrations");
            }
        }
        if redraw {
            println!("{}", render::render(&slideshow.view()));
        }
    }

    slideshow.shutdown();
    info!("player stopped");
    Ok(())
}

fn story_source(args: &Args) -> Result<Arc<dyn StorySource>> {
    if let Some(server_url) = &args.server_url {
        info!(%server_url, "streaming stories from server");
        return Ok(Arc::new(HttpStorySource::new(server_url)?));
    }
    let roots = if args.library.is_empty() {
        vec![PathBuf::from("public/output"), PathBuf::from("output")]
    } else {
        args.library.clone()
    };
    info!(?roots, "reading stories from disk");
    let library = StoryLibrary::new(LibraryConfig {
        roots,
        catalog_manifest: None,
        placeholder_image: None,
    })?;
    Ok(Arc::new(LocalStorySource::new(library)))
}

fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<PlayerCommand> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match commands::parse(&line) {
                Ok(command) => {
                    if tx.send(command).is_err() {
                        return;
                    }
                }
                Err(message) => eprintln!("{message}"),
            }
        }
        let _ = tx.send(PlayerCommand::Quit);
    });
    rx
}

/// Returns whether the screen should be redrawn.
fn apply_command(slideshow: &mut Slideshow, command: PlayerCommand) -> bool {
    match command {
        PlayerCommand::TogglePlay => slideshow.toggle_play(),
        PlayerCommand::NextStory => slideshow.next_story(),
        PlayerCommand::NextSlide => slideshow.next_slide(),
        PlayerCommand::PreviousSlide => slideshow.previous_slide(),
        PlayerCommand::GoToSlide(number) => slideshow.show_slide(number.saturating_sub(1)),
        PlayerCommand::Seek(seconds) => slideshow.seek(seconds),
        PlayerCommand::SeekFraction(fraction) => slideshow.seek_fraction(fraction),
        PlayerCommand::Open(raw) => {
            let opened = StoryId::parse(raw)
                .map_err(|error| error.to_string())
                .and_then(|id| slideshow.select_id(&id).map_err(|error| error.to_string()));
            if let Err(message) = opened {
                eprintln!("{message}");
                return false;
            }
        }
        PlayerCommand::List => {
            println!(
                "{}",
                render::render_catalog(slideshow.catalog(), slideshow.current_index())
            );
            return false;
        }
        PlayerCommand::Help => {
            println!("{HELP}");
            return false;
        }
        PlayerCommand::Status | PlayerCommand::Quit => {}
    }
    true
}

/// Returns `(redraw, became_ready)`. Progress ticks alone do not redraw.
fn drain_updates(updates: &mut tokio::sync::broadcast::Receiver<SlideshowUpdate>) -> (bool, bool) {
    let mut redraw = false;
    let mut became_ready = false;
    loop {
        match updates.try_recv() {
            Ok(SlideshowUpdate::Progress { .. }) => {}
            Ok(SlideshowUpdate::PhaseChanged(phase)) => {
                redraw = true;
                became_ready |= phase == Phase::Ready;
            }
            Ok(SlideshowUpdate::SlideChanged { .. } | SlideshowUpdate::Notice(_)) => redraw = true,
            Err(TryRecvError::Lagged(_)) => redraw = true,
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    (redraw, became_ready)
}
