use client_core::{view::format_timestamp, Phase, PresentationView};
use shared::domain::StoryDescriptor;

pub fn render(view: &PresentationView) -> String {
    let mut lines = Vec::new();
    let title = view.title.as_deref().unwrap_or("Bedtime stories");

    match view.phase {
        Phase::Idle => lines.push("starting...".to_string()),
        Phase::CatalogLoading => lines.push("loading stories...".to_string()),
        Phase::StoryLoading if view.slide.is_none() => lines.push(format!("loading {title}...")),
        _ => {
            let state = if view.playing { "playing" } else { "paused" };
            let transport = if view.transport_enabled {
                format!(
                    "{} / {} {state}",
                    format_timestamp(view.position),
                    view.duration
                        .map(format_timestamp)
                        .unwrap_or_else(|| "--:--".into()),
                )
            } else {
                "audio unavailable".to_string()
            };
            match &view.slide {
                Some(slide) => {
                    lines.push(format!(
                        "[{title}] slide {}/{}  {transport}  {}",
                        slide.number(),
                        slide.total,
                        progress_bar(view.progress(), 20)
                    ));
                    lines.push(format!("  {}", slide.text));
                    let marker = if slide.image_failed { " (missing)" } else { "" };
                    lines.push(format!("  picture: {}{marker}", slide.image_url));
                }
                None if matches!(view.phase, Phase::Ready) => {
                    lines.push(format!("[{title}] {transport}"));
                }
                None => lines.push(format!("[{title}]")),
            }
        }
    }
    if view.loading && view.slide.is_some() {
        lines.push("  loading next story...".to_string());
    }
    if let Some(message) = &view.message {
        lines.push(format!("  ! {message}"));
    }
    lines.join("\n")
}

pub fn render_catalog(stories: &[StoryDescriptor], current: Option<usize>) -> String {
    if stories.is_empty() {
        return "no stories loaded".to_string();
    }
    stories
        .iter()
        .enumerate()
        .map(|(index, story)| {
            let marker = if Some(index) == current { '*' } else { ' ' };
            format!("{marker} {:>2}. {} ({})", index + 1, story.title, story.id)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn progress_bar(fraction: f64, width: usize) -> String {
    let filled = ((fraction.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(width - filled))
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
