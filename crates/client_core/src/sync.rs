//! Maps a playback position to the slide that should be on screen.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use shared::domain::Segment;

/// What happens when narration reaches its end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EndedPolicy {
    /// Stop, rewind to zero and show the first slide.
    #[default]
    Reset,
    /// Stop and keep the last slide on screen.
    HoldLast,
    /// Rewind to zero and keep playing.
    Loop,
}

impl FromStr for EndedPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().replace('_', "-").as_str() {
            "reset" => Ok(Self::Reset),
            "hold-last" | "holdlast" => Ok(Self::HoldLast),
            "loop" => Ok(Self::Loop),
            other => Err(format!(
                "unknown ended policy `{other}` (expected reset, hold-last or loop)"
            )),
        }
    }
}

impl fmt::Display for EndedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reset => "reset",
            Self::HoldLast => "hold-last",
            Self::Loop => "loop",
        })
    }
}

/// First segment whose `[start, end)` window holds `seconds`. Overlaps go to the
/// earliest index; a miss keeps `previous` when it is still a valid index.
pub fn resolve(seconds: f64, segments: &[Segment], previous: Option<usize>) -> Option<usize> {
    if !seconds.is_finite() {
        return previous.filter(|index| *index < segments.len());
    }
    segments
        .iter()
        .position(|segment| segment.contains(seconds))
        .or_else(|| previous.filter(|index| *index < segments.len()))
}

/// Seek resolution: an exact hit as in [`resolve`], otherwise the segment
/// nearest to `seconds`, ties going to the earlier one.
pub fn resolve_seek(seconds: f64, segments: &[Segment]) -> Option<usize> {
    if let Some(hit) = resolve(seconds, segments, None) {
        return Some(hit);
    }
    if !seconds.is_finite() {
        return (!segments.is_empty()).then_some(0);
    }
    segments
        .iter()
        .enumerate()
        .fold(None::<(usize, f64)>, |best, (index, segment)| {
            let distance = segment.distance_to(seconds);
            match best {
                Some((_, best_distance)) if best_distance <= distance => best,
                _ => Some((index, distance)),
            }
        })
        .map(|(index, _)| index)
}

/// Where the transport and the slide land after narration ends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndedOutcome {
    pub index: Option<usize>,
    pub position: f64,
    pub keep_playing: bool,
}

pub fn ended_outcome(
    policy: EndedPolicy,
    segments: &[Segment],
    duration: Option<f64>,
) -> EndedOutcome {
    let first = (!segments.is_empty()).then_some(0);
    match policy {
        EndedPolicy::Reset => EndedOutcome {
            index: first,
            position: 0.0,
            keep_playing: false,
        },
        EndedPolicy::Loop => EndedOutcome {
            index: first,
            position: 0.0,
            keep_playing: true,
        },
        EndedPolicy::HoldLast => EndedOutcome {
            index: segments.len().checked_sub(1),
            position: duration
                .or_else(|| segments.last().map(|segment| segment.end))
                .unwrap_or(0.0),
            keep_playing: false,
        },
    }
}

/// Active-slide tracker for the loaded story.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncEngine {
    active: Option<usize>,
}

impl SyncEngine {
    /// Starts on the first slide, or nothing for an empty story.
    pub fn starting(segments: &[Segment]) -> Self {
        Self {
            active: (!segments.is_empty()).then_some(0),
        }
    }

    pub fn active(&self) -> Option<usize> {
        self.active
    }

    /// Applies a clock tick. Returns the new index when the slide changed.
    pub fn advance(&mut self, seconds: f64, segments: &[Segment]) -> Option<usize> {
        self.apply(resolve(seconds, segments, self.active))
    }

    /// Applies a user seek. Returns the new index when the slide changed.
    pub fn seek(&mut self, seconds: f64, segments: &[Segment]) -> Option<usize> {
        let next = resolve_seek(seconds, segments).or(self.active);
        self.apply(next)
    }

    /// Forces a specific slide, ignoring out-of-range indices.
    pub fn show(&mut self, index: usize, segments: &[Segment]) -> Option<usize> {
        if index >= segments.len() {
            return None;
        }
        self.apply(Some(index))
    }

    fn apply(&mut self, next: Option<usize>) -> Option<usize> {
        if next == self.active {
            return None;
        }
        self.active = next;
        next
    }
}

#[cfg(test)]
#[path = "tests/sync_tests.rs"]
mod tests;
