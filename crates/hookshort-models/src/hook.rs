//! Hook window types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Contiguous segment of a track selected as the hook.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HookWindow {
    /// Start time in seconds
    pub start_secs: f64,
    /// End time in seconds
    pub end_secs: f64,
    /// Score used to select the window (0.0 for fallbacks)
    pub score: f64,
}

impl HookWindow {
    pub fn new(start_secs: f64, end_secs: f64, score: f64) -> Self {
        Self {
            start_secs,
            end_secs,
            score,
        }
    }

    /// Duration of the window in seconds.
    pub fn duration(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

impl fmt::Display for HookWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2}s-{:.2}s (score {:.3})",
            self.start_secs, self.end_secs, self.score
        )
    }
}

/// How the hook window was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookSource {
    /// Highest-scoring chorus-detector candidate
    Detector,
    /// Midpoint heuristic (detector gave nothing usable)
    Heuristic,
    /// Track shorter than the requested length
    FullTrack,
}

impl fmt::Display for HookSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HookSource::Detector => "detector",
            HookSource::Heuristic => "heuristic",
            HookSource::FullTrack => "full_track",
        };
        f.write_str(s)
    }
}

/// Warning raised when the track is shorter than the requested hook.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShortTrackFallback {
    pub track_secs: f64,
    pub requested_secs: f64,
}

impl fmt::Display for ShortTrackFallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "track is {:.2}s, shorter than the requested {:.2}s hook; using the full track",
            self.track_secs, self.requested_secs
        )
    }
}

/// Result of hook extraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HookOutcome {
    pub window: HookWindow,
    pub source: HookSource,
    pub short_track: Option<ShortTrackFallback>,
}

/// One chorus-detector candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChorusCandidate {
    pub start_secs: f64,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_duration() {
        let w = HookWindow::new(7.5, 37.5, 0.8);
        assert!((w.duration() - 30.0).abs() < 1e-9);
        assert_eq!(w.to_string(), "7.50s-37.50s (score 0.800)");
    }

    #[test]
    fn test_short_track_message() {
        let warning = ShortTrackFallback {
            track_secs: 12.0,
            requested_secs: 30.0,
        };
        assert!(warning.to_string().contains("full track"));
    }
}
