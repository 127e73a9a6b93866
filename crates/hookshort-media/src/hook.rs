//! Hook window selection and hook audio rendering.

use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use hookshort_models::encoding::{audio_codec_for_extension, HOOK_AUDIO_SAMPLE_RATE};
use hookshort_models::{ChorusCandidate, HookOutcome, HookSource, HookWindow, ShortTrackFallback};

use crate::audio::AudioTrack;
use crate::chorus::ChorusDetector;
use crate::command::FfmpegInput;
use crate::render::RenderPlan;

/// Slack when checking that a window fits inside the track.
const FIT_EPSILON: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("No clear hook found: {0}")]
    NoClearHookFound(String),

    #[error("Hook length must be a positive number of seconds, got {0}")]
    InvalidLength(f64),
}

/// Pick the hook window for `track`.
///
/// Tracks shorter than `length` are used whole and the outcome carries a
/// [`ShortTrackFallback`]. Otherwise the detector's best fitting candidate
/// wins, falling back to a window centred on the middle of the track.
pub fn extract_hook(
    track: &AudioTrack,
    length: f64,
    detector: Option<&dyn ChorusDetector>,
) -> Result<HookOutcome, HookError> {
    let track_secs = track.duration();

    let candidates = match detector {
        Some(detector) if track_secs >= length && length > 0.0 => {
            match detector.detect(track, length) {
                Ok(candidates) => candidates,
                Err(e) => {
                    warn!(error = %e, "Chorus detection failed, using midpoint heuristic");
                    Vec::new()
                }
            }
        }
        _ => Vec::new(),
    };

    select_window(track_secs, length, &candidates)
}

/// Choose a window of `length` seconds in a track of `track_secs`.
pub fn select_window(
    track_secs: f64,
    length: f64,
    candidates: &[ChorusCandidate],
) -> Result<HookOutcome, HookError> {
    if !(length.is_finite() && length > 0.0) {
        return Err(HookError::InvalidLength(length));
    }
    if !(track_secs.is_finite() && track_secs > 0.0) {
        return Err(HookError::NoClearHookFound(format!(
            "track has no usable duration ({})",
            track_secs
        )));
    }

    if track_secs < length {
        let warning = ShortTrackFallback {
            track_secs,
            requested_secs: length,
        };
        warn!(
            track_secs,
            requested_secs = length,
            "Track shorter than requested hook, using full track"
        );
        return Ok(HookOutcome {
            window: HookWindow::new(0.0, track_secs, 0.0),
            source: HookSource::FullTrack,
            short_track: Some(warning),
        });
    }

    let best = candidates
        .iter()
        .filter(|c| c.start_secs.is_finite() && c.score.is_finite())
        .filter(|c| c.start_secs >= 0.0 && c.start_secs + length <= track_secs + FIT_EPSILON)
        .fold(None::<&ChorusCandidate>, |best, c| match best {
            Some(b) if b.score > c.score => Some(b),
            Some(b) if b.score == c.score && b.start_secs <= c.start_secs => Some(b),
            _ => Some(c),
        });

    let outcome = match best {
        Some(c) => {
            // Clamp away epsilon overshoot so the window stays inside the track
            let start = c.start_secs.min(track_secs - length);
            HookOutcome {
                window: HookWindow::new(start, start + length, c.score),
                source: HookSource::Detector,
                short_track: None,
            }
        }
        None => {
            debug!(
                candidates = candidates.len(),
                "No fitting chorus candidate, using midpoint heuristic"
            );
            let start = (track_secs / 2.0 - length / 2.0).clamp(0.0, track_secs - length);
            HookOutcome {
                window: HookWindow::new(start, start + length, 0.0),
                source: HookSource::Heuristic,
                short_track: None,
            }
        }
    };

    info!(
        window = %outcome.window,
        source = %outcome.source,
        "Hook selected"
    );
    Ok(outcome)
}

/// Plan cutting `window` out of `input` into an audio file whose codec
/// follows `output_extension`.
pub fn plan_hook_audio(input: &Path, window: &HookWindow, output_extension: &str) -> RenderPlan {
    let cut = FfmpegInput::new(input).args([
        "-ss".to_string(),
        format!("{:.3}", window.start_secs),
        "-t".to_string(),
        format!("{:.3}", window.duration()),
    ]);

    RenderPlan::new("hook_audio", vec![cut], window.duration())
        .with_maps(["0:a:0"])
        .with_output_args([
            "-vn".to_string(),
            "-c:a".to_string(),
            audio_codec_for_extension(output_extension).to_string(),
            "-ar".to_string(),
            HOOK_AUDIO_SAMPLE_RATE.to_string(),
        ])
}
