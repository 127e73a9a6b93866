//! Composition job definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

use crate::preset::PlatformPreset;

/// Visual track of a composed short.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "snake_case")]
pub enum VisualSource {
    /// Held for the full duration
    StillImage(PathBuf),
    /// Trimmed or looped to the full duration
    BackgroundVideo(PathBuf),
}

impl VisualSource {
    pub fn path(&self) -> &Path {
        match self {
            VisualSource::StillImage(p) | VisualSource::BackgroundVideo(p) => p,
        }
    }

    pub fn is_still_image(&self) -> bool {
        matches!(self, VisualSource::StillImage(_))
    }
}

/// What to do when the hook audio is shorter than the video duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchPolicy {
    /// Pad the audio with trailing silence
    #[default]
    PadSilence,
    /// Loop the audio from the start
    LoopAudio,
    /// Abort composition
    Fail,
}

impl MismatchPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MismatchPolicy::PadSilence => "pad_silence",
            MismatchPolicy::LoopAudio => "loop_audio",
            MismatchPolicy::Fail => "fail",
        }
    }
}

impl fmt::Display for MismatchPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown mismatch policy: {0}")]
pub struct MismatchPolicyParseError(String);

impl FromStr for MismatchPolicy {
    type Err = MismatchPolicyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "pad_silence" | "pad" => Ok(MismatchPolicy::PadSilence),
            "loop_audio" | "loop" => Ok(MismatchPolicy::LoopAudio),
            "fail" => Ok(MismatchPolicy::Fail),
            _ => Err(MismatchPolicyParseError(s.to_string())),
        }
    }
}

/// Fade applied during composition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FadeConfig {
    pub fade_in_secs: f64,
    pub fade_out_secs: f64,
}

impl Default for FadeConfig {
    fn default() -> Self {
        Self {
            fade_in_secs: 0.5,
            fade_out_secs: 0.5,
        }
    }
}

impl FadeConfig {
    /// Shrink the fades proportionally so that together they span at most
    /// half of `duration`.
    pub fn fit_within(self, duration: f64) -> Self {
        let total = self.fade_in_secs + self.fade_out_secs;
        let budget = duration / 2.0;
        if total <= budget || total <= 0.0 {
            return self;
        }
        let ratio = budget / total;
        Self {
            fade_in_secs: self.fade_in_secs * ratio,
            fade_out_secs: self.fade_out_secs * ratio,
        }
    }
}

/// One composition request, consumed by the video composer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionJob {
    pub visual: VisualSource,
    pub hook_audio_path: PathBuf,
    pub preset: PlatformPreset,
    pub output_path: PathBuf,
    /// Target duration in seconds (the hook length)
    pub duration: f64,
    #[serde(default)]
    pub fade: FadeConfig,
    #[serde(default)]
    pub mismatch_policy: MismatchPolicy,
}

impl CompositionJob {
    /// Validate the job.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(format!("Composition duration {} must be positive", self.duration));
        }
        let fades = self.fade.fade_in_secs + self.fade.fade_out_secs;
        if self.fade.fade_in_secs < 0.0 || self.fade.fade_out_secs < 0.0 {
            return Err("Fade durations must be non-negative".to_string());
        }
        if fades > self.duration {
            return Err(format!(
                "Fades ({:.2}s) exceed composition duration ({:.2}s)",
                fades, self.duration
            ));
        }
        self.preset.validate()
    }
}
