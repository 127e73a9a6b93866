//! Pipeline configuration.
//!
//! Everything that used to be a global table (format allow-lists, presets,
//! overlay style, fade defaults) lives in one immutable struct handed to the
//! pipeline at construction. Every field has a default, so a configuration
//! file only needs to name what it changes.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::composition::{FadeConfig, MismatchPolicy};
use crate::effect::TextStyle;
use crate::encoding::EncodingConfig;
use crate::format::FormatConfig;
use crate::preset::PresetTable;

/// Default hook length in seconds.
pub const DEFAULT_HOOK_LENGTH_SECS: f64 = 30.0;
/// Default target platform.
pub const DEFAULT_PLATFORM: &str = "tiktok";

/// Tuning for the built-in repetition detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Analysis sample rate
    pub sample_rate: u32,
    /// Feature hop in seconds
    pub hop_secs: f64,
    /// Maximum number of candidates returned
    pub max_candidates: usize,
    /// Weight of loudness in the final score, in [0, 1]
    pub loudness_weight: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            hop_secs: 0.5,
            max_candidates: 5,
            loudness_weight: 0.3,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate < 1000 {
            return Err(format!("Detector sample rate {} is too low", self.sample_rate));
        }
        if !(self.hop_secs.is_finite() && self.hop_secs > 0.0) {
            return Err("Detector hop must be positive".to_string());
        }
        if self.max_candidates == 0 {
            return Err("Detector must return at least one candidate".to_string());
        }
        if !(0.0..=1.0).contains(&self.loudness_weight) {
            return Err("Detector loudness weight must be in [0, 1]".to_string());
        }
        Ok(())
    }
}

/// Complete pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub formats: FormatConfig,
    pub default_hook_length: f64,
    pub default_platform: String,
    pub presets: PresetTable,
    pub text_style: TextStyle,
    pub fade: FadeConfig,
    pub mismatch_policy: MismatchPolicy,
    pub encoding: EncodingConfig,
    pub detector: DetectorConfig,
    /// Where intermediates are written (system temp dir when unset)
    pub work_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            formats: FormatConfig::default(),
            default_hook_length: DEFAULT_HOOK_LENGTH_SECS,
            default_platform: DEFAULT_PLATFORM.to_string(),
            presets: PresetTable::default(),
            text_style: TextStyle::default(),
            fade: FadeConfig::default(),
            mismatch_policy: MismatchPolicy::default(),
            encoding: EncodingConfig::default(),
            detector: DetectorConfig::default(),
            work_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.default_hook_length.is_finite() && self.default_hook_length > 0.0) {
            return Err(format!(
                "Default hook length {} must be positive",
                self.default_hook_length
            ));
        }
        if self.formats.audio.is_empty() {
            return Err("At least one audio format must be allowed".to_string());
        }
        self.presets.validate()?;
        self.presets
            .resolve(&self.default_platform)
            .map_err(|e| format!("Default platform: {}", e))?;
        if self.text_style.font_size == 0 {
            return Err("Text style font size must be positive".to_string());
        }
        if self.fade.fade_in_secs < 0.0 || self.fade.fade_out_secs < 0.0 {
            return Err("Fade defaults must be non-negative".to_string());
        }
        self.detector.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_hook_length, 30.0);
        assert_eq!(config.mismatch_policy, MismatchPolicy::PadSilence);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = PipelineConfig::from_json(
            r#"{"default_hook_length": 15, "mismatch_policy": "loop_audio", "fade": {"fade_in_secs": 0, "fade_out_secs": 1}}"#,
        )
        .unwrap();
        assert_eq!(config.default_hook_length, 15.0);
        assert_eq!(config.mismatch_policy, MismatchPolicy::LoopAudio);
        assert_eq!(config.fade.fade_out_secs, 1.0);
        assert_eq!(config.default_platform, "tiktok");
        assert!(config.presets.resolve("reels").is_ok());
    }

    #[test]
    fn test_default_platform_must_exist() {
        let config = PipelineConfig {
            default_platform: "myspace".to_string(),
            ..Default::default()
        };
        assert!(config.validate().unwrap_err().contains("myspace"));
    }

    #[test]
    fn test_round_trip_default() {
        let json = serde_json::to_string(&PipelineConfig::default()).unwrap();
        assert_eq!(PipelineConfig::from_json(&json).unwrap(), PipelineConfig::default());
    }
}
