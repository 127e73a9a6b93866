//! Platform rendering presets.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Named bundle of rendering parameters for a target platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformPreset {
    /// Lookup key (e.g. "tiktok")
    pub id: String,
    /// Display name
    pub name: String,
    /// Output resolution as (width, height)
    pub resolution: (u32, u32),
    /// Output frame rate
    pub fps: u32,
    /// Video bitrate in FFmpeg notation (e.g. "5000k")
    pub video_bitrate: String,
    /// Audio bitrate in FFmpeg notation (e.g. "128k")
    pub audio_bitrate: String,
    #[serde(default)]
    pub description: String,
}

impl PlatformPreset {
    pub fn width(&self) -> u32 {
        self.resolution.0
    }

    pub fn height(&self) -> u32 {
        self.resolution.1
    }

    /// Validate the preset values.
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Preset id must not be empty".to_string());
        }
        let (w, h) = self.resolution;
        if w == 0 || h == 0 {
            return Err(format!("Preset '{}' has a zero dimension", self.id));
        }
        if w % 2 != 0 || h % 2 != 0 {
            // yuv420p needs even dimensions
            return Err(format!("Preset '{}' resolution {}x{} must be even", self.id, w, h));
        }
        if self.fps == 0 {
            return Err(format!("Preset '{}' fps must be positive", self.id));
        }
        if self.video_bitrate.is_empty() || self.audio_bitrate.is_empty() {
            return Err(format!("Preset '{}' bitrates must be set", self.id));
        }
        Ok(())
    }
}

/// Requested platform is not in the preset table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown platform '{platform}' (known: {known})")]
pub struct UnknownPlatform {
    pub platform: String,
    pub known: String,
}

/// Table of presets, looked up by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PresetTable(Vec<PlatformPreset>);

impl PresetTable {
    pub fn new(presets: Vec<PlatformPreset>) -> Self {
        Self(presets)
    }

    /// Resolve a platform id (case-insensitive).
    pub fn resolve(&self, platform: &str) -> Result<&PlatformPreset, UnknownPlatform> {
        let wanted = platform.trim();
        self.0
            .iter()
            .find(|p| p.id.eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownPlatform {
                platform: platform.to_string(),
                known: self.ids().join(", "),
            })
    }

    pub fn ids(&self) -> Vec<&str> {
        self.0.iter().map(|p| p.id.as_str()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlatformPreset> {
        self.0.iter()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.0.is_empty() {
            return Err("At least one platform preset is required".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        for preset in &self.0 {
            preset.validate()?;
            if !seen.insert(preset.id.to_ascii_lowercase()) {
                return Err(format!("Duplicate platform preset '{}'", preset.id));
            }
        }
        Ok(())
    }
}

fn vertical(id: &str, name: &str, video_bitrate: &str, audio_bitrate: &str, description: &str) -> PlatformPreset {
    PlatformPreset {
        id: id.to_string(),
        name: name.to_string(),
        resolution: (1080, 1920),
        fps: 30,
        video_bitrate: video_bitrate.to_string(),
        audio_bitrate: audio_bitrate.to_string(),
        description: description.to_string(),
    }
}

impl Default for PresetTable {
    fn default() -> Self {
        Self(vec![
            vertical("tiktok", "TikTok", "5000k", "128k", "TikTok vertical video (1080x1920)"),
            vertical("reels", "Instagram Reels", "5000k", "128k", "Instagram Reels vertical video (1080x1920)"),
            vertical("youtube", "YouTube Shorts", "8000k", "192k", "YouTube Shorts vertical video (1080x1920)"),
        ])
    }
}
