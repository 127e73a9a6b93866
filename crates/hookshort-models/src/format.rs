//! Supported file formats and extension validation.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Default audio input formats.
pub const DEFAULT_AUDIO_FORMATS: &[&str] = &["mp3", "wav", "flac", "ogg", "m4a", "aac", "wma"];

/// Default background video formats.
pub const DEFAULT_VIDEO_FORMATS: &[&str] = &["mp4", "avi", "mkv", "mov", "flv", "wmv", "webm"];

/// Containers a composed short can be written to. Renders always use
/// H.264 with AAC and `+faststart`, which only the MP4 family accepts.
pub const VIDEO_OUTPUT_FORMATS: &[&str] = &["mp4", "mov"];

/// Default still-image formats.
pub const DEFAULT_IMAGE_FORMATS: &[&str] = &["png", "jpg", "jpeg", "webp", "bmp"];

/// A file extension was not in the allowed set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unsupported format '{extension}' for {path} (supported: {allowed})")]
pub struct UnsupportedFormat {
    pub path: String,
    pub extension: String,
    pub allowed: String,
}

/// Check that `path` carries one of `allowed` extensions.
///
/// Matching is case-insensitive and ignores a leading dot in `allowed`.
/// A path without an extension is rejected.
pub fn validate<S: AsRef<str>>(path: &Path, allowed: &[S]) -> Result<(), UnsupportedFormat> {
    let extension = extension_of(path).unwrap_or_default();

    let accepted = !extension.is_empty()
        && allowed
            .iter()
            .any(|a| a.as_ref().trim_start_matches('.').eq_ignore_ascii_case(&extension));

    if accepted {
        Ok(())
    } else {
        Err(UnsupportedFormat {
            path: path.display().to_string(),
            extension,
            allowed: allowed
                .iter()
                .map(|a| a.as_ref().trim_start_matches('.'))
                .collect::<Vec<_>>()
                .join(", "),
        })
    }
}

/// Lower-cased extension of a path, if any.
pub fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Format allow-lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatConfig {
    #[serde(default = "default_audio")]
    pub audio: Vec<String>,
    #[serde(default = "default_video")]
    pub video: Vec<String>,
    #[serde(default = "default_image")]
    pub image: Vec<String>,
}

fn to_owned_list(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn default_audio() -> Vec<String> {
    to_owned_list(DEFAULT_AUDIO_FORMATS)
}
fn default_video() -> Vec<String> {
    to_owned_list(DEFAULT_VIDEO_FORMATS)
}
fn default_image() -> Vec<String> {
    to_owned_list(DEFAULT_IMAGE_FORMATS)
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            audio: default_audio(),
            video: default_video(),
            image: default_image(),
        }
    }
}

impl FormatConfig {
    pub fn validate_audio(&self, path: &Path) -> Result<(), UnsupportedFormat> {
        validate(path, self.audio.as_slice())
    }

    pub fn validate_video(&self, path: &Path) -> Result<(), UnsupportedFormat> {
        validate(path, self.video.as_slice())
    }

    pub fn validate_image(&self, path: &Path) -> Result<(), UnsupportedFormat> {
        validate(path, self.image.as_slice())
    }

    /// Configured video formats that a short can also be rendered into.
    pub fn validate_video_output(&self, path: &Path) -> Result<(), UnsupportedFormat> {
        let renderable: Vec<&str> = self
            .video
            .iter()
            .map(|v| v.trim_start_matches('.'))
            .filter(|v| VIDEO_OUTPUT_FORMATS.iter().any(|o| o.eq_ignore_ascii_case(v)))
            .collect();
        validate(path, renderable.as_slice())
    }
}
