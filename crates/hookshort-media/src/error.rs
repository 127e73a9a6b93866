//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid media file: {0}")]
    InvalidMedia(String),

    #[error("Hook audio is {audio_secs:.2}s but the video needs {video_secs:.2}s")]
    DurationMismatch { audio_secs: f64, video_secs: f64 },

    #[error("Invalid effect parameter: {0}")]
    InvalidEffect(String),

    #[error("Invalid composition: {0}")]
    InvalidComposition(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an invalid media error.
    pub fn invalid_media(message: impl Into<String>) -> Self {
        Self::InvalidMedia(message.into())
    }

    /// Create an invalid effect parameter error.
    pub fn invalid_effect(message: impl Into<String>) -> Self {
        Self::InvalidEffect(message.into())
    }

    /// Whether the error means a source file could not be read.
    pub fn is_source_unreadable(&self) -> bool {
        matches!(
            self,
            MediaError::FileNotFound(_)
                | MediaError::FfprobeFailed { .. }
                | MediaError::InvalidMedia(_)
                | MediaError::JsonParse(_)
        )
    }
}
