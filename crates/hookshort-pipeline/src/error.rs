//! Pipeline error types.

use std::fmt;
use thiserror::Error;

use hookshort_media::{HookError, MediaError};
use hookshort_models::{UnknownPlatform, UnsupportedFormat};

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Pipeline stage an error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validation,
    Extraction,
    Composition,
    Effects,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Validation => "validation",
            Stage::Extraction => "extraction",
            Stage::Composition => "composition",
            Stage::Effects => "effects",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong.
#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error(transparent)]
    UnsupportedFormat(#[from] UnsupportedFormat),

    #[error(transparent)]
    UnknownPlatform(#[from] UnknownPlatform),

    #[error("{0}")]
    NoClearHookFound(String),

    #[error("{0}")]
    SourceMediaUnreadable(String),

    #[error("hook audio is {audio_secs:.2}s but the video needs {video_secs:.2}s")]
    AudioVideoDurationMismatch { audio_secs: f64, video_secs: f64 },

    #[error("{0}")]
    EffectParameterInvalid(String),

    #[error("{0}")]
    ExternalToolUnavailable(String),

    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Render(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::UnsupportedFormat(_) => "UnsupportedFormat",
            ErrorKind::UnknownPlatform(_) => "UnknownPlatform",
            ErrorKind::NoClearHookFound(_) => "NoClearHookFound",
            ErrorKind::SourceMediaUnreadable(_) => "SourceMediaUnreadable",
            ErrorKind::AudioVideoDurationMismatch { .. } => "AudioVideoDurationMismatch",
            ErrorKind::EffectParameterInvalid(_) => "EffectParameterInvalid",
            ErrorKind::ExternalToolUnavailable(_) => "ExternalToolUnavailable",
            ErrorKind::InvalidRequest(_) => "InvalidRequest",
            ErrorKind::Render(_) => "RenderFailed",
            ErrorKind::Io(_) => "Io",
        }
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorKind::UnsupportedFormat(_) => 2,
            ErrorKind::UnknownPlatform(_) => 3,
            ErrorKind::NoClearHookFound(_) => 4,
            ErrorKind::SourceMediaUnreadable(_) => 5,
            ErrorKind::AudioVideoDurationMismatch { .. } => 6,
            ErrorKind::EffectParameterInvalid(_) => 7,
            ErrorKind::ExternalToolUnavailable(_) => 8,
            ErrorKind::InvalidRequest(_) | ErrorKind::Render(_) | ErrorKind::Io(_) => 1,
        }
    }
}

impl From<MediaError> for ErrorKind {
    fn from(e: MediaError) -> Self {
        match e {
            MediaError::FfmpegNotFound | MediaError::FfprobeNotFound => {
                ErrorKind::ExternalToolUnavailable(e.to_string())
            }
            MediaError::DurationMismatch {
                audio_secs,
                video_secs,
            } => ErrorKind::AudioVideoDurationMismatch {
                audio_secs,
                video_secs,
            },
            MediaError::InvalidEffect(msg) => ErrorKind::EffectParameterInvalid(msg),
            MediaError::InvalidComposition(msg) => ErrorKind::InvalidRequest(msg),
            MediaError::Io(io) => ErrorKind::Io(io),
            MediaError::FfmpegFailed {
                message,
                stderr: Some(stderr),
                ..
            } => ErrorKind::Render(format!("{}\n{}", message, stderr)),
            e if e.is_source_unreadable() => ErrorKind::SourceMediaUnreadable(e.to_string()),
            e => ErrorKind::Render(e.to_string()),
        }
    }
}

impl From<HookError> for ErrorKind {
    fn from(e: HookError) -> Self {
        match e {
            HookError::NoClearHookFound(msg) => ErrorKind::NoClearHookFound(msg),
            HookError::InvalidLength(_) => ErrorKind::InvalidRequest(e.to_string()),
        }
    }
}

/// Error surfaced by the pipeline, tagged with its stage.
#[derive(Debug, Error)]
#[error("[{}] {}: {}", .stage, .kind.name(), .kind)]
pub struct PipelineError {
    pub stage: Stage,
    #[source]
    pub kind: ErrorKind,
}

impl PipelineError {
    pub fn new(stage: Stage, kind: impl Into<ErrorKind>) -> Self {
        Self {
            stage,
            kind: kind.into(),
        }
    }

    pub fn validation(kind: impl Into<ErrorKind>) -> Self {
        Self::new(Stage::Validation, kind)
    }

    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }
}

/// Attach a stage to any error convertible into [`ErrorKind`].
pub trait StageExt<T> {
    fn at_stage(self, stage: Stage) -> PipelineResult<T>;
}

impl<T, E: Into<ErrorKind>> StageExt<T> for Result<T, E> {
    fn at_stage(self, stage: Stage) -> PipelineResult<T> {
        self.map_err(|e| PipelineError::new(stage, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names_stage_and_kind() {
        let err = PipelineError::new(
            Stage::Extraction,
            ErrorKind::NoClearHookFound("track has no usable duration (0)".to_string()),
        );
        assert_eq!(
            err.to_string(),
            "[extraction] NoClearHookFound: track has no usable duration (0)"
        );
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_media_error_classification() {
        let kind = ErrorKind::from(MediaError::FfmpegNotFound);
        assert_eq!(kind.name(), "ExternalToolUnavailable");
        assert_eq!(kind.exit_code(), 8);

        let kind = ErrorKind::from(MediaError::FileNotFound("bg.mp4".into()));
        assert_eq!(kind.name(), "SourceMediaUnreadable");

        let kind = ErrorKind::from(MediaError::DurationMismatch {
            audio_secs: 12.0,
            video_secs: 30.0,
        });
        assert_eq!(kind.exit_code(), 6);

        let kind = ErrorKind::from(MediaError::invalid_effect("speed 0"));
        assert_eq!(kind.exit_code(), 7);

        let kind = ErrorKind::from(MediaError::ffmpeg_failed("exit 1", Some("moov atom".into()), Some(1)));
        assert_eq!(kind.name(), "RenderFailed");
        assert!(kind.to_string().contains("moov atom"));
        assert_eq!(kind.exit_code(), 1);
    }

    #[test]
    fn test_exit_codes_are_distinct_per_kind() {
        let unsupported = ErrorKind::UnsupportedFormat(UnsupportedFormat {
            path: "a.txt".into(),
            extension: "txt".into(),
            allowed: "mp3".into(),
        });
        let unknown = ErrorKind::UnknownPlatform(UnknownPlatform {
            platform: "bogus".into(),
            known: "tiktok".into(),
        });
        assert_eq!(unsupported.exit_code(), 2);
        assert_eq!(unknown.exit_code(), 3);
    }

    #[test]
    fn test_at_stage() {
        let result: Result<(), HookError> = Err(HookError::InvalidLength(-1.0));
        let err = result.at_stage(Stage::Extraction).unwrap_err();
        assert_eq!(err.stage, Stage::Extraction);
        assert_eq!(err.kind.name(), "InvalidRequest");
    }
}
