//! Media decoding capability.

use async_trait::async_trait;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::audio::{samples_from_f32le, AudioTrack};
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::{probe_media, MediaInfo};

/// Reads media metadata and decodes audio.
#[async_trait]
pub trait Decoder: Send + Sync {
    /// Inspect streams and duration of a media file.
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo>;

    /// Decode the first audio stream to mono f32 at `sample_rate`.
    async fn decode_audio(&self, path: &Path, sample_rate: u32) -> MediaResult<AudioTrack>;
}

/// Decoder backed by the `ffprobe` and `ffmpeg` binaries.
#[derive(Debug, Default, Clone)]
pub struct FfmpegDecoder {
    runner: FfmpegRunner,
}

impl FfmpegDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_runner(runner: FfmpegRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Decoder for FfmpegDecoder {
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        probe_media(path).await
    }

    async fn decode_audio(&self, path: &Path, sample_rate: u32) -> MediaResult<AudioTrack> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }

        debug!(
            input = %path.display(),
            sample_rate,
            "Decoding audio to mono f32"
        );

        // Raw PCM goes through a temp file; removed when `raw` drops
        let raw = NamedTempFile::new()?;
        let cmd = FfmpegCommand::new(path, raw.path())
            .no_video()
            .output_args(["-ac", "1", "-ar"])
            .output_arg(sample_rate.to_string())
            .output_args(["-f", "f32le"]);

        self.runner.run(&cmd).await.map_err(|e| match e {
            MediaError::FfmpegFailed { stderr, .. } => MediaError::InvalidMedia(format!(
                "Could not decode audio from {}: {}",
                path.display(),
                stderr.unwrap_or_else(|| "no diagnostics".to_string())
            )),
            other => other,
        })?;

        let bytes = tokio::fs::read(raw.path()).await?;
        let samples = samples_from_f32le(&bytes);
        if samples.is_empty() {
            return Err(MediaError::invalid_media(format!(
                "No audio data in {}",
                path.display()
            )));
        }

        let track = AudioTrack::new(samples, sample_rate);
        debug!(
            samples = track.samples.len(),
            duration_secs = track.duration(),
            "Audio decoded"
        );
        Ok(track)
    }
}
