//! Video encoding configuration.

use serde::{Deserialize, Serialize};

use crate::preset::PlatformPreset;

/// Default video codec (H.264)
pub const DEFAULT_VIDEO_CODEC: &str = "libx264";
/// Default audio codec
pub const DEFAULT_AUDIO_CODEC: &str = "aac";
/// Default encoding preset
pub const DEFAULT_PRESET: &str = "medium";
/// Default pixel format (widest player support)
pub const DEFAULT_PIXEL_FORMAT: &str = "yuv420p";
/// Sample rate of intermediate hook audio
pub const HOOK_AUDIO_SAMPLE_RATE: u32 = 44100;

/// Video encoding configuration.
///
/// Bitrates are not stored here; they come from the platform preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264", "h264_nvenc")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Encoding preset (e.g., "fast", "medium", "slow")
    #[serde(default = "default_preset")]
    pub preset: String,

    /// Audio codec for video outputs
    #[serde(default = "default_audio_codec")]
    pub audio_codec: String,

    /// Output pixel format
    #[serde(default = "default_pixel_format")]
    pub pixel_format: String,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Abort any single FFmpeg run after this many seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_video_codec() -> String {
    DEFAULT_VIDEO_CODEC.to_string()
}
fn default_preset() -> String {
    DEFAULT_PRESET.to_string()
}
fn default_audio_codec() -> String {
    DEFAULT_AUDIO_CODEC.to_string()
}
fn default_pixel_format() -> String {
    DEFAULT_PIXEL_FORMAT.to_string()
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: DEFAULT_VIDEO_CODEC.to_string(),
            preset: DEFAULT_PRESET.to_string(),
            audio_codec: DEFAULT_AUDIO_CODEC.to_string(),
            pixel_format: DEFAULT_PIXEL_FORMAT.to_string(),
            extra_args: Vec::new(),
            timeout_secs: None,
        }
    }
}

impl EncodingConfig {
    /// Video encoder arguments for a platform preset.
    pub fn video_args(&self, preset: &PlatformPreset) -> Vec<String> {
        let mut args = vec![
            "-c:v".to_string(),
            self.codec.clone(),
            "-preset".to_string(),
            self.preset.clone(),
            "-b:v".to_string(),
            preset.video_bitrate.clone(),
            "-maxrate".to_string(),
            preset.video_bitrate.clone(),
        ];

        // Rate control buffer of two seconds at the target bitrate
        if let Some(bufsize) = scale_bitrate(&preset.video_bitrate, 2) {
            args.extend_from_slice(&["-bufsize".to_string(), bufsize]);
        }

        args.extend_from_slice(&[
            "-r".to_string(),
            preset.fps.to_string(),
            "-pix_fmt".to_string(),
            self.pixel_format.clone(),
        ]);
        args
    }

    /// Audio encoder arguments for a platform preset.
    pub fn audio_args(&self, preset: &PlatformPreset) -> Vec<String> {
        vec![
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            preset.audio_bitrate.clone(),
        ]
    }

    /// Container flags followed by any extra arguments.
    pub fn container_args(&self) -> Vec<String> {
        let mut args = vec!["-movflags".to_string(), "+faststart".to_string()];
        args.extend(self.extra_args.clone());
        args
    }

    /// Full output arguments: re-encode video and audio.
    pub fn to_ffmpeg_args(&self, preset: &PlatformPreset) -> Vec<String> {
        let mut args = self.video_args(preset);
        args.extend(self.audio_args(preset));
        args.extend(self.container_args());
        args
    }

    /// Output arguments that re-encode video and copy the audio stream.
    pub fn video_only_args(&self, preset: &PlatformPreset) -> Vec<String> {
        let mut args = self.video_args(preset);
        args.extend(["-c:a".to_string(), "copy".to_string()]);
        args.extend(self.container_args());
        args
    }
}

/// Multiply a bitrate written in FFmpeg notation ("5000k", "8M", "128000").
fn scale_bitrate(bitrate: &str, factor: u64) -> Option<String> {
    let bitrate = bitrate.trim();
    let (digits, suffix) = match bitrate.char_indices().last()? {
        (i, c) if c.is_ascii_alphabetic() => (&bitrate[..i], &bitrate[i..]),
        _ => (bitrate, ""),
    };
    let value: u64 = digits.parse().ok()?;
    Some(format!("{}{}", value * factor, suffix))
}

/// Audio codec to use when writing a hook with the given extension.
pub fn audio_codec_for_extension(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "mp3" => "libmp3lame",
        "wav" => "pcm_s16le",
        "flac" => "flac",
        "ogg" => "libvorbis",
        "wma" => "wmav2",
        // m4a, aac and anything else
        _ => "aac",
    }
}
