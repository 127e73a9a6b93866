//! FFmpeg CLI wrapper and media planning for hookshort.
//!
//! This crate provides:
//! - FFmpeg command building and execution with progress parsing
//! - FFprobe media inspection
//! - `Decoder`, `Encoder` and `ChorusDetector` capability traits with one
//!   FFmpeg/DSP backend each
//! - Hook window selection
//! - Composition and effect render planning
//! - Partial-output handling for final files

pub mod audio;
pub mod chorus;
pub mod command;
pub mod compose;
pub mod decoder;
pub mod effects;
pub mod encoder;
pub mod error;
pub mod filters;
pub mod fs_utils;
pub mod hook;
pub mod probe;
pub mod progress;
pub mod render;

pub use audio::AudioTrack;
pub use chorus::{ChorusDetector, DetectorError, RepetitionDetector};
pub use command::{FfmpegCommand, FfmpegInput, FfmpegRunner};
pub use compose::{plan_composition, VideoComposer};
pub use decoder::{Decoder, FfmpegDecoder};
pub use effects::{plan_effect, EffectContext, EffectPlan, EffectsProcessor};
pub use encoder::{Encoder, FfmpegEncoder};
pub use error::{MediaError, MediaResult};
pub use fs_utils::{move_file, PartialOutput};
pub use hook::{extract_hook, plan_hook_audio, select_window, HookError};
pub use probe::{probe_media, AudioStreamInfo, MediaInfo, VideoStreamInfo};
pub use progress::FfmpegProgress;
pub use render::{RenderPlan, VideoProps};
