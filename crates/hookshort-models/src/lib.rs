//! Shared data models for the hookshort pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Supported formats and extension validation
//! - Platform presets
//! - Hook windows and extraction outcomes
//! - Composition jobs and effect requests
//! - Encoding and pipeline configuration

pub mod composition;
pub mod config;
pub mod effect;
pub mod encoding;
pub mod format;
pub mod hook;
pub mod preset;

// Re-export common types
pub use composition::{CompositionJob, FadeConfig, MismatchPolicy, VisualSource};
pub use config::{DetectorConfig, PipelineConfig};
pub use effect::{EffectRequest, Fade, Position, SpeedChange, TextOverlay, TextStyle, Watermark};
pub use encoding::EncodingConfig;
pub use format::{FormatConfig, UnsupportedFormat};
pub use hook::{ChorusCandidate, HookOutcome, HookSource, HookWindow, ShortTrackFallback};
pub use preset::{PlatformPreset, PresetTable, UnknownPlatform};
