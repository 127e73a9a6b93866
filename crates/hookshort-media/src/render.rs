//! Render plans.
//!
//! Every render the pipeline performs (hook audio cut, composition, each
//! effect) is first described as a [`RenderPlan`]. Planning is pure and
//! unit-testable; an [`crate::Encoder`] turns the plan into an output file.

use serde::{Deserialize, Serialize};
use std::path::Path;

use hookshort_models::PlatformPreset;

use crate::command::{FfmpegCommand, FfmpegInput};

/// Properties of a rendered video, threaded through effect planning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoProps {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub duration: f64,
}

impl VideoProps {
    /// Props of a render made with `preset` lasting `duration` seconds.
    pub fn from_preset(preset: &PlatformPreset, duration: f64) -> Self {
        Self {
            width: preset.width(),
            height: preset.height(),
            fps: preset.fps,
            duration,
        }
    }
}

/// A fully specified FFmpeg invocation minus the output path.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPlan {
    /// Short label used in logs ("hook_audio", "compose", "speed_change")
    pub label: String,
    pub inputs: Vec<FfmpegInput>,
    pub filter_complex: Option<String>,
    /// `-map` specifiers, in order
    pub maps: Vec<String>,
    /// Encoder and container arguments
    pub output_args: Vec<String>,
    /// Duration the output is expected to have, in seconds
    pub expected_duration: f64,
}

impl RenderPlan {
    pub fn new(label: impl Into<String>, inputs: Vec<FfmpegInput>, expected_duration: f64) -> Self {
        Self {
            label: label.into(),
            inputs,
            filter_complex: None,
            maps: Vec::new(),
            output_args: Vec::new(),
            expected_duration,
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter_complex = Some(filter.into());
        self
    }

    pub fn with_maps<I, S>(mut self, maps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.maps.extend(maps.into_iter().map(Into::into));
        self
    }

    pub fn with_output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Build the FFmpeg command writing to `output`.
    pub fn to_command(&self, output: &Path) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::with_inputs(self.inputs.clone(), output);
        if let Some(filter) = &self.filter_complex {
            cmd = cmd.filter_complex(filter.clone());
        }
        for specifier in &self.maps {
            cmd = cmd.map(specifier.clone());
        }
        cmd.output_args(self.output_args.iter().cloned())
    }

    /// Whether `flag` is immediately followed by `value` in the output args.
    pub fn has_output_pair(&self, flag: &str, value: &str) -> bool {
        self.output_args
            .windows(2)
            .any(|pair| pair[0] == flag && pair[1] == value)
    }
}
