//! Video composition.
//!
//! Combines a still image or background clip with the hook audio into a
//! video of exactly the job's duration at the preset's size and fps.

use tracing::{info, warn};

use hookshort_models::encoding::HOOK_AUDIO_SAMPLE_RATE;
use hookshort_models::{CompositionJob, EncodingConfig, MismatchPolicy, VisualSource};

use crate::command::FfmpegInput;
use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{MediaError, MediaResult};
use crate::filters::{audio_fade, cover_crop, fmt_num, video_fade};
use crate::probe::MediaInfo;
use crate::render::{RenderPlan, VideoProps};

/// Audio shorter than the target by at most this much counts as matching.
pub const DURATION_TOLERANCE_SECS: f64 = 0.05;

/// Plan the composition render.
///
/// `visual` and `audio` are the probed visual source and hook audio.
pub fn plan_composition(
    job: &CompositionJob,
    visual: &MediaInfo,
    audio: &MediaInfo,
    encoding: &EncodingConfig,
) -> MediaResult<RenderPlan> {
    job.validate().map_err(MediaError::InvalidComposition)?;
    visual.require_video(job.visual.path())?;
    audio.require_audio(&job.hook_audio_path)?;

    if !(audio.duration.is_finite() && audio.duration > 0.0) {
        return Err(MediaError::invalid_media(format!(
            "Hook audio {} has no duration",
            job.hook_audio_path.display()
        )));
    }

    let duration = job.duration;
    let preset = &job.preset;

    let visual_input = match &job.visual {
        VisualSource::StillImage(path) => {
            FfmpegInput::new(path).args(["-loop".to_string(), "1".to_string(), "-framerate".to_string(), preset.fps.to_string()])
        }
        VisualSource::BackgroundVideo(path) => {
            // Unknown or short backgrounds are looped, the output -t trims
            if visual.duration <= 0.0 || visual.duration < duration {
                FfmpegInput::new(path).args(["-stream_loop", "-1"])
            } else {
                FfmpegInput::new(path)
            }
        }
    };

    let shortfall = duration - audio.duration;
    let mut audio_input = FfmpegInput::new(&job.hook_audio_path);
    let mut audio_chain = vec![format!("aresample={}", HOOK_AUDIO_SAMPLE_RATE)];

    if shortfall > DURATION_TOLERANCE_SECS {
        match job.mismatch_policy {
            MismatchPolicy::PadSilence => {
                audio_chain.push(format!("apad=whole_dur={}", fmt_num(duration)));
            }
            MismatchPolicy::LoopAudio => {
                audio_input = audio_input.args(["-stream_loop", "-1"]);
            }
            MismatchPolicy::Fail => {
                return Err(MediaError::DurationMismatch {
                    audio_secs: audio.duration,
                    video_secs: duration,
                });
            }
        }
        warn!(
            audio_secs = audio.duration,
            video_secs = duration,
            policy = %job.mismatch_policy,
            "Hook audio shorter than video"
        );
    }

    let mut video_chain = vec![cover_crop(
        preset.width(),
        preset.height(),
        preset.fps,
        &encoding.pixel_format,
    )];
    if let Some(fade) = video_fade(job.fade.fade_in_secs, job.fade.fade_out_secs, duration) {
        video_chain.push(fade);
    }
    if let Some(fade) = audio_fade(job.fade.fade_in_secs, job.fade.fade_out_secs, duration) {
        audio_chain.push(fade);
    }

    let filter = format!(
        "[0:v]{}[v];[1:a]{}[a]",
        video_chain.join(","),
        audio_chain.join(",")
    );

    let mut output_args = vec!["-t".to_string(), format!("{:.3}", duration)];
    output_args.extend(encoding.to_ffmpeg_args(preset));

    Ok(RenderPlan::new("compose", vec![visual_input, audio_input], duration)
        .with_filter(filter)
        .with_maps(["[v]", "[a]"])
        .with_output_args(output_args))
}

/// Probes the inputs of a composition job and renders it.
pub struct VideoComposer<'a> {
    decoder: &'a dyn Decoder,
    encoder: &'a dyn Encoder,
    encoding: &'a EncodingConfig,
}

impl<'a> VideoComposer<'a> {
    pub fn new(decoder: &'a dyn Decoder, encoder: &'a dyn Encoder, encoding: &'a EncodingConfig) -> Self {
        Self {
            decoder,
            encoder,
            encoding,
        }
    }

    /// Render `job` to `job.output_path`.
    pub async fn compose(&self, job: &CompositionJob) -> MediaResult<VideoProps> {
        let visual = self.decoder.probe(job.visual.path()).await?;
        let audio = self.decoder.probe(&job.hook_audio_path).await?;

        let plan = plan_composition(job, &visual, &audio, self.encoding)?;

        info!(
            visual = %job.visual.path().display(),
            still_image = job.visual.is_still_image(),
            preset = %job.preset.id,
            duration_secs = job.duration,
            policy = %job.mismatch_policy,
            "Composing video"
        );

        self.encoder.render(&plan, &job.output_path).await?;
        Ok(VideoProps::from_preset(&job.preset, job.duration))
    }
}
