//! Post-composition effects.
//!
//! Each [`EffectRequest`] is planned against the properties of the video it
//! will be applied to. [`EffectsProcessor`] chains the renders in the order
//! given, feeding each output into the next effect.

use std::path::{Path, PathBuf};
use tracing::info;

use hookshort_models::{EffectRequest, EncodingConfig, PlatformPreset, TextOverlay, TextStyle, Watermark};

use crate::command::FfmpegInput;
use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{MediaError, MediaResult};
use crate::filters::{atempo_chain, audio_fade, drawtext, overlay_position, setpts, video_fade, watermark_overlay};
use crate::probe::MediaInfo;
use crate::render::{RenderPlan, VideoProps};

/// Smallest font size text is shrunk to before it is rejected.
pub const MIN_FONT_SIZE: u32 = 8;
/// Rough glyph width as a fraction of the font size.
const GLYPH_WIDTH_RATIO: f64 = 0.6;
const LINE_HEIGHT_RATIO: f64 = 1.2;

/// Settings shared by every effect in a run.
#[derive(Debug, Clone, Copy)]
pub struct EffectContext<'a> {
    pub text_style: &'a TextStyle,
    pub encoding: &'a EncodingConfig,
    pub preset: &'a PlatformPreset,
    /// Scratch directory for intermediates and text files
    pub work_dir: &'a Path,
}

/// File that must exist before the plan is rendered.
#[derive(Debug, Clone, PartialEq)]
pub struct TextFile {
    pub path: PathBuf,
    pub contents: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EffectPlan {
    pub render: RenderPlan,
    /// Properties of the video the render produces
    pub props: VideoProps,
    pub text_file: Option<TextFile>,
}

/// Plan one effect applied to `input`.
///
/// `step` numbers the effect within its run and keeps scratch names
/// unique. `asset` is the probed watermark image for watermark effects.
pub fn plan_effect(
    effect: &EffectRequest,
    input: &Path,
    props: &VideoProps,
    ctx: &EffectContext<'_>,
    asset: Option<&MediaInfo>,
    step: usize,
) -> MediaResult<EffectPlan> {
    effect.validate().map_err(MediaError::InvalidEffect)?;

    match effect {
        EffectRequest::TextOverlay(text) => plan_text(text, input, props, ctx, step),
        EffectRequest::Watermark(watermark) => {
            let asset = asset.ok_or_else(|| {
                MediaError::invalid_effect(format!(
                    "Watermark {} was not probed",
                    watermark.image_path.display()
                ))
            })?;
            plan_watermark(watermark, input, props, ctx, asset)
        }
        EffectRequest::SpeedChange(speed) => {
            let duration = props.duration / speed.factor;
            let filter = format!(
                "[0:v]{}[v];[0:a]{}[a]",
                setpts(speed.factor),
                atempo_chain(speed.factor)
            );
            let render = RenderPlan::new("speed_change", vec![FfmpegInput::new(input)], duration)
                .with_filter(filter)
                .with_maps(["[v]", "[a]"])
                .with_output_args(ctx.encoding.to_ffmpeg_args(ctx.preset));
            Ok(EffectPlan {
                render,
                props: VideoProps { duration, ..*props },
                text_file: None,
            })
        }
        EffectRequest::Fade(fade) => {
            if fade.fade_in_secs + fade.fade_out_secs > props.duration {
                return Err(MediaError::invalid_effect(format!(
                    "Fades ({}s + {}s) exceed the {:.2}s video",
                    fade.fade_in_secs, fade.fade_out_secs, props.duration
                )));
            }
            let video = video_fade(fade.fade_in_secs, fade.fade_out_secs, props.duration)
                .unwrap_or_else(|| "null".to_string());
            let audio = audio_fade(fade.fade_in_secs, fade.fade_out_secs, props.duration)
                .unwrap_or_else(|| "anull".to_string());
            let render = RenderPlan::new("fade", vec![FfmpegInput::new(input)], props.duration)
                .with_filter(format!("[0:v]{}[v];[0:a]{}[a]", video, audio))
                .with_maps(["[v]", "[a]"])
                .with_output_args(ctx.encoding.to_ffmpeg_args(ctx.preset));
            Ok(EffectPlan {
                render,
                props: *props,
                text_file: None,
            })
        }
    }
}

/// Font size that fits the longest line across the frame, if any does.
fn fit_font_size(text: &str, requested: u32, margin: u32, props: &VideoProps) -> MediaResult<u32> {
    let usable_w = props.width as f64 - 2.0 * margin as f64;
    let usable_h = props.height as f64 - 2.0 * margin as f64;
    if usable_w <= 0.0 || usable_h <= 0.0 {
        return Err(MediaError::invalid_effect(format!(
            "Text margin {}px leaves no room in a {}x{} frame",
            margin, props.width, props.height
        )));
    }

    let lines: Vec<&str> = text.lines().collect();
    let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0).max(1);

    let mut size = requested;
    let width_at = |size: u32| longest as f64 * GLYPH_WIDTH_RATIO * size as f64;
    if width_at(size) > usable_w {
        size = (usable_w / (longest as f64 * GLYPH_WIDTH_RATIO)).floor() as u32;
    }
    if size < MIN_FONT_SIZE {
        return Err(MediaError::invalid_effect(format!(
            "Text is too long to fit the frame ({} characters on one line)",
            longest
        )));
    }

    let height = lines.len().max(1) as f64 * size as f64 * LINE_HEIGHT_RATIO;
    if height > usable_h {
        return Err(MediaError::invalid_effect(format!(
            "Text of {} lines at {}px does not fit a {}px frame",
            lines.len(),
            size,
            props.height
        )));
    }
    Ok(size)
}

fn plan_text(
    overlay: &TextOverlay,
    input: &Path,
    props: &VideoProps,
    ctx: &EffectContext<'_>,
    step: usize,
) -> MediaResult<EffectPlan> {
    let text = overlay.resolve(ctx.text_style);
    let font_size = fit_font_size(&text.text, text.font_size, text.margin, props)?;

    let text_path = ctx.work_dir.join(format!("text_{}.txt", step));
    let filter = format!("[0:v]{}[v]", drawtext(&text_path, &text, font_size));

    let render = RenderPlan::new("text_overlay", vec![FfmpegInput::new(input)], props.duration)
        .with_filter(filter)
        .with_maps(["[v]", "0:a?"])
        .with_output_args(ctx.encoding.video_only_args(ctx.preset));

    Ok(EffectPlan {
        render,
        props: *props,
        text_file: Some(TextFile {
            path: text_path,
            contents: text.text,
        }),
    })
}

fn plan_watermark(
    watermark: &Watermark,
    input: &Path,
    props: &VideoProps,
    ctx: &EffectContext<'_>,
    asset: &MediaInfo,
) -> MediaResult<EffectPlan> {
    let image = asset.require_video(&watermark.image_path)?;
    if image.width == 0 || image.height == 0 {
        return Err(MediaError::invalid_media(format!(
            "Watermark {} has no dimensions",
            watermark.image_path.display()
        )));
    }

    // Even dimensions, aspect ratio kept
    let even = |v: f64| ((v / 2.0).round() as u32 * 2).max(2);
    let width = even(props.width as f64 * watermark.scale);
    let height = even(width as f64 * image.height as f64 / image.width as f64);
    if height > props.height {
        return Err(MediaError::invalid_effect(format!(
            "Watermark scaled to {}x{} is taller than the {}px frame",
            width, height, props.height
        )));
    }

    let at = overlay_position(
        watermark.position,
        watermark.margin,
        (props.width, props.height),
        (width, height),
    );

    let render = RenderPlan::new(
        "watermark",
        vec![FfmpegInput::new(input), FfmpegInput::new(&watermark.image_path)],
        props.duration,
    )
    .with_filter(watermark_overlay((width, height), watermark.opacity, at))
    .with_maps(["[v]", "0:a?"])
    .with_output_args(ctx.encoding.video_only_args(ctx.preset));

    Ok(EffectPlan {
        render,
        props: *props,
        text_file: None,
    })
}

/// Applies an ordered list of effects.
pub struct EffectsProcessor<'a> {
    decoder: &'a dyn Decoder,
    encoder: &'a dyn Encoder,
    ctx: EffectContext<'a>,
}

impl<'a> EffectsProcessor<'a> {
    pub fn new(decoder: &'a dyn Decoder, encoder: &'a dyn Encoder, ctx: EffectContext<'a>) -> Self {
        Self { decoder, encoder, ctx }
    }

    /// Apply `effects` to `input` in order. The last render writes `output`;
    /// earlier ones write to the work directory.
    pub async fn apply_all(
        &self,
        input: &Path,
        props: VideoProps,
        effects: &[EffectRequest],
        output: &Path,
    ) -> MediaResult<VideoProps> {
        let mut current = input.to_path_buf();
        let mut props = props;

        for (step, effect) in effects.iter().enumerate() {
            let target = if step + 1 == effects.len() {
                output.to_path_buf()
            } else {
                self.ctx
                    .work_dir
                    .join(format!("effect_{}_{}.mp4", step, effect.name()))
            };

            let asset = match effect {
                EffectRequest::Watermark(w) => Some(self.decoder.probe(&w.image_path).await?),
                _ => None,
            };

            let plan = plan_effect(effect, &current, &props, &self.ctx, asset.as_ref(), step)?;
            if let Some(text) = &plan.text_file {
                tokio::fs::write(&text.path, &text.contents).await?;
            }

            info!(
                step,
                effect = %effect,
                duration_secs = plan.props.duration,
                "Applying effect"
            );
            self.encoder.render(&plan.render, &target).await?;

            current = target;
            props = plan.props;
        }

        Ok(props)
    }
}
