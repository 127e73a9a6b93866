//! Pipeline orchestration.
//!
//! A run goes validation, extraction, composition, effects. Every check
//! that can be made without touching media happens first, so a bad request
//! fails before any file is written. Intermediates live in a scratch
//! directory that is removed when the run ends, whatever the outcome.

use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;
use tracing::Instrument;

use hookshort_media::{
    extract_hook, plan_hook_audio, ChorusDetector, Decoder, EffectContext, EffectsProcessor, Encoder,
    FfmpegDecoder, FfmpegEncoder, FfmpegRunner, RepetitionDetector, VideoComposer,
};
use hookshort_models::format::{self, extension_of};
use hookshort_models::{
    CompositionJob, EffectRequest, HookOutcome, PipelineConfig, PlatformPreset, VisualSource,
};

use crate::error::{ErrorKind, PipelineError, PipelineResult, Stage, StageExt};
use crate::logging::StageLogger;
use crate::metrics;

/// One invocation of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRequest {
    pub input: PathBuf,
    /// Defaults to `<stem>_hook.<ext>` or `<stem>_short.mp4` next to the input
    pub output: Option<PathBuf>,
    /// Defaults to the configured hook length
    pub hook_length: Option<f64>,
    /// Audio-only extraction when absent
    pub visual: Option<VisualSource>,
    /// Defaults to the configured platform
    pub platform: Option<String>,
    /// Applied in order after composition
    pub effects: Vec<EffectRequest>,
}

impl ProcessRequest {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: None,
            hook_length: None,
            visual: None,
            platform: None,
            effects: Vec::new(),
        }
    }

    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_hook_length(mut self, seconds: f64) -> Self {
        self.hook_length = Some(seconds);
        self
    }

    pub fn with_background(mut self, path: impl Into<PathBuf>) -> Self {
        self.visual = Some(VisualSource::BackgroundVideo(path.into()));
        self
    }

    pub fn with_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.visual = Some(VisualSource::StillImage(path.into()));
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn with_effects(mut self, effects: Vec<EffectRequest>) -> Self {
        self.effects = effects;
        self
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessOutcome {
    pub output: PathBuf,
    pub hook: HookOutcome,
    /// Duration of the written output in seconds
    pub duration: f64,
    /// Preset used, when a video was rendered
    pub platform: Option<String>,
}

/// A request that passed validation.
#[derive(Debug)]
struct ValidatedRequest {
    input: PathBuf,
    output: PathBuf,
    hook_length: f64,
    visual: Option<VisualSource>,
    preset: PlatformPreset,
    effects: Vec<EffectRequest>,
}

/// Default output path for `input`.
pub fn default_output_path(input: &Path, with_video: bool) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let name = if with_video {
        format!("{}_short.mp4", stem)
    } else {
        let ext = extension_of(input).unwrap_or_else(|| "mp3".to_string());
        format!("{}_hook.{}", stem, ext)
    };
    input.with_file_name(name)
}

/// Sequences the stages over pluggable media backends.
pub struct Pipeline {
    config: PipelineConfig,
    decoder: Box<dyn Decoder>,
    encoder: Box<dyn Encoder>,
    detector: Box<dyn ChorusDetector>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        decoder: Box<dyn Decoder>,
        encoder: Box<dyn Encoder>,
        detector: Box<dyn ChorusDetector>,
    ) -> Self {
        Self {
            config,
            decoder,
            encoder,
            detector,
        }
    }

    /// Pipeline backed by FFmpeg and the repetition detector.
    pub fn with_ffmpeg(config: PipelineConfig) -> Self {
        let runner = match config.encoding.timeout_secs {
            Some(secs) => FfmpegRunner::default().with_timeout(secs),
            None => FfmpegRunner::default(),
        };
        let detector = RepetitionDetector::new(config.detector.clone());
        Self::new(
            config,
            Box::new(FfmpegDecoder::with_runner(runner.clone())),
            Box::new(FfmpegEncoder::with_runner(runner)),
            Box::new(detector),
        )
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the whole pipeline for one request.
    pub async fn process(&self, request: &ProcessRequest) -> PipelineResult<ProcessOutcome> {
        let logger = StageLogger::new("process");
        let span = logger.create_span();
        self.run(request, &logger).instrument(span).await
    }

    async fn run(&self, request: &ProcessRequest, logger: &StageLogger) -> PipelineResult<ProcessOutcome> {
        let validated = timed(logger, Stage::Validation, async { self.validate(request) }).await?;

        logger.log_progress(
            Stage::Validation,
            &format!(
                "input={} output={} hook_length={}s platform={}",
                validated.input.display(),
                validated.output.display(),
                validated.hook_length,
                validated.preset.id
            ),
        );

        let work_dir = self.work_dir().at_stage(Stage::Extraction)?;

        let (hook, hook_audio) = timed(logger, Stage::Extraction, self.extract(&validated, &work_dir, logger)).await?;

        let Some(visual) = &validated.visual else {
            return Ok(ProcessOutcome {
                output: validated.output.clone(),
                hook,
                duration: hook.window.duration(),
                platform: None,
            });
        };

        let composed = if validated.effects.is_empty() {
            validated.output.clone()
        } else {
            work_dir.path().join("composed.mp4")
        };

        let duration = hook.window.duration();
        let job = CompositionJob {
            visual: visual.clone(),
            hook_audio_path: hook_audio,
            preset: validated.preset.clone(),
            output_path: composed.clone(),
            duration,
            fade: self.config.fade.fit_within(duration),
            mismatch_policy: self.config.mismatch_policy,
        };

        let composer = VideoComposer::new(self.decoder.as_ref(), self.encoder.as_ref(), &self.config.encoding);
        let props = timed(logger, Stage::Composition, async {
            composer.compose(&job).await.at_stage(Stage::Composition)
        })
        .await?;

        let props = if validated.effects.is_empty() {
            props
        } else {
            let processor = EffectsProcessor::new(
                self.decoder.as_ref(),
                self.encoder.as_ref(),
                EffectContext {
                    text_style: &self.config.text_style,
                    encoding: &self.config.encoding,
                    preset: &validated.preset,
                    work_dir: work_dir.path(),
                },
            );
            timed(logger, Stage::Effects, async {
                processor
                    .apply_all(&composed, props, &validated.effects, &validated.output)
                    .await
                    .at_stage(Stage::Effects)
            })
            .await?
        };

        Ok(ProcessOutcome {
            output: validated.output,
            hook,
            duration: props.duration,
            platform: Some(validated.preset.id),
        })
    }

    fn work_dir(&self) -> std::io::Result<TempDir> {
        match &self.config.work_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                tempfile::Builder::new().prefix("hookshort-").tempdir_in(dir)
            }
            None => tempfile::Builder::new().prefix("hookshort-").tempdir(),
        }
    }

    /// Check everything that does not need media work.
    fn validate(&self, request: &ProcessRequest) -> PipelineResult<ValidatedRequest> {
        let formats = &self.config.formats;

        formats
            .validate_audio(&request.input)
            .map_err(PipelineError::validation)?;
        require_file(&request.input)?;

        let hook_length = request.hook_length.unwrap_or(self.config.default_hook_length);
        if !(hook_length.is_finite() && hook_length > 0.0) {
            return Err(PipelineError::validation(ErrorKind::InvalidRequest(format!(
                "Hook length must be a positive number of seconds, got {}",
                hook_length
            ))));
        }

        if let Some(visual) = &request.visual {
            let checked = match visual {
                VisualSource::StillImage(path) => formats.validate_image(path),
                VisualSource::BackgroundVideo(path) => formats.validate_video(path),
            };
            checked.map_err(PipelineError::validation)?;
            require_file(visual.path())?;
        }

        let platform = request
            .platform
            .as_deref()
            .unwrap_or(&self.config.default_platform);
        let preset = self
            .config
            .presets
            .resolve(platform)
            .map_err(PipelineError::validation)?
            .clone();

        let with_video = request.visual.is_some();
        let output = request
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(&request.input, with_video));
        let checked = if with_video {
            formats.validate_video_output(&output)
        } else {
            formats.validate_audio(&output)
        };
        checked.map_err(PipelineError::validation)?;

        let sources = std::iter::once(request.input.as_path()).chain(request.visual.as_ref().map(|v| v.path()));
        if sources.into_iter().any(|source| same_file(source, &output)) {
            return Err(PipelineError::validation(ErrorKind::InvalidRequest(format!(
                "Output {} would overwrite an input",
                output.display()
            ))));
        }

        if !request.effects.is_empty() && !with_video {
            return Err(PipelineError::validation(ErrorKind::EffectParameterInvalid(
                "Effects need a background video or image".to_string(),
            )));
        }
        for (i, effect) in request.effects.iter().enumerate() {
            effect.validate().map_err(|msg| {
                PipelineError::validation(ErrorKind::EffectParameterInvalid(format!(
                    "effect #{} ({}): {}",
                    i + 1,
                    effect.name(),
                    msg
                )))
            })?;
            if let EffectRequest::Watermark(w) = effect {
                let usable = format::validate(&w.image_path, formats.image.as_slice()).is_ok() && w.image_path.is_file();
                if !usable {
                    return Err(PipelineError::validation(ErrorKind::EffectParameterInvalid(format!(
                        "effect #{} (watermark): {} is not a readable image",
                        i + 1,
                        w.image_path.display()
                    ))));
                }
            }
        }

        Ok(ValidatedRequest {
            input: request.input.clone(),
            output,
            hook_length,
            visual: request.visual.clone(),
            preset,
            effects: request.effects.clone(),
        })
    }

    /// Decode, pick the hook and render it. Returns where the hook audio
    /// went: the final output for audio-only runs, a scratch WAV otherwise.
    async fn extract(
        &self,
        request: &ValidatedRequest,
        work_dir: &TempDir,
        logger: &StageLogger,
    ) -> PipelineResult<(HookOutcome, PathBuf)> {
        let track = self
            .decoder
            .decode_audio(&request.input, self.config.detector.sample_rate)
            .await
            .at_stage(Stage::Extraction)?;

        let hook = extract_hook(&track, request.hook_length, Some(self.detector.as_ref()))
            .at_stage(Stage::Extraction)?;
        drop(track);

        if let Some(warning) = &hook.short_track {
            logger.log_warning(Stage::Extraction, &warning.to_string());
            metrics::record_short_track_fallback();
        }

        let (target, extension) = match request.visual {
            Some(_) => (work_dir.path().join("hook.wav"), "wav".to_string()),
            None => (
                request.output.clone(),
                extension_of(&request.output).unwrap_or_default(),
            ),
        };

        let plan = plan_hook_audio(&request.input, &hook.window, &extension);
        self.encoder
            .render(&plan, &target)
            .await
            .at_stage(Stage::Extraction)?;

        Ok((hook, target))
    }
}

/// Run a stage future, logging and recording its duration and outcome.
async fn timed<T, F>(logger: &StageLogger, stage: Stage, fut: F) -> PipelineResult<T>
where
    F: Future<Output = PipelineResult<T>>,
{
    let start = Instant::now();
    logger.log_start(stage, stage.as_str());

    let result = fut.await;
    let elapsed = start.elapsed().as_secs_f64();
    metrics::record_stage(stage, elapsed, result.is_ok());

    match &result {
        Ok(_) => logger.log_completion(stage, elapsed),
        Err(e) => logger.log_error(stage, &e.to_string()),
    }
    result
}

fn require_file(path: &Path) -> PipelineResult<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(PipelineError::validation(ErrorKind::SourceMediaUnreadable(format!(
            "File not found: {}",
            path.display()
        ))))
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use hookshort_media::{AudioTrack, DetectorError, MediaError, MediaInfo, MediaResult, RenderPlan};
    use hookshort_models::{ChorusCandidate, TextOverlay, Watermark};
    use std::sync::{Arc, Mutex};

    /// Backend that must never be reached.
    struct Unreachable(Arc<Mutex<usize>>);

    #[async_trait]
    impl Decoder for Unreachable {
        async fn probe(&self, _: &Path) -> MediaResult<MediaInfo> {
            *self.0.lock().unwrap() += 1;
            Err(MediaError::FfprobeNotFound)
        }

        async fn decode_audio(&self, _: &Path, _: u32) -> MediaResult<AudioTrack> {
            *self.0.lock().unwrap() += 1;
            Err(MediaError::FfmpegNotFound)
        }
    }

    #[async_trait]
    impl Encoder for Unreachable {
        async fn render(&self, _: &RenderPlan, _: &Path) -> MediaResult<()> {
            *self.0.lock().unwrap() += 1;
            Err(MediaError::FfmpegNotFound)
        }
    }

    impl ChorusDetector for Unreachable {
        fn detect(&self, _: &AudioTrack, _: f64) -> Result<Vec<ChorusCandidate>, DetectorError> {
            *self.0.lock().unwrap() += 1;
            Ok(Vec::new())
        }
    }

    fn pipeline() -> (Pipeline, Arc<Mutex<usize>>) {
        let calls = Arc::new(Mutex::new(0));
        let pipeline = Pipeline::new(
            PipelineConfig::default(),
            Box::new(Unreachable(calls.clone())),
            Box::new(Unreachable(calls.clone())),
            Box::new(Unreachable(calls.clone())),
        );
        (pipeline, calls)
    }

    struct Files {
        dir: TempDir,
    }

    impl Files {
        fn new(names: &[&str]) -> Self {
            let dir = TempDir::new().unwrap();
            for name in names {
                std::fs::write(dir.path().join(name), b"media").unwrap();
            }
            Self { dir }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }
    }

    fn validation_error(pipeline: &Pipeline, request: &ProcessRequest) -> PipelineError {
        pipeline.validate(request).unwrap_err()
    }

    #[test]
    fn test_default_output_paths() {
        assert_eq!(
            default_output_path(Path::new("/music/song.mp3"), false),
            PathBuf::from("/music/song_hook.mp3")
        );
        assert_eq!(
            default_output_path(Path::new("/music/song.flac"), true),
            PathBuf::from("/music/song_short.mp4")
        );
    }

    #[test]
    fn test_valid_request() {
        let files = Files::new(&["song.mp3", "bg.mp4"]);
        let (pipeline, _) = pipeline();
        let request = ProcessRequest::new(files.path("song.mp3"))
            .with_background(files.path("bg.mp4"))
            .with_platform("YouTube");
        let validated = pipeline.validate(&request).unwrap();
        assert_eq!(validated.hook_length, 30.0);
        assert_eq!(validated.preset.id, "youtube");
        assert_eq!(validated.output, files.path("song_short.mp4"));
    }

    #[test]
    fn test_unsupported_input() {
        let files = Files::new(&["notes.txt"]);
        let (pipeline, _) = pipeline();
        let err = validation_error(&pipeline, &ProcessRequest::new(files.path("notes.txt")));
        assert_eq!(err.stage, Stage::Validation);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_missing_input() {
        let files = Files::new(&[]);
        let (pipeline, _) = pipeline();
        let err = validation_error(&pipeline, &ProcessRequest::new(files.path("song.mp3")));
        assert_eq!(err.kind.name(), "SourceMediaUnreadable");
    }

    #[test]
    fn test_bad_hook_length() {
        let files = Files::new(&["song.mp3"]);
        let (pipeline, _) = pipeline();
        for length in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            let request = ProcessRequest::new(files.path("song.mp3")).with_hook_length(length);
            assert_eq!(validation_error(&pipeline, &request).kind.name(), "InvalidRequest");
        }
    }

    #[test]
    fn test_visual_and_output_formats() {
        let files = Files::new(&["song.mp3", "bg.gif", "cover.png", "bg.mp4"]);
        let (pipeline, _) = pipeline();

        let request = ProcessRequest::new(files.path("song.mp3")).with_background(files.path("bg.gif"));
        assert_eq!(validation_error(&pipeline, &request).exit_code(), 2);

        // A png is an image, not a background video
        let request = ProcessRequest::new(files.path("song.mp3")).with_background(files.path("cover.png"));
        assert_eq!(validation_error(&pipeline, &request).exit_code(), 2);

        let request = ProcessRequest::new(files.path("song.mp3"))
            .with_image(files.path("cover.png"))
            .with_output(files.path("out.mp3"));
        assert_eq!(validation_error(&pipeline, &request).exit_code(), 2);

        let request = ProcessRequest::new(files.path("song.mp3")).with_output(files.path("out.mp4"));
        assert_eq!(validation_error(&pipeline, &request).exit_code(), 2);

        // Backgrounds may be webm, the rendered short may not
        let request = ProcessRequest::new(files.path("song.mp3"))
            .with_background(files.path("bg.mp4"))
            .with_output(files.path("out.webm"));
        let err = validation_error(&pipeline, &request);
        assert_eq!(err.kind.name(), "UnsupportedFormat");
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_unknown_platform() {
        let files = Files::new(&["song.mp3", "bg.mp4"]);
        let (pipeline, _) = pipeline();
        let request = ProcessRequest::new(files.path("song.mp3"))
            .with_background(files.path("bg.mp4"))
            .with_platform("bogus");
        let err = validation_error(&pipeline, &request);
        assert_eq!(err.kind.name(), "UnknownPlatform");
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_output_must_not_overwrite_input() {
        let files = Files::new(&["song.mp3"]);
        let (pipeline, _) = pipeline();
        let request = ProcessRequest::new(files.path("song.mp3")).with_output(files.path("song.mp3"));
        assert_eq!(validation_error(&pipeline, &request).kind.name(), "InvalidRequest");
    }

    #[test]
    fn test_effect_validation() {
        let files = Files::new(&["song.mp3", "bg.mp4"]);
        let (pipeline, _) = pipeline();

        let request = ProcessRequest::new(files.path("song.mp3")).with_effects(vec![EffectRequest::speed(1.25)]);
        assert_eq!(validation_error(&pipeline, &request).exit_code(), 7);

        let request = ProcessRequest::new(files.path("song.mp3"))
            .with_background(files.path("bg.mp4"))
            .with_effects(vec![
                EffectRequest::TextOverlay(TextOverlay::new("ok")),
                EffectRequest::speed(-2.0),
            ]);
        let err = validation_error(&pipeline, &request);
        assert_eq!(err.exit_code(), 7);
        assert!(err.to_string().contains("effect #2 (speed_change)"));

        let request = ProcessRequest::new(files.path("song.mp3"))
            .with_background(files.path("bg.mp4"))
            .with_effects(vec![EffectRequest::Watermark(Watermark::new(files.path("logo.png")))]);
        assert_eq!(validation_error(&pipeline, &request).exit_code(), 7);
    }

    #[test]
    fn test_validation_failure_touches_no_backend() {
        let files = Files::new(&["song.mp3"]);
        let (pipeline, calls) = pipeline();
        let request = ProcessRequest::new(files.path("song.mp3")).with_platform("bogus");

        let err = tokio_test::block_on(pipeline.process(&request)).unwrap_err();
        assert_eq!(err.stage, Stage::Validation);
        assert_eq!(*calls.lock().unwrap(), 0);
        assert!(!files.path("song_hook.mp3").exists());
    }

    #[test]
    fn test_backend_failure_is_tagged_with_stage() {
        let files = Files::new(&["song.mp3"]);
        let (pipeline, _) = pipeline();
        let err = tokio_test::block_on(pipeline.process(&ProcessRequest::new(files.path("song.mp3")))).unwrap_err();
        assert_eq!(err.stage, Stage::Extraction);
        assert_eq!(err.kind.name(), "ExternalToolUnavailable");
    }
}
