//! End-to-end pipeline tests.
//!
//! FFmpeg is replaced by fakes: a "media file" is a JSON-serialized
//! `MediaInfo`, the fake decoder probes by reading it back and the fake
//! encoder writes one describing the planned render.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use hookshort_media::{
    AudioStreamInfo, AudioTrack, ChorusDetector, Decoder, DetectorError, Encoder, MediaError, MediaInfo,
    MediaResult, RenderPlan, VideoStreamInfo,
};
use hookshort_models::{
    ChorusCandidate, EffectRequest, HookSource, MismatchPolicy, PipelineConfig, TextOverlay, Watermark,
};
use hookshort_pipeline::{Pipeline, ProcessRequest, Stage};

fn audio_file(duration: f64) -> MediaInfo {
    MediaInfo {
        duration,
        video: None,
        audio: Some(AudioStreamInfo {
            sample_rate: 44100,
            channels: 2,
            codec: "mp3".to_string(),
        }),
        size: 0,
    }
}

fn video_file(duration: f64, width: u32, height: u32) -> MediaInfo {
    MediaInfo {
        duration,
        video: Some(VideoStreamInfo {
            width,
            height,
            fps: 25.0,
            codec: "h264".to_string(),
        }),
        audio: None,
        size: 0,
    }
}

fn image_file(width: u32, height: u32) -> MediaInfo {
    MediaInfo {
        duration: 0.0,
        ..video_file(0.0, width, height)
    }
}

struct FakeDecoder;

#[async_trait]
impl Decoder for FakeDecoder {
    async fn probe(&self, path: &Path) -> MediaResult<MediaInfo> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        let json = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&json)?)
    }

    async fn decode_audio(&self, path: &Path, sample_rate: u32) -> MediaResult<AudioTrack> {
        let info = self.probe(path).await?;
        info.require_audio(path)?;
        Ok(AudioTrack::silent(info.duration, sample_rate))
    }
}

#[derive(Default)]
struct EncoderState {
    plans: Vec<(RenderPlan, PathBuf)>,
}

/// Records plans and writes the media they describe.
#[derive(Clone, Default)]
struct FakeEncoder {
    state: Arc<Mutex<EncoderState>>,
    fail_on: Option<&'static str>,
    /// Length of rendered hook audio, when it should differ from the plan
    hook_audio_secs: Option<f64>,
}

impl FakeEncoder {
    fn plans(&self) -> Vec<(RenderPlan, PathBuf)> {
        self.state.lock().unwrap().plans.clone()
    }

    fn plan(&self, label: &str) -> RenderPlan {
        self.plans()
            .into_iter()
            .map(|(plan, _)| plan)
            .find(|plan| plan.label == label)
            .unwrap_or_else(|| panic!("no {} render", label))
    }

    fn labels(&self) -> Vec<String> {
        self.plans().into_iter().map(|(plan, _)| plan.label).collect()
    }
}

#[async_trait]
impl Encoder for FakeEncoder {
    async fn render(&self, plan: &RenderPlan, output: &Path) -> MediaResult<()> {
        self.state
            .lock()
            .unwrap()
            .plans
            .push((plan.clone(), output.to_path_buf()));

        if self.fail_on == Some(plan.label.as_str()) {
            return Err(MediaError::ffmpeg_failed("encoder crashed", None, Some(1)));
        }

        let info = if plan.label == "hook_audio" {
            audio_file(self.hook_audio_secs.unwrap_or(plan.expected_duration))
        } else {
            MediaInfo {
                audio: audio_file(0.0).audio,
                ..video_file(plan.expected_duration, 1080, 1920)
            }
        };
        tokio::fs::write(output, serde_json::to_vec(&info)?).await?;
        Ok(())
    }
}

struct FakeDetector(Vec<ChorusCandidate>);

impl ChorusDetector for FakeDetector {
    fn detect(&self, _: &AudioTrack, _: f64) -> Result<Vec<ChorusCandidate>, DetectorError> {
        Ok(self.0.clone())
    }
}

struct Harness {
    media: TempDir,
    scratch: TempDir,
    encoder: FakeEncoder,
    config: PipelineConfig,
    candidates: Vec<ChorusCandidate>,
}

impl Harness {
    fn new() -> Self {
        let scratch = TempDir::new().unwrap();
        let mut config = PipelineConfig::default();
        config.work_dir = Some(scratch.path().to_path_buf());
        // Keeps the silent tracks small
        config.detector.sample_rate = 8000;

        Self {
            media: TempDir::new().unwrap(),
            scratch,
            encoder: FakeEncoder::default(),
            config,
            candidates: Vec::new(),
        }
    }

    fn file(&self, name: &str, info: MediaInfo) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, serde_json::to_vec(&info).unwrap()).unwrap();
        path
    }

    fn path(&self, name: &str) -> PathBuf {
        self.media.path().join(name)
    }

    fn pipeline(&self) -> Pipeline {
        Pipeline::new(
            self.config.clone(),
            Box::new(FakeDecoder),
            Box::new(self.encoder.clone()),
            Box::new(FakeDetector(self.candidates.clone())),
        )
    }

    fn media_names(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.media.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    fn scratch_is_empty(&self) -> bool {
        std::fs::read_dir(self.scratch.path()).unwrap().next().is_none()
    }
}

fn probe_output(path: &Path) -> MediaInfo {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn has_pair(args: &[String], flag: &str, value: &str) -> bool {
    args.windows(2).any(|w| w[0] == flag && w[1] == value)
}

#[tokio::test]
async fn test_song_with_short_background_on_tiktok() {
    let mut h = Harness::new();
    h.candidates = vec![
        // Best score but runs past the end of the track
        ChorusCandidate {
            start_secs: 20.0,
            score: 0.95,
        },
        ChorusCandidate {
            start_secs: 10.0,
            score: 0.8,
        },
    ];
    let song = h.file("song.mp3", audio_file(45.0));
    let bg = h.file("bg.mp4", video_file(20.0, 1920, 1080));

    let request = ProcessRequest::new(&song)
        .with_hook_length(30.0)
        .with_background(&bg)
        .with_platform("tiktok");
    let outcome = h.pipeline().process(&request).await.unwrap();

    assert_eq!(outcome.output, h.path("song_short.mp4"));
    assert_eq!(outcome.hook.source, HookSource::Detector);
    assert_eq!(outcome.hook.window.start_secs, 10.0);
    assert_eq!(outcome.hook.window.end_secs, 40.0);
    assert!(outcome.hook.short_track.is_none());
    assert_eq!(outcome.duration, 30.0);
    assert_eq!(outcome.platform.as_deref(), Some("tiktok"));

    let hook = h.encoder.plan("hook_audio");
    assert!(has_pair(&hook.inputs[0].args, "-ss", "10.000"));
    assert!(has_pair(&hook.inputs[0].args, "-t", "30.000"));

    let compose = h.encoder.plan("compose");
    assert_eq!(compose.inputs[0].path, bg);
    assert!(has_pair(&compose.inputs[0].args, "-stream_loop", "-1"));
    assert!(compose.has_output_pair("-t", "30.000"));
    assert!(compose.has_output_pair("-r", "30"));
    let filter = compose.filter_complex.as_deref().unwrap();
    assert!(filter.contains("1080:1920"));

    let written = probe_output(&outcome.output);
    assert_eq!(written.duration, 30.0);
    let video = written.video.unwrap();
    assert_eq!((video.width, video.height), (1080, 1920));

    assert_eq!(h.media_names(), vec!["bg.mp4", "song.mp3", "song_short.mp4"]);
    assert!(h.scratch_is_empty());
}

#[tokio::test]
async fn test_short_track_uses_whole_song() {
    let h = Harness::new();
    let song = h.file("intro.wav", audio_file(12.0));
    let bg = h.file("bg.mp4", video_file(60.0, 1920, 1080));

    let request = ProcessRequest::new(&song).with_background(&bg);
    let outcome = h.pipeline().process(&request).await.unwrap();

    assert_eq!(outcome.hook.source, HookSource::FullTrack);
    let warning = outcome.hook.short_track.unwrap();
    assert_eq!(warning.track_secs, 12.0);
    assert_eq!(warning.requested_secs, 30.0);
    assert_eq!(outcome.duration, 12.0);

    // Long enough background is not looped
    let compose = h.encoder.plan("compose");
    assert!(compose.inputs[0].args.is_empty());
    assert!(compose.has_output_pair("-t", "12.000"));
}

#[tokio::test]
async fn test_still_image_is_looped_for_the_hook() {
    let h = Harness::new();
    let song = h.file("song.flac", audio_file(200.0));
    let cover = h.file("cover.jpg", image_file(3000, 3000));

    let request = ProcessRequest::new(&song)
        .with_image(&cover)
        .with_hook_length(15.0)
        .with_platform("youtube")
        .with_output(h.path("out.mov"));
    let outcome = h.pipeline().process(&request).await.unwrap();

    assert_eq!(outcome.output, h.path("out.mov"));
    assert_eq!(outcome.hook.source, HookSource::Heuristic);
    assert_eq!(outcome.hook.window.start_secs, 92.5);

    let compose = h.encoder.plan("compose");
    assert!(has_pair(&compose.inputs[0].args, "-loop", "1"));
    assert!(compose.has_output_pair("-t", "15.000"));
}

#[tokio::test]
async fn test_audio_only_extraction() {
    let mut h = Harness::new();
    h.candidates = vec![ChorusCandidate {
        start_secs: 61.5,
        score: 0.7,
    }];
    let song = h.file("song.mp3", audio_file(180.0));

    let outcome = h.pipeline().process(&ProcessRequest::new(&song)).await.unwrap();

    assert_eq!(outcome.output, h.path("song_hook.mp3"));
    assert_eq!(outcome.platform, None);
    assert_eq!(outcome.duration, 30.0);
    assert_eq!(h.encoder.labels(), vec!["hook_audio"]);

    let hook = h.encoder.plan("hook_audio");
    assert!(hook.has_output_pair("-c:a", "libmp3lame"));
    assert!(has_pair(&hook.inputs[0].args, "-ss", "61.500"));

    let written = probe_output(&outcome.output);
    assert!(written.has_audio());
    assert!(!written.has_video());
    assert_eq!(h.media_names(), vec!["song.mp3", "song_hook.mp3"]);
}

#[tokio::test]
async fn test_unsupported_input_writes_nothing() {
    let h = Harness::new();
    let doc = h.file("lyrics.txt", audio_file(100.0));

    let err = h.pipeline().process(&ProcessRequest::new(&doc)).await.unwrap_err();

    assert_eq!(err.stage, Stage::Validation);
    assert_eq!(err.kind.name(), "UnsupportedFormat");
    assert_eq!(err.exit_code(), 2);
    assert!(h.encoder.plans().is_empty());
    assert_eq!(h.media_names(), vec!["lyrics.txt"]);
}

#[tokio::test]
async fn test_unknown_platform_fails_before_rendering() {
    let h = Harness::new();
    let song = h.file("song.mp3", audio_file(100.0));
    let bg = h.file("bg.mp4", video_file(100.0, 1920, 1080));

    let request = ProcessRequest::new(&song).with_background(&bg).with_platform("bogus");
    let err = h.pipeline().process(&request).await.unwrap_err();

    assert_eq!(err.kind.name(), "UnknownPlatform");
    assert_eq!(err.exit_code(), 3);
    assert!(err.to_string().starts_with("[validation] UnknownPlatform"));
    assert!(h.encoder.plans().is_empty());
}

#[tokio::test]
async fn test_effects_run_in_order() {
    let h = Harness::new();
    let song = h.file("song.mp3", audio_file(120.0));
    let bg = h.file("bg.mp4", video_file(90.0, 1920, 1080));
    let logo = h.file("logo.png", image_file(400, 200));

    let request = ProcessRequest::new(&song)
        .with_background(&bg)
        .with_effects(vec![
            EffectRequest::TextOverlay(TextOverlay::new("Out now")),
            EffectRequest::speed(1.25),
            EffectRequest::Watermark(Watermark::new(&logo)),
        ]);
    let outcome = h.pipeline().process(&request).await.unwrap();

    assert_eq!(
        h.encoder.labels(),
        vec!["hook_audio", "compose", "text_overlay", "speed_change", "watermark"]
    );
    assert_eq!(outcome.duration, 24.0);

    let speed = h.encoder.plan("speed_change");
    let filter = speed.filter_complex.as_deref().unwrap();
    assert!(filter.contains("setpts=PTS/1.25"));
    assert!(filter.contains("atempo=1.25"));

    // Each step reads the previous step's output and only the last one
    // writes the requested path
    let plans = h.encoder.plans();
    for pair in plans[1..].windows(2) {
        assert_eq!(pair[1].0.inputs[0].path, pair[0].1);
    }
    assert_eq!(plans.last().unwrap().1, outcome.output);
    assert_eq!(probe_output(&outcome.output).duration, 24.0);

    assert_eq!(
        h.media_names(),
        vec!["bg.mp4", "logo.png", "song.mp3", "song_short.mp4"]
    );
    assert!(h.scratch_is_empty());
}

#[tokio::test]
async fn test_duration_mismatch_with_fail_policy() {
    let mut h = Harness::new();
    h.config.mismatch_policy = MismatchPolicy::Fail;
    h.encoder.hook_audio_secs = Some(27.0);
    let song = h.file("song.mp3", audio_file(100.0));
    let bg = h.file("bg.mp4", video_file(100.0, 1920, 1080));

    let err = h
        .pipeline()
        .process(&ProcessRequest::new(&song).with_background(&bg))
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Composition);
    assert_eq!(err.kind.name(), "AudioVideoDurationMismatch");
    assert_eq!(err.exit_code(), 6);
    assert!(!h.path("song_short.mp4").exists());
    assert!(h.scratch_is_empty());
}

#[tokio::test]
async fn test_short_hook_audio_is_padded_by_default() {
    let mut h = Harness::new();
    h.encoder.hook_audio_secs = Some(27.0);
    let song = h.file("song.mp3", audio_file(100.0));
    let bg = h.file("bg.mp4", video_file(100.0, 1920, 1080));

    let outcome = h
        .pipeline()
        .process(&ProcessRequest::new(&song).with_background(&bg))
        .await
        .unwrap();

    assert_eq!(outcome.duration, 30.0);
    let compose = h.encoder.plan("compose");
    assert!(compose.filter_complex.unwrap().contains("apad=whole_dur=30"));
}

#[tokio::test]
async fn test_encoder_failure_leaves_no_output() {
    let mut h = Harness::new();
    h.encoder.fail_on = Some("compose");
    let song = h.file("song.mp3", audio_file(100.0));
    let bg = h.file("bg.mp4", video_file(100.0, 1920, 1080));

    let err = h
        .pipeline()
        .process(&ProcessRequest::new(&song).with_background(&bg))
        .await
        .unwrap_err();

    assert_eq!(err.stage, Stage::Composition);
    assert_eq!(err.exit_code(), 1);
    assert_eq!(h.media_names(), vec!["bg.mp4", "song.mp3"]);
    assert!(h.scratch_is_empty());
}

#[tokio::test]
async fn test_unreadable_source_is_reported() {
    let h = Harness::new();
    let song = h.path("song.mp3");
    std::fs::write(&song, b"not a media file").unwrap();

    let err = h.pipeline().process(&ProcessRequest::new(&song)).await.unwrap_err();

    assert_eq!(err.stage, Stage::Extraction);
    assert_eq!(err.kind.name(), "SourceMediaUnreadable");
    assert_eq!(err.exit_code(), 5);
}
