//! Post-composition effect requests.
//!
//! Effects are applied to a composed video in the order the caller lists
//! them. Each variant carries its own parameter set; values left unset on a
//! text overlay fall back to the configured [`TextStyle`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

/// Anchor position inside the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    Top,
    Bottom,
    Center,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Position {
    pub const ALL: &'static [Position] = &[
        Position::Top,
        Position::Bottom,
        Position::Center,
        Position::TopLeft,
        Position::TopRight,
        Position::BottomLeft,
        Position::BottomRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Position::Top => "top",
            Position::Bottom => "bottom",
            Position::Center => "center",
            Position::TopLeft => "top-left",
            Position::TopRight => "top-right",
            Position::BottomLeft => "bottom-left",
            Position::BottomRight => "bottom-right",
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Position {
    type Err = EffectParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Position::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| EffectParseError(format!("Unknown position: {}", s)))
    }
}

/// Default styling for text overlays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    pub font_size: u32,
    pub font_color: String,
    pub stroke_width: u32,
    pub stroke_color: String,
    pub position: Position,
    /// Distance from the frame edge in pixels
    pub margin: u32,
    /// Optional font file passed to drawtext
    #[serde(default)]
    pub font_file: Option<PathBuf>,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 48,
            font_color: "white".to_string(),
            stroke_width: 2,
            stroke_color: "black".to_string(),
            position: Position::Bottom,
            margin: 30,
            font_file: None,
        }
    }
}

/// Caption drawn over the video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOverlay {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin: Option<u32>,
}

impl TextOverlay {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            position: None,
            font_size: None,
            font_color: None,
            stroke_width: None,
            stroke_color: None,
            margin: None,
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_font_size(mut self, size: u32) -> Self {
        self.font_size = Some(size);
        self
    }

    /// Fill unset fields from `style`.
    pub fn resolve(&self, style: &TextStyle) -> ResolvedText {
        ResolvedText {
            text: self.text.clone(),
            position: self.position.unwrap_or(style.position),
            font_size: self.font_size.unwrap_or(style.font_size),
            font_color: self.font_color.clone().unwrap_or_else(|| style.font_color.clone()),
            stroke_width: self.stroke_width.unwrap_or(style.stroke_width),
            stroke_color: self
                .stroke_color
                .clone()
                .unwrap_or_else(|| style.stroke_color.clone()),
            margin: self.margin.unwrap_or(style.margin),
            font_file: style.font_file.clone(),
        }
    }
}

/// Text overlay with every style field filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedText {
    pub text: String,
    pub position: Position,
    pub font_size: u32,
    pub font_color: String,
    pub stroke_width: u32,
    pub stroke_color: String,
    pub margin: u32,
    pub font_file: Option<PathBuf>,
}

/// Image overlay (logo, credit).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watermark {
    pub image_path: PathBuf,
    #[serde(default = "default_watermark_position")]
    pub position: Position,
    /// Watermark width as a fraction of frame width, in (0, 1]
    #[serde(default = "default_watermark_scale")]
    pub scale: f64,
    /// Opacity in [0, 1]
    #[serde(default = "default_watermark_opacity")]
    pub opacity: f64,
    /// Distance from the frame edge in pixels
    #[serde(default = "default_watermark_margin")]
    pub margin: u32,
}

fn default_watermark_position() -> Position {
    Position::BottomRight
}
fn default_watermark_scale() -> f64 {
    0.3
}
fn default_watermark_opacity() -> f64 {
    1.0
}
fn default_watermark_margin() -> u32 {
    10
}

impl Watermark {
    pub fn new(image_path: impl Into<PathBuf>) -> Self {
        Self {
            image_path: image_path.into(),
            position: default_watermark_position(),
            scale: default_watermark_scale(),
            opacity: default_watermark_opacity(),
            margin: default_watermark_margin(),
        }
    }

    pub fn with_position(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }
}

/// Playback speed change. Video and audio are both retimed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedChange {
    pub factor: f64,
}

/// Fade in from / out to black and silence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fade {
    #[serde(default)]
    pub fade_in_secs: f64,
    #[serde(default)]
    pub fade_out_secs: f64,
}

/// A single post-processing step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectRequest {
    TextOverlay(TextOverlay),
    Watermark(Watermark),
    SpeedChange(SpeedChange),
    Fade(Fade),
}

impl EffectRequest {
    pub fn name(&self) -> &'static str {
        match self {
            EffectRequest::TextOverlay(_) => "text_overlay",
            EffectRequest::Watermark(_) => "watermark",
            EffectRequest::SpeedChange(_) => "speed_change",
            EffectRequest::Fade(_) => "fade",
        }
    }

    pub fn speed(factor: f64) -> Self {
        EffectRequest::SpeedChange(SpeedChange { factor })
    }

    pub fn fade(fade_in_secs: f64, fade_out_secs: f64) -> Self {
        EffectRequest::Fade(Fade {
            fade_in_secs,
            fade_out_secs,
        })
    }

    /// Check parameters that do not depend on the video being processed.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            EffectRequest::TextOverlay(t) => {
                if t.text.trim().is_empty() {
                    return Err("Text overlay text must not be empty".to_string());
                }
                if t.font_size == Some(0) {
                    return Err("Text overlay font size must be positive".to_string());
                }
            }
            EffectRequest::Watermark(w) => {
                if !(w.scale.is_finite() && w.scale > 0.0 && w.scale <= 1.0) {
                    return Err(format!("Watermark scale {} must be in (0, 1]", w.scale));
                }
                if !(w.opacity.is_finite() && (0.0..=1.0).contains(&w.opacity)) {
                    return Err(format!("Watermark opacity {} must be in [0, 1]", w.opacity));
                }
                if w.image_path.as_os_str().is_empty() {
                    return Err("Watermark image path must be set".to_string());
                }
            }
            EffectRequest::SpeedChange(s) => {
                if !(s.factor.is_finite() && s.factor > 0.0) {
                    return Err(format!("Speed factor {} must be a positive number", s.factor));
                }
            }
            EffectRequest::Fade(f) => {
                let ok = |v: f64| v.is_finite() && v >= 0.0;
                if !ok(f.fade_in_secs) || !ok(f.fade_out_secs) {
                    return Err("Fade durations must be non-negative".to_string());
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for EffectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EffectRequest::TextOverlay(t) => write!(f, "text_overlay({:?})", t.text),
            EffectRequest::Watermark(w) => write!(
                f,
                "watermark({}, {}, scale {:.2})",
                w.image_path.display(),
                w.position,
                w.scale
            ),
            EffectRequest::SpeedChange(s) => write!(f, "speed_change({}x)", s.factor),
            EffectRequest::Fade(fd) => {
                write!(f, "fade(in {}s, out {}s)", fd.fade_in_secs, fd.fade_out_secs)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid effect: {0}")]
pub struct EffectParseError(pub String);

fn parse_f64(field: &str, value: &str) -> Result<f64, EffectParseError> {
    value
        .trim()
        .parse()
        .map_err(|_| EffectParseError(format!("{} '{}' is not a number", field, value)))
}

/// Parses the compact command-line form:
///
/// - `text=<TEXT>[@position]`
/// - `watermark=<PATH>[@position[:scale]]`
/// - `speed=<FACTOR>`
/// - `fade=<IN>[:<OUT>]`
impl FromStr for EffectRequest {
    type Err = EffectParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, value) = s
            .split_once('=')
            .ok_or_else(|| EffectParseError(format!("expected <kind>=<value>, got '{}'", s)))?;

        match kind.trim().to_lowercase().as_str() {
            "text" => {
                let mut overlay = TextOverlay::new(value);
                if let Some((text, pos)) = value.rsplit_once('@') {
                    if let Ok(position) = pos.parse::<Position>() {
                        overlay = TextOverlay::new(text).with_position(position);
                    }
                }
                Ok(EffectRequest::TextOverlay(overlay))
            }
            "watermark" => {
                let Some((path, placement)) = value.rsplit_once('@') else {
                    return Ok(EffectRequest::Watermark(Watermark::new(value)));
                };
                let (pos, scale) = match placement.split_once(':') {
                    Some((pos, scale)) => (pos, Some(parse_f64("watermark scale", scale)?)),
                    None => (placement, None),
                };
                let mut watermark = Watermark::new(path).with_position(pos.parse()?);
                if let Some(scale) = scale {
                    watermark = watermark.with_scale(scale);
                }
                Ok(EffectRequest::Watermark(watermark))
            }
            "speed" => Ok(EffectRequest::speed(parse_f64("speed factor", value)?)),
            "fade" => {
                let (fade_in, fade_out) = match value.split_once(':') {
                    Some((a, b)) => (parse_f64("fade in", a)?, parse_f64("fade out", b)?),
                    None => {
                        let v = parse_f64("fade", value)?;
                        (v, v)
                    }
                };
                Ok(EffectRequest::fade(fade_in, fade_out))
            }
            other => Err(EffectParseError(format!("unknown effect kind '{}'", other))),
        }
    }
}
