//! Filter graph fragments.

use std::path::Path;

use hookshort_models::effect::ResolvedText;
use hookshort_models::Position;

use crate::command::{escape_filter_path, escape_filter_value};

/// Lowest and highest tempo a single `atempo` stage accepts.
const ATEMPO_MIN: f64 = 0.5;
const ATEMPO_MAX: f64 = 2.0;

/// Format a number without trailing zeros ("1.25", "2").
pub fn fmt_num(value: f64) -> String {
    let s = format!("{:.4}", value);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s.is_empty() || s == "-" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

/// Scale to cover the frame, center-crop, square pixels, constant fps.
pub fn cover_crop(width: u32, height: u32, fps: u32, pixel_format: &str) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1,fps={fps},format={pix}",
        w = width,
        h = height,
        fps = fps,
        pix = pixel_format
    )
}

/// Video fade in/out for a clip of `duration` seconds.
pub fn video_fade(fade_in: f64, fade_out: f64, duration: f64) -> Option<String> {
    fade_chain("fade", fade_in, fade_out, duration)
}

/// Audio fade in/out for a clip of `duration` seconds.
pub fn audio_fade(fade_in: f64, fade_out: f64, duration: f64) -> Option<String> {
    fade_chain("afade", fade_in, fade_out, duration)
}

fn fade_chain(filter: &str, fade_in: f64, fade_out: f64, duration: f64) -> Option<String> {
    let mut parts = Vec::new();
    if fade_in > 0.0 {
        parts.push(format!("{}=t=in:st=0:d={}", filter, fmt_num(fade_in)));
    }
    if fade_out > 0.0 {
        let start = (duration - fade_out).max(0.0);
        parts.push(format!(
            "{}=t=out:st={}:d={}",
            filter,
            fmt_num(start),
            fmt_num(fade_out)
        ));
    }
    (!parts.is_empty()).then(|| parts.join(","))
}

/// Split a tempo factor into `atempo` stages that each stay in range.
pub fn atempo_stages(factor: f64) -> Vec<f64> {
    let mut stages = Vec::new();
    let mut remaining = factor;
    while remaining > ATEMPO_MAX {
        stages.push(ATEMPO_MAX);
        remaining /= ATEMPO_MAX;
    }
    while remaining < ATEMPO_MIN {
        stages.push(ATEMPO_MIN);
        remaining /= ATEMPO_MIN;
    }
    stages.push(remaining);
    stages
}

/// `atempo=2,atempo=1.5` for a factor of 3.
pub fn atempo_chain(factor: f64) -> String {
    atempo_stages(factor)
        .into_iter()
        .map(|s| format!("atempo={}", fmt_num(s)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Video retiming matching [`atempo_chain`].
pub fn setpts(factor: f64) -> String {
    format!("setpts=PTS/{}", fmt_num(factor))
}

/// drawtext x/y expressions for an anchor, clamped to the frame.
fn text_xy(position: Position, margin: u32) -> (String, String) {
    let m = margin;
    let left = format!("{}", m);
    let h_center = "(w-text_w)/2".to_string();
    let right = format!("w-text_w-{}", m);
    let top = format!("{}", m);
    let v_center = "(h-text_h)/2".to_string();
    let bottom = format!("h-text_h-{}", m);

    let (x, y) = match position {
        Position::Top => (h_center, top),
        Position::Bottom => (h_center, bottom),
        Position::Center => (h_center, v_center),
        Position::TopLeft => (left, top),
        Position::TopRight => (right, top),
        Position::BottomLeft => (left, bottom),
        Position::BottomRight => (right, bottom),
    };

    (
        format!("'max(0,min({},w-text_w))'", x),
        format!("'max(0,min({},h-text_h))'", y),
    )
}

/// drawtext reading its text from `text_file`, printed verbatim.
pub fn drawtext(text_file: &Path, text: &ResolvedText, font_size: u32) -> String {
    let (x, y) = text_xy(text.position, text.margin);
    let mut filter = format!(
        "drawtext=textfile={}:expansion=none:fontsize={}:fontcolor={}",
        escape_filter_path(text_file),
        font_size,
        escape_filter_value(&text.font_color)
    );
    if let Some(font) = &text.font_file {
        filter.push_str(&format!(":fontfile={}", escape_filter_path(font)));
    }
    if text.stroke_width > 0 {
        filter.push_str(&format!(
            ":borderw={}:bordercolor={}",
            text.stroke_width,
            escape_filter_value(&text.stroke_color)
        ));
    }
    filter.push_str(&format!(":x={}:y={}", x, y));
    filter
}

/// Top-left corner of an overlay of `size` inside `frame`, kept inside.
pub fn overlay_position(position: Position, margin: u32, frame: (u32, u32), size: (u32, u32)) -> (u32, u32) {
    let (fw, fh) = frame;
    let (w, h) = size;
    let max_x = fw.saturating_sub(w);
    let max_y = fh.saturating_sub(h);
    let center_x = max_x / 2;
    let center_y = max_y / 2;
    let right = max_x.saturating_sub(margin);
    let bottom = max_y.saturating_sub(margin);

    let (x, y) = match position {
        Position::Top => (center_x, margin),
        Position::Bottom => (center_x, bottom),
        Position::Center => (center_x, center_y),
        Position::TopLeft => (margin, margin),
        Position::TopRight => (right, margin),
        Position::BottomLeft => (margin, bottom),
        Position::BottomRight => (right, bottom),
    };
    (x.min(max_x), y.min(max_y))
}

/// Scale the watermark input, apply opacity and overlay it at `(x, y)`.
pub fn watermark_overlay(size: (u32, u32), opacity: f64, at: (u32, u32)) -> String {
    let mut wm = format!("[1:v]scale={}:{},format=rgba", size.0, size.1);
    if opacity < 1.0 {
        wm.push_str(&format!(",colorchannelmixer=aa={}", fmt_num(opacity)));
    }
    format!("{}[wm];[0:v][wm]overlay={}:{}[v]", wm, at.0, at.1)
}
