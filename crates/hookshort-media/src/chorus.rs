//! Chorus detection.
//!
//! A chorus is the part of a song that comes back. [`RepetitionDetector`]
//! looks for the window whose coarse energy contour best matches another,
//! clearly separate, window of the same track and prefers loud sections.

use thiserror::Error;
use tracing::debug;

use hookshort_models::{ChorusCandidate, DetectorConfig};

use crate::audio::AudioTrack;

#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Track has no audio samples")]
    EmptyTrack,

    #[error("Invalid detection window: {0}s")]
    InvalidWindow(f64),

    #[error("Chorus detection failed: {0}")]
    Failed(String),
}

/// Proposes hook candidates for a track.
pub trait ChorusDetector: Send + Sync {
    /// Candidate starts for windows of `window_secs`, best first.
    fn detect(&self, track: &AudioTrack, window_secs: f64) -> Result<Vec<ChorusCandidate>, DetectorError>;
}

/// Self-similarity detector over per-hop energy features.
#[derive(Debug, Clone, Default)]
pub struct RepetitionDetector {
    config: DetectorConfig,
}

/// RMS, zero-crossing rate, peak.
const FEATURES: usize = 3;

impl RepetitionDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// One z-normalised feature vector per hop.
    fn hop_features(&self, track: &AudioTrack) -> Vec<[f64; FEATURES]> {
        let hop_len = ((self.config.hop_secs * track.sample_rate as f64).round() as usize).max(1);

        let mut rows: Vec<[f64; FEATURES]> = track
            .samples
            .chunks_exact(hop_len)
            .map(|hop| {
                let n = hop.len() as f64;
                let energy: f64 = hop.iter().map(|&s| (s as f64) * (s as f64)).sum();
                let crossings = hop
                    .windows(2)
                    .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
                    .count();
                let peak = hop.iter().fold(0.0f64, |acc, &s| acc.max((s as f64).abs()));
                [(energy / n).sqrt(), crossings as f64 / n, peak]
            })
            .collect();

        for f in 0..FEATURES {
            let n = rows.len() as f64;
            let mean = rows.iter().map(|r| r[f]).sum::<f64>() / n;
            let var = rows.iter().map(|r| (r[f] - mean).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();
            for row in rows.iter_mut() {
                row[f] = if std > 1e-12 { (row[f] - mean) / std } else { 0.0 };
            }
        }

        rows
    }
}

fn cosine(a: &[[f64; FEATURES]], b: &[[f64; FEATURES]]) -> f64 {
    let mut dot = 0.0;
    let mut na = 0.0;
    let mut nb = 0.0;
    for (x, y) in a.iter().zip(b) {
        for f in 0..FEATURES {
            dot += x[f] * y[f];
            na += x[f] * x[f];
            nb += y[f] * y[f];
        }
    }
    if na <= 1e-12 || nb <= 1e-12 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

impl ChorusDetector for RepetitionDetector {
    fn detect(&self, track: &AudioTrack, window_secs: f64) -> Result<Vec<ChorusCandidate>, DetectorError> {
        if track.is_empty() || track.sample_rate == 0 {
            return Err(DetectorError::EmptyTrack);
        }
        if !(window_secs.is_finite() && window_secs > 0.0) {
            return Err(DetectorError::InvalidWindow(window_secs));
        }

        let hop_secs = self.config.hop_secs;
        let features = self.hop_features(track);
        let window = ((window_secs / hop_secs).round() as usize).max(1);
        let separation = window.div_ceil(2);
        // Every window needs a partner starting at least `separation` hops away
        if features.len() < window + separation {
            return Ok(Vec::new());
        }

        let starts = features.len() - window + 1;

        let rms: Vec<f64> = track
            .samples
            .chunks_exact(((hop_secs * track.sample_rate as f64).round() as usize).max(1))
            .map(|hop| (hop.iter().map(|&s| (s as f64).powi(2)).sum::<f64>() / hop.len() as f64).sqrt())
            .collect();
        let loudness: Vec<f64> = (0..starts)
            .map(|i| rms[i..i + window].iter().sum::<f64>() / window as f64)
            .collect();
        let max_loudness = loudness.iter().cloned().fold(0.0f64, f64::max);

        let weight = self.config.loudness_weight;
        let mut scored: Vec<ChorusCandidate> = Vec::new();
        for i in 0..starts {
            let this = &features[i..i + window];
            let repetition = (0..starts)
                .filter(|&j| j.abs_diff(i) >= separation)
                .map(|j| cosine(this, &features[j..j + window]))
                .fold(f64::NEG_INFINITY, f64::max);
            if !repetition.is_finite() || repetition <= 0.0 {
                continue;
            }
            let relative = if max_loudness > 0.0 {
                loudness[i] / max_loudness
            } else {
                0.0
            };
            let score = repetition * ((1.0 - weight) + weight * relative);
            scored.push(ChorusCandidate {
                start_secs: i as f64 * hop_secs,
                score,
            });
        }

        // Best first, earliest start on ties
        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then(a.start_secs.total_cmp(&b.start_secs))
        });

        // Drop near-duplicates of an already chosen start
        let min_gap = separation as f64 * hop_secs;
        let mut chosen: Vec<ChorusCandidate> = Vec::new();
        for candidate in scored {
            if chosen.len() == self.config.max_candidates {
                break;
            }
            if chosen
                .iter()
                .all(|c| (c.start_secs - candidate.start_secs).abs() >= min_gap)
            {
                chosen.push(candidate);
            }
        }

        debug!(
            hops = features.len(),
            window_hops = window,
            candidates = chosen.len(),
            best = chosen.first().map(|c| c.score),
            "Repetition analysis complete"
        );

        Ok(chosen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 1000;

    fn tone(secs: f64, amplitude: f32, period: usize) -> Vec<f32> {
        let n = (secs * RATE as f64) as usize;
        (0..n)
            .map(|i| if (i / period) % 2 == 0 { amplitude } else { -amplitude })
            .collect()
    }

    fn detector() -> RepetitionDetector {
        RepetitionDetector::new(DetectorConfig {
            sample_rate: RATE,
            ..Default::default()
        })
    }

    /// verse A, chorus, verse B, chorus, outro
    fn song() -> AudioTrack {
        let chorus = || {
            let mut c = tone(5.0, 0.9, 2);
            c.extend(tone(5.0, 0.6, 8));
            c
        };
        let mut samples = tone(10.0, 0.1, 50);
        samples.extend(chorus());
        samples.extend(tone(10.0, 0.2, 30));
        samples.extend(chorus());
        samples.extend(tone(5.0, 0.05, 40));
        AudioTrack::new(samples, RATE)
    }

    #[test]
    fn test_detects_repeated_loud_section() {
        let candidates = detector().detect(&song(), 10.0).unwrap();
        assert!(!candidates.is_empty());

        let best = candidates[0];
        assert!(
            (best.start_secs - 10.0).abs() < 1.01 || (best.start_secs - 30.0).abs() < 1.01,
            "best start {} is not a chorus",
            best.start_secs
        );
        assert!(candidates.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(candidates.len() <= 5);
    }

    #[test]
    fn test_candidates_fit_track() {
        let track = song();
        for c in detector().detect(&track, 10.0).unwrap() {
            assert!(c.start_secs >= 0.0);
            assert!(c.start_secs + 10.0 <= track.duration() + 1e-9);
        }
    }

    #[test]
    fn test_silence_yields_no_candidates() {
        let track = AudioTrack::silent(60.0, RATE);
        assert!(detector().detect(&track, 10.0).unwrap().is_empty());
    }

    #[test]
    fn test_track_shorter_than_window() {
        let track = AudioTrack::new(tone(5.0, 0.5, 4), RATE);
        assert!(detector().detect(&track, 10.0).unwrap().is_empty());
    }

    #[test]
    fn test_no_room_for_a_repeat() {
        // 24 hops, a 20 hop window needs a partner 10 hops away
        let track = AudioTrack::new(tone(12.0, 0.5, 4), RATE);
        assert!(detector().detect(&track, 10.0).unwrap().is_empty());
    }

    #[test]
    fn test_overlapping_windows_still_compared() {
        // 45s of a 15s loop: the 30s windows at 0s and 15s are identical
        let mut samples = Vec::new();
        for _ in 0..3 {
            samples.extend(tone(7.5, 0.9, 2));
            samples.extend(tone(7.5, 0.2, 20));
        }
        let track = AudioTrack::new(samples, RATE);

        let candidates = detector().detect(&track, 30.0).unwrap();
        let starts: Vec<f64> = candidates.iter().map(|c| c.start_secs).collect();
        assert_eq!(starts, vec![0.0, 15.0]);
        assert!((candidates[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            detector().detect(&AudioTrack::new(Vec::new(), RATE), 10.0),
            Err(DetectorError::EmptyTrack)
        ));
        assert!(matches!(
            detector().detect(&song(), 0.0),
            Err(DetectorError::InvalidWindow(_))
        ));
    }
}
