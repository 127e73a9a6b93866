//! Pipeline metrics.
//!
//! Recorded through the `metrics` facade. Nothing is exported unless the
//! host installs a recorder.

use metrics::{counter, histogram};

use crate::error::Stage;

/// Metric names as constants for consistency.
pub mod names {
    pub const STAGE_DURATION_SECONDS: &str = "hookshort_stage_duration_seconds";
    pub const STAGE_FAILURES_TOTAL: &str = "hookshort_stage_failures_total";
    pub const SHORT_TRACK_FALLBACKS_TOTAL: &str = "hookshort_short_track_fallbacks_total";
}

/// Record how long a stage ran and whether it failed.
pub fn record_stage(stage: Stage, duration_secs: f64, success: bool) {
    let labels = [("stage", stage.as_str().to_string())];
    histogram!(names::STAGE_DURATION_SECONDS, &labels).record(duration_secs);
    if !success {
        counter!(names::STAGE_FAILURES_TOTAL, &labels).increment(1);
    }
}

pub fn record_short_track_fallback() {
    counter!(names::SHORT_TRACK_FALLBACKS_TOTAL).increment(1);
}
