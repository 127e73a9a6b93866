//! Rendering capability.

use async_trait::async_trait;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

use crate::command::FfmpegRunner;
use crate::error::MediaResult;
use crate::fs_utils::PartialOutput;
use crate::render::RenderPlan;

/// Executes render plans.
///
/// Implementations must leave nothing at `output` when they fail.
#[async_trait]
pub trait Encoder: Send + Sync {
    async fn render(&self, plan: &RenderPlan, output: &Path) -> MediaResult<()>;
}

/// Encoder that runs plans through the `ffmpeg` binary.
#[derive(Debug, Default, Clone)]
pub struct FfmpegEncoder {
    runner: FfmpegRunner,
}

impl FfmpegEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_runner(runner: FfmpegRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Encoder for FfmpegEncoder {
    async fn render(&self, plan: &RenderPlan, output: &Path) -> MediaResult<()> {
        let start = Instant::now();
        let partial = PartialOutput::new(output);
        let cmd = plan.to_command(partial.path());

        let label = plan.label.clone();
        let total_ms = (plan.expected_duration * 1000.0) as i64;
        self.runner
            .run_with_progress(&cmd, move |progress| {
                debug!(
                    render = %label,
                    percent = %format!("{:.1}", progress.percentage(total_ms)),
                    speed = progress.speed,
                    "Render progress"
                );
            })
            .await?;

        let output = partial.commit().await?;
        info!(
            render = %plan.label,
            output = %output.display(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Render complete"
        );
        Ok(())
    }
}
