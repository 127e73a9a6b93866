//! Filesystem helpers for writing final outputs.
//!
//! Renders never write straight to their destination. They write to a
//! `<stem>.partial.<ext>` sibling owned by a [`PartialOutput`] guard, which
//! removes the file on drop unless [`PartialOutput::commit`] moved it into
//! place.

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{MediaError, MediaResult};

/// Move a file from `src` to `dst`, handling cross-device moves.
///
/// Tries a rename first and falls back to copy-and-delete on EXDEV. The
/// destination's parent directory is created when missing.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    match fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device_error(&e) => {
            tracing::debug!(
                "Cross-device rename, copying instead: {} -> {}",
                src.display(),
                dst.display()
            );
            copy_and_delete(src, dst).await
        }
        Err(e) => Err(MediaError::from(e)),
    }
}

/// EXDEV is error code 18 on Linux and macOS.
fn is_cross_device_error(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(18)
}

async fn copy_and_delete(src: &Path, dst: &Path) -> MediaResult<()> {
    // Same directory as dst so the final rename stays on one filesystem
    let tmp_dst = dst.with_extension("tmp");

    fs::copy(src, &tmp_dst).await?;

    if let Err(e) = fs::rename(&tmp_dst, dst).await {
        let _ = std::fs::remove_file(&tmp_dst);
        return Err(e.into());
    }

    if let Err(e) = fs::remove_file(src).await {
        tracing::warn!("Failed to remove {} after copy: {}", src.display(), e);
    }

    Ok(())
}

/// `out/video.mp4` -> `out/video.partial.mp4`
pub fn partial_path(target: &Path) -> PathBuf {
    let stem = target
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = match target.extension() {
        Some(ext) => format!("{}.partial.{}", stem, ext.to_string_lossy()),
        None => format!("{}.partial", stem),
    };
    target.with_file_name(name)
}

/// Scoped owner of an in-progress output file.
#[derive(Debug)]
pub struct PartialOutput {
    target: PathBuf,
    partial: PathBuf,
    committed: bool,
}

impl PartialOutput {
    pub fn new(target: impl AsRef<Path>) -> Self {
        let target = target.as_ref().to_path_buf();
        let partial = partial_path(&target);
        Self {
            target,
            partial,
            committed: false,
        }
    }

    /// Where the renderer should write.
    pub fn path(&self) -> &Path {
        &self.partial
    }

    /// Move the finished file to its target.
    pub async fn commit(mut self) -> MediaResult<PathBuf> {
        if !self.partial.exists() {
            return Err(MediaError::ffmpeg_failed(
                format!("Renderer produced no output at {}", self.partial.display()),
                None,
                None,
            ));
        }
        move_file(&self.partial, &self.target).await?;
        self.committed = true;
        Ok(self.target.clone())
    }
}

impl Drop for PartialOutput {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.partial) {
            Ok(()) => tracing::debug!("Removed partial output {}", self.partial.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove partial output {}: {}",
                self.partial.display(),
                e
            ),
        }
    }
}
