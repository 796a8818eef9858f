//! `ClipSlicer` on top of the ffmpeg bindings in `domain::av`.

use crate::domain::av::{clips, probe};
use crate::domain::errors::SliceError;
use crate::domain::windows::{plan_windows, DEFAULT_WINDOW_FRAMES};
use crate::ports::slicer::ClipSlicer;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub const DEFAULT_FALLBACK_FPS: u32 = 25;

#[derive(Debug, Clone, Copy)]
pub struct FfmpegSlicer {
    /// Frames per detected appearance.
    window: u64,
    fallback_fps: u32,
}

impl Default for FfmpegSlicer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_FRAMES, DEFAULT_FALLBACK_FPS)
    }
}

impl FfmpegSlicer {
    pub fn new(window: u64, fallback_fps: u32) -> Self {
        Self {
            window: window.max(1),
            fallback_fps: fallback_fps.max(1),
        }
    }
}

#[async_trait]
impl ClipSlicer for FfmpegSlicer {
    async fn frame_count(&self, source: &Path) -> Result<u64, SliceError> {
        probe::frame_count(source).await
    }

    async fn slice(&self, source: &Path, frames: &[u64], output: &Path) -> Result<(), SliceError> {
        let frame_count = probe::frame_count(source).await?;
        let plan = plan_windows(frames, self.window, frame_count);

        for start in &plan.skipped {
            tracing::warn!(
                source = %source.display(),
                start,
                frame_count,
                "window starts past the end of the video, skipped"
            );
        }
        if plan.is_empty() {
            return Err(SliceError::EmptySelection {
                path: source.to_path_buf(),
            });
        }

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SliceError::write_failed(parent, e))?;
        }

        let staging = staging_path(output);
        let expected = plan.total_frames();
        let written = match clips::write_clip(source, &staging, plan, self.fallback_fps).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&staging).await;
                return Err(e);
            }
        };

        if let Err(e) = tokio::fs::rename(&staging, output).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(SliceError::write_failed(output, e));
        }

        if written < expected {
            tracing::warn!(
                output = %output.display(),
                written,
                expected,
                "source ended before every planned frame was decoded"
            );
        }
        tracing::debug!(output = %output.display(), frames = written, "clip written");
        Ok(())
    }
}

/// Hidden sibling of `output`, so the rename into place stays on one filesystem.
fn staging_path(output: &Path) -> PathBuf {
    let name = output
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "clip.mp4".to_string());
    output.with_file_name(format!(".{}.{}.part", name, Uuid::new_v4()))
}
