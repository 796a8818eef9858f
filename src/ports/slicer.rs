use crate::domain::errors::SliceError;
use async_trait::async_trait;
use std::path::Path;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ClipSlicer: Send + Sync {
    /// Number of frames in the source video.
    async fn frame_count(&self, source: &Path) -> Result<u64, SliceError>;

    /// Write the windows starting at each of `frames` into a clip at `output`.
    async fn slice(&self, source: &Path, frames: &[u64], output: &Path) -> Result<(), SliceError>;
}
