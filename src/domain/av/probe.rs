use crate::domain::errors::SliceError;
use ffmpeg_next as ffmpeg;
use std::path::Path;
use tokio::task;

/// Number of frames in the best video stream of `path`.
///
/// Uses the container's frame count when it carries one, otherwise counts
/// the stream's packets.
pub async fn frame_count(path: &Path) -> Result<u64, SliceError> {
    let path_clone = path.to_path_buf();

    task::spawn_blocking(move || {
        ffmpeg::init().map_err(|e| SliceError::unreadable(&path_clone, e))?;
        let mut context =
            ffmpeg::format::input(&path_clone).map_err(|e| SliceError::unreadable(&path_clone, e))?;

        let (stream_index, declared) = {
            let stream = context
                .streams()
                .best(ffmpeg::media::Type::Video)
                .ok_or_else(|| SliceError::unreadable(&path_clone, "no video stream found"))?;
            (stream.index(), stream.frames())
        };

        if declared > 0 {
            return Ok(declared as u64);
        }

        let counted = context
            .packets()
            .filter(|(stream, _)| stream.index() == stream_index)
            .count();
        Ok(counted as u64)
    })
    .await
    .map_err(|e| SliceError::unreadable(path, e))?
}

/// Frame rate of the best video stream, if the container reports a usable one.
pub fn frame_rate(stream: &ffmpeg::format::stream::Stream) -> Option<ffmpeg::Rational> {
    [stream.avg_frame_rate(), stream.rate()]
        .into_iter()
        .find(|rate| rate.numerator() > 0 && rate.denominator() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let result = frame_count(&dir.path().join("nope.mp4")).await;
        assert!(matches!(result, Err(SliceError::SourceUnreadable { .. })));
    }

    #[tokio::test]
    async fn test_garbage_file_is_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.mp4");
        std::fs::write(&path, b"definitely not a video").unwrap();
        let result = frame_count(&path).await;
        assert!(matches!(result, Err(SliceError::SourceUnreadable { .. })));
    }
}
