use super::probe::frame_rate;
use crate::domain::errors::SliceError;
use crate::domain::windows::{WindowCursor, WindowPlan};
use ffmpeg::{codec, encoder, format, frame, software, Rational};
use ffmpeg_next as ffmpeg;
use std::path::Path;
use tokio::task;

const CLIP_BIT_RATE: usize = 4_000_000;

/// Encode the planned windows of `source` into an MP4 at `output`.
///
/// The clip keeps the source frame rate, falling back to `fallback_fps`
/// when the source does not report one. Returns the number of frames written.
pub async fn write_clip(
    source: &Path,
    output: &Path,
    plan: WindowPlan,
    fallback_fps: u32,
) -> Result<u64, SliceError> {
    let source = source.to_path_buf();
    let target = output.to_path_buf();
    let output = target.clone();

    task::spawn_blocking(move || encode_windows(&source, &output, &plan, fallback_fps))
        .await
        .map_err(|e| SliceError::write_failed(target, e))?
}

fn encode_windows(
    source: &Path,
    output: &Path,
    plan: &WindowPlan,
    fallback_fps: u32,
) -> Result<u64, SliceError> {
    let unreadable = |e: ffmpeg::Error| SliceError::unreadable(source, e);
    let write_failed = |e: ffmpeg::Error| SliceError::write_failed(output, e);

    ffmpeg::init().map_err(unreadable)?;
    let mut ictx = format::input(&source).map_err(unreadable)?;

    let (stream_index, rate, parameters) = {
        let input = ictx
            .streams()
            .best(ffmpeg::media::Type::Video)
            .ok_or_else(|| SliceError::unreadable(source, "no video stream found"))?;
        (
            input.index(),
            frame_rate(&input).unwrap_or_else(|| Rational::new(fallback_fps.max(1) as i32, 1)),
            input.parameters(),
        )
    };

    let mut decoder = codec::context::Context::from_parameters(parameters)
        .and_then(|context| context.decoder().video())
        .map_err(unreadable)?;

    let mut octx = format::output_as(&output, "mp4").map_err(write_failed)?;
    let global_header = octx.format().flags().contains(format::flag::Flags::GLOBAL_HEADER);
    let codec = encoder::find(codec::Id::MPEG4)
        .ok_or_else(|| SliceError::write_failed(output, "MPEG-4 encoder not available"))?;

    let time_base = rate.invert();
    let mut encoder = {
        let mut ost = octx.add_stream(codec).map_err(write_failed)?;
        let mut settings = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(write_failed)?;
        settings.set_width(decoder.width());
        settings.set_height(decoder.height());
        settings.set_aspect_ratio(decoder.aspect_ratio());
        settings.set_format(format::Pixel::YUV420P);
        settings.set_frame_rate(Some(rate));
        settings.set_time_base(time_base);
        settings.set_bit_rate(CLIP_BIT_RATE);
        if global_header {
            settings.set_flags(codec::flag::Flags::GLOBAL_HEADER);
        }

        let opened = settings.open_as(codec).map_err(write_failed)?;
        ost.set_parameters(&opened);
        ost.set_time_base(time_base);
        opened
    };

    octx.write_header().map_err(write_failed)?;
    let stream_time_base = octx
        .stream(0)
        .map(|stream| stream.time_base())
        .unwrap_or(time_base);

    let mut scaler = software::scaling::Context::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        format::Pixel::YUV420P,
        decoder.width(),
        decoder.height(),
        software::scaling::flag::Flags::BILINEAR,
    )
    .map_err(unreadable)?;

    let mut cursor = WindowCursor::new(plan);
    let mut decoded = frame::Video::empty();
    let mut index: u64 = 0;
    let mut written: i64 = 0;

    let mut emit = |mut picture: frame::Video| -> Result<(), ffmpeg::Error> {
        picture.set_pts(Some(written));
        written += 1;
        encoder.send_frame(&picture)?;
        drain_packets(&mut encoder, &mut octx, time_base, stream_time_base)
    };

    let mut feed = |decoder: &mut ffmpeg::decoder::Video,
                    cursor: &mut WindowCursor<frame::Video>,
                    index: &mut u64|
     -> Result<(), SliceError> {
        while decoder.receive_frame(&mut decoded).is_ok() {
            if cursor.wants(*index) {
                let mut picture = frame::Video::empty();
                scaler.run(&decoded, &mut picture).map_err(unreadable)?;
                cursor.push(*index, picture, &mut emit).map_err(write_failed)?;
            }
            *index += 1;
        }
        Ok(())
    };

    for (stream, packet) in ictx.packets() {
        if cursor.is_done() {
            break;
        }
        if stream.index() != stream_index {
            continue;
        }
        if let Err(e) = decoder.send_packet(&packet) {
            tracing::warn!(source = %source.display(), frame = index, "skipping undecodable packet: {}", e);
            continue;
        }
        feed(&mut decoder, &mut cursor, &mut index)?;
    }

    if !cursor.is_done() {
        decoder.send_eof().map_err(unreadable)?;
        feed(&mut decoder, &mut cursor, &mut index)?;
    }

    encoder.send_eof().map_err(write_failed)?;
    drain_packets(&mut encoder, &mut octx, time_base, stream_time_base).map_err(write_failed)?;
    octx.write_trailer().map_err(write_failed)?;

    Ok(written as u64)
}

pub(super) fn drain_packets(
    encoder: &mut encoder::Video,
    octx: &mut format::context::Output,
    time_base: Rational,
    stream_time_base: Rational,
) -> Result<(), ffmpeg::Error> {
    let mut packet = ffmpeg::Packet::empty();
    while encoder.receive_packet(&mut packet).is_ok() {
        packet.set_stream(0);
        packet.rescale_ts(time_base, stream_time_base);
        packet.write_interleaved(octx)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::windows::plan_windows;

    #[tokio::test]
    async fn test_unreadable_source_fails_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("missing.mp4");
        let output = dir.path().join("clip.mp4");

        let result = write_clip(&source, &output, plan_windows(&[1], 5, 10), 25).await;

        assert!(matches!(result, Err(SliceError::SourceUnreadable { .. })));
        assert!(!output.exists());
    }
}
