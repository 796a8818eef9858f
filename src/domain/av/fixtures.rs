//! Tiny generated videos whose frames can be told apart after a round trip
//! through the encoder: frame `n` is a flat picture of luma `shade_for(n)`.

use super::clips::drain_packets;
use ffmpeg::{codec, decoder, encoder, format, frame, media, Rational};
use ffmpeg_next as ffmpeg;
use std::path::Path;

pub const SIZE: u32 = 64;
pub const FPS: i32 = 25;
const BASE_SHADE: u64 = 16;
const SHADE_STEP: u64 = 7;
const MAX_FRAMES: u64 = 30;

pub fn shade_for(index: u64) -> u8 {
    (BASE_SHADE + index * SHADE_STEP) as u8
}

/// Write an MPEG-4 file of `frames` numbered frames at `path`.
pub fn numbered_video(path: &Path, frames: u64) -> Result<(), ffmpeg::Error> {
    assert!(frames <= MAX_FRAMES, "at most {} numbered frames", MAX_FRAMES);
    ffmpeg::init()?;

    let mut octx = format::output_as(&path, "mp4")?;
    let global_header = octx.format().flags().contains(format::flag::Flags::GLOBAL_HEADER);
    let codec = encoder::find(codec::Id::MPEG4).ok_or(ffmpeg::Error::EncoderNotFound)?;
    let time_base = Rational::new(1, FPS);

    let mut encoder = {
        let mut ost = octx.add_stream(codec)?;
        let mut settings = codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;
        settings.set_width(SIZE);
        settings.set_height(SIZE);
        settings.set_format(format::Pixel::YUV420P);
        settings.set_frame_rate(Some(Rational::new(FPS, 1)));
        settings.set_time_base(time_base);
        settings.set_bit_rate(4_000_000);
        if global_header {
            settings.set_flags(codec::flag::Flags::GLOBAL_HEADER);
        }
        let opened = settings.open_as(codec)?;
        ost.set_parameters(&opened);
        ost.set_time_base(time_base);
        opened
    };

    octx.write_header()?;
    let stream_time_base = octx
        .stream(0)
        .map(|stream| stream.time_base())
        .unwrap_or(time_base);

    for index in 0..frames {
        let mut picture = frame::Video::new(format::Pixel::YUV420P, SIZE, SIZE);
        picture.data_mut(0).fill(shade_for(index));
        picture.data_mut(1).fill(128);
        picture.data_mut(2).fill(128);
        picture.set_pts(Some(index as i64));
        encoder.send_frame(&picture)?;
        drain_packets(&mut encoder, &mut octx, time_base, stream_time_base)?;
    }

    encoder.send_eof()?;
    drain_packets(&mut encoder, &mut octx, time_base, stream_time_base)?;
    octx.write_trailer()
}

/// Decode `path` and read back the number of every frame, in order.
pub fn frame_numbers(path: &Path) -> Result<Vec<u64>, ffmpeg::Error> {
    ffmpeg::init()?;
    let mut ictx = format::input(&path)?;
    let (stream_index, parameters) = {
        let input = ictx
            .streams()
            .best(media::Type::Video)
            .ok_or(ffmpeg::Error::StreamNotFound)?;
        (input.index(), input.parameters())
    };
    let mut decoder = codec::context::Context::from_parameters(parameters)?
        .decoder()
        .video()?;

    let mut numbers = Vec::new();
    for (stream, packet) in ictx.packets() {
        if stream.index() == stream_index {
            decoder.send_packet(&packet)?;
            receive_numbers(&mut decoder, &mut numbers);
        }
    }
    decoder.send_eof()?;
    receive_numbers(&mut decoder, &mut numbers);
    Ok(numbers)
}

fn receive_numbers(decoder: &mut decoder::Video, numbers: &mut Vec<u64>) {
    let mut decoded = frame::Video::empty();
    while decoder.receive_frame(&mut decoded).is_ok() {
        numbers.push(number_of(&decoded));
    }
}

fn number_of(picture: &frame::Video) -> u64 {
    let width = picture.width() as usize;
    let height = picture.height() as usize;
    let stride = picture.stride(0);
    let luma = picture.data(0);

    let total: u64 = (0..height)
        .flat_map(|row| &luma[row * stride..row * stride + width])
        .map(|&value| value as u64)
        .sum();
    let mean = total as f64 / (width * height) as f64;
    ((mean - BASE_SHADE as f64) / SHADE_STEP as f64).round().max(0.0) as u64
}
