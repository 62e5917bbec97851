//! MPEG-TS codec: ffmpeg-next decodes, the ffmpeg CLI encodes.

use crate::domain::effect::Frame;
use crate::domain::PipelineError;
use crate::ports::codec::SegmentCodec;
use ffmpeg_next as ffmpeg;
use ffmpeg::format::Pixel;
use ffmpeg::software::scaling::{context::Context as Scaler, flag::Flags};
use ffmpeg::util::frame::Video as VideoFrame;
use std::io::{BufWriter, Write};
use std::process::Command;

#[derive(Debug, Clone)]
pub struct FfmpegCodec {
    /// x264 constant rate factor.
    pub crf: u8,
    pub preset: String,
}

impl Default for FfmpegCodec {
    fn default() -> Self {
        Self {
            crf: 25,
            preset: "veryfast".to_string(),
        }
    }
}

impl FfmpegCodec {
    pub fn new(crf: u8) -> Self {
        Self {
            crf,
            ..Self::default()
        }
    }
}

fn to_rgb_image(rgb: &VideoFrame) -> Option<Frame> {
    let (width, height) = (rgb.width(), rgb.height());
    let row = width as usize * 3;
    let stride = rgb.stride(0);
    let data = rgb.data(0);

    let mut packed = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        packed.extend_from_slice(&data[y * stride..y * stride + row]);
    }
    Frame::from_raw(width, height, packed)
}

fn drain_decoder(
    decoder: &mut ffmpeg::decoder::Video,
    scaler: &mut Scaler,
    frames: &mut Vec<Frame>,
) -> Result<(), PipelineError> {
    let mut decoded = VideoFrame::empty();
    while decoder.receive_frame(&mut decoded).is_ok() {
        let mut rgb = VideoFrame::empty();
        scaler.run(&decoded, &mut rgb)?;
        let frame = to_rgb_image(&rgb)
            .ok_or_else(|| PipelineError::Decode("short RGB frame buffer".to_string()))?;
        frames.push(frame);
    }
    Ok(())
}

impl SegmentCodec for FfmpegCodec {
    fn decode(&self, raw: &[u8]) -> Result<Vec<Frame>, PipelineError> {
        ffmpeg::init()?;

        // libavformat wants a seekable file for MPEG-TS probing.
        let mut source = tempfile::Builder::new().suffix(".ts").tempfile()?;
        source.write_all(raw)?;
        source.flush()?;

        let mut ictx = ffmpeg::format::input(&source.path())?;
        let (stream_index, parameters) = {
            let stream = ictx
                .streams()
                .best(ffmpeg::media::Type::Video)
                .ok_or(ffmpeg::Error::StreamNotFound)?;
            (stream.index(), stream.parameters())
        };

        let context = ffmpeg::codec::context::Context::from_parameters(parameters)?;
        let mut decoder = context.decoder().video()?;
        let mut scaler = Scaler::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            Flags::BILINEAR,
        )?;

        let mut frames = Vec::new();
        for (stream, packet) in ictx.packets() {
            if stream.index() == stream_index {
                decoder.send_packet(&packet)?;
                drain_decoder(&mut decoder, &mut scaler, &mut frames)?;
            }
        }
        decoder.send_eof()?;
        drain_decoder(&mut decoder, &mut scaler, &mut frames)?;

        Ok(frames)
    }

    fn encode(&self, frames: &[Frame], frame_rate: u32) -> Result<Vec<u8>, PipelineError> {
        let first = frames
            .first()
            .ok_or_else(|| PipelineError::Encode("no frames to encode".to_string()))?;
        let (width, height) = first.dimensions();

        // Intermediate rawvideo stream; removed when `staging` drops.
        let staging = tempfile::Builder::new().suffix(".rgb").tempfile()?;
        {
            let mut writer = BufWriter::new(staging.as_file());
            for frame in frames {
                if frame.dimensions() != (width, height) {
                    return Err(PipelineError::Encode(format!(
                        "frame size changed mid-segment: {:?} vs {:?}",
                        frame.dimensions(),
                        (width, height)
                    )));
                }
                writer.write_all(frame.as_raw())?;
            }
            writer.flush()?;
        }

        let output = Command::new("ffmpeg")
            .arg("-y")
            .arg("-loglevel")
            .arg("warning")
            .arg("-f")
            .arg("rawvideo")
            .arg("-pix_fmt")
            .arg("rgb24")
            .arg("-s")
            .arg(format!("{}x{}", width, height))
            .arg("-r")
            .arg(frame_rate.to_string())
            .arg("-i")
            .arg(staging.path())
            .arg("-c:v")
            .arg("libx264")
            .arg("-preset")
            .arg(&self.preset)
            .arg("-crf")
            .arg(self.crf.to_string())
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg("-f")
            .arg("mpegts")
            .arg("pipe:1")
            .output()
            .map_err(|e| PipelineError::Encode(format!("failed to run ffmpeg: {}", e)))?;

        if !output.status.success() {
            return Err(PipelineError::Encode(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        if output.stdout.is_empty() {
            return Err(PipelineError::Encode("encoder produced zero bytes".to_string()));
        }
        Ok(output.stdout)
    }
}
