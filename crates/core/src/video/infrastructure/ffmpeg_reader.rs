use std::path::Path;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_error::VideoError;
use crate::video::domain::video_reader::VideoReader;

/// Decodes video frames via ffmpeg-next (libavformat + libavcodec).
///
/// Converts each decoded frame to RGB24 and wraps it in a [`Frame`].
pub struct FfmpegReader {
    input_ctx: Option<ffmpeg_next::format::context::Input>,
    video_stream_index: usize,
}

// Safety: FfmpegReader is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self {
            input_ctx: None,
            video_stream_index: 0,
        }
    }
}

impl Default for FfmpegReader {
    fn default() -> Self {
        Self::new()
    }
}

fn open_error(path: &Path, e: impl std::fmt::Display) -> VideoError {
    VideoError::Open {
        path: path.to_path_buf(),
        reason: e.to_string(),
    }
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, VideoError> {
        ffmpeg_next::init().map_err(|e| open_error(path, e))?;

        let ictx = ffmpeg_next::format::input(path).map_err(|e| open_error(path, e))?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or(VideoError::NoVideoStream)?;

        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())
            .map_err(|e| open_error(path, e))?;
        let decoder = codec_ctx.decoder().video().map_err(|e| open_error(path, e))?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };

        let reported_frames = stream.frames().max(0) as usize;
        let total_frames = if reported_frames > 0 {
            reported_frames
        } else {
            // Some containers (e.g. webm, raw streams) carry no frame count.
            let counted = count_video_packets(path, video_stream_index)?;
            log::debug!("{} reports no frame count, demuxed {counted}", path.display());
            counted
        };

        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            fps,
            total_frames,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };

        self.video_stream_index = video_stream_index;
        self.input_ctx = Some(ictx);

        Ok(metadata)
    }

    fn frames(&mut self) -> Box<dyn Iterator<Item = Result<Frame, VideoError>> + '_> {
        let Some(ictx) = self.input_ctx.as_mut() else {
            return Box::new(std::iter::once(Err(VideoError::NotOpened)));
        };

        match FfmpegFrameIter::new(ictx, self.video_stream_index) {
            Ok(iter) => Box::new(iter),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    fn close(&mut self) {
        self.input_ctx = None;
    }
}

/// Counts packets of one stream without decoding them.
fn count_video_packets(path: &Path, stream_index: usize) -> Result<usize, VideoError> {
    let mut ictx = ffmpeg_next::format::input(path).map_err(|e| open_error(path, e))?;
    Ok(ictx
        .packets()
        .filter(|(stream, _)| stream.index() == stream_index)
        .count())
}

/// Lazy iterator that decodes video frames one at a time, avoiding the need
/// to buffer the entire video in memory.
struct FfmpegFrameIter<'a> {
    ictx: &'a mut ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    width: u32,
    height: u32,
    video_stream_index: usize,
    frame_index: usize,
    flushing: bool,
    done: bool,
}

impl<'a> FfmpegFrameIter<'a> {
    fn new(
        ictx: &'a mut ffmpeg_next::format::context::Input,
        video_stream_index: usize,
    ) -> Result<Self, VideoError> {
        let setup_err = |e: ffmpeg_next::Error| VideoError::Decode {
            frame: 0,
            reason: e.to_string(),
        };

        let parameters = ictx
            .stream(video_stream_index)
            .ok_or(VideoError::NoVideoStream)?
            .parameters();
        let codec_ctx =
            ffmpeg_next::codec::context::Context::from_parameters(parameters).map_err(setup_err)?;
        let decoder = codec_ctx.decoder().video().map_err(setup_err)?;

        let width = decoder.width();
        let height = decoder.height();

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )
        .map_err(setup_err)?;

        Ok(Self {
            ictx,
            decoder,
            scaler,
            width,
            height,
            video_stream_index,
            frame_index: 0,
            flushing: false,
            done: false,
        })
    }

    fn try_receive(&mut self) -> Option<Result<Frame, VideoError>> {
        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return None;
        }

        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        if let Err(e) = self.scaler.run(&decoded, &mut rgb_frame) {
            return Some(Err(VideoError::Decode {
                frame: self.frame_index,
                reason: e.to_string(),
            }));
        }

        let pixels = extract_rgb_pixels(&rgb_frame, self.width, self.height);
        let frame = Frame::new(pixels, self.width, self.height, 3, self.frame_index);
        self.frame_index += 1;
        Some(Ok(frame))
    }
}

impl Iterator for FfmpegFrameIter<'_> {
    type Item = Result<Frame, VideoError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if let Some(result) = self.try_receive() {
            return Some(result);
        }

        if self.flushing {
            self.done = true;
            return None;
        }

        loop {
            let Some((stream, packet)) = self.ictx.packets().next() else {
                let _ = self.decoder.send_eof();
                self.flushing = true;
                if let Some(result) = self.try_receive() {
                    return Some(result);
                }
                self.done = true;
                return None;
            };

            if stream.index() != self.video_stream_index {
                continue;
            }

            // Corrupt packets are skipped; the decoder resyncs on the next keyframe.
            if self.decoder.send_packet(&packet).is_err() {
                continue;
            }

            if let Some(result) = self.try_receive() {
                return Some(result);
            }
        }
    }
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer.
///
/// ffmpeg frames may have padding bytes at the end of each row (stride > width*3).
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}
