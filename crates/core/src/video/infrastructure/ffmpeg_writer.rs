use std::path::{Path, PathBuf};

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::VideoWriter;

/// Encodes video frames via ffmpeg-next with built-in audio muxing.
///
/// When the source video has an audio stream, it is copied directly
/// to the output — no separate ffmpeg binary or temp file needed.
pub struct FfmpegWriter {
    output_path: Option<PathBuf>,
    source_path: Option<PathBuf>,
    octx: Option<ffmpeg_next::format::context::Output>,
    encoder: Option<ffmpeg_next::codec::encoder::video::Encoder>,
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    width: u32,
    height: u32,
    fps: f64,
    frame_count: usize,
    video_stream_index: usize,
    audio_source_stream_idx: Option<usize>,
    audio_output_stream_idx: Option<usize>,
    audio_source_time_base: Option<ffmpeg_next::Rational>,
}

// Safety: FfmpegWriter is only used from a single thread at a time.
// The raw pointers inside ffmpeg types are not shared across threads.
unsafe impl Send for FfmpegWriter {}

impl FfmpegWriter {
    pub fn new() -> Self {
        Self {
            output_path: None,
            source_path: None,
            octx: None,
            encoder: None,
            scaler: None,
            width: 0,
            height: 0,
            fps: 0.0,
            frame_count: 0,
            video_stream_index: 0,
            audio_source_stream_idx: None,
            audio_output_stream_idx: None,
            audio_source_time_base: None,
        }
    }
}

impl Default for FfmpegWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoWriter for FfmpegWriter {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        self.width = metadata.width;
        self.height = metadata.height;
        self.fps = metadata.fps;
        self.output_path = Some(path.to_path_buf());
        self.source_path = metadata.source_path.clone();

        let mut octx = ffmpeg_next::format::output(path)?;

        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        // Use MPEG4 as a widely compatible encoder
        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4)
            .ok_or("MPEG4 encoder not found")?;

        let mut ost = octx.add_stream(Some(codec))?;

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;

        encoder_ctx.set_width(metadata.width);
        encoder_ctx.set_height(metadata.height);
        encoder_ctx.set_format(ffmpeg_next::format::Pixel::YUV420P);

        let fps_i = metadata.fps.round() as i32;
        let fps_i = if fps_i <= 0 { 30 } else { fps_i };

        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, fps_i));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(fps_i, 1)));

        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder_ctx.open_with(ffmpeg_next::Dictionary::new())?;
        ost.set_parameters(&encoder);

        self.video_stream_index = 0; // first stream

        // Add audio stream from source if available
        if let Some(ref source_path) = metadata.source_path {
            if let Ok(ictx_source) = ffmpeg_next::format::input(source_path) {
                if let Some(audio_stream) =
                    ictx_source.streams().best(ffmpeg_next::media::Type::Audio)
                {
                    let audio_idx = audio_stream.index();
                    let audio_tb = audio_stream.time_base();
                    let audio_params = audio_stream.parameters();

                    let mut audio_ost = octx
                        .add_stream(ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::None))?;
                    audio_ost.set_parameters(audio_params);
                    unsafe {
                        (*audio_ost.parameters().as_mut_ptr()).codec_tag = 0;
                    }
                    let audio_ost_idx = audio_ost.index();

                    self.audio_source_stream_idx = Some(audio_idx);
                    self.audio_output_stream_idx = Some(audio_ost_idx);
                    self.audio_source_time_base = Some(audio_tb);
                }
            }
        }

        octx.write_header()?;

        // Set up RGB -> YUV scaler
        let scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            metadata.width,
            metadata.height,
            ffmpeg_next::format::Pixel::YUV420P,
            metadata.width,
            metadata.height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        self.octx = Some(octx);
        self.encoder = Some(encoder);
        self.scaler = Some(scaler);
        self.frame_count = 0;

        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let encoder = self.encoder.as_mut().ok_or("FfmpegWriter: not opened")?;
        let scaler = self.scaler.as_mut().unwrap();
        let octx = self.octx.as_mut().unwrap();

        // Create RGB frame from input data
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
            ffmpeg_next::format::Pixel::RGB24,
            self.width,
            self.height,
        );

        let stride = rgb_frame.stride(0);
        let data = rgb_frame.data_mut(0);
        let src = frame.data();

        // Copy pixel data, respecting stride
        for row in 0..self.height as usize {
            let src_start = row * self.width as usize * 3;
            let dst_start = row * stride;
            data[dst_start..dst_start + self.width as usize * 3]
                .copy_from_slice(&src[src_start..src_start + self.width as usize * 3]);
        }

        // Convert RGB -> YUV
        let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
        scaler.run(&rgb_frame, &mut yuv_frame)?;
        yuv_frame.set_pts(Some(self.frame_count as i64));

        let fps_i = if self.fps.round() as i32 <= 0 {
            30
        } else {
            self.fps.round() as i32
        };

        encoder.send_frame(&yuv_frame)?;

        let ost_time_base = octx.stream(self.video_stream_index).unwrap().time_base();

        let mut encoded = ffmpeg_next::Packet::empty();
        while encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(self.video_stream_index);
            encoded.rescale_ts(ffmpeg_next::Rational(1, fps_i), ost_time_base);
            encoded.write_interleaved(octx)?;
        }

        self.frame_count += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(ref mut encoder) = self.encoder {
            let fps_i = if self.fps.round() as i32 <= 0 {
                30
            } else {
                self.fps.round() as i32
            };

            let octx = self.octx.as_mut().unwrap();
            let ost_time_base = octx.stream(self.video_stream_index).unwrap().time_base();

            // Flush encoder
            encoder.send_eof()?;
            let mut encoded = ffmpeg_next::Packet::empty();
            while encoder.receive_packet(&mut encoded).is_ok() {
                encoded.set_stream(self.video_stream_index);
                encoded.rescale_ts(ffmpeg_next::Rational(1, fps_i), ost_time_base);
                encoded.write_interleaved(octx)?;
            }

            // Copy audio packets from source before writing trailer
            if let (Some(audio_src_idx), Some(audio_ost_idx), Some(audio_src_tb), Some(ref source_path)) = (
                self.audio_source_stream_idx,
                self.audio_output_stream_idx,
                self.audio_source_time_base,
                &self.source_path,
            ) {
                match ffmpeg_next::format::input(source_path) {
                    Ok(mut ictx) => {
                        let ost_audio_tb = octx.stream(audio_ost_idx).unwrap().time_base();
                        for (stream, mut packet) in ictx.packets() {
                            if stream.index() != audio_src_idx {
                                continue;
                            }
                            packet.rescale_ts(audio_src_tb, ost_audio_tb);
                            packet.set_position(-1);
                            packet.set_stream(audio_ost_idx);
                            if let Err(e) = packet.write_interleaved(octx) {
                                log::warn!("Failed to write audio packet: {e}");
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        log::warn!("Audio muxing failed: could not reopen source: {e}");
                    }
                }
            }

            octx.write_trailer()?;
        }

        self.octx = None;
        self.encoder = None;
        self.scaler = None;
        self.source_path = None;
        self.output_path = None;
        self.audio_source_stream_idx = None;
        self.audio_output_stream_idx = None;
        self.audio_source_time_base = None;

        Ok(())
    }
}
