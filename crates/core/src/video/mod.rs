//! Video I/O (spec §4.5 steps 1 and 8), grounded in the teacher's
//! `ffmpeg-next`-based reader/writer pair.
pub mod domain;
pub mod infrastructure;

pub use domain::video_reader::VideoReader;
pub use domain::video_writer::VideoWriter;
pub use infrastructure::ffmpeg_reader::FfmpegReader;
pub use infrastructure::ffmpeg_writer::FfmpegWriter;
