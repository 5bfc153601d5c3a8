use std::io::Write as _;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::time::Duration;

use crate::shared::frame::Frame;
use crate::stream::RtspSink;

/// FFmpeg encode parameters for the RTSP push, grounded in
/// `original_source/yoi/stream/rtsp_pusher.py::RTSPPushConfig`.
#[derive(Clone, Debug)]
pub struct RtspPushConfig {
    pub server_url: String,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub bitrate: String,
    pub codec: String,
    pub preset: String,
    pub pix_fmt: String,
    pub rtsp_transport: String,
}

impl RtspPushConfig {
    pub fn new(server_url: impl Into<String>, fps: u32, width: u32, height: u32) -> Self {
        Self {
            server_url: server_url.into(),
            fps,
            width,
            height,
            bitrate: "2M".into(),
            codec: "libx264".into(),
            preset: "ultrafast".into(),
            pix_fmt: "yuv420p".into(),
            rtsp_transport: "tcp".into(),
        }
    }
}

/// Pushes annotated frames to an RTSP server by piping rawvideo into an
/// `ffmpeg` subprocess's stdin (spec §4.7), grounded in
/// `original_source/yoi/stream/rtsp_pusher.py`.
pub struct FfmpegRtspPusher {
    config: RtspPushConfig,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    frames_pushed: u64,
}

impl FfmpegRtspPusher {
    pub fn new(config: RtspPushConfig) -> Self {
        Self {
            config,
            child: None,
            stdin: None,
            frames_pushed: 0,
        }
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new("ffmpeg");
        cmd.args([
            "-y",
            "-loglevel",
            "warning",
            "-f",
            "rawvideo",
            "-vcodec",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "-s",
            &format!("{}x{}", self.config.width, self.config.height),
            "-use_wallclock_as_timestamps",
            "1",
            "-fflags",
            "+genpts",
            "-r",
            &self.config.fps.to_string(),
            "-i",
            "-",
            "-an",
            "-c:v",
            &self.config.codec,
            "-preset",
            &self.config.preset,
            "-tune",
            "zerolatency",
            "-b:v",
            &self.config.bitrate,
            "-pix_fmt",
            &self.config.pix_fmt,
            "-g",
            &(self.config.fps * 2).to_string(),
            "-f",
            "rtsp",
            "-rtsp_transport",
            &self.config.rtsp_transport,
            "-rtsp_flags",
            "prefer_tcp",
            &self.config.server_url,
        ]);
        cmd.stdin(Stdio::piped()).stdout(Stdio::null()).stderr(Stdio::null());
        cmd
    }
}

impl RtspSink for FfmpegRtspPusher {
    fn start(&mut self) -> bool {
        if self.child.is_some() {
            log::warn!("rtsp pusher already running");
            return true;
        }

        const MAX_ATTEMPTS: u32 = 5;
        const STARTUP_PROBE: Duration = Duration::from_secs(1);

        for attempt in 1..=MAX_ATTEMPTS {
            log::info!(
                "starting rtsp push to {} (attempt {attempt}/{MAX_ATTEMPTS})",
                self.config.server_url
            );
            let mut child = match self.build_command().spawn() {
                Ok(child) => child,
                Err(err) => {
                    log::error!("failed to spawn ffmpeg for rtsp push: {err}");
                    if attempt < MAX_ATTEMPTS {
                        std::thread::sleep(Duration::from_secs(1));
                        continue;
                    }
                    return false;
                }
            };

            std::thread::sleep(STARTUP_PROBE);
            match child.try_wait() {
                Ok(Some(status)) => {
                    log::warn!("ffmpeg exited during rtsp startup with status {status}");
                    if attempt < MAX_ATTEMPTS {
                        std::thread::sleep(Duration::from_secs(1));
                        continue;
                    }
                    return false;
                }
                Ok(None) => {
                    self.stdin = child.stdin.take();
                    self.child = Some(child);
                    self.frames_pushed = 0;
                    log::info!("rtsp pusher started successfully");
                    return true;
                }
                Err(err) => {
                    log::error!("error probing ffmpeg rtsp process: {err}");
                    if attempt < MAX_ATTEMPTS {
                        std::thread::sleep(Duration::from_secs(1));
                        continue;
                    }
                    return false;
                }
            }
        }
        false
    }

    fn push(&mut self, frame: &Frame) -> bool {
        let Some(child) = self.child.as_mut() else {
            log::error!("rtsp pusher not running; call start() first");
            return false;
        };
        if let Ok(Some(status)) = child.try_wait() {
            log::error!("ffmpeg rtsp process died unexpectedly with status {status}");
            self.child = None;
            self.stdin = None;
            return false;
        }
        let Some(stdin) = self.stdin.as_mut() else {
            return false;
        };
        match stdin.write_all(frame.data()) {
            Ok(()) => {
                self.frames_pushed += 1;
                true
            }
            Err(err) => {
                log::error!("rtsp pipe write failed (stream likely disconnected): {err}");
                self.child = None;
                self.stdin = None;
                false
            }
        }
    }

    fn restart(&mut self) -> bool {
        log::info!("restarting rtsp pusher");
        self.stop();
        self.start()
    }

    fn stop(&mut self) {
        self.stdin = None; // dropping closes the pipe, signalling EOF to ffmpeg
        if let Some(mut child) = self.child.take() {
            log::info!("stopping rtsp pusher (pushed {} frames)", self.frames_pushed);
            match child.try_wait() {
                Ok(Some(_)) => {}
                _ => {
                    std::thread::sleep(Duration::from_millis(200));
                    if child.try_wait().ok().flatten().is_none() {
                        let _ = child.kill();
                    }
                }
            }
            let _ = child.wait();
        }
    }
}

impl Drop for FfmpegRtspPusher {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_without_start_fails() {
        let mut pusher = FfmpegRtspPusher::new(RtspPushConfig::new("rtsp://localhost:6554/test", 25, 16, 16));
        let frame = Frame::new(vec![0u8; 16 * 16 * 3], 16, 16, 3, 0);
        assert!(!pusher.push(&frame));
    }

    #[test]
    fn build_command_includes_resolution_and_fps() {
        let pusher = FfmpegRtspPusher::new(RtspPushConfig::new("rtsp://localhost:6554/test", 25, 1920, 1080));
        let cmd = pusher.build_command();
        let args: Vec<String> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert!(args.iter().any(|a| a == "1920x1080"));
        assert!(args.iter().any(|a| a == "25"));
    }
}
