//! RTSP re-broadcast (spec §4.7, interface only), grounded in
//! `original_source/yoi/stream/rtsp_pusher.py`.
pub mod infrastructure;

pub use infrastructure::rtsp_pusher::FfmpegRtspPusher;

use std::time::{Duration, Instant};

use crate::shared::frame::Frame;

/// Live re-broadcast sink contract (spec §4.7).
pub trait RtspSink: Send {
    fn start(&mut self) -> bool;
    fn push(&mut self, frame: &Frame) -> bool;
    fn restart(&mut self) -> bool;
    fn stop(&mut self);
}

/// Wraps an [`RtspSink`] with the Orchestrator's health-window policy: a
/// bounded restart attempt per `recover_cooldown_seconds`, a one-time warning
/// once downtime exceeds `drop_warn_seconds`, and a recovery log on the next
/// successful push (spec §4.7). Mirrors the wrapper shape of
/// [`crate::tracking::infrastructure::reid_layer::ReidLayer`].
pub struct RtspHealthTracker {
    sink: Box<dyn RtspSink>,
    recover_cooldown: Duration,
    drop_warn: Duration,
    first_fail_at: Option<Instant>,
    last_restart_attempt: Option<Instant>,
    drop_warned: bool,
    successes: u64,
    failures: u64,
    recoveries: u64,
}

impl RtspHealthTracker {
    pub fn new(sink: Box<dyn RtspSink>, recover_cooldown_seconds: f64, drop_warn_seconds: f64) -> Self {
        Self {
            sink,
            recover_cooldown: Duration::from_secs_f64(recover_cooldown_seconds.max(0.0)),
            drop_warn: Duration::from_secs_f64(drop_warn_seconds.max(0.0)),
            first_fail_at: None,
            last_restart_attempt: None,
            drop_warned: false,
            successes: 0,
            failures: 0,
            recoveries: 0,
        }
    }

    pub fn start(&mut self) -> bool {
        self.sink.start()
    }

    pub fn stop(&mut self) {
        self.sink.stop();
    }

    pub fn successes(&self) -> u64 {
        self.successes
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn recoveries(&self) -> u64 {
        self.recoveries
    }

    /// Pushes one frame and applies the health-window policy to the result.
    pub fn push(&mut self, frame: &Frame) -> bool {
        let ok = self.sink.push(frame);
        self.record(ok);
        ok
    }

    fn record(&mut self, success: bool) {
        let now = Instant::now();
        if success {
            self.successes += 1;
            if self.first_fail_at.take().is_some() {
                self.recoveries += 1;
                log::info!("rtsp push recovered");
            }
            self.drop_warned = false;
            return;
        }

        self.failures += 1;
        let first_fail_at = *self.first_fail_at.get_or_insert(now);

        if !self.drop_warned && now.duration_since(first_fail_at) >= self.drop_warn {
            log::warn!(
                "rtsp push has been failing for {:.1}s",
                now.duration_since(first_fail_at).as_secs_f64()
            );
            self.drop_warned = true;
        }

        let due_for_restart = match self.last_restart_attempt {
            Some(attempted) => now.duration_since(attempted) >= self.recover_cooldown,
            None => true,
        };
        if due_for_restart {
            self.last_restart_attempt = Some(now);
            self.sink.restart();
        }
    }
}
