use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::camera::camera_manager::CameraManager;

pub const STREAM_BOUNDARY: &str = "frame";
pub const STREAM_CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

/// Consecutive empty ticks before the stream tries to reopen the device.
pub const MAX_CONSECUTIVE_ERRORS: u32 = 10;
pub const EMPTY_TICK_PAUSE: Duration = Duration::from_millis(100);

/// Wraps one JPEG as a part of a `multipart/x-mixed-replace` body.
pub fn multipart_part(jpeg: &[u8]) -> Vec<u8> {
    let header = format!("--{STREAM_BOUNDARY}\r\nContent-Type: image/jpeg\r\n\r\n");
    let mut part = Vec::with_capacity(header.len() + jpeg.len() + 2);
    part.extend_from_slice(header.as_bytes());
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    part
}

/// Where the stream delivers its parts.
pub trait FrameSink {
    /// Returns `false` once the consumer is gone.
    fn send(&mut self, part: Vec<u8>) -> bool;
    fn is_connected(&self) -> bool;
}

#[derive(Debug, PartialEq)]
pub enum Tick {
    Frame(Vec<u8>),
    Empty { reinitialized: bool },
    Finished,
}

#[derive(Debug, Default, PartialEq)]
pub struct StreamSummary {
    pub frames_sent: usize,
    pub reinitializations: usize,
}

/// Pulls frames from a camera manager until the consumer disconnects or the
/// manager is released.
pub struct FrameStream {
    camera: Arc<CameraManager>,
    consecutive_errors: u32,
    empty_pause: Duration,
}

impl FrameStream {
    pub fn new(camera: Arc<CameraManager>) -> Self {
        Self {
            camera,
            consecutive_errors: 0,
            empty_pause: EMPTY_TICK_PAUSE,
        }
    }

    pub fn with_empty_pause(mut self, pause: Duration) -> Self {
        self.empty_pause = pause;
        self
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    pub fn tick(&mut self) -> Tick {
        if self.camera.is_released() {
            return Tick::Finished;
        }
        if let Some(jpeg) = self.camera.get_frame() {
            self.consecutive_errors = 0;
            return Tick::Frame(jpeg);
        }

        self.consecutive_errors += 1;
        let mut reinitialized = false;
        if self.consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
            let device = self.camera.device_id();
            log::warn!(
                "{} consecutive empty frames, reopening camera {device}",
                self.consecutive_errors
            );
            match self.camera.open(device) {
                Ok(()) => log::info!("Camera {device} reinitialized"),
                Err(e) => log::warn!("Reinitializing camera {device} failed: {e}"),
            }
            self.consecutive_errors = 0;
            reinitialized = true;
        }
        thread::sleep(self.empty_pause);
        Tick::Empty { reinitialized }
    }

    /// Blocking loop; disconnection is only noticed between frames.
    pub fn run(&mut self, sink: &mut dyn FrameSink) -> StreamSummary {
        log::info!("Stream client connected");
        let mut summary = StreamSummary::default();
        while sink.is_connected() {
            match self.tick() {
                Tick::Frame(jpeg) => {
                    if !sink.send(multipart_part(&jpeg)) {
                        break;
                    }
                    summary.frames_sent += 1;
                }
                Tick::Empty { reinitialized } => {
                    if reinitialized {
                        summary.reinitializations += 1;
                    }
                }
                Tick::Finished => {
                    log::info!("Camera released, ending stream");
                    break;
                }
            }
        }
        log::info!(
            "Stream client disconnected after {} frame(s)",
            summary.frames_sent
        );
        summary
    }
}
