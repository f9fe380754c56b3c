use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::camera::domain::camera_state::CameraState;
use crate::camera::domain::capture_device::{CaptureDevice, CaptureFormat, DeviceOpener};
use crate::camera::overlay::OverlayRenderer;
use crate::media::infrastructure::image_codec::encode_jpeg;
use crate::pipeline::frame_analyzer::FrameAnalyzer;
use crate::shared::analysis_result::FrameAnalysisResult;
use crate::shared::constants::STREAM_JPEG_QUALITY;
use crate::shared::error::CameraError;
use crate::shared::frame::Frame;

/// Timing and capture parameters for a [`CameraManager`].
#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    pub format: CaptureFormat,
    /// Minimum time between hardware reads; faster callers get the cache.
    pub frame_interval: Duration,
    /// Minimum time between detection runs while detection is enabled.
    pub detection_interval: Duration,
    pub capture_attempts: u32,
    pub retry_pause: Duration,
    /// Wait after closing a device before opening the next one.
    pub release_grace: Duration,
    /// Pause between disabling detection and reopening on a device switch.
    pub switch_pause: Duration,
    pub jpeg_quality: u8,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            format: CaptureFormat::default(),
            frame_interval: Duration::from_millis(33),
            detection_interval: Duration::from_millis(500),
            capture_attempts: 3,
            retry_pause: Duration::from_millis(10),
            release_grace: Duration::from_millis(500),
            switch_pause: Duration::from_millis(100),
            jpeg_quality: STREAM_JPEG_QUALITY,
        }
    }
}

/// Latest detection output as exposed to polling clients.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionSnapshot {
    pub detection_enabled: bool,
    pub results: Option<FrameAnalysisResult>,
}

struct CameraSession {
    state: CameraState,
    device_id: u32,
    device: Option<Box<dyn CaptureDevice>>,
    last_frame: Option<Frame>,
    last_frame_at: Option<Instant>,
    last_encoded: Option<Vec<u8>>,
    detection_enabled: bool,
    last_result: Option<FrameAnalysisResult>,
    last_detection_at: Option<Instant>,
}

impl CameraSession {
    fn new(device_id: u32) -> Self {
        Self {
            state: CameraState::Uninitialized,
            device_id,
            device: None,
            last_frame: None,
            last_frame_at: None,
            last_encoded: None,
            detection_enabled: false,
            last_result: None,
            last_detection_at: None,
        }
    }

    fn clear_detection(&mut self) {
        self.last_result = None;
        self.last_detection_at = None;
    }
}

/// Owns one capture device and everything derived from it: the frame
/// cache, the detection toggle and the last detection result.
///
/// Every public method holds the session mutex for its whole duration, so
/// device switches, releases and frame reads never interleave.
pub struct CameraManager {
    session: Mutex<CameraSession>,
    opener: Arc<dyn DeviceOpener>,
    analyzer: Arc<dyn FrameAnalyzer>,
    overlay: OverlayRenderer,
    config: CameraConfig,
}

impl CameraManager {
    pub fn new(
        opener: Arc<dyn DeviceOpener>,
        analyzer: Arc<dyn FrameAnalyzer>,
        overlay: OverlayRenderer,
        config: CameraConfig,
    ) -> Self {
        Self {
            session: Mutex::new(CameraSession::new(0)),
            opener,
            analyzer,
            overlay,
            config,
        }
    }

    fn session(&self) -> MutexGuard<'_, CameraSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> CameraState {
        self.session().state
    }

    pub fn is_released(&self) -> bool {
        self.state().is_released()
    }

    pub fn device_id(&self) -> u32 {
        self.session().device_id
    }

    /// Close any open device, wait the grace delay, then open `device_id`
    /// and verify it with one read.
    pub fn open(&self, device_id: u32) -> Result<(), CameraError> {
        let mut session = self.session();
        self.open_locked(&mut session, device_id)
    }

    fn open_locked(&self, session: &mut CameraSession, device_id: u32) -> Result<(), CameraError> {
        if session.state.is_released() {
            return Err(CameraError::Released);
        }

        if let Some(previous) = session.device.take() {
            session.state = CameraState::Reinitializing;
            drop(previous);
            log::info!("Released camera {}", session.device_id);
            thread::sleep(self.config.release_grace);
        } else {
            session.state = CameraState::Opening;
        }
        session.device_id = device_id;
        session.clear_detection();

        let mut device = match self.opener.open(device_id, &self.config.format) {
            Ok(device) => device,
            Err(e) => {
                session.state = CameraState::Uninitialized;
                log::warn!("Could not open camera {device_id}: {e}");
                return Err(e);
            }
        };
        match device.read() {
            Ok(frame) => {
                log::info!(
                    "Camera {device_id} ready ({}x{})",
                    frame.width(),
                    frame.height()
                );
                session.last_frame = Some(frame);
                session.last_frame_at = Some(Instant::now());
                session.last_encoded = None;
                session.device = Some(device);
                session.state = CameraState::Ready;
                Ok(())
            }
            Err(e) => {
                session.state = CameraState::Uninitialized;
                log::warn!("Camera {device_id} opened but returned no frame: {e}");
                Err(CameraError::Unavailable {
                    device: device_id,
                    reason: format!("verification read failed: {e}"),
                })
            }
        }
    }

    /// The next JPEG for the live stream, or `None` when there has never
    /// been a frame to show.
    ///
    /// Calls arriving within `frame_interval` of the last capture get the
    /// previous output again, byte for byte. A failed capture falls back to
    /// the last good frame.
    pub fn get_frame(&self) -> Option<Vec<u8>> {
        let mut session = self.session();
        if session.state.is_released() {
            return None;
        }

        let now = Instant::now();
        let fresh = session
            .last_frame_at
            .is_some_and(|at| now.duration_since(at) < self.config.frame_interval);
        if fresh || session.device.is_none() {
            if let Some(encoded) = &session.last_encoded {
                return Some(encoded.clone());
            }
            return self.encode_cached(&mut session);
        }

        let Some(frame) = self.capture(&mut session) else {
            log::debug!("Capture failed; reusing last good frame");
            return self.encode_cached(&mut session);
        };
        session.last_frame_at = Some(now);

        if session.detection_enabled {
            let due = session
                .last_detection_at
                .map_or(true, |at| now.duration_since(at) >= self.config.detection_interval);
            if due {
                let result = self.analyzer.analyze_frame(&frame);
                log::debug!("Live detection found {} face(s)", result.faces_detected());
                session.last_result = Some(result);
                session.last_detection_at = Some(now);
            }
        }

        session.last_frame = Some(frame);
        self.encode_cached(&mut session)
    }

    fn capture(&self, session: &mut CameraSession) -> Option<Frame> {
        let device = session.device.as_mut()?;
        let attempts = self.config.capture_attempts.max(1);
        for attempt in 1..=attempts {
            match device.read() {
                Ok(frame) => return Some(frame),
                Err(e) => {
                    log::debug!("Capture attempt {attempt}/{attempts} failed: {e}");
                    if attempt < attempts {
                        thread::sleep(self.config.retry_pause);
                    }
                }
            }
        }
        None
    }

    /// Encodes the cached frame, with the overlay when detection is on.
    fn encode_cached(&self, session: &mut CameraSession) -> Option<Vec<u8>> {
        let frame = session.last_frame.as_ref()?;
        let encoded = match (&session.last_result, session.detection_enabled) {
            (Some(result), true) => encode_jpeg(&self.overlay.render(frame, result), self.config.jpeg_quality),
            _ => encode_jpeg(frame, self.config.jpeg_quality),
        };
        match encoded {
            Ok(bytes) => {
                session.last_encoded = Some(bytes.clone());
                Some(bytes)
            }
            Err(e) => {
                log::warn!("Failed to encode camera frame: {e}");
                None
            }
        }
    }

    /// Latest raw frame, for on-demand analysis.
    pub fn latest_frame(&self) -> Option<Frame> {
        self.session().last_frame.clone()
    }

    pub fn toggle_detection(&self, enabled: bool) {
        let mut session = self.session();
        session.detection_enabled = enabled;
        if !enabled {
            session.clear_detection();
        }
        session.last_encoded = None;
        log::info!(
            "Live detection {}",
            if enabled { "enabled" } else { "disabled" }
        );
    }

    pub fn current_results(&self) -> DetectionSnapshot {
        let session = self.session();
        DetectionSnapshot {
            detection_enabled: session.detection_enabled,
            results: session.last_result.clone(),
        }
    }

    /// Switch to another device. Detection is turned off first.
    pub fn change_device(&self, device_id: u32) -> Result<u32, CameraError> {
        let mut session = self.session();
        if session.state.is_released() {
            return Err(CameraError::Released);
        }
        session.detection_enabled = false;
        session.clear_detection();
        session.last_encoded = None;
        thread::sleep(self.config.switch_pause);
        self.open_locked(&mut session, device_id)?;
        log::info!("Switched to camera {device_id}");
        Ok(device_id)
    }

    /// Close the device and drop all cached state. Idempotent; the manager
    /// cannot be reopened afterwards.
    pub fn release(&self) {
        let mut session = self.session();
        if session.state.is_released() {
            return;
        }
        session.device = None;
        session.last_frame = None;
        session.last_frame_at = None;
        session.last_encoded = None;
        session.detection_enabled = false;
        session.clear_detection();
        session.state = CameraState::Released;
        log::info!("Camera {} released", session.device_id);
    }
}
