use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;

use crate::camera::domain::capture_device::{CaptureDevice, CaptureFormat, DeviceOpener};
use crate::camera::infrastructure::tagged_exchange::{ExchangeError, TaggedExchange};
use crate::shared::error::{CameraError, CaptureError};
use crate::shared::frame::Frame;

const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Opens webcams through nokhwa. Each device gets its own capture thread,
/// since nokhwa cameras are not `Send` on every platform.
#[derive(Debug)]
pub struct NokhwaOpener {
    read_timeout: Duration,
}

impl NokhwaOpener {
    pub fn new() -> Self {
        Self {
            read_timeout: READ_TIMEOUT,
        }
    }
}

impl Default for NokhwaOpener {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceOpener for NokhwaOpener {
    fn open(
        &self,
        device_id: u32,
        format: &CaptureFormat,
    ) -> Result<Box<dyn CaptureDevice>, CameraError> {
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), String>>(1);
        let (request_tx, request_rx) = crossbeam_channel::bounded::<u64>(1);
        let (frame_tx, frame_rx) = crossbeam_channel::unbounded::<(u64, Result<Frame, CaptureError>)>();
        let format = *format;

        let handle = thread::Builder::new()
            .name(format!("camera-{device_id}"))
            .spawn(move || capture_loop(device_id, format, ready_tx, request_rx, frame_tx))
            .map_err(|e| CameraError::Unavailable {
                device: device_id,
                reason: format!("could not start capture thread: {e}"),
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(NokhwaDevice {
                exchange: TaggedExchange::new(request_tx, frame_rx, self.read_timeout),
                handle: Some(handle),
            })),
            Ok(Err(reason)) => {
                let _ = handle.join();
                Err(CameraError::Unavailable {
                    device: device_id,
                    reason,
                })
            }
            Err(_) => {
                let _ = handle.join();
                Err(CameraError::Unavailable {
                    device: device_id,
                    reason: "capture thread exited during open".into(),
                })
            }
        }
    }
}

fn capture_loop(
    device_id: u32,
    format: CaptureFormat,
    ready: Sender<Result<(), String>>,
    requests: Receiver<u64>,
    frames: Sender<(u64, Result<Frame, CaptureError>)>,
) {
    let mut camera = match open_camera(device_id, &format) {
        Ok(camera) => camera,
        Err(reason) => {
            let _ = ready.send(Err(reason));
            return;
        }
    };
    if format.buffer_depth != 0 {
        log::debug!(
            "nokhwa does not expose a buffer depth setting; requested {}",
            format.buffer_depth
        );
    }
    let _ = ready.send(Ok(()));

    // Ends when the device handle drops its request sender.
    for tag in requests.iter() {
        if frames.send((tag, grab(&mut camera))).is_err() {
            break;
        }
    }

    if let Err(e) = camera.stop_stream() {
        log::debug!("Stopping camera {device_id} stream failed: {e}");
    }
}

fn open_camera(device_id: u32, format: &CaptureFormat) -> Result<Camera, String> {
    let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(
        CameraFormat::new(
            Resolution::new(format.width, format.height),
            FrameFormat::MJPEG,
            format.fps,
        ),
    ));
    let mut camera =
        Camera::new(CameraIndex::Index(device_id), requested).map_err(|e| e.to_string())?;
    camera.open_stream().map_err(|e| e.to_string())?;
    Ok(camera)
}

fn grab(camera: &mut Camera) -> Result<Frame, CaptureError> {
    let buffer = camera
        .frame()
        .map_err(|e| CaptureError::Failed(e.to_string()))?;
    let image = buffer
        .decode_image::<RgbFormat>()
        .map_err(|e| CaptureError::Failed(e.to_string()))?;
    let (width, height) = (image.width(), image.height());
    Ok(Frame::new(image.into_raw(), width, height, 3))
}

struct NokhwaDevice {
    exchange: TaggedExchange<Result<Frame, CaptureError>>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureDevice for NokhwaDevice {
    fn read(&mut self) -> Result<Frame, CaptureError> {
        match self.exchange.request() {
            Ok(frame) => frame,
            Err(ExchangeError::TimedOut) => Err(CaptureError::Failed("no frame before timeout".into())),
            Err(ExchangeError::Closed) => Err(CaptureError::Disconnected),
        }
    }
}

impl Drop for NokhwaDevice {
    fn drop(&mut self) {
        self.exchange.close();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
