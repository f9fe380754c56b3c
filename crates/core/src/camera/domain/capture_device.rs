use crate::shared::error::{CameraError, CaptureError};
use crate::shared::frame::Frame;

/// Requested capture parameters. Backends apply them best-effort.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureFormat {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Frames the driver may queue; 1 keeps latency minimal.
    pub buffer_depth: u32,
}

impl Default for CaptureFormat {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 30,
            buffer_depth: 1,
        }
    }
}

/// An open video capture device. Dropping it releases the hardware.
pub trait CaptureDevice: Send {
    /// Grab the most recent frame as RGB.
    fn read(&mut self) -> Result<Frame, CaptureError>;
}

/// Opens capture devices by numeric id.
pub trait DeviceOpener: Send + Sync {
    fn open(
        &self,
        device_id: u32,
        format: &CaptureFormat,
    ) -> Result<Box<dyn CaptureDevice>, CameraError>;
}
