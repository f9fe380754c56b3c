use crate::camera::domain::capture_device::{CaptureDevice, CaptureFormat, DeviceOpener};
use crate::shared::error::CameraError;

/// Opener for builds without a capture backend. Every open fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCameraBackend;

impl DeviceOpener for NoCameraBackend {
    fn open(
        &self,
        device_id: u32,
        _format: &CaptureFormat,
    ) -> Result<Box<dyn CaptureDevice>, CameraError> {
        Err(CameraError::Unavailable {
            device: device_id,
            reason: "no camera backend compiled in (enable the `webcam` feature)".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_open_fails_with_device_id() {
        let result = NoCameraBackend.open(3, &CaptureFormat::default());
        assert!(matches!(
            result,
            Err(CameraError::Unavailable { device: 3, .. })
        ));
    }
}
