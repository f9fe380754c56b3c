use std::sync::Arc;

use crate::camera::domain::capture_device::DeviceOpener;

#[cfg(feature = "webcam")]
pub mod nokhwa_device;
pub mod tagged_exchange;
pub mod unavailable_opener;

/// The capture backend compiled into this build.
pub fn default_opener() -> Arc<dyn DeviceOpener> {
    #[cfg(feature = "webcam")]
    {
        Arc::new(nokhwa_device::NokhwaOpener::new())
    }
    #[cfg(not(feature = "webcam"))]
    {
        log::warn!("Built without the `webcam` feature; live camera endpoints will report it unavailable");
        Arc::new(unavailable_opener::NoCameraBackend)
    }
}
