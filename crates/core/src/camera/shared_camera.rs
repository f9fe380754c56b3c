use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::camera::camera_manager::CameraManager;

type ManagerFactory = dyn Fn() -> CameraManager + Send + Sync;

/// Process-wide handle to the camera manager.
///
/// The manager is built and opened on first use; `release_shared` drops it
/// so the next access starts from a fresh instance.
pub struct SharedCamera {
    slot: Mutex<Option<Arc<CameraManager>>>,
    factory: Box<ManagerFactory>,
    default_device: u32,
}

impl SharedCamera {
    pub fn new(
        default_device: u32,
        factory: impl Fn() -> CameraManager + Send + Sync + 'static,
    ) -> Self {
        Self {
            slot: Mutex::new(None),
            factory: Box::new(factory),
            default_device,
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<CameraManager>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The live manager, constructing it (and opening the default device)
    /// when there is none. A failed open still yields a manager; the stream
    /// retries the device later.
    pub fn get(&self) -> Arc<CameraManager> {
        let mut slot = self.slot();
        if let Some(manager) = slot.as_ref().filter(|m| !m.is_released()) {
            return manager.clone();
        }
        let manager = Arc::new((self.factory)());
        if let Err(e) = manager.open(self.default_device) {
            log::warn!("Camera {} not available yet: {e}", self.default_device);
        }
        *slot = Some(manager.clone());
        manager
    }

    /// The manager if one has been built, without constructing one.
    pub fn current(&self) -> Option<Arc<CameraManager>> {
        self.slot().clone()
    }

    pub fn release_shared(&self) {
        if let Some(manager) = self.slot().take() {
            manager.release();
        }
    }
}
