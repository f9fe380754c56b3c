use serde::Serialize;

/// Lifecycle of a camera manager.
///
/// ```text
/// Uninitialized -> Opening -> Ready <-> Reinitializing
///        any state -> Released (terminal)
/// ```
/// A failed open falls back to `Uninitialized`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraState {
    Uninitialized,
    Opening,
    Ready,
    Reinitializing,
    Released,
}

impl CameraState {
    pub fn is_released(self) -> bool {
        self == CameraState::Released
    }
}
