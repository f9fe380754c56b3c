pub mod math;
pub mod yunet_detector;
