//! presage-hw — V4L2 camera capture for the presence loop.

pub mod camera;
pub mod convert;

pub use camera::{list_devices, Camera, CameraError, CaptureConfig, DeviceInfo};
