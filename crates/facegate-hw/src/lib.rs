//! facegate-hw — Hardware abstraction for camera capture.
//!
//! Provides V4L2-based camera access with grayscale conversion and
//! dark-frame detection.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use frame::Frame;
