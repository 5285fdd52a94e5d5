//! likeness-hw — Frame acquisition.
//!
//! Exposes a V4L2 camera as a polled [`likeness_core::FrameSource`] and
//! decodes uploaded still images into the same grayscale [`Frame`] type.

pub mod camera;
pub mod frame;
pub mod still;

pub use camera::{Camera, CameraError, CameraStream, DeviceInfo, PixelFormat};
pub use frame::Frame;
pub use still::{decode_image, read_image};
