//! rollcall-hw — Frame sources.
//!
//! Provides the [`FrameSource`] capability the capture loop pulls from, and a
//! V4L2 camera implementation that delivers RGB frames.

pub mod camera;
pub mod frame;
pub mod source;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use frame::{Frame, FrameError};
pub use source::FrameSource;
