use crate::camera::CameraError;
use crate::frame::Frame;

/// Something that yields frames until it runs dry or is closed.
pub trait FrameSource: Send {
    /// Next frame, or `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<Frame>, CameraError>;

    /// Release the underlying device. Later `next_frame` calls return `Ok(None)`.
    fn close(&mut self);
}
