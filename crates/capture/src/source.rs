use crate::{CaptureError, slot::FrameSender};

/// A capture device that pushes encoded frames into a [`FrameSender`].
///
/// `start` fails with [`CaptureError`] when the device cannot be opened.
/// `stop` and `dispose` are idempotent; a disposed source cannot be restarted.
pub trait CameraSource: Send + 'static {
    fn start(&mut self, frames: FrameSender) -> Result<(), CaptureError>;

    fn stop(&mut self) -> Result<(), CaptureError>;

    fn dispose(&mut self) -> Result<(), CaptureError>;

    fn is_running(&self) -> bool;
}

impl CameraSource for Box<dyn CameraSource> {
    fn start(&mut self, frames: FrameSender) -> Result<(), CaptureError> {
        (**self).start(frames)
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        (**self).stop()
    }

    fn dispose(&mut self) -> Result<(), CaptureError> {
        (**self).dispose()
    }

    fn is_running(&self) -> bool {
        (**self).is_running()
    }
}
