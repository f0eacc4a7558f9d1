#[cfg(feature = "camera-nokhwa")]
pub mod camera;
pub mod recognizer;
#[cfg(feature = "camera-nokhwa")]
pub mod rgba_converter;
pub mod still;

use crate::{
    error::CaptureError,
    types::{DetectedHand, Frame},
};

#[cfg(feature = "camera-nokhwa")]
pub use camera::{CameraDevice, NokhwaCamera, available_cameras};
pub use recognizer::OrtHandTracker;
pub use still::StillImageSource;

/// Where frames come from. `next_frame` returning `None` ends the stream.
pub trait FrameSource {
    fn open(&mut self) -> Result<(), CaptureError>;
    fn next_frame(&mut self) -> Option<Frame>;
    /// Release the underlying device. Must be safe to call repeatedly.
    fn release(&mut self);
}

/// Turns a frame into zero or more hands, in the detector's own order.
pub trait LandmarkDetector {
    fn detect(&mut self, frame: &Frame) -> anyhow::Result<Vec<DetectedHand>>;

    fn close(&mut self) {}
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn open(&mut self) -> Result<(), CaptureError> {
        (**self).open()
    }

    fn next_frame(&mut self) -> Option<Frame> {
        (**self).next_frame()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

impl<D: LandmarkDetector + ?Sized> LandmarkDetector for Box<D> {
    fn detect(&mut self, frame: &Frame) -> anyhow::Result<Vec<DetectedHand>> {
        (**self).detect(frame)
    }

    fn close(&mut self) {
        (**self).close()
    }
}
