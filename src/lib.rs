//! Real-time hand gesture recognition for augmented-reality style controls.
//!
//! Frames come from a [`FrameSource`], hands from a [`LandmarkDetector`], and
//! a [`SessionController`] ties them to a rule-based [`GestureClassifier`],
//! drawing an overlay and invoking per-gesture callbacks.

pub mod config;
pub mod error;
pub mod gesture;
pub mod landmarks;
pub mod model_download;
pub mod overlay;
pub mod pipeline;
pub mod session;
pub mod types;

pub use config::AppConfig;
pub use error::{CaptureError, ConfigError};
pub use gesture::{ClassifierConfig, GestureClassifier};
pub use overlay::OverlayRenderer;
pub use pipeline::{FrameSource, LandmarkDetector, OrtHandTracker, StillImageSource};
#[cfg(feature = "camera-nokhwa")]
pub use pipeline::NokhwaCamera;
pub use session::{
    ControllerState, FrameSink, SessionController, SessionOutcome, SinkControl, StopHandle,
};
pub use types::{
    CaptureRecord, DetectedHand, Frame, GestureReport, GestureResult, GestureType, HandSkeleton,
    Handedness, Landmark,
};
