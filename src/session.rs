//! Frame-by-frame session driver: acquire, detect, classify, annotate, dispatch.
//!
//! A [`SessionController`] owns one frame source and one landmark detector.
//! Everything runs on the caller's thread; callbacks are invoked inline and a
//! slow callback delays the next frame.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::{Duration, Instant},
};

use crate::{
    config::AppConfig,
    gesture::GestureClassifier,
    landmarks::{Finger, KeyDistances},
    overlay::OverlayRenderer,
    pipeline::{FrameSource, LandmarkDetector},
    types::{CaptureRecord, DetectedHand, Frame, GestureReport, GestureType},
};

pub type GestureCallback = Box<dyn FnMut(&GestureReport)>;

/// Cloneable flag that asks a running session to end after the current frame.
///
/// A request made while no session runs ends the next one before its first
/// frame. The flag clears when that session ends.
#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    stop: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    fn reset(&self) {
        self.stop.store(false, Ordering::SeqCst);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Running,
}

/// Last gesture seen on a frame that contained a hand.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct SessionState {
    current_gesture: GestureType,
    current_confidence: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkControl {
    Continue,
    Quit,
}

/// Receives every annotated frame of a live session.
pub trait FrameSink {
    fn show(&mut self, frame: &Frame, report: &GestureReport) -> SinkControl;
}

impl<F> FrameSink for F
where
    F: FnMut(&Frame, &GestureReport) -> SinkControl,
{
    fn show(&mut self, frame: &Frame, report: &GestureReport) -> SinkControl {
        self(frame, report)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The frame source could not be opened.
    StartFailed,
    /// The sink asked to quit.
    Quit,
    /// The source stopped producing frames.
    SourceExhausted,
    /// The stop handle was triggered.
    Interrupted,
}

/// Callbacks fire only when confidence is strictly above the threshold.
pub fn should_dispatch(confidence: f32, threshold: f32) -> bool {
    confidence > threshold
}

pub struct SessionController<S: FrameSource, D: LandmarkDetector> {
    source: S,
    detector: D,
    classifier: GestureClassifier,
    overlay: OverlayRenderer,
    callbacks: HashMap<GestureType, GestureCallback>,
    state: SessionState,
    lifecycle: ControllerState,
    dispatch_threshold: f32,
    mirror: bool,
    stop: StopHandle,
    detector_closed: bool,
}

impl<S: FrameSource, D: LandmarkDetector> SessionController<S, D> {
    pub fn new(source: S, detector: D, classifier: GestureClassifier) -> Self {
        let dispatch_threshold = classifier.confidence_threshold();
        Self {
            source,
            detector,
            classifier,
            overlay: OverlayRenderer {
                highlight_threshold: dispatch_threshold,
                ..OverlayRenderer::default()
            },
            callbacks: HashMap::new(),
            state: SessionState::default(),
            lifecycle: ControllerState::Idle,
            dispatch_threshold,
            mirror: false,
            stop: StopHandle::new(),
            detector_closed: false,
        }
    }

    pub fn from_config(source: S, detector: D, config: &AppConfig) -> Self {
        let classifier = GestureClassifier::new(config.gesture.clone());
        let mut controller = Self::new(source, detector, classifier);
        controller.overlay = OverlayRenderer::new(&config.display, controller.dispatch_threshold);
        controller.mirror = config.camera.flip_horizontal;
        controller
    }

    /// Mirror frames left-to-right before processing.
    pub fn with_mirror(mut self, mirror: bool) -> Self {
        self.mirror = mirror;
        self
    }

    pub fn register_callback<F>(&mut self, gesture: GestureType, callback: F)
    where
        F: FnMut(&GestureReport) + 'static,
    {
        if self
            .callbacks
            .insert(gesture, Box::new(callback))
            .is_some()
        {
            log::debug!("replaced callback for {}", gesture.as_str());
        }
    }

    pub fn set_display_options(
        &mut self,
        show_landmarks: Option<bool>,
        show_gesture_info: Option<bool>,
    ) {
        if let Some(show) = show_landmarks {
            self.overlay.show_landmarks = show;
        }
        if let Some(show) = show_gesture_info {
            self.overlay.show_gesture_info = show;
        }
    }

    pub fn overlay(&self) -> &OverlayRenderer {
        &self.overlay
    }

    pub fn dispatch_threshold(&self) -> f32 {
        self.dispatch_threshold
    }

    pub fn state(&self) -> ControllerState {
        self.lifecycle
    }

    pub fn get_current_gesture(&self) -> (GestureType, f32) {
        (self.state.current_gesture, self.state.current_confidence)
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Detect, classify and annotate one frame, firing the matching callback.
    pub fn process_frame(&mut self, mut frame: Frame) -> (Frame, GestureReport) {
        let hands = match self.detector.detect(&frame) {
            Ok(hands) => hands,
            Err(err) => {
                log::warn!("hand detection failed: {err:?}");
                Vec::new()
            }
        };

        let report = self.evaluate(&hands);
        self.overlay.render(&mut frame, &hands, &report);
        (frame, report)
    }

    fn evaluate(&mut self, hands: &[DetectedHand]) -> GestureReport {
        let Some(primary) = hands.first() else {
            return GestureReport::no_hands();
        };

        if log::log_enabled!(log::Level::Debug) {
            if let Some(shape) = self.describe_hand_shape(primary) {
                log::debug!("{shape}");
            }
        }
        let report = GestureReport {
            result: self.classifier.classify(primary.skeleton.landmarks()),
            hand_count: hands.len(),
        };
        self.state = SessionState {
            current_gesture: report.gesture(),
            current_confidence: report.confidence(),
        };
        self.dispatch(&report);
        report
    }

    fn describe_hand_shape(&self, hand: &DetectedHand) -> Option<String> {
        let states = self.classifier.finger_states(hand.skeleton.landmarks())?;
        let d = KeyDistances::measure(&hand.skeleton)?;
        let extended: Vec<&str> = Finger::ALL
            .into_iter()
            .filter(|&finger| states.is_extended(finger))
            .map(|finger| finger.name())
            .collect();
        Some(format!(
            "{} hand, extended [{}], thumb-index {:.3}, thumb-wrist {:.3}, index-wrist {:.3}",
            hand.handedness.label(),
            extended.join(", "),
            d.thumb_index,
            d.thumb_wrist,
            d.index_wrist
        ))
    }

    fn dispatch(&mut self, report: &GestureReport) {
        if !should_dispatch(report.confidence(), self.dispatch_threshold) {
            return;
        }
        if let Some(callback) = self.callbacks.get_mut(&report.gesture()) {
            log::debug!(
                "dispatching {} ({:.2})",
                report.gesture().as_str(),
                report.confidence()
            );
            callback(report);
        }
    }

    /// Open the frame source. Returns `false` and stays idle when it cannot be
    /// opened or when [`cleanup`](Self::cleanup) has already closed the landmark model.
    pub fn start_camera(&mut self) -> bool {
        if self.lifecycle == ControllerState::Running {
            return true;
        }
        if self.detector_closed {
            log::error!("cannot start: landmark model has been closed");
            return false;
        }
        match self.source.open() {
            Ok(()) => {
                self.lifecycle = ControllerState::Running;
                log::info!("session started");
                true
            }
            Err(err) => {
                log::error!("failed to start frame source: {err}");
                false
            }
        }
    }

    pub fn stop_camera(&mut self) {
        self.source.release();
        if self.lifecycle == ControllerState::Running {
            self.lifecycle = ControllerState::Idle;
            log::info!("session stopped");
        }
    }

    /// Stream frames into `sink` until it quits, the source runs dry or the
    /// stop handle fires. The source is released on every exit path.
    pub fn run_session<K>(&mut self, sink: &mut K) -> SessionOutcome
    where
        K: FrameSink + ?Sized,
    {
        if !self.start_camera() {
            return SessionOutcome::StartFailed;
        }

        let mut session = RunningSession { controller: self };
        loop {
            if session.controller.stop.is_stopped() {
                return SessionOutcome::Interrupted;
            }
            let Some(frame) = session.next_frame() else {
                return SessionOutcome::SourceExhausted;
            };
            let (annotated, report) = session.controller.process_frame(frame);
            if sink.show(&annotated, &report) == SinkControl::Quit {
                return SessionOutcome::Quit;
            }
        }
    }

    /// Process frames for `duration` of wall-clock time and return every report.
    pub fn capture_session(&mut self, duration: Duration) -> Vec<CaptureRecord> {
        if duration.is_zero() || !self.start_camera() {
            return Vec::new();
        }

        let started = Instant::now();
        let mut records = Vec::new();
        let mut session = RunningSession { controller: self };
        while started.elapsed() < duration && !session.controller.stop.is_stopped() {
            let Some(frame) = session.next_frame() else {
                break;
            };
            let (_, report) = session.controller.process_frame(frame);
            records.push(CaptureRecord {
                timestamp: started.elapsed(),
                report,
            });
        }
        log::info!("captured {} frame(s)", records.len());
        records
    }

    /// Stop the camera and close the landmark model. Safe to call repeatedly.
    pub fn cleanup(&mut self) {
        self.stop_camera();
        if !self.detector_closed {
            self.detector.close();
            self.detector_closed = true;
        }
    }
}

impl<S: FrameSource, D: LandmarkDetector> Drop for SessionController<S, D> {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Releases the frame source when a session loop ends, including by unwinding.
struct RunningSession<'a, S: FrameSource, D: LandmarkDetector> {
    controller: &'a mut SessionController<S, D>,
}

impl<S: FrameSource, D: LandmarkDetector> RunningSession<'_, S, D> {
    fn next_frame(&mut self) -> Option<Frame> {
        let mut frame = self.controller.source.next_frame()?;
        if self.controller.mirror {
            frame.mirror_horizontally();
        }
        Some(frame)
    }
}

impl<S: FrameSource, D: LandmarkDetector> Drop for RunningSession<'_, S, D> {
    fn drop(&mut self) {
        self.controller.stop_camera();
        self.controller.stop.reset();
    }
}
