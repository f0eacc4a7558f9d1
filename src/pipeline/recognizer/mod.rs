//! Two-stage ONNX hand tracker: palm detection, then 21-point landmarks per palm.

mod common;
mod ort;
mod palm;

use anyhow::{Result, anyhow};

use self::{
    ort::{HandposeEstimator, HandposeOutput},
    palm::{PalmDetector, PalmDetectorConfig},
};
use super::LandmarkDetector;
use crate::{
    config::HandTrackingConfig,
    model_download::{ModelKind, ensure_model_ready},
    types::{DetectedHand, Frame},
};

pub use self::palm::PalmRegion;

struct TrackerEngine {
    palm_detector: PalmDetector,
    handpose: HandposeEstimator,
}

pub struct OrtHandTracker {
    engine: Option<TrackerEngine>,
    min_tracking_confidence: f32,
}

impl OrtHandTracker {
    /// Load both models, downloading them first if they are missing.
    pub fn new(cfg: &HandTrackingConfig) -> Result<Self> {
        ensure_model_ready(ModelKind::PalmDetector, &cfg.palm_detector_model, |_evt| {})?;
        ensure_model_ready(
            ModelKind::HandposeEstimator,
            &cfg.handpose_estimator_model,
            |_evt| {},
        )?;

        let palm_detector =
            PalmDetector::new(&cfg.palm_detector_model, PalmDetectorConfig::from(cfg))?;
        let handpose = HandposeEstimator::new(&cfg.handpose_estimator_model)?;
        log::info!(
            "hand tracker ready using {} and palm detector {}",
            cfg.handpose_estimator_model.display(),
            cfg.palm_detector_model.display()
        );

        Ok(Self {
            engine: Some(TrackerEngine {
                palm_detector,
                handpose,
            }),
            min_tracking_confidence: cfg.min_tracking_confidence,
        })
    }
}

impl LandmarkDetector for OrtHandTracker {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectedHand>> {
        let engine = self
            .engine
            .as_mut()
            .ok_or_else(|| anyhow!("hand tracker has been closed"))?;

        let palms = engine.palm_detector.detect(frame)?;
        let mut outputs = Vec::with_capacity(palms.len());
        for palm in &palms {
            outputs.push(engine.handpose.estimate(frame, palm)?);
        }

        Ok(select_tracked(outputs, self.min_tracking_confidence))
    }

    fn close(&mut self) {
        if self.engine.take().is_some() {
            log::info!("hand tracker closed");
        }
    }
}

/// Keep palm order, dropping hands the landmark model is not confident about.
fn select_tracked(outputs: Vec<HandposeOutput>, min_confidence: f32) -> Vec<DetectedHand> {
    outputs
        .into_iter()
        .filter(|out| out.confidence >= min_confidence)
        .map(HandposeOutput::into_hand)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{landmarks::NUM_LANDMARKS, types::Handedness};
    use approx::assert_relative_eq;

    fn output(confidence: f32, handedness: f32, x: f32) -> HandposeOutput {
        HandposeOutput {
            raw_landmarks: vec![[x, 112.0, 0.0]; NUM_LANDMARKS],
            transform: common::CropTransform {
                center: (100.0, 100.0),
                side: 224.0,
                angle: 0.0,
                output_size: 224,
                orig_w: 200,
                orig_h: 200,
            },
            confidence,
            handedness,
        }
    }

    #[test]
    fn low_confidence_hands_are_dropped_in_order() {
        let hands = select_tracked(
            vec![
                output(0.9, 0.8, 112.0),
                output(0.3, 0.8, 112.0),
                output(0.5, 0.2, 62.0),
            ],
            0.5,
        );

        assert_eq!(hands.len(), 2);
        assert_eq!(hands[0].handedness, Handedness::Right);
        assert_eq!(hands[1].handedness, Handedness::Left);
        assert_relative_eq!(hands[0].skeleton.landmarks()[0].x, 0.5, epsilon = 1e-4);
        assert_relative_eq!(hands[1].skeleton.landmarks()[0].x, 0.25, epsilon = 1e-4);
    }

    #[test]
    fn hands_are_complete_skeletons() {
        let hand = output(1.2, 0.0, 112.0).into_hand();
        assert!(hand.skeleton.is_complete());
        assert_relative_eq!(hand.score, 1.0);
        assert_eq!(hand.handedness, Handedness::Unknown);
    }
}
