use std::path::Path;

use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::{
    common::{self, HANDPOSE_INPUT_SIZE},
    palm::{PalmRegion, crop_from_palm},
};
use crate::types::{DetectedHand, Frame, Handedness};

/// Raw landmark model output for one palm crop.
#[derive(Clone, Debug)]
pub struct HandposeOutput {
    pub raw_landmarks: Vec<[f32; 3]>,
    pub transform: common::CropTransform,
    pub confidence: f32,
    pub handedness: f32,
}

impl HandposeOutput {
    pub fn into_hand(self) -> DetectedHand {
        DetectedHand {
            skeleton: self.transform.normalize(&self.raw_landmarks),
            score: self.confidence.clamp(0.0, 1.0),
            handedness: Handedness::from_score(self.handedness),
        }
    }
}

pub struct HandposeEstimator {
    session: Session,
}

impl HandposeEstimator {
    pub fn new(model_path: &Path) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| format!("failed to load ORT session from {}", model_path.display()))?;

        Ok(Self { session })
    }

    pub fn estimate(&mut self, frame: &Frame, palm: &PalmRegion) -> Result<HandposeOutput> {
        let (center, side, angle) = crop_from_palm(palm);
        let (input, transform) =
            common::prepare_rotated_crop(frame, center, side, angle, HANDPOSE_INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;
        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run ORT session")?;

        if outputs.len() < 1 {
            return Err(anyhow!("model returned no outputs"));
        }

        let coords = outputs[0].try_extract_array::<f32>()?;
        let flattened: Vec<f32> = coords.iter().copied().collect();
        let raw_landmarks = common::decode_landmarks(&flattened)?;

        let scalar = |idx: usize| -> f32 {
            if outputs.len() <= idx {
                return 0.0;
            }
            outputs[idx]
                .try_extract_array::<f32>()
                .ok()
                .and_then(|arr| arr.iter().next().copied())
                .unwrap_or(0.0)
        };

        Ok(HandposeOutput {
            raw_landmarks,
            transform,
            confidence: scalar(1),
            handedness: scalar(2),
        })
    }
}
