mod anchors;

use std::{cmp::Ordering, f32::consts::PI, path::Path};

use anchors::{ANCHORS, NUM_ANCHORS};
use anyhow::{Context, Result, anyhow};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Tensor;

use super::common::{LetterboxInfo, PALM_INPUT_SIZE, prepare_frame_with_size};
use crate::{config::HandTrackingConfig, types::Frame};

const PALM_LANDMARKS: usize = 7;
const MIN_CROP_SIDE: f32 = 80.0;
const CROP_EXPANSION: f32 = 2.4;

/// A palm found by the detector, in frame pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct PalmRegion {
    pub bbox: [f32; 4],
    pub landmarks: Vec<(f32, f32)>,
    pub score: f32,
}

#[derive(Clone, Debug)]
pub struct PalmDetectorConfig {
    pub score_threshold: f32,
    pub nms_threshold: f32,
    pub top_k: usize,
}

impl Default for PalmDetectorConfig {
    fn default() -> Self {
        Self {
            score_threshold: 0.7,
            nms_threshold: 0.3,
            top_k: 2,
        }
    }
}

impl From<&HandTrackingConfig> for PalmDetectorConfig {
    fn from(cfg: &HandTrackingConfig) -> Self {
        Self {
            score_threshold: cfg.min_detection_confidence,
            nms_threshold: cfg.nms_threshold,
            top_k: cfg.max_num_hands,
        }
    }
}

pub struct PalmDetector {
    session: Session,
    cfg: PalmDetectorConfig,
}

impl PalmDetector {
    pub fn new(model_path: &Path, cfg: PalmDetectorConfig) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(model_path)
            .with_context(|| {
                format!("failed to load palm detector from {}", model_path.display())
            })?;

        Ok(Self { session, cfg })
    }

    /// Palms in descending score order, at most `top_k`.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<PalmRegion>> {
        let (input, letterbox) = prepare_frame_with_size(frame, PALM_INPUT_SIZE)?;
        let tensor = Tensor::from_array(input)?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .context("failed to run palm detector session")?;

        if outputs.len() < 2 {
            return Err(anyhow!(
                "palm detector returned {} outputs, expected at least 2",
                outputs.len()
            ));
        }

        let box_and_landmarks = outputs[0].try_extract_array::<f32>()?;
        let scores = outputs[1].try_extract_array::<f32>()?;

        decode_palm_outputs(
            box_and_landmarks
                .as_slice()
                .ok_or_else(|| anyhow!("palm boxes not contiguous"))?,
            box_and_landmarks.shape(),
            scores
                .as_slice()
                .ok_or_else(|| anyhow!("palm scores not contiguous"))?,
            scores.shape(),
            &letterbox,
            &self.cfg,
        )
    }
}

fn decode_palm_outputs(
    box_landmark: &[f32],
    box_shape: &[usize],
    scores: &[f32],
    score_shape: &[usize],
    letterbox: &LetterboxInfo,
    cfg: &PalmDetectorConfig,
) -> Result<Vec<PalmRegion>> {
    let [.., anchor_dim, feature_dim] = *box_shape else {
        return Err(anyhow!(
            "unexpected palm box shape {box_shape:?}, need [batch, anchors, features]"
        ));
    };
    let [.., score_anchor_dim, score_feature_dim] = *score_shape else {
        return Err(anyhow!(
            "unexpected palm score shape {score_shape:?}, need [batch, anchors, 1]"
        ));
    };

    if feature_dim < 4 + PALM_LANDMARKS * 2 {
        return Err(anyhow!(
            "palm box feature dimension too small: {feature_dim}"
        ));
    }
    if anchor_dim != score_anchor_dim {
        return Err(anyhow!(
            "anchor dimension mismatch between boxes ({anchor_dim}) and scores ({score_anchor_dim})"
        ));
    }

    let anchors = NUM_ANCHORS.min(anchor_dim);
    let pad_bias_x = letterbox.pad_x / letterbox.scale;
    let pad_bias_y = letterbox.pad_y / letterbox.scale;
    let scale = letterbox.orig_w.max(letterbox.orig_h) as f32;
    let target_input = PALM_INPUT_SIZE as f32;

    let mut candidates = Vec::new();
    for anchor_idx in 0..anchors {
        let raw_score = *scores
            .get(anchor_idx * score_feature_dim)
            .ok_or_else(|| anyhow!("missing score for palm anchor {anchor_idx}"))?;
        let score = sigmoid(raw_score);
        if score < cfg.score_threshold {
            continue;
        }

        let offset = anchor_idx * feature_dim;
        let features = box_landmark
            .get(offset..offset + 4 + PALM_LANDMARKS * 2)
            .ok_or_else(|| anyhow!("missing box features for anchor {anchor_idx}"))?;
        let anchor = ANCHORS[anchor_idx];

        let cx = features[0] / target_input + anchor[0];
        let cy = features[1] / target_input + anchor[1];
        let hw = features[2] / target_input / 2.0;
        let hh = features[3] / target_input / 2.0;

        let mut bbox = [
            (cx - hw) * scale - pad_bias_x,
            (cy - hh) * scale - pad_bias_y,
            (cx + hw) * scale - pad_bias_x,
            (cy + hh) * scale - pad_bias_y,
        ];
        if bbox[2] <= bbox[0] || bbox[3] <= bbox[1] {
            continue;
        }
        clamp_box(&mut bbox, letterbox.orig_w, letterbox.orig_h);

        let landmarks = features[4..]
            .chunks_exact(2)
            .map(|p| {
                (
                    (p[0] / target_input + anchor[0]) * scale - pad_bias_x,
                    (p[1] / target_input + anchor[1]) * scale - pad_bias_y,
                )
            })
            .collect();

        candidates.push(PalmRegion {
            bbox,
            landmarks,
            score,
        });
    }

    let kept = nms(&candidates, cfg.nms_threshold, cfg.top_k);
    Ok(kept
        .into_iter()
        .map(|idx| candidates[idx].clone())
        .collect())
}

/// Center, side length and rotation of the square crop fed to the landmark model.
pub fn crop_from_palm(region: &PalmRegion) -> ((f32, f32), f32, f32) {
    let center = if region.landmarks.is_empty() {
        (
            (region.bbox[0] + region.bbox[2]) * 0.5,
            (region.bbox[1] + region.bbox[3]) * 0.5,
        )
    } else {
        let (sum_x, sum_y) = region
            .landmarks
            .iter()
            .fold((0.0_f32, 0.0_f32), |acc, p| (acc.0 + p.0, acc.1 + p.1));
        (
            sum_x / region.landmarks.len() as f32,
            sum_y / region.landmarks.len() as f32,
        )
    };

    let base_w = (region.bbox[2] - region.bbox[0]).abs();
    let base_h = (region.bbox[3] - region.bbox[1]).abs();
    let landmark_span = if region.landmarks.is_empty() {
        0.0
    } else {
        let (min_x, max_x, min_y, max_y) = region
            .landmarks
            .iter()
            .fold((f32::MAX, f32::MIN, f32::MAX, f32::MIN), |acc, (x, y)| {
                (acc.0.min(*x), acc.1.max(*x), acc.2.min(*y), acc.3.max(*y))
            });
        (max_x - min_x).max(max_y - min_y)
    };
    // Fingers extend well past the palm box.
    let side = base_w.max(base_h).max(landmark_span).max(MIN_CROP_SIDE) * CROP_EXPANSION;

    (center, side, estimate_orientation(region))
}

pub fn estimate_orientation(region: &PalmRegion) -> f32 {
    if region.landmarks.len() < 2 {
        return 0.0;
    }

    // Principal axis of the palm keypoints from their 2x2 covariance.
    let n = region.landmarks.len() as f32;
    let (sx, sy) = region
        .landmarks
        .iter()
        .fold((0.0_f32, 0.0_f32), |acc, (x, y)| (acc.0 + x, acc.1 + y));
    let mean = (sx / n, sy / n);

    let (mut cov_xx, mut cov_xy, mut cov_yy) = (0.0, 0.0, 0.0);
    for (x, y) in &region.landmarks {
        let dx = x - mean.0;
        let dy = y - mean.1;
        cov_xx += dx * dx;
        cov_xy += dx * dy;
        cov_yy += dy * dy;
    }
    cov_xx /= n;
    cov_xy /= n;
    cov_yy /= n;

    let trace = cov_xx + cov_yy;
    let det = cov_xx * cov_yy - cov_xy * cov_xy;
    let lambda1 = (trace * 0.5 + ((trace * 0.5).powi(2) - det).max(0.0).sqrt()).max(1e-6);
    let (vx, vy) = if cov_xy.abs() > 1e-6 {
        (lambda1 - cov_yy, cov_xy)
    } else if cov_xx >= cov_yy {
        (1.0, 0.0)
    } else {
        (0.0, 1.0)
    };

    // Rotate so the fingers point up in the crop.
    vy.atan2(vx) - PI * 0.5
}

fn nms(candidates: &[PalmRegion], threshold: f32, top_k: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..candidates.len()).collect();
    order.sort_by(|a, b| {
        candidates[*b]
            .score
            .partial_cmp(&candidates[*a].score)
            .unwrap_or(Ordering::Equal)
    });

    let mut keep: Vec<usize> = Vec::new();
    for idx in order {
        if keep.len() >= top_k {
            break;
        }
        let suppressed = keep
            .iter()
            .any(|&k| iou(&candidates[idx].bbox, &candidates[k].bbox) >= threshold);
        if !suppressed {
            keep.push(idx);
        }
    }
    keep
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;
    if inter <= 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn clamp_box(bbox: &mut [f32; 4], w: u32, h: u32) {
    let max_w = (w.saturating_sub(1)) as f32;
    let max_h = (h.saturating_sub(1)) as f32;
    bbox[0] = bbox[0].clamp(0.0, max_w);
    bbox[1] = bbox[1].clamp(0.0, max_h);
    bbox[2] = bbox[2].clamp(0.0, max_w);
    bbox[3] = bbox[3].clamp(0.0, max_h);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const FEATURES: usize = 18;

    fn region(bbox: [f32; 4], score: f32) -> PalmRegion {
        PalmRegion {
            bbox,
            landmarks: Vec::new(),
            score,
        }
    }

    fn square_letterbox() -> LetterboxInfo {
        LetterboxInfo {
            scale: 1.0,
            pad_x: 0.0,
            pad_y: 0.0,
            orig_w: 192,
            orig_h: 192,
        }
    }

    /// Raw detector tensors with every anchor scored far below zero.
    fn blank_outputs() -> (Vec<f32>, Vec<f32>) {
        (
            vec![0.0; NUM_ANCHORS * FEATURES],
            vec![-20.0; NUM_ANCHORS],
        )
    }

    fn place(boxes: &mut [f32], scores: &mut [f32], anchor: usize, size: f32, logit: f32) {
        let base = anchor * FEATURES;
        boxes[base + 2] = size;
        boxes[base + 3] = size;
        scores[anchor] = logit;
    }

    #[test]
    fn sigmoid_is_centered() {
        assert_relative_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(5.0) > 0.99);
        assert!(sigmoid(-5.0) < 0.01);
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = [0.0, 0.0, 10.0, 10.0];
        assert_relative_eq!(iou(&a, &a), 1.0);
        assert_relative_eq!(iou(&a, &[20.0, 20.0, 30.0, 30.0]), 0.0);
        assert_relative_eq!(iou(&a, &[5.0, 0.0, 15.0, 10.0]), 50.0 / 150.0);
    }

    #[test]
    fn nms_keeps_best_of_overlapping_and_limits_count() {
        let candidates = vec![
            region([0.0, 0.0, 10.0, 10.0], 0.8),
            region([1.0, 0.0, 11.0, 10.0], 0.95),
            region([50.0, 50.0, 60.0, 60.0], 0.75),
            region([100.0, 100.0, 110.0, 110.0], 0.72),
        ];
        assert_eq!(nms(&candidates, 0.3, 2), vec![1, 2]);
        assert_eq!(nms(&candidates, 0.3, 5), vec![1, 2, 3]);
    }

    #[test]
    fn decoded_regions_are_sorted_and_thresholded() {
        let (mut boxes, mut scores) = blank_outputs();
        place(&mut boxes, &mut scores, 0, 20.0, 2.0);
        place(&mut boxes, &mut scores, 1500, 30.0, 4.0);
        place(&mut boxes, &mut scores, 700, 30.0, 0.5);

        let regions = decode_palm_outputs(
            &boxes,
            &[1, NUM_ANCHORS, FEATURES],
            &scores,
            &[1, NUM_ANCHORS, 1],
            &square_letterbox(),
            &PalmDetectorConfig::default(),
        )
        .unwrap();

        assert_eq!(regions.len(), 2);
        assert!(regions[0].score > regions[1].score);
        assert_eq!(regions[0].landmarks.len(), PALM_LANDMARKS);

        // Anchor 0 sits 4px from the corner; its 20px box is clipped to the frame.
        let weaker = &regions[1];
        assert_relative_eq!(weaker.bbox[0], 0.0);
        assert_relative_eq!(weaker.bbox[2], 14.0, epsilon = 1e-3);
        assert_relative_eq!(weaker.landmarks[0].0, 4.0, epsilon = 1e-3);
    }

    #[test]
    fn malformed_shapes_are_errors() {
        let (boxes, scores) = blank_outputs();
        let cfg = PalmDetectorConfig::default();
        let lb = square_letterbox();
        let decode = |box_shape: &[usize], score_shape: &[usize]| {
            decode_palm_outputs(&boxes, box_shape, &scores, score_shape, &lb, &cfg)
        };

        assert!(decode(&[FEATURES], &[1, NUM_ANCHORS, 1]).is_err());
        assert!(decode(&[1, NUM_ANCHORS, 4], &[1, NUM_ANCHORS, 1]).is_err());
        assert!(decode(&[1, NUM_ANCHORS, FEATURES], &[1, 10, 1]).is_err());
    }

    #[test]
    fn config_follows_tracking_settings() {
        let tracking = HandTrackingConfig {
            max_num_hands: 1,
            min_detection_confidence: 0.6,
            ..HandTrackingConfig::default()
        };
        let cfg = PalmDetectorConfig::from(&tracking);
        assert_eq!(cfg.top_k, 1);
        assert_relative_eq!(cfg.score_threshold, 0.6);
    }

    #[test]
    fn crop_has_a_minimum_size() {
        let (center, side, angle) = crop_from_palm(&region([10.0, 20.0, 30.0, 40.0], 0.9));
        assert_eq!(center, (20.0, 30.0));
        assert_relative_eq!(side, MIN_CROP_SIDE * CROP_EXPANSION);
        assert_relative_eq!(angle, 0.0);
    }

    #[test]
    fn vertical_palm_keypoints_need_no_rotation() {
        let mut palm = region([0.0, 0.0, 100.0, 100.0], 0.9);
        palm.landmarks = vec![(50.0, 10.0), (50.0, 50.0), (50.0, 90.0)];
        assert_relative_eq!(estimate_orientation(&palm), 0.0, epsilon = 1e-5);
    }
}
