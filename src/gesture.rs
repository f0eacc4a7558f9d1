//! Rule-based gesture classification over a 21-point hand skeleton.
//!
//! Each finger is reduced to an extended/retracted flag, then a fixed list
//! of rules is tested in priority order and the first match wins. The
//! confidence reported for a gesture is a constant attached to its rule.

use serde::{Deserialize, Serialize};

use crate::{
    landmarks::{Finger, INDEX_TIP, NUM_LANDMARKS, THUMB_TIP, WRIST},
    types::{GestureResult, GestureType, Landmark},
};

/// Tunable thresholds, in normalized image units where applicable.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Thumb counts as extended when tip-to-wrist exceeds base-to-wrist by this factor.
    pub thumb_extension_ratio: f32,
    pub ok_sign_distance: f32,
    pub pinch_distance: f32,
    /// Minimum confidence downstream consumers should act on.
    pub confidence_threshold: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            thumb_extension_ratio: 1.2,
            ok_sign_distance: 0.05,
            pinch_distance: 0.03,
            confidence_threshold: 0.7,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FingerStates {
    pub thumb: bool,
    pub index: bool,
    pub middle: bool,
    pub ring: bool,
    pub pinky: bool,
}

impl FingerStates {
    pub fn from_array([thumb, index, middle, ring, pinky]: [bool; 5]) -> Self {
        Self {
            thumb,
            index,
            middle,
            ring,
            pinky,
        }
    }

    pub fn is_extended(&self, finger: Finger) -> bool {
        match finger {
            Finger::Thumb => self.thumb,
            Finger::Index => self.index,
            Finger::Middle => self.middle,
            Finger::Ring => self.ring,
            Finger::Pinky => self.pinky,
        }
    }

    pub fn extended_count(&self) -> usize {
        Finger::ALL
            .into_iter()
            .filter(|&finger| self.is_extended(finger))
            .count()
    }
}

/// Everything the rules look at, computed once per classification.
#[derive(Clone, Copy, Debug)]
pub struct HandFeatures {
    pub fingers: FingerStates,
    pub thumb_index_distance: f32,
}

pub struct GestureRule {
    pub gesture: GestureType,
    pub confidence: f32,
    pub description: &'static str,
    matches: fn(&HandFeatures, &ClassifierConfig) -> bool,
}

impl GestureRule {
    pub const fn new(
        gesture: GestureType,
        confidence: f32,
        description: &'static str,
        matches: fn(&HandFeatures, &ClassifierConfig) -> bool,
    ) -> Self {
        Self {
            gesture,
            confidence,
            description,
            matches,
        }
    }

    pub fn matches(&self, features: &HandFeatures, config: &ClassifierConfig) -> bool {
        (self.matches)(features, config)
    }
}

fn is_point(h: &HandFeatures, _: &ClassifierConfig) -> bool {
    let f = h.fingers;
    f.index && !f.middle && !f.ring && !f.pinky
}

fn is_open_palm(h: &HandFeatures, _: &ClassifierConfig) -> bool {
    h.fingers.extended_count() == 5
}

fn is_fist(h: &HandFeatures, _: &ClassifierConfig) -> bool {
    h.fingers.extended_count() == 0
}

fn is_thumbs_up(h: &HandFeatures, _: &ClassifierConfig) -> bool {
    let f = h.fingers;
    f.thumb && !f.index && !f.middle && !f.ring && !f.pinky
}

fn is_peace(h: &HandFeatures, _: &ClassifierConfig) -> bool {
    let f = h.fingers;
    f.index && f.middle && !f.ring && !f.pinky
}

fn is_ok_sign(h: &HandFeatures, cfg: &ClassifierConfig) -> bool {
    let f = h.fingers;
    f.middle && f.ring && f.pinky && h.thumb_index_distance < cfg.ok_sign_distance
}

fn is_pinch(h: &HandFeatures, cfg: &ClassifierConfig) -> bool {
    h.thumb_index_distance < cfg.pinch_distance
}

/// Tested top to bottom. OK_SIGN sits above PINCH, so a tight pinch with
/// the three outer fingers raised reports OK_SIGN.
pub const RULES: [GestureRule; 7] = [
    GestureRule {
        gesture: GestureType::Point,
        confidence: 0.9,
        description: "Pointing gesture detected",
        matches: is_point,
    },
    GestureRule {
        gesture: GestureType::OpenPalm,
        confidence: 0.9,
        description: "Open palm gesture detected",
        matches: is_open_palm,
    },
    GestureRule {
        gesture: GestureType::Fist,
        confidence: 0.9,
        description: "Fist gesture detected",
        matches: is_fist,
    },
    GestureRule {
        gesture: GestureType::ThumbsUp,
        confidence: 0.8,
        description: "Thumbs up gesture detected",
        matches: is_thumbs_up,
    },
    GestureRule {
        gesture: GestureType::Peace,
        confidence: 0.8,
        description: "Peace sign detected",
        matches: is_peace,
    },
    GestureRule {
        gesture: GestureType::OkSign,
        confidence: 0.8,
        description: "OK sign detected",
        matches: is_ok_sign,
    },
    GestureRule {
        gesture: GestureType::Pinch,
        confidence: 0.8,
        description: "Pinch gesture detected",
        matches: is_pinch,
    },
];

/// Usage hint for each gesture, as shown to end users.
pub fn description_for(gesture: GestureType) -> &'static str {
    match gesture {
        GestureType::None => "No gesture detected",
        GestureType::Point => "Pointing - Use to select or indicate direction",
        GestureType::OpenPalm => "Open palm - Stop or show command",
        GestureType::Fist => "Fist - Grab or power gesture",
        GestureType::ThumbsUp => "Thumbs up - Approval or confirmation",
        GestureType::Peace => "Peace sign - Victory or two items",
        GestureType::OkSign => "OK sign - Confirmation or perfect",
        GestureType::Pinch => "Pinch - Precise selection or zoom",
    }
}

#[derive(Clone)]
pub struct GestureClassifier {
    config: ClassifierConfig,
    rules: &'static [GestureRule],
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default())
    }
}

impl GestureClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self::with_rules(config, &RULES)
    }

    /// Classify against a custom rule table instead of [`RULES`].
    pub fn with_rules(config: ClassifierConfig, rules: &'static [GestureRule]) -> Self {
        Self { config, rules }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.config.confidence_threshold
    }

    /// Classify one hand. Incomplete input is a normal "no gesture" outcome.
    pub fn classify(&self, landmarks: &[Landmark]) -> GestureResult {
        let Some(features) = self.features(landmarks) else {
            return GestureResult::none("No valid hand detected");
        };

        self.rules
            .iter()
            .find(|rule| rule.matches(&features, &self.config))
            .map(|rule| GestureResult::new(rule.gesture, rule.confidence, rule.description))
            .unwrap_or_else(|| GestureResult::none("No recognized gesture"))
    }

    pub fn features(&self, landmarks: &[Landmark]) -> Option<HandFeatures> {
        if landmarks.len() < NUM_LANDMARKS {
            return None;
        }
        Some(HandFeatures {
            fingers: self.finger_states(landmarks)?,
            thumb_index_distance: landmarks[THUMB_TIP].distance_2d(&landmarks[INDEX_TIP]),
        })
    }

    pub fn finger_states(&self, landmarks: &[Landmark]) -> Option<FingerStates> {
        if landmarks.len() < NUM_LANDMARKS {
            return None;
        }
        let states = Finger::ALL.map(|finger| match finger {
            Finger::Thumb => self.is_thumb_extended(landmarks),
            // Smaller y is higher in the image; assumes an upright hand.
            other => landmarks[other.tip()].y < landmarks[other.base()].y,
        });
        Some(FingerStates::from_array(states))
    }

    fn is_thumb_extended(&self, landmarks: &[Landmark]) -> bool {
        let wrist = &landmarks[WRIST];
        let tip_to_wrist = landmarks[Finger::Thumb.tip()].distance_2d(wrist);
        let base_to_wrist = landmarks[Finger::Thumb.base()].distance_2d(wrist);
        tip_to_wrist > base_to_wrist * self.config.thumb_extension_ratio
    }
}
