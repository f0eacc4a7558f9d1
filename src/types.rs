use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::Serialize;

use crate::landmarks::{NUM_LANDMARKS, TIP_INDICES};

#[derive(Clone, Debug)]
pub struct Frame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: Instant,
}

impl Frame {
    pub fn new(rgba: Vec<u8>, width: u32, height: u32) -> Self {
        Self {
            rgba,
            width,
            height,
            timestamp: Instant::now(),
        }
    }

    /// Solid-color frame, mostly useful for tests and placeholders.
    pub fn filled(width: u32, height: u32, color: [u8; 4]) -> Self {
        let rgba = color
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(rgba, width, height)
    }

    /// Mirror the frame left-to-right in place.
    pub fn mirror_horizontally(&mut self) {
        let stride = self.width as usize * 4;
        if stride == 0 {
            return;
        }
        self.rgba.par_chunks_exact_mut(stride).for_each(|row| {
            let pixels = row.len() / 4;
            for x in 0..pixels / 2 {
                let left = x * 4;
                let right = (pixels - 1 - x) * 4;
                for c in 0..4 {
                    row.swap(left + c, right + c);
                }
            }
        });
    }

    pub fn from_image(image: image::RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height)
    }

    pub fn into_image(self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.rgba)
    }
}

/// One tracked point; x and y are normalized to the image, z is relative depth.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Euclidean distance in the image plane, ignoring depth.
    pub fn distance_2d(&self, other: &Landmark) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct HandSkeleton {
    landmarks: Vec<Landmark>,
}

impl HandSkeleton {
    pub fn new(landmarks: Vec<Landmark>) -> Self {
        Self { landmarks }
    }

    pub fn landmarks(&self) -> &[Landmark] {
        &self.landmarks
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    /// Whether every anatomical point is present.
    pub fn is_complete(&self) -> bool {
        self.landmarks.len() >= NUM_LANDMARKS
    }

    /// Tip landmarks ordered thumb, index, middle, ring, pinky.
    pub fn fingertips(&self) -> Option<[Landmark; 5]> {
        if !self.is_complete() {
            return None;
        }
        Some(TIP_INDICES.map(|idx| self.landmarks[idx]))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Handedness {
    Left,
    Right,
    Unknown,
}

impl Handedness {
    pub fn from_score(score: f32) -> Self {
        if score >= 0.5 {
            Handedness::Right
        } else if score > 0.0 {
            Handedness::Left
        } else {
            Handedness::Unknown
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Handedness::Left => "left",
            Handedness::Right => "right",
            Handedness::Unknown => "unknown",
        }
    }
}

/// A hand as reported by a landmark detector.
#[derive(Clone, Debug)]
pub struct DetectedHand {
    pub skeleton: HandSkeleton,
    pub score: f32,
    pub handedness: Handedness,
}

impl DetectedHand {
    pub fn new(skeleton: HandSkeleton) -> Self {
        Self {
            skeleton,
            score: 1.0,
            handedness: Handedness::Unknown,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureType {
    #[default]
    None,
    Point,
    OpenPalm,
    Fist,
    ThumbsUp,
    Peace,
    OkSign,
    Pinch,
}

impl GestureType {
    pub const ALL: [GestureType; 8] = [
        GestureType::None,
        GestureType::Point,
        GestureType::OpenPalm,
        GestureType::Fist,
        GestureType::ThumbsUp,
        GestureType::Peace,
        GestureType::OkSign,
        GestureType::Pinch,
    ];

    /// Stable identifier, also used in serialized output.
    pub fn as_str(&self) -> &'static str {
        match self {
            GestureType::None => "none",
            GestureType::Point => "point",
            GestureType::OpenPalm => "open_palm",
            GestureType::Fist => "fist",
            GestureType::ThumbsUp => "thumbs_up",
            GestureType::Peace => "peace",
            GestureType::OkSign => "ok_sign",
            GestureType::Pinch => "pinch",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            GestureType::None => "None",
            GestureType::Point => "Point",
            GestureType::OpenPalm => "Open Palm",
            GestureType::Fist => "Fist",
            GestureType::ThumbsUp => "Thumbs Up",
            GestureType::Peace => "Peace",
            GestureType::OkSign => "OK Sign",
            GestureType::Pinch => "Pinch",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            GestureType::None => "⋯ ",
            GestureType::Point => "👉 ",
            GestureType::OpenPalm => "✋ ",
            GestureType::Fist => "✊ ",
            GestureType::ThumbsUp => "👍 ",
            GestureType::Peace => "✌️ ",
            GestureType::OkSign => "👌 ",
            GestureType::Pinch => "🤏 ",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GestureResult {
    pub gesture: GestureType,
    pub confidence: f32,
    pub description: String,
}

impl GestureResult {
    pub fn new(gesture: GestureType, confidence: f32, description: impl Into<String>) -> Self {
        Self {
            gesture,
            confidence,
            description: description.into(),
        }
    }

    pub fn none(description: impl Into<String>) -> Self {
        Self::new(GestureType::None, 0.0, description)
    }
}

/// Classification of one processed frame, as handed to callbacks and sinks.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GestureReport {
    #[serde(flatten)]
    pub result: GestureResult,
    pub hand_count: usize,
}

impl GestureReport {
    pub fn no_hands() -> Self {
        Self {
            result: GestureResult::none("No hands detected"),
            hand_count: 0,
        }
    }

    pub fn gesture(&self) -> GestureType {
        self.result.gesture
    }

    pub fn confidence(&self) -> f32 {
        self.result.confidence
    }

    pub fn display_text(&self) -> String {
        format!(
            "{}{} ({:.0}%)",
            self.result.gesture.emoji(),
            self.result.gesture.display_name(),
            self.result.confidence * 100.0
        )
    }

    /// Text block shown next to the info panel.
    pub fn overlay_lines(&self) -> [String; 4] {
        let name = match self.result.gesture {
            GestureType::None => "None",
            other => other.as_str(),
        };
        let description: String = self.result.description.chars().take(30).collect();
        [
            format!("Gesture: {name}"),
            format!("Confidence: {:.2}", self.result.confidence),
            format!("Hands: {}", self.hand_count),
            format!("Description: {description}..."),
        ]
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct CaptureRecord {
    #[serde(serialize_with = "serialize_seconds")]
    pub timestamp: Duration,
    pub report: GestureReport,
}

fn serialize_seconds<S: serde::Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(value.as_secs_f64())
}
