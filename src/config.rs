//! Runtime configuration, loadable from JSON.
//!
//! Every field has a default, so a config file only needs the values it
//! changes.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, gesture::ClassifierConfig};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub camera: CameraConfig,
    pub hand_tracking: HandTrackingConfig,
    pub gesture: ClassifierConfig,
    pub display: DisplayConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub index: u32,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Mirror frames so the preview behaves like a mirror.
    pub flip_horizontal: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            frame_width: 640,
            frame_height: 480,
            flip_horizontal: true,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct HandTrackingConfig {
    pub max_num_hands: usize,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
    pub nms_threshold: f32,
    pub palm_detector_model: PathBuf,
    pub handpose_estimator_model: PathBuf,
}

impl Default for HandTrackingConfig {
    fn default() -> Self {
        Self {
            max_num_hands: 2,
            min_detection_confidence: 0.7,
            min_tracking_confidence: 0.5,
            nms_threshold: 0.3,
            palm_detector_model: crate::model_download::default_palm_detector_model_path(),
            handpose_estimator_model: crate::model_download::default_handpose_estimator_model_path(
            ),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub show_landmarks: bool,
    pub show_gesture_info: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_landmarks: true,
            show_gesture_info: true,
        }
    }
}

impl AppConfig {
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit = |field: &'static str, value: f32| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ConfigError::Invalid {
                    field,
                    reason: format!("{value} is outside [0, 1]"),
                })
            }
        };
        unit(
            "hand_tracking.min_detection_confidence",
            self.hand_tracking.min_detection_confidence,
        )?;
        unit(
            "hand_tracking.min_tracking_confidence",
            self.hand_tracking.min_tracking_confidence,
        )?;
        unit("gesture.confidence_threshold", self.gesture.confidence_threshold)?;

        if self.hand_tracking.max_num_hands == 0 {
            return Err(ConfigError::Invalid {
                field: "hand_tracking.max_num_hands",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.camera.frame_width == 0 || self.camera.frame_height == 0 {
            return Err(ConfigError::Invalid {
                field: "camera",
                reason: "frame size must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_follow_the_reference_setup() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.camera.frame_width, 640);
        assert_eq!(cfg.camera.frame_height, 480);
        assert!(cfg.camera.flip_horizontal);
        assert_eq!(cfg.hand_tracking.max_num_hands, 2);
        assert_eq!(cfg.gesture.pinch_distance, 0.03);
        assert_eq!(cfg.gesture.ok_sign_distance, 0.05);
        assert_eq!(cfg.gesture.confidence_threshold, 0.7);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "camera": {{ "index": 2 }}, "gesture": {{ "pinch_distance": 0.02 }} }}"#
        )
        .unwrap();

        let cfg = AppConfig::load_json(file.path()).unwrap();
        assert_eq!(cfg.camera.index, 2);
        assert_eq!(cfg.camera.frame_width, 640);
        assert_eq!(cfg.gesture.pinch_distance, 0.02);
        assert_eq!(cfg.gesture.ok_sign_distance, 0.05);
        assert!(cfg.display.show_landmarks);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "gesture": {{ "confidence_threshold": 1.5 }} }}"#).unwrap();

        let err = AppConfig::load_json(file.path()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "gesture.confidence_threshold",
                ..
            }
        ));
    }

    #[test]
    fn write_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut cfg = AppConfig::default();
        cfg.display.show_gesture_info = false;
        cfg.write_json(&path).unwrap();

        let loaded = AppConfig::load_json(&path).unwrap();
        assert!(!loaded.display.show_gesture_info);
    }
}
