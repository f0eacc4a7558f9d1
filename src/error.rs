/// Failure to bring a frame source up.
#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("camera {index} could not be opened: {reason}")]
    CameraUnavailable { index: u32, reason: String },
    #[error("no input images were given")]
    NoImages,
    #[error("frame source is not available: {0}")]
    Unavailable(String),
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
