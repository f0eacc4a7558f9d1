use anyhow::{Result, anyhow};
use nokhwa::{
    Camera,
    pixel_format::RgbFormat,
    query,
    utils::{
        ApiBackend, CameraFormat, CameraIndex, CameraInfo, FrameFormat, RequestedFormat,
        RequestedFormatType, Resolution,
    },
};

use super::{FrameSource, rgba_converter};
use crate::{config::CameraConfig, error::CaptureError, types::Frame};

// Prefer pixel formats that are widely supported on macOS (the built-in cameras
// often reject YUYV even though Nokhwa reports it).
const PREFERRED_PIXEL_FORMATS: &[FrameFormat] = &[
    FrameFormat::RAWRGB,
    FrameFormat::RAWBGR,
    FrameFormat::GRAY,
    FrameFormat::YUYV,
    FrameFormat::NV12,
    FrameFormat::MJPEG,
];

const REQUESTED_FPS: u32 = 30;
const MAX_DECODE_FAILURES: usize = 3;

fn requested_formats(width: u32, height: u32) -> [RequestedFormat<'static>; 4] {
    let resolution = Resolution::new(width, height);
    [
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            resolution,
            FrameFormat::MJPEG,
            REQUESTED_FPS,
        ))),
        RequestedFormat::with_formats(
            RequestedFormatType::HighestResolution(resolution),
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::with_formats(
            RequestedFormatType::AbsoluteHighestFrameRate,
            PREFERRED_PIXEL_FORMATS,
        ),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::None),
    ]
}

#[derive(Clone, Debug)]
pub struct CameraDevice {
    pub index: CameraIndex,
    pub label: String,
}

pub fn available_cameras() -> Result<Vec<CameraDevice>> {
    let cameras = query(ApiBackend::Auto)?;
    Ok(cameras
        .into_iter()
        .map(|info| CameraDevice {
            index: info.index().clone(),
            label: format_camera_label(&info),
        })
        .collect())
}

fn format_camera_label(info: &CameraInfo) -> String {
    format!("{} ({})", info.human_name(), info.index())
}

fn build_camera(index: CameraIndex, width: u32, height: u32) -> Result<Camera> {
    let mut last_err = None;

    for requested in requested_formats(width, height) {
        match Camera::new(index.clone(), requested) {
            Ok(mut camera) => match camera.open_stream() {
                Ok(()) => return Ok(camera),
                Err(err) => last_err = Some(err.into()),
            },
            Err(err) => last_err = Some(err.into()),
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to open camera with any supported format")))
}

/// A local capture device read one frame at a time.
pub struct NokhwaCamera {
    config: CameraConfig,
    camera: Option<Camera>,
}

impl NokhwaCamera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            camera: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.camera.is_some()
    }
}

impl FrameSource for NokhwaCamera {
    fn open(&mut self) -> Result<(), CaptureError> {
        if self.camera.is_some() {
            return Ok(());
        }

        let index = CameraIndex::Index(self.config.index);
        let camera = build_camera(index, self.config.frame_width, self.config.frame_height)
            .map_err(|err| CaptureError::CameraUnavailable {
                index: self.config.index,
                reason: format!("{err:#}"),
            })?;

        let format = camera.camera_format();
        log::info!(
            "camera {} opened at {}x{} {:?} @ {}fps",
            self.config.index,
            format.width(),
            format.height(),
            format.format(),
            format.frame_rate()
        );
        self.camera = Some(camera);
        Ok(())
    }

    fn next_frame(&mut self) -> Option<Frame> {
        let camera = self.camera.as_mut()?;

        for _ in 0..MAX_DECODE_FAILURES {
            let buffer = match camera.frame() {
                Ok(buffer) => buffer,
                Err(err) => {
                    log::warn!("camera frame read failed: {err:?}");
                    return None;
                }
            };

            match rgba_converter::decode_buffer(&buffer) {
                Ok(frame) => return Some(frame),
                Err(err) => log::warn!("failed to decode camera frame: {err:?}"),
            }
        }

        log::error!("giving up after {MAX_DECODE_FAILURES} undecodable frames");
        None
    }

    fn release(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(err) = camera.stop_stream() {
                log::warn!("failed to stop camera stream cleanly: {err:?}");
            }
            log::info!("camera {} released", self.config.index);
        }
    }
}

impl Drop for NokhwaCamera {
    fn drop(&mut self) {
        self.release();
    }
}
