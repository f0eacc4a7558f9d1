use std::{collections::VecDeque, path::PathBuf};

use super::FrameSource;
use crate::{error::CaptureError, types::Frame};

/// Replays image files from disk as if they came off a camera.
///
/// Files that fail to decode end the stream early rather than being skipped,
/// matching a camera that stops producing frames.
#[derive(Debug, Default)]
pub struct StillImageSource {
    paths: Vec<PathBuf>,
    pending: VecDeque<PathBuf>,
    open: bool,
}

impl StillImageSource {
    pub fn new<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
            pending: VecDeque::new(),
            open: false,
        }
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl FrameSource for StillImageSource {
    fn open(&mut self) -> Result<(), CaptureError> {
        if self.paths.is_empty() {
            return Err(CaptureError::NoImages);
        }
        self.pending = self.paths.iter().cloned().collect();
        self.open = true;
        log::info!("replaying {} still image(s)", self.paths.len());
        Ok(())
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if !self.open {
            return None;
        }
        let path = self.pending.pop_front()?;
        match image::open(&path) {
            Ok(image) => Some(Frame::from_image(image.to_rgba8())),
            Err(err) => {
                log::warn!("failed to read {}: {err}", path.display());
                self.pending.clear();
                None
            }
        }
    }

    fn release(&mut self) {
        self.pending.clear();
        self.open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn write_png(dir: &tempfile::TempDir, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.path().join(name);
        RgbaImage::from_pixel(w, h, Rgba([1, 2, 3, 255]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn empty_list_fails_to_open() {
        let mut source = StillImageSource::new(Vec::<PathBuf>::new());
        assert!(matches!(source.open(), Err(CaptureError::NoImages)));
        assert!(!source.is_open());
    }

    #[test]
    fn frames_are_yielded_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_png(&dir, "a.png", 4, 3);
        let second = write_png(&dir, "b.png", 2, 2);

        let mut source = StillImageSource::new([first, second]);
        assert!(source.next_frame().is_none(), "closed source yields nothing");
        source.open().unwrap();

        let frame = source.next_frame().unwrap();
        assert_eq!((frame.width, frame.height), (4, 3));
        assert_eq!(&frame.rgba[..4], &[1, 2, 3, 255]);
        assert_eq!(source.next_frame().unwrap().width, 2);
        assert!(source.next_frame().is_none());
    }

    #[test]
    fn unreadable_file_ends_stream() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_png(&dir, "good.png", 2, 2);
        let mut source = StillImageSource::new([dir.path().join("missing.png"), good]);
        source.open().unwrap();
        assert!(source.next_frame().is_none());
        assert_eq!(source.remaining(), 0);
    }

    #[test]
    fn release_is_idempotent_and_reopen_rewinds() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(&dir, "a.png", 2, 2);
        let mut source = StillImageSource::new([path]);
        source.open().unwrap();
        source.release();
        source.release();
        assert!(source.next_frame().is_none());
        source.open().unwrap();
        assert!(source.next_frame().is_some());
    }
}
