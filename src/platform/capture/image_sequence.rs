// Image-sequence video source
// Replays still images from disk as a simulated webcam

use crate::core::video_capture::VideoSource;
use crate::models::capture::{CaptureError, CaptureResult, Frame, PixelFormat};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Cycles through the image files matching a glob pattern, one per frame
pub struct ImageSequenceSource {
    pattern: String,
    paths: Vec<PathBuf>,
    cursor: AtomicUsize,
    is_capturing: AtomicBool,
}

impl ImageSequenceSource {
    /// Create a source for the files matching `pattern` (e.g. `frames/*.png`)
    pub fn new(pattern: &str) -> CaptureResult<Self> {
        let mut paths: Vec<PathBuf> = glob::glob(pattern)
            .map_err(|e| CaptureError::DeviceUnavailable(format!("Invalid frame pattern '{}': {}", pattern, e.msg)))?
            .filter_map(Result::ok)
            .collect();
        paths.sort();

        Ok(Self::from_paths(pattern, paths))
    }

    /// Create a source replaying `paths` in the given order
    pub fn from_paths(pattern: &str, paths: Vec<PathBuf>) -> Self {
        Self {
            pattern: pattern.to_string(),
            paths,
            cursor: AtomicUsize::new(0),
            is_capturing: AtomicBool::new(false),
        }
    }

    fn next_path(&self) -> Option<&PathBuf> {
        if self.paths.is_empty() {
            return None;
        }
        let index = self.cursor.fetch_add(1, Ordering::SeqCst) % self.paths.len();
        self.paths.get(index)
    }
}

#[async_trait]
impl VideoSource for ImageSequenceSource {
    async fn start(&mut self) -> CaptureResult<()> {
        if self.paths.is_empty() {
            return Err(CaptureError::DeviceUnavailable(format!(
                "No frames match '{}'",
                self.pattern
            )));
        }

        self.cursor.store(0, Ordering::SeqCst);
        self.is_capturing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&mut self) -> CaptureResult<()> {
        self.is_capturing.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn grab_frame(&self) -> CaptureResult<Frame> {
        if !self.is_capturing() {
            return Err(CaptureError::NotCapturing);
        }

        let path = self
            .next_path()
            .ok_or_else(|| CaptureError::CaptureFailed("Frame sequence is empty".to_string()))?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| CaptureError::CaptureFailed(format!("{}: {}", path.display(), e)))?;
        let image = image::load_from_memory(&bytes)
            .map_err(|e| CaptureError::CaptureFailed(format!("{}: {}", path.display(), e)))?
            .to_rgba8();

        let (width, height) = image.dimensions();
        Ok(Frame::new(width, height, image.into_raw(), PixelFormat::RGBA8))
    }

    fn is_capturing(&self) -> bool {
        self.is_capturing.load(Ordering::SeqCst)
    }

    fn describe(&self) -> String {
        format!("Image sequence '{}' ({} frames)", self.pattern, self.paths.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_frames(dir: &std::path::Path, count: u32) {
        for i in 0..count {
            let image = image::RgbaImage::from_pixel(4, 3, image::Rgba([i as u8, 0, 0, 255]));
            image.save(dir.join(format!("frame_{:03}.png", i))).unwrap();
        }
    }

    #[tokio::test]
    async fn test_replays_frames_in_order() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 2);
        let pattern = format!("{}/*.png", dir.path().display());

        let mut source = ImageSequenceSource::new(&pattern).unwrap();
        assert!(source.describe().contains("(2 frames)"));
        source.start().await.unwrap();

        let first = source.grab_frame().await.unwrap();
        let second = source.grab_frame().await.unwrap();
        let third = source.grab_frame().await.unwrap();

        assert_eq!((first.width, first.height), (4, 3));
        assert_eq!(first.format, PixelFormat::RGBA8);
        assert_eq!(first.data[0], 0);
        assert_eq!(second.data[0], 1);
        assert_eq!(third.data[0], 0);
    }

    #[tokio::test]
    async fn test_missing_frames_is_device_error() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*.png", dir.path().display());

        let mut source = ImageSequenceSource::new(&pattern).unwrap();
        assert!(matches!(source.start().await, Err(CaptureError::DeviceUnavailable(_))));
        assert!(!source.is_capturing());
    }

    #[tokio::test]
    async fn test_explicit_paths_keep_their_order() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 2);
        let paths = vec![dir.path().join("frame_001.png"), dir.path().join("frame_000.png")];

        let mut source = ImageSequenceSource::from_paths("picked", paths);
        assert_eq!(source.describe(), "Image sequence 'picked' (2 frames)");
        source.start().await.unwrap();
        assert_eq!(source.grab_frame().await.unwrap().data[0], 1);

        let mut empty = ImageSequenceSource::from_paths("none", Vec::new());
        assert!(matches!(empty.start().await, Err(CaptureError::DeviceUnavailable(_))));
    }

    #[tokio::test]
    async fn test_grab_requires_running_source() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 1);
        let pattern = format!("{}/*.png", dir.path().display());

        let mut source = ImageSequenceSource::new(&pattern).unwrap();
        assert!(matches!(source.grab_frame().await, Err(CaptureError::NotCapturing)));

        source.start().await.unwrap();
        source.stop().await.unwrap();
        assert!(matches!(source.grab_frame().await, Err(CaptureError::NotCapturing)));
    }
}
