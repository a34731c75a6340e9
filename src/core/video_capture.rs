// Video capture abstraction layer - unified interface for frame sources

use crate::models::capture::{CaptureError, CaptureResult, Frame};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Live frame source (webcam or a stand-in for one)
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Acquire the device and begin producing frames
    async fn start(&mut self) -> CaptureResult<()>;

    /// Release the device
    async fn stop(&mut self) -> CaptureResult<()>;

    /// Capture the current frame
    async fn grab_frame(&self) -> CaptureResult<Frame>;

    /// Check if currently capturing
    fn is_capturing(&self) -> bool;

    /// Human readable description for logs
    fn describe(&self) -> String;
}

/// High-level capture device wrapping a video source.
///
/// Device errors are logged here and handed back as values, so a refused or
/// missing camera leaves the caller in its pre-capture state.
pub struct CaptureDevice {
    source: Mutex<Box<dyn VideoSource>>,
}

impl CaptureDevice {
    pub fn new(source: Box<dyn VideoSource>) -> Self {
        Self {
            source: Mutex::new(source),
        }
    }

    /// Start the device. Starting a running device resumes it.
    pub async fn start(&self) -> CaptureResult<()> {
        let mut source = self.source.lock().await;
        if source.is_capturing() {
            log::info!("Capture device already running: {}", source.describe());
            return Ok(());
        }

        match source.start().await {
            Ok(()) => {
                log::info!("Started capture device: {}", source.describe());
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to start capture device: {}", e);
                Err(e)
            }
        }
    }

    pub async fn stop(&self) -> CaptureResult<()> {
        let mut source = self.source.lock().await;
        if !source.is_capturing() {
            return Ok(());
        }

        source.stop().await?;
        log::info!("Stopped capture device");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.source.lock().await.is_capturing()
    }

    pub async fn grab_frame(&self) -> CaptureResult<Frame> {
        let source = self.source.lock().await;
        if !source.is_capturing() {
            return Err(CaptureError::NotCapturing);
        }
        source.grab_frame().await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::models::capture::PixelFormat;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// In-memory source producing 1x1 frames and counting grabs
    #[derive(Default)]
    pub struct FakeSource {
        pub running: AtomicBool,
        pub grabs: Arc<AtomicUsize>,
        pub refuse_start: bool,
    }

    impl FakeSource {
        pub fn refusing() -> Self {
            Self {
                refuse_start: true,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl VideoSource for FakeSource {
        async fn start(&mut self) -> CaptureResult<()> {
            if self.refuse_start {
                return Err(CaptureError::PermissionDenied("camera access refused".to_string()));
            }
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&mut self) -> CaptureResult<()> {
            self.running.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn grab_frame(&self) -> CaptureResult<Frame> {
            let n = self.grabs.fetch_add(1, Ordering::SeqCst);
            Ok(Frame::new(1, 1, vec![n as u8, 0, 0, 255], PixelFormat::RGBA8))
        }

        fn is_capturing(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        fn describe(&self) -> String {
            "fake source".to_string()
        }
    }
}
