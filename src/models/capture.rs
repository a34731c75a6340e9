// Data structures for video capture

use crate::models::pose::PoseError;
use serde::{Deserialize, Serialize};

/// A captured video frame
#[derive(Debug, Clone)]
pub struct Frame {
    pub timestamp: i64, // Capture time, ms since epoch
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub format: PixelFormat,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: Vec<u8>, format: PixelFormat) -> Self {
        Self {
            timestamp: chrono::Utc::now().timestamp_millis(),
            width,
            height,
            data,
            format,
        }
    }

    /// A zero-sized frame, used where the pixel content does not matter
    pub fn empty() -> Self {
        Self::new(0, 0, Vec::new(), PixelFormat::RGBA8)
    }
}

/// Pixel format of captured frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    RGBA8,
    RGB8,
}

/// Error types for capture operations
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Capture device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Capture device is not running")]
    NotCapturing,

    #[error("A capture session is in progress")]
    SessionInProgress,

    #[error("Invalid label: {0}")]
    InvalidLabel(String),

    #[error("Invalid capture timings: {0}")]
    InvalidTimings(String),

    #[error("Pose detection failed: {0}")]
    Detection(#[from] PoseError),
}

pub type CaptureResult<T> = Result<T, CaptureError>;
