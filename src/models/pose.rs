// Data models for body landmarks and labeled pose samples

use serde::{Deserialize, Serialize};

// ==============================================================================
// Landmarks (33 keypoints)
// ==============================================================================

/// A single detected body-joint position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32, // Normalized [0, 1] for image coordinates
    pub y: f32, // Normalized [0, 1] for image coordinates
    pub z: f32, // Depth relative to the hip midpoint
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Number of landmarks the body model reports per pose
pub const POSE_LANDMARK_COUNT: usize = 33;

/// Values contributed to a feature vector by one landmark (x, y, z)
pub const VALUES_PER_LANDMARK: usize = 3;

// ==============================================================================
// Pose Sample
// ==============================================================================

/// Flattened landmark vector tagged with its ground-truth label.
///
/// The serialized shape (`{"data": [...], "label": "..."}`) is the format of
/// recorded training files, so exported datasets can be loaded back directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseSample {
    pub data: Vec<f32>,
    pub label: String,
}

impl PoseSample {
    pub fn new(data: Vec<f32>, label: impl Into<String>) -> Self {
        Self {
            data,
            label: label.into(),
        }
    }

    /// Feature vector length required for `landmark_count` landmarks
    pub fn expected_len(landmark_count: usize) -> usize {
        landmark_count * VALUES_PER_LANDMARK
    }

    pub fn is_well_formed(&self, landmark_count: usize) -> bool {
        self.data.len() == Self::expected_len(landmark_count)
    }
}

// ==============================================================================
// Error Types
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PoseError {
    #[error("Model loading failed: {0}")]
    ModelLoadFailed(String),

    #[error("Detector returned {actual} landmarks, expected {expected}")]
    LandmarkCountMismatch { expected: usize, actual: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type PoseResult<T> = Result<T, PoseError>;
