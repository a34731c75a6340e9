// Pose detector bridge
// Abstracts the external landmark model (MediaPipe Pose or similar) that maps
// a still frame to an ordered list of body landmarks

use crate::models::capture::Frame;
use crate::models::pose::{Landmark, PoseError, PoseResult, POSE_LANDMARK_COUNT};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Pose detection capability.
///
/// Implementations run on one still frame per call. `Ok(None)` means no pose
/// was found in the frame, which is not an error.
#[async_trait]
pub trait PoseDetector: Send + Sync {
    /// Run inference on a frame
    async fn detect(&self, frame: &Frame) -> PoseResult<Option<Vec<Landmark>>>;

    /// Landmarks reported per detected pose
    fn landmark_count(&self) -> usize {
        POSE_LANDMARK_COUNT
    }

    /// Get model info
    fn model_info(&self) -> String;
}

// ==============================================================================
// Null Implementation (no model available)
// ==============================================================================

/// Detector used when no landmark model is configured. Never detects a pose.
#[derive(Debug, Default)]
pub struct NullPoseDetector;

#[async_trait]
impl PoseDetector for NullPoseDetector {
    async fn detect(&self, _frame: &Frame) -> PoseResult<Option<Vec<Landmark>>> {
        Ok(None)
    }

    fn model_info(&self) -> String {
        "Null pose detector (no landmark model configured)".to_string()
    }
}

// ==============================================================================
// Replay Implementation (recorded landmarks)
// ==============================================================================

/// Replays previously recorded detections, one entry per `detect` call,
/// cycling when the recording runs out. `None` entries replay frames in
/// which nothing was detected.
pub struct ReplayPoseDetector {
    recording: Vec<Option<Vec<Landmark>>>,
    landmark_count: usize,
    cursor: AtomicUsize,
}

impl ReplayPoseDetector {
    pub fn new(recording: Vec<Option<Vec<Landmark>>>, landmark_count: usize) -> PoseResult<Self> {
        if let Some(bad) = recording
            .iter()
            .flatten()
            .find(|landmarks| landmarks.len() != landmark_count)
        {
            return Err(PoseError::LandmarkCountMismatch {
                expected: landmark_count,
                actual: bad.len(),
            });
        }

        Ok(Self {
            recording,
            landmark_count,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Load a JSON array whose entries are landmark lists or `null`
    pub fn from_file(path: &Path, landmark_count: usize) -> PoseResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let recording: Vec<Option<Vec<Landmark>>> = serde_json::from_str(&contents)
            .map_err(|e| PoseError::ModelLoadFailed(format!("{}: {}", path.display(), e)))?;

        log::info!(
            "Loaded {} recorded detections from {}",
            recording.len(),
            path.display()
        );
        Self::new(recording, landmark_count)
    }
}

#[async_trait]
impl PoseDetector for ReplayPoseDetector {
    async fn detect(&self, _frame: &Frame) -> PoseResult<Option<Vec<Landmark>>> {
        if self.recording.is_empty() {
            return Ok(None);
        }

        let index = self.cursor.fetch_add(1, Ordering::SeqCst) % self.recording.len();
        Ok(self.recording[index].clone())
    }

    fn landmark_count(&self) -> usize {
        self.landmark_count
    }

    fn model_info(&self) -> String {
        format!(
            "Replay pose detector ({} recorded frames, {} landmarks)",
            self.recording.len(),
            self.landmark_count
        )
    }
}

// ==============================================================================
// Default Backend Selection
// ==============================================================================

pub type DefaultPoseDetector = NullPoseDetector;

#[cfg(test)]
mod tests {
    use super::*;

    fn pose(value: f32, count: usize) -> Vec<Landmark> {
        vec![Landmark::new(value, value, value); count]
    }

    #[tokio::test]
    async fn test_null_detector_never_detects() {
        let detector = NullPoseDetector;
        assert!(detector.detect(&Frame::empty()).await.unwrap().is_none());
        assert!(detector.model_info().contains("no landmark model"));
        assert_eq!(detector.landmark_count(), 33);
    }

    #[tokio::test]
    async fn test_replay_detector_cycles() {
        let detector = ReplayPoseDetector::new(vec![Some(pose(0.1, 2)), None], 2).unwrap();
        let frame = Frame::empty();

        assert_eq!(detector.detect(&frame).await.unwrap(), Some(pose(0.1, 2)));
        assert_eq!(detector.detect(&frame).await.unwrap(), None);
        assert_eq!(detector.detect(&frame).await.unwrap(), Some(pose(0.1, 2)));
    }

    #[test]
    fn test_replay_detector_rejects_wrong_count() {
        let result = ReplayPoseDetector::new(vec![Some(pose(0.1, 3))], 2);
        assert!(matches!(
            result,
            Err(PoseError::LandmarkCountMismatch { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_replay_detector_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("landmarks.json");
        std::fs::write(&path, r#"[[{"x":0.1,"y":0.2,"z":0.3}], null]"#).unwrap();

        let detector = ReplayPoseDetector::from_file(&path, 1).unwrap();
        assert!(detector.model_info().contains("2 recorded frames"));

        std::fs::write(&path, "{").unwrap();
        assert!(matches!(
            ReplayPoseDetector::from_file(&path, 1),
            Err(PoseError::ModelLoadFailed(_))
        ));
    }
}
