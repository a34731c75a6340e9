// Pose estimation platform integration
// Provides the detector abstraction and the backends shipped with the crate

pub mod detector;

pub use detector::{DefaultPoseDetector, NullPoseDetector, PoseDetector, ReplayPoseDetector};
