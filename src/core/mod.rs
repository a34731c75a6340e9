pub mod config;
pub mod dataset;
pub mod video_capture;

// Timed pose capture
pub mod capture_session;

// Classification
pub mod classifier;
pub mod trainer;
