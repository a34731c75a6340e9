// Backends for the capture device and the pose detector

pub mod capture;
pub mod pose;
