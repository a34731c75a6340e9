// Data models for frame capture, pose samples, datasets and classifier training

pub mod capture;
pub mod dataset;
pub mod pose;
pub mod training;
