// Video source implementations
// Each source provides the interface defined in core/video_capture.rs

pub mod image_sequence;

pub use image_sequence::ImageSequenceSource;
