mod plane;
pub use plane::Plane;
mod ransac;
pub use ransac::{PlaneSegmentation, PlaneSegmentationParams, PlaneSegmenter};
